use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub enum $name {
            $(#[serde(rename = $s)] $variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }
    };
}

str_enum!(Role {
    Patient => "patient",
    Admin => "admin",
});

str_enum!(RecordType {
    BloodTest => "blood_test",
    Ecg => "ecg",
    Urinalysis => "urinalysis",
    Imaging => "imaging",
    Prescription => "prescription",
    ClinicalNote => "clinical_note",
    Other => "other",
});

str_enum!(AnalysisKind {
    Comprehensive => "comprehensive",
});

str_enum!(RiskLevel {
    Low => "low",
    Moderate => "moderate",
    High => "high",
    Unknown => "unknown",
});

str_enum!(TrendLabel {
    Improving => "improving",
    Declining => "declining",
    Stable => "stable",
    Unknown => "unknown",
});

str_enum!(Category {
    Hematology => "Hematology",
    Chemistry => "Chemistry",
    Lipids => "Lipids",
    Thyroid => "Thyroid",
    Diabetes => "Diabetes",
    Liver => "Liver",
    Kidney => "Kidney",
    Other => "Other",
});

impl RecordType {
    /// Human-facing label ("Blood Test", "ECG").
    pub fn label(&self) -> &'static str {
        match self {
            Self::BloodTest => "Blood Test",
            Self::Ecg => "ECG",
            Self::Urinalysis => "Urinalysis",
            Self::Imaging => "Imaging",
            Self::Prescription => "Prescription",
            Self::ClinicalNote => "Clinical Note",
            Self::Other => "Other",
        }
    }

    /// Lenient mapping from a user-declared type tag. Unknown tags become `Other`.
    pub fn from_label(label: &str) -> Self {
        let normalized: String = label
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c == '_' { ' ' } else { c })
            .collect();
        match normalized.as_str() {
            "blood test" | "blood" | "bloodwork" | "blood work" | "lab" | "lab result"
            | "lab report" => Self::BloodTest,
            "ecg" | "ekg" | "electrocardiogram" => Self::Ecg,
            "urinalysis" | "urine test" | "urine" => Self::Urinalysis,
            "imaging" | "radiology" | "x ray" | "xray" | "mri" | "ct" | "ultrasound" => {
                Self::Imaging
            }
            "prescription" => Self::Prescription,
            "clinical note" | "consultation" | "note" | "discharge summary" => Self::ClinicalNote,
            _ => Self::Other,
        }
    }
}

impl Default for RiskLevel {
    fn default() -> Self {
        Self::Unknown
    }
}

impl RiskLevel {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "low" | "minimal" | "normal" => Self::Low,
            "moderate" | "medium" | "intermediate" => Self::Moderate,
            "high" | "elevated" | "critical" | "severe" => Self::High,
            _ => Self::Unknown,
        }
    }
}

impl TrendLabel {
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_lowercase().as_str() {
            "improving" | "improved" => Self::Improving,
            "declining" | "worsening" | "worsened" => Self::Declining,
            "stable" | "unchanged" => Self::Stable,
            _ => Self::Unknown,
        }
    }
}

impl Category {
    pub const ALL: [Category; 8] = [
        Self::Hematology,
        Self::Chemistry,
        Self::Lipids,
        Self::Thyroid,
        Self::Diabetes,
        Self::Liver,
        Self::Kidney,
        Self::Other,
    ];

    /// Map a free-text category (or, failing that, the measurement name) onto the fixed set.
    pub fn classify(category: Option<&str>, measurement_name: &str) -> Self {
        if let Some(found) = category.and_then(Self::match_keywords) {
            return found;
        }
        Self::match_keywords(measurement_name).unwrap_or(Self::Other)
    }

    fn match_keywords(text: &str) -> Option<Self> {
        let lower = text.trim().to_lowercase();
        if lower.is_empty() {
            return None;
        }
        if let Some(exact) = Self::ALL.iter().find(|c| c.as_str().eq_ignore_ascii_case(&lower)) {
            return Some(*exact);
        }

        const TABLE: &[(Category, &[&str])] = &[
            (Category::Lipids, &["lipid", "cholesterol", "hdl", "ldl", "triglycer"]),
            (Category::Thyroid, &["thyroid", "tsh", "t3", "t4", "thyroxine"]),
            (Category::Diabetes, &["diabet", "glucose", "hba1c", "a1c", "insulin"]),
            (Category::Liver, &["liver", "hepat", "alt", "ast", "bilirubin", "alkaline phosphatase", "ggt", "albumin"]),
            (Category::Kidney, &["kidney", "renal", "creatinine", "egfr", "urea", "bun", "uric acid"]),
            (Category::Hematology, &["hematolog", "haematolog", "blood count", "cbc", "hemoglobin", "haemoglobin", "hematocrit", "platelet", "wbc", "rbc", "white blood", "red blood", "mcv", "mch", "ferritin"]),
            (Category::Chemistry, &["chemistry", "metabolic", "electrolyte", "sodium", "potassium", "chloride", "calcium", "magnesium", "bicarbonate", "protein", "vitamin", "iron"]),
        ];

        TABLE
            .iter()
            .find(|(_, keywords)| keywords.iter().any(|k| contains_word_prefix(&lower, k)))
            .map(|(category, _)| *category)
    }
}

/// True when `needle` appears in `haystack` starting at a word boundary.
/// Keeps short codes like "alt" or "t3" from matching inside unrelated words.
fn contains_word_prefix(haystack: &str, needle: &str) -> bool {
    haystack.match_indices(needle).any(|(idx, _)| {
        idx == 0
            || !haystack[..idx]
                .chars()
                .next_back()
                .is_some_and(|c| c.is_alphanumeric())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::str::FromStr;

    #[test]
    fn str_enum_round_trips_through_storage_form() {
        assert_eq!(RecordType::from_str("blood_test").unwrap(), RecordType::BloodTest);
        assert_eq!(Category::from_str("Lipids").unwrap(), Category::Lipids);
        assert!(RiskLevel::from_str("catastrophic").is_err());
    }

    #[test]
    fn record_type_from_declared_label() {
        assert_eq!(RecordType::from_label("Blood Test"), RecordType::BloodTest);
        assert_eq!(RecordType::from_label("ECG"), RecordType::Ecg);
        assert_eq!(RecordType::from_label("  ekg "), RecordType::Ecg);
        assert_eq!(RecordType::from_label("blood-test"), RecordType::BloodTest);
        assert_eq!(RecordType::from_label("dental chart"), RecordType::Other);
        assert_eq!(RecordType::BloodTest.label(), "Blood Test");
    }

    #[test]
    fn trend_label_unknown_for_unrecognised_text() {
        assert_eq!(TrendLabel::from_label("Improving"), TrendLabel::Improving);
        assert_eq!(TrendLabel::from_label("worsening"), TrendLabel::Declining);
        assert_eq!(TrendLabel::from_label("sideways"), TrendLabel::Unknown);
    }

    #[test]
    fn category_prefers_declared_category() {
        assert_eq!(Category::classify(Some("Lipid Panel"), "Glucose"), Category::Lipids);
        assert_eq!(Category::classify(Some("kidney"), "anything"), Category::Kidney);
    }

    #[test]
    fn category_falls_back_to_measurement_name() {
        assert_eq!(Category::classify(None, "Hemoglobin"), Category::Hematology);
        assert_eq!(Category::classify(Some("misc"), "TSH"), Category::Thyroid);
        assert_eq!(Category::classify(Some(""), "HbA1c"), Category::Diabetes);
        assert_eq!(Category::classify(None, "Heart rate"), Category::Other);
    }

    #[test]
    fn short_codes_do_not_match_inside_words() {
        // "alt" must not match "salt", "t3" must not match "at3x"
        assert_eq!(Category::classify(None, "Dietary salt"), Category::Other);
        assert_eq!(Category::classify(None, "ALT (SGPT)"), Category::Liver);
    }
}
