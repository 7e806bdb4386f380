//! Heuristic lab-content detection over extracted text.
//!
//! Two disjoint vocabularies: lab-specific terms (test names, units,
//! reference-range wording) and general medical terms (imaging, clinical).
//! A document is a lab report when it contains at least one lab-specific term
//! or at least two general ones.

use serde::Serialize;

/// Lab test names, units and reference-range vocabulary.
const LAB_KEYWORDS: &[&str] = &[
    // Panels and tests
    "hemoglobin",
    "haemoglobin",
    "hematocrit",
    "platelet",
    "white blood cell",
    "red blood cell",
    "complete blood count",
    "cholesterol",
    "triglyceride",
    "glucose",
    "hba1c",
    "creatinine",
    "egfr",
    "bilirubin",
    "albumin",
    "ferritin",
    "tsh",
    "urinalysis",
    "electrolyte",
    "sodium",
    "potassium",
    "lipid panel",
    "metabolic panel",
    // Units
    "mg/dl",
    "mmol/l",
    "g/dl",
    "µmol/l",
    "umol/l",
    "miu/l",
    "u/l",
    "x10^9/l",
    // Reference-range wording
    "reference range",
    "reference interval",
    "normal range",
    "ref. range",
    "specimen",
    "laboratory",
];

/// Imaging and clinical vocabulary. Must not overlap with `LAB_KEYWORDS`.
const GENERAL_MEDICAL_KEYWORDS: &[&str] = &[
    "patient",
    "diagnosis",
    "physician",
    "clinic",
    "hospital",
    "radiology",
    "x-ray",
    "mri",
    "ultrasound",
    "ct scan",
    "impression",
    "findings",
    "prescription",
    "dosage",
    "symptom",
    "blood pressure",
    "heart rate",
    "medical history",
    "allergies",
    "treatment",
];

/// Outcome of keyword classification, with the matched terms for logging.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Classification {
    pub lab_matches: Vec<&'static str>,
    pub general_matches: Vec<&'static str>,
}

impl Classification {
    pub fn is_lab_report(&self) -> bool {
        !self.lab_matches.is_empty() || self.general_matches.len() >= 2
    }
}

/// Case-insensitive substring search against both vocabularies.
pub fn classify_document(text: &str) -> Classification {
    let lower = text.to_lowercase();
    let matches = |keywords: &[&'static str]| -> Vec<&'static str> {
        keywords.iter().copied().filter(|k| lower.contains(k)).collect()
    };
    Classification {
        lab_matches: matches(LAB_KEYWORDS),
        general_matches: matches(GENERAL_MEDICAL_KEYWORDS),
    }
}

/// Boolean form of [`classify_document`].
pub fn is_lab_report(text: &str) -> bool {
    classify_document(text).is_lab_report()
}
