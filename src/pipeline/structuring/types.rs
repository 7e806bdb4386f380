use chrono::NaiveDate;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::models::enums::{RiskLevel, TrendLabel};

/// Structured analysis returned by the inference service.
///
/// Built leniently from the repaired JSON object: every field has a default,
/// so missing or mistyped top-level fields never reject the whole response.
/// Measurement lists stay as raw JSON; each entry is validated on its own
/// when rows are built.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisPayload {
    pub document_summary: String,
    pub patient_summary: String,
    pub lab_tests: Vec<Value>,
    pub other_measurements: Vec<Value>,
    pub elements: Vec<Value>,
    pub chemicals: Vec<Value>,
    pub metals: Vec<Value>,
    pub notes: Vec<String>,
    pub impressions: Vec<String>,
    pub recommendations: Vec<String>,
    pub risk_level: RiskLevel,
    pub risk_factors: Vec<String>,
    pub chart_series: Vec<Value>,
    /// The full object as received, persisted verbatim.
    pub raw: Value,
}

impl AnalysisPayload {
    pub fn from_object(object: Map<String, Value>) -> Self {
        let risk = object.get("risk_assessment");
        let risk_level = risk
            .and_then(|r| match r {
                Value::String(s) => Some(s.as_str()),
                Value::Object(o) => o
                    .get("overall_risk")
                    .or_else(|| o.get("level"))
                    .and_then(Value::as_str),
                _ => None,
            })
            .map(RiskLevel::from_label)
            .unwrap_or_default();
        let risk_factors = risk
            .and_then(|r| r.get("factors"))
            .map(string_list)
            .unwrap_or_default();

        Self {
            document_summary: string_field(&object, "document_summary"),
            patient_summary: string_field(&object, "patient_summary"),
            lab_tests: array_field(&object, "lab_tests"),
            other_measurements: array_field(&object, "other_measurements"),
            elements: array_field(&object, "elements"),
            chemicals: array_field(&object, "chemicals"),
            metals: array_field(&object, "metals"),
            notes: object.get("notes").map(string_list).unwrap_or_default(),
            impressions: object.get("impressions").map(string_list).unwrap_or_default(),
            recommendations: object
                .get("recommendations")
                .map(string_list)
                .unwrap_or_default(),
            risk_level,
            risk_factors,
            chart_series: array_field(&object, "chart_series"),
            raw: Value::Object(object),
        }
    }

    /// Summary stored on the analysis row: the clinical summary, else the
    /// patient-facing one.
    pub fn summary(&self) -> &str {
        if self.document_summary.trim().is_empty() {
            &self.patient_summary
        } else {
            &self.document_summary
        }
    }

    /// Entries that become measurement rows: lab tests first, then other measurements.
    pub fn measurement_entries(&self) -> impl Iterator<Item = &Value> {
        self.lab_tests.iter().chain(self.other_measurements.iter())
    }
}

fn string_field(object: &Map<String, Value>, key: &str) -> String {
    match object.get(key) {
        Some(Value::String(s)) => s.trim().to_string(),
        Some(Value::Number(n)) => n.to_string(),
        _ => String::new(),
    }
}

fn array_field(object: &Map<String, Value>, key: &str) -> Vec<Value> {
    match object.get(key) {
        Some(Value::Array(items)) => items.clone(),
        _ => Vec::new(),
    }
}

/// A list of strings, or a single string, or nothing.
fn string_list(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => vec![s.trim().to_string()],
        Value::Array(items) => items
            .iter()
            .filter_map(|v| match v {
                Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
                Value::Object(o) => o
                    .get("text")
                    .or_else(|| o.get("description"))
                    .and_then(Value::as_str)
                    .map(str::to_string),
                _ => None,
            })
            .collect(),
        _ => Vec::new(),
    }
}

/// One validated lab-test or measurement entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MeasurementEntry {
    pub name: String,
    pub category: Option<String>,
    pub value: f64,
    pub unit: Option<String>,
    pub reference_range: Option<String>,
    pub is_abnormal: bool,
    pub date: Option<NaiveDate>,
    pub trend: TrendLabel,
    /// Whether the service suggested plotting this value.
    pub chartable: bool,
}

/// Why an entry did not become a measurement.
#[derive(Debug, Clone, PartialEq)]
pub enum EntryRejection {
    /// No value at all (null, missing, empty string).
    NullValue,
    /// Present but unusable: missing name, non-numeric value, bad date.
    Malformed(String),
}

impl MeasurementEntry {
    pub fn from_value(entry: &Value) -> Result<Self, EntryRejection> {
        let object = entry
            .as_object()
            .ok_or_else(|| EntryRejection::Malformed("entry is not an object".into()))?;

        let name = ["name", "test_name", "test"]
            .iter()
            .find_map(|k| object.get(*k).and_then(Value::as_str))
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .ok_or_else(|| EntryRejection::Malformed("missing name".into()))?
            .to_string();

        let value = match object.get("value") {
            None | Some(Value::Null) => return Err(EntryRejection::NullValue),
            Some(Value::Number(n)) => n
                .as_f64()
                .ok_or_else(|| EntryRejection::Malformed("value out of range".into()))?,
            Some(Value::String(s)) if s.trim().is_empty() => {
                return Err(EntryRejection::NullValue)
            }
            Some(Value::String(s)) => parse_numeric(s).ok_or_else(|| {
                EntryRejection::Malformed(format!("non-numeric value for {name}"))
            })?,
            Some(_) => {
                return Err(EntryRejection::Malformed(format!(
                    "unsupported value type for {name}"
                )))
            }
        };
        if !value.is_finite() {
            return Err(EntryRejection::Malformed(format!("non-finite value for {name}")));
        }

        let date = match ["date", "observed_on", "collection_date"]
            .iter()
            .find_map(|k| object.get(*k))
        {
            None | Some(Value::Null) => None,
            Some(Value::String(s)) if is_absent_marker(s) => None,
            Some(Value::String(s)) => Some(parse_observation_date(s).ok_or_else(|| {
                EntryRejection::Malformed(format!("unparseable date for {name}"))
            })?),
            Some(_) => {
                return Err(EntryRejection::Malformed(format!("invalid date type for {name}")))
            }
        };

        Ok(Self {
            category: optional_text(object.get("category")),
            unit: optional_text(object.get("unit")),
            reference_range: reference_range(object),
            is_abnormal: abnormal_flag(object),
            trend: object
                .get("trend")
                .and_then(Value::as_str)
                .map(TrendLabel::from_label)
                .unwrap_or(TrendLabel::Unknown),
            chartable: object
                .get("chartable")
                .or_else(|| object.get("graphable"))
                .and_then(Value::as_bool)
                .unwrap_or(true),
            name,
            value,
            date,
        })
    }
}

fn is_absent_marker(s: &str) -> bool {
    matches!(
        s.trim().to_lowercase().as_str(),
        "" | "null" | "none" | "n/a" | "unknown" | "not_found"
    )
}

fn optional_text(value: Option<&Value>) -> Option<String> {
    match value? {
        Value::String(s) if !is_absent_marker(s) => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Reference range as free text. Accepts a string, or separate low/high bounds.
fn reference_range(object: &Map<String, Value>) -> Option<String> {
    if let Some(text) = optional_text(object.get("reference_range")) {
        return Some(text);
    }
    let low = optional_text(object.get("reference_range_low"));
    let high = optional_text(object.get("reference_range_high"));
    match (low, high) {
        (Some(l), Some(h)) => Some(format!("{l}-{h}")),
        (Some(l), None) => Some(format!(">={l}")),
        (None, Some(h)) => Some(format!("<={h}")),
        (None, None) => None,
    }
}

fn abnormal_flag(object: &Map<String, Value>) -> bool {
    match object.get("is_abnormal").or_else(|| object.get("abnormal")) {
        Some(Value::Bool(b)) => *b,
        Some(Value::String(s)) => matches!(
            s.trim().to_lowercase().as_str(),
            "true" | "yes" | "abnormal" | "high" | "low" | "critical" | "critical_high"
                | "critical_low"
        ),
        _ => false,
    }
}

/// Parse a numeric value that may arrive as text: `"5.4"`, `"1,200"`, `"13,5"`.
pub fn parse_numeric(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let normalized = match (trimmed.contains(','), trimmed.contains('.')) {
        // "1,234.5": commas are grouping
        (true, true) => trimmed.replace(',', ""),
        (true, false) => {
            let is_grouping = trimmed
                .split(',')
                .skip(1)
                .all(|group| group.len() == 3 && group.chars().all(|c| c.is_ascii_digit()));
            if is_grouping {
                trimmed.replace(',', "")
            } else {
                // Decimal comma
                trimmed.replacen(',', ".", 1)
            }
        }
        _ => trimmed.to_string(),
    };
    normalized.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Parse an observation date as returned by the service.
/// Accepts ISO (optionally with a time part), DD/MM/YYYY, DD-MM-YYYY and MM/DD/YYYY.
pub fn parse_observation_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    // ISO 8601, possibly followed by a time component
    let date_part = trimmed.split(['T', ' ']).next().unwrap_or(trimmed);
    if let Ok(d) = NaiveDate::parse_from_str(date_part, "%Y-%m-%d") {
        return Some(d);
    }
    // Day-first is tried before month-first: reports are mostly non-US
    ["%d/%m/%Y", "%d-%m-%Y", "%d.%m.%Y", "%m/%d/%Y"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(trimmed, fmt).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn payload(v: Value) -> AnalysisPayload {
        match v {
            Value::Object(o) => AnalysisPayload::from_object(o),
            _ => panic!("test payload must be an object"),
        }
    }

    #[test]
    fn empty_object_uses_defaults() {
        let p = payload(json!({}));
        assert_eq!(p.document_summary, "");
        assert!(p.lab_tests.is_empty());
        assert_eq!(p.risk_level, RiskLevel::Unknown);
    }

    #[test]
    fn mistyped_fields_fall_back_to_defaults() {
        let p = payload(json!({
            "document_summary": null,
            "lab_tests": "none",
            "recommendations": "Repeat in 3 months",
            "risk_assessment": {"overall_risk": "Moderate", "factors": ["LDL above range"]}
        }));
        assert_eq!(p.document_summary, "");
        assert!(p.lab_tests.is_empty());
        assert_eq!(p.recommendations, vec!["Repeat in 3 months"]);
        assert_eq!(p.risk_level, RiskLevel::Moderate);
        assert_eq!(p.risk_factors, vec!["LDL above range"]);
    }

    #[test]
    fn summary_falls_back_to_patient_summary() {
        let p = payload(json!({"patient_summary": "Your results look normal."}));
        assert_eq!(p.summary(), "Your results look normal.");
    }

    #[test]
    fn full_entry_parses() {
        let entry = MeasurementEntry::from_value(&json!({
            "name": "LDL Cholesterol",
            "category": "Lipids",
            "value": 162,
            "unit": "mg/dL",
            "reference_range": "<130",
            "is_abnormal": true,
            "date": "2024-03-02",
            "trend": "worsening",
            "chartable": true
        }))
        .unwrap();
        assert_eq!(entry.name, "LDL Cholesterol");
        assert_eq!(entry.value, 162.0);
        assert!(entry.is_abnormal);
        assert_eq!(entry.date, NaiveDate::from_ymd_opt(2024, 3, 2));
        assert_eq!(entry.trend, TrendLabel::Declining);
    }

    #[test]
    fn numeric_strings_are_accepted() {
        let entry =
            MeasurementEntry::from_value(&json!({"name": "Platelets", "value": "1,200"})).unwrap();
        assert_eq!(entry.value, 1200.0);
        assert_eq!(entry.trend, TrendLabel::Unknown);
    }

    #[test]
    fn null_value_is_not_zero() {
        assert_eq!(
            MeasurementEntry::from_value(&json!({"name": "Glucose", "value": null})),
            Err(EntryRejection::NullValue)
        );
        assert_eq!(
            MeasurementEntry::from_value(&json!({"name": "Glucose"})),
            Err(EntryRejection::NullValue)
        );
    }

    #[test]
    fn malformed_entries_are_rejected() {
        let cases = [
            json!({"value": 5.4}),
            json!({"name": "  ", "value": 5.4}),
            json!({"name": "Nitrites", "value": "negative"}),
            json!({"name": "Glucose", "value": [5.4]}),
            json!({"name": "Glucose", "value": 5.4, "date": "last spring"}),
            json!("Glucose 5.4"),
        ];
        for case in cases {
            assert!(
                matches!(MeasurementEntry::from_value(&case), Err(EntryRejection::Malformed(_))),
                "expected malformed: {case}"
            );
        }
    }

    #[test]
    fn reference_range_from_bounds() {
        let entry = MeasurementEntry::from_value(&json!({
            "test_name": "TSH", "value": 2.1,
            "reference_range_low": 0.4, "reference_range_high": 4.0
        }))
        .unwrap();
        assert_eq!(entry.reference_range.as_deref(), Some("0.4-4.0"));
    }

    #[test]
    fn abnormal_flag_from_text() {
        let entry = MeasurementEntry::from_value(&json!({
            "name": "Potassium", "value": 5.9, "abnormal": "HIGH"
        }))
        .unwrap();
        assert!(entry.is_abnormal);
    }

    #[test]
    fn parse_numeric_variants() {
        assert_eq!(parse_numeric("5.4"), Some(5.4));
        assert_eq!(parse_numeric(" 1,234.5 "), Some(1234.5));
        assert_eq!(parse_numeric("13,5"), Some(13.5));
        assert_eq!(parse_numeric("-0.2"), Some(-0.2));
        assert_eq!(parse_numeric("positive"), None);
        assert_eq!(parse_numeric("NaN"), None);
    }

    #[test]
    fn parse_date_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15);
        assert_eq!(parse_observation_date("2024-01-15"), expected);
        assert_eq!(parse_observation_date("2024-01-15T08:30:00Z"), expected);
        assert_eq!(parse_observation_date("15/01/2024"), expected);
        assert_eq!(parse_observation_date("15-01-2024"), expected);
        assert_eq!(parse_observation_date("15.01.2024"), expected);
        assert_eq!(parse_observation_date("01/15/2024"), expected);
        assert_eq!(parse_observation_date("2024-13-45"), None);
        assert_eq!(parse_observation_date(""), None);
    }
}
