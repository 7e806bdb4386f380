use serde_json::json;

use crate::models::Measurement;

pub const ANALYSIS_SYSTEM_PROMPT: &str = r#"
You are a medical laboratory report analysis assistant. You read the text of a
medical document and return a single JSON object describing it.

RULES:
1. Output ONLY one JSON object. No prose before or after it.
2. Extract values exactly as written in the document. Never invent results.
3. Use null for anything that is not present.
4. Numeric values must be JSON numbers, without units.
5. Dates use the format YYYY-MM-DD.
6. Trend labels compare a value with the PRIOR MEASUREMENTS provided, using one of
   improving | declining | stable | unknown.
"#;

const RESPONSE_SCHEMA: &str = r#"{
  "document_summary": "clinical summary of the document",
  "patient_summary": "plain-language summary for the patient",
  "lab_tests": [
    {
      "name": "test name",
      "category": "Hematology | Chemistry | Lipids | Thyroid | Diabetes | Liver | Kidney | Other",
      "value": 0.0,
      "unit": "unit or null",
      "reference_range": "e.g. 3.9-5.6 or null",
      "is_abnormal": false,
      "date": "YYYY-MM-DD or null",
      "trend": "improving | declining | stable | unknown",
      "chartable": true
    }
  ],
  "other_measurements": [ { "same fields as lab_tests": "" } ],
  "elements": [ { "name": "element", "value": 0.0, "unit": "unit or null" } ],
  "chemicals": [ { "name": "chemical", "value": 0.0, "unit": "unit or null" } ],
  "metals": [ { "name": "metal", "value": 0.0, "unit": "unit or null" } ],
  "notes": ["note"],
  "impressions": ["impression"],
  "recommendations": ["recommendation"],
  "risk_assessment": { "overall_risk": "low | moderate | high", "factors": ["factor"] },
  "chart_series": [ { "name": "series name", "measurements": ["test name"] } ]
}"#;

/// Build the analysis prompt: schema instructions, the document text, then
/// prior measurements of the same owner as trend context.
pub fn build_analysis_prompt(document_text: &str, history: &[Measurement]) -> String {
    let history_block = if history.is_empty() {
        "none".to_string()
    } else {
        history
            .iter()
            .map(|m| {
                json!({
                    "name": m.name,
                    "value": m.value,
                    "unit": m.unit,
                    "date": m.effective_date().to_string(),
                    "is_abnormal": m.is_abnormal,
                })
                .to_string()
            })
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        r#"Analyze the medical document below and answer with a JSON object of this shape:

{RESPONSE_SCHEMA}

<document>
{document_text}
</document>

PRIOR MEASUREMENTS (one JSON object per line, most recent first):
{history_block}
"#
    )
}
