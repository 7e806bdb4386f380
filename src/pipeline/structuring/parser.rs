use serde_json::Value;

use super::types::AnalysisPayload;
use super::StructuringError;

/// Locate the JSON object inside a model response: everything from the first
/// `{` to the last `}`. Chatter before or after the object is discarded.
pub fn repair_json_object(response: &str) -> Option<&str> {
    let start = response.find('{')?;
    let end = response.rfind('}')?;
    (end > start).then(|| &response[start..=end])
}

/// Parse the inference service response into an analysis payload.
pub fn parse_analysis_response(response: &str) -> Result<AnalysisPayload, StructuringError> {
    let json_str = repair_json_object(response)
        .ok_or_else(|| StructuringError::MalformedResponse("No JSON object found".into()))?;

    match serde_json::from_str::<Value>(json_str) {
        Ok(Value::Object(object)) => Ok(AnalysisPayload::from_object(object)),
        Ok(_) => Err(StructuringError::MalformedResponse(
            "Response is not a JSON object".into(),
        )),
        Err(e) => Err(StructuringError::MalformedResponse(format!(
            "JSON parsing error: {e}"
        ))),
    }
}
