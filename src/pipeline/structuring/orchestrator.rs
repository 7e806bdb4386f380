use std::sync::Arc;

use uuid::Uuid;

use super::ollama::InferenceClient;
use super::parser::parse_analysis_response;
use super::prompt::build_analysis_prompt;
use super::sanitize::{sanitize_for_llm, truncate_chars};
use super::types::AnalysisPayload;
use super::StructuringError;
use crate::config::MAX_PROMPT_CHARS;
use crate::models::Measurement;

/// Orchestrates one structured extraction:
/// truncate → sanitize → prompt → inference (with transport retries) → repair/parse
pub struct StructuredExtractor {
    client: Arc<dyn InferenceClient>,
    retries: u32,
}

impl StructuredExtractor {
    pub fn new(client: Arc<dyn InferenceClient>, retries: u32) -> Self {
        Self { client, retries }
    }

    pub async fn extract(
        &self,
        record_id: &Uuid,
        raw_text: &str,
        history: &[Measurement],
    ) -> Result<AnalysisPayload, StructuringError> {
        let text = sanitize_for_llm(truncate_chars(raw_text, MAX_PROMPT_CHARS), Some(record_id));
        let prompt = build_analysis_prompt(&text, history);

        tracing::debug!(
            record_id = %record_id,
            prompt_chars = prompt.chars().count(),
            history = history.len(),
            "Requesting structured analysis"
        );

        let response = self.infer_with_retry(record_id, &prompt).await?;
        let payload = parse_analysis_response(&response).inspect_err(|e| {
            tracing::warn!(record_id = %record_id, error = %e, "Unusable inference response");
        })?;

        tracing::info!(
            record_id = %record_id,
            lab_tests = payload.lab_tests.len(),
            other_measurements = payload.other_measurements.len(),
            "Structured analysis received"
        );
        Ok(payload)
    }

    /// Malformed responses are not retried: they are surfaced to the caller as-is.
    async fn infer_with_retry(
        &self,
        record_id: &Uuid,
        prompt: &str,
    ) -> Result<String, StructuringError> {
        let mut attempt = 0;
        loop {
            match self.client.infer(prompt).await {
                Ok(response) => return Ok(response),
                Err(e) if e.is_retryable() && attempt < self.retries => {
                    attempt += 1;
                    tracing::warn!(
                        record_id = %record_id,
                        attempt,
                        error = %e,
                        "Inference call failed, retrying"
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }
}
