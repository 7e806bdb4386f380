pub mod types;
pub mod prompt;
pub mod parser;
pub mod sanitize;
pub mod ollama;
pub mod orchestrator;

pub use types::*;
pub use prompt::*;
pub use parser::*;
pub use sanitize::*;
pub use ollama::*;
pub use orchestrator::*;

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum StructuringError {
    #[error("Inference service unreachable at {0}")]
    Connection(String),

    #[error("Inference service returned error (status {status}): {body}")]
    Service { status: u16, body: String },

    #[error("Inference request timed out after {0}s")]
    Timeout(u64),

    #[error("HTTP client error: {0}")]
    HttpClient(String),

    #[error("Malformed inference response: {0}")]
    MalformedResponse(String),
}

impl StructuringError {
    /// Transport-level failures worth another attempt. Timeouts are excluded:
    /// a model that ran out of time once will do so again.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Connection(_) | Self::HttpClient(_) => true,
            Self::Service { status, .. } => *status >= 500,
            Self::Timeout(_) | Self::MalformedResponse(_) => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn retry_policy() {
        assert!(StructuringError::Connection("http://localhost:11434".into()).is_retryable());
        assert!(StructuringError::Service { status: 503, body: String::new() }.is_retryable());
        assert!(!StructuringError::Service { status: 404, body: String::new() }.is_retryable());
        assert!(!StructuringError::Timeout(120).is_retryable());
        assert!(!StructuringError::MalformedResponse("x".into()).is_retryable());
    }
}
