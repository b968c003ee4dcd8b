//! Error types for AhaTutor

use thiserror::Error;

/// Result type alias using AhaTutor's Error
pub type Result<T> = std::result::Result<T, Error>;

/// AhaTutor error types with helpful messages and suggestions
#[derive(Error, Debug)]
pub enum Error {
    // Knowledge errors (E001-E099)
    #[error("Knowledge store error: {0}")]
    KnowledgeStore(String),

    // Network errors (E100-E199)
    #[error("Network error: {0}. Check your internet connection.")]
    NetworkError(#[from] reqwest::Error),

    #[error("LLM API error: {0}. Check that AHATUTOR_API_KEY or OPENROUTER_API_KEY is set.")]
    LLMError(String),

    #[error("Rate limited. Waiting {0} seconds before retry.")]
    RateLimited(u64),

    #[error("No suitable model: {0}")]
    NoSuitableModel(String),

    // Decoding errors (E200-E299)
    #[error("Failed to parse structured response: {0}")]
    Parse(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    // Pipeline errors (E300-E399)
    #[error("Pipeline stage '{stage}' failed after {elapsed_ms}ms: {source}")]
    StageFailed {
        stage: &'static str,
        elapsed_ms: u64,
        #[source]
        source: Box<Error>,
    },

    #[error("Enrichment failed for '{concept}': {source}")]
    EnrichmentFailed {
        concept: String,
        #[source]
        source: Box<Error>,
    },

    // Config errors (E600-E699)
    #[error("Configuration error: {0}")]
    ConfigError(String),

    // Input errors (E800-E899)
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Get error code for this error type
    pub fn code(&self) -> &'static str {
        match self {
            Self::KnowledgeStore(_) => "E001",
            Self::NetworkError(_) => "E100",
            Self::LLMError(_) => "E101",
            Self::RateLimited(_) => "E102",
            Self::NoSuitableModel(_) => "E103",
            Self::Parse(_) => "E200",
            Self::Json(_) => "E201",
            Self::StageFailed { .. } => "E300",
            Self::EnrichmentFailed { .. } => "E301",
            Self::ConfigError(_) => "E600",
            Self::InvalidInput(_) => "E800",
            Self::Io(_) => "E9999",
        }
    }

    /// Get suggestion for how to fix this error
    pub fn suggestion(&self) -> Option<String> {
        match self {
            Self::NetworkError(_) => Some("Check internet connection".to_string()),
            Self::LLMError(_) => Some("export AHATUTOR_API_KEY=<key>".to_string()),
            Self::RateLimited(secs) => Some(format!("Retry in {} seconds", secs)),
            Self::ConfigError(_) => Some("ahatutor config list".to_string()),
            Self::StageFailed { source, .. } | Self::EnrichmentFailed { source, .. } => {
                source.suggestion()
            }
            _ => None,
        }
    }

    /// Whether the generative service might succeed if asked again
    pub fn is_transient(&self) -> bool {
        match self {
            Self::NetworkError(_) | Self::RateLimited(_) => true,
            Self::StageFailed { source, .. } | Self::EnrichmentFailed { source, .. } => {
                source.is_transient()
            }
            _ => false,
        }
    }

    /// Wrap an error as the failure of a named pipeline stage
    pub fn stage(stage: &'static str, elapsed_ms: u64, source: Error) -> Self {
        Self::StageFailed {
            stage,
            elapsed_ms,
            source: Box::new(source),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        assert_eq!(Error::KnowledgeStore("x".into()).code(), "E001");
        assert_eq!(Error::LLMError("x".into()).code(), "E101");
        assert_eq!(Error::Parse("x".into()).code(), "E200");
        assert_eq!(Error::InvalidInput("x".into()).code(), "E800");
        assert_eq!(Error::from(std::io::Error::other("x")).code(), "E9999");
    }

    #[test]
    fn test_stage_failed_display() {
        let err = Error::stage("visual_design", 1234, Error::LLMError("boom".into()));
        let msg = err.to_string();
        assert!(msg.contains("visual_design"));
        assert!(msg.contains("1234ms"));
        assert!(msg.contains("boom"));
        assert_eq!(err.code(), "E300");
    }

    #[test]
    fn test_suggestion_follows_source() {
        let err = Error::stage("analysis", 10, Error::LLMError("no key".into()));
        assert_eq!(err.suggestion(), Some("export AHATUTOR_API_KEY=<key>".to_string()));
        assert!(Error::InvalidInput("x".into()).suggestion().is_none());
    }

    #[test]
    fn test_is_transient() {
        assert!(Error::RateLimited(5).is_transient());
        assert!(!Error::Parse("bad".into()).is_transient());
        let wrapped = Error::EnrichmentFailed {
            concept: "gene".into(),
            source: Box::new(Error::RateLimited(1)),
        };
        assert!(wrapped.is_transient());
    }
}
