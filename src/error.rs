//! Error types for the financial query router

use thiserror::Error;

/// Result type alias for router operations
pub type Result<T> = std::result::Result<T, RouterError>;

#[derive(Error, Debug)]
pub enum RouterError {

    // =============================
    // Validation Errors
    // =============================

    #[error("Could not extract required field(s): {}", missing.join(", "))]
    Extraction { capability: String, missing: Vec<String> },

    #[error("Invalid arguments for {capability}: {reason}")]
    Validation { capability: String, reason: String },

    // =============================
    // Registry Errors
    // =============================

    #[error("Capability already registered: {0}")]
    DuplicateCapability(String),

    #[error("Unknown capability: {0}")]
    UnknownCapability(String),

    // =============================
    // Capability Errors
    // =============================

    #[error("Retrieval index unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Unknown ticker: {0}")]
    UnknownTicker(String),

    #[error("Market data provider unavailable: {0}")]
    ProviderUnavailable(String),

    #[error("Market data provider rate limited the request: {0}")]
    RateLimited(String),

    #[error("{capability} did not respond within {timeout_ms} ms")]
    InvocationTimeout { capability: String, timeout_ms: u64 },

    // =============================
    // Calculation Errors
    // =============================

    #[error("Division by zero: {0}")]
    DivisionByZero(String),

    #[error("Invalid argument '{param}': {reason}")]
    InvalidArgument { param: String, reason: String },

    #[error("No convergence: {0}")]
    NoConvergence(String),

    // =============================
    // Routing Errors
    // =============================

    #[error("Malformed decision output: {0}")]
    RoutingFormat(String),

    #[error("Step budget of {0} action steps exceeded")]
    BudgetExceeded(usize),

    #[error("LLM error: {0}")]
    Llm(String),

    #[error("Configuration error: {0}")]
    Config(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Pattern error: {0}")]
    Pattern(#[from] regex::Error),
}

impl RouterError {
    pub(crate) fn invalid(param: &str, reason: impl Into<String>) -> Self {
        RouterError::InvalidArgument {
            param: param.to_string(),
            reason: reason.into(),
        }
    }

    /// Only rate limiting is worth retrying inside a single invocation.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RouterError::RateLimited(_))
    }

    /// Reason text suitable for an Observation or a user-facing answer.
    pub fn user_message(&self) -> String {
        match self {
            RouterError::Extraction { capability, missing } => format!(
                "the request did not state the {} needed for {}",
                missing.join(" and "),
                capability
            ),
            RouterError::Validation { reason, .. } => reason.clone(),
            RouterError::UnknownCapability(name) => {
                format!("there is no capability named '{}'", name)
            }
            RouterError::RetrievalUnavailable(_) => {
                "the knowledge base could not be reached".to_string()
            }
            RouterError::UnknownTicker(ticker) => {
                format!("no market data exists for ticker '{}'", ticker)
            }
            RouterError::ProviderUnavailable(_) => {
                "the market data service is currently unavailable".to_string()
            }
            RouterError::RateLimited(_) => {
                "the market data service is rate limiting requests".to_string()
            }
            RouterError::InvocationTimeout { capability, .. } => {
                format!("{} took too long to respond", capability)
            }
            RouterError::DivisionByZero(what) => {
                format!("the calculation would divide by zero ({})", what)
            }
            RouterError::InvalidArgument { param, reason } => {
                format!("the value for {} is not usable: {}", param, reason)
            }
            RouterError::NoConvergence(reason) => {
                format!("no rate could be found that balances the cash flows ({})", reason)
            }
            RouterError::RoutingFormat(_) => {
                "the reasoning step produced an unreadable decision".to_string()
            }
            RouterError::BudgetExceeded(steps) => {
                format!("the question needed more than {} lookups", steps)
            }
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_rate_limit_is_retryable() {
        assert!(RouterError::RateLimited("429".into()).is_retryable());
        assert!(!RouterError::ProviderUnavailable("down".into()).is_retryable());
        assert!(!RouterError::UnknownTicker("ZZZZ".into()).is_retryable());
    }

    #[test]
    fn test_extraction_message_names_fields() {
        let err = RouterError::Extraction {
            capability: "roi".into(),
            missing: vec!["initial".into(), "final".into()],
        };
        assert!(err.to_string().contains("initial, final"));
        assert!(err.user_message().contains("initial and final"));
    }
}
