use thiserror::Error;

use crate::common::error::BenchError::GenericError;
use crate::common::process::ToolError;

fn render_list(items: &[String]) -> String {
    items
        .iter()
        .map(|item| format!("\n  {item}"))
        .collect::<String>()
}

#[derive(Debug, Error)]
pub enum BenchError {
    #[error(transparent)]
    IoError(#[from] std::io::Error),
    #[error("no {what} matches your selection; available:{}", render_list(available))]
    NotFoundError {
        what: String,
        available: Vec<String>,
    },
    #[error(
        "multiple {what} match your selection, please be more specific:{}",
        render_list(candidates)
    )]
    AmbiguousError {
        what: String,
        candidates: Vec<String>,
    },
    #[error(transparent)]
    ToolError(#[from] ToolError),
    #[error("Configuration error: {0}")]
    ConfigError(String),
    #[error(
        "the following overrides do not match any existing parameter:{}",
        render_list(&unconsumed.iter().map(|(k, v)| format!("{k}={v}")).collect::<Vec<_>>())
    )]
    OverrideError { unconsumed: Vec<(String, String)> },
    #[error("Error: {0}")]
    GenericError(String),
}

impl BenchError {
    /// "Not found" is user-correctable; the error enumerates what is
    /// available so the user can narrow or fix their request.
    pub fn not_found(what: impl Into<String>, available: Vec<String>) -> BenchError {
        BenchError::NotFoundError {
            what: what.into(),
            available,
        }
    }

    /// Ambiguity always surfaces the full candidate list.
    pub fn ambiguous(what: impl Into<String>, candidates: Vec<String>) -> BenchError {
        BenchError::AmbiguousError {
            what: what.into(),
            candidates,
        }
    }
}

impl From<anyhow::Error> for BenchError {
    fn from(error: anyhow::Error) -> Self {
        Self::GenericError(error.to_string())
    }
}

impl From<String> for BenchError {
    fn from(e: String) -> Self {
        GenericError(e)
    }
}

pub fn error<T>(message: String) -> crate::Result<T> {
    Err(GenericError(message))
}

pub fn config_error<T>(message: String) -> crate::Result<T> {
    Err(BenchError::ConfigError(message))
}

#[cfg(test)]
mod test {
    use super::BenchError;

    #[test]
    fn test_ambiguous_lists_candidates() {
        let error = BenchError::ambiguous(
            "installed applications",
            vec!["a/openfoam/v2012".to_string(), "b/openfoam/v2112".to_string()],
        );
        let message = error.to_string();
        assert!(message.contains("a/openfoam/v2012"));
        assert!(message.contains("b/openfoam/v2112"));
    }
}
