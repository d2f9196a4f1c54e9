//! Error taxonomy for flow loading and turn processing
//!
//! Only [`ConfigurationError`] halts startup. Everything raised while a turn
//! is running is recovered inside the engine and routed to a failure state;
//! [`DialogError`] is reserved for callers that break the session contract.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// A single problem found while loading a flow, located by field path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigIssue {
    /// Dotted path into the flow document, e.g. `states.pay.transitions[1].target`
    pub path: String,
    pub message: String,
}

impl ConfigIssue {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigIssue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.path, self.message)
    }
}

/// Malformed or unloadable flow definition, or an unregistered capability name
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Failed to read flow file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed flow JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid flow definition ({} issue(s)):\n{}", .0.len(), render_issues(.0))]
    Invalid(Vec<ConfigIssue>),

    #[error("Unknown state: {0}")]
    UnknownState(String),
}

impl ConfigurationError {
    /// Issues carried by an `Invalid` error (empty for other variants)
    pub fn issues(&self) -> &[ConfigIssue] {
        match self {
            ConfigurationError::Invalid(issues) => issues,
            _ => &[],
        }
    }
}

fn render_issues(issues: &[ConfigIssue]) -> String {
    issues
        .iter()
        .map(|issue| format!("  - {issue}"))
        .collect::<Vec<_>>()
        .join("\n")
}

/// A validator, enricher, action, condition, or NLU call that failed
#[derive(Debug, Clone, Error)]
#[error("Capability `{capability}` failed: {message}")]
pub struct CapabilityError {
    pub capability: String,
    pub message: String,
}

impl CapabilityError {
    pub fn new(capability: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            capability: capability.into(),
            message: message.into(),
        }
    }
}

/// Runtime resolution failures; recovered by routing to the failure state
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ResolveError {
    #[error("Action state `{state}` has no transition for result `{result}`")]
    UnhandledActionResult { state: String, result: String },

    #[error("Action chain exceeded {limit} consecutive action states (last: `{state}`)")]
    TransitionLoop { state: String, limit: usize },

    #[error("State `{state}` is not an action state")]
    NotAnActionState { state: String },
}

/// Errors surfaced to the caller of `DialogEngine::process_turn`
#[derive(Debug, Error)]
pub enum DialogError {
    #[error("Session is in terminal state `{state}`; reset it before sending more input")]
    SessionEnded { state: String },

    #[error("Session references unknown state `{0}`")]
    UnknownState(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_invalid_error_lists_every_issue() {
        let err = ConfigurationError::Invalid(vec![
            ConfigIssue::new("settings.start_state", "references undefined state `nowhere`"),
            ConfigIssue::new("states.a.transitions[0].target", "references undefined state `b`"),
        ]);
        let text = err.to_string();
        assert!(text.contains("2 issue(s)"));
        assert!(text.contains("settings.start_state: references undefined state `nowhere`"));
        assert!(text.contains("states.a.transitions[0].target"));
        assert_eq!(err.issues().len(), 2);
    }

    #[test]
    fn test_capability_error_display() {
        let err = CapabilityError::new("validate_positive", "not a number");
        assert_eq!(
            err.to_string(),
            "Capability `validate_positive` failed: not a number"
        );
    }
}
