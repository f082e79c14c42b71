use thiserror::Error;

/// Result alias used across the engine.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors surfaced by engine construction and inference.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EngineError {
    /// The rule base or a variable definition is internally inconsistent.
    #[error("configuration error: {0}")]
    Configuration(String),
    /// Every rule evaluated to zero for the given inputs.
    #[error("no rule fired for the given inputs; the aggregated output is empty")]
    NoRuleFired,
    /// Positional inference received the wrong number of crisp values.
    #[error("expected {expected} crisp inputs, got {got}")]
    InputArity {
        /// Number of input variables on the engine.
        expected: usize,
        /// Number of values supplied.
        got: usize,
    },
    /// A caller-supplied output profile does not match its universe or holds
    /// degrees outside `[0, 1]`.
    #[error("invalid output profile: {0}")]
    InvalidProfile(String),
}

impl EngineError {
    /// Shorthand for a configuration failure.
    pub(crate) fn config(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Whether this is a build-time configuration failure.
    #[must_use]
    pub const fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }
}
