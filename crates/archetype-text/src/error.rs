//! Error types for archetype-text.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, TextError>;

#[derive(Debug, Error)]
pub enum TextError {
    /// The text does not follow the line/indentation grammar.
    #[error("line {line}: {reason}")]
    Syntax { line: usize, reason: String },
    /// Well-formed text that does not describe a valid asset delta.
    #[error("line {line}: malformed delta: {reason}")]
    Malformed { line: usize, reason: String },
    #[error(transparent)]
    Core(#[from] archetype_core::Error),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid settings: {0}")]
    Settings(#[from] toml::de::Error),
}

impl TextError {
    pub(crate) fn syntax(line: usize, reason: impl Into<String>) -> Self {
        TextError::Syntax { line, reason: reason.into() }
    }

    pub(crate) fn malformed(line: usize, reason: impl Into<String>) -> Self {
        TextError::Malformed { line, reason: reason.into() }
    }

    /// `true` for inputs that parse but cannot be loaded as a delta.
    pub fn is_malformed_delta(&self) -> bool {
        matches!(
            self,
            TextError::Malformed { .. } | TextError::Core(archetype_core::Error::MalformedDelta(_))
        )
    }
}
