//! User-visible notices raised by recoverable conditions.
//!
//! Track conflicts and similar rejections never interrupt input handling.
//! The session records them here and the host drains them to show a toast.

use serde::{Deserialize, Serialize};

/// Stable machine-readable code for an error variant.
pub trait ErrorCode {
    fn error_code(&self) -> &'static str;
}

/// Severity of a notice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    Warning,
}

/// A message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notice {
    pub level: Level,
    pub code: String,
    pub message: String,
}

impl Notice {
    /// Warning-level notice built from an error.
    pub fn warning<E>(err: &E) -> Self
    where
        E: ErrorCode + std::fmt::Display,
    {
        Self { level: Level::Warning, code: err.error_code().to_string(), message: err.to_string() }
    }
}
