//! Error types for cachedprop

use std::fmt;

/// Result type alias for accessor operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised when an accessor lacks the capability an operation needs.
///
/// Each variant carries the label of the offending accessor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// Read attempted with no compute function bound
    Unreadable(&'static str),

    /// Write attempted with no write function bound
    Unwritable(&'static str),

    /// Remove attempted with no remove function bound
    Undeletable(&'static str),
}

impl Error {
    /// Label of the accessor that raised the error
    pub fn label(&self) -> &'static str {
        match self {
            Error::Unreadable(label) | Error::Unwritable(label) | Error::Undeletable(label) => label,
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Unreadable(label) => write!(f, "Unreadable attribute: {}", label),
            Error::Unwritable(label) => write!(f, "Can't set attribute: {}", label),
            Error::Undeletable(label) => write!(f, "Can't delete attribute: {}", label),
        }
    }
}

impl std::error::Error for Error {}
