//! Error types
//!
//! Library-level error kinds. Step results themselves are `anyhow::Result`
//! so any step implementation can report whatever it needs.

use thiserror::Error;

/// Template expansion errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TemplateError {
    #[error("Invalid template syntax: {0}")]
    Parse(String),

    #[error("Template rendering failed: {0}")]
    Render(String),
}

/// Failed response expectation of an HTTP step
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExpectationError {
    #[error("response code was {actual}, but expected: {expected}")]
    Status { actual: u16, expected: u16 },

    #[error("response code was {actual}, but expected 200 (by default)")]
    DefaultStatus { actual: u16 },

    #[error("response code was {actual}, but expected: {min} <= code <= {max}")]
    StatusRange { actual: u16, min: u16, max: u16 },

    #[error("content type was {actual:?}, but expected: {expected:?}")]
    ContentType { actual: String, expected: String },

    #[error("response does not contain {expected:?}, but was: {body:?}")]
    Contains { expected: String, body: String },
}
