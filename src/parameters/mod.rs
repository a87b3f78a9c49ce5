//! # Parameters
//!
//! Typed parameter definitions and the values parsed for them.
//!
//! A [`ParameterDefinition`] declares a name, a [`ParameterType`], an optional
//! default and whether the parameter is required. Raw request strings are
//! coerced through [`ParameterDefinition::parse`] (or
//! [`ParameterDefinition::parse_from_reader`] for file-backed types) and stored
//! in [`ParsedParameters`] together with a log of where each value came from.

pub mod date;
pub mod definition;
pub mod parsed;
pub mod types;

pub use date::{format_date, parse_date, parse_date_relative_to, DateParseError};
pub use definition::ParameterDefinition;
pub use parsed::{ParseStep, ParsedParameter, ParsedParameters};
pub use types::ParameterType;

use thiserror::Error;

/// Result type for parameter operations
pub type ParameterResult<T> = Result<T, ParameterError>;

/// Errors raised while binding values onto parameter definitions
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ParameterError {
    #[error("invalid value for parameter '{name}': ({raw}) {reason}")]
    InvalidValue {
        name: String,
        raw: String,
        reason: String,
    },

    #[error("required parameter '{0}' is missing")]
    MissingRequired(String),

    #[error("invalid default for parameter '{name}': {reason}")]
    InvalidDefault { name: String, reason: String },
}

impl ParameterError {
    pub(crate) fn invalid(name: &str, raw: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            name: name.to_string(),
            raw: raw.into(),
            reason: reason.into(),
        }
    }
}
