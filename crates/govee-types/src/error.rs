//! Error types for data parsing in govee-types.

use thiserror::Error;

/// Errors that can occur when parsing Govee sensor data or user input.
///
/// Binary payload decoders in [`crate::codec`] never return this type: a
/// payload of the wrong shape decodes to `None`. `ParseError` covers the
/// textual forms (alarm specifications, quantity names, time ranges).
///
/// This enum is marked `#[non_exhaustive]` to allow adding new error variants
/// in future versions without breaking downstream code.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// The input did not have the expected shape.
    #[error("Invalid format: {0}")]
    InvalidFormat(String),

    /// A numeric field could not be parsed.
    #[error("Invalid number '{value}' for {field}")]
    InvalidNumber {
        /// Field being parsed.
        field: &'static str,
        /// The offending text.
        value: String,
    },

    /// An unrecognized keyword.
    #[error("Unknown value '{0}'")]
    UnknownValue(String),
}

/// Result type alias using govee-types' ParseError type.
pub type ParseResult<T> = std::result::Result<T, ParseError>;
