//! Typed errors for gqlhttp.
//!
//! Decoding never produces these: malformed client input degrades to empty
//! request fields. They cover configuration, body transport and serving.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

/// Typed error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[non_exhaustive]
pub enum ErrorCode {
    // Configuration errors
    NoSchema,
    InvalidConfig,

    // Body transport errors
    BodyRead,
    BodyConsumed,
    PayloadTooLarge,

    // Response errors
    SerializeError,

    // Execution errors reported by the schema
    ExecutionError,

    // Serving errors
    ServerError,
    InternalError,
}

impl ErrorCode {
    /// Returns the string representation of the error code.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::NoSchema => "NO_SCHEMA",
            Self::InvalidConfig => "INVALID_CONFIG",
            Self::BodyRead => "BODY_READ",
            Self::BodyConsumed => "BODY_CONSUMED",
            Self::PayloadTooLarge => "PAYLOAD_TOO_LARGE",
            Self::SerializeError => "SERIALIZE_ERROR",
            Self::ExecutionError => "EXECUTION_ERROR",
            Self::ServerError => "SERVER_ERROR",
            Self::InternalError => "INTERNAL_ERROR",
        }
    }

    /// Returns true if the error was caused by what the client sent.
    pub const fn is_client_error(&self) -> bool {
        matches!(
            self,
            Self::BodyRead | Self::BodyConsumed | Self::PayloadTooLarge | Self::ExecutionError
        )
    }

    /// Returns true if the error originates in the server or its setup.
    pub const fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::NoSchema
                | Self::InvalidConfig
                | Self::SerializeError
                | Self::ServerError
                | Self::InternalError
        )
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Strongly typed gqlhttp error.
#[derive(Error, Debug, Clone)]
#[error("[{code}] {message}")]
pub struct Error {
    /// Typed error code.
    pub code: ErrorCode,
    /// Human-readable error message.
    pub message: String,
    /// Extension data for debugging.
    pub extensions: Option<HashMap<String, serde_json::Value>>,
}

impl Error {
    /// Creates a new error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            extensions: None,
        }
    }

    /// Adds extension data.
    pub fn with_extension(mut self, key: impl Into<String>, value: impl Serialize) -> Self {
        let extensions = self.extensions.get_or_insert_with(HashMap::new);
        if let Ok(v) = serde_json::to_value(value) {
            extensions.insert(key.into(), v);
        }
        self
    }

    /// Creates a missing-schema error.
    pub fn no_schema() -> Self {
        Self::new(ErrorCode::NoSchema, "undefined GraphQL schema")
    }

    /// Creates a body read error.
    pub fn body_read(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::BodyRead, message)
    }

    /// Creates an error for a body that was already taken.
    pub fn body_consumed() -> Self {
        Self::new(ErrorCode::BodyConsumed, "request body was already consumed")
    }

    /// Creates an error for a body over the configured limit.
    pub fn payload_too_large(limit: usize) -> Self {
        Self::new(
            ErrorCode::PayloadTooLarge,
            format!("request body exceeds the maximum allowed size of {limit} bytes"),
        )
        .with_extension("limit", limit)
    }

    /// Creates a serialization error.
    pub fn serialize(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::SerializeError, message)
    }

    /// Creates a server error.
    pub fn server(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServerError, message)
    }

    /// Returns true if this is a client error.
    pub fn is_client_error(&self) -> bool {
        self.code.is_client_error()
    }

    /// Returns true if this is a server error.
    pub fn is_server_error(&self) -> bool {
        self.code.is_server_error()
    }
}

impl Serialize for Error {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use serde::ser::SerializeStruct;

        let mut state = serializer.serialize_struct("Error", 3)?;
        state.serialize_field("code", &self.code)?;
        state.serialize_field("message", &self.message)?;
        if let Some(ref ext) = self.extensions {
            state.serialize_field("extensions", ext)?;
        }
        state.end()
    }
}

/// Type alias for gqlhttp results.
pub type Result<T> = std::result::Result<T, Error>;

/// Result extension for mapping foreign errors onto a code.
pub trait ResultExt<T> {
    /// Maps the error to an [`Error`] with the given code.
    fn map_code(self, code: ErrorCode) -> Result<T>;

    /// Maps the error to an [`Error`] with the given code and message,
    /// keeping the original error text as an extension.
    fn map_code_with(self, code: ErrorCode, message: impl Into<String>) -> Result<T>;
}

impl<T, E: std::error::Error> ResultExt<T> for std::result::Result<T, E> {
    fn map_code(self, code: ErrorCode) -> Result<T> {
        self.map_err(|e| Error::new(code, e.to_string()))
    }

    fn map_code_with(self, code: ErrorCode, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| Error::new(code, message).with_extension("original_error", e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_properties() {
        assert!(ErrorCode::PayloadTooLarge.is_client_error());
        assert!(!ErrorCode::NoSchema.is_client_error());

        assert!(ErrorCode::NoSchema.is_server_error());
        assert!(!ErrorCode::BodyRead.is_server_error());
    }

    #[test]
    fn test_error_display() {
        let err = Error::no_schema();
        assert_eq!(err.to_string(), "[NO_SCHEMA] undefined GraphQL schema");
    }

    #[test]
    fn test_payload_too_large_extension() {
        let err = Error::payload_too_large(1024);
        assert_eq!(err.code, ErrorCode::PayloadTooLarge);
        let ext = err.extensions.unwrap();
        assert_eq!(ext["limit"], 1024);
    }

    #[test]
    fn test_error_serialization() {
        let err = Error::server("Failed to bind");
        let json = serde_json::to_string(&err).unwrap();
        assert_eq!(json, r#"{"code":"SERVER_ERROR","message":"Failed to bind"}"#);
    }

    #[test]
    fn test_result_ext() {
        let result: std::result::Result<(), std::io::Error> = Err(std::io::Error::new(
            std::io::ErrorKind::AddrInUse,
            "address in use",
        ));

        let err = result
            .map_code_with(ErrorCode::ServerError, "Failed to bind")
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ServerError);
        assert_eq!(err.message, "Failed to bind");
        assert_eq!(
            err.extensions.unwrap()["original_error"],
            serde_json::json!("address in use")
        );
    }
}
