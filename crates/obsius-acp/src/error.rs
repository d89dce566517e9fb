//! JSON-RPC error object and ACP error codes.
//!
//! Every request in the protocol settles with either a `result` or an
//! `error` object carrying a numeric code and a message. Codes in the
//! reserved `-32000..-32099` range are ACP-specific; the one the core
//! special-cases is [`ErrorCode::AUTH_REQUIRED`].

use std::fmt::Display;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// JSON-RPC 2.0 error object with optional structured data.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct Error {
    /// Numeric error code per the JSON-RPC specification.
    pub code: i32,
    /// Short, single-sentence description of the error.
    pub message: String,
    /// Additional context, e.g. the URI of a missing resource.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

impl Error {
    pub fn new(code: impl Into<(i32, String)>) -> Self {
        let (code, message) = code.into();
        Error {
            code,
            message,
            data: None,
        }
    }

    #[must_use]
    pub fn with_data(mut self, data: impl Into<serde_json::Value>) -> Self {
        self.data = Some(data.into());
        self
    }

    #[must_use]
    pub fn parse_error() -> Self {
        Error::new(ErrorCode::PARSE_ERROR)
    }

    #[must_use]
    pub fn invalid_request() -> Self {
        Error::new(ErrorCode::INVALID_REQUEST)
    }

    #[must_use]
    pub fn method_not_found() -> Self {
        Error::new(ErrorCode::METHOD_NOT_FOUND)
    }

    #[must_use]
    pub fn invalid_params() -> Self {
        Error::new(ErrorCode::INVALID_PARAMS)
    }

    #[must_use]
    pub fn internal_error() -> Self {
        Error::new(ErrorCode::INTERNAL_ERROR)
    }

    /// Authentication is required before the operation can proceed.
    #[must_use]
    pub fn auth_required() -> Self {
        Error::new(ErrorCode::AUTH_REQUIRED)
    }

    /// A referenced resource, such as a file, was not found.
    #[must_use]
    pub fn resource_not_found(uri: Option<String>) -> Self {
        let err = Error::new(ErrorCode::RESOURCE_NOT_FOUND);
        match uri {
            Some(uri) => err.with_data(serde_json::json!({ "uri": uri })),
            None => err,
        }
    }

    /// Whether this error demands authentication before a retry.
    pub fn is_auth_required(&self) -> bool {
        self.code == ErrorCode::AUTH_REQUIRED.code
    }

    /// Wraps an arbitrary error as an internal JSON-RPC error, keeping its
    /// string form as data.
    pub fn into_internal_error(err: impl std::error::Error) -> Self {
        Error::internal_error().with_data(err.to_string())
    }
}

/// Well-known error codes: the JSON-RPC 2.0 set plus ACP-specific codes in
/// the reserved range.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, PartialEq, Eq)]
pub struct ErrorCode {
    pub code: i32,
    pub message: &'static str,
}

impl ErrorCode {
    pub const PARSE_ERROR: ErrorCode = ErrorCode {
        code: -32700,
        message: "Parse error",
    };

    pub const INVALID_REQUEST: ErrorCode = ErrorCode {
        code: -32600,
        message: "Invalid Request",
    };

    pub const METHOD_NOT_FOUND: ErrorCode = ErrorCode {
        code: -32601,
        message: "Method not found",
    };

    pub const INVALID_PARAMS: ErrorCode = ErrorCode {
        code: -32602,
        message: "Invalid params",
    };

    pub const INTERNAL_ERROR: ErrorCode = ErrorCode {
        code: -32603,
        message: "Internal error",
    };

    /// Authentication is required before this operation can be performed.
    pub const AUTH_REQUIRED: ErrorCode = ErrorCode {
        code: -32000,
        message: "Authentication required",
    };

    /// A given resource, such as a file, was not found.
    pub const RESOURCE_NOT_FOUND: ErrorCode = ErrorCode {
        code: -32002,
        message: "Resource not found",
    };
}

impl From<ErrorCode> for (i32, String) {
    fn from(error_code: ErrorCode) -> Self {
        (error_code.code, error_code.message.to_string())
    }
}

impl From<ErrorCode> for Error {
    fn from(error_code: ErrorCode) -> Self {
        Error::new(error_code)
    }
}

impl std::error::Error for Error {}

impl Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if self.message.is_empty() {
            write!(f, "{}", self.code)?;
        } else {
            write!(f, "{}", self.message)?;
        }

        if let Some(data) = &self.data {
            let pretty = serde_json::to_string_pretty(data).unwrap_or_else(|_| data.to_string());
            write!(f, ": {pretty}")?;
        }

        Ok(())
    }
}

impl From<anyhow::Error> for Error {
    fn from(error: anyhow::Error) -> Self {
        match error.downcast::<Self>() {
            Ok(error) => error,
            Err(error) => Error::into_internal_error(&*error),
        }
    }
}

impl From<serde_json::Error> for Error {
    fn from(error: serde_json::Error) -> Self {
        Error::invalid_params().with_data(error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_required_code_is_in_reserved_range() {
        let err = Error::auth_required();
        assert_eq!(err.code, -32000);
        assert!(err.is_auth_required());
        assert!(!Error::internal_error().is_auth_required());
    }

    #[test]
    fn display_includes_data() {
        let err = Error::resource_not_found(Some("vault://notes/a.md".into()));
        let rendered = err.to_string();
        assert!(rendered.contains("Resource not found"));
        assert!(rendered.contains("vault://notes/a.md"));
    }
}
