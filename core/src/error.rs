//! Error types for the Nameless API client.
//!
//! # Design
//! Callers need to tell a legitimate application-level rejection (`Api`,
//! carrying the remote error code) apart from everything that went wrong on
//! the way there. The remaining variants separate local misuse, network
//! failures, the "API is disabled" sentinel and responses that are not the
//! JSON envelope the site promises. Nothing is retried internally.

use thiserror::Error;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Errors returned by [`RequestHandler`](crate::handler::RequestHandler).
#[derive(Debug, Error)]
pub enum NamelessError {
    /// Local precondition violated, e.g. GET on a POST action. Raised before
    /// any network access.
    #[error("invalid usage: {0}")]
    InvalidUsage(String),

    /// DNS, connect, TLS, timeout or I/O failure, or an empty error body.
    #[error("{message}")]
    Transport {
        message: String,
        #[source]
        source: Option<BoxError>,
    },

    /// The site answered with the plain-text `API is disabled` sentinel.
    #[error("the API is disabled on the website")]
    ApiDisabled,

    /// The response was not the expected JSON envelope.
    #[error("{message}")]
    ProtocolViolation { message: String },

    /// The site reported `error: true`.
    #[error("API error {code}{}", meta_suffix(.meta))]
    Api { code: i64, meta: Option<String> },
}

fn meta_suffix(meta: &Option<String>) -> String {
    match meta {
        Some(meta) => format!(" (meta: {meta})"),
        None => String::new(),
    }
}

impl NamelessError {
    pub(crate) fn transport(message: impl Into<String>) -> Self {
        NamelessError::Transport {
            message: message.into(),
            source: None,
        }
    }

    pub(crate) fn protocol(message: impl Into<String>) -> Self {
        NamelessError::ProtocolViolation {
            message: message.into(),
        }
    }

    /// Remote error code, if this is an [`NamelessError::Api`] error.
    pub fn api_code(&self) -> Option<i64> {
        match self {
            NamelessError::Api { code, .. } => Some(*code),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, NamelessError>;

/// Error codes the site reports in the `code` field.
pub mod codes {
    pub const UNKNOWN_ERROR: i64 = 0;
    pub const INVALID_API_KEY: i64 = 1;
    pub const INVALID_LANGUAGE: i64 = 2;
    pub const INVALID_API_METHOD: i64 = 3;
    pub const NOT_AUTHORIZED: i64 = 4;
    pub const INVALID_POST_CONTENTS: i64 = 5;
    pub const INVALID_GET_CONTENTS: i64 = 6;
    pub const INVALID_USERNAME: i64 = 7;
    pub const INVALID_UUID: i64 = 8;
    pub const INVALID_EMAIL_ADDRESS: i64 = 9;
    pub const USERNAME_ALREADY_EXISTS: i64 = 11;
    pub const UUID_ALREADY_EXISTS: i64 = 12;
    pub const EMAIL_ALREADY_EXISTS: i64 = 13;
    pub const UNABLE_TO_FIND_USER: i64 = 16;
    pub const UNABLE_TO_FIND_GROUP: i64 = 17;
    pub const INVALID_SERVER_ID: i64 = 27;
}
