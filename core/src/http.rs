//! HTTP exchange types.
//!
//! # Design
//! Requests and responses are plain data. [`RequestHandler`] builds an
//! `HttpRequest`, hands it to a [`Transport`], and classifies the
//! `HttpResponse` that comes back. Keeping both sides as values lets the
//! request building and response classification be tested without a socket.
//!
//! Bodies are raw bytes: the response sentinel check compares bytes, and a
//! non-UTF-8 error page must still be rendered in diagnostics.
//!
//! [`RequestHandler`]: crate::handler::RequestHandler
//! [`Transport`]: crate::transport::Transport

use std::fmt;

/// HTTP method of a catalog action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One outgoing request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
}

impl HttpRequest {
    /// First header value matching `name`, compared case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// A fully buffered response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the body came from the error channel (status >= 400).
    pub fn is_error_status(&self) -> bool {
        self.status >= 400
    }
}
