//! Redacting debug output.
//!
//! Every line of debug text leaves the crate through [`DebugLogger::log`],
//! which replaces the API key with [`API_KEY_PLACEHOLDER`] before the line
//! reaches the configured [`DebugSink`].

use crate::config::DebugSink;

pub const API_KEY_PLACEHOLDER: &str = "**API_KEY_REMOVED**";

#[derive(Debug, Clone)]
pub struct DebugLogger {
    sink: DebugSink,
    api_key: String,
}

impl DebugLogger {
    pub fn new(sink: DebugSink, api_key: impl Into<String>) -> Self {
        Self {
            sink,
            api_key: api_key.into(),
        }
    }

    pub fn enabled(&self) -> bool {
        !matches!(self.sink, DebugSink::None)
    }

    /// Emit a message. The closure only runs when a sink is configured.
    pub fn log(&self, message: impl FnOnce() -> String) {
        if !self.enabled() {
            return;
        }
        let line = redact(&message(), &self.api_key);
        match &self.sink {
            DebugSink::None => {}
            DebugSink::Stderr => eprintln!("[nameless-api debug] {line}"),
            DebugSink::Tracing => tracing::debug!(target: "nameless_core::debug", "{line}"),
            DebugSink::Custom(f) => f(&line),
        }
    }

    /// Redact `text` without emitting it, for structured fields recorded
    /// outside the debug sink.
    pub fn scrub(&self, text: &str) -> String {
        redact(text, &self.api_key)
    }
}

/// Replace every occurrence of `secret` in `message`.
pub fn redact(message: &str, secret: &str) -> String {
    if secret.is_empty() {
        return message.to_string();
    }
    message.replace(secret, API_KEY_PLACEHOLDER)
}
