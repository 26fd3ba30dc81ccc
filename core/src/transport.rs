//! Network transports.
//!
//! # Design
//! [`Transport`] is the only place that touches the network. The handler
//! builds a complete [`HttpRequest`] and expects a fully buffered
//! [`HttpResponse`] back, whatever the status code. Status interpretation is
//! left to the handler. Redirects are not followed, so a moved site shows up
//! as a 3xx response the handler can explain.

use std::fmt;

use crate::config::{ApiConfig, HttpVersion};
use crate::error::{NamelessError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

const CERTIFICATE_CHAIN_HINT: &str = "HINT: Ensure your website uses a fullchain certificate";

/// Performs one blocking HTTP exchange.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse>;
}

/// Blocking transport backed by a ureq agent.
pub struct UreqTransport {
    agent: ureq::Agent,
    response_size_limit: u64,
}

impl fmt::Debug for UreqTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UreqTransport")
            .field("response_size_limit", &self.response_size_limit)
            .finish_non_exhaustive()
    }
}

impl UreqTransport {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        if config.http_version() != HttpVersion::Http1_1 {
            return Err(NamelessError::InvalidUsage(format!(
                "the ureq transport only speaks HTTP/1.1, {:?} was requested",
                config.http_version()
            )));
        }

        let timeout = Some(config.timeout());
        let mut builder = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .max_redirects(0)
            .max_redirects_will_error(false)
            .timeout_connect(timeout)
            .timeout_global(timeout);

        if let Some(proxy) = config.proxy() {
            let proxy = ureq::Proxy::new(&proxy.to_url()?)
                .map_err(|e| NamelessError::InvalidUsage(format!("invalid proxy: {e}")))?;
            builder = builder.proxy(Some(proxy));
        }

        Ok(Self {
            agent: builder.build().new_agent(),
            response_size_limit: config.response_size_limit(),
        })
    }

    fn send(&self, request: &HttpRequest) -> std::result::Result<ureq::http::Response<ureq::Body>, ureq::Error> {
        // ureq derives Content-Length from the body itself.
        let headers = request
            .headers
            .iter()
            .filter(|(name, _)| !name.eq_ignore_ascii_case("content-length"));

        match request.method {
            HttpMethod::Get => {
                let mut builder = self.agent.get(&request.url);
                for (name, value) in headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                builder.call()
            }
            HttpMethod::Post => {
                let mut builder = self.agent.post(&request.url);
                for (name, value) in headers {
                    builder = builder.header(name.as_str(), value.as_str());
                }
                let body: &[u8] = request.body.as_deref().unwrap_or_default();
                builder.send(body)
            }
        }
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
        let mut response = self.send(request).map_err(transport_error)?;
        let status = response.status().as_u16();
        let body = response
            .body_mut()
            .with_config()
            .limit(self.response_size_limit)
            .read_to_vec()
            .map_err(transport_error)?;
        Ok(HttpResponse { status, body })
    }
}

fn transport_error(err: ureq::Error) -> NamelessError {
    let message = match &err {
        ureq::Error::Timeout(which) => format!("request timed out ({which:?})"),
        other => format!("I/O error: {other}"),
    };
    NamelessError::Transport {
        message: with_certificate_hint(message),
        source: Some(Box::new(err)),
    }
}

/// Append a remediation hint when the error points at an incomplete
/// certificate chain.
pub(crate) fn with_certificate_hint(mut message: String) -> String {
    const MARKERS: [&str; 4] = [
        "unable to find valid certification path",
        "UnknownIssuer",
        "unable to get local issuer certificate",
        "incomplete certificate chain",
    ];
    if MARKERS.iter().any(|m| message.contains(m)) {
        message.push('\n');
        message.push_str(CERTIFICATE_CHAIN_HINT);
    }
    message
}

/// Whether a failed exchange was a timeout.
pub fn is_timeout(err: &NamelessError) -> bool {
    matches!(err, NamelessError::Transport { message, .. } if message.starts_with("request timed out"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NamelessApiBuilder;

    #[test]
    fn certificate_hint_added_for_chain_errors() {
        let msg = with_certificate_hint("I/O error: invalid peer certificate: UnknownIssuer".into());
        assert!(msg.ends_with(CERTIFICATE_CHAIN_HINT));
    }

    #[test]
    fn certificate_hint_absent_for_other_errors() {
        let msg = with_certificate_hint("I/O error: connection refused".into());
        assert!(!msg.contains("HINT"));
    }

    #[test]
    fn http2_preference_is_rejected() {
        let config = NamelessApiBuilder::new("https://example.com/", "k")
            .http_version(HttpVersion::Http2)
            .build_config()
            .unwrap();
        let err = UreqTransport::new(&config).unwrap_err();
        assert!(matches!(err, NamelessError::InvalidUsage(_)));
    }

    #[test]
    fn proxy_config_is_accepted() {
        let config = NamelessApiBuilder::new("https://example.com/", "k")
            .with_proxy("http://proxy.local:3128")
            .authenticator("user", "pass")
            .build_config()
            .unwrap();
        assert!(UreqTransport::new(&config).is_ok());
    }

    #[test]
    fn debug_output_shows_size_limit() {
        let config = NamelessApiBuilder::new("https://example.com/", "k")
            .response_size_limit(1024)
            .build_config()
            .unwrap();
        let transport = UreqTransport::new(&config).unwrap();
        let rendered = format!("{transport:?}");
        assert!(rendered.starts_with("UreqTransport"));
        assert!(rendered.contains("response_size_limit: 1024"));
    }
}
