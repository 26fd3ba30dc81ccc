//! Request executor for the Nameless website API.
//!
//! # Design
//! `RequestHandler` owns the immutable [`ApiConfig`] and a [`Transport`].
//! Each call is split into three steps that can be exercised on their own:
//! `build_get`/`build_post` produce an [`HttpRequest`], the transport runs
//! it, and [`RequestHandler::classify`] turns the [`HttpResponse`] into a
//! success payload or a [`NamelessError`]. No state survives between calls,
//! so one handler can be shared across threads.

use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::debug;

use crate::action::Action;
use crate::config::ApiConfig;
use crate::debug::DebugLogger;
use crate::error::{NamelessError, Result};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::transport::{Transport, UreqTransport};

/// Plain-text body the site sends when its API is switched off.
pub const API_DISABLED_SENTINEL: &[u8] = b"API is disabled";

/// Longest excerpt of an unparseable response kept in error messages.
pub const MAX_PRINTED_RESPONSE_CHARS: usize = 5_000;

const SEPARATOR: &str = "-----------------";
const REDIRECT_HINT: &str = "HINT: The URL results in a redirect. If your URL uses http://, change to https://. If your website forces www., make sure to add www. to the url";
const CLOUDFLARE_HINT: &str =
    "HINT: Status code 520/521 is sent by CloudFlare when the backend webserver is down or having issues.";

/// Success payload: the response object, `error` field included.
pub type JsonObject = Map<String, Value>;

pub struct RequestHandler {
    config: ApiConfig,
    transport: Arc<dyn Transport>,
    debug: DebugLogger,
}

impl RequestHandler {
    /// Handler using the blocking ureq transport.
    pub fn new(config: ApiConfig) -> Result<Self> {
        let transport = UreqTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(config: ApiConfig, transport: Arc<dyn Transport>) -> Self {
        let debug = DebugLogger::new(config.debug_sink().clone(), config.api_key());
        Self {
            config,
            transport,
            debug,
        }
    }

    pub fn api_url(&self) -> &str {
        self.config.base_url()
    }

    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Call a GET action. `parameters` alternates keys and values.
    pub fn get(&self, action: Action, parameters: &[&dyn fmt::Display]) -> Result<JsonObject> {
        let request = self.build_get(action, parameters)?;
        self.execute(action, request)
    }

    /// Call a POST action with a JSON body.
    pub fn post(&self, action: Action, body: &Value) -> Result<JsonObject> {
        let request = self.build_post(action, body)?;
        self.execute(action, request)
    }

    pub fn build_get(&self, action: Action, parameters: &[&dyn fmt::Display]) -> Result<HttpRequest> {
        if action.method() != HttpMethod::Get {
            return Err(NamelessError::InvalidUsage(format!(
                "cannot GET {action}, it is a POST action"
            )));
        }
        if parameters.len() % 2 != 0 {
            let rendered: Vec<String> = parameters.iter().map(|p| p.to_string()).collect();
            return Err(NamelessError::InvalidUsage(format!(
                "parameter list length must be even (length is {} - {})",
                parameters.len(),
                rendered.join("|")
            )));
        }

        let mut url = format!("{}{}", self.config.base_url(), action.url_path());
        for pair in parameters.chunks_exact(2) {
            url.push('&');
            url.push_str(&pair[0].to_string());
            url.push('=');
            url.push_str(&urlencoding::encode(&pair[1].to_string()));
        }

        Ok(HttpRequest {
            method: HttpMethod::Get,
            url,
            headers: self.base_headers(),
            body: None,
        })
    }

    pub fn build_post(&self, action: Action, body: &Value) -> Result<HttpRequest> {
        if action.method() != HttpMethod::Post {
            return Err(NamelessError::InvalidUsage(format!(
                "cannot POST to {action}, it is a GET action"
            )));
        }

        let encoded = if self.config.pretty_json() {
            serde_json::to_vec_pretty(body)
        } else {
            serde_json::to_vec(body)
        }
        .map_err(|e| NamelessError::InvalidUsage(format!("request body is not serializable: {e}")))?;

        let mut headers = self.base_headers();
        headers.push(("Content-Length".to_string(), encoded.len().to_string()));
        headers.push(("Content-Type".to_string(), "application/json".to_string()));

        Ok(HttpRequest {
            method: HttpMethod::Post,
            url: format!("{}{}", self.config.base_url(), action.url_path()),
            headers,
            body: Some(encoded),
        })
    }

    fn base_headers(&self) -> Vec<(String, String)> {
        let key = self.config.api_key();
        vec![
            ("User-Agent".to_string(), self.config.user_agent().to_string()),
            ("Authorization".to_string(), format!("Bearer {key}")),
            ("X-API-Key".to_string(), key.to_string()),
        ]
    }

    fn execute(&self, action: Action, request: HttpRequest) -> Result<JsonObject> {
        debug!(
            %action,
            method = %request.method,
            url = %self.debug.scrub(&request.url),
            "sending API request"
        );

        self.debug
            .log(|| format!("Making connection {} to url {}", request.method, request.url));
        self.debug
            .log(|| format!("Using User-Agent '{}'", self.config.user_agent()));
        if let Some(body) = &request.body {
            self.debug.log(|| {
                format!(
                    "Post body below\n{SEPARATOR}\n{}\n{SEPARATOR}",
                    String::from_utf8_lossy(body)
                )
            });
        }

        let response = self.transport.execute(&request).map_err(|err| {
            debug!(%action, error = %self.debug.scrub(&err.to_string()), "API request failed");
            err
        })?;
        debug!(%action, status = response.status, bytes = response.body.len(), "received API response");

        self.classify(response)
    }

    /// Turn a buffered response into a success payload or an error.
    pub fn classify(&self, response: HttpResponse) -> Result<JsonObject> {
        if response.is_error_status() && response.body.is_empty() {
            return Err(NamelessError::transport(format!(
                "Website sent empty response with code {}",
                response.status
            )));
        }

        if response.body == API_DISABLED_SENTINEL {
            return Err(NamelessError::ApiDisabled);
        }

        let text = String::from_utf8_lossy(&response.body);
        self.debug.log(|| {
            format!(
                "Website response below\n{SEPARATOR}\n{}\n{SEPARATOR}",
                regular_ascii_only(&text)
            )
        });

        let json = match serde_json::from_slice::<Value>(&response.body) {
            Ok(Value::Object(map)) => map,
            Ok(other) => {
                let reason = format!("expected a JSON object, got {}", json_kind(&other));
                return Err(NamelessError::protocol(unparseable_message(
                    &reason,
                    response.status,
                    &text,
                )));
            }
            Err(e) => {
                return Err(NamelessError::protocol(unparseable_message(
                    &e.to_string(),
                    response.status,
                    &text,
                )))
            }
        };

        let is_error = match json.get("error") {
            Some(Value::Bool(flag)) => *flag,
            _ => {
                return Err(NamelessError::protocol(
                    "Unexpected response from website (missing json key 'error')",
                ))
            }
        };

        if is_error {
            let code = json.get("code").and_then(error_code).ok_or_else(|| {
                NamelessError::protocol("Unexpected response from website (missing json key 'code')")
            })?;
            let meta = match json.get("meta") {
                None | Some(Value::Null) => None,
                Some(meta) => Some(meta.to_string()),
            };
            return Err(NamelessError::Api { code, meta });
        }

        Ok(json)
    }
}

/// Read an error code the way loosely typed sites send it: an integer, an
/// integral float, or a decimal string.
fn error_code(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| {
            n.as_f64()
                .filter(|f| f.fract() == 0.0 && (i64::MIN as f64..i64::MAX as f64).contains(f))
                .map(|f| f as i64)
        }),
        Value::String(s) => s.parse().ok(),
        _ => None,
    }
}

impl fmt::Debug for RequestHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestHandler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Diagnostic for a body that is not a JSON object: status code, a bounded
/// and sanitized excerpt, and a hint for redirects and CloudFlare errors.
fn unparseable_message(reason: &str, status: u16, response: &str) -> String {
    let mut printable = if response.chars().count() > MAX_PRINTED_RESPONSE_CHARS {
        let mut truncated: String = response.chars().take(MAX_PRINTED_RESPONSE_CHARS).collect();
        truncated.push_str("\n[response truncated to 5k characters]\n");
        truncated
    } else {
        response.to_string()
    };
    if !printable.ends_with('\n') {
        printable.push('\n');
    }

    let mut message = format!(
        "{reason}\nUnable to parse json. Received response code {status}. Website response:\n{SEPARATOR}\n{}{SEPARATOR}\n",
        regular_ascii_only(&printable)
    );
    match status {
        301..=303 => message.push_str(REDIRECT_HINT),
        520 | 521 => message.push_str(CLOUDFLARE_HINT),
        _ => {}
    }
    message
}

/// Replace everything outside printable ASCII, except newline, with `.`.
pub fn regular_ascii_only(message: &str) -> String {
    message
        .chars()
        .map(|c| if (' '..='~').contains(&c) || c == '\n' { c } else { '.' })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::NamelessApiBuilder;
    use crate::debug::API_KEY_PLACEHOLDER;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;

    const BASE: &str = "https://example.com/index.php?route=/api/v2/";

    /// Returns canned responses and counts calls.
    struct FakeTransport {
        response: HttpResponse,
        calls: AtomicUsize,
        last: Mutex<Option<HttpRequest>>,
    }

    impl FakeTransport {
        fn new(status: u16, body: &str) -> Arc<Self> {
            Arc::new(Self {
                response: HttpResponse::new(status, body),
                calls: AtomicUsize::new(0),
                last: Mutex::new(None),
            })
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl Transport for FakeTransport {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last.lock().unwrap() = Some(request.clone());
            Ok(self.response.clone())
        }
    }

    fn handler_with(transport: Arc<FakeTransport>) -> RequestHandler {
        let config = NamelessApiBuilder::new(BASE, "secret123").build_config().unwrap();
        RequestHandler::with_transport(config, transport)
    }

    fn handler() -> RequestHandler {
        handler_with(FakeTransport::new(200, r#"{"error":false}"#))
    }

    #[test]
    fn get_on_post_action_fails_without_network() {
        let transport = FakeTransport::new(200, r#"{"error":false}"#);
        let handler = handler_with(Arc::clone(&transport));
        let err = handler.get(Action::Register, &[]).unwrap_err();
        assert!(matches!(err, NamelessError::InvalidUsage(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn post_on_get_action_fails_without_network() {
        let transport = FakeTransport::new(200, r#"{"error":false}"#);
        let handler = handler_with(Arc::clone(&transport));
        let err = handler.post(Action::Info, &json!({})).unwrap_err();
        assert!(matches!(err, NamelessError::InvalidUsage(_)));
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn odd_parameter_count_is_rejected() {
        let transport = FakeTransport::new(200, r#"{"error":false}"#);
        let handler = handler_with(Arc::clone(&transport));
        let err = handler.get(Action::ListUsers, &[&"groups"]).unwrap_err();
        match err {
            NamelessError::InvalidUsage(msg) => assert!(msg.contains("length is 1 - groups")),
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.calls(), 0);
    }

    #[test]
    fn get_url_prefixes_every_pair_with_ampersand() {
        let req = handler()
            .build_get(Action::ListUsers, &[&"groups", &1, &"integration", &"Minecraft"])
            .unwrap();
        assert_eq!(
            req.url,
            format!("{BASE}listUsers&groups=1&integration=Minecraft")
        );
        assert_eq!(req.method, HttpMethod::Get);
        assert!(req.body.is_none());
    }

    #[test]
    fn get_values_are_percent_encoded_and_keys_are_not() {
        let req = handler()
            .build_get(Action::UserInfo, &[&"user name", &"a b&c=d/é"])
            .unwrap();
        assert_eq!(
            req.url,
            format!("{BASE}userInfo&user name=a%20b%26c%3Dd%2F%C3%A9")
        );
    }

    #[test]
    fn get_without_parameters_is_bare_path() {
        let req = handler().build_get(Action::WebsendGetCommands, &[]).unwrap();
        assert_eq!(req.url, format!("{BASE}websend/commands"));
    }

    #[test]
    fn requests_carry_auth_and_user_agent() {
        let req = handler().build_get(Action::Info, &[]).unwrap();
        assert_eq!(req.header("User-Agent"), Some("Nameless-Rust-API"));
        assert_eq!(req.header("Authorization"), Some("Bearer secret123"));
        assert_eq!(req.header("X-API-Key"), Some("secret123"));
    }

    #[test]
    fn post_serializes_body_with_json_headers() {
        let body = json!({"username": "alice", "email": "a@example.com"});
        let req = handler().build_post(Action::Register, &body).unwrap();
        let encoded = req.body.as_deref().unwrap();
        assert_eq!(req.url, format!("{BASE}register"));
        assert_eq!(req.header("Content-Type"), Some("application/json"));
        assert_eq!(req.header("Content-Length"), Some(encoded.len().to_string().as_str()));
        let back: Value = serde_json::from_slice(encoded).unwrap();
        assert_eq!(back, body);
    }

    #[test]
    fn pretty_json_toggle_indents_body() {
        let config = NamelessApiBuilder::new(BASE, "k")
            .pretty_json_requests()
            .build_config()
            .unwrap();
        let handler = RequestHandler::with_transport(config, FakeTransport::new(200, "{}"));
        let req = handler.build_post(Action::BanUser, &json!({"user": 1})).unwrap();
        let text = String::from_utf8(req.body.unwrap()).unwrap();
        assert!(text.contains('\n'));
    }

    #[test]
    fn success_payload_is_returned() {
        let handler = handler_with(FakeTransport::new(200, r#"{"error": false, "foo": "bar"}"#));
        let payload = handler.get(Action::Info, &[]).unwrap();
        assert_eq!(payload["foo"], "bar");
    }

    #[test]
    fn api_error_keeps_meta_as_raw_json() {
        let handler = handler_with(FakeTransport::new(
            200,
            r#"{"error": true, "code": 42, "meta": {"x":1}}"#,
        ));
        let err = handler.get(Action::Info, &[]).unwrap_err();
        match err {
            NamelessError::Api { code, meta } => {
                assert_eq!(code, 42);
                assert_eq!(meta.as_deref(), Some(r#"{"x":1}"#));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn null_meta_is_dropped() {
        let err = handler()
            .classify(HttpResponse::new(200, r#"{"error":true,"code":16,"meta":null}"#))
            .unwrap_err();
        assert!(matches!(err, NamelessError::Api { code: 16, meta: None }));
    }

    #[test]
    fn loosely_typed_code_is_accepted() {
        for body in [
            r#"{"error":true,"code":"16"}"#,
            r#"{"error":true,"code":16.0}"#,
        ] {
            let err = handler().classify(HttpResponse::new(200, body)).unwrap_err();
            assert_eq!(err.api_code(), Some(16), "{body}");
        }
    }

    #[test]
    fn unusable_code_is_protocol_violation() {
        for body in [
            r#"{"error":true,"code":16.5}"#,
            r#"{"error":true,"code":"sixteen"}"#,
            r#"{"error":true,"code":" 16 "}"#,
            r#"{"error":true,"code":null}"#,
            r#"{"error":true,"code":[16]}"#,
        ] {
            let err = handler().classify(HttpResponse::new(200, body)).unwrap_err();
            assert!(matches!(err, NamelessError::ProtocolViolation { .. }), "{body}");
        }
    }

    #[test]
    fn missing_error_key_is_protocol_violation() {
        let err = handler()
            .classify(HttpResponse::new(200, r#"{"foo":"bar"}"#))
            .unwrap_err();
        match err {
            NamelessError::ProtocolViolation { message } => {
                assert!(message.contains("missing json key 'error'"))
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_boolean_error_key_is_protocol_violation() {
        let err = handler()
            .classify(HttpResponse::new(200, r#"{"error":"yes"}"#))
            .unwrap_err();
        assert!(matches!(err, NamelessError::ProtocolViolation { .. }));
    }

    #[test]
    fn error_without_code_is_protocol_violation() {
        let err = handler()
            .classify(HttpResponse::new(200, r#"{"error":true}"#))
            .unwrap_err();
        assert!(matches!(err, NamelessError::ProtocolViolation { .. }));
    }

    #[test]
    fn json_array_is_protocol_violation() {
        let err = handler().classify(HttpResponse::new(200, "[1,2]")).unwrap_err();
        match err {
            NamelessError::ProtocolViolation { message } => assert!(message.contains("an array")),
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn api_disabled_sentinel_wins_over_status() {
        for status in [200, 403, 500] {
            let err = handler()
                .classify(HttpResponse::new(status, "API is disabled"))
                .unwrap_err();
            assert!(matches!(err, NamelessError::ApiDisabled), "status {status}");
        }
    }

    #[test]
    fn sentinel_must_match_exactly() {
        let err = handler()
            .classify(HttpResponse::new(200, "API is disabled\n"))
            .unwrap_err();
        assert!(matches!(err, NamelessError::ProtocolViolation { .. }));
    }

    #[test]
    fn empty_error_body_is_transport_failure() {
        let err = handler().classify(HttpResponse::new(502, "")).unwrap_err();
        match err {
            NamelessError::Transport { message, .. } => {
                assert_eq!(message, "Website sent empty response with code 502")
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn error_status_with_json_body_is_classified() {
        let err = handler()
            .classify(HttpResponse::new(404, r#"{"error":true,"code":16}"#))
            .unwrap_err();
        assert_eq!(err.api_code(), Some(16));
    }

    #[test]
    fn redirect_gets_hint() {
        let err = handler()
            .classify(HttpResponse::new(302, "<html>Moved</html>"))
            .unwrap_err();
        let message = err.to_string();
        assert!(message.contains("Received response code 302"));
        assert!(message.contains(REDIRECT_HINT));
    }

    #[test]
    fn cloudflare_gets_hint() {
        let err = handler()
            .classify(HttpResponse::new(521, "<html>Web server is down</html>"))
            .unwrap_err();
        assert!(err.to_string().contains(CLOUDFLARE_HINT));
    }

    #[test]
    fn long_response_is_truncated() {
        let body = "x".repeat(MAX_PRINTED_RESPONSE_CHARS + 100);
        let err = handler().classify(HttpResponse::new(200, body)).unwrap_err();
        let message = err.to_string();
        assert!(message.contains("[response truncated to 5k characters]"));
        assert!(!message.contains(&"x".repeat(MAX_PRINTED_RESPONSE_CHARS + 1)));
    }

    #[test]
    fn ascii_sanitizer_keeps_newline() {
        assert_eq!(regular_ascii_only("a\x01b\nc\té"), "a.b\nc..");
    }

    #[test]
    fn debug_output_is_redacted() {
        let lines = Arc::new(Mutex::new(Vec::<String>::new()));
        let sink_lines = Arc::clone(&lines);
        let config = NamelessApiBuilder::new(BASE, "secret123")
            .user_agent("agent-secret123")
            .custom_debug_logger(move |line| sink_lines.lock().unwrap().push(line.to_string()))
            .build_config()
            .unwrap();
        let transport = FakeTransport::new(200, r#"{"error":false,"echo":"secret123"}"#);
        let handler = RequestHandler::with_transport(config, transport);

        handler
            .post(Action::CreateReport, &json!({"content": "secret123"}))
            .unwrap();

        let lines = lines.lock().unwrap();
        assert!(lines.len() >= 4);
        assert!(lines.iter().all(|l| !l.contains("secret123")));
        assert!(lines.iter().any(|l| l.contains(API_KEY_PLACEHOLDER)));
    }

    /// Collects formatted tracing output.
    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl std::io::Write for Captured {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    impl Captured {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    /// Fails every exchange with a message that echoes the request URL.
    struct EchoingFailure;

    impl Transport for EchoingFailure {
        fn execute(&self, request: &HttpRequest) -> Result<HttpResponse> {
            Err(NamelessError::transport(format!("could not reach {}", request.url)))
        }
    }

    fn traced(run: impl FnOnce()) -> String {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::DEBUG)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        tracing::subscriber::with_default(subscriber, run);
        captured.text()
    }

    #[test]
    fn tracing_events_carry_redacted_url() {
        let output = traced(|| {
            handler().get(Action::UserInfo, &[&"username", &"secret123"]).unwrap();
        });
        assert!(output.contains("sending API request"), "{output}");
        assert!(output.contains(&format!("userInfo&username={API_KEY_PLACEHOLDER}")), "{output}");
        assert!(!output.contains("secret123"), "{output}");
    }

    #[test]
    fn tracing_failure_event_is_redacted() {
        let config = NamelessApiBuilder::new(BASE, "secret123").build_config().unwrap();
        let handler = RequestHandler::with_transport(config, Arc::new(EchoingFailure));
        let output = traced(|| {
            let err = handler.get(Action::UserInfo, &[&"username", &"secret123"]).unwrap_err();
            assert!(matches!(err, NamelessError::Transport { .. }));
        });
        assert!(output.contains("API request failed"), "{output}");
        assert!(!output.contains("secret123"), "{output}");
    }

    #[test]
    fn handler_is_shareable_across_threads() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<RequestHandler>();
    }
}
