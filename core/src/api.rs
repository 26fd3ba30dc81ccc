//! Typed entry point over [`RequestHandler`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde_json::{json, Value};

use crate::action::Action;
use crate::config::NamelessApiBuilder;
use crate::error::{NamelessError, Result};
use crate::handler::{JsonObject, RequestHandler};
use crate::types::{ListedUser, UserListQuery, WebsendCommand, WebsiteInfo};

/// A configured client for one Nameless website.
#[derive(Debug)]
pub struct NamelessApi {
    requests: RequestHandler,
}

impl NamelessApi {
    pub fn builder(api_url: impl Into<String>, api_key: impl Into<String>) -> NamelessApiBuilder {
        NamelessApiBuilder::new(api_url, api_key)
    }

    pub(crate) fn new(requests: RequestHandler) -> Self {
        Self { requests }
    }

    /// Raw access to every catalog action.
    pub fn requests(&self) -> &RequestHandler {
        &self.requests
    }

    pub fn api_url(&self) -> &str {
        self.requests.api_url()
    }

    pub fn website_info(&self) -> Result<WebsiteInfo> {
        let payload = self.requests.get(Action::Info, &[])?;
        from_payload(Value::Object(payload))
    }

    pub fn list_users(&self, query: &UserListQuery) -> Result<Vec<ListedUser>> {
        let params = query.to_parameters();
        let flat: Vec<&dyn fmt::Display> = params
            .iter()
            .flat_map(|(k, v)| [k as &dyn fmt::Display, v as &dyn fmt::Display])
            .collect();
        let payload = self.requests.get(Action::ListUsers, &flat)?;
        field(payload, "users")
    }

    /// Commands waiting to be run on the given game server.
    pub fn websend_commands(&self, server_id: i64) -> Result<Vec<WebsendCommand>> {
        let payload = self
            .requests
            .get(Action::WebsendGetCommands, &[&"server_id", &server_id])?;
        field(payload, "commands")
    }

    pub fn mark_commands_executed(&self, server_id: i64, command_ids: &[i64]) -> Result<()> {
        let body = json!({ "server_id": server_id, "commands": command_ids });
        self.requests.post(Action::WebsendMarkCommandsExecuted, &body)?;
        Ok(())
    }

    /// Forward console output of a game server to the website.
    pub fn send_console_lines(&self, server_id: i64, lines: &[String]) -> Result<()> {
        let body = json!({ "server_id": server_id, "content": lines });
        self.requests.post(Action::WebsendSendConsoleLines, &body)?;
        Ok(())
    }
}

fn field<T: DeserializeOwned>(mut payload: JsonObject, key: &str) -> Result<T> {
    let value = payload
        .remove(key)
        .ok_or_else(|| NamelessError::protocol(format!("missing json key '{key}'")))?;
    from_payload(value)
}

fn from_payload<T: DeserializeOwned>(value: Value) -> Result<T> {
    serde_json::from_value(value)
        .map_err(|e| NamelessError::protocol(format!("unexpected response shape: {e}")))
}
