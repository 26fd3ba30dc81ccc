//! The fixed catalog of remote operations.
//!
//! # Design
//! Every endpoint the site exposes is a variant of [`Action`]. Callers cannot
//! build an action from a string, so "unknown action" is not a runtime
//! failure mode. Each variant maps to an HTTP method, an optional module
//! prefix and a route name; the URL path is `module/name` for module routes
//! and plain `name` otherwise.

use std::fmt;

use crate::http::HttpMethod;

/// A remote API operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Action {
    Info,
    GetAnnouncements,
    Register,
    UserInfo,
    GroupInfo,
    AddGroups,
    RemoveGroups,
    CreateReport,
    GetNotifications,
    ServerInfo,
    UpdateUsername,
    VerifyMinecraft,
    ListUsers,
    UpdateDiscordBotSettings,
    VerifyDiscord,
    UpdateDiscordUsernames,
    GetDiscordRoles,
    SetDiscordRoles,
    AddDiscordRoles,
    RemoveDiscordRoles,
    SubmitDiscordRoleList,
    BanUser,
    WebsendGetCommands,
    WebsendMarkCommandsExecuted,
    WebsendSendConsoleLines,
}

const WEBSEND: &str = "websend";

impl Action {
    /// Every action, in catalog order.
    pub const fn all() -> &'static [Action] {
        use Action::*;
        &[
            Info,
            GetAnnouncements,
            Register,
            UserInfo,
            GroupInfo,
            AddGroups,
            RemoveGroups,
            CreateReport,
            GetNotifications,
            ServerInfo,
            UpdateUsername,
            VerifyMinecraft,
            ListUsers,
            UpdateDiscordBotSettings,
            VerifyDiscord,
            UpdateDiscordUsernames,
            GetDiscordRoles,
            SetDiscordRoles,
            AddDiscordRoles,
            RemoveDiscordRoles,
            SubmitDiscordRoleList,
            BanUser,
            WebsendGetCommands,
            WebsendMarkCommandsExecuted,
            WebsendSendConsoleLines,
        ]
    }

    /// Module prefix for sub-module routes, `None` for top-level routes.
    pub const fn module(self) -> Option<&'static str> {
        match self {
            Action::WebsendGetCommands
            | Action::WebsendMarkCommandsExecuted
            | Action::WebsendSendConsoleLines => Some(WEBSEND),
            _ => None,
        }
    }

    /// Route name within its module.
    pub const fn name(self) -> &'static str {
        match self {
            Action::Info => "info",
            Action::GetAnnouncements => "getAnnouncements",
            Action::Register => "register",
            Action::UserInfo => "userInfo",
            Action::GroupInfo => "groupInfo",
            Action::AddGroups => "addGroups",
            Action::RemoveGroups => "removeGroups",
            Action::CreateReport => "createReport",
            Action::GetNotifications => "getNotifications",
            Action::ServerInfo => "serverInfo",
            Action::UpdateUsername => "updateUsername",
            Action::VerifyMinecraft => "verifyMinecraft",
            Action::ListUsers => "listUsers",
            Action::UpdateDiscordBotSettings => "updateDiscordBotSettings",
            Action::VerifyDiscord => "verifyDiscord",
            Action::UpdateDiscordUsernames => "updateDiscordUsernames",
            Action::GetDiscordRoles => "getDiscordRoles",
            Action::SetDiscordRoles => "setDiscordRoles",
            Action::AddDiscordRoles => "addDiscordRoles",
            Action::RemoveDiscordRoles => "removeDiscordRoles",
            Action::SubmitDiscordRoleList => "submitDiscordRoleList",
            Action::BanUser => "banUser",
            Action::WebsendGetCommands => "commands",
            Action::WebsendMarkCommandsExecuted => "markCommandsExecuted",
            Action::WebsendSendConsoleLines => "console",
        }
    }

    pub const fn method(self) -> HttpMethod {
        match self {
            Action::Info
            | Action::GetAnnouncements
            | Action::UserInfo
            | Action::GroupInfo
            | Action::GetNotifications
            | Action::ListUsers
            | Action::GetDiscordRoles
            | Action::WebsendGetCommands => HttpMethod::Get,
            _ => HttpMethod::Post,
        }
    }

    /// Path segment appended to the base URL.
    pub fn url_path(self) -> String {
        match self.module() {
            Some(module) => format!("{module}/{}", self.name()),
            None => self.name().to_string(),
        }
    }

    /// The `(method, url_path)` pair for this action.
    pub fn lookup(self) -> (HttpMethod, String) {
        (self.method(), self.url_path())
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Action[{}]", self.url_path())
    }
}
