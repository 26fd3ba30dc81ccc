//! Payload types for the typed helpers on [`NamelessApi`].
//!
//! [`NamelessApi`]: crate::api::NamelessApi

use std::fmt;

use serde::{Deserialize, Serialize};

/// Subset of the `info` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsiteInfo {
    pub nameless_version: String,
    #[serde(default)]
    pub modules: Vec<String>,
    #[serde(default)]
    pub locale: Option<String>,
}

/// One entry of the `listUsers` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ListedUser {
    pub id: i64,
    pub username: String,
    #[serde(default)]
    pub banned: bool,
    #[serde(default)]
    pub verified: bool,
}

/// A command queued for a game server by the websend module.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WebsendCommand {
    pub id: i64,
    #[serde(rename = "command_line")]
    pub command: String,
}

/// Filter accepted by `listUsers`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserFilter {
    Banned(bool),
    Verified(bool),
    GroupId(i64),
    Integration(String),
}

impl UserFilter {
    pub fn name(&self) -> &'static str {
        match self {
            UserFilter::Banned(_) => "banned",
            UserFilter::Verified(_) => "verified",
            UserFilter::GroupId(_) => "group_id",
            UserFilter::Integration(_) => "integration",
        }
    }

    pub fn value(&self) -> String {
        match self {
            UserFilter::Banned(b) | UserFilter::Verified(b) => b.to_string(),
            UserFilter::GroupId(id) => id.to_string(),
            UserFilter::Integration(name) => name.clone(),
        }
    }
}

/// How multiple filters combine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FilterOperator {
    #[default]
    All,
    Any,
}

impl fmt::Display for FilterOperator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FilterOperator::All => f.write_str("AND"),
            FilterOperator::Any => f.write_str("OR"),
        }
    }
}

/// Query for `listUsers`. A filter replaces any earlier filter of the same
/// kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserListQuery {
    filters: Vec<UserFilter>,
    operator: FilterOperator,
}

impl UserListQuery {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_filter(mut self, filter: UserFilter) -> Self {
        self.filters.retain(|f| f.name() != filter.name());
        self.filters.push(filter);
        self
    }

    /// Users must match every filter.
    pub fn all(mut self) -> Self {
        self.operator = FilterOperator::All;
        self
    }

    /// Users must match at least one filter.
    pub fn any(mut self) -> Self {
        self.operator = FilterOperator::Any;
        self
    }

    pub fn filters(&self) -> &[UserFilter] {
        &self.filters
    }

    /// Flat key/value list for `listUsers`. Groups are always requested.
    pub fn to_parameters(&self) -> Vec<(String, String)> {
        let mut params = vec![("groups".to_string(), "1".to_string())];
        if !self.filters.is_empty() {
            params.push(("operator".to_string(), self.operator.to_string()));
            params.push(("limit".to_string(), "0".to_string()));
            params.extend(self.filters.iter().map(|f| (f.name().to_string(), f.value())));
        }
        params
    }
}
