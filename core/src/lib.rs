//! Blocking client core for the NamelessMC website API.
//!
//! # Overview
//! Every remote operation is a variant of [`Action`]. [`RequestHandler`]
//! turns an action plus its parameters into an [`HttpRequest`], runs it
//! through a [`Transport`], and classifies the buffered [`HttpResponse`]
//! into a JSON payload or a [`NamelessError`].
//!
//! # Design
//! - The action catalog is a closed enum, so invalid actions cannot exist.
//! - Building, sending and classifying are separate steps; the transport is
//!   a trait so the first and last can be tested without a network.
//! - Configuration is frozen into an [`ApiConfig`] at build time and never
//!   changes afterwards. The handler is `Send + Sync`.
//! - All debug text passes through one redacting emitter that hides the
//!   API key.

pub mod action;
pub mod api;
pub mod config;
pub mod debug;
pub mod error;
pub mod handler;
pub mod http;
pub mod transport;
pub mod types;

pub use action::Action;
pub use api::NamelessApi;
pub use config::{ApiConfig, DebugSink, HttpVersion, NamelessApiBuilder};
pub use error::{NamelessError, Result};
pub use handler::{JsonObject, RequestHandler};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use transport::{Transport, UreqTransport};
pub use types::{FilterOperator, ListedUser, UserFilter, UserListQuery, WebsendCommand, WebsiteInfo};
