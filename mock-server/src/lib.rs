//! Fake NamelessMC website for exercising the client over real HTTP.
//!
//! The API lives at `/index.php?route=/api/v2/<action>`, so clients append
//! their parameters with `&`. A few sibling paths misbehave on purpose:
//! `/disabled` answers with the plain-text sentinel, `/moved` redirects,
//! `/cloudflare` returns an origin-down page, `/empty` returns a bodiless
//! 500 and `/slow` stalls before answering.

use std::{collections::HashMap, sync::Arc, time::Duration};

use axum::{
    extract::{Query, State},
    http::{header, HeaderMap, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

pub const API_KEY: &str = "mock-api-key";
pub const ROUTE_PREFIX: &str = "/api/v2/";
pub const SLOW_DELAY: Duration = Duration::from_millis(1500);

const INVALID_API_KEY: i64 = 1;
const INVALID_API_METHOD: i64 = 3;
const INVALID_POST_CONTENTS: i64 = 5;
const INVALID_GET_CONTENTS: i64 = 6;
const INVALID_USERNAME: i64 = 7;
const USERNAME_ALREADY_EXISTS: i64 = 11;
const UNABLE_TO_FIND_USER: i64 = 16;
const INVALID_SERVER_ID: i64 = 27;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct User {
    pub id: i64,
    pub username: String,
    pub email: String,
    pub uuid: Option<Uuid>,
    pub banned: bool,
    pub verified: bool,
    pub groups: Vec<i64>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct QueuedCommand {
    pub id: i64,
    pub command_line: String,
}

#[derive(Debug, Default)]
pub struct Site {
    pub users: Vec<User>,
    pub commands: HashMap<i64, Vec<QueuedCommand>>,
    pub console: HashMap<i64, Vec<String>>,
    pub requests: Vec<RecordedRequest>,
}

/// What the site saw of an incoming API call.
#[derive(Clone, Debug)]
pub struct RecordedRequest {
    pub method: String,
    pub route: String,
    pub user_agent: Option<String>,
}

impl Site {
    pub fn seeded() -> Self {
        let users = vec![
            User {
                id: 1,
                username: "alice".into(),
                email: "alice@example.com".into(),
                uuid: Some(Uuid::new_v4()),
                banned: false,
                verified: true,
                groups: vec![1],
            },
            User {
                id: 2,
                username: "bob".into(),
                email: "bob@example.com".into(),
                uuid: None,
                banned: true,
                verified: false,
                groups: vec![2],
            },
        ];
        let commands = HashMap::from([(
            1,
            vec![
                QueuedCommand {
                    id: 1,
                    command_line: "say hello".into(),
                },
                QueuedCommand {
                    id: 2,
                    command_line: "give alice diamond".into(),
                },
            ],
        )]);
        Self {
            users,
            commands,
            ..Self::default()
        }
    }
}

pub type Db = Arc<RwLock<Site>>;

pub fn app() -> Router {
    app_with(Arc::new(RwLock::new(Site::seeded())))
}

/// Router over caller-owned state, so tests can inspect it afterwards.
pub fn app_with(db: Db) -> Router {
    Router::new()
        .route("/index.php", get(api).post(api))
        .route("/disabled/index.php", any(disabled))
        .route("/moved/index.php", any(moved))
        .route("/cloudflare/index.php", any(cloudflare))
        .route("/empty/index.php", any(empty_error))
        .route("/slow/index.php", any(slow))
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

pub async fn run_with(listener: TcpListener, db: Db) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with(db)).await
}

fn api_error(status: StatusCode, code: i64, meta: Option<Value>) -> Response {
    let mut body = json!({ "error": true, "code": code });
    if let Some(meta) = meta {
        body["meta"] = meta;
    }
    (status, Json(body)).into_response()
}

fn ok(mut body: Value) -> Response {
    body["error"] = Value::Bool(false);
    Json(body).into_response()
}

fn authorized(headers: &HeaderMap) -> bool {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "));
    let key = headers.get("x-api-key").and_then(|v| v.to_str().ok());
    bearer == Some(API_KEY) && key == Some(API_KEY)
}

async fn api(
    State(db): State<Db>,
    method: Method,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    body: String,
) -> Response {
    let route = query
        .get("route")
        .and_then(|r| r.strip_prefix(ROUTE_PREFIX))
        .unwrap_or_default()
        .to_string();

    db.write().await.requests.push(RecordedRequest {
        method: method.to_string(),
        route: route.clone(),
        user_agent: headers
            .get(header::USER_AGENT)
            .and_then(|v| v.to_str().ok())
            .map(str::to_string),
    });

    if !authorized(&headers) {
        return api_error(StatusCode::FORBIDDEN, INVALID_API_KEY, None);
    }

    if method == Method::GET {
        match route.as_str() {
            "info" => ok(json!({
                "nameless_version": "2.1.2",
                "modules": ["Core", "Forum", "Websend"],
                "locale": "en_UK",
            })),
            "listUsers" => list_users(&db, &query).await,
            "userInfo" => user_info(&db, &query).await,
            "websend/commands" => websend_commands(&db, &query).await,
            _ => api_error(StatusCode::BAD_REQUEST, INVALID_API_METHOD, None),
        }
    } else {
        let Ok(payload) = serde_json::from_str::<Value>(&body) else {
            return api_error(StatusCode::BAD_REQUEST, INVALID_POST_CONTENTS, None);
        };
        match route.as_str() {
            "register" => register(&db, &payload).await,
            "banUser" => ban_user(&db, &payload).await,
            "websend/markCommandsExecuted" => mark_executed(&db, &payload).await,
            "websend/console" => console(&db, &payload).await,
            _ => api_error(StatusCode::BAD_REQUEST, INVALID_API_METHOD, None),
        }
    }
}

fn user_json(user: &User) -> Value {
    json!({
        "id": user.id,
        "username": user.username,
        "banned": user.banned,
        "verified": user.verified,
        "groups": user.groups,
    })
}

async fn list_users(db: &Db, query: &HashMap<String, String>) -> Response {
    let match_any = query.get("operator").map(String::as_str) == Some("OR");
    let checks: Vec<Box<dyn Fn(&User) -> bool + Send>> = [
        query.get("banned").map(|v| {
            let want = v == "true";
            Box::new(move |u: &User| u.banned == want) as Box<dyn Fn(&User) -> bool + Send>
        }),
        query.get("verified").map(|v| {
            let want = v == "true";
            Box::new(move |u: &User| u.verified == want) as Box<dyn Fn(&User) -> bool + Send>
        }),
        query.get("group_id").map(|v| {
            let want = v.parse::<i64>().unwrap_or(-1);
            Box::new(move |u: &User| u.groups.contains(&want)) as Box<dyn Fn(&User) -> bool + Send>
        }),
        // Only the Minecraft integration exists here; a linked account has a UUID.
        query.get("integration").map(|v| {
            let minecraft = v.eq_ignore_ascii_case("Minecraft");
            Box::new(move |u: &User| minecraft && u.uuid.is_some()) as Box<dyn Fn(&User) -> bool + Send>
        }),
    ]
    .into_iter()
    .flatten()
    .collect();

    let site = db.read().await;
    let users: Vec<Value> = site
        .users
        .iter()
        .filter(|u| {
            if checks.is_empty() {
                true
            } else if match_any {
                checks.iter().any(|c| c(u))
            } else {
                checks.iter().all(|c| c(u))
            }
        })
        .map(user_json)
        .collect();
    ok(json!({ "users": users }))
}

async fn user_info(db: &Db, query: &HashMap<String, String>) -> Response {
    let site = db.read().await;
    let found = if let Some(id) = query.get("id") {
        let id = id.parse::<i64>().unwrap_or(-1);
        site.users.iter().find(|u| u.id == id)
    } else if let Some(name) = query.get("username") {
        site.users.iter().find(|u| &u.username == name)
    } else {
        return api_error(StatusCode::BAD_REQUEST, INVALID_GET_CONTENTS, None);
    };
    match found {
        Some(user) => {
            let mut body = user_json(user);
            body["exists"] = Value::Bool(true);
            ok(body)
        }
        None => api_error(StatusCode::NOT_FOUND, UNABLE_TO_FIND_USER, None),
    }
}

async fn websend_commands(db: &Db, query: &HashMap<String, String>) -> Response {
    let Some(server_id) = query.get("server_id").and_then(|v| v.parse::<i64>().ok()) else {
        return api_error(StatusCode::BAD_REQUEST, INVALID_SERVER_ID, None);
    };
    let site = db.read().await;
    let commands = site.commands.get(&server_id).cloned().unwrap_or_default();
    ok(json!({ "commands": commands }))
}

async fn register(db: &Db, payload: &Value) -> Response {
    let username = payload["username"].as_str().unwrap_or_default().trim();
    let email = payload["email"].as_str().unwrap_or_default();
    if username.is_empty() || username.len() > 20 {
        return api_error(
            StatusCode::BAD_REQUEST,
            INVALID_USERNAME,
            Some(json!({ "field": "username" })),
        );
    }

    let mut site = db.write().await;
    if site.users.iter().any(|u| u.username.eq_ignore_ascii_case(username)) {
        return api_error(StatusCode::BAD_REQUEST, USERNAME_ALREADY_EXISTS, None);
    }
    let id = site.users.iter().map(|u| u.id).max().unwrap_or(0) + 1;
    site.users.push(User {
        id,
        username: username.to_string(),
        email: email.to_string(),
        uuid: None,
        banned: false,
        verified: false,
        groups: vec![1],
    });
    ok(json!({ "user_id": id }))
}

async fn ban_user(db: &Db, payload: &Value) -> Response {
    let Some(id) = payload["user"].as_i64() else {
        return api_error(StatusCode::BAD_REQUEST, INVALID_POST_CONTENTS, None);
    };
    let mut site = db.write().await;
    match site.users.iter_mut().find(|u| u.id == id) {
        Some(user) => {
            user.banned = true;
            ok(json!({}))
        }
        None => api_error(StatusCode::NOT_FOUND, UNABLE_TO_FIND_USER, None),
    }
}

async fn mark_executed(db: &Db, payload: &Value) -> Response {
    let Some(server_id) = payload["server_id"].as_i64() else {
        return api_error(StatusCode::BAD_REQUEST, INVALID_SERVER_ID, None);
    };
    let executed: Vec<i64> = payload["commands"]
        .as_array()
        .map(|ids| ids.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default();
    let mut site = db.write().await;
    if let Some(queue) = site.commands.get_mut(&server_id) {
        queue.retain(|c| !executed.contains(&c.id));
    }
    ok(json!({}))
}

async fn console(db: &Db, payload: &Value) -> Response {
    let Some(server_id) = payload["server_id"].as_i64() else {
        return api_error(StatusCode::BAD_REQUEST, INVALID_SERVER_ID, None);
    };
    let lines: Vec<String> = payload["content"]
        .as_array()
        .map(|ls| ls.iter().filter_map(|l| l.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    db.write().await.console.entry(server_id).or_default().extend(lines);
    ok(json!({}))
}

async fn disabled() -> &'static str {
    "API is disabled"
}

async fn moved() -> Response {
    (
        StatusCode::FOUND,
        [(header::LOCATION, "https://www.example.com/index.php")],
        "<html><body>Moved</body></html>",
    )
        .into_response()
}

async fn cloudflare() -> Response {
    (
        StatusCode::from_u16(521).unwrap_or(StatusCode::BAD_GATEWAY),
        "<html><title>Web server is down</title>\x01</html>",
    )
        .into_response()
}

async fn empty_error() -> StatusCode {
    StatusCode::INTERNAL_SERVER_ERROR
}

async fn slow() -> Response {
    tokio::time::sleep(SLOW_DELAY).await;
    ok(json!({}))
}
