use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use canopy_pigeon::PigeonClient;
use serde_json::Value;

use crate::error::RestError;
use crate::request_info::RestRequestInfo;
use crate::session::{self, SessionStore};

/// Shared dependencies handed to every axum route handler: the bus client
/// used to `Launch` onto the job server, and the local session store that
/// turns a `canopy_session` cookie into an account username.
#[derive(Clone)]
pub struct RestState {
    pub pigeon: PigeonClient,
    pub sessions: Arc<SessionStore>,
}

async fn dispatch(
    state: &RestState,
    key: &str,
    headers: &HeaderMap,
    url_vars: HashMap<String, String>,
    query: HashMap<String, String>,
    body: Value,
) -> Result<Value, RestError> {
    let account_username = headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| session::parse_cookie(h, session::SESSION_COOKIE))
        .map(str::to_string);

    let account_username = match account_username {
        Some(token) => state.sessions.lookup(&token).await,
        None => None,
    };

    let info = RestRequestInfo { account_username, url_vars, query, body };
    let request = info.into_request();

    let response = state.pigeon.launch(key, request).await?;

    match response.err {
        Some(e) => Err(RestError::from_wire(&e)),
        None => Ok(Value::Object(response.body)),
    }
}

fn query_map(q: &Query<HashMap<String, String>>) -> HashMap<String, String> {
    q.0.clone()
}

macro_rules! route_handler {
    ($name:ident, $key:expr) => {
        async fn $name(
            State(state): State<RestState>,
            headers: HeaderMap,
            Path(path): Path<HashMap<String, String>>,
            query: Query<HashMap<String, String>>,
            body: axum::body::Bytes,
        ) -> Response {
            let body = parse_body(&body);
            match dispatch(&state, $key, &headers, path, query_map(&query), body).await {
                Ok(v) => (StatusCode::OK, Json(v)).into_response(),
                Err(e) => e.into_response(),
            }
        }
    };
}

fn parse_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(bytes).unwrap_or(Value::Null)
    }
}

route_handler!(login_route, "api/login");
route_handler!(logout_route, "api/logout");
route_handler!(create_account_route, "api/create_account");
route_handler!(activate_route, "api/activate");
route_handler!(reset_password_route, "api/reset_password");
route_handler!(list_devices_route, "api/devices");
route_handler!(get_device_route, "GET:api/device/id");
route_handler!(update_device_route, "POST:api/device/id");
route_handler!(delete_device_route, "DELETE:api/device/id");
route_handler!(get_device_var_route, "api/device/id/var");
route_handler!(share_route, "api/share");
route_handler!(finish_share_transaction_route, "api/finish_share_transaction");
route_handler!(get_self_route, "GET:api/user/self");
route_handler!(update_self_route, "POST:api/user/self");
route_handler!(delete_self_route, "DELETE:api/user/self");
route_handler!(get_self_orgs_route, "api/user/self/orgs");
route_handler!(create_org_route, "api/create_org");
route_handler!(get_org_members_route, "GET:api/org/name/members");
route_handler!(add_org_member_route, "POST:api/org/name/members");
route_handler!(add_team_route, "POST:api/org/name/add_team");
route_handler!(delete_team_route, "DELETE:api/org/name/team/alias");
route_handler!(info_route, "api/info");

/// Login is the one route that also mints a session cookie locally, since
/// the bus call that verifies the password may be answered by a different
/// host than the one holding the cookie store.
async fn login_with_cookie(
    State(state): State<RestState>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let body = parse_body(&body);
    match dispatch(&state, "api/login", &headers, HashMap::new(), HashMap::new(), body).await {
        Ok(v) => {
            let username = v.get("username").and_then(Value::as_str).unwrap_or_default();
            let token = state.sessions.create(username).await;
            let cookie = session::session_cookie_header(&token);
            (
                StatusCode::OK,
                [(axum::http::header::SET_COOKIE, cookie)],
                Json(v),
            )
                .into_response()
        },
        Err(e) => e.into_response(),
    }
}

async fn logout_with_cookie(
    State(state): State<RestState>,
    headers: HeaderMap,
) -> Response {
    if let Some(token) = headers
        .get(axum::http::header::COOKIE)
        .and_then(|v| v.to_str().ok())
        .and_then(|h| session::parse_cookie(h, session::SESSION_COOKIE))
    {
        state.sessions.delete(token).await;
    }
    (
        StatusCode::OK,
        [(axum::http::header::SET_COOKIE, session::expired_cookie_header())],
        Json(serde_json::json!({ "ok": true })),
    )
        .into_response()
}

async fn health() -> &'static str {
    "ok"
}

/// Builds the full REST surface: a thin `(method, path)` -> routing key map,
/// exactly mirroring the original job router's route table.
pub fn router(state: RestState) -> Router {
    Router::new()
        .route("/healthz", get(health))
        .route("/api/login", post(login_with_cookie))
        .route("/api/logout", get(logout_with_cookie).post(logout_with_cookie))
        .route("/api/create_account", post(create_account_route))
        .route("/api/activate", post(activate_route))
        .route("/api/reset_password", post(reset_password_route))
        .route("/api/devices", get(list_devices_route))
        .route(
            "/api/device/{id}",
            get(get_device_route).post(update_device_route).delete(delete_device_route),
        )
        .route("/api/device/{id}/{var}", get(get_device_var_route))
        .route("/api/share", post(share_route))
        .route("/api/finish_share_transaction", post(finish_share_transaction_route))
        .route(
            "/api/user/self",
            get(get_self_route).post(update_self_route).delete(delete_self_route),
        )
        .route("/api/user/self/orgs", get(get_self_orgs_route))
        .route("/api/create_org", post(create_org_route))
        .route(
            "/api/org/{name}/members",
            get(get_org_members_route).post(add_org_member_route),
        )
        .route("/api/org/{name}/add_team", post(add_team_route))
        .route("/api/org/{name}/team/{alias}", delete(delete_team_route))
        .route("/api/info", get(info_route))
        .with_state(state)
}
