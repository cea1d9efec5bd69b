// src/server/handlers.rs
//! HTTP handlers for the broker endpoints

use super::ServerState;
use super::auth::{REFRESH_WINDOW, TOKEN_TTL, cookie_value, parse_basic_auth};
use crate::error::Error;
use crate::export::ExportComponents;
use crate::job::JobId;
use crate::token::{SESSION_COOKIE, TokenClaims};
use crate::upload::summarize;
use axum::{
    Json,
    body::Bytes,
    extract::{Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::Utc;
use regex::Regex;
use std::collections::HashMap;
use std::sync::{Arc, LazyLock};
use tracing::{error, info, warn};

static REPOSITORY_NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_.-]+$").unwrap());

/// Whether a repository name only uses letters, digits, `_`, `-` and `.`
pub fn is_valid_repository_name(name: &str) -> bool {
    REPOSITORY_NAME_RE.is_match(name)
}

/// 422 with a JSON string body
fn unprocessable(message: String) -> Response {
    (StatusCode::UNPROCESSABLE_ENTITY, Json(message)).into_response()
}

fn unauthorized(message: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        [(header::WWW_AUTHENTICATE, "Basic realm=\"nexus-relay\"")],
        message.to_string(),
    )
        .into_response()
}

/// Validate the session cookie of a request
fn require_session(state: &ServerState, headers: &HeaderMap) -> Result<TokenClaims, Response> {
    let token = headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .find_map(|value| cookie_value(value, SESSION_COOKIE))
        .ok_or_else(|| unauthorized("missing session cookie"))?;

    state
        .keys
        .verify(token)
        .map_err(|e| unauthorized(&e.to_string()))
}

fn session_response(state: &ServerState, username: &str) -> Response {
    let issued = state.keys.issue(username, TOKEN_TTL);
    (
        StatusCode::OK,
        [(header::SET_COOKIE, issued.cookie())],
        format!("Welcome {username}"),
    )
        .into_response()
}

/// Liveness check
pub async fn status() -> &'static str {
    "Status OK"
}

/// Version handshake
pub async fn version(State(state): State<Arc<ServerState>>) -> impl IntoResponse {
    Json(state.version.clone())
}

/// Exchange Basic credentials for a session cookie
pub async fn login(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    let Some((username, password)) = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(parse_basic_auth)
    else {
        return unauthorized("basic credentials required");
    };

    if !state.check_credentials(&username, &password) {
        warn!("Rejected login for '{}'", username);
        return unauthorized("invalid credentials");
    }

    info!("Issued session for '{}'", username);
    session_response(&state, &username)
}

/// Renew a session that is about to expire
pub async fn refresh(State(state): State<Arc<ServerState>>, headers: HeaderMap) -> Response {
    let claims = match require_session(&state, &headers) {
        Ok(claims) => claims,
        Err(response) => return response,
    };

    let remaining = claims.exp - Utc::now().timestamp();
    if remaining > REFRESH_WINDOW.num_seconds() {
        return (
            StatusCode::BAD_REQUEST,
            format!("session token still valid for {remaining}s"),
        )
            .into_response();
    }

    session_response(&state, &claims.username)
}

/// Accept an export payload and start uploading it in the background
pub async fn submit_components(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    body: Bytes,
) -> Response {
    if let Err(response) = require_session(&state, &headers) {
        return response;
    }

    let Some(repository) = params.get("repository").cloned() else {
        return unprocessable("error: missing 'repository' query parameter".to_string());
    };
    if !is_valid_repository_name(&repository) {
        return unprocessable(format!(
            "error: only letters, digits, underscores(_), hyphens(-), and dots(.) are allowed \
             in repository name. but got: '{repository}'"
        ));
    }

    let export: ExportComponents = match serde_json::from_slice(&body) {
        Ok(export) => export,
        Err(e) => return unprocessable(format!("error: malformed components payload: {e}")),
    };

    let job = state.jobs.create();
    info!(
        "Job {} accepted: {} components, {} assets for repository '{}' at {}",
        job.id,
        export.items.len(),
        export.asset_count(),
        repository,
        export.nexus_server.host
    );

    let jobs = state.jobs.clone();
    let uploader = state.uploader.clone();
    let id = job.id;
    tokio::spawn(async move {
        let results = uploader.upload_all(&export, &repository).await;
        let failed = results.iter().filter(|r| r.error.is_some()).count();
        info!(
            "Job {} finished: {} units, {} failed",
            id,
            results.len(),
            failed
        );
        if let Err(e) = jobs.complete(&id, summarize(&results, &repository)) {
            error!("Unable to complete job {}: {}", id, e);
        }
    });

    Json(job).into_response()
}

/// Report the state of a job, removing it once its completion is delivered
pub async fn poll_job(
    State(state): State<Arc<ServerState>>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if let Err(response) = require_session(&state, &headers) {
        return response;
    }

    let Some(raw_id) = params.get("uuid") else {
        return unprocessable("error: missing 'uuid' query parameter".to_string());
    };
    let id: JobId = match raw_id.parse() {
        Ok(id) => id,
        Err(e) => return unprocessable(format!("error: invalid uuid '{raw_id}': {e}")),
    };

    match state.jobs.observe(&id) {
        Ok(job) => Json(job).into_response(),
        Err(Error::NotFoundError(_)) => {
            (StatusCode::NOT_FOUND, format!("job {id} not found")).into_response()
        }
        Err(e) => (StatusCode::INTERNAL_SERVER_ERROR, e.to_string()).into_response(),
    }
}
