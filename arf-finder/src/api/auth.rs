//! OAuth login, logout and the home page callback

use super::ENTERPRISE_COOKIE;
use crate::auth::CredentialProvider;
use crate::error::{ApiError, ApiResult};
use crate::AppState;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, warn};

#[derive(Debug, Deserialize)]
pub struct HomeQuery {
    pub code: Option<String>,
}

fn found(location: &str) -> Response {
    (StatusCode::FOUND, [(header::LOCATION, location.to_string())]).into_response()
}

/// GET /auth/login
///
/// Redirects the browser to the platform's authorization page.
pub async fn login(State(state): State<AppState>) -> ApiResult<Response> {
    let url = state.tokens.authorize_url()?;
    Ok(found(&url))
}

/// GET /auth/logout
pub async fn logout(State(state): State<AppState>) -> Json<serde_json::Value> {
    state.tokens.invalidate().await;
    info!("User logged out, tokens invalidated");
    Json(json!({ "status": "logged_out" }))
}

/// GET /
///
/// With `?code=` this is the OAuth callback: exchange the code, remember the
/// enterprise id in a cookie and bounce back to `/`. Otherwise serve the
/// single-page UI.
pub async fn home(
    State(state): State<AppState>,
    Query(query): Query<HomeQuery>,
) -> ApiResult<Response> {
    if let Some(code) = query.code.filter(|c| !c.is_empty()) {
        state.tokens.exchange_code(&code).await?;
        let enterprise_id = state.tokens.enterprise_id().await?;
        info!(enterprise_id = %enterprise_id, "OAuth login completed");

        let cookie = format!(
            "{}={}; Path=/; HttpOnly; Secure; SameSite=None",
            ENTERPRISE_COOKIE, enterprise_id
        );
        let mut response = found("/");
        let value = cookie
            .parse()
            .map_err(|_| ApiError::Internal("invalid enterprise id cookie".to_string()))?;
        response.headers_mut().insert(header::SET_COOKIE, value);
        return Ok(response);
    }

    let dir = state
        .static_dir
        .as_ref()
        .ok_or_else(|| ApiError::NotFound("no home page configured".to_string()))?;
    let index = dir.join("index.html");
    match tokio::fs::read_to_string(&index).await {
        Ok(page) => Ok(Html(page).into_response()),
        Err(e) => {
            warn!(path = %index.display(), error = %e, "Home page unavailable");
            Err(ApiError::NotFound("home page".to_string()))
        }
    }
}

/// Build OAuth and home page routes
pub fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/", get(home))
        .route("/auth/login", get(login))
        .route("/auth/logout", get(logout))
}
