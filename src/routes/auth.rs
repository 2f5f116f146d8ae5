// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Signup, login, logout and session routes.
//!
//! Every successful authentication runs the activation state machine and
//! returns its result alongside the session token.

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Extension, Json, Router,
};
use axum_extra::extract::cookie::{Cookie, CookieJar, SameSite};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
#[cfg(feature = "binding-generation")]
use ts_rs::TS;

use crate::error::{AppError, Result};
use crate::middleware::auth::{create_jwt, AuthUser, SESSION_COOKIE, SESSION_TTL_SECS};
use crate::services::{Activation, Credentials};
use crate::AppState;

/// Non-HttpOnly hint so the frontend can tell a session exists.
pub const LOGGED_IN_COOKIE: &str = "pullup_logged_in";

/// Public auth routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/signup", post(signup))
        .route("/auth/login", post(login))
        .route("/auth/logout", post(logout))
}

/// Auth routes that need a session. Mounted behind `require_auth`.
pub fn session_routes() -> Router<Arc<AppState>> {
    Router::new().route("/auth/session", get(session))
}

#[derive(Deserialize)]
pub struct AuthRequest {
    email: String,
    password: String,
    /// Signed plan intent from an anonymous checkout request
    #[serde(default)]
    plan_intent: Option<String>,
}

#[derive(Serialize)]
#[cfg_attr(feature = "binding-generation", derive(TS))]
#[cfg_attr(
    feature = "binding-generation",
    ts(export, export_to = "web/src/lib/generated/")
)]
pub struct AuthResponse {
    pub token: String,
    pub account_id: String,
    #[cfg_attr(feature = "binding-generation", ts(type = "unknown"))]
    pub activation: Activation,
}

fn session_cookies(state: &AppState, jar: CookieJar, token: String) -> CookieJar {
    let secure = state.config.secure_cookies();
    let max_age = time::Duration::seconds(SESSION_TTL_SECS as i64);

    jar.add(
        Cookie::build((SESSION_COOKIE, token))
            .path("/")
            .http_only(true)
            .same_site(SameSite::Lax)
            .secure(secure)
            .max_age(max_age),
    )
    .add(
        Cookie::build((LOGGED_IN_COOKIE, "1"))
            .path("/")
            .same_site(SameSite::Lax)
            .secure(secure)
            .max_age(max_age),
    )
}

/// Attach any intent, run activation and issue a session.
async fn complete_authentication(
    state: &AppState,
    jar: CookieJar,
    account_id: String,
    plan_intent: Option<String>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    if let Some(intent) = plan_intent.as_deref().filter(|i| !i.is_empty()) {
        state.checkout.attach_intent(&account_id, intent).await?;
    }

    let activation = state.activation.on_authenticated(&account_id).await?;

    let token = create_jwt(&account_id, &state.config.jwt_signing_key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("JWT creation failed: {}", e)))?;

    let jar = session_cookies(state, jar, token.clone());
    Ok((
        jar,
        Json(AuthResponse {
            token,
            account_id,
            activation,
        }),
    ))
}

/// Create an account, then authenticate it.
async fn signup(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<AuthRequest>,
) -> Result<(StatusCode, CookieJar, Json<AuthResponse>)> {
    let credentials = Credentials {
        email: body.email,
        password: body.password,
    };
    let account = state.identity.sign_up(&credentials).await?;

    let (jar, response) =
        complete_authentication(&state, jar, account.id, body.plan_intent).await?;
    Ok((StatusCode::CREATED, jar, response))
}

/// Verify credentials, then authenticate.
async fn login(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Json(body): Json<AuthRequest>,
) -> Result<(CookieJar, Json<AuthResponse>)> {
    let credentials = Credentials {
        email: body.email,
        password: body.password,
    };
    let account = state.identity.sign_in(&credentials).await?;

    tracing::info!(account_id = %account.id, "Login successful");
    complete_authentication(&state, jar, account.id, body.plan_intent).await
}

/// Re-run activation for a restored session. Idempotent.
async fn session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Activation>> {
    Ok(Json(state.activation.on_authenticated(&user.account_id).await?))
}

/// Clear session cookies with the same attributes they were set with.
async fn logout(State(state): State<Arc<AppState>>, jar: CookieJar) -> (StatusCode, CookieJar) {
    let secure = state.config.secure_cookies();

    let jar = jar
        .remove(
            Cookie::build(SESSION_COOKIE)
                .path("/")
                .http_only(true)
                .same_site(SameSite::Lax)
                .secure(secure),
        )
        .remove(
            Cookie::build(LOGGED_IN_COOKIE)
                .path("/")
                .same_site(SameSite::Lax)
                .secure(secure),
        );

    (StatusCode::NO_CONTENT, jar)
}
