// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! JWT authentication middleware.
//!
//! Tokens identify the account only. Roles are looked up per request.

use crate::error::AppError;
use crate::AppState;
use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::cookie::CookieJar;
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Session cookie name.
pub const SESSION_COOKIE: &str = "pullup_token";

/// Session lifetime in seconds.
pub const SESSION_TTL_SECS: usize = 30 * 24 * 60 * 60;

/// JWT claims structure.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject (account ID)
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: usize,
    /// Issued at (Unix timestamp)
    pub iat: usize,
}

/// Authenticated account extracted from JWT.
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub account_id: String,
}

/// Session token from the cookie, falling back to a bearer header.
fn session_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok())
        .and_then(|h| h.strip_prefix("Bearer "))
        .map(str::to_string)
}

/// Validate a session token and return its account ID.
pub fn verify_jwt(token: &str, signing_key: &[u8]) -> Option<String> {
    let key = DecodingKey::from_secret(signing_key);
    let validation = Validation::new(Algorithm::HS256);

    let token_data = decode::<Claims>(token, &key, &validation).ok()?;
    let sub = token_data.claims.sub;
    (!sub.is_empty()).then_some(sub)
}

/// Account of the caller, if a valid session is presented.
pub fn optional_auth(state: &AppState, jar: &CookieJar, headers: &HeaderMap) -> Option<AuthUser> {
    let token = session_token(jar, headers)?;
    verify_jwt(&token, &state.config.jwt_signing_key).map(|account_id| AuthUser { account_id })
}

/// Middleware that requires valid JWT authentication.
pub async fn require_auth(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let auth_user =
        optional_auth(&state, &jar, request.headers()).ok_or(AppError::Unauthorized)?;

    request.extensions_mut().insert(auth_user);

    Ok(next.run(request).await)
}

/// Middleware that requires the caller to hold the admin role.
///
/// Runs after `require_auth`. Membership comes from the admin-roles
/// relation, never from the token.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let account_id = request
        .extensions()
        .get::<AuthUser>()
        .map(|u| u.account_id.clone())
        .ok_or(AppError::Unauthorized)?;

    if !state.db.is_admin(&account_id).await? {
        tracing::warn!(account_id = %account_id, "Non-admin attempted admin route");
        return Err(AppError::Forbidden("admin role required".to_string()));
    }

    Ok(next.run(request).await)
}

/// Create a JWT for an account session.
pub fn create_jwt(account_id: &str, signing_key: &[u8]) -> anyhow::Result<String> {
    use jsonwebtoken::{encode, EncodingKey, Header};
    use std::time::{SystemTime, UNIX_EPOCH};

    let now = SystemTime::now().duration_since(UNIX_EPOCH)?.as_secs() as usize;

    let claims = Claims {
        sub: account_id.to_string(),
        iat: now,
        exp: now + SESSION_TTL_SECS,
    };

    Ok(encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(signing_key),
    )?)
}
