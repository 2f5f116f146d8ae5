// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Subscription request route. Works with or without a session.

use crate::config::CheckoutMode;
use crate::error::Result;
use crate::middleware::auth::optional_auth;
use crate::models::Plan;
use crate::services::SubscriptionRequest;
use crate::AppState;
use axum::{extract::State, http::HeaderMap, routing::post, Json, Router};
use axum_extra::extract::cookie::CookieJar;
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/checkout", post(request_subscription))
}

#[derive(Deserialize)]
struct CheckoutBody {
    plan: Plan,
    #[serde(default)]
    mode: Option<CheckoutMode>,
}

/// Anonymous callers get a signed intent and a signup redirect.
/// Signed-in callers get a processor checkout session.
async fn request_subscription(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    headers: HeaderMap,
    Json(body): Json<CheckoutBody>,
) -> Result<Json<SubscriptionRequest>> {
    let user = optional_auth(&state, &jar, &headers);
    let account_id = user.as_ref().map(|u| u.account_id.as_str());

    Ok(Json(
        state
            .checkout
            .request_subscription(body.plan, account_id, body.mode)
            .await?,
    ))
}
