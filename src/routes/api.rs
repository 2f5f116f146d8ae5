// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API routes for authenticated members.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{
    BadgeProgress, Eligibility, PaymentStage, Profile, ProfileUpdate, Role, Submission,
    Subscription,
};
use crate::services::NewSubmission;
use crate::AppState;
use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::get,
    Extension, Json, Router,
};
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;
use validator::Validate;

/// API routes (require authentication via JWT).
/// The auth middleware is applied in routes/mod.rs for these routes.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/me", get(get_me).put(update_me))
        .route("/api/subscription", get(get_subscription))
        .route("/api/checkout/session/{session_id}", get(get_checkout_session))
        .route("/api/eligibility", get(get_eligibility))
        .route("/api/submissions", get(list_submissions).post(create_submission))
        .route("/api/badge", get(get_badge))
}

// ─── Profile ─────────────────────────────────────────────────

/// Current member response.
#[derive(Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub profile: Profile,
    pub role: Role,
}

async fn load_profile(state: &AppState, account_id: &str) -> Result<Profile> {
    let account = state
        .db
        .get_account(account_id)
        .await?
        .ok_or(AppError::Unauthorized)?;
    Ok(state.activation.resolve_profile(&account.id, &account.email).await)
}

/// Get the caller's profile.
async fn get_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<MeResponse>> {
    let profile = load_profile(&state, &user.account_id).await?;
    let role = Role::from_admin_flag(state.db.is_admin(&user.account_id).await?);
    Ok(Json(MeResponse { profile, role }))
}

/// Edit the caller's profile.
///
/// Payment fields are not editable here; they only change through webhooks.
async fn update_me(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(update): Json<ProfileUpdate>,
) -> Result<Json<MeResponse>> {
    update.validate()?;

    let profile = match state
        .db
        .update_profile(&user.account_id, update.clone(), Utc::now())
        .await?
    {
        Some(profile) => profile,
        None => {
            // Signup's default profile write was lost. Provision it now.
            let mut profile = load_profile(&state, &user.account_id).await?;
            profile.apply_update(update, Utc::now());
            state.db.upsert_profile(&profile).await?;
            profile
        }
    };

    tracing::info!(
        account_id = %user.account_id,
        completed = profile.is_profile_completed,
        "Profile updated"
    );

    let role = Role::from_admin_flag(state.db.is_admin(&user.account_id).await?);
    Ok(Json(MeResponse { profile, role }))
}

// ─── Subscription ────────────────────────────────────────────

#[derive(Serialize)]
pub struct SubscriptionResponse {
    pub payment_stage: PaymentStage,
    /// Webhook-confirmed payment flag
    pub is_paid: bool,
    pub subscriptions: Vec<Subscription>,
}

/// Mirrored subscription state for the caller.
async fn get_subscription(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<SubscriptionResponse>> {
    let subscriptions = state
        .db
        .get_subscriptions_for_account(&user.account_id)
        .await?;
    let is_paid = state
        .db
        .get_profile(&user.account_id)
        .await?
        .is_some_and(|p| p.is_paid);

    Ok(Json(SubscriptionResponse {
        payment_stage: PaymentStage::from_subscriptions(&subscriptions),
        is_paid,
        subscriptions,
    }))
}

#[derive(Serialize)]
pub struct CheckoutSessionResponse {
    pub session_id: String,
    pub status: Option<String>,
    pub payment_status: Option<String>,
    /// Webhook-confirmed payment flag. The session status above is only
    /// provisional until this flips.
    pub is_paid: bool,
}

/// Provisional checkout status for the return page.
///
/// Read only. Activation happens when the webhook arrives.
async fn get_checkout_session(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Path(session_id): Path<String>,
) -> Result<Json<CheckoutSessionResponse>> {
    let session = state.payments.retrieve_session(&session_id).await?;
    if session.account_id() != Some(user.account_id.as_str()) {
        tracing::warn!(
            account_id = %user.account_id,
            session_id = %session_id,
            "Checkout session belongs to another account"
        );
        return Err(AppError::NotFound(format!("checkout session {}", session_id)));
    }
    let is_paid = state
        .db
        .get_profile(&user.account_id)
        .await?
        .is_some_and(|p| p.is_paid);

    Ok(Json(CheckoutSessionResponse {
        session_id: session.session_id,
        status: session.status,
        payment_status: session.payment_status,
        is_paid,
    }))
}

// ─── Submissions ─────────────────────────────────────────────

#[derive(Serialize)]
pub struct EligibilityResponse {
    pub eligible: bool,
    pub reason: String,
    #[serde(flatten)]
    pub eligibility: Eligibility,
}

/// Whether the caller may submit now.
async fn get_eligibility(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<EligibilityResponse>> {
    let eligibility = state
        .submissions
        .check_eligibility(&user.account_id, Utc::now())
        .await?;

    Ok(Json(EligibilityResponse {
        eligible: eligibility.is_eligible(),
        reason: eligibility.reason(),
        eligibility,
    }))
}

async fn create_submission(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
    Json(request): Json<NewSubmission>,
) -> Result<(StatusCode, Json<Submission>)> {
    let submission = state
        .submissions
        .submit(&user.account_id, request, Utc::now())
        .await?;
    Ok((StatusCode::CREATED, Json(submission)))
}

async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<Vec<Submission>>> {
    Ok(Json(
        state.submissions.list_for_account(&user.account_id).await?,
    ))
}

async fn get_badge(
    State(state): State<Arc<AppState>>,
    Extension(user): Extension<AuthUser>,
) -> Result<Json<BadgeProgress>> {
    Ok(Json(state.submissions.badge(&user.account_id).await?))
}
