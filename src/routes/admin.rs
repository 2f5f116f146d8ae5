// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Admin routes for the submission review queue and account removal.
//!
//! Mounted behind `require_auth` and `require_admin` in routes/mod.rs.

use crate::error::{AppError, Result};
use crate::middleware::auth::AuthUser;
use crate::models::{Submission, SubmissionStatus};
use crate::AppState;
use axum::{
    extract::{Path, Query, State},
    routing::{delete, get, post},
    Extension, Json, Router,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/admin/submissions", get(list_submissions))
        .route("/admin/submissions/{id}/approve", post(approve))
        .route("/admin/submissions/{id}/reject", post(reject))
        .route("/admin/accounts/{id}", delete(delete_account))
}

#[derive(Deserialize)]
struct ListParams {
    #[serde(default)]
    status: Option<SubmissionStatus>,
}

/// Review queue. Defaults to pending submissions.
async fn list_submissions(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Query(params): Query<ListParams>,
) -> Result<Json<Vec<Submission>>> {
    let status = params.status.unwrap_or(SubmissionStatus::Pending);
    Ok(Json(
        state
            .submissions
            .list_by_status(&admin.account_id, status)
            .await?,
    ))
}

#[derive(Deserialize)]
struct ApproveRequest {
    actual_count: i64,
}

async fn approve(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<ApproveRequest>,
) -> Result<Json<Submission>> {
    Ok(Json(
        state
            .submissions
            .approve(&admin.account_id, &id, body.actual_count, Utc::now())
            .await?,
    ))
}

#[derive(Deserialize, Default)]
struct RejectRequest {
    #[serde(default)]
    notes: Option<String>,
}

async fn reject(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
    Json(body): Json<RejectRequest>,
) -> Result<Json<Submission>> {
    Ok(Json(
        state
            .submissions
            .reject(&admin.account_id, &id, body.notes, Utc::now())
            .await?,
    ))
}

#[derive(Serialize)]
pub struct DeleteAccountResponse {
    pub account_id: String,
    pub deleted_records: usize,
}

/// Remove an account and everything stored for it.
async fn delete_account(
    State(state): State<Arc<AppState>>,
    Extension(admin): Extension<AuthUser>,
    Path(id): Path<String>,
) -> Result<Json<DeleteAccountResponse>> {
    if id == admin.account_id {
        return Err(AppError::Validation(
            "admins cannot delete their own account".to_string(),
        ));
    }

    let deleted_records = state.db.delete_account_data(&id).await?;
    if deleted_records == 0 {
        return Err(AppError::NotFound(format!("Account {}", id)));
    }

    tracing::info!(
        admin_id = %admin.account_id,
        account_id = %id,
        deleted_records,
        "Account data deleted"
    );

    Ok(Json(DeleteAccountResponse {
        account_id: id,
        deleted_records,
    }))
}
