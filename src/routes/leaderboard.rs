// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public leaderboard route.

use crate::error::Result;
use crate::models::{Gender, LeaderboardEntry, LeaderboardFilter};
use crate::AppState;
use axum::{
    extract::{Query, State},
    http::header,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde::Deserialize;
use std::sync::Arc;

pub fn routes() -> Router<Arc<AppState>> {
    Router::new().route("/leaderboard", get(get_leaderboard))
}

#[derive(Deserialize)]
struct LeaderboardParams {
    region: Option<String>,
    club: Option<String>,
    gender: Option<Gender>,
    limit: Option<usize>,
}

/// Blank query values mean "no filter".
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

async fn get_leaderboard(
    State(state): State<Arc<AppState>>,
    Query(params): Query<LeaderboardParams>,
) -> Result<impl IntoResponse> {
    let filter = LeaderboardFilter {
        region: non_empty(params.region),
        club: non_empty(params.club),
        gender: params.gender,
    };

    let entries: Vec<LeaderboardEntry> = state.leaderboard.top(&filter, params.limit).await?;

    Ok((
        [(header::CACHE_CONTROL, "public, max-age=60")],
        Json(entries),
    ))
}
