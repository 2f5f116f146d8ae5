// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Public leaderboard.

use crate::db::Database;
use crate::error::Result;
use crate::models::leaderboard::rank;
use crate::models::{LeaderboardEntry, LeaderboardFilter, SubmissionStatus};
use futures_util::{stream, StreamExt};

pub const DEFAULT_LIMIT: usize = 50;
pub const MAX_LIMIT: usize = 200;

const MAX_CONCURRENT_DB_OPS: usize = 16;

#[derive(Clone)]
pub struct LeaderboardService {
    db: Database,
}

impl LeaderboardService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Top entries matching `filter`, with display names attached.
    pub async fn top(
        &self,
        filter: &LeaderboardFilter,
        limit: Option<usize>,
    ) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);

        let approved = self
            .db
            .get_submissions_by_status(SubmissionStatus::Approved)
            .await?;
        let mut entries = rank(&approved, filter);
        entries.truncate(limit);

        let ids: Vec<String> = entries.iter().map(|e| e.account_id.clone()).collect();
        let names: Vec<Option<String>> = stream::iter(ids)
            .map(|account_id| {
                let db = self.db.clone();
                async move {
                    match db.get_profile(&account_id).await {
                        Ok(profile) => profile.and_then(|p| p.display_name),
                        Err(e) => {
                            tracing::warn!(account_id = %account_id, error = %e, "Display name lookup failed");
                            None
                        }
                    }
                }
            })
            .buffered(MAX_CONCURRENT_DB_OPS)
            .collect()
            .await;

        for (entry, name) in entries.iter_mut().zip(names) {
            entry.display_name = name;
        }

        Ok(entries)
    }
}
