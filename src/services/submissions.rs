// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Submission eligibility and admin review.

use crate::db::{Database, ReviewOutcome};
use crate::error::{AppError, Result};
use crate::models::{
    BadgeProgress, Eligibility, Gender, Platform, ReviewDecision, Submission, SubmissionStatus,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use validator::Validate;

/// Largest count accepted from members or reviewers.
pub const MAX_PULL_UPS: i64 = 1000;

/// A member's new submission. Leaderboard fields default to the profile.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct NewSubmission {
    #[validate(range(min = 1, max = 1000, message = "must be a positive count"))]
    pub claimed_count: i64,
    #[validate(length(min = 1, max = 2048))]
    pub video_url: String,
    #[validate(length(max = 80))]
    pub region: Option<String>,
    #[validate(length(max = 120))]
    pub club: Option<String>,
    pub gender: Option<Gender>,
}

/// Submission workflow over the database.
#[derive(Clone)]
pub struct SubmissionService {
    db: Database,
}

impl SubmissionService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Whether the account may submit at `now`.
    pub async fn check_eligibility(&self, account_id: &str, now: DateTime<Utc>) -> Result<Eligibility> {
        let submissions = self.db.get_submissions_for_account(account_id).await?;
        Ok(Eligibility::evaluate(&submissions, now))
    }

    /// Create a pending submission.
    ///
    /// The eligibility check here gives a friendly reason; the database guard
    /// is what actually prevents two pending submissions from a race.
    pub async fn submit(
        &self,
        account_id: &str,
        request: NewSubmission,
        now: DateTime<Utc>,
    ) -> Result<Submission> {
        request.validate()?;
        let claimed_count = u32::try_from(request.claimed_count)
            .map_err(|_| AppError::Validation("claimed_count: must be a positive count".to_string()))?;
        let platform = Platform::classify(&request.video_url).ok_or_else(|| {
            AppError::Validation("video_url: not a recognizable video link".to_string())
        })?;

        let eligibility = self.check_eligibility(account_id, now).await?;
        if !eligibility.is_eligible() {
            return Err(AppError::Eligibility(eligibility.reason()));
        }

        let profile = self.db.get_profile(account_id).await?;
        let non_empty = |s: Option<String>| s.filter(|v| !v.trim().is_empty());

        let submission = Submission {
            id: uuid::Uuid::new_v4().to_string(),
            account_id: account_id.to_string(),
            claimed_count,
            actual_pull_up_count: None,
            video_url: request.video_url.trim().to_string(),
            platform,
            status: SubmissionStatus::Pending,
            submitted_at: now,
            approved_at: None,
            reviewed_at: None,
            reviewed_by: None,
            notes: None,
            region: non_empty(request.region)
                .or_else(|| profile.as_ref().and_then(|p| p.region.clone())),
            club: non_empty(request.club)
                .or_else(|| profile.as_ref().and_then(|p| p.organization.clone())),
            gender: request.gender.or_else(|| profile.as_ref().and_then(|p| p.gender)),
        };

        self.db.create_submission(&submission).await?;

        tracing::info!(
            account_id,
            submission_id = %submission.id,
            claimed_count,
            platform = ?platform,
            "Submission created"
        );
        Ok(submission)
    }

    /// An account's submissions, newest first.
    pub async fn list_for_account(&self, account_id: &str) -> Result<Vec<Submission>> {
        self.db.get_submissions_for_account(account_id).await
    }

    /// Review queue for admins.
    pub async fn list_by_status(&self, admin_id: &str, status: SubmissionStatus) -> Result<Vec<Submission>> {
        self.require_admin(admin_id).await?;
        self.db.get_submissions_by_status(status).await
    }

    /// Approve a pending submission with the reviewer's verified count.
    pub async fn approve(
        &self,
        admin_id: &str,
        submission_id: &str,
        actual_count: i64,
        now: DateTime<Utc>,
    ) -> Result<Submission> {
        self.require_admin(admin_id).await?;
        if !(0..=MAX_PULL_UPS).contains(&actual_count) {
            return Err(AppError::Validation(format!(
                "actual_count: must be between 0 and {}",
                MAX_PULL_UPS
            )));
        }
        let actual_count = actual_count as u32;

        let submission = self
            .review(
                admin_id,
                submission_id,
                ReviewDecision::Approve { actual_count },
                now,
            )
            .await?;

        tracing::info!(
            admin_id,
            submission_id,
            account_id = %submission.account_id,
            claimed_count = submission.claimed_count,
            actual_count,
            "Submission approved"
        );
        Ok(submission)
    }

    /// Reject a pending submission.
    pub async fn reject(
        &self,
        admin_id: &str,
        submission_id: &str,
        notes: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<Submission> {
        self.require_admin(admin_id).await?;
        let notes = notes.filter(|n| !n.trim().is_empty());

        let submission = self
            .review(admin_id, submission_id, ReviewDecision::Reject { notes }, now)
            .await?;

        tracing::info!(
            admin_id,
            submission_id,
            account_id = %submission.account_id,
            "Submission rejected"
        );
        Ok(submission)
    }

    /// Badge for an account's best approved submission.
    pub async fn badge(&self, account_id: &str) -> Result<BadgeProgress> {
        let submissions = self.db.get_submissions_for_account(account_id).await?;
        let best = submissions
            .iter()
            .filter(|s| s.status == SubmissionStatus::Approved)
            .max_by_key(|s| s.effective_count());

        let gender = match best.and_then(|s| s.gender) {
            Some(gender) => Some(gender),
            None => self.db.get_profile(account_id).await?.and_then(|p| p.gender),
        };

        Ok(BadgeProgress::compute(
            best.map_or(0, |s| s.effective_count()),
            gender,
        ))
    }

    /// Admin membership from the admin-roles relation.
    async fn require_admin(&self, account_id: &str) -> Result<()> {
        if self.db.is_admin(account_id).await? {
            Ok(())
        } else {
            tracing::warn!(account_id, "Admin action refused");
            Err(AppError::Forbidden("admin role required".to_string()))
        }
    }

    async fn review(
        &self,
        admin_id: &str,
        submission_id: &str,
        decision: ReviewDecision,
        now: DateTime<Utc>,
    ) -> Result<Submission> {
        match self
            .db
            .review_submission(submission_id, decision, admin_id, now)
            .await?
        {
            ReviewOutcome::Reviewed(submission) => Ok(submission),
            ReviewOutcome::NotFound => Err(AppError::NotFound(format!(
                "Submission {}",
                submission_id
            ))),
            ReviewOutcome::NotPending(status) => Err(AppError::InvalidState(format!(
                "submission is already {}",
                status.as_str()
            ))),
        }
    }
}
