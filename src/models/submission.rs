// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Video submissions and the rules deciding when a member may submit.

use crate::models::Gender;
use crate::time_utils::days_until_ceil;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Days after an approved submission during which new submissions are blocked.
pub const COOLDOWN_DAYS: i64 = 30;

/// Review status. A submission leaves `Pending` exactly once.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SubmissionStatus {
    Pending,
    Approved,
    Rejected,
}

impl SubmissionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubmissionStatus::Pending => "pending",
            SubmissionStatus::Approved => "approved",
            SubmissionStatus::Rejected => "rejected",
        }
    }
}

/// Video hosting platform, derived from the submitted URL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Youtube,
    Instagram,
    Tiktok,
    Facebook,
    Vimeo,
    Twitter,
    Generic,
}

/// Known hosts per platform. Subdomains (www., m., ...) also match.
const PLATFORM_HOSTS: &[(&str, Platform)] = &[
    ("youtube.com", Platform::Youtube),
    ("youtu.be", Platform::Youtube),
    ("instagram.com", Platform::Instagram),
    ("tiktok.com", Platform::Tiktok),
    ("facebook.com", Platform::Facebook),
    ("fb.watch", Platform::Facebook),
    ("vimeo.com", Platform::Vimeo),
    ("twitter.com", Platform::Twitter),
    ("x.com", Platform::Twitter),
];

impl Platform {
    /// Classify a video URL. Any absolute http(s) URL with a host is at least
    /// `Generic`; everything else is rejected.
    pub fn classify(video_url: &str) -> Option<Platform> {
        let url = reqwest::Url::parse(video_url.trim()).ok()?;
        if url.scheme() != "http" && url.scheme() != "https" {
            return None;
        }
        let host = url.host_str()?.to_ascii_lowercase();

        let platform = PLATFORM_HOSTS
            .iter()
            .find(|(domain, _)| host == *domain || host.ends_with(&format!(".{}", domain)))
            .map(|(_, platform)| *platform)
            .unwrap_or(Platform::Generic);

        Some(platform)
    }
}

/// One video claim of a pull-up count, stored in Firestore.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Submission {
    /// Submission ID (UUID, also used as document ID)
    pub id: String,
    pub account_id: String,
    /// Self-reported count
    pub claimed_count: u32,
    /// Admin-verified count; authoritative once set
    pub actual_pull_up_count: Option<u32>,
    pub video_url: String,
    pub platform: Platform,
    pub status: SubmissionStatus,
    pub submitted_at: DateTime<Utc>,
    pub approved_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_by: Option<String>,
    pub notes: Option<String>,
    // Denormalized for the leaderboard
    pub region: Option<String>,
    pub club: Option<String>,
    pub gender: Option<Gender>,
}

/// Admin decision on a pending submission.
#[derive(Debug, Clone)]
pub enum ReviewDecision {
    Approve { actual_count: u32 },
    Reject { notes: Option<String> },
}

impl Submission {
    /// Count used for ranking and badges.
    pub fn effective_count(&self) -> u32 {
        self.actual_pull_up_count.unwrap_or(self.claimed_count)
    }

    /// Apply an admin decision.
    ///
    /// Returns the current status as the error if the submission has already
    /// been reviewed; nothing is modified in that case.
    pub fn apply_review(
        &mut self,
        decision: ReviewDecision,
        reviewer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<(), SubmissionStatus> {
        if self.status != SubmissionStatus::Pending {
            return Err(self.status);
        }

        match decision {
            ReviewDecision::Approve { actual_count } => {
                self.status = SubmissionStatus::Approved;
                self.actual_pull_up_count = Some(actual_count);
                self.approved_at = Some(now);
            }
            ReviewDecision::Reject { notes } => {
                self.status = SubmissionStatus::Rejected;
                self.notes = notes;
            }
        }
        self.reviewed_at = Some(now);
        self.reviewed_by = Some(reviewer_id.to_string());
        Ok(())
    }
}

/// Whether an account may submit right now. Computed on demand, never stored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum Eligibility {
    Eligible,
    BlockedPending {
        submission_id: String,
    },
    BlockedCooldown {
        days_remaining: u32,
        eligible_at: DateTime<Utc>,
    },
}

impl Eligibility {
    /// Evaluate eligibility from an account's submissions.
    ///
    /// A pending submission blocks outright. Otherwise the most recent
    /// approved submission blocks until `COOLDOWN_DAYS` after its submission
    /// date. Rejected submissions never block.
    pub fn evaluate(submissions: &[Submission], now: DateTime<Utc>) -> Self {
        if let Some(pending) = submissions
            .iter()
            .find(|s| s.status == SubmissionStatus::Pending)
        {
            return Eligibility::BlockedPending {
                submission_id: pending.id.clone(),
            };
        }

        let latest_approved = submissions
            .iter()
            .filter(|s| s.status == SubmissionStatus::Approved)
            .max_by_key(|s| s.submitted_at);

        if let Some(approved) = latest_approved {
            let eligible_at = approved.submitted_at + Duration::days(COOLDOWN_DAYS);
            if now < eligible_at {
                return Eligibility::BlockedCooldown {
                    days_remaining: days_until_ceil(now, eligible_at),
                    eligible_at,
                };
            }
        }

        Eligibility::Eligible
    }

    pub fn is_eligible(&self) -> bool {
        matches!(self, Eligibility::Eligible)
    }

    /// Human-readable reason for a block.
    pub fn reason(&self) -> String {
        match self {
            Eligibility::Eligible => "eligible".to_string(),
            Eligibility::BlockedPending { .. } => {
                "a submission is already pending review".to_string()
            }
            Eligibility::BlockedCooldown { days_remaining, .. } => format!(
                "an approved submission is in its cooldown; {} day(s) remaining",
                days_remaining
            ),
        }
    }
}
