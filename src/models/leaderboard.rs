// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Public leaderboard built from approved submissions.

use crate::models::{Badge, BadgeProgress, Gender, Submission, SubmissionStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Optional leaderboard filters.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LeaderboardFilter {
    pub region: Option<String>,
    pub club: Option<String>,
    pub gender: Option<Gender>,
}

impl LeaderboardFilter {
    fn matches(&self, submission: &Submission) -> bool {
        fn eq(filter: &Option<String>, value: &Option<String>) -> bool {
            match filter {
                Some(f) => value.as_deref().is_some_and(|v| v.eq_ignore_ascii_case(f)),
                None => true,
            }
        }

        eq(&self.region, &submission.region)
            && eq(&self.club, &submission.club)
            && self.gender.map_or(true, |g| submission.gender == Some(g))
    }
}

/// One ranked row.
#[derive(Debug, Clone, Serialize)]
pub struct LeaderboardEntry {
    pub rank: u32,
    pub account_id: String,
    pub display_name: Option<String>,
    pub submission_id: String,
    pub pull_up_count: u32,
    pub badge: Option<Badge>,
    pub region: Option<String>,
    pub club: Option<String>,
    pub gender: Option<Gender>,
    pub submitted_at: DateTime<Utc>,
}

/// Rank each account's best approved submission.
///
/// Ordering is by effective count descending, then earlier submission first.
/// Display names are filled in by the caller.
pub fn rank(submissions: &[Submission], filter: &LeaderboardFilter) -> Vec<LeaderboardEntry> {
    let mut best: HashMap<&str, &Submission> = HashMap::new();

    for submission in submissions
        .iter()
        .filter(|s| s.status == SubmissionStatus::Approved && filter.matches(s))
    {
        best.entry(submission.account_id.as_str())
            .and_modify(|current| {
                if is_better(submission, current) {
                    *current = submission;
                }
            })
            .or_insert(submission);
    }

    let mut rows: Vec<&Submission> = best.into_values().collect();
    rows.sort_by(|a, b| {
        b.effective_count()
            .cmp(&a.effective_count())
            .then_with(|| a.submitted_at.cmp(&b.submitted_at))
            .then_with(|| a.id.cmp(&b.id))
    });

    rows.into_iter()
        .enumerate()
        .map(|(i, s)| LeaderboardEntry {
            rank: i as u32 + 1,
            account_id: s.account_id.clone(),
            display_name: None,
            submission_id: s.id.clone(),
            pull_up_count: s.effective_count(),
            badge: BadgeProgress::compute(s.effective_count(), s.gender).current,
            region: s.region.clone(),
            club: s.club.clone(),
            gender: s.gender,
            submitted_at: s.submitted_at,
        })
        .collect()
}

fn is_better(candidate: &Submission, current: &Submission) -> bool {
    candidate.effective_count() > current.effective_count()
        || (candidate.effective_count() == current.effective_count()
            && candidate.submitted_at < current.submitted_at)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Platform;
    use chrono::TimeZone;

    fn approved(id: &str, account: &str, claimed: u32, actual: Option<u32>, day: u32) -> Submission {
        Submission {
            id: id.to_string(),
            account_id: account.to_string(),
            claimed_count: claimed,
            actual_pull_up_count: actual,
            video_url: "https://youtu.be/x".to_string(),
            platform: Platform::Youtube,
            status: SubmissionStatus::Approved,
            submitted_at: Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap(),
            approved_at: None,
            reviewed_at: None,
            reviewed_by: None,
            notes: None,
            region: Some("West".to_string()),
            club: None,
            gender: Some(Gender::Male),
        }
    }

    #[test]
    fn test_rank_uses_admin_count_and_best_per_account() {
        let subs = vec![
            approved("a1", "alice", 20, Some(18), 1),
            approved("a2", "alice", 15, None, 2),
            approved("b1", "bob", 19, None, 3),
        ];
        let board = rank(&subs, &LeaderboardFilter::default());
        assert_eq!(board.len(), 2);
        assert_eq!(board[0].account_id, "bob");
        assert_eq!(board[0].pull_up_count, 19);
        assert_eq!(board[1].submission_id, "a1");
        assert_eq!(board[1].pull_up_count, 18);
        assert_eq!(board[1].badge, Some(Badge::Hardened));
        assert_eq!(board[1].rank, 2);
    }

    #[test]
    fn test_rank_ties_break_on_earlier_submission() {
        let subs = vec![
            approved("late", "bob", 10, None, 9),
            approved("early", "carol", 10, None, 2),
        ];
        let board = rank(&subs, &LeaderboardFilter::default());
        assert_eq!(board[0].submission_id, "early");
    }

    #[test]
    fn test_rank_skips_unapproved_and_applies_filters() {
        let mut pending = approved("p", "dave", 50, None, 1);
        pending.status = SubmissionStatus::Pending;
        let mut east = approved("e", "erin", 12, None, 1);
        east.region = Some("East".to_string());

        let subs = vec![pending, east, approved("w", "will", 11, None, 1)];
        let filter = LeaderboardFilter {
            region: Some("west".to_string()),
            ..Default::default()
        };
        let board = rank(&subs, &filter);
        assert_eq!(board.len(), 1);
        assert_eq!(board[0].account_id, "will");

        let filter = LeaderboardFilter {
            gender: Some(Gender::Female),
            ..Default::default()
        };
        assert!(rank(&subs, &filter).is_empty());
    }
}
