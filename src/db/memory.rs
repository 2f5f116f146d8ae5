// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! In-process store with the same guarantees as the Firestore backend.
//!
//! Each collection is a `DashMap`. Guards and read-modify-write operations
//! run while holding the entry's shard lock, so they are atomic with respect
//! to other callers on the same key.

use crate::db::ReviewOutcome;
use crate::error::{AppError, Result};
use crate::models::{
    Account, Profile, ReviewDecision, Submission, SubmissionStatus, Subscription,
};
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
struct Collections {
    accounts: DashMap<String, Account>,
    /// Normalized email -> account ID
    account_emails: DashMap<String, String>,
    /// Account ID -> granted at
    admin_roles: DashMap<String, DateTime<Utc>>,
    profiles: DashMap<String, Profile>,
    subscriptions: DashMap<String, Subscription>,
    submissions: DashMap<String, Submission>,
    /// Account ID -> pending submission ID
    pending_submissions: DashMap<String, String>,
}

/// In-memory database.
#[derive(Clone, Default)]
pub struct MemoryDb {
    inner: Arc<Collections>,
}

impl MemoryDb {
    pub fn new() -> Self {
        Self::default()
    }

    // ─── Accounts ────────────────────────────────────────────────

    pub async fn create_account(&self, account: &Account) -> Result<()> {
        match self.inner.account_emails.entry(account.email.clone()) {
            Entry::Occupied(_) => Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            )),
            Entry::Vacant(slot) => {
                self.inner
                    .accounts
                    .insert(account.id.clone(), account.clone());
                slot.insert(account.id.clone());
                Ok(())
            }
        }
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        Ok(self.inner.accounts.get(account_id).map(|a| a.clone()))
    }

    pub async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let account_id = match self.inner.account_emails.get(email) {
            Some(id) => id.clone(),
            None => return Ok(None),
        };
        self.get_account(&account_id).await
    }

    pub async fn is_admin(&self, account_id: &str) -> Result<bool> {
        Ok(self.inner.admin_roles.contains_key(account_id))
    }

    pub async fn grant_admin(&self, account_id: &str) -> Result<()> {
        self.inner
            .admin_roles
            .insert(account_id.to_string(), Utc::now());
        Ok(())
    }

    // ─── Profiles ────────────────────────────────────────────────

    pub async fn get_profile(&self, account_id: &str) -> Result<Option<Profile>> {
        Ok(self.inner.profiles.get(account_id).map(|p| p.clone()))
    }

    pub async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        self.inner
            .profiles
            .insert(profile.account_id.clone(), profile.clone());
        Ok(())
    }

    pub async fn find_profile_by_customer_id(&self, customer_id: &str) -> Result<Option<Profile>> {
        Ok(self
            .inner
            .profiles
            .iter()
            .find(|p| p.stripe_customer_id.as_deref() == Some(customer_id))
            .map(|p| p.clone()))
    }

    pub async fn modify_profile<F, T>(&self, account_id: &str, f: F) -> Result<Option<T>>
    where
        F: Fn(&mut Profile) -> T + Send + Sync + 'static,
        T: Send + 'static,
    {
        Ok(self
            .inner
            .profiles
            .get_mut(account_id)
            .map(|mut profile| f(&mut profile)))
    }

    // ─── Subscriptions ───────────────────────────────────────────

    pub async fn upsert_subscription(&self, subscription: &Subscription) -> Result<()> {
        self.inner.subscriptions.insert(
            subscription.stripe_subscription_id.clone(),
            subscription.clone(),
        );
        Ok(())
    }

    pub async fn get_subscriptions_for_account(&self, account_id: &str) -> Result<Vec<Subscription>> {
        Ok(self
            .inner
            .subscriptions
            .iter()
            .filter(|s| s.account_id == account_id)
            .map(|s| s.clone())
            .collect())
    }

    // ─── Submissions ─────────────────────────────────────────────

    pub async fn create_submission(&self, submission: &Submission) -> Result<()> {
        match self
            .inner
            .pending_submissions
            .entry(submission.account_id.clone())
        {
            Entry::Occupied(_) => Err(AppError::Eligibility(
                "a submission is already pending review".to_string(),
            )),
            Entry::Vacant(slot) => {
                self.inner
                    .submissions
                    .insert(submission.id.clone(), submission.clone());
                slot.insert(submission.id.clone());
                Ok(())
            }
        }
    }

    pub async fn get_submission(&self, submission_id: &str) -> Result<Option<Submission>> {
        Ok(self.inner.submissions.get(submission_id).map(|s| s.clone()))
    }

    pub async fn get_submissions_for_account(&self, account_id: &str) -> Result<Vec<Submission>> {
        Ok(self
            .inner
            .submissions
            .iter()
            .filter(|s| s.account_id == account_id)
            .map(|s| s.clone())
            .collect())
    }

    pub async fn get_submissions_by_status(&self, status: SubmissionStatus) -> Result<Vec<Submission>> {
        Ok(self
            .inner
            .submissions
            .iter()
            .filter(|s| s.status == status)
            .map(|s| s.clone())
            .collect())
    }

    pub async fn review_submission(
        &self,
        submission_id: &str,
        decision: ReviewDecision,
        reviewer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        let reviewed = {
            let Some(mut submission) = self.inner.submissions.get_mut(submission_id) else {
                return Ok(ReviewOutcome::NotFound);
            };
            if let Err(status) = submission.apply_review(decision, reviewer_id, now) {
                return Ok(ReviewOutcome::NotPending(status));
            }
            submission.clone()
        };

        // Release the guard only if it still points at this submission.
        self.inner
            .pending_submissions
            .remove_if(&reviewed.account_id, |_, pending_id| pending_id == submission_id);

        Ok(ReviewOutcome::Reviewed(reviewed))
    }

    // ─── Account Removal ─────────────────────────────────────────

    pub async fn delete_account_data(&self, account_id: &str) -> Result<usize> {
        let mut deleted = 0;

        let before = self.inner.submissions.len();
        self.inner
            .submissions
            .retain(|_, s| s.account_id != account_id);
        deleted += before - self.inner.submissions.len();
        self.inner.pending_submissions.remove(account_id);

        let before = self.inner.subscriptions.len();
        self.inner
            .subscriptions
            .retain(|_, s| s.account_id != account_id);
        deleted += before - self.inner.subscriptions.len();

        if self.inner.profiles.remove(account_id).is_some() {
            deleted += 1;
        }
        self.inner.admin_roles.remove(account_id);
        if let Some((_, account)) = self.inner.accounts.remove(account_id) {
            self.inner.account_emails.remove(&account.email);
            deleted += 1;
        }

        tracing::info!(account_id, deleted, "Account data deletion complete");
        Ok(deleted)
    }
}
