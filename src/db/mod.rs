// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Database layer.
//!
//! `Database` dispatches to Firestore in production or to an in-process
//! store for local development and tests. Both backends enforce the same
//! guards: one email per account, one pending submission per account, and
//! atomic read-modify-write for profile fields and submission reviews.

pub mod firestore;
pub mod memory;

pub use firestore::FirestoreDb;
pub use memory::MemoryDb;

use crate::error::Result;
use crate::models::{
    Account, PendingPlan, Profile, ProfileUpdate, ReviewDecision, Submission, SubmissionStatus,
    Subscription,
};
use chrono::{DateTime, Utc};

/// Collection names as constants.
pub mod collections {
    pub const ACCOUNTS: &str = "accounts";
    /// Email -> account ID, keyed by URL-encoded lowercase email
    pub const ACCOUNT_EMAILS: &str = "account_emails";
    /// Presence of a document grants the admin role
    pub const ADMIN_ROLES: &str = "admin_roles";
    pub const PROFILES: &str = "profiles";
    /// Keyed by processor subscription ID
    pub const SUBSCRIPTIONS: &str = "subscriptions";
    pub const SUBMISSIONS: &str = "submissions";
    /// One-pending-submission guard, keyed by account ID
    pub const PENDING_SUBMISSIONS: &str = "pending_submissions";
}

/// Result of an atomic submission review.
#[derive(Debug, Clone)]
pub enum ReviewOutcome {
    Reviewed(Submission),
    NotFound,
    NotPending(SubmissionStatus),
}

/// Database handle, cheap to clone.
#[derive(Clone)]
pub enum Database {
    Firestore(FirestoreDb),
    Memory(MemoryDb),
}

macro_rules! dispatch {
    ($self:ident, $db:ident => $call:expr) => {
        match $self {
            Database::Firestore($db) => $call,
            Database::Memory($db) => $call,
        }
    };
}

impl Database {
    /// Fresh in-memory database.
    pub fn memory() -> Self {
        Database::Memory(MemoryDb::new())
    }

    // ─── Accounts ────────────────────────────────────────────────

    /// Create an account. Fails with `Conflict` if the email is taken.
    pub async fn create_account(&self, account: &Account) -> Result<()> {
        dispatch!(self, db => db.create_account(account).await)
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Option<Account>> {
        dispatch!(self, db => db.get_account(account_id).await)
    }

    pub async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>> {
        let email = Account::normalize_email(email);
        dispatch!(self, db => db.find_account_by_email(&email).await)
    }

    /// Admin-roles relation lookup. The only source of truth for admin access.
    pub async fn is_admin(&self, account_id: &str) -> Result<bool> {
        dispatch!(self, db => db.is_admin(account_id).await)
    }

    pub async fn grant_admin(&self, account_id: &str) -> Result<()> {
        dispatch!(self, db => db.grant_admin(account_id).await)
    }

    // ─── Profiles ────────────────────────────────────────────────

    pub async fn get_profile(&self, account_id: &str) -> Result<Option<Profile>> {
        dispatch!(self, db => db.get_profile(account_id).await)
    }

    pub async fn upsert_profile(&self, profile: &Profile) -> Result<()> {
        dispatch!(self, db => db.upsert_profile(profile).await)
    }

    pub async fn find_profile_by_customer_id(&self, customer_id: &str) -> Result<Option<Profile>> {
        dispatch!(self, db => db.find_profile_by_customer_id(customer_id).await)
    }

    /// Atomically modify a profile. Returns `None` if no profile exists.
    pub async fn modify_profile<F, T>(&self, account_id: &str, f: F) -> Result<Option<T>>
    where
        F: Fn(&mut Profile) -> T + Send + Sync + 'static,
        T: Send + 'static,
    {
        dispatch!(self, db => db.modify_profile(account_id, f).await)
    }

    /// Apply a self-service profile edit.
    pub async fn update_profile(
        &self,
        account_id: &str,
        update: ProfileUpdate,
        now: DateTime<Utc>,
    ) -> Result<Option<Profile>> {
        self.modify_profile(account_id, move |profile| {
            profile.apply_update(update.clone(), now);
            profile.clone()
        })
        .await
    }

    /// Record a plan choice, replacing any earlier unconsumed one.
    pub async fn set_pending_plan(&self, account_id: &str, plan: PendingPlan) -> Result<bool> {
        let updated = self
            .modify_profile(account_id, move |profile| {
                profile.pending_subscription_plan = Some(plan.clone());
                profile.updated_at = plan.requested_at;
            })
            .await?;
        Ok(updated.is_some())
    }

    /// Clear and return the pending plan, if set.
    ///
    /// This is the single gate for plan consumption: of any number of
    /// concurrent callers for one account, at most one receives the plan.
    pub async fn take_pending_plan(&self, account_id: &str) -> Result<Option<PendingPlan>> {
        let taken = self
            .modify_profile(account_id, |profile| {
                profile.pending_subscription_plan.take()
            })
            .await?;
        Ok(taken.flatten())
    }

    /// Mark an account paid after a confirmed checkout, remembering the
    /// processor customer. Returns false if the profile does not exist.
    pub async fn mark_paid(&self, account_id: &str, customer_id: Option<String>) -> Result<bool> {
        let updated = self
            .modify_profile(account_id, move |profile| {
                profile.is_paid = true;
                if let Some(customer_id) = &customer_id {
                    profile.stripe_customer_id = Some(customer_id.clone());
                }
                profile.updated_at = Utc::now();
            })
            .await?;
        Ok(updated.is_some())
    }

    pub async fn set_paid(&self, account_id: &str, is_paid: bool) -> Result<bool> {
        let updated = self
            .modify_profile(account_id, move |profile| {
                profile.is_paid = is_paid;
                profile.updated_at = Utc::now();
            })
            .await?;
        Ok(updated.is_some())
    }

    // ─── Subscriptions ───────────────────────────────────────────

    /// Insert or overwrite a subscription keyed by its processor ID.
    pub async fn upsert_subscription(&self, subscription: &Subscription) -> Result<()> {
        dispatch!(self, db => db.upsert_subscription(subscription).await)
    }

    pub async fn get_subscriptions_for_account(&self, account_id: &str) -> Result<Vec<Subscription>> {
        dispatch!(self, db => db.get_subscriptions_for_account(account_id).await)
    }

    // ─── Submissions ─────────────────────────────────────────────

    /// Insert a new pending submission.
    ///
    /// Fails with `Eligibility` if the account already has a pending one,
    /// including when a concurrent insert won the race.
    pub async fn create_submission(&self, submission: &Submission) -> Result<()> {
        dispatch!(self, db => db.create_submission(submission).await)
    }

    pub async fn get_submission(&self, submission_id: &str) -> Result<Option<Submission>> {
        dispatch!(self, db => db.get_submission(submission_id).await)
    }

    /// All submissions for an account, most recent first.
    pub async fn get_submissions_for_account(&self, account_id: &str) -> Result<Vec<Submission>> {
        let mut submissions =
            dispatch!(self, db => db.get_submissions_for_account(account_id).await)?;
        submissions.sort_by(|a, b| b.submitted_at.cmp(&a.submitted_at));
        Ok(submissions)
    }

    /// All submissions with a status, oldest first (review queue order).
    pub async fn get_submissions_by_status(&self, status: SubmissionStatus) -> Result<Vec<Submission>> {
        let mut submissions = dispatch!(self, db => db.get_submissions_by_status(status).await)?;
        submissions.sort_by(|a, b| a.submitted_at.cmp(&b.submitted_at));
        Ok(submissions)
    }

    /// Atomically move a pending submission to approved or rejected.
    pub async fn review_submission(
        &self,
        submission_id: &str,
        decision: ReviewDecision,
        reviewer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome> {
        dispatch!(self, db => db.review_submission(submission_id, decision, reviewer_id, now).await)
    }

    // ─── Account Removal ─────────────────────────────────────────

    /// Delete all data for an account. Returns the number of records removed.
    pub async fn delete_account_data(&self, account_id: &str) -> Result<usize> {
        dispatch!(self, db => db.delete_account_data(account_id).await)
    }
}
