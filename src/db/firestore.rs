// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for:
//! - Accounts (plus the email index and admin roles)
//! - Profiles
//! - Subscriptions (mirror of processor state)
//! - Submissions (plus the one-pending guard)

use crate::db::{collections, ReviewOutcome};
use crate::error::AppError;
use crate::models::{
    Account, Profile, ReviewDecision, Submission, SubmissionStatus, Subscription,
};
use chrono::{DateTime, Utc};
use futures_util::FutureExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

// Firestore limits batch/transaction writes to 500 operations.
// We use a safe limit of 400 to allow headroom.
const BATCH_SIZE: usize = 400;

/// Document in `account_emails`, keyed by URL-encoded normalized email.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EmailIndex {
    account_id: String,
}

/// Document in `admin_roles`, keyed by account ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct AdminRole {
    granted_at: DateTime<Utc>,
}

/// Document in `pending_submissions`, keyed by account ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct PendingGuard {
    submission_id: String,
    created_at: DateTime<Utc>,
}

fn email_doc_id(email: &str) -> String {
    urlencoding::encode(email).into_owned()
}

fn db_err(e: firestore::errors::FirestoreError) -> AppError {
    AppError::Database(e.to_string())
}

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: firestore::FirestoreDb,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // The emulator takes an unauthenticated connection; skip local credentials.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self { client })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self { client })
    }

    fn client(&self) -> &firestore::FirestoreDb {
        &self.client
    }

    // ─── Account Operations ──────────────────────────────────────

    /// Create an account and claim its email in one transaction.
    pub async fn create_account(&self, account: &Account) -> Result<(), AppError> {
        let account = account.clone();

        let created = self
            .client()
            .run_transaction(move |db, transaction| {
                let account = account.clone();
                async move {
                    let email_id = email_doc_id(&account.email);
                    let existing: Option<EmailIndex> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::ACCOUNT_EMAILS)
                        .obj()
                        .one(&email_id)
                        .await?;
                    if existing.is_some() {
                        return Ok(false);
                    }

                    db.fluent()
                        .update()
                        .in_col(collections::ACCOUNT_EMAILS)
                        .document_id(&email_id)
                        .object(&EmailIndex {
                            account_id: account.id.clone(),
                        })
                        .add_to_transaction(transaction)?;
                    db.fluent()
                        .update()
                        .in_col(collections::ACCOUNTS)
                        .document_id(&account.id)
                        .object(&account)
                        .add_to_transaction(transaction)?;
                    Ok(true)
                }
                .boxed()
            })
            .await
            .map_err(|e| AppError::Database(format!("Account creation failed: {}", e)))?;

        if !created {
            return Err(AppError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn get_account(&self, account_id: &str) -> Result<Option<Account>, AppError> {
        self.client()
            .fluent()
            .select()
            .by_id_in(collections::ACCOUNTS)
            .obj()
            .one(account_id)
            .await
            .map_err(db_err)
    }

    /// Look up an account by normalized email through the email index.
    pub async fn find_account_by_email(&self, email: &str) -> Result<Option<Account>, AppError> {
        let index: Option<EmailIndex> = self
            .client()
            .fluent()
            .select()
            .by_id_in(collections::ACCOUNT_EMAILS)
            .obj()
            .one(&email_doc_id(email))
            .await
            .map_err(db_err)?;

        match index {
            Some(index) => self.get_account(&index.account_id).await,
            None => Ok(None),
        }
    }

    pub async fn is_admin(&self, account_id: &str) -> Result<bool, AppError> {
        let role: Option<AdminRole> = self
            .client()
            .fluent()
            .select()
            .by_id_in(collections::ADMIN_ROLES)
            .obj()
            .one(account_id)
            .await
            .map_err(db_err)?;
        Ok(role.is_some())
    }

    pub async fn grant_admin(&self, account_id: &str) -> Result<(), AppError> {
        let _: () = self
            .client()
            .fluent()
            .update()
            .in_col(collections::ADMIN_ROLES)
            .document_id(account_id)
            .object(&AdminRole {
                granted_at: Utc::now(),
            })
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    // ─── Profile Operations ──────────────────────────────────────

    pub async fn get_profile(&self, account_id: &str) -> Result<Option<Profile>, AppError> {
        self.client()
            .fluent()
            .select()
            .by_id_in(collections::PROFILES)
            .obj()
            .one(account_id)
            .await
            .map_err(db_err)
    }

    pub async fn upsert_profile(&self, profile: &Profile) -> Result<(), AppError> {
        let _: () = self
            .client()
            .fluent()
            .update()
            .in_col(collections::PROFILES)
            .document_id(&profile.account_id)
            .object(profile)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn find_profile_by_customer_id(
        &self,
        customer_id: &str,
    ) -> Result<Option<Profile>, AppError> {
        let profiles: Vec<Profile> = self
            .client()
            .fluent()
            .select()
            .from(collections::PROFILES)
            .filter(|q| q.field("stripe_customer_id").eq(customer_id))
            .limit(1)
            .obj()
            .query()
            .await
            .map_err(db_err)?;
        Ok(profiles.into_iter().next())
    }

    /// Read-modify-write a profile inside a transaction.
    ///
    /// Firestore retries the closure on contention, so `f` may run more than
    /// once but only one run per commit is ever persisted.
    pub async fn modify_profile<F, T>(&self, account_id: &str, f: F) -> Result<Option<T>, AppError>
    where
        F: Fn(&mut Profile) -> T + Send + Sync + 'static,
        T: Send + 'static,
    {
        let f = Arc::new(f);
        let account_id = account_id.to_string();

        self.client()
            .run_transaction(move |db, transaction| {
                let f = Arc::clone(&f);
                let account_id = account_id.clone();
                async move {
                    let current: Option<Profile> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::PROFILES)
                        .obj()
                        .one(&account_id)
                        .await?;
                    let Some(mut profile) = current else {
                        return Ok(None);
                    };

                    let result = f(&mut profile);

                    db.fluent()
                        .update()
                        .in_col(collections::PROFILES)
                        .document_id(&account_id)
                        .object(&profile)
                        .add_to_transaction(transaction)?;
                    Ok(Some(result))
                }
                .boxed()
            })
            .await
            .map_err(|e| AppError::Database(format!("Profile transaction failed: {}", e)))
    }

    // ─── Subscription Operations ─────────────────────────────────

    pub async fn upsert_subscription(&self, subscription: &Subscription) -> Result<(), AppError> {
        let _: () = self
            .client()
            .fluent()
            .update()
            .in_col(collections::SUBSCRIPTIONS)
            .document_id(&subscription.stripe_subscription_id)
            .object(subscription)
            .execute()
            .await
            .map_err(db_err)?;
        Ok(())
    }

    pub async fn get_subscriptions_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<Subscription>, AppError> {
        self.client()
            .fluent()
            .select()
            .from(collections::SUBSCRIPTIONS)
            .filter(|q| q.field("account_id").eq(account_id))
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    // ─── Submission Operations ───────────────────────────────────

    /// Claim the pending guard and write the submission in one transaction.
    pub async fn create_submission(&self, submission: &Submission) -> Result<(), AppError> {
        let submission = submission.clone();

        let created = self
            .client()
            .run_transaction(move |db, transaction| {
                let submission = submission.clone();
                async move {
                    let guard: Option<PendingGuard> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::PENDING_SUBMISSIONS)
                        .obj()
                        .one(&submission.account_id)
                        .await?;
                    if guard.is_some() {
                        return Ok(false);
                    }

                    db.fluent()
                        .update()
                        .in_col(collections::PENDING_SUBMISSIONS)
                        .document_id(&submission.account_id)
                        .object(&PendingGuard {
                            submission_id: submission.id.clone(),
                            created_at: submission.submitted_at,
                        })
                        .add_to_transaction(transaction)?;
                    db.fluent()
                        .update()
                        .in_col(collections::SUBMISSIONS)
                        .document_id(&submission.id)
                        .object(&submission)
                        .add_to_transaction(transaction)?;
                    Ok(true)
                }
                .boxed()
            })
            .await
            .map_err(|e| AppError::Database(format!("Submission transaction failed: {}", e)))?;

        if !created {
            return Err(AppError::Eligibility(
                "a submission is already pending review".to_string(),
            ));
        }
        Ok(())
    }

    pub async fn get_submission(&self, submission_id: &str) -> Result<Option<Submission>, AppError> {
        self.client()
            .fluent()
            .select()
            .by_id_in(collections::SUBMISSIONS)
            .obj()
            .one(submission_id)
            .await
            .map_err(db_err)
    }

    pub async fn get_submissions_for_account(
        &self,
        account_id: &str,
    ) -> Result<Vec<Submission>, AppError> {
        self.client()
            .fluent()
            .select()
            .from(collections::SUBMISSIONS)
            .filter(|q| q.field("account_id").eq(account_id))
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    pub async fn get_submissions_by_status(
        &self,
        status: SubmissionStatus,
    ) -> Result<Vec<Submission>, AppError> {
        self.client()
            .fluent()
            .select()
            .from(collections::SUBMISSIONS)
            .filter(|q| q.field("status").eq(status.as_str()))
            .obj()
            .query()
            .await
            .map_err(db_err)
    }

    /// Review a submission and release its pending guard in one transaction.
    pub async fn review_submission(
        &self,
        submission_id: &str,
        decision: ReviewDecision,
        reviewer_id: &str,
        now: DateTime<Utc>,
    ) -> Result<ReviewOutcome, AppError> {
        let submission_id = submission_id.to_string();
        let reviewer_id = reviewer_id.to_string();

        self.client()
            .run_transaction(move |db, transaction| {
                let submission_id = submission_id.clone();
                let reviewer_id = reviewer_id.clone();
                let decision = decision.clone();
                async move {
                    let current: Option<Submission> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::SUBMISSIONS)
                        .obj()
                        .one(&submission_id)
                        .await?;
                    let Some(mut submission) = current else {
                        return Ok(ReviewOutcome::NotFound);
                    };
                    if let Err(status) = submission.apply_review(decision, &reviewer_id, now) {
                        return Ok(ReviewOutcome::NotPending(status));
                    }

                    let guard: Option<PendingGuard> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::PENDING_SUBMISSIONS)
                        .obj()
                        .one(&submission.account_id)
                        .await?;

                    db.fluent()
                        .update()
                        .in_col(collections::SUBMISSIONS)
                        .document_id(&submission.id)
                        .object(&submission)
                        .add_to_transaction(transaction)?;
                    if guard.is_some_and(|g| g.submission_id == submission.id) {
                        db.fluent()
                            .delete()
                            .from(collections::PENDING_SUBMISSIONS)
                            .document_id(&submission.account_id)
                            .add_to_transaction(transaction)?;
                    }
                    Ok(ReviewOutcome::Reviewed(submission))
                }
                .boxed()
            })
            .await
            .map_err(|e| AppError::Database(format!("Review transaction failed: {}", e)))
    }

    // ─── Helper Methods ────────────────────────────────────────────

    /// Helper to batch delete documents using transactions.
    async fn batch_delete<T, F>(
        &self,
        items: &[T],
        collection: &str,
        id_extractor: F,
    ) -> Result<(), AppError>
    where
        F: Fn(&T) -> String,
    {
        let client = self.client();

        for chunk in items.chunks(BATCH_SIZE) {
            let mut transaction = client
                .begin_transaction()
                .await
                .map_err(|e| AppError::Database(format!("Failed to begin transaction: {}", e)))?;

            for item in chunk {
                let doc_id = id_extractor(item);
                client
                    .fluent()
                    .delete()
                    .from(collection)
                    .document_id(&doc_id)
                    .add_to_transaction(&mut transaction)
                    .map_err(|e| {
                        AppError::Database(format!(
                            "Failed to add deletion to transaction for {}: {}",
                            collection, e
                        ))
                    })?;
            }

            transaction.commit().await.map_err(|e| {
                AppError::Database(format!("Failed to commit batch deletion: {}", e))
            })?;
        }

        Ok(())
    }

    async fn delete_doc(&self, collection: &str, doc_id: &str) -> Result<(), AppError> {
        self.client()
            .fluent()
            .delete()
            .from(collection)
            .document_id(doc_id)
            .execute()
            .await
            .map_err(db_err)
    }

    // ─── Account Removal ───────────────────────────────────────────

    /// Delete ALL data for an account.
    ///
    /// Deletes from all collections:
    /// - `submissions` and `subscriptions` (query by account_id)
    /// - `pending_submissions/{account_id}`, `admin_roles/{account_id}`
    /// - `profiles/{account_id}`
    /// - `account_emails/{email}` and `accounts/{account_id}`
    ///
    /// Returns the number of documents deleted.
    pub async fn delete_account_data(&self, account_id: &str) -> Result<usize, AppError> {
        let mut deleted_count = 0;

        // 1. Submissions and their guard
        let submissions = self.get_submissions_for_account(account_id).await?;
        let count = submissions.len();
        self.batch_delete(&submissions, collections::SUBMISSIONS, |s: &Submission| {
            s.id.clone()
        })
        .await?;
        self.delete_doc(collections::PENDING_SUBMISSIONS, account_id)
            .await?;
        deleted_count += count;
        tracing::debug!(account_id, count, "Deleted submissions");

        // 2. Subscription mirror
        let subscriptions = self.get_subscriptions_for_account(account_id).await?;
        let count = subscriptions.len();
        self.batch_delete(
            &subscriptions,
            collections::SUBSCRIPTIONS,
            |s: &Subscription| s.stripe_subscription_id.clone(),
        )
        .await?;
        deleted_count += count;
        tracing::debug!(account_id, count, "Deleted subscriptions");

        // 3. Profile and role
        if self.get_profile(account_id).await?.is_some() {
            self.delete_doc(collections::PROFILES, account_id).await?;
            deleted_count += 1;
        }
        self.delete_doc(collections::ADMIN_ROLES, account_id).await?;

        // 4. Account and email index
        if let Some(account) = self.get_account(account_id).await? {
            self.delete_doc(collections::ACCOUNT_EMAILS, &email_doc_id(&account.email))
                .await?;
            self.delete_doc(collections::ACCOUNTS, account_id).await?;
            deleted_count += 1;
        }

        tracing::info!(account_id, deleted_count, "Account data deletion complete");

        Ok(deleted_count)
    }
}
