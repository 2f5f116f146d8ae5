// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Account activation state machine.
//!
//! An account's state is the pair (`ProfileStage`, `PaymentStage`). Every
//! authentication (signup, login, session restore) runs `on_authenticated`,
//! which is the only place a pending plan is consumed and the only place the
//! client destination is decided.
//!
//! Payment is never granted here. `is_paid` is written by webhook handling
//! alone; this module only reads the subscription mirror, and any failure to
//! read it reports `Unpaid`.

use crate::config::Config;
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{PaymentStage, Plan, Profile, ProfileStage, Role};
use crate::services::checkout::CheckoutService;
use crate::services::stripe::CheckoutTarget;
use chrono::Utc;
use serde::Serialize;
use std::sync::Arc;

/// Where the client should go next.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "route", rename_all = "snake_case")]
pub enum Destination {
    CompleteProfile,
    Subscribe,
    Checkout { plan: Plan, checkout: CheckoutTarget },
    Admin,
    Dashboard,
}

impl Destination {
    /// Destination table for an account without a checkout in flight.
    ///
    /// Profile completion comes first for everyone. Admins skip the paywall.
    /// `PastDue` keeps access while the processor retries payment.
    pub fn decide(profile: ProfileStage, payment: PaymentStage, role: Role) -> Self {
        match (profile, role) {
            (ProfileStage::Incomplete, _) => Destination::CompleteProfile,
            (ProfileStage::Complete, Role::Admin) => Destination::Admin,
            (ProfileStage::Complete, Role::User) if payment.needs_subscription() => {
                Destination::Subscribe
            }
            (ProfileStage::Complete, Role::User) => Destination::Dashboard,
        }
    }
}

/// Snapshot of an account's activation state returned to the client.
#[derive(Debug, Clone, Serialize)]
pub struct Activation {
    pub account_id: String,
    pub email: String,
    pub role: Role,
    pub profile_stage: ProfileStage,
    pub payment_stage: PaymentStage,
    /// Webhook-confirmed payment flag
    pub is_paid: bool,
    pub destination: Destination,
    /// Set when a pending plan was consumed but checkout could not be created
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkout_error: Option<String>,
}

/// Runs the activation transition on every authentication.
#[derive(Clone)]
pub struct ActivationService {
    config: Arc<Config>,
    db: Database,
    checkout: CheckoutService,
}

impl ActivationService {
    pub fn new(config: Arc<Config>, db: Database, checkout: CheckoutService) -> Self {
        Self {
            config,
            db,
            checkout,
        }
    }

    /// Reconcile an authenticated account with its pending intent and payment state.
    ///
    /// Safe to call repeatedly: the pending plan is cleared atomically before
    /// checkout is attempted, so at most one call per recorded plan creates
    /// a session.
    pub async fn on_authenticated(&self, account_id: &str) -> Result<Activation> {
        let account = self
            .db
            .get_account(account_id)
            .await?
            .ok_or(AppError::Unauthorized)?;

        let profile = self.resolve_profile(account_id, &account.email).await;

        let role = match self.db.is_admin(account_id).await {
            Ok(is_admin) => Role::from_admin_flag(is_admin),
            Err(e) => {
                tracing::warn!(account_id, error = %e, "Role lookup failed, assuming user");
                Role::User
            }
        };

        let payment_stage = self.payment_stage(account_id).await;

        // Clear the plan before contacting the processor so a retry or a
        // second tab cannot replay it.
        let mut checkout = None;
        let mut checkout_error = None;
        if let Some(pending) = self.db.take_pending_plan(account_id).await? {
            tracing::info!(account_id, plan = %pending.plan, "Pending plan consumed");

            if payment_stage == PaymentStage::Active {
                tracing::info!(
                    account_id,
                    plan = %pending.plan,
                    "Pending plan dropped, account already subscribed"
                );
            } else {
                match self
                    .checkout
                    .create_checkout(account_id, pending.plan, self.config.checkout_mode)
                    .await
                {
                    Ok(target) => checkout = Some((pending.plan, target)),
                    Err(e) => {
                        tracing::error!(
                            account_id,
                            plan = %pending.plan,
                            error = %e,
                            "Checkout for pending plan failed"
                        );
                        checkout_error = Some(format!(
                            "Could not start checkout for the {} plan. Please choose a plan again.",
                            pending.plan
                        ));
                    }
                }
            }
        }

        let profile_stage = profile.stage();

        let destination = match checkout {
            Some((plan, target)) => Destination::Checkout {
                plan,
                checkout: target,
            },
            None => Destination::decide(profile_stage, payment_stage, role),
        };

        tracing::debug!(
            account_id,
            ?profile_stage,
            ?payment_stage,
            ?destination,
            "Activation state resolved"
        );

        Ok(Activation {
            account_id: account.id,
            email: account.email,
            role,
            profile_stage,
            payment_stage,
            is_paid: profile.is_paid,
            destination,
            checkout_error,
        })
    }

    /// Payment stage from the subscription mirror. Unpaid on any failure.
    pub async fn payment_stage(&self, account_id: &str) -> PaymentStage {
        match self.db.get_subscriptions_for_account(account_id).await {
            Ok(subscriptions) => PaymentStage::from_subscriptions(&subscriptions),
            Err(e) => {
                tracing::warn!(account_id, error = %e, "Payment stage unavailable, treating as unpaid");
                PaymentStage::Unpaid
            }
        }
    }

    /// Fetch the profile, retrying while it may still be provisioning.
    ///
    /// Attempt `n` waits `n * base` before the next one. After the last
    /// attempt a default, incomplete profile is returned in its place.
    pub async fn resolve_profile(&self, account_id: &str, email: &str) -> Profile {
        let attempts = self.config.profile_fetch_attempts.max(1);

        for attempt in 1..=attempts {
            match self.db.get_profile(account_id).await {
                Ok(Some(profile)) => return profile,
                Ok(None) => {
                    tracing::debug!(account_id, attempt, "Profile not yet available");
                }
                Err(e) => {
                    tracing::warn!(account_id, attempt, error = %e, "Profile fetch failed");
                }
            }
            if attempt < attempts {
                tokio::time::sleep(self.config.profile_fetch_backoff * attempt).await;
            }
        }

        tracing::warn!(account_id, attempts, "Falling back to default profile");
        Profile::new_default(account_id, email, Utc::now())
    }
}
