// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Member profile, one per account.

use crate::models::Plan;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Gender, used for badge thresholds and leaderboard filtering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Gender {
    Male,
    Female,
    Other,
}

/// A subscription choice recorded before checkout could be started.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingPlan {
    pub plan: Plan,
    pub requested_at: DateTime<Utc>,
}

/// Profile axis of the account activation state. One-way.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProfileStage {
    Incomplete,
    Complete,
}

/// Profile stored in Firestore (keyed by account ID).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub account_id: String,
    pub email: String,
    pub display_name: Option<String>,
    pub social_handle: Option<String>,
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    /// Organization or club affiliation
    pub organization: Option<String>,
    pub region: Option<String>,
    pub phone: Option<String>,
    #[serde(default)]
    pub is_profile_completed: bool,
    /// Set only by webhook processing
    #[serde(default)]
    pub is_paid: bool,
    /// At most one outstanding plan; cleared when consumed
    #[serde(default)]
    pub pending_subscription_plan: Option<PendingPlan>,
    /// Processor customer, learned from the first completed checkout
    #[serde(default)]
    pub stripe_customer_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Profile {
    /// Default profile provisioned at signup.
    pub fn new_default(account_id: &str, email: &str, now: DateTime<Utc>) -> Self {
        Self {
            account_id: account_id.to_string(),
            email: email.to_string(),
            display_name: None,
            social_handle: None,
            age: None,
            gender: None,
            organization: None,
            region: None,
            phone: None,
            is_profile_completed: false,
            is_paid: false,
            pending_subscription_plan: None,
            stripe_customer_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn stage(&self) -> ProfileStage {
        if self.is_profile_completed {
            ProfileStage::Complete
        } else {
            ProfileStage::Incomplete
        }
    }

    fn has_required_fields(&self) -> bool {
        self.display_name.as_deref().is_some_and(|s| !s.is_empty())
            && self.age.is_some()
            && self.gender.is_some()
            && self.region.as_deref().is_some_and(|s| !s.is_empty())
    }

    /// Apply a self-service edit. Payment fields are never touched here.
    pub fn apply_update(&mut self, update: ProfileUpdate, now: DateTime<Utc>) {
        fn set(field: &mut Option<String>, value: Option<String>) {
            if let Some(value) = value {
                let trimmed = value.trim();
                *field = (!trimmed.is_empty()).then(|| trimmed.to_string());
            }
        }

        set(&mut self.display_name, update.display_name);
        set(&mut self.social_handle, update.social_handle);
        set(&mut self.organization, update.organization);
        set(&mut self.region, update.region);
        set(&mut self.phone, update.phone);
        if update.age.is_some() {
            self.age = update.age;
        }
        if update.gender.is_some() {
            self.gender = update.gender;
        }

        // Completion is sticky: later edits never move it back.
        if !self.is_profile_completed && self.has_required_fields() {
            self.is_profile_completed = true;
        }
        self.updated_at = now;
    }
}

/// Self-service profile edit. Absent fields are left unchanged.
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct ProfileUpdate {
    #[validate(length(min = 1, max = 80))]
    pub display_name: Option<String>,
    #[validate(length(max = 64))]
    pub social_handle: Option<String>,
    #[validate(range(min = 13, max = 120))]
    pub age: Option<u32>,
    pub gender: Option<Gender>,
    #[validate(length(max = 120))]
    pub organization: Option<String>,
    #[validate(length(max = 80))]
    pub region: Option<String>,
    #[validate(length(max = 32))]
    pub phone: Option<String>,
}
