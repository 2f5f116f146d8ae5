// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Subscription mirror of the payment processor's recurring-billing state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Subscription plan offered at checkout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Plan {
    Monthly,
    Annual,
}

impl Plan {
    pub fn as_str(&self) -> &'static str {
        match self {
            Plan::Monthly => "monthly",
            Plan::Annual => "annual",
        }
    }
}

impl std::fmt::Display for Plan {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Plan {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "monthly" => Ok(Plan::Monthly),
            "annual" => Ok(Plan::Annual),
            other => Err(format!("unknown plan '{}'", other)),
        }
    }
}

/// Processor subscription statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubscriptionStatus {
    Active,
    PastDue,
    Canceled,
    Trialing,
    Incomplete,
    IncompleteExpired,
    Unpaid,
    Paused,
}

impl SubscriptionStatus {
    /// Parse a processor status string. Unknown values map to `Incomplete`
    /// so they can never grant access.
    pub fn parse(status: &str) -> Self {
        match status {
            "active" => SubscriptionStatus::Active,
            "past_due" => SubscriptionStatus::PastDue,
            "canceled" => SubscriptionStatus::Canceled,
            "trialing" => SubscriptionStatus::Trialing,
            "incomplete" => SubscriptionStatus::Incomplete,
            "incomplete_expired" => SubscriptionStatus::IncompleteExpired,
            "unpaid" => SubscriptionStatus::Unpaid,
            "paused" => SubscriptionStatus::Paused,
            _ => SubscriptionStatus::Incomplete,
        }
    }

    /// Active or trialing subscriptions grant paid access.
    pub fn grants_access(&self) -> bool {
        matches!(self, SubscriptionStatus::Active | SubscriptionStatus::Trialing)
    }
}

/// Mirrored subscription row, keyed by the processor's subscription ID.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Subscription {
    /// Processor subscription ID (also used as document ID)
    pub stripe_subscription_id: String,
    /// Owning account
    pub account_id: String,
    /// Processor customer ID
    pub stripe_customer_id: Option<String>,
    pub status: SubscriptionStatus,
    /// Plan, when it can be resolved from the price
    pub plan: Option<Plan>,
    pub current_period_start: Option<DateTime<Utc>>,
    pub current_period_end: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    pub updated_at: DateTime<Utc>,
}

/// Payment axis of the account activation state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStage {
    Unpaid,
    Active,
    PastDue,
    Canceled,
}

impl PaymentStage {
    /// Derive the payment stage from an account's mirrored subscriptions.
    ///
    /// Any active or trialing row wins. Otherwise the most recently updated
    /// row decides; rows that never reached a paying state count as unpaid.
    pub fn from_subscriptions(subscriptions: &[Subscription]) -> Self {
        if subscriptions.iter().any(|s| s.status.grants_access()) {
            return PaymentStage::Active;
        }

        match subscriptions.iter().max_by_key(|s| s.updated_at) {
            Some(latest) => match latest.status {
                SubscriptionStatus::PastDue | SubscriptionStatus::Unpaid => PaymentStage::PastDue,
                SubscriptionStatus::Canceled | SubscriptionStatus::Paused => {
                    PaymentStage::Canceled
                }
                _ => PaymentStage::Unpaid,
            },
            None => PaymentStage::Unpaid,
        }
    }

    /// Whether the UI must send the account to the paywall.
    pub fn needs_subscription(&self) -> bool {
        matches!(self, PaymentStage::Unpaid | PaymentStage::Canceled)
    }
}
