// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Services module - business logic layer.

pub mod activation;
pub mod billing;
pub mod checkout;
pub mod identity;
pub mod leaderboard;
pub mod stripe;
pub mod submissions;

pub use activation::{Activation, ActivationService, Destination};
pub use billing::{BillingService, WebhookEvent, WebhookOutcome};
pub use checkout::{CheckoutService, SubscriptionRequest};
pub use identity::{Credentials, IdentityService};
pub use leaderboard::LeaderboardService;
pub use stripe::{CheckoutTarget, PaymentProcessor};
pub use submissions::{NewSubmission, SubmissionService};
