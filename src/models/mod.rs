// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Data models for the application.

pub mod account;
pub mod badge;
pub mod leaderboard;
pub mod profile;
pub mod submission;
pub mod subscription;

pub use account::{Account, Role};
pub use badge::{Badge, BadgeProgress};
pub use leaderboard::{LeaderboardEntry, LeaderboardFilter};
pub use profile::{Gender, PendingPlan, Profile, ProfileStage, ProfileUpdate};
pub use submission::{Eligibility, Platform, ReviewDecision, Submission, SubmissionStatus};
pub use subscription::{PaymentStage, Plan, Subscription, SubscriptionStatus};
