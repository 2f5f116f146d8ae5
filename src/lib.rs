// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@kernel.org>

//! Pull-Up Club: membership backend for a pull-up competition.
//!
//! This crate provides the API for member signup and login, subscription
//! checkout and webhook-driven activation, video submissions with admin
//! review, badges, and the public leaderboard.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod services;
pub mod time_utils;

use config::Config;
use db::Database;
use services::{
    ActivationService, BillingService, CheckoutService, IdentityService, LeaderboardService,
    PaymentProcessor, SubmissionService,
};
use std::sync::Arc;

/// Shared application state.
pub struct AppState {
    pub config: Arc<Config>,
    pub db: Database,
    pub payments: PaymentProcessor,
    pub identity: IdentityService,
    pub checkout: CheckoutService,
    pub activation: ActivationService,
    pub billing: BillingService,
    pub submissions: SubmissionService,
    pub leaderboard: LeaderboardService,
}

impl AppState {
    /// Wire up services over a database and payment processor.
    pub fn new(config: Config, db: Database, payments: PaymentProcessor) -> Self {
        let config = Arc::new(config);
        let checkout = CheckoutService::new(config.clone(), db.clone(), payments.clone());

        Self {
            identity: IdentityService::new(db.clone()),
            activation: ActivationService::new(config.clone(), db.clone(), checkout.clone()),
            billing: BillingService::new(config.clone(), db.clone(), payments.clone()),
            submissions: SubmissionService::new(db.clone()),
            leaderboard: LeaderboardService::new(db.clone()),
            checkout,
            config,
            db,
            payments,
        }
    }
}
