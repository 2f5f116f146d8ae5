// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Pull-Up Club API Server
//!
//! Member accounts, Stripe-backed subscriptions, video submissions with
//! admin review, and the public leaderboard.

use pullup_club::{
    config::{Config, DatabaseBackend},
    db::{Database, FirestoreDb},
    services::PaymentProcessor,
    AppState,
};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize structured JSON logging for GCP
    init_logging();

    // Load configuration from environment
    let config = Config::from_env()?;
    tracing::info!(port = config.port, "Starting Pull-Up Club API");

    let db = match config.database_backend {
        DatabaseBackend::Firestore => {
            let db = FirestoreDb::new(&config.gcp_project_id).await?;
            tracing::info!(project = %config.gcp_project_id, "Firestore connected");
            Database::Firestore(db)
        }
        DatabaseBackend::Memory => {
            tracing::warn!("Using in-memory database; data is lost on restart");
            Database::memory()
        }
    };

    let payments = PaymentProcessor::stripe(config.stripe_secret_key.clone());
    tracing::info!(checkout_mode = ?config.checkout_mode, "Stripe client initialized");

    let port = config.port;
    let state = Arc::new(AppState::new(config, db, payments));

    // Build router
    let app = pullup_club::routes::create_router(state);

    // Start server
    let addr = format!("0.0.0.0:{}", port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(address = %addr, "Server listening");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Initialize structured JSON logging (GCP-compliant).
fn init_logging() {
    let format = tracing_subscriber::fmt::layer()
        .json()
        .with_target(false)
        .with_current_span(true)
        .flatten_event(true);

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("pullup_club=debug,info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(format)
        .init();
}
