// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Application configuration loaded from environment variables.
//!
//! Cloud Run injects secrets as environment variables via secret bindings,
//! so everything is read once at startup and cached in memory.

use crate::models::Plan;
use std::env;
use std::time::Duration;

/// Which persistence backend to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatabaseBackend {
    Firestore,
    Memory,
}

/// How the payment processor's checkout page is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckoutMode {
    /// Redirect to a processor-hosted page.
    Hosted,
    /// Mount the processor's embedded checkout with a client secret.
    Embedded,
}

impl std::str::FromStr for CheckoutMode {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hosted" => Ok(CheckoutMode::Hosted),
            "embedded" => Ok(CheckoutMode::Embedded),
            _ => Err(ConfigError::Invalid("CHECKOUT_MODE")),
        }
    }
}

/// Application configuration, loaded once at startup.
#[derive(Debug, Clone)]
pub struct Config {
    // --- Environment Variables (non-sensitive) ---
    /// Frontend URL for checkout redirects and CORS
    pub frontend_url: String,
    /// GCP project ID
    pub gcp_project_id: String,
    /// Server port
    pub port: u16,
    /// Persistence backend
    pub database_backend: DatabaseBackend,
    /// Default checkout presentation
    pub checkout_mode: CheckoutMode,
    /// Stripe price for the monthly plan
    pub stripe_price_monthly: String,
    /// Stripe price for the annual plan
    pub stripe_price_annual: String,
    /// Attempts made when the profile row is not yet readable after signup
    pub profile_fetch_attempts: u32,
    /// Base delay between profile fetch attempts (attempt n waits n * base)
    pub profile_fetch_backoff: Duration,

    // --- Secrets ---
    /// JWT signing key for session tokens (raw bytes)
    pub jwt_signing_key: Vec<u8>,
    /// HMAC key for plan intent tokens
    pub intent_signing_key: Vec<u8>,
    /// Stripe API secret key
    pub stripe_secret_key: String,
    /// Stripe webhook endpoint signing secret
    pub stripe_webhook_secret: String,
}

impl Config {
    /// Default config for testing only.
    pub fn test_default() -> Self {
        Self {
            frontend_url: "http://localhost:5173".to_string(),
            gcp_project_id: "test-project".to_string(),
            port: 8080,
            database_backend: DatabaseBackend::Memory,
            checkout_mode: CheckoutMode::Hosted,
            stripe_price_monthly: "price_test_monthly".to_string(),
            stripe_price_annual: "price_test_annual".to_string(),
            profile_fetch_attempts: 3,
            profile_fetch_backoff: Duration::from_millis(1),
            jwt_signing_key: b"test_jwt_key_32_bytes_minimum!!".to_vec(),
            intent_signing_key: b"test_intent_key_32_bytes_minimum".to_vec(),
            stripe_secret_key: "sk_test_offline".to_string(),
            stripe_webhook_secret: "whsec_test_secret".to_string(),
        }
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok(); // Load .env file if present

        let database_backend = match env::var("DATABASE_BACKEND")
            .unwrap_or_else(|_| "firestore".to_string())
            .as_str()
        {
            "firestore" => DatabaseBackend::Firestore,
            "memory" => DatabaseBackend::Memory,
            _ => return Err(ConfigError::Invalid("DATABASE_BACKEND")),
        };

        let checkout_mode = match env::var("CHECKOUT_MODE") {
            Ok(raw) => raw.parse()?,
            Err(_) => CheckoutMode::Hosted,
        };

        Ok(Self {
            frontend_url: env::var("FRONTEND_URL")
                .unwrap_or_else(|_| "http://localhost:5173".to_string()),
            gcp_project_id: env::var("GCP_PROJECT_ID").unwrap_or_else(|_| "local-dev".to_string()),
            port: env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .unwrap_or(8080),
            database_backend,
            checkout_mode,
            stripe_price_monthly: required("STRIPE_PRICE_MONTHLY")?,
            stripe_price_annual: required("STRIPE_PRICE_ANNUAL")?,
            profile_fetch_attempts: env::var("PROFILE_FETCH_ATTEMPTS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(3),
            profile_fetch_backoff: Duration::from_millis(
                env::var("PROFILE_FETCH_BACKOFF_MS")
                    .ok()
                    .and_then(|v| v.parse().ok())
                    .unwrap_or(200),
            ),

            jwt_signing_key: required("JWT_SIGNING_KEY")?.into_bytes(),
            intent_signing_key: required("INTENT_SIGNING_KEY")?.into_bytes(),
            stripe_secret_key: required("STRIPE_SECRET_KEY")?,
            stripe_webhook_secret: required("STRIPE_WEBHOOK_SECRET")?,
        })
    }

    /// Stripe price ID for a plan.
    pub fn price_for(&self, plan: Plan) -> &str {
        match plan {
            Plan::Monthly => &self.stripe_price_monthly,
            Plan::Annual => &self.stripe_price_annual,
        }
    }

    /// Plan sold at a Stripe price, if it is one of ours.
    pub fn plan_for_price(&self, price_id: &str) -> Option<Plan> {
        [Plan::Monthly, Plan::Annual]
            .into_iter()
            .find(|plan| self.price_for(*plan) == price_id)
    }

    /// Whether session cookies should carry the `Secure` attribute.
    pub fn secure_cookies(&self) -> bool {
        self.frontend_url.starts_with("https://")
    }
}

/// Read a required variable, trimming stray whitespace from secret bindings.
fn required(name: &'static str) -> Result<String, ConfigError> {
    env::var(name)
        .map(|v| v.trim().to_string())
        .map_err(|_| ConfigError::Missing(name))
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    Missing(&'static str),

    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_env() {
        // Set required env vars for test
        env::set_var("JWT_SIGNING_KEY", "test_jwt_key_32_bytes_minimum!!");
        env::set_var("INTENT_SIGNING_KEY", "test_intent_key");
        env::set_var("STRIPE_SECRET_KEY", " sk_test_123 ");
        env::set_var("STRIPE_WEBHOOK_SECRET", "whsec_123");
        env::set_var("STRIPE_PRICE_MONTHLY", "price_m");
        env::set_var("STRIPE_PRICE_ANNUAL", "price_a");

        let config = Config::from_env().expect("Config should load");

        assert_eq!(config.stripe_secret_key, "sk_test_123");
        assert_eq!(config.price_for(Plan::Monthly), "price_m");
        assert_eq!(config.price_for(Plan::Annual), "price_a");
        assert_eq!(config.plan_for_price("price_a"), Some(Plan::Annual));
        assert_eq!(config.plan_for_price("price_other"), None);
        assert_eq!(config.port, 8080);
        assert_eq!(config.profile_fetch_attempts, 3);
    }

    #[test]
    fn test_checkout_mode_parse() {
        assert_eq!("hosted".parse::<CheckoutMode>().unwrap(), CheckoutMode::Hosted);
        assert_eq!(" Embedded ".parse::<CheckoutMode>().unwrap(), CheckoutMode::Embedded);
        assert!("popup".parse::<CheckoutMode>().is_err());
    }
}
