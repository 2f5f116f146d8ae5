// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Checkout orchestration.
//!
//! An authenticated caller goes straight to the payment processor. An
//! anonymous caller gets a signed intent token instead; the plan it carries
//! is attached to the account as its pending plan once signup or login
//! completes.

use crate::config::{CheckoutMode, Config};
use crate::db::Database;
use crate::error::{AppError, Result};
use crate::models::{PaymentStage, PendingPlan, Plan};
use crate::services::stripe::{CheckoutRequest, CheckoutTarget, PaymentProcessor};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// How long an intent token stays valid.
pub const INTENT_MAX_AGE_HOURS: i64 = 24;

/// Sign a plan intent: `base64url("plan|timestamp_hex|signature_hex")`.
pub fn sign_intent(plan: Plan, issued_at: DateTime<Utc>, key: &[u8]) -> Result<String> {
    let payload = format!("{}|{:x}", plan, issued_at.timestamp_millis());

    let mut mac = HmacSha256::new_from_slice(key)
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(payload.as_bytes());
    let signature = mac.finalize().into_bytes();

    let signed = format!("{}|{}", payload, hex::encode(signature));
    Ok(URL_SAFE_NO_PAD.encode(signed.as_bytes()))
}

/// Verify an intent token and recover the plan it was issued for.
///
/// Returns `None` for malformed, tampered, future-dated or expired tokens.
pub fn verify_intent(token: &str, key: &[u8], now: DateTime<Utc>) -> Option<PendingPlan> {
    let bytes = URL_SAFE_NO_PAD.decode(token).ok()?;
    let decoded = String::from_utf8(bytes).ok()?;

    let parts: Vec<&str> = decoded.splitn(3, '|').collect();
    if parts.len() != 3 {
        return None;
    }
    let (plan_str, timestamp_hex, signature_hex) = (parts[0], parts[1], parts[2]);

    let mut mac = HmacSha256::new_from_slice(key).ok()?;
    mac.update(format!("{}|{}", plan_str, timestamp_hex).as_bytes());
    let signature = hex::decode(signature_hex).ok()?;
    if mac.verify_slice(&signature).is_err() {
        tracing::warn!("Intent token signature mismatch");
        return None;
    }

    let millis = i64::from_str_radix(timestamp_hex, 16).ok()?;
    let requested_at = DateTime::<Utc>::from_timestamp_millis(millis)?;
    if requested_at > now || now - requested_at > Duration::hours(INTENT_MAX_AGE_HOURS) {
        return None;
    }

    Some(PendingPlan {
        plan: plan_str.parse().ok()?,
        requested_at,
    })
}

/// Result of a subscription request.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "next", rename_all = "snake_case")]
pub enum SubscriptionRequest {
    /// Caller must sign up or log in first, carrying the intent token.
    Authenticate {
        plan: Plan,
        intent_token: String,
        redirect_url: String,
    },
    /// Caller should continue at the processor.
    Checkout { plan: Plan, checkout: CheckoutTarget },
}

/// Creates checkout sessions and captures plan intent.
#[derive(Clone)]
pub struct CheckoutService {
    config: Arc<Config>,
    db: Database,
    payments: PaymentProcessor,
}

impl CheckoutService {
    pub fn new(config: Arc<Config>, db: Database, payments: PaymentProcessor) -> Self {
        Self {
            config,
            db,
            payments,
        }
    }

    /// Start a subscription for `plan`.
    ///
    /// Anonymous callers never reach the processor. Processor failures for
    /// authenticated callers surface as retryable upstream errors and leave
    /// no local state behind.
    pub async fn request_subscription(
        &self,
        plan: Plan,
        account_id: Option<&str>,
        mode: Option<CheckoutMode>,
    ) -> Result<SubscriptionRequest> {
        let Some(account_id) = account_id else {
            let intent_token = sign_intent(plan, Utc::now(), &self.config.intent_signing_key)?;
            let redirect_url = format!(
                "{}/signup?plan={}&intent={}",
                self.config.frontend_url,
                plan,
                urlencoding::encode(&intent_token)
            );
            tracing::info!(plan = %plan, "Recorded anonymous plan intent");
            return Ok(SubscriptionRequest::Authenticate {
                plan,
                intent_token,
                redirect_url,
            });
        };

        let checkout = self
            .create_checkout(account_id, plan, mode.unwrap_or(self.config.checkout_mode))
            .await?;
        Ok(SubscriptionRequest::Checkout { plan, checkout })
    }

    /// Create a processor checkout session scoped to an account.
    pub async fn create_checkout(
        &self,
        account_id: &str,
        plan: Plan,
        mode: CheckoutMode,
    ) -> Result<CheckoutTarget> {
        let account = self
            .db
            .get_account(account_id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Account {}", account_id)))?;

        // At most one paying subscription per account.
        let subscriptions = self.db.get_subscriptions_for_account(account_id).await?;
        if PaymentStage::from_subscriptions(&subscriptions) == PaymentStage::Active {
            tracing::warn!(account_id, plan = %plan, "Checkout refused, already subscribed");
            return Err(AppError::Eligibility("already subscribed".to_string()));
        }

        // Reuse the processor customer from an earlier checkout if there is one.
        let customer_id = self
            .db
            .get_profile(account_id)
            .await?
            .and_then(|p| p.stripe_customer_id);

        let request = CheckoutRequest {
            account_id: account.id.clone(),
            customer_email: account.email.clone(),
            customer_id,
            plan,
            price_id: self.config.price_for(plan).to_string(),
            mode,
            frontend_url: self.config.frontend_url.clone(),
        };

        let target = self.payments.create_checkout_session(&request).await?;

        tracing::info!(
            account_id,
            plan = %plan,
            session_id = target.session_id(),
            "Checkout session created"
        );
        Ok(target)
    }

    /// Attach a signed intent to an account as its pending plan.
    ///
    /// Invalid or expired tokens are ignored. Returns whether a plan was
    /// recorded.
    pub async fn attach_intent(&self, account_id: &str, intent_token: &str) -> Result<bool> {
        let Some(pending) =
            verify_intent(intent_token, &self.config.intent_signing_key, Utc::now())
        else {
            tracing::warn!(account_id, "Ignoring invalid or expired plan intent");
            return Ok(false);
        };

        let plan = pending.plan;
        let recorded = self.db.set_pending_plan(account_id, pending).await?;
        if recorded {
            tracing::info!(account_id, plan = %plan, "Pending plan recorded");
        }
        Ok(recorded)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: &[u8] = b"intent-key";

    #[test]
    fn test_intent_round_trip() {
        let now = Utc::now();
        let token = sign_intent(Plan::Annual, now, KEY).unwrap();
        let pending = verify_intent(&token, KEY, now + Duration::hours(1)).unwrap();
        assert_eq!(pending.plan, Plan::Annual);
        assert_eq!(pending.requested_at.timestamp_millis(), now.timestamp_millis());
    }

    #[test]
    fn test_intent_rejects_wrong_key_and_tampering() {
        let now = Utc::now();
        let token = sign_intent(Plan::Monthly, now, KEY).unwrap();
        assert!(verify_intent(&token, b"other-key", now).is_none());

        // Swap the plan while keeping the signature
        let decoded = String::from_utf8(URL_SAFE_NO_PAD.decode(&token).unwrap()).unwrap();
        let forged = URL_SAFE_NO_PAD.encode(decoded.replacen("monthly", "annual", 1));
        assert!(verify_intent(&forged, KEY, now).is_none());

        assert!(verify_intent("not-base64!", KEY, now).is_none());
        assert!(verify_intent(&URL_SAFE_NO_PAD.encode("a|b"), KEY, now).is_none());
    }

    #[test]
    fn test_intent_expiry() {
        let issued = Utc::now() - Duration::hours(INTENT_MAX_AGE_HOURS) - Duration::minutes(1);
        let token = sign_intent(Plan::Monthly, issued, KEY).unwrap();
        assert!(verify_intent(&token, KEY, Utc::now()).is_none());

        let future = Utc::now() + Duration::hours(1);
        let token = sign_intent(Plan::Monthly, future, KEY).unwrap();
        assert!(verify_intent(&token, KEY, Utc::now()).is_none());
    }

    #[tokio::test]
    async fn test_anonymous_request_does_not_contact_processor() {
        let payments = PaymentProcessor::mock();
        let service = CheckoutService::new(
            Arc::new(Config::test_default()),
            Database::memory(),
            payments.clone(),
        );

        let result = service
            .request_subscription(Plan::Monthly, None, None)
            .await
            .unwrap();
        match result {
            SubscriptionRequest::Authenticate { redirect_url, .. } => {
                assert!(redirect_url.contains("/signup?plan=monthly&intent="));
            }
            other => panic!("expected intent, got {:?}", other),
        }
        assert_eq!(payments.as_mock().unwrap().sessions_created(), 0);
    }
}
