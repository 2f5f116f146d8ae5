// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Stripe API client for checkout sessions and subscriptions.
//!
//! Handles:
//! - Checkout session creation (hosted redirect or embedded client secret)
//! - Session status lookups for the provisional success page
//! - Subscription fetches for webhook reconciliation
//! - Webhook signature verification
//!
//! `PaymentProcessor::mock()` provides an offline stand-in used by local
//! development and the test suite.

use crate::config::CheckoutMode;
use crate::error::{AppError, Result};
use crate::models::Plan;
use chrono::{DateTime, Duration, TimeZone, Utc};
use dashmap::DashMap;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

type HmacSha256 = Hmac<Sha256>;

/// Maximum age of a webhook signature timestamp, in seconds.
pub const WEBHOOK_TOLERANCE_SECS: i64 = 300;

/// Parameters for a new subscription checkout.
#[derive(Debug, Clone)]
pub struct CheckoutRequest {
    pub account_id: String,
    pub customer_email: String,
    /// Existing processor customer, reused instead of the email when known
    pub customer_id: Option<String>,
    pub plan: Plan,
    pub price_id: String,
    pub mode: CheckoutMode,
    /// Base URL the processor sends the browser back to
    pub frontend_url: String,
}

impl CheckoutRequest {
    fn success_url(&self) -> String {
        format!(
            "{}/checkout/success?session_id={{CHECKOUT_SESSION_ID}}",
            self.frontend_url
        )
    }

    fn cancel_url(&self) -> String {
        format!("{}/subscribe?canceled=1", self.frontend_url)
    }

    fn return_url(&self) -> String {
        format!(
            "{}/checkout/return?session_id={{CHECKOUT_SESSION_ID}}",
            self.frontend_url
        )
    }
}

/// Where the browser goes to pay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum CheckoutTarget {
    Hosted { url: String, session_id: String },
    Embedded { client_secret: String, session_id: String },
}

impl CheckoutTarget {
    pub fn session_id(&self) -> &str {
        match self {
            CheckoutTarget::Hosted { session_id, .. } => session_id,
            CheckoutTarget::Embedded { session_id, .. } => session_id,
        }
    }
}

/// Checkout session status as reported by the processor.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatus {
    #[serde(rename = "id")]
    pub session_id: String,
    /// `open`, `complete` or `expired`
    pub status: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`
    pub payment_status: Option<String>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

impl SessionStatus {
    /// Account the session was created for.
    pub fn account_id(&self) -> Option<&str> {
        self.metadata
            .get("account_id")
            .or(self.client_reference_id.as_ref())
            .map(String::as_str)
    }
}

/// Price reference on a subscription item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorPrice {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorSubscriptionItem {
    pub price: ProcessorPrice,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ProcessorSubscriptionItems {
    #[serde(default)]
    pub data: Vec<ProcessorSubscriptionItem>,
}

/// Stripe subscription object, as returned by the API and inside webhook events.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProcessorSubscription {
    pub id: String,
    #[serde(default)]
    pub customer: Option<String>,
    pub status: String,
    #[serde(default)]
    pub current_period_start: Option<i64>,
    #[serde(default)]
    pub current_period_end: Option<i64>,
    #[serde(default)]
    pub cancel_at_period_end: bool,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
    #[serde(default)]
    pub items: ProcessorSubscriptionItems,
}

impl ProcessorSubscription {
    /// Billing period, falling back to the first item for newer API versions.
    pub fn period(&self) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
        let item = self.items.data.first();
        let start = self
            .current_period_start
            .or_else(|| item.and_then(|i| i.current_period_start));
        let end = self
            .current_period_end
            .or_else(|| item.and_then(|i| i.current_period_end));
        (start.and_then(from_unix), end.and_then(from_unix))
    }

    pub fn price_id(&self) -> Option<&str> {
        self.items.data.first().map(|i| i.price.id.as_str())
    }
}

fn from_unix(secs: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_opt(secs, 0).single()
}

// ─── Live Client ─────────────────────────────────────────────

/// Stripe REST client.
#[derive(Clone)]
pub struct StripeClient {
    http: reqwest::Client,
    base_url: String,
    secret_key: String,
}

#[derive(Deserialize)]
struct CreatedSession {
    id: String,
    url: Option<String>,
    client_secret: Option<String>,
}

impl StripeClient {
    pub fn new(secret_key: String) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: "https://api.stripe.com/v1".to_string(),
            secret_key,
        }
    }

    async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutTarget> {
        const OP: &str = "create_checkout_session";

        let mut form: Vec<(&str, String)> = vec![
            ("mode", "subscription".to_string()),
            ("line_items[0][price]", request.price_id.clone()),
            ("line_items[0][quantity]", "1".to_string()),
            ("client_reference_id", request.account_id.clone()),
            ("metadata[account_id]", request.account_id.clone()),
            ("metadata[plan]", request.plan.to_string()),
            (
                "subscription_data[metadata][account_id]",
                request.account_id.clone(),
            ),
            ("subscription_data[metadata][plan]", request.plan.to_string()),
        ];

        match &request.customer_id {
            Some(customer) => form.push(("customer", customer.clone())),
            None => form.push(("customer_email", request.customer_email.clone())),
        }

        match request.mode {
            CheckoutMode::Hosted => {
                form.push(("success_url", request.success_url()));
                form.push(("cancel_url", request.cancel_url()));
            }
            CheckoutMode::Embedded => {
                form.push(("ui_mode", "embedded".to_string()));
                form.push(("return_url", request.return_url()));
            }
        }

        let response = self
            .http
            .post(format!("{}/checkout/sessions", self.base_url))
            .bearer_auth(&self.secret_key)
            .form(&form)
            .send()
            .await
            .map_err(|e| AppError::stripe(OP, e.to_string()))?;

        let session: CreatedSession = check_response_json(response, OP).await?;

        match request.mode {
            CheckoutMode::Hosted => Ok(CheckoutTarget::Hosted {
                url: session
                    .url
                    .ok_or_else(|| AppError::stripe(OP, "session has no url"))?,
                session_id: session.id,
            }),
            CheckoutMode::Embedded => Ok(CheckoutTarget::Embedded {
                client_secret: session
                    .client_secret
                    .ok_or_else(|| AppError::stripe(OP, "session has no client_secret"))?,
                session_id: session.id,
            }),
        }
    }

    async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus> {
        const OP: &str = "retrieve_session";
        let url = format!(
            "{}/checkout/sessions/{}",
            self.base_url,
            urlencoding::encode(session_id)
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::stripe(OP, e.to_string()))?;
        check_response_json(response, OP).await
    }

    async fn get_subscription(&self, subscription_id: &str) -> Result<ProcessorSubscription> {
        const OP: &str = "get_subscription";
        let url = format!(
            "{}/subscriptions/{}",
            self.base_url,
            urlencoding::encode(subscription_id)
        );
        let response = self
            .http
            .get(&url)
            .bearer_auth(&self.secret_key)
            .send()
            .await
            .map_err(|e| AppError::stripe(OP, e.to_string()))?;
        check_response_json(response, OP).await
    }
}

/// Check response status and parse the JSON body.
async fn check_response_json<T: for<'de> Deserialize<'de>>(
    response: reqwest::Response,
    operation: &'static str,
) -> Result<T> {
    if !response.status().is_success() {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            tracing::warn!(operation, "Stripe rate limit hit (429)");
        }
        return Err(AppError::stripe(
            operation,
            format!("HTTP {}: {}", status, body),
        ));
    }

    response
        .json()
        .await
        .map_err(|e| AppError::stripe(operation, format!("Failed to parse response: {}", e)))
}

// ─── Offline Mock ────────────────────────────────────────────

#[derive(Default)]
struct MockState {
    sessions: DashMap<String, CheckoutRequest>,
    completed: DashMap<String, ()>,
    subscriptions: DashMap<String, ProcessorSubscription>,
    next_id: AtomicU64,
    failing: AtomicBool,
}

/// In-process processor that records what it was asked to do.
#[derive(Clone, Default)]
pub struct MockProcessor {
    state: Arc<MockState>,
}

impl MockProcessor {
    /// Make every subsequent call fail with an upstream error.
    pub fn set_failing(&self, failing: bool) {
        self.state.failing.store(failing, Ordering::SeqCst);
    }

    /// Number of checkout sessions created so far.
    pub fn sessions_created(&self) -> usize {
        self.state.sessions.len()
    }

    /// Checkout sessions created for one account.
    pub fn sessions_for(&self, account_id: &str) -> Vec<CheckoutRequest> {
        self.state
            .sessions
            .iter()
            .filter(|s| s.account_id == account_id)
            .map(|s| s.clone())
            .collect()
    }

    /// Mark a session as paid, as if the browser finished checkout.
    pub fn complete_session(&self, session_id: &str) {
        self.state.completed.insert(session_id.to_string(), ());
    }

    pub fn insert_subscription(&self, subscription: ProcessorSubscription) {
        self.state
            .subscriptions
            .insert(subscription.id.clone(), subscription);
    }

    fn check_failing(&self, operation: &'static str) -> Result<()> {
        if self.state.failing.load(Ordering::SeqCst) {
            return Err(AppError::stripe(operation, "mock processor unavailable"));
        }
        Ok(())
    }

    fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutTarget> {
        self.check_failing("create_checkout_session")?;

        let n = self.state.next_id.fetch_add(1, Ordering::SeqCst) + 1;
        let session_id = format!("cs_test_{:06}", n);
        self.state
            .sessions
            .insert(session_id.clone(), request.clone());

        Ok(match request.mode {
            CheckoutMode::Hosted => CheckoutTarget::Hosted {
                url: format!("https://checkout.stripe.test/pay/{}", session_id),
                session_id,
            },
            CheckoutMode::Embedded => CheckoutTarget::Embedded {
                client_secret: format!("{}_secret_mock", session_id),
                session_id,
            },
        })
    }

    fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus> {
        self.check_failing("retrieve_session")?;

        let Some(request) = self.state.sessions.get(session_id).map(|r| r.clone()) else {
            return Err(AppError::NotFound(format!(
                "checkout session {}",
                session_id
            )));
        };
        let complete = self.state.completed.contains_key(session_id);
        Ok(SessionStatus {
            session_id: session_id.to_string(),
            status: Some(if complete { "complete" } else { "open" }.to_string()),
            payment_status: Some(if complete { "paid" } else { "unpaid" }.to_string()),
            client_reference_id: Some(request.account_id.clone()),
            metadata: HashMap::from([
                ("account_id".to_string(), request.account_id),
                ("plan".to_string(), request.plan.to_string()),
            ]),
        })
    }

    fn get_subscription(&self, subscription_id: &str) -> Result<ProcessorSubscription> {
        self.check_failing("get_subscription")?;

        if let Some(subscription) = self.state.subscriptions.get(subscription_id) {
            return Ok(subscription.clone());
        }

        // Unknown subscriptions look like a freshly started paid period.
        let now = Utc::now();
        Ok(ProcessorSubscription {
            id: subscription_id.to_string(),
            customer: None,
            status: "active".to_string(),
            current_period_start: Some(now.timestamp()),
            current_period_end: Some((now + Duration::days(30)).timestamp()),
            cancel_at_period_end: false,
            metadata: HashMap::new(),
            items: ProcessorSubscriptionItems::default(),
        })
    }
}

// ─── Processor Handle ────────────────────────────────────────

/// Payment processor used by the checkout and billing services.
#[derive(Clone)]
pub enum PaymentProcessor {
    Stripe(StripeClient),
    Mock(MockProcessor),
}

impl PaymentProcessor {
    pub fn stripe(secret_key: String) -> Self {
        PaymentProcessor::Stripe(StripeClient::new(secret_key))
    }

    pub fn mock() -> Self {
        PaymentProcessor::Mock(MockProcessor::default())
    }

    /// The mock, when running offline.
    pub fn as_mock(&self) -> Option<&MockProcessor> {
        match self {
            PaymentProcessor::Mock(mock) => Some(mock),
            PaymentProcessor::Stripe(_) => None,
        }
    }

    pub async fn create_checkout_session(&self, request: &CheckoutRequest) -> Result<CheckoutTarget> {
        match self {
            PaymentProcessor::Stripe(client) => client.create_checkout_session(request).await,
            PaymentProcessor::Mock(mock) => mock.create_checkout_session(request),
        }
    }

    pub async fn retrieve_session(&self, session_id: &str) -> Result<SessionStatus> {
        match self {
            PaymentProcessor::Stripe(client) => client.retrieve_session(session_id).await,
            PaymentProcessor::Mock(mock) => mock.retrieve_session(session_id),
        }
    }

    pub async fn get_subscription(&self, subscription_id: &str) -> Result<ProcessorSubscription> {
        match self {
            PaymentProcessor::Stripe(client) => client.get_subscription(subscription_id).await,
            PaymentProcessor::Mock(mock) => mock.get_subscription(subscription_id),
        }
    }
}

// ─── Webhook Signatures ──────────────────────────────────────

/// Compute a `Stripe-Signature` header value for a payload.
pub fn sign_webhook_payload(payload: &[u8], secret: &str, timestamp: i64) -> Result<String> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AppError::Internal(anyhow::anyhow!("HMAC init failed: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(format!(
        "t={},v1={}",
        timestamp,
        hex::encode(mac.finalize().into_bytes())
    ))
}

/// Verify a `Stripe-Signature` header (`t=<timestamp>,v1=<signature>[,v1=...]`).
///
/// The signed payload is `"{t}.{body}"`. Any matching `v1` entry is accepted
/// provided the timestamp is within `WEBHOOK_TOLERANCE_SECS` of `now`.
pub fn verify_webhook_signature(
    payload: &[u8],
    signature_header: &str,
    secret: &str,
    now: DateTime<Utc>,
) -> Result<()> {
    let invalid = || AppError::Validation("invalid webhook signature".to_string());

    let mut timestamp = None;
    let mut signatures = Vec::new();
    for part in signature_header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => timestamp = Some(value),
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp_str = timestamp.ok_or_else(invalid)?;
    let timestamp: i64 = timestamp_str.parse().map_err(|_| invalid())?;
    if (now.timestamp() - timestamp).abs() > WEBHOOK_TOLERANCE_SECS {
        tracing::warn!(timestamp, "Webhook signature outside tolerance window");
        return Err(invalid());
    }

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| invalid())?;
    mac.update(timestamp_str.as_bytes());
    mac.update(b".");
    mac.update(payload);
    let expected = hex::encode(mac.finalize().into_bytes());

    let matched = signatures
        .iter()
        .any(|sig| subtle::ConstantTimeEq::ct_eq(expected.as_bytes(), sig.as_bytes()).into());

    if matched {
        Ok(())
    } else {
        Err(invalid())
    }
}
