// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Webhook-driven billing state.
//!
//! The processor's event stream is the only writer of payment state. Events
//! may arrive more than once and out of order, so every write is an upsert
//! keyed by the processor's subscription ID.

use crate::config::Config;
use crate::db::Database;
use crate::error::Result;
use crate::models::{Plan, Subscription, SubscriptionStatus};
use crate::services::stripe::{PaymentProcessor, ProcessorSubscription};
use chrono::Utc;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Processor event envelope.
#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: WebhookEventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEventData {
    pub object: serde_json::Value,
}

/// Checkout session object from `checkout.session.completed`.
#[derive(Debug, Clone, Deserialize)]
struct CheckoutSessionObject {
    id: String,
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    client_reference_id: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

/// Invoice object from `invoice.*` events.
#[derive(Debug, Clone, Deserialize)]
struct InvoiceObject {
    #[serde(default)]
    customer: Option<String>,
    #[serde(default)]
    subscription: Option<String>,
    #[serde(default)]
    parent: Option<InvoiceParent>,
}

#[derive(Debug, Clone, Deserialize)]
struct InvoiceParent {
    #[serde(default)]
    subscription_details: Option<InvoiceSubscriptionDetails>,
}

#[derive(Debug, Clone, Deserialize)]
struct InvoiceSubscriptionDetails {
    #[serde(default)]
    subscription: Option<String>,
}

impl InvoiceObject {
    fn subscription_id(&self) -> Option<&str> {
        self.subscription.as_deref().or_else(|| {
            self.parent
                .as_ref()
                .and_then(|p| p.subscription_details.as_ref())
                .and_then(|d| d.subscription.as_deref())
        })
    }
}

/// What happened to an event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WebhookOutcome {
    /// State was written.
    Applied,
    /// Event type is not one we act on.
    Ignored,
    /// Event could not be tied to an account. Logged, not retried.
    Dropped(String),
}

/// Applies processor events to profiles and the subscription mirror.
#[derive(Clone)]
pub struct BillingService {
    config: Arc<Config>,
    db: Database,
    payments: PaymentProcessor,
}

impl BillingService {
    pub fn new(config: Arc<Config>, db: Database, payments: PaymentProcessor) -> Self {
        Self {
            config,
            db,
            payments,
        }
    }

    /// Apply one verified event.
    ///
    /// Errors are upstream or database failures; the caller answers with a
    /// server error so the processor redelivers.
    pub async fn apply_event(&self, event: &WebhookEvent) -> Result<WebhookOutcome> {
        tracing::info!(event_id = %event.id, event_type = %event.event_type, "Applying webhook event");

        let outcome = match event.event_type.as_str() {
            "checkout.session.completed" => {
                match serde_json::from_value(event.data.object.clone()) {
                    Ok(session) => self.checkout_completed(session).await?,
                    Err(e) => WebhookOutcome::Dropped(format!("malformed checkout session: {}", e)),
                }
            }
            "customer.subscription.created" | "customer.subscription.updated" => {
                match serde_json::from_value(event.data.object.clone()) {
                    Ok(subscription) => self.subscription_changed(&subscription).await?,
                    Err(e) => WebhookOutcome::Dropped(format!("malformed subscription: {}", e)),
                }
            }
            "customer.subscription.deleted" => {
                match serde_json::from_value(event.data.object.clone()) {
                    Ok(subscription) => self.subscription_deleted(&subscription).await?,
                    Err(e) => WebhookOutcome::Dropped(format!("malformed subscription: {}", e)),
                }
            }
            "invoice.payment_succeeded" | "invoice.payment_failed" | "invoice.paid" => {
                match serde_json::from_value(event.data.object.clone()) {
                    Ok(invoice) => self.invoice_event(&invoice).await?,
                    Err(e) => WebhookOutcome::Dropped(format!("malformed invoice: {}", e)),
                }
            }
            _ => WebhookOutcome::Ignored,
        };

        match &outcome {
            WebhookOutcome::Applied => {
                tracing::info!(event_id = %event.id, event_type = %event.event_type, "Webhook applied");
            }
            WebhookOutcome::Ignored => {
                tracing::debug!(event_id = %event.id, event_type = %event.event_type, "Webhook ignored");
            }
            WebhookOutcome::Dropped(reason) => {
                tracing::warn!(
                    event_id = %event.id,
                    event_type = %event.event_type,
                    reason = %reason,
                    "Webhook dropped"
                );
            }
        }
        Ok(outcome)
    }

    /// Checkout finished: mirror the subscription and mark the account paid.
    async fn checkout_completed(&self, session: CheckoutSessionObject) -> Result<WebhookOutcome> {
        let Some(account_id) = self
            .resolve_account(
                session.customer.as_deref(),
                session
                    .metadata
                    .get("account_id")
                    .or(session.client_reference_id.as_ref())
                    .map(String::as_str),
            )
            .await?
        else {
            return Ok(WebhookOutcome::Dropped(format!(
                "no account for checkout session {}",
                session.id
            )));
        };

        if let Some(subscription_id) = &session.subscription {
            let mut subscription = self.payments.get_subscription(subscription_id).await?;
            if subscription.customer.is_none() {
                subscription.customer = session.customer.clone();
            }
            let plan = session.metadata.get("plan").and_then(|p| p.parse().ok());
            self.db
                .upsert_subscription(&self.mirror(&subscription, &account_id, plan))
                .await?;
        }

        if !self.db.mark_paid(&account_id, session.customer.clone()).await? {
            return Ok(WebhookOutcome::Dropped(format!(
                "account {} has no profile",
                account_id
            )));
        }

        tracing::info!(
            account_id = %account_id,
            session_id = %session.id,
            subscription_id = session.subscription.as_deref().unwrap_or(""),
            "Account marked paid"
        );
        Ok(WebhookOutcome::Applied)
    }

    /// Status or period change: update the mirror only.
    async fn subscription_changed(
        &self,
        subscription: &ProcessorSubscription,
    ) -> Result<WebhookOutcome> {
        let Some(account_id) = self.resolve_subscription_account(subscription).await? else {
            return Ok(WebhookOutcome::Dropped(format!(
                "no account for subscription {}",
                subscription.id
            )));
        };

        self.db
            .upsert_subscription(&self.mirror(subscription, &account_id, None))
            .await?;

        tracing::info!(
            account_id = %account_id,
            subscription_id = %subscription.id,
            status = %subscription.status,
            "Subscription mirror updated"
        );
        Ok(WebhookOutcome::Applied)
    }

    /// Subscription ended: mirror it, then recompute `is_paid` from what remains.
    async fn subscription_deleted(
        &self,
        subscription: &ProcessorSubscription,
    ) -> Result<WebhookOutcome> {
        let Some(account_id) = self.resolve_subscription_account(subscription).await? else {
            return Ok(WebhookOutcome::Dropped(format!(
                "no account for subscription {}",
                subscription.id
            )));
        };

        let mut mirror = self.mirror(subscription, &account_id, None);
        if mirror.status.grants_access() {
            mirror.status = SubscriptionStatus::Canceled;
        }
        self.db.upsert_subscription(&mirror).await?;

        let still_paid = self
            .db
            .get_subscriptions_for_account(&account_id)
            .await?
            .iter()
            .any(|s| s.stripe_subscription_id != subscription.id && s.status.grants_access());
        self.db.set_paid(&account_id, still_paid).await?;

        tracing::info!(
            account_id = %account_id,
            subscription_id = %subscription.id,
            is_paid = still_paid,
            "Subscription deleted, payment recomputed"
        );
        Ok(WebhookOutcome::Applied)
    }

    /// Invoice outcome: refresh the mirror from the processor's current view.
    async fn invoice_event(&self, invoice: &InvoiceObject) -> Result<WebhookOutcome> {
        let Some(subscription_id) = invoice.subscription_id() else {
            return Ok(WebhookOutcome::Ignored);
        };

        let mut subscription = self.payments.get_subscription(subscription_id).await?;
        if subscription.customer.is_none() {
            subscription.customer = invoice.customer.clone();
        }
        self.subscription_changed(&subscription).await
    }

    async fn resolve_subscription_account(
        &self,
        subscription: &ProcessorSubscription,
    ) -> Result<Option<String>> {
        self.resolve_account(
            subscription.customer.as_deref(),
            subscription.metadata.get("account_id").map(String::as_str),
        )
        .await
    }

    /// Find the account for an event: stored customer first, then metadata.
    async fn resolve_account(
        &self,
        customer_id: Option<&str>,
        metadata_account_id: Option<&str>,
    ) -> Result<Option<String>> {
        if let Some(customer_id) = customer_id {
            if let Some(profile) = self.db.find_profile_by_customer_id(customer_id).await? {
                return Ok(Some(profile.account_id));
            }
        }

        if let Some(account_id) = metadata_account_id {
            if self.db.get_account(account_id).await?.is_some() {
                return Ok(Some(account_id.to_string()));
            }
        }

        Ok(None)
    }

    fn mirror(
        &self,
        subscription: &ProcessorSubscription,
        account_id: &str,
        plan: Option<Plan>,
    ) -> Subscription {
        let (current_period_start, current_period_end) = subscription.period();
        let plan = plan
            .or_else(|| {
                subscription
                    .metadata
                    .get("plan")
                    .and_then(|p| p.parse().ok())
            })
            .or_else(|| {
                subscription
                    .price_id()
                    .and_then(|price| self.config.plan_for_price(price))
            });

        Subscription {
            stripe_subscription_id: subscription.id.clone(),
            account_id: account_id.to_string(),
            stripe_customer_id: subscription.customer.clone(),
            status: SubscriptionStatus::parse(&subscription.status),
            plan,
            current_period_start,
            current_period_end,
            cancel_at_period_end: subscription.cancel_at_period_end,
            updated_at: Utc::now(),
        }
    }
}
