// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Integration tests for webhook handling.

use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use pullup_club::models::SubscriptionStatus;
use pullup_club::services::stripe::sign_webhook_payload;
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::*;

fn subscription_event(
    event_id: &str,
    event_type: &str,
    sub_id: &str,
    customer: &str,
    status: &str,
) -> serde_json::Value {
    let now = chrono::Utc::now().timestamp();
    json!({
        "id": event_id,
        "type": event_type,
        "data": {
            "object": {
                "id": sub_id,
                "customer": customer,
                "status": status,
                "current_period_start": now,
                "current_period_end": now + 30 * 86400,
                "cancel_at_period_end": false,
                "metadata": {},
                "items": { "data": [ { "price": { "id": "price_test_annual" } } ] }
            }
        }
    })
}

/// Sign up and pay through checkout; returns the account ID.
async fn paid_account(
    app: &axum::Router,
    state: &pullup_club::AppState,
    email: &str,
    customer: &str,
    sub_id: &str,
) -> String {
    let account = signup(app, email, None).await;
    let event = checkout_completed_event("evt_paid", "cs_test_x", &account.account_id, customer, sub_id);
    let (status, _) = send(app, signed_webhook(state, &event)).await;
    assert_eq!(status, StatusCode::OK);
    account.account_id
}

#[tokio::test]
async fn test_webhook_rejects_missing_signature() {
    let (app, _state) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/stripe")
                .header("Content-Type", "application/json")
                .body(Body::from(r#"{"id":"evt","type":"ping","data":{"object":{}}}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_webhook_rejects_bad_signature() {
    let (app, state) = create_test_app();
    let account = signup(&app, "forged@example.com", None).await;

    let payload = checkout_completed_event("evt_forged", "cs", &account.account_id, "cus_f", "sub_f").to_string();
    let now = chrono::Utc::now().timestamp();

    for signature in [
        sign_webhook_payload(payload.as_bytes(), "whsec_wrong", now).unwrap(),
        sign_webhook_payload(payload.as_bytes(), "whsec_test_secret", now - 3600).unwrap(),
        "t=abc,v1=deadbeef".to_string(),
    ] {
        let response = app
            .clone()
            .oneshot(
                Request::builder()
                    .method("POST")
                    .uri("/webhook/stripe")
                    .header("Stripe-Signature", signature)
                    .body(Body::from(payload.clone()))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    let profile = state.db.get_profile(&account.account_id).await.unwrap().unwrap();
    assert!(!profile.is_paid, "forged event must not grant access");
}

#[tokio::test]
async fn test_webhook_rejects_malformed_payload() {
    let (app, _state) = create_test_app();

    let payload = b"{not json";
    let signature = sign_webhook_payload(payload, "whsec_test_secret", chrono::Utc::now().timestamp()).unwrap();
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/webhook/stripe")
                .header("Stripe-Signature", signature)
                .body(Body::from(payload.to_vec()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_checkout_completed_is_idempotent() {
    let (app, state) = create_test_app();
    let account = signup(&app, "twice@example.com", None).await;
    let event = checkout_completed_event("evt_dup", "cs_dup", &account.account_id, "cus_dup", "sub_dup");

    for _ in 0..2 {
        let (status, json) = send(&app, signed_webhook(&state, &event)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(json["outcome"], "applied");
    }

    let profile = state.db.get_profile(&account.account_id).await.unwrap().unwrap();
    assert!(profile.is_paid);
    let subscriptions = state.db.get_subscriptions_for_account(&account.account_id).await.unwrap();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].stripe_subscription_id, "sub_dup");
}

#[tokio::test]
async fn test_status_change_updates_mirror_only() {
    let (app, state) = create_test_app();
    let account_id = paid_account(&app, &state, "pastdue@example.com", "cus_pd", "sub_pd").await;

    let event = subscription_event("evt_upd", "customer.subscription.updated", "sub_pd", "cus_pd", "past_due");
    let (status, _) = send(&app, signed_webhook(&state, &event)).await;
    assert_eq!(status, StatusCode::OK);

    let subscriptions = state.db.get_subscriptions_for_account(&account_id).await.unwrap();
    assert_eq!(subscriptions.len(), 1);
    assert_eq!(subscriptions[0].status, SubscriptionStatus::PastDue);
    assert_eq!(subscriptions[0].plan, Some(pullup_club::models::Plan::Annual));

    // is_paid only changes on checkout completion and deletion.
    let profile = state.db.get_profile(&account_id).await.unwrap().unwrap();
    assert!(profile.is_paid);
}

#[tokio::test]
async fn test_deleted_recomputes_from_remaining_subscriptions() {
    let (app, state) = create_test_app();
    let account_id = paid_account(&app, &state, "two@example.com", "cus_two", "sub_a").await;

    // A second active subscription for the same customer.
    let event = subscription_event("evt_b", "customer.subscription.created", "sub_b", "cus_two", "active");
    send(&app, signed_webhook(&state, &event)).await;

    let event = subscription_event("evt_del_a", "customer.subscription.deleted", "sub_a", "cus_two", "canceled");
    let (status, _) = send(&app, signed_webhook(&state, &event)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(state.db.get_profile(&account_id).await.unwrap().unwrap().is_paid);

    let event = subscription_event("evt_del_b", "customer.subscription.deleted", "sub_b", "cus_two", "canceled");
    send(&app, signed_webhook(&state, &event)).await;
    assert!(!state.db.get_profile(&account_id).await.unwrap().unwrap().is_paid);

    let subscriptions = state.db.get_subscriptions_for_account(&account_id).await.unwrap();
    assert!(subscriptions.iter().all(|s| s.status == SubscriptionStatus::Canceled));
}

#[tokio::test]
async fn test_unresolvable_account_is_dropped() {
    let (app, state) = create_test_app();

    let event = checkout_completed_event("evt_orphan", "cs_orphan", "no-such-account", "cus_orphan", "sub_orphan");
    let (status, json) = send(&app, signed_webhook(&state, &event)).await;

    // Acknowledged so the processor stops redelivering.
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "dropped");
    assert!(state.db.find_profile_by_customer_id("cus_orphan").await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_event_type_is_ignored() {
    let (app, state) = create_test_app();

    let event = json!({ "id": "evt_misc", "type": "customer.created", "data": { "object": { "id": "cus_1" } } });
    let (status, json) = send(&app, signed_webhook(&state, &event)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["outcome"], "ignored");
}

#[tokio::test]
async fn test_processor_failure_requests_redelivery() {
    let (app, state) = create_test_app();
    let account = signup(&app, "outage@example.com", None).await;
    mock(&state).set_failing(true);

    let event = checkout_completed_event("evt_outage", "cs_o", &account.account_id, "cus_o", "sub_o");
    let (status, _) = send(&app, signed_webhook(&state, &event)).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert!(!state.db.get_profile(&account.account_id).await.unwrap().unwrap().is_paid);

    // Redelivery after recovery applies cleanly.
    mock(&state).set_failing(false);
    let (status, _) = send(&app, signed_webhook(&state, &event)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(state.db.get_profile(&account.account_id).await.unwrap().unwrap().is_paid);
}

#[tokio::test]
async fn test_invoice_failure_refreshes_mirror() {
    let (app, state) = create_test_app();
    let account_id = paid_account(&app, &state, "invoice@example.com", "cus_inv", "sub_inv").await;

    let mut processor_view: pullup_club::services::stripe::ProcessorSubscription =
        serde_json::from_value(
            subscription_event("x", "x", "sub_inv", "cus_inv", "past_due")["data"]["object"].clone(),
        )
        .unwrap();
    processor_view.customer = Some("cus_inv".to_string());
    mock(&state).insert_subscription(processor_view);

    let event = json!({
        "id": "evt_inv",
        "type": "invoice.payment_failed",
        "data": { "object": { "id": "in_1", "customer": "cus_inv", "subscription": "sub_inv" } }
    });
    let (status, _) = send(&app, signed_webhook(&state, &event)).await;
    assert_eq!(status, StatusCode::OK);

    let subscriptions = state.db.get_subscriptions_for_account(&account_id).await.unwrap();
    assert_eq!(subscriptions[0].status, SubscriptionStatus::PastDue);

    // PastDue keeps access while the processor retries the card.
    let activation = state.activation.on_authenticated(&account_id).await.unwrap();
    assert_eq!(activation.payment_stage, pullup_club::models::PaymentStage::PastDue);
}
