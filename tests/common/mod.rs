// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::{
    body::Body,
    http::{header, Request, Response},
    Router,
};
use pullup_club::config::Config;
use pullup_club::db::{Database, FirestoreDb};
use pullup_club::models::{Gender, ProfileUpdate};
use pullup_club::routes::create_router;
use pullup_club::services::stripe::{sign_webhook_payload, MockProcessor};
use pullup_club::services::PaymentProcessor;
use pullup_club::AppState;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

/// Check if emulator is available via environment variable.
#[allow(dead_code)]
pub fn emulator_available() -> bool {
    std::env::var("FIRESTORE_EMULATOR_HOST").is_ok()
}

/// Skip test with message if emulator not available.
#[macro_export]
macro_rules! require_emulator {
    () => {
        if !crate::common::emulator_available() {
            eprintln!("⚠️  Skipping: FIRESTORE_EMULATOR_HOST not set");
            return;
        }
    };
}

/// Create a test database connection.
#[allow(dead_code)]
pub async fn test_db() -> FirestoreDb {
    FirestoreDb::new("test-project")
        .await
        .expect("Failed to connect to Firestore emulator")
}

/// Create a test app with the in-memory database and mock processor.
/// Returns the router and the shared state.
#[allow(dead_code)]
pub fn create_test_app() -> (Router, Arc<AppState>) {
    create_test_app_with(Config::test_default())
}

#[allow(dead_code)]
pub fn create_test_app_with(config: Config) -> (Router, Arc<AppState>) {
    let state = Arc::new(AppState::new(
        config,
        Database::memory(),
        PaymentProcessor::mock(),
    ));
    (create_router(state.clone()), state)
}

#[allow(dead_code)]
pub fn mock(state: &AppState) -> &MockProcessor {
    state.payments.as_mock().expect("test app uses the mock processor")
}

/// JSON request, optionally carrying a bearer token.
#[allow(dead_code)]
pub fn json_request(method: &str, uri: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

#[allow(dead_code)]
pub async fn body_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(&bytes).unwrap()
}

/// Send a request and decode the JSON body.
#[allow(dead_code)]
pub async fn send(app: &Router, request: Request<Body>) -> (axum::http::StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_json(response).await)
}

/// A signed-up account.
#[allow(dead_code)]
pub struct TestAccount {
    pub account_id: String,
    pub token: String,
    pub activation: Value,
}

/// Sign up through the API, optionally carrying a plan intent.
#[allow(dead_code)]
pub async fn signup(app: &Router, email: &str, plan_intent: Option<&str>) -> TestAccount {
    let mut body = serde_json::json!({ "email": email, "password": "correct-horse-battery" });
    if let Some(intent) = plan_intent {
        body["plan_intent"] = Value::String(intent.to_string());
    }

    let (status, json) = send(app, json_request("POST", "/auth/signup", Some(body), None)).await;
    assert_eq!(status, axum::http::StatusCode::CREATED, "signup failed: {}", json);

    TestAccount {
        account_id: json["account_id"].as_str().unwrap().to_string(),
        token: json["token"].as_str().unwrap().to_string(),
        activation: json["activation"].clone(),
    }
}

/// Log in through the API.
#[allow(dead_code)]
pub async fn login(app: &Router, email: &str, plan_intent: Option<&str>) -> Value {
    let mut body = serde_json::json!({ "email": email, "password": "correct-horse-battery" });
    if let Some(intent) = plan_intent {
        body["plan_intent"] = Value::String(intent.to_string());
    }
    let (status, json) = send(app, json_request("POST", "/auth/login", Some(body), None)).await;
    assert_eq!(status, axum::http::StatusCode::OK, "login failed: {}", json);
    json
}

/// Fill in every required profile field directly.
#[allow(dead_code)]
pub async fn complete_profile(state: &AppState, account_id: &str, gender: Gender) {
    let update = ProfileUpdate {
        display_name: Some(format!("Member {}", &account_id[..8])),
        age: Some(30),
        gender: Some(gender),
        region: Some("West".to_string()),
        organization: Some("Iron Club".to_string()),
        ..Default::default()
    };
    state
        .db
        .update_profile(account_id, update, chrono::Utc::now())
        .await
        .unwrap()
        .expect("profile exists");
}

/// Create an account that holds the admin role, with a complete profile.
#[allow(dead_code)]
pub async fn admin(app: &Router, state: &AppState, email: &str) -> TestAccount {
    let account = signup(app, email, None).await;
    state.db.grant_admin(&account.account_id).await.unwrap();
    complete_profile(state, &account.account_id, Gender::Male).await;
    account
}

/// A webhook request signed with the configured endpoint secret.
#[allow(dead_code)]
pub fn signed_webhook(state: &AppState, event: &Value) -> Request<Body> {
    let payload = event.to_string();
    let signature = sign_webhook_payload(
        payload.as_bytes(),
        &state.config.stripe_webhook_secret,
        chrono::Utc::now().timestamp(),
    )
    .unwrap();

    Request::builder()
        .method("POST")
        .uri("/webhook/stripe")
        .header(header::CONTENT_TYPE, "application/json")
        .header("Stripe-Signature", signature)
        .body(Body::from(payload))
        .unwrap()
}

/// `checkout.session.completed` for a session created by the mock.
#[allow(dead_code)]
pub fn checkout_completed_event(
    event_id: &str,
    session_id: &str,
    account_id: &str,
    customer_id: &str,
    subscription_id: &str,
) -> Value {
    serde_json::json!({
        "id": event_id,
        "type": "checkout.session.completed",
        "data": {
            "object": {
                "id": session_id,
                "customer": customer_id,
                "subscription": subscription_id,
                "client_reference_id": account_id,
                "metadata": { "account_id": account_id, "plan": "monthly" }
            }
        }
    })
}
