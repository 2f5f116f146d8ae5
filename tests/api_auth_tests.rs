// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! API authentication and CORS tests.
//!
//! These tests verify that:
//! 1. Protected routes reject requests without valid tokens
//! 2. Signup and login issue tokens that protected routes accept
//! 3. Credentials failures are uniform
//! 4. CORS preflight requests return correct headers

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
};
use serde_json::json;
use tower::ServiceExt;

mod common;
use common::*;

#[tokio::test]
async fn test_protected_route_without_token() {
    let (app, _) = create_test_app();

    for uri in ["/api/me", "/api/eligibility", "/api/badge", "/auth/session"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED, "{}", uri);
    }
}

#[tokio::test]
async fn test_protected_route_with_invalid_token() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/api/me")
                .header(header::AUTHORIZATION, "Bearer invalid.token.here")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_signup_and_profile_round_trip() {
    let (app, _) = create_test_app();
    let account = signup(&app, "Lifter@Example.com", None).await;

    assert_eq!(account.activation["destination"]["route"], "complete_profile");
    assert_eq!(account.activation["email"], "lifter@example.com");
    assert_eq!(account.activation["is_paid"], false);

    let (status, json) = send(&app, json_request("GET", "/api/me", None, Some(&account.token))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["account_id"], account.account_id.as_str());
    assert_eq!(json["is_profile_completed"], false);
    assert_eq!(json["role"], "user");

    let update = json!({
        "display_name": "Sam",
        "age": 29,
        "gender": "female",
        "region": "Northeast",
        "social_handle": "@sam_lifts"
    });
    let (status, json) = send(
        &app,
        json_request("PUT", "/api/me", Some(update), Some(&account.token)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["is_profile_completed"], true);
    assert_eq!(json["display_name"], "Sam");
    assert_eq!(json["is_paid"], false);

    // Completed profile without payment goes to the paywall.
    let (_, json) = send(&app, json_request("GET", "/auth/session", None, Some(&account.token))).await;
    assert_eq!(json["destination"]["route"], "subscribe");
    assert_eq!(json["profile_stage"], "complete");
}

#[tokio::test]
async fn test_profile_update_validation() {
    let (app, _) = create_test_app();
    let account = signup(&app, "young@example.com", None).await;

    let (status, json) = send(
        &app,
        json_request("PUT", "/api/me", Some(json!({ "age": 9 })), Some(&account.token)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["error"], "validation_error");
}

#[tokio::test]
async fn test_duplicate_signup_conflicts() {
    let (app, _) = create_test_app();
    signup(&app, "dup@example.com", None).await;

    let body = json!({ "email": "DUP@example.com", "password": "another-password" });
    let (status, json) = send(&app, json_request("POST", "/auth/signup", Some(body), None)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(json["error"], "conflict");
}

#[tokio::test]
async fn test_login_failures_are_uniform() {
    let (app, _) = create_test_app();
    signup(&app, "known@example.com", None).await;

    let wrong_password = json!({ "email": "known@example.com", "password": "wrong-password" });
    let unknown_email = json!({ "email": "nobody@example.com", "password": "correct-horse-battery" });

    let (status_a, json_a) = send(&app, json_request("POST", "/auth/login", Some(wrong_password), None)).await;
    let (status_b, json_b) = send(&app, json_request("POST", "/auth/login", Some(unknown_email), None)).await;

    assert_eq!(status_a, StatusCode::UNAUTHORIZED);
    assert_eq!(status_a, status_b);
    assert_eq!(json_a, json_b);
    assert_eq!(json_a["error"], "invalid_credentials");
}

#[tokio::test]
async fn test_signup_validation() {
    let (app, _) = create_test_app();

    for body in [
        json!({ "email": "not-an-email", "password": "long-enough-pass" }),
        json!({ "email": "short@example.com", "password": "short" }),
    ] {
        let (status, json) = send(&app, json_request("POST", "/auth/signup", Some(body), None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(json["error"], "validation_error");
    }
}

#[tokio::test]
async fn test_invalid_intent_is_ignored() {
    let (app, state) = create_test_app();

    let account = signup(&app, "tampered@example.com", Some("bm90LWEtdG9rZW4")).await;
    assert_eq!(account.activation["destination"]["route"], "complete_profile");
    assert_eq!(mock(&state).sessions_created(), 0);
}

#[tokio::test]
async fn test_cors_preflight() {
    let (app, _) = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("OPTIONS")
                .uri("/api/me")
                .header(header::ORIGIN, "http://localhost:5173")
                .header(header::ACCESS_CONTROL_REQUEST_METHOD, "GET")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
    assert!(response
        .headers()
        .contains_key(header::ACCESS_CONTROL_ALLOW_METHODS));
}

#[tokio::test]
async fn test_public_routes_no_auth_required() {
    let (app, _) = create_test_app();

    for uri in ["/health", "/leaderboard"] {
        let response = app
            .clone()
            .oneshot(Request::builder().uri(uri).body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK, "{}", uri);
    }
}
