// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

//! Auth cookie attribute tests.
//!
//! These tests verify session cookies carry the same attributes when they
//! are set on login and removed on logout, for localhost and production
//! frontends.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
};
use pullup_club::config::Config;
use serde_json::json;
use tower::ServiceExt;

mod common;

fn set_cookie_headers(response: &Response) -> Vec<String> {
    response
        .headers()
        .get_all(header::SET_COOKIE)
        .iter()
        .map(|value| value.to_str().unwrap().to_string())
        .collect()
}

fn find_cookie(headers: &[String], name: &str) -> String {
    headers
        .iter()
        .find(|value| value.starts_with(&format!("{name}=")))
        .cloned()
        .unwrap_or_else(|| panic!("missing Set-Cookie header for {name}: {headers:?}"))
}

fn app_for(frontend_url: &str) -> axum::Router {
    let config = Config {
        frontend_url: frontend_url.to_string(),
        ..Config::test_default()
    };
    common::create_test_app_with(config).0
}

fn logout_request() -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/auth/logout")
        .header(header::COOKIE, "pullup_token=test; pullup_logged_in=1")
        .body(Body::empty())
        .unwrap()
}

#[tokio::test]
async fn test_signup_sets_session_cookies() {
    let app = app_for("http://localhost:5173");

    let response = app
        .oneshot(common::json_request(
            "POST",
            "/auth/signup",
            Some(json!({ "email": "cookie@example.com", "password": "correct-horse-battery" })),
            None,
        ))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::CREATED);

    let set_cookies = set_cookie_headers(&response);
    let token_cookie = find_cookie(&set_cookies, "pullup_token");
    let hint_cookie = find_cookie(&set_cookies, "pullup_logged_in");

    assert!(token_cookie.contains("Path=/"));
    assert!(token_cookie.contains("HttpOnly"));
    assert!(token_cookie.contains("SameSite=Lax"));
    assert!(token_cookie.contains("Max-Age=2592000"));
    assert!(!token_cookie.contains("Secure"));

    assert!(hint_cookie.starts_with("pullup_logged_in=1"));
    assert!(!hint_cookie.contains("HttpOnly"));
}

#[tokio::test]
async fn test_session_cookie_authenticates() {
    let (app, _) = common::create_test_app();
    let account = common::signup(&app, "jar@example.com", None).await;

    let response = app
        .oneshot(
            Request::builder()
                .method("GET")
                .uri("/auth/session")
                .header(header::COOKIE, format!("pullup_token={}", account.token))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = common::body_json(response).await;
    assert_eq!(json["account_id"], account.account_id.as_str());
}

#[tokio::test]
async fn test_logout_cookie_removal_localhost_attributes() {
    let app = app_for("http://localhost:5173");

    let response = app.oneshot(logout_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let set_cookies = set_cookie_headers(&response);
    let token_cookie = find_cookie(&set_cookies, "pullup_token");
    let hint_cookie = find_cookie(&set_cookies, "pullup_logged_in");

    assert!(token_cookie.contains("Path=/"));
    assert!(token_cookie.contains("HttpOnly"));
    assert!(token_cookie.contains("SameSite=Lax"));
    assert!(token_cookie.contains("Max-Age=0"));
    assert!(!token_cookie.contains("Secure"));
    assert!(!token_cookie.contains("Domain="));

    assert!(hint_cookie.contains("Path=/"));
    assert!(hint_cookie.contains("SameSite=Lax"));
    assert!(hint_cookie.contains("Max-Age=0"));
    assert!(!hint_cookie.contains("HttpOnly"));
    assert!(!hint_cookie.contains("Secure"));
}

#[tokio::test]
async fn test_logout_cookie_removal_production_attributes() {
    let app = app_for("https://pullupclub.example.com");

    let response = app.oneshot(logout_request()).await.unwrap();
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let set_cookies = set_cookie_headers(&response);
    let token_cookie = find_cookie(&set_cookies, "pullup_token");
    let hint_cookie = find_cookie(&set_cookies, "pullup_logged_in");

    assert!(token_cookie.contains("Path=/"));
    assert!(token_cookie.contains("HttpOnly"));
    assert!(token_cookie.contains("SameSite=Lax"));
    assert!(token_cookie.contains("Max-Age=0"));
    assert!(token_cookie.contains("Secure"));

    assert!(hint_cookie.contains("Max-Age=0"));
    assert!(hint_cookie.contains("Secure"));
    assert!(!hint_cookie.contains("HttpOnly"));
}
