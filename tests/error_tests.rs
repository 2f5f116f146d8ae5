// SPDX-License-Identifier: MIT
// Copyright 2026 Roland Dreier <roland@rolandd.dev>

use axum::http::StatusCode;
use axum::response::IntoResponse;
use pullup_club::error::AppError;

async fn render(err: AppError) -> (StatusCode, serde_json::Value) {
    let response = err.into_response();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
}

#[tokio::test]
async fn test_expected_outcomes_carry_details() {
    let cases = [
        (AppError::Validation("claimed_count".into()), StatusCode::BAD_REQUEST, "validation_error"),
        (AppError::Eligibility("pending".into()), StatusCode::CONFLICT, "eligibility_error"),
        (AppError::NotFound("Submission x".into()), StatusCode::NOT_FOUND, "not_found"),
        (AppError::InvalidState("approved".into()), StatusCode::CONFLICT, "invalid_state"),
        (AppError::Forbidden("admin".into()), StatusCode::FORBIDDEN, "forbidden"),
    ];

    for (err, status, code) in cases {
        let (actual_status, body) = render(err).await;
        assert_eq!(actual_status, status);
        assert_eq!(body["error"], code);
        assert!(body["details"].is_string());
        assert!(body.get("retryable").is_none());
    }
}

#[tokio::test]
async fn test_upstream_detail_is_not_leaked() {
    let (status, body) = render(AppError::stripe("create_checkout_session", "sk_live secret in message")).await;
    assert_eq!(status, StatusCode::BAD_GATEWAY);
    assert_eq!(body["error"], "upstream_error");
    assert_eq!(body["retryable"], true);
    assert!(body.get("details").is_none());

    let (status, body) = render(AppError::Database("connection reset".into())).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["retryable"], true);
    assert!(body.get("details").is_none());
}

#[test]
fn test_retryable_classification() {
    assert!(AppError::stripe("get_subscription", "timeout").is_retryable());
    assert!(AppError::Database("unavailable".into()).is_retryable());
    assert!(!AppError::Unauthorized.is_retryable());
    assert!(!AppError::InvalidState("rejected".into()).is_retryable());
}
