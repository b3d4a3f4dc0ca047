use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde_json::{json, Value};

use crate::helpers::{spawn_app, JOB_ID};

type StoredRow = (String, Option<String>, Option<String>, Option<String>, DateTime<Utc>);

async fn fetch_saved(pool: &sqlx::PgPool) -> StoredRow {
    sqlx::query_as("SELECT email, source, user_agent, job_id, subscribed_at FROM subscribers")
        .fetch_one(pool)
        .await
        .expect("failed to fetch saved subscription")
}

#[tokio::test]
async fn subscribe_returns_200_and_persists_valid_input() {
    // arrange
    let app = spawn_app().await;
    // act
    let response = app
        .api_client
        .post(&format!("{}/subscribe", app.address))
        .header("User-Agent", "integration-test/1.0")
        .json(&json!({ "email": "ursula_le_guin@gmail.com" }))
        .send()
        .await
        .expect("failed to execute request");
    // assert
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.expect("subscribe body is not json");
    assert_eq!(body, json!({ "ok": true }));

    let (email, source, user_agent, job_id, _) = fetch_saved(&app.db_pool).await;
    assert_eq!(email, "ursula_le_guin@gmail.com");
    assert_eq!(source.as_deref(), Some(""));
    assert_eq!(user_agent.as_deref(), Some("integration-test/1.0"));
    assert_eq!(job_id.as_deref(), Some(JOB_ID));
}

#[tokio::test]
async fn subscribe_uses_the_origin_header_as_default_source() {
    // arrange
    let app = spawn_app().await;
    // act
    let response = app
        .api_client
        .post(&format!("{}/subscribe", app.address))
        .header("Origin", "https://blog.example")
        .json(&json!({ "email": "ursula_le_guin@gmail.com" }))
        .send()
        .await
        .expect("failed to execute request");
    // assert
    assert_eq!(response.status(), StatusCode::OK);
    let (_, source, _, _, _) = fetch_saved(&app.db_pool).await;
    assert_eq!(source.as_deref(), Some("https://blog.example"));
}

#[tokio::test]
async fn emails_differing_in_case_and_whitespace_are_stored_once() {
    // arrange
    let app = spawn_app().await;
    // act
    for email in [
        "Ursula@Example.com",
        "  ursula@example.COM ",
        "\tursula@example.com",
        "ursula@example.com\n",
        "ursula@example.com",
    ] {
        let response = app.post_subscription(&json!({ "email": email })).await;
        assert_eq!(response.status(), StatusCode::OK, "{:?} was rejected", email);
    }
    // assert
    assert_eq!(app.stored_rows().await, 1);
    let (email, ..) = fetch_saved(&app.db_pool).await;
    assert_eq!(email, "Ursula@Example.com");
}

#[tokio::test]
async fn subscribe_stores_the_email_without_surrounding_whitespace() {
    // arrange
    let app = spawn_app().await;
    // act
    let response = app.post_subscription(&json!({ "email": "\t le@guin.com\n" })).await;
    // assert
    assert_eq!(response.status(), StatusCode::OK);
    let (email, ..) = fetch_saved(&app.db_pool).await;
    assert_eq!(email, "le@guin.com");
}

#[tokio::test]
async fn resubscribing_updates_source_but_keeps_the_first_subscription_time() {
    // arrange
    let app = spawn_app().await;
    let first_seen = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    // act
    app.post_subscription(&json!({
        "email": "le@guin.com",
        "source": "landing-page",
        "subscribed_at": "2024-01-01T00:00:00Z",
        "user_agent": "first-agent"
    }))
    .await;
    let response = app
        .post_subscription(&json!({
            "email": "LE@guin.com",
            "source": "newsletter-footer",
            "subscribed_at": "2025-06-01T00:00:00Z"
        }))
        .await;
    // assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.stored_rows().await, 1);
    let (email, source, user_agent, _, subscribed_at) = fetch_saved(&app.db_pool).await;
    assert_eq!(email, "le@guin.com");
    assert_eq!(source.as_deref(), Some("newsletter-footer"));
    // a missing user agent does not erase the stored one
    assert_eq!(user_agent.as_deref(), Some("first-agent"));
    assert_eq!(subscribed_at, first_seen);
}

#[tokio::test]
async fn subscribe_returns_400_for_invalid_email_and_writes_nothing() {
    // arrange
    let app = spawn_app().await;
    // act
    let response = app.post_subscription(&json!({ "email": "not-an-email" })).await;
    // assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let body: Value = response.json().await.expect("error body is not json");
    assert!(body["detail"].as_str().is_some());
    assert_eq!(app.stored_rows().await, 0);
}

#[tokio::test]
async fn subscribe_returns_400_for_malformed_input() {
    // arrange
    let app = spawn_app().await;
    let test_cases = vec![
        (json!({}), "missing email"),
        (json!({ "email": 42 }), "email is not a string"),
        (json!({ "email": "" }), "empty email"),
        (
            json!({ "email": "le@guin.com", "subscribed_at": "yesterday" }),
            "subscribed_at is not a timestamp",
        ),
    ];
    // act
    for (invalid_body, error_message) in test_cases {
        let response = app.post_subscription(&invalid_body).await;
        // assert
        assert_eq!(
            response.status(),
            StatusCode::BAD_REQUEST,
            "should have failed with message: {}",
            error_message
        );
    }
    assert_eq!(app.stored_rows().await, 0);
}
