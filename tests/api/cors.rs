use reqwest::{Method, StatusCode};

use crate::helpers::spawn_app_without_database_with;

async fn preflight(address: &str, origin: &str, request_headers: &str) -> reqwest::Response {
    reqwest::Client::new()
        .request(Method::OPTIONS, &format!("{}/subscribe", address))
        .header("Origin", origin)
        .header("Access-Control-Request-Method", "POST")
        .header("Access-Control-Request-Headers", request_headers)
        .send()
        .await
        .expect("failed to execute request")
}

fn header<'a>(response: &'a reqwest::Response, name: &str) -> Option<&'a str> {
    response
        .headers()
        .get(name)
        .and_then(|value| value.to_str().ok())
}

#[tokio::test]
async fn preflight_from_an_allowed_origin_is_accepted() {
    // arrange
    let address = spawn_app_without_database_with(|config| {
        config.application.cors_origins =
            "https://blog.example, https://shop.example".to_string();
    })
    .await;
    // act
    let response = preflight(&address, "https://shop.example", "content-type").await;
    // assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "access-control-allow-origin"),
        Some("https://shop.example")
    );
    let methods = header(&response, "access-control-allow-methods")
        .expect("preflight response without allowed methods")
        .to_uppercase();
    assert!(methods.contains("POST"), "got {}", methods);
    assert!(methods.contains("GET"), "got {}", methods);
    let headers = header(&response, "access-control-allow-headers")
        .expect("preflight response without allowed headers")
        .to_lowercase();
    assert!(headers.contains("content-type"), "got {}", headers);
    assert_eq!(header(&response, "access-control-allow-credentials"), None);
}

#[tokio::test]
async fn preflight_from_an_unlisted_origin_is_rejected() {
    // arrange
    let address = spawn_app_without_database_with(|config| {
        config.application.cors_origins = "https://blog.example".to_string();
    })
    .await;
    // act
    let response = preflight(&address, "https://evil.example", "content-type").await;
    // assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(header(&response, "access-control-allow-origin"), None);
}

#[tokio::test]
async fn preflight_asking_for_an_unlisted_header_is_rejected() {
    // arrange
    let address = spawn_app_without_database_with(|config| {
        config.application.cors_origins = "https://blog.example".to_string();
    })
    .await;
    // act
    let response = preflight(&address, "https://blog.example", "x-custom-header").await;
    // assert
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn wildcard_allows_any_origin() {
    // arrange
    let address = spawn_app_without_database_with(|config| {
        config.application.cors_origins = "*".to_string();
    })
    .await;
    // act
    let response = preflight(&address, "https://anywhere.example", "content-type").await;
    // assert
    assert_eq!(response.status(), StatusCode::OK);
    let allowed = header(&response, "access-control-allow-origin");
    assert!(
        matches!(allowed, Some("*") | Some("https://anywhere.example")),
        "got {:?}",
        allowed
    );
}

#[tokio::test]
async fn simple_requests_echo_the_allowed_origin() {
    // arrange
    let address = spawn_app_without_database_with(|config| {
        config.application.cors_origins = "https://blog.example".to_string();
    })
    .await;
    // act
    let response = reqwest::Client::new()
        .get(&format!("{}/health", address))
        .header("Origin", "https://blog.example")
        .send()
        .await
        .expect("failed to execute request");
    // assert
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        header(&response, "access-control-allow-origin"),
        Some("https://blog.example")
    );
}
