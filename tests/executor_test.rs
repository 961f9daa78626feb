//! Request execution against a live mock backend: retries, backoff, error text, headers.

use std::time::{Duration, Instant};

use reqwest::Method;
use serde_json::json;

use meal_client::config::Environment;
use meal_client::{ApiClient, FailureKind};

mod common;
use common::{start_mock_backend, start_programmable_backend, test_config, MockResponse};

#[tokio::test]
async fn test_successful_get_meal_plans() {
    let backend = start_mock_backend(MockResponse::json(
        200,
        json!({"success": true, "data": [{"_id": "p1", "name": "Keto", "price": 10.0}]}),
    ))
    .await;
    let client = ApiClient::new(test_config(&backend.base_url())).unwrap();

    let response = client.request(Method::GET, "/mealplans", None).await;

    assert!(response.success);
    assert_eq!(response.status, Some(200));
    assert!(!response.offline);
    assert!(!response.from_cache);
    assert_eq!(response.data.unwrap()["data"][0]["_id"], "p1");
    assert_eq!(backend.hits(), 1);

    let request = backend.last_request().unwrap();
    assert_eq!(request.method, "GET");
    assert_eq!(request.path, "/api/mealplans");
    assert_eq!(request.header("content-type"), Some("application/json"));
    assert!(request.header("x-request-id").is_some());
    assert!(request.header("authorization").is_none());
}

#[tokio::test]
async fn test_retry_after_is_honored_on_429() {
    let backend = start_programmable_backend(|_, hit| async move {
        if hit == 0 {
            MockResponse::json(429, json!({"message": "Slow down"})).with_header("Retry-After", "1")
        } else {
            MockResponse::json(200, json!({"success": true, "data": []}))
        }
    })
    .await;
    let client = ApiClient::new(test_config(&backend.base_url())).unwrap();

    let start = Instant::now();
    let response = client.request(Method::GET, "/mealplans", None).await;

    assert!(response.success);
    assert_eq!(backend.hits(), 2);
    assert!(
        start.elapsed() >= Duration::from_millis(1000),
        "retried after {:?}",
        start.elapsed()
    );
}

#[tokio::test]
async fn test_429_on_every_attempt_is_not_offline() {
    let backend =
        start_mock_backend(MockResponse::json(429, json!({"message": "Too many requests"}))).await;
    let client = ApiClient::new(test_config(&backend.base_url())).unwrap();

    let response = client.request(Method::GET, "/orders", None).await;

    assert!(!response.success);
    assert!(!response.offline);
    assert_eq!(response.status, Some(429));
    assert_eq!(response.kind, Some(FailureKind::RateLimited));
    assert_eq!(backend.hits(), 3);
}

#[tokio::test]
async fn test_persistent_500_goes_offline() {
    let backend = start_mock_backend(MockResponse::json(500, json!({"message": "Boom"}))).await;
    let client = ApiClient::new(test_config(&backend.base_url())).unwrap();

    let response = client.request(Method::GET, "/subscriptions", None).await;

    assert!(!response.success);
    assert!(response.offline);
    assert_eq!(response.kind, Some(FailureKind::Offline));
    assert_eq!(response.status, Some(500));
    assert_eq!(response.error.as_deref(), Some("Boom"));
    assert_eq!(backend.hits(), 3);
}

#[tokio::test]
async fn test_recovers_after_transient_503() {
    let backend = start_programmable_backend(|_, hit| async move {
        if hit < 2 {
            MockResponse::json(503, json!({}))
        } else {
            MockResponse::json(200, json!({"success": true, "data": {"ok": true}}))
        }
    })
    .await;
    let client = ApiClient::new(test_config(&backend.base_url())).unwrap();

    let response = client.request(Method::GET, "/orders", None).await;

    assert!(response.success);
    assert_eq!(backend.hits(), 3);
}

#[tokio::test]
async fn test_validation_error_message() {
    let backend = start_mock_backend(MockResponse::json(
        422,
        json!({
            "success": false,
            "message": "Validation failed",
            "details": [{"msg": "Email is required"}, {"msg": "Password too short"}]
        }),
    ))
    .await;
    let client = ApiClient::new(test_config(&backend.base_url())).unwrap();

    let response = client
        .request(Method::POST, "/auth/register", Some(json!({"email": ""})))
        .await;

    assert!(!response.success);
    assert_eq!(response.status, Some(422));
    assert_eq!(response.kind, Some(FailureKind::Client));
    assert_eq!(
        response.error.as_deref(),
        Some("Validation failed: Email is required, Password too short")
    );
    assert_eq!(backend.hits(), 1);
}

#[tokio::test]
async fn test_no_retry_on_client_errors() {
    for status in [400u16, 404] {
        let backend =
            start_mock_backend(MockResponse::json(status, json!({"message": "Nope"}))).await;
        let client = ApiClient::new(test_config(&backend.base_url())).unwrap();

        let response = client.request(Method::GET, "/orders/missing", None).await;

        assert!(!response.success);
        assert!(!response.offline);
        assert_eq!(response.status, Some(status));
        assert_eq!(backend.hits(), 1, "status {} was retried", status);
    }
}

#[tokio::test]
async fn test_unreachable_backend_is_offline() {
    let mut config = test_config("http://127.0.0.1:9/api");
    config.retries.max_attempts = 2;
    let client = ApiClient::new(config).unwrap();

    let response = client.request(Method::GET, "/mealplans", None).await;

    assert!(!response.success);
    assert!(response.offline);
    assert_eq!(response.status, None);
    assert!(response.error.unwrap().starts_with("Network request failed"));
}

#[tokio::test]
async fn test_attempt_timeout_is_retried_then_offline() {
    let backend = start_programmable_backend(|_, _| async move {
        tokio::time::sleep(Duration::from_millis(500)).await;
        MockResponse::json(200, json!({"success": true, "data": []}))
    })
    .await;
    let mut config = test_config(&backend.base_url());
    config.api.request_timeout_ms = 100;
    config.retries.max_attempts = 2;
    let client = ApiClient::new(config).unwrap();

    let start = Instant::now();
    let response = client.request(Method::GET, "/mealplans", None).await;

    assert!(!response.success);
    assert!(response.offline);
    assert_eq!(response.kind, Some(FailureKind::Offline));
    assert_eq!(response.status, None);
    let error = response.error.unwrap();
    assert!(error.starts_with("Network request failed"), "error was {:?}", error);
    assert_eq!(backend.hits(), 2);
    // Two cut-off attempts, not two full 500 ms responses.
    assert!(start.elapsed() < Duration::from_millis(900), "took {:?}", start.elapsed());
}

#[tokio::test]
async fn test_api_key_only_in_production() {
    let backend = start_mock_backend(MockResponse::json(200, json!({"success": true}))).await;

    let mut config = test_config(&backend.base_url());
    config.api.api_key = Some("secret".to_string());
    let development = ApiClient::new(config.clone()).unwrap();
    development.request(Method::GET, "/mealplans", None).await;
    assert!(backend.last_request().unwrap().header("x-api-key").is_none());

    config.api.environment = Environment::Production;
    let production = ApiClient::new(config).unwrap();
    production.request(Method::GET, "/mealplans", None).await;
    assert_eq!(
        backend.last_request().unwrap().header("x-api-key"),
        Some("secret")
    );
}

#[tokio::test]
async fn test_client_side_rate_limit_refuses_without_network() {
    let backend = start_mock_backend(MockResponse::json(200, json!({"success": true}))).await;
    let mut config = test_config(&backend.base_url());
    config.rate_limit.enabled = true;
    config.rate_limit.max_requests = 2;
    let client = ApiClient::new(config).unwrap();

    assert!(client.request(Method::GET, "/orders", None).await.success);
    assert!(client.request(Method::GET, "/orders", None).await.success);
    let refused = client.request(Method::GET, "/orders", None).await;

    assert!(!refused.success);
    assert!(!refused.offline);
    assert_eq!(refused.kind, Some(FailureKind::RateLimited));
    assert!(refused.error.unwrap().starts_with("Too many requests. Please wait"));
    assert_eq!(backend.hits(), 2);

    // Other endpoints have their own window.
    assert!(client.request(Method::GET, "/mealplans", None).await.success);
}

#[tokio::test]
async fn test_requests_are_spaced() {
    let backend = start_mock_backend(MockResponse::json(200, json!({"success": true}))).await;
    let mut config = test_config(&backend.base_url());
    config.throttle.min_interval_ms = 200;
    let client = ApiClient::new(config).unwrap();

    let start = Instant::now();
    client.request(Method::GET, "/a", None).await;
    client.request(Method::GET, "/b", None).await;
    client.request(Method::GET, "/c", None).await;

    assert!(start.elapsed() >= Duration::from_millis(400));
    assert_eq!(backend.hits(), 3);
}
