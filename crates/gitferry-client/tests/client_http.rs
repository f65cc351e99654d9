//! HTTP-level client tests against a wiremock double.

use std::time::Duration;

use serde_json::json;
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use gitferry_client::breaker::CircuitBreakerConfig;
use gitferry_client::{ClientError, GitLabClient, RetryPolicy};
use gitferry_types::InstanceConfig;

fn client_for(server: &MockServer) -> GitLabClient {
    let config = InstanceConfig::new(server.uri(), "test-token");
    GitLabClient::new(&config, false).unwrap()
}

#[tokio::test]
async fn get_sends_token_and_parses_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/user"))
        .and(header("PRIVATE-TOKEN", "test-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "is_admin": true})))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let response = client.get("/user").await.unwrap();
    assert!(response.success);
    assert_eq!(response.body["id"], 1);
}

#[tokio::test]
async fn unauthorized_is_fatal_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/user"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.ping().await.unwrap_err();
    assert!(matches!(err, ClientError::Auth { .. }));
    assert!(err.is_fatal());
}

#[tokio::test]
async fn missing_resource_is_not_found() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/groups/devs"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"message": "404 Not Found"})))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.get("/groups/devs").await.unwrap_err();
    assert!(matches!(err, ClientError::NotFound { .. }));
}

#[tokio::test]
async fn rate_limited_carries_retry_after() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/users"))
        .respond_with(ResponseTemplate::new(429).insert_header("retry-after", "7"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.post("/users", &json!({})).await.unwrap_err();
    match err {
        ClientError::RateLimited { retry_after } => {
            assert_eq!(retry_after, Duration::from_secs(7));
        }
        other => panic!("expected RateLimited, got {other:?}"),
    }
}

#[tokio::test]
async fn conflict_status_carries_raw_text() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/groups"))
        .respond_with(
            ResponseTemplate::new(409)
                .set_body_json(json!({"message": "Group path has already been taken"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.post("/groups", &json!({"path": "devs"})).await.unwrap_err();
    match err {
        ClientError::Conflict { message } => assert!(message.contains("already been taken")),
        other => panic!("expected Conflict, got {other:?}"),
    }
}

#[tokio::test]
async fn collision_phrased_400_is_conflict() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/projects"))
        .respond_with(
            ResponseTemplate::new(400)
                .set_body_json(json!({"message": {"base": ["There is already a repository with that name on disk"]}})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.post("/projects", &json!({"path": "app"})).await.unwrap_err();
    assert!(matches!(err, ClientError::Conflict { .. }));
}

#[tokio::test]
async fn plain_400_stays_api_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/users"))
        .respond_with(
            ResponseTemplate::new(400).set_body_json(json!({"message": "email is invalid"})),
        )
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client.post("/users", &json!({})).await.unwrap_err();
    match err {
        ClientError::Api { status, message } => {
            assert_eq!(status, 400);
            assert_eq!(message, "email is invalid");
        }
        other => panic!("expected Api, got {other:?}"),
    }
}

#[tokio::test]
async fn pagination_stops_on_short_page() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/users"))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}, {"id": 2}])))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v4/users"))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 3}])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let mut pages = client.pages("/users").per_page(2);
    let mut ids = Vec::new();
    while let Some(items) = pages.next_page().await.unwrap() {
        ids.extend(items.iter().map(|v| v["id"].as_u64().unwrap()));
    }
    assert_eq!(ids, vec![1, 2, 3]);
}

#[tokio::test]
async fn pagination_handles_empty_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/groups"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let all = client.get_paginated("/groups").await.unwrap();
    assert!(all.is_empty());
}

#[tokio::test]
async fn dry_run_short_circuits_mutations() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v4/users"))
        .respond_with(ResponseTemplate::new(201))
        .expect(0)
        .mount(&server)
        .await;

    let config = InstanceConfig::new(server.uri(), "test-token");
    let client = GitLabClient::new(&config, true).unwrap();

    let response = client.post("/users", &json!({"username": "alice"})).await.unwrap();
    assert!(response.success);
    assert_eq!(response.body["dry_run"], true);
}

#[tokio::test]
async fn dry_run_still_performs_reads() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let config = InstanceConfig::new(server.uri(), "test-token");
    let client = GitLabClient::new(&config, true).unwrap();
    client.ping().await.unwrap();
}

#[tokio::test]
async fn gateway_errors_retry_and_recover() {
    let server = MockServer::start().await;
    // First call answers 503; the retry lands on the success mock.
    Mock::given(method("POST"))
        .and(path("/api/v4/users"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/v4/users"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 42})))
        .expect(1)
        .mount(&server)
        .await;

    let config = InstanceConfig::new(server.uri(), "test-token");
    let client = GitLabClient::new(&config, false).unwrap().with_retry_policy(RetryPolicy {
        max_attempts: 3,
        base_delay: Duration::from_millis(1),
        multiplier: 2.0,
        max_delay: Duration::from_millis(10),
    });

    let response = client.post("/users", &json!({"username": "alice"})).await.unwrap();
    assert_eq!(response.body["id"], 42);
}

#[tokio::test]
async fn gateway_errors_surface_after_retry_budget() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v4/users"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = InstanceConfig::new(server.uri(), "test-token");
    let client = GitLabClient::new(&config, false).unwrap().with_retry_policy(RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        multiplier: 2.0,
        max_delay: Duration::from_millis(10),
    });

    let err = client.get("/users").await.unwrap_err();
    assert!(matches!(err, ClientError::Api { status: 503, .. }));
}

#[tokio::test]
async fn transient_failures_retry_then_surface() {
    // Nothing listens on this port; every attempt fails at the transport.
    let config = InstanceConfig::new("http://127.0.0.1:9", "test-token");
    let client = GitLabClient::new(&config, false).unwrap().with_retry_policy(RetryPolicy {
        max_attempts: 2,
        base_delay: Duration::from_millis(1),
        multiplier: 2.0,
        max_delay: Duration::from_millis(10),
    });

    let err = client.get("/user").await.unwrap_err();
    assert!(err.is_transient());
}

#[tokio::test]
async fn breaker_opens_after_repeated_network_failures() {
    let config = InstanceConfig::new("http://127.0.0.1:9", "test-token");
    let client = GitLabClient::new(&config, false)
        .unwrap()
        .with_retry_policy(RetryPolicy {
            max_attempts: 1,
            base_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(10),
        })
        .with_breaker_config(CircuitBreakerConfig {
            failure_threshold: 2,
            reset_timeout: Duration::from_secs(60),
        });

    assert!(client.get("/user").await.unwrap_err().is_transient());
    assert!(client.get("/user").await.unwrap_err().is_transient());

    // Third call fails fast without touching the network.
    let err = client.get("/user").await.unwrap_err();
    assert!(matches!(err, ClientError::CircuitOpen { .. }));
}
