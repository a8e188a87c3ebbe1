//! End-to-end behaviour of the gateway against recording origins.

use std::time::{Duration, Instant};

use edge_gateway::security::token::{Claims, TokenSigner};
use jsonwebtoken::Algorithm;
use reqwest::StatusCode;

mod common;

use common::{client, envelope, mint_token, start_gateway, start_mock_origin, test_config};

#[tokio::test]
async fn protected_route_without_token_never_reaches_origin() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let gateway = start_gateway(test_config(&users.url(), &orders.url())).await;

    let res = client().get(gateway.url("/v1/orders")).send().await.unwrap();

    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert!(res.headers().contains_key("x-request-id"));
    let body = envelope(res).await;
    assert_eq!(body["success"], false);
    assert_eq!(body["error"]["code"], "AUTH_REQUIRED");
    assert_eq!(orders.hits(), 0);
}

#[tokio::test]
async fn malformed_authorization_is_auth_required() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let gateway = start_gateway(test_config(&users.url(), &orders.url())).await;
    let token = mint_token("u-1", &["user"]);

    for header in [format!("Token {token}"), format!("Bearer {token} extra"), "Bearer".to_string()] {
        let res = client()
            .get(gateway.url("/v1/users/me"))
            .header("authorization", header)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(envelope(res).await["error"]["code"], "AUTH_REQUIRED");
    }
    assert_eq!(users.hits(), 0);
}

#[tokio::test]
async fn valid_token_is_forwarded_verbatim() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let gateway = start_gateway(test_config(&users.url(), &orders.url())).await;
    let token = mint_token("u-7", &["admin"]);
    let payload = r#"{"status":"shipped","note":"left at door"}"#;

    let res = client()
        .patch(gateway.url("/v1/orders/42/status?notify=true&lang=en"))
        .bearer_auth(&token)
        .header("content-type", "application/json")
        .header("accept", "application/json")
        .body(payload)
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-origin"], "orders");
    let cookies: Vec<_> = res.headers().get_all("set-cookie").iter().collect();
    assert_eq!(cookies.len(), 2);
    let response_id = res.headers()["x-request-id"].to_str().unwrap().to_string();
    assert_eq!(res.text().await.unwrap(), payload);

    assert_eq!(users.hits(), 0);
    let seen = orders.last();
    assert_eq!(seen.method, "PATCH");
    assert_eq!(seen.path, "/v1/orders/42/status");
    assert_eq!(seen.query.as_deref(), Some("notify=true&lang=en"));
    assert_eq!(seen.body, payload.as_bytes());
    assert_eq!(seen.headers["authorization"], format!("Bearer {token}"));
    assert_eq!(seen.headers["content-type"], "application/json");
    assert_eq!(seen.headers["x-request-id"], response_id.as_str());
    assert_ne!(response_id, "origin-generated");
}

#[tokio::test]
async fn foreign_key_or_algorithm_is_invalid_token() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let gateway = start_gateway(test_config(&users.url(), &orders.url())).await;

    let claims = Claims::new("u-1", ["user"], Duration::from_secs(300));
    let wrong_key = TokenSigner::new(b"not-the-gateway-secret", Algorithm::HS256)
        .sign(&claims)
        .unwrap();
    let wrong_alg = TokenSigner::new(common::TEST_SECRET.as_bytes(), Algorithm::HS512)
        .sign(&claims)
        .unwrap();

    for token in [wrong_key, wrong_alg, "not.a.jwt".to_string()] {
        let res = client()
            .get(gateway.url("/v1/users"))
            .bearer_auth(token)
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
        let body = envelope(res).await;
        assert_eq!(body["error"]["code"], "INVALID_TOKEN");
        assert_eq!(body["error"]["message"], "Token is invalid or expired");
    }
    assert_eq!(users.hits(), 0);
}

#[tokio::test]
async fn expired_token_is_invalid_token() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let gateway = start_gateway(test_config(&users.url(), &orders.url())).await;

    let mut claims = Claims::new("u-1", ["user"], Duration::from_secs(300));
    claims.iat = claims.iat.map(|t| t - 600);
    claims.nbf = claims.nbf.map(|t| t - 600);
    claims.exp = claims.exp - 600;
    let token = TokenSigner::new(common::TEST_SECRET.as_bytes(), Algorithm::HS256)
        .sign(&claims)
        .unwrap();

    let res = client()
        .get(gateway.url("/v1/users/me"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(envelope(res).await["error"]["code"], "INVALID_TOKEN");
}

#[tokio::test]
async fn public_routes_need_no_token() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let gateway = start_gateway(test_config(&users.url(), &orders.url())).await;

    let res = client()
        .post(gateway.url("/v1/users/register"))
        .json(&serde_json::json!({"email": "a@example.com", "password": "pw"}))
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.headers()["x-origin"], "users");
    assert_eq!(users.last().path, "/v1/users/register");
}

#[tokio::test]
async fn eleventh_request_in_a_window_is_rejected() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let mut config = test_config(&users.url(), &orders.url());
    config.rate_limit.capacity = 10;
    config.rate_limit.window_ms = 1_000;
    let gateway = start_gateway(config).await;
    let client = client();

    let started = Instant::now();
    let mut statuses = Vec::new();
    let mut last = None;
    for _ in 0..11 {
        let res = client.post(gateway.url("/v1/users/login")).send().await.unwrap();
        statuses.push(res.status());
        last = Some(res);
    }
    assert!(started.elapsed() < Duration::from_millis(500));

    assert!(statuses[..10].iter().all(|s| *s == StatusCode::OK));
    assert_eq!(statuses[10], StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(users.hits(), 10);

    let last = last.unwrap();
    assert!(last.headers().contains_key("retry-after"));
    assert_eq!(envelope(last).await["error"]["code"], "RATE_LIMIT_EXCEEDED");

    tokio::time::sleep(Duration::from_millis(1_100)).await;
    let res = client.post(gateway.url("/v1/users/login")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::OK);
}

#[tokio::test]
async fn simultaneous_requests_admit_at_most_capacity() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let mut config = test_config(&users.url(), &orders.url());
    config.rate_limit.capacity = 5;
    config.rate_limit.window_ms = 60_000;
    config.rate_limit.idle_ttl_secs = 120;
    let gateway = start_gateway(config).await;
    let client = client();

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let client = client.clone();
            let url = gateway.url("/v1/users/login");
            tokio::spawn(async move { client.post(url).send().await.unwrap().status() })
        })
        .collect();

    let mut admitted = 0;
    for handle in handles {
        let status = handle.await.unwrap();
        if status == StatusCode::OK {
            admitted += 1;
        } else {
            assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        }
    }
    assert_eq!(admitted, 5);
    assert_eq!(users.hits(), 5);
}

#[tokio::test]
async fn preflight_skips_rate_limit_and_auth() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let mut config = test_config(&users.url(), &orders.url());
    config.rate_limit.capacity = 1;
    config.rate_limit.window_ms = 60_000;
    config.rate_limit.idle_ttl_secs = 120;
    let gateway = start_gateway(config).await;
    let client = client();

    for _ in 0..3 {
        let res = client
            .request(reqwest::Method::OPTIONS, gateway.url("/v1/orders"))
            .header("origin", "https://app.example.com")
            .header("access-control-request-method", "POST")
            .send()
            .await
            .unwrap();
        assert_eq!(res.status(), StatusCode::NO_CONTENT);
        assert_eq!(res.headers()["access-control-allow-origin"], "*");
        assert!(res.headers()["access-control-allow-headers"]
            .to_str()
            .unwrap()
            .contains("Authorization"));
        assert_eq!(res.headers()["access-control-expose-headers"], "X-Request-ID");
    }

    // The single token is still available: this request fails on auth, not rate.
    let res = client.get(gateway.url("/v1/orders")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(orders.hits(), 0);
}

#[tokio::test]
async fn correlation_id_is_adopted_and_propagated() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let gateway = start_gateway(test_config(&users.url(), &orders.url())).await;

    let res = client()
        .post(gateway.url("/v1/users/login"))
        .header("x-request-id", "trace-from-client-1")
        .send()
        .await
        .unwrap();

    assert_eq!(res.headers()["x-request-id"], "trace-from-client-1");
    assert_eq!(users.last().headers["x-request-id"], "trace-from-client-1");
    assert_eq!(users.last().headers.get_all("x-request-id").iter().count(), 1);
}

#[tokio::test]
async fn generated_correlation_id_matches_origin() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let gateway = start_gateway(test_config(&users.url(), &orders.url())).await;

    let res = client().post(gateway.url("/v1/users/login")).send().await.unwrap();
    let id = res.headers()["x-request-id"].to_str().unwrap().to_string();

    assert!(uuid::Uuid::parse_str(&id).is_ok());
    assert_eq!(users.last().headers["x-request-id"], id.as_str());
}

#[tokio::test]
async fn origin_status_and_body_pass_through() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let gateway = start_gateway(test_config(&users.url(), &orders.url())).await;

    let res = client()
        .post(gateway.url("/v1/users/login"))
        .header("x-mock-status", "409")
        .body("duplicate")
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::CONFLICT);
    assert_eq!(res.text().await.unwrap(), "duplicate");
}

#[tokio::test]
async fn large_bodies_stream_both_ways() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let gateway = start_gateway(test_config(&users.url(), &orders.url())).await;
    let payload: Vec<u8> = (0..4 * 1024 * 1024).map(|i| (i % 251) as u8).collect();

    let res = client()
        .post(gateway.url("/v1/orders"))
        .bearer_auth(mint_token("u-1", &["user"]))
        .body(payload.clone())
        .send()
        .await
        .unwrap();

    assert_eq!(res.status(), StatusCode::OK);
    assert_eq!(res.bytes().await.unwrap().as_ref(), payload.as_slice());
    assert_eq!(orders.last().body.len(), payload.len());
}

#[tokio::test]
async fn unmatched_routes_are_not_found() {
    let users = start_mock_origin("users").await;
    let orders = start_mock_origin("orders").await;
    let gateway = start_gateway(test_config(&users.url(), &orders.url())).await;
    let client = client();

    let res = client.get(gateway.url("/v1/payments")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);
    assert_eq!(envelope(res).await["error"]["code"], "NOT_FOUND");

    let res = client.put(gateway.url("/v1/users/me")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    let res = client.get(gateway.url("/v1/orders/")).send().await.unwrap();
    assert_eq!(res.status(), StatusCode::NOT_FOUND);

    assert_eq!(users.hits() + orders.hits(), 0);
}
