//! Failure injection tests for the gateway: admission control, auth
//! rejection and configuration reloads under bad input and live traffic.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{encode, EncodingKey, Header};
use serde_json::json;

use edge_gateway::config::GatewayConfig;

mod common;
use common::*;

async fn counting_backend(body: &'static str) -> (std::net::SocketAddr, Arc<AtomicU32>) {
    let calls = Arc::new(AtomicU32::new(0));
    let cc = calls.clone();
    let addr = start_programmable_backend(move |_req| {
        let cc = cc.clone();
        async move {
            cc.fetch_add(1, Ordering::SeqCst);
            (200, body.to_string())
        }
    })
    .await;
    (addr, calls)
}

#[tokio::test]
async fn test_rate_limit_rejects_before_backend() {
    let (backend, calls) = counting_backend("ok").await;

    let mut config = GatewayConfig::default();
    config.rate_limit.enabled = true;
    config.rate_limit.requests = 3;
    config.rate_limit.interval = Duration::from_secs(60);
    config.routes.push(static_route("/api", backend, "2s"));
    let gateway = start_gateway(config, None).await;

    let client = client();
    let mut statuses = Vec::new();
    for _ in 0..5 {
        let res = client.get(gateway.url("/api")).send().await.unwrap();
        statuses.push(res.status().as_u16());
    }

    assert_eq!(statuses, vec![200, 200, 200, 429, 429]);
    assert_eq!(calls.load(Ordering::SeqCst), 3, "denied requests reached the backend");

    // Metrics exposition sits outside admission control.
    let res = client.get(gateway.url("/metrics")).send().await.unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_jwt_auth_guards_routes() {
    let (backend, calls) = counting_backend("secret-data").await;

    let mut config = GatewayConfig::default();
    config.auth.enabled = true;
    config.auth.auth_type = "jwt".to_string();
    config.auth.jwt.secret_key = "integration-secret".to_string();
    config.routes.push(static_route("/private", backend, "2s"));
    let gateway = start_gateway(config, None).await;

    let client = client();
    let res = client.get(gateway.url("/private")).send().await.unwrap();
    assert_eq!(res.status(), 401);

    let res = client
        .get(gateway.url("/private"))
        .bearer_auth("not-a-token")
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 401);
    assert_eq!(calls.load(Ordering::SeqCst), 0);

    let exp = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_secs() + 600;
    let token = encode(
        &Header::default(),
        &json!({ "sub": "user-1", "exp": exp }),
        &EncodingKey::from_secret(b"integration-secret"),
    )
    .unwrap();
    let res = client
        .get(gateway.url("/private"))
        .bearer_auth(token)
        .send()
        .await
        .unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "secret-data");
    assert_eq!(calls.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_malformed_reload_keeps_generation() {
    let backend = start_mock_backend("v1").await;

    let mut config = GatewayConfig::default();
    config.routes.push(static_route("/api", backend, "2s"));
    let gateway = start_gateway(config, None).await;

    let before = gateway.config.snapshot();
    std::fs::write(&gateway.config_path, "routes = [[[ not toml").unwrap();

    let result = gateway.coordinator.reload().await;
    assert!(result.is_err());

    let after = gateway.config.snapshot();
    assert!(Arc::ptr_eq(&before, &after), "generation replaced by a failed reload");

    let res = client().get(gateway.url("/api")).send().await.unwrap();
    assert_eq!(res.status(), 200);
    assert_eq!(res.text().await.unwrap(), "v1");
}

#[tokio::test]
async fn test_reload_from_file_swaps_routes() {
    let old_backend = start_mock_backend("old").await;
    let new_backend = start_mock_backend("new").await;

    let mut config = GatewayConfig::default();
    config.routes.push(static_route("/api", old_backend, "2s"));
    let gateway = start_gateway(config.clone(), None).await;

    let mut next = config;
    next.routes = vec![
        static_route("/api", new_backend, "2s"),
        static_route("/extra", new_backend, "2s"),
    ];
    std::fs::write(&gateway.config_path, toml::to_string(&next).unwrap()).unwrap();
    gateway.coordinator.reload().await.unwrap();

    let client = client();
    let res = client.get(gateway.url("/api")).send().await.unwrap();
    assert_eq!(res.text().await.unwrap(), "new");
    let res = client.get(gateway.url("/extra")).send().await.unwrap();
    assert_eq!(res.status(), 200);
}

#[tokio::test]
async fn test_reload_mid_traffic_never_fails_requests() {
    let backend_a = start_mock_backend("a").await;
    let backend_b = start_mock_backend("b").await;

    let mut config_a = GatewayConfig::default();
    config_a.routes.push(static_route("/api", backend_a, "2s"));
    let mut config_b = GatewayConfig::default();
    config_b.routes.push(static_route("/api", backend_b, "2s"));

    let gateway = start_gateway(config_a.clone(), None).await;
    let url = gateway.url("/api");

    let mut workers = Vec::new();
    for _ in 0..4 {
        let url = url.clone();
        workers.push(tokio::spawn(async move {
            let client = client();
            let mut failures = 0;
            for _ in 0..25 {
                match client.get(&url).send().await {
                    Ok(res) if res.status() == 200 => {
                        let body = res.text().await.unwrap_or_default();
                        if body != "a" && body != "b" {
                            failures += 1;
                        }
                    }
                    _ => failures += 1,
                }
            }
            failures
        }));
    }

    for i in 0..10 {
        let next = if i % 2 == 0 { config_b.clone() } else { config_a.clone() };
        gateway.coordinator.apply(next).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
    }

    let mut failures = 0;
    for worker in workers {
        failures += worker.await.unwrap();
    }
    assert_eq!(failures, 0, "requests failed while routes were being swapped");
}
