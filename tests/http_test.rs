use async_trait::async_trait;
use mqtt_authd::auth::{Gatekeeper, StaticIdentities};
use mqtt_authd::config::{Config, IdentityConfig};
use mqtt_authd::server::{self, Server};
use mqtt_authd::storage::{DirectoryError, DirectoryResult, NewTenant, Tenant, TenantDirectory};
use reqwest::StatusCode;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;

static INIT: std::sync::Once = std::sync::Once::new();

pub fn init_test_logging() {
    INIT.call_once(|| {
        let log_level = std::env::var("RUST_LOG")
            .ok()
            .and_then(|s| s.parse::<Level>().ok())
            .unwrap_or(Level::INFO);

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

fn identity(name: &str, password: &str, root: &str) -> IdentityConfig {
    IdentityConfig {
        name: name.to_string(),
        password: Some(password.to_string()),
        password_env: None,
        root: root.to_string(),
        read_only: false,
    }
}

async fn start_server(tenants: &[(&str, &str, &str)]) -> (Server, String) {
    init_test_logging();
    let mut config = Config::default();
    config.listen = "127.0.0.1:0".to_string();
    config.identities = vec![
        identity("svcA", "s1", "svcA"),
        identity("svcB", "s2", "$SYS"),
        identity("piot", "piotpwd", "org"),
    ];

    let server = server::start(config).await.unwrap();
    for (name, username, password) in tenants {
        server
            .gatekeeper()
            .directory()
            .insert_tenant(NewTenant::new(*name, *username, *password))
            .await
            .unwrap();
    }
    let address = server.address().await.unwrap();
    (server, format!("http://{address}"))
}

async fn post_json(url: &str, body: serde_json::Value) -> (StatusCode, String) {
    let response = reqwest::Client::new()
        .post(url)
        .json(&body)
        .send()
        .await
        .unwrap();
    let status = response.status();
    (status, response.text().await.unwrap())
}

fn acl(username: &str, topic: &str) -> serde_json::Value {
    json!({
        "acc": 2,
        "clientid": "mqtt-client",
        "topic": topic,
        "username": username,
    })
}

#[tokio::test]
async fn test_authenticate_static_user() {
    let (server, base) = start_server(&[]).await;
    let url = format!("{base}/mosquitto-auth-user");

    let (status, body) = post_json(&url, json!({"username": "svcA", "password": "s1"})).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body.is_empty());

    let (status, body) = post_json(&url, json!({"username": "svcA", "password": "wrong"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("svcA"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_authenticate_tenant_user() {
    let (server, base) = start_server(&[("Acme", "u1", "p1")]).await;
    let url = format!("{base}/mosquitto-auth-user");

    let (status, _) = post_json(&url, json!({"username": "u1", "password": "p1"})).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(&url, json!({"username": "u1", "password": "p2"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = post_json(&url, json!({"username": "test@test.com", "password": "p1"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_authorize_static_users() {
    let (server, base) = start_server(&[]).await;
    let url = format!("{base}/mosquitto-auth-acl");

    let cases = [
        ("svcB", "$SYS/stats", StatusCode::OK),
        ("svcB", "other/topic", StatusCode::UNAUTHORIZED),
        ("svcA", "svcA/xx", StatusCode::OK),
        ("svcA", "hello", StatusCode::UNAUTHORIZED),
        ("piot", "org/Adidas", StatusCode::OK),
        ("piot", "hello", StatusCode::UNAUTHORIZED),
    ];
    for (username, topic, expected) in cases {
        let (status, _) = post_json(&url, acl(username, topic)).await;
        assert_eq!(status, expected, "{username} on {topic}");
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_authorize_tenant_topics() {
    let (server, base) = start_server(&[("Acme", "u1", "p1"), ("Globex", "u1", "p1")]).await;
    let url = format!("{base}/mosquitto-auth-acl");

    let (status, _) = post_json(&url, acl("u1", "org/Acme/sensor1")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(&url, acl("u1", "org/Globex/sensor1")).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = post_json(&url, acl("u1", "org/OtherOrg/sensor1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("OtherOrg"));

    let (status, _) = post_json(&url, acl("u2", "org/Acme/sensor1")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_authorize_empty_tenant_name() {
    let (server, base) = start_server(&[("Acme", "u1", "p1")]).await;
    let url = format!("{base}/mosquitto-auth-acl");

    let (status, body) = post_json(&url, acl("u1", "no-slash-topic")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("empty tenant name"));

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_superuser_always_denied() {
    let (server, base) = start_server(&[("Acme", "u1", "p1")]).await;
    let url = format!("{base}/mosquitto-auth-superuser");

    let (status, _) = post_json(&url, json!({"username": "u1"})).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    // Not even a well-formed body is required to be told no
    let response = reqwest::Client::new()
        .post(&url)
        .body(r#"{ "username": "xxx", }"#)
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_malformed_body_and_wrong_method() {
    let (server, base) = start_server(&[]).await;
    let client = reqwest::Client::new();

    for path in ["mosquitto-auth-user", "mosquitto-auth-acl"] {
        let url = format!("{base}/{path}");

        let response = client.post(&url).body("{not json").send().await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let response = client.get(&url).send().await.unwrap();
        assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
        assert_eq!(response.text().await.unwrap(), "Only POST method is allowed");
    }

    let response = client
        .get(format!("{base}/mosquitto-auth-superuser"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);

    let response = client.get(format!("{base}/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_decisions() {
    let (server, base) = start_server(&[("Acme", "u1", "p1")]).await;
    let url = format!("{base}/mosquitto-auth-acl");

    let requests = (0..32).map(|i| {
        let url = url.clone();
        async move {
            let topic = if i % 2 == 0 {
                "org/Acme/data".to_string()
            } else {
                format!("org/Other{i}/data")
            };
            let (status, _) = post_json(&url, acl("u1", &topic)).await;
            (i, status)
        }
    });

    for (i, status) in futures::future::join_all(requests).await {
        let expected = if i % 2 == 0 {
            StatusCode::OK
        } else {
            StatusCode::UNAUTHORIZED
        };
        assert_eq!(status, expected, "request {i}");
    }

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_server_lifecycle() {
    let (server, _) = start_server(&[]).await;

    assert!(server.is_running().await);
    assert!(matches!(
        server.start().await,
        Err(server::ServerError::AlreadyRunning)
    ));

    server.stop().await.unwrap();
    assert!(!server.is_running().await);
    tokio::time::timeout(Duration::from_secs(1), server.finished())
        .await
        .expect("server task should be finished after stop");
    assert!(matches!(
        server.stop().await,
        Err(server::ServerError::NotRunning)
    ));
}

#[tokio::test]
async fn test_finished_pending_while_running() {
    let (server, _) = start_server(&[]).await;

    let waited = tokio::time::timeout(Duration::from_millis(100), server.finished()).await;
    assert!(waited.is_err());

    server.stop().await.unwrap();
}

struct UnreachableDirectory;

#[async_trait]
impl TenantDirectory for UnreachableDirectory {
    async fn find_by_credentials(&self, _: &str, _: &str) -> DirectoryResult<Option<Tenant>> {
        Err(DirectoryError::Unavailable("connection refused".to_string()))
    }

    async fn find_by_username(&self, _: &str) -> DirectoryResult<Vec<Tenant>> {
        Err(DirectoryError::Unavailable("connection refused".to_string()))
    }

    async fn insert_tenant(&self, _: NewTenant) -> DirectoryResult<Tenant> {
        Err(DirectoryError::Unavailable("connection refused".to_string()))
    }
}

#[tokio::test]
async fn test_directory_failure_denies() {
    init_test_logging();
    let mut config = Config::default();
    config.listen = "127.0.0.1:0".to_string();
    let gatekeeper = Gatekeeper::new(StaticIdentities::default(), Arc::new(UnreachableDirectory));

    let server = Server::with_gatekeeper(config, gatekeeper);
    server.start().await.unwrap();
    let base = format!("http://{}", server.address().await.unwrap());

    let (status, body) = post_json(
        &format!("{base}/mosquitto-auth-acl"),
        acl("u1", "org/Acme/x"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("could not be completed"), "{body}");

    let (status, body) = post_json(
        &format!("{base}/mosquitto-auth-user"),
        json!({"username": "u1", "password": "p1"}),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("could not be verified"), "{body}");

    // Empty tenant segment is rejected before the directory is consulted
    let (status, body) = post_json(
        &format!("{base}/mosquitto-auth-acl"),
        acl("u1", "org//x"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert!(body.contains("empty tenant name"), "{body}");

    server.stop().await.unwrap();
}

#[tokio::test]
async fn test_sqlite_backend() {
    init_test_logging();
    let dir = tempfile::tempdir().unwrap();

    let mut config = Config::from_toml(&format!(
        r#"
listen = "127.0.0.1:0"

[directory]
backend = "sqlite"
database_path = "{}"
"#,
        dir.path().join("tenants.db").display()
    ))
    .unwrap();
    config.identities.clear();

    let server = server::start(config).await.unwrap();
    server
        .gatekeeper()
        .directory()
        .insert_tenant(NewTenant::new("SomeOrg", "tester", "testerpwd"))
        .await
        .unwrap();
    let base = format!("http://{}", server.address().await.unwrap());

    let (status, _) = post_json(
        &format!("{base}/mosquitto-auth-user"),
        json!({"username": "tester", "password": "testerpwd"}),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(
        &format!("{base}/mosquitto-auth-acl"),
        acl("tester", "org/SomeOrg/hello"),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = post_json(
        &format!("{base}/mosquitto-auth-acl"),
        acl("tester", "org/UnknownOrg/hello"),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    server.stop().await.unwrap();
}
