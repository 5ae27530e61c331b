use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::{json, Value};
use tower::ServiceExt; // for oneshot
use trustledger_db::MEMORY_PATH;
use trustledger_server::config::DatabaseConfig;
use trustledger_server::{app, AppState};

fn setup_app() -> Router {
    let database = DatabaseConfig {
        path: MEMORY_PATH.to_string(),
        ..DatabaseConfig::default()
    };
    app(AppState::open(&database).unwrap())
}

async fn send(
    app: &Router,
    method: &str,
    uri: &str,
    caller: Option<&str>,
    body: Option<Value>,
) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(caller) = caller {
        builder = builder.header("X-Ledger-Caller", caller);
    }
    let request = match body {
        Some(body) => builder
            .header("Content-Type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, json)
}

async fn register(app: &Router, owner: &str, name: &str, domain: &str) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/agents",
        Some(owner),
        Some(json!({ "name": name, "domain": domain, "metadataUri": "ipfs://card" })),
    )
    .await
}

#[tokio::test]
async fn health_check_returns_ok() {
    let app = setup_app();
    let (status, body) = send(&app, "GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["version"], "0.0.1");
}

#[tokio::test]
async fn register_and_fetch_agent() {
    let app = setup_app();

    let (status, body) = register(&app, "0xA11CE", "Alice", "alice.example").await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["agentId"], 1);

    let (status, agent) = send(&app, "GET", "/api/agents/1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agent["name"], "Alice");
    assert_eq!(agent["domain"], "alice.example");
    assert_eq!(agent["owner"], "0xa11ce");
    assert_eq!(agent["active"], true);
    assert_eq!(agent["metadataUri"], "ipfs://card");

    let (_, lookup) = send(&app, "GET", "/api/agents/by-domain/alice.example", None, None).await;
    assert_eq!(lookup["agentId"], 1);

    let (_, missing) = send(&app, "GET", "/api/agents/by-domain/nobody.example", None, None).await;
    assert_eq!(missing["agentId"], 0);

    let (_, count) = send(&app, "GET", "/api/agents/count", None, None).await;
    assert_eq!(count["total"], 1);
}

#[tokio::test]
async fn registration_requires_caller() {
    let app = setup_app();
    let (status, body) = send(
        &app,
        "POST",
        "/api/agents",
        None,
        Some(json!({ "name": "Alice", "domain": "alice.example" })),
    )
    .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["code"], "UNAUTHENTICATED");
}

#[tokio::test]
async fn duplicate_domain_conflicts() {
    let app = setup_app();
    register(&app, "0xa", "Alice", "alice.example").await;

    let (status, body) = register(&app, "0xb", "Mallory", "alice.example").await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_EXISTS");

    let (status, body) = register(&app, "0xb", "", "bob.example").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");
}

#[tokio::test]
async fn unknown_agent_is_not_found() {
    let app = setup_app();
    let (status, body) = send(&app, "GET", "/api/agents/42", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");
}

#[tokio::test]
async fn ids_past_the_signed_range_are_not_found() {
    let app = setup_app();
    let (status, body) = send(&app, "GET", "/api/agents/9223372036854775808", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "NOT_FOUND");

    let (status, _) = send(
        &app,
        "PUT",
        "/api/agents/18446744073709551615/uri",
        Some("0xowner"),
        Some(json!({ "metadataUri": "ipfs://v2" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn owner_updates_uri_and_deactivates_once() {
    let app = setup_app();
    register(&app, "0xowner", "Alice", "alice.example").await;

    let (status, body) = send(
        &app,
        "PUT",
        "/api/agents/1/uri",
        Some("0xstranger"),
        Some(json!({ "metadataUri": "ipfs://hijack" })),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (status, agent) = send(
        &app,
        "PUT",
        "/api/agents/1/uri",
        Some("0xOWNER"),
        Some(json!({ "metadataUri": "ipfs://v2" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agent["metadataUri"], "ipfs://v2");

    let (status, agent) =
        send(&app, "POST", "/api/agents/1/deactivate", Some("0xowner"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(agent["active"], false);

    let (status, body) =
        send(&app, "POST", "/api/agents/1/deactivate", Some("0xowner"), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");

    let (status, _) = send(
        &app,
        "PUT",
        "/api/agents/1/uri",
        Some("0xowner"),
        Some(json!({ "metadataUri": "ipfs://v3" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
}

#[tokio::test]
async fn registration_card_and_digest() {
    let app = setup_app();
    register(&app, "0xowner", "Watcher", "watcher.example").await;

    let (status, body) = send(&app, "GET", "/api/agents/1/registration", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["registration"]["version"], "registration-v1");
    assert_eq!(body["registration"]["agentId"], 1);
    assert_eq!(
        body["registration"]["endpoints"]["a2a"]["endpoint"],
        "https://watcher.example/a2a"
    );
    assert_eq!(body["digest"].as_str().unwrap().len(), 64);
}

#[tokio::test]
async fn registration_card_takes_capabilities_and_mcp() {
    let app = setup_app();
    register(&app, "0xowner", "Watcher", "watcher.example").await;

    let (_, plain) = send(&app, "GET", "/api/agents/1/registration", None, None).await;
    let (status, body) = send(
        &app,
        "GET",
        "/api/agents/1/registration?capabilities=market-analysis,,alerts&mcp=https://watcher.example/mcp",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(
        body["registration"]["capabilities"],
        json!(["market-analysis", "alerts"])
    );
    assert_eq!(body["registration"]["endpoints"]["mcp"]["enabled"], true);
    assert_eq!(
        body["registration"]["endpoints"]["mcp"]["endpoint"],
        "https://watcher.example/mcp"
    );
    assert_ne!(body["digest"], plain["digest"]);
}

#[tokio::test]
async fn trust_summary_for_fresh_agent_is_zero() {
    let app = setup_app();
    register(&app, "0xowner", "Alice", "alice.example").await;

    let (status, body) = send(&app, "GET", "/api/agents/1/trust", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["agentId"], 1);
    assert_eq!(body["reputationScore"], 0);
    assert_eq!(body["feedbackCount"], 0);
    assert_eq!(body["validationScore"], 0);
    assert_eq!(body["validationRequests"], 0);
}
