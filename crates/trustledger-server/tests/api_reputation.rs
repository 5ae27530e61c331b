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

const HASH: &str = "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad";

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

async fn submit(app: &Router, reviewer: &str, score: u32) -> (StatusCode, Value) {
    send(
        app,
        "POST",
        "/api/agents/1/feedback",
        Some(reviewer),
        Some(json!({
            "score": score,
            "tags": ["accuracy"],
            "dataUri": "ipfs://review",
            "dataHash": HASH,
        })),
    )
    .await
}

#[tokio::test]
async fn alice_end_to_end() {
    let app = setup_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/agents",
        Some("0xA11CE"),
        Some(json!({ "name": "Alice", "domain": "alice.example" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["agentId"], 1);

    let (status, body) = send(
        &app,
        "POST",
        "/api/agents/1/feedback/authorizations",
        Some("0xA11CE"),
        Some(json!({ "client": "0xC" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["authorized"], true);

    let (status, body) = submit(&app, "0xc", 90).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["index"], 0);

    let (_, reputation) = send(&app, "GET", "/api/agents/1/reputation", None, None).await;
    assert_eq!(reputation["averageScore"], 90);
    assert_eq!(reputation["feedbackCount"], 1);

    let (status, body) = send(
        &app,
        "DELETE",
        "/api/agents/1/feedback/authorizations/0xc",
        Some("0xA11CE"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["authorized"], false);

    let (status, body) = submit(&app, "0xc", 10).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["code"], "UNAUTHORIZED");

    let (_, reputation) = send(&app, "GET", "/api/agents/1/reputation", None, None).await;
    assert_eq!(reputation["averageScore"], 90);
}

#[tokio::test]
async fn authorization_state_is_queryable() {
    let app = setup_app();

    let (_, body) = send(
        &app,
        "GET",
        "/api/agents/1/feedback/authorizations/0xc",
        None,
        None,
    )
    .await;
    assert_eq!(body["authorized"], false);
    assert!(body["authorizedAt"].is_null());

    send(
        &app,
        "POST",
        "/api/agents/1/feedback/authorizations",
        Some("0xanyone"),
        Some(json!({ "client": "0xc" })),
    )
    .await;

    let (_, body) = send(
        &app,
        "GET",
        "/api/agents/1/feedback/authorizations/0xC",
        None,
        None,
    )
    .await;
    assert_eq!(body["authorized"], true);
    assert!(body["authorizedAt"].is_string());

    let (status, body) = send(
        &app,
        "POST",
        "/api/agents/1/feedback/authorizations",
        Some("0xanyone"),
        Some(json!({ "client": "0xc" })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "ALREADY_EXISTS");
}

#[tokio::test]
async fn null_client_and_bad_revoke_are_rejected() {
    let app = setup_app();

    let (status, body) = send(
        &app,
        "POST",
        "/api/agents/1/feedback/authorizations",
        Some("0xanyone"),
        Some(json!({ "client": "0x0000000000000000000000000000000000000000" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    let (status, body) = send(
        &app,
        "DELETE",
        "/api/agents/1/feedback/authorizations/0xc",
        Some("0xanyone"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["code"], "INVALID_STATE");
}

#[tokio::test]
async fn feedback_listing_and_truncated_average() {
    let app = setup_app();
    send(
        &app,
        "POST",
        "/api/agents/1/feedback/authorizations",
        Some("0xowner"),
        Some(json!({ "client": "0xc" })),
    )
    .await;

    for score in [80, 85, 90] {
        let (status, _) = submit(&app, "0xc", score).await;
        assert_eq!(status, StatusCode::CREATED);
    }

    let (_, list) = send(&app, "GET", "/api/agents/1/feedback", None, None).await;
    assert_eq!(list["count"], 3);
    assert_eq!(list["feedback"][2]["score"], 90);
    assert_eq!(list["feedback"][0]["dataHash"], HASH);
    assert_eq!(list["feedback"][0]["tags"][0], "accuracy");

    let (status, entry) = send(&app, "GET", "/api/agents/1/feedback/1", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(entry["score"], 85);
    assert_eq!(entry["index"], 1);
    assert_eq!(entry["reviewer"], "0xc");

    let (status, body) = send(&app, "GET", "/api/agents/1/feedback/3", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "OUT_OF_RANGE");

    let (status, body) = send(
        &app,
        "GET",
        "/api/agents/1/feedback/9223372036854775808",
        None,
        None,
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["code"], "OUT_OF_RANGE");

    let (_, reputation) = send(&app, "GET", "/api/agents/1/reputation", None, None).await;
    assert_eq!(reputation["averageScore"], 85);

    let (_, total) = send(&app, "GET", "/api/feedback/count", None, None).await;
    assert_eq!(total["total"], 3);
}

#[tokio::test]
async fn invalid_scores_and_hashes_are_bad_requests() {
    let app = setup_app();
    send(
        &app,
        "POST",
        "/api/agents/1/feedback/authorizations",
        Some("0xowner"),
        Some(json!({ "client": "0xc" })),
    )
    .await;

    let (status, body) = submit(&app, "0xc", 101).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["code"], "INVALID_ARGUMENT");

    let (status, _) = submit(&app, "0xc", 1000).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(
        &app,
        "POST",
        "/api/agents/1/feedback",
        Some("0xc"),
        Some(json!({ "score": 50, "dataHash": "not-hex" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // A JSON document can stand in for the hash.
    let (status, body) = send(
        &app,
        "POST",
        "/api/agents/1/feedback",
        Some("0xc"),
        Some(json!({ "score": 50, "data": { "verdict": "good" } })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["index"], 0);
}
