//! Server API tests

use super::*;
use axum::{
    body::Body,
    http::{Request, StatusCode},
};
use http_body_util::BodyExt;
use tempfile::TempDir;
use tower::ServiceExt;

use tally_core::ai::{AnalyzerClient, MockBackend};
use tally_core::db::Database;

fn mock_analyzer() -> AnalyzerClient {
    AnalyzerClient::Mock(MockBackend::new())
}

fn setup_test_app(analyzer: Option<AnalyzerClient>) -> (Router, TempDir) {
    let db = Database::in_memory().unwrap();
    let images_dir = TempDir::new().unwrap();
    let config = ServerConfig {
        require_auth: false,
        ..Default::default()
    };
    let app = create_router(db, config, analyzer, images_dir.path().to_path_buf());
    (app, images_dir)
}

async fn get_body_json(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body();
    let bytes = body.collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

async fn analyze_image(app: &Router, bytes: Vec<u8>) -> axum::response::Response {
    app.clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri("/api/receipts/analyze")
                .body(Body::from(bytes))
                .unwrap(),
        )
        .await
        .unwrap()
}

// ========== Health and auth ==========

#[tokio::test]
async fn test_health() {
    let (app, _dir) = setup_test_app(Some(mock_analyzer()));

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["analyzer"]["configured"], true);
    assert_eq!(json["analyzer"]["backend"], "mock");
}

#[tokio::test]
async fn test_auth_required() {
    let db = Database::in_memory().unwrap();
    let images_dir = TempDir::new().unwrap();
    let config = ServerConfig {
        require_auth: true,
        api_keys: vec!["secret-key".to_string()],
        ..Default::default()
    };
    let app = create_router(db, config, None, images_dir.path().to_path_buf());

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/receipts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri("/api/receipts")
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/receipts")
                .header("authorization", "Bearer secret-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[test]
fn test_validate_api_key() {
    let keys = vec!["alpha".to_string(), "beta".to_string()];
    assert!(validate_api_key("alpha", &keys));
    assert!(validate_api_key("beta", &keys));
    assert!(!validate_api_key("gamma", &keys));
    assert!(!validate_api_key("alph", &keys));
    assert!(!validate_api_key("", &keys));
}

// ========== Analysis ==========

#[tokio::test]
async fn test_analyze_receipt() {
    let (app, _dir) = setup_test_app(Some(mock_analyzer()));

    let response = analyze_image(&app, vec![1, 2, 3, 4]).await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["duplicate"], false);
    assert_eq!(json["merchant"], "Mock Diner");
    assert_eq!(json["line_items"].as_array().unwrap().len(), 2);
    // 2x3.50 + 4.25 = 11.25, +0.90 tax = 12.15, +2.00 tip = 14.15
    assert_eq!(json["items_total"], "11.25");
    assert_eq!(json["posttax_total"], "12.15");
    assert_eq!(json["final_total"], "14.15");
}

#[tokio::test]
async fn test_analyze_duplicate_upload() {
    let (app, _dir) = setup_test_app(Some(mock_analyzer()));

    let first = get_body_json(analyze_image(&app, vec![9, 9, 9]).await).await;
    let second_resp = analyze_image(&app, vec![9, 9, 9]).await;
    assert_eq!(second_resp.status(), StatusCode::OK);
    let second = get_body_json(second_resp).await;

    assert_eq!(second["duplicate"], true);
    assert_eq!(second["id"], first["id"]);
}

#[tokio::test]
async fn test_analyze_empty_body() {
    let (app, _dir) = setup_test_app(Some(mock_analyzer()));
    let response = analyze_image(&app, vec![]).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_analyze_without_backend() {
    let (app, _dir) = setup_test_app(None);
    let response = analyze_image(&app, vec![1, 2, 3]).await;
    assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
}

#[tokio::test]
async fn test_analyze_unparsable_output() {
    let analyzer = AnalyzerClient::Mock(MockBackend::with_response("I see a cat, not a receipt."));
    let (app, _dir) = setup_test_app(Some(analyzer));
    let response = analyze_image(&app, vec![1, 2, 3]).await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
}

// ========== Receipt records ==========

#[tokio::test]
async fn test_get_and_delete_receipt() {
    let (app, _dir) = setup_test_app(Some(mock_analyzer()));
    let created = get_body_json(analyze_image(&app, vec![5, 5]).await).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .uri(format!("/api/receipts/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["merchant"], "Mock Diner");

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/receipts/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/receipts/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_list_receipts() {
    let (app, _dir) = setup_test_app(Some(mock_analyzer()));
    analyze_image(&app, vec![1]).await;
    analyze_image(&app, vec![2]).await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/receipts")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    let list = json.as_array().unwrap();
    assert_eq!(list.len(), 2);
    assert_eq!(list[0]["document_type"], "receipt");
    assert_eq!(list[0]["final_total"], "14.15");
}

#[tokio::test]
async fn test_get_receipt_image() {
    let (app, _dir) = setup_test_app(Some(mock_analyzer()));
    let created = get_body_json(analyze_image(&app, vec![7, 7, 7]).await).await;
    let id = created["id"].as_i64().unwrap();

    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/receipts/{}/image", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "image/jpeg"
    );
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(bytes.as_ref(), &[7, 7, 7]);
}

// ========== Field updates ==========

#[tokio::test]
async fn test_update_receipt_fields() {
    let (app, _dir) = setup_test_app(Some(mock_analyzer()));
    let created = get_body_json(analyze_image(&app, vec![1]).await).await;
    let id = created["id"].as_i64().unwrap();

    let body = serde_json::json!({"tip": 5.00, "made_up": true});
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/receipts/{}/fields", id))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["tip"], "5.00");
    assert_eq!(json["ignored_fields"][0], "made_up");
}

#[tokio::test]
async fn test_update_receipt_fields_rejects_line_items() {
    let (app, _dir) = setup_test_app(Some(mock_analyzer()));
    let created = get_body_json(analyze_image(&app, vec![1]).await).await;
    let id = created["id"].as_i64().unwrap();

    let body = serde_json::json!({"line_items": []});
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/receipts/{}/fields", id))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ========== Line items ==========

async fn setup_receipt(app: &Router) -> i64 {
    let created = get_body_json(analyze_image(app, vec![3, 1, 4]).await).await;
    created["id"].as_i64().unwrap()
}

#[tokio::test]
async fn test_add_line_item_at_head() {
    let (app, _dir) = setup_test_app(Some(mock_analyzer()));
    let id = setup_receipt(&app).await;

    let body = serde_json::json!({"name": "Juice", "quantity": 1, "price_per_item": 3.00});
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/receipts/{}/line-items", id))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let item = get_body_json(response).await;
    assert_eq!(item["name"], "Juice");
    assert_eq!(item["total_price"], "3.00");

    // New item shows up first in the receipt
    let response = app
        .oneshot(
            Request::builder()
                .uri(format!("/api/receipts/{}", id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = get_body_json(response).await;
    assert_eq!(json["line_items"][0]["name"], "Juice");
}

#[tokio::test]
async fn test_add_line_item_rejects_client_id() {
    let (app, _dir) = setup_test_app(Some(mock_analyzer()));
    let id = setup_receipt(&app).await;

    let body = serde_json::json!({"name": "Juice", "id": "not-allowed"});
    let response = app
        .oneshot(
            Request::builder()
                .method("POST")
                .uri(format!("/api/receipts/{}/line-items", id))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_update_line_item_ignores_id() {
    let (app, _dir) = setup_test_app(Some(mock_analyzer()));
    let id = setup_receipt(&app).await;

    let receipt = get_body_json(
        app.clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/receipts/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap(),
    )
    .await;
    let item_id = receipt["line_items"][0]["id"].as_str().unwrap().to_string();

    let body = serde_json::json!({"name": "Renamed", "id": "11111111-1111-1111-1111-111111111111"});
    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!("/api/receipts/{}/line-items/{}", id, item_id))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = get_body_json(response).await;
    assert_eq!(json["name"], "Renamed");
    assert_eq!(json["id"], item_id);
    assert_eq!(json["ignored_fields"][0], "id");
}

#[tokio::test]
async fn test_set_assignments_and_delete_item() {
    let (app, _dir) = setup_test_app(Some(mock_analyzer()));
    let id = setup_receipt(&app).await;

    let receipt = get_body_json(
        app.clone()
            .oneshot(
                Request::builder()
                    .uri(format!("/api/receipts/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap(),
    )
    .await;
    let item_id = receipt["line_items"][0]["id"].as_str().unwrap().to_string();

    let body = serde_json::json!({"assignments": ["alice", "bob"]});
    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri(format!(
                    "/api/receipts/{}/line-items/{}/assignments",
                    id, item_id
                ))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_string(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = get_body_json(response).await;
    assert_eq!(json["assignments"], serde_json::json!(["alice", "bob"]));

    let response = app
        .clone()
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/receipts/{}/line-items/{}", id, item_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    // Second delete is NotFound
    let response = app
        .oneshot(
            Request::builder()
                .method("DELETE")
                .uri(format!("/api/receipts/{}/line-items/{}", id, item_id))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
