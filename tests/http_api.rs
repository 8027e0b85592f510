//! End-to-end route tests over the in-memory store.

mod common;

use adminforge::{build_router, AppState, MemoryRecordStore, StaticIdentityProvider};
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

fn open_app() -> (Router, Arc<MemoryRecordStore>) {
    let registry = Arc::new(common::registry());
    let store = Arc::new(MemoryRecordStore::new(registry.clone()));
    let identity = Arc::new(StaticIdentityProvider::new());
    let state = AppState::build(registry, store.clone(), identity, false);
    (build_router(state), store)
}

fn secured_app() -> (Router, Arc<MemoryRecordStore>) {
    let registry = Arc::new(common::registry());
    let store = Arc::new(MemoryRecordStore::new(registry.clone()));
    let identity = Arc::new(
        StaticIdentityProvider::new()
            .role(
                "admin",
                &[
                    "products:list",
                    "products:view",
                    "products:create",
                    "products:update",
                    "products:delete",
                    "orders:list",
                    "orders:view",
                    "orders:create",
                    "orders:update",
                    "orders:delete",
                ],
            )
            .role("reader", &["products:list", "products:view"])
            .token("admin-tok", "carol", &["admin"])
            .token("reader-tok", "dave", &["reader"]),
    );
    let state = AppState::build(registry, store.clone(), identity, true);
    (build_router(state), store)
}

fn req(method: &str, uri: &str, body: Option<Value>, token: Option<&str>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(t) = token {
        builder = builder.header("authorization", format!("Bearer {}", t));
    }
    match body {
        Some(v) => builder
            .header("content-type", "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn seed(store: &MemoryRecordStore, table: &str, row: Value) {
    store.seed(table, row.as_object().unwrap().clone());
}

#[tokio::test]
async fn create_then_fetch_round_trip() {
    let (app, _) = open_app();

    let (status, body) = send(
        &app,
        req("POST", "/products", Some(json!({"name": "Widget", "price": 9.99})), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["success"], json!(true));
    let id = body["data"]["id"].as_i64().expect("generated id");
    assert_eq!(body["data"]["name"], json!("Widget"));

    let (status, body) = send(&app, req("GET", &format!("/products/{}", id), None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["name"], json!("Widget"));
    assert_eq!(body["data"]["price"], json!(9.99));
    // Generated defaults were filled by the store.
    assert_eq!(body["data"]["in_stock"], json!(true));
    assert!(body["data"]["created_at"].is_string());
}

#[tokio::test]
async fn client_supplied_id_is_never_used() {
    let (app, _) = open_app();
    let (status, body) = send(
        &app,
        req(
            "POST",
            "/products",
            Some(json!({"id": 999, "name": "Widget", "price": 1.0})),
            None,
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["id"], json!(1));
}

#[tokio::test]
async fn numeric_strings_are_coerced_before_storage() {
    let (app, _) = open_app();
    let (status, body) = send(
        &app,
        req("POST", "/products", Some(json!({"name": "W", "price": "9.99", "in_stock": "0"})), None),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(body["data"]["price"], json!(9.99));
    assert_eq!(body["data"]["in_stock"], json!(false));
}

#[tokio::test]
async fn validation_failure_reports_per_field_detail() {
    let (app, _) = open_app();
    let (status, body) = send(&app, req("POST", "/products", Some(json!({})), None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("validation_error"));
    let details = body["error"]["details"].as_object().unwrap();
    assert!(details.contains_key("name"));
    assert!(details.contains_key("price"));
}

#[tokio::test]
async fn list_defaults_survive_bad_pagination_input() {
    let (app, store) = open_app();
    for i in 1..=3 {
        seed(
            &store,
            "logs",
            json!({"id": i, "message": format!("m{}", i)}),
        );
    }
    let (status, body) = send(&app, req("GET", "/logs?limit=abc&offset=xyz", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["limit"], json!(50));
    assert_eq!(body["meta"]["offset"], json!(0));
    assert_eq!(body["meta"]["count"], json!(3));
}

#[tokio::test]
async fn invalid_order_direction_is_a_validation_error() {
    let (app, _) = open_app();
    let (status, body) = send(&app, req("GET", "/products?orderDirection=SIDEWAYS", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"]["code"], json!("validation_error"));

    let (status, _) = send(&app, req("GET", "/products?orderDirection=DESC", None, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_order_by_column_is_rejected() {
    let (app, _) = open_app();
    let (status, _) = send(&app, req("GET", "/products?orderBy=bogus", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn list_orders_and_paginates() {
    let (app, store) = open_app();
    for i in 1..=5 {
        seed(&store, "logs", json!({"id": i, "message": format!("m{}", i)}));
    }
    let (status, body) = send(
        &app,
        req("GET", "/logs?limit=2&offset=1&orderBy=id&orderDirection=DESC", None, None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<i64> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|r| r["id"].as_i64().unwrap())
        .collect();
    assert_eq!(ids, vec![4, 3]);
}

#[tokio::test]
async fn column_filters_apply_exact_match() {
    let (app, store) = open_app();
    seed(&store, "logs", json!({"id": 1, "message": "a"}));
    seed(&store, "logs", json!({"id": 2, "message": "b"}));
    let (status, body) = send(&app, req("GET", "/logs?message=b", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["meta"]["count"], json!(1));
    assert_eq!(body["data"][0]["id"], json!(2));
}

#[tokio::test]
async fn include_relations_attaches_referenced_rows() {
    let (app, store) = open_app();
    seed(
        &store,
        "products",
        json!({"id": 1, "name": "Widget", "price": 9.99, "description": null, "in_stock": true, "created_at": "2024-01-01T00:00:00Z"}),
    );
    seed(
        &store,
        "orders",
        json!({"id": 1, "product_id": 1, "user_id": "alice", "status": "active", "quantity": 2}),
    );

    let (status, body) = send(&app, req("GET", "/orders/1?includeRelations=true", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["_related"]["product_id"]["name"], json!("Widget"));

    let (status, body) = send(&app, req("GET", "/orders?includeRelations=true", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["_related"]["product_id"]["name"], json!("Widget"));

    // Without the flag no reserved key appears.
    let (_, body) = send(&app, req("GET", "/orders/1", None, None)).await;
    assert!(body["data"].get("_related").is_none());
}

#[tokio::test]
async fn named_relation_fetch() {
    let (app, store) = open_app();
    seed(
        &store,
        "products",
        json!({"id": 7, "name": "Gear", "price": 3.5, "description": null, "in_stock": true, "created_at": "2024-01-01T00:00:00Z"}),
    );
    seed(
        &store,
        "orders",
        json!({"id": 1, "product_id": 7, "user_id": "alice", "status": "active", "quantity": 1}),
    );

    let (status, body) = send(&app, req("GET", "/orders/1/related/product_id", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["name"], json!("Gear"));

    let (status, _) = send(&app, req("GET", "/orders/99/related/product_id", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(&app, req("GET", "/orders/1/related/quantity", None, None)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn partial_update_and_delete() {
    let (app, _) = open_app();
    let (_, body) = send(
        &app,
        req("POST", "/products", Some(json!({"name": "Widget", "price": 9.99})), None),
    )
    .await;
    let id = body["data"]["id"].as_i64().unwrap();

    let (status, body) = send(
        &app,
        req("PUT", &format!("/products/{}", id), Some(json!({"price": 19.99})), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["price"], json!(19.99));
    assert_eq!(body["data"]["name"], json!("Widget"));

    let (status, _) = send(&app, req("PUT", "/products/999", Some(json!({"price": 1.0})), None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, req("DELETE", &format!("/products/{}", id), None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], json!(true));
    assert!(body["message"].is_string());

    let (status, _) = send(&app, req("GET", &format!("/products/{}", id), None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn unknown_record_and_table_are_not_found() {
    let (app, _) = open_app();
    let (status, _) = send(&app, req("GET", "/products/42", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, req("GET", "/warehouses", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn introspection_routes() {
    let (app, _) = open_app();

    let (status, body) = send(&app, req("GET", "/health", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], json!("ok"));

    let (status, body) = send(&app, req("GET", "/tables", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    let tables = body["tables"].as_array().unwrap();
    assert_eq!(tables.len(), 4);
    let products = tables.iter().find(|t| t["name"] == json!("products")).unwrap();
    assert_eq!(products["columns"], json!(6));

    let (status, body) = send(&app, req("GET", "/schemas", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["relations"]["orders"]["outgoing"].as_array().unwrap().len() == 1);
    assert!(body["relations"]["products"]["incoming"].as_array().unwrap().len() == 1);

    let (status, body) = send(&app, req("GET", "/schema/orders", None, None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["schema"]["name"], json!("orders"));

    let (status, _) = send(&app, req("GET", "/schema/warehouses", None, None)).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn anonymous_requests_are_unauthorized_when_auth_enabled() {
    let (app, _) = secured_app();
    let (status, _) = send(&app, req("GET", "/products", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    let (status, _) = send(&app, req("GET", "/products", None, Some("bogus-token"))).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn missing_permission_is_forbidden() {
    let (app, _) = secured_app();
    // dave can read products but not create them or touch orders.
    let (status, _) = send(&app, req("GET", "/products", None, Some("reader-tok"))).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        req("POST", "/products", Some(json!({"name": "W", "price": 1.0})), Some("reader-tok")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    let (status, _) = send(&app, req("GET", "/orders", None, Some("reader-tok"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn failed_row_condition_is_forbidden_without_detail() {
    let (app, store) = secured_app();
    // carol holds orders:delete but the row is archived.
    seed(
        &store,
        "orders",
        json!({"id": 3, "product_id": 1, "user_id": "carol", "status": "archived", "quantity": 1}),
    );
    let (status, body) = send(&app, req("DELETE", "/orders/3", None, Some("admin-tok"))).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    // The response never names the failing condition.
    let message = body["error"]["message"].as_str().unwrap();
    assert!(!message.contains("status"));
    assert!(!message.contains("user_id"));
}

#[tokio::test]
async fn row_conditions_guard_mutations_of_other_principals_rows() {
    let (app, store) = secured_app();
    seed(
        &store,
        "orders",
        json!({"id": 1, "product_id": 1, "user_id": "someone-else", "status": "active", "quantity": 1}),
    );
    let (status, _) = send(
        &app,
        req("PUT", "/orders/1", Some(json!({"quantity": 5})), Some("admin-tok")),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    // An owned, active row goes through.
    seed(
        &store,
        "orders",
        json!({"id": 2, "product_id": 1, "user_id": "carol", "status": "active", "quantity": 1}),
    );
    let (status, body) = send(
        &app,
        req("PUT", "/orders/2", Some(json!({"quantity": 5})), Some("admin-tok")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["quantity"], json!(5));
}
