use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use axum::{
    extract::{Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use serde_json::{json, Value};
use tokio::net::TcpListener;

use crate::models::{EntityRef, Product, Role};
use crate::services::api::{Action, Backend, HttpBackend};

#[derive(Debug, Clone)]
struct RecordedRequest {
    method: &'static str,
    query: HashMap<String, String>,
    request_id: Option<String>,
    body: Option<Value>,
}

#[derive(Clone)]
struct ProxyState {
    reply: Value,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
}

fn request_id(headers: &HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

async fn handle_get(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
) -> Json<Value> {
    state.requests.lock().unwrap().push(RecordedRequest {
        method: "GET",
        query,
        request_id: request_id(&headers),
        body: None,
    });
    Json(state.reply.clone())
}

async fn handle_post(
    State(state): State<ProxyState>,
    headers: HeaderMap,
    Query(query): Query<HashMap<String, String>>,
    Json(body): Json<Value>,
) -> Json<Value> {
    state.requests.lock().unwrap().push(RecordedRequest {
        method: "POST",
        query,
        request_id: request_id(&headers),
        body: Some(body),
    });
    Json(state.reply.clone())
}

async fn spawn_proxy(reply: Value) -> (String, Arc<Mutex<Vec<RecordedRequest>>>) {
    std::env::set_var("NO_PROXY", "127.0.0.1,localhost");
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    let requests = Arc::new(Mutex::new(Vec::new()));
    let state = ProxyState {
        reply,
        requests: requests.clone(),
    };
    let app = Router::new()
        .route("/api/proxy", get(handle_get).post(handle_post))
        .route("/broken", get(|| async { "<html>Bad gateway</html>" }))
        .with_state(state);
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });
    (format!("http://{addr}"), requests)
}

#[tokio::test]
async fn get_actions_send_their_parameters_in_the_query() {
    let (base, requests) = spawn_proxy(json!({
        "success": true,
        "data": [{"id": "7", "name": "Cheese", "cost_price": "10,50", "sell_price": 15, "status": "active"}]
    }))
    .await;
    let backend = HttpBackend::new(&format!("{base}/api/proxy")).unwrap();

    let response = backend.call(&Action::GetPriceHistory { product_id: 7 }).await;
    assert!(response.success);

    let requests = requests.lock().unwrap();
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "GET");
    assert_eq!(requests[0].query.get("action").map(String::as_str), Some("getPriceHistory"));
    assert_eq!(requests[0].query.get("product_id").map(String::as_str), Some("7"));
    assert!(requests[0].request_id.is_some());
}

#[tokio::test]
async fn read_data_is_decoded_leniently() {
    let (base, _requests) = spawn_proxy(json!({
        "success": true,
        "data": [{"id": "7", "name": "Cheese", "cost_price": "10,50", "sell_price": 15, "status": "active"}]
    }))
    .await;
    let backend = HttpBackend::new(&format!("{base}/api/proxy")).unwrap();

    let products: Vec<Product> = backend.call(&Action::GetProducts).await.into_data().unwrap();
    assert_eq!(products.len(), 1);
    assert_eq!(products[0].id, 7);
    assert_eq!(products[0].cost_price, 10.5);
}

#[tokio::test]
async fn post_actions_send_a_json_body() {
    let (base, requests) = spawn_proxy(json!({"success": true})).await;
    let backend = HttpBackend::new(&format!("{base}/api/proxy")).unwrap();

    let response = backend
        .call(&Action::MarkDeliveryPaid(EntityRef {
            id: 12,
            changed_by: Role::Executor,
        }))
        .await;
    assert!(response.success);
    assert_eq!(response.into_confirmed().unwrap(), None);

    let requests = requests.lock().unwrap();
    assert_eq!(requests[0].method, "POST");
    assert_eq!(requests[0].query.get("action").map(String::as_str), Some("markDeliveryPaid"));
    assert_eq!(requests[0].query.get("id"), None);
    assert_eq!(requests[0].body, Some(json!({"id": 12, "changed_by": "executor"})));
}

#[tokio::test]
async fn backend_errors_are_passed_through() {
    let (base, _requests) = spawn_proxy(json!({"success": false, "error": "Sheet is locked"})).await;
    let backend = HttpBackend::new(&format!("{base}/api/proxy")).unwrap();

    let response = backend.call(&Action::GetAuditLog).await;
    assert!(!response.success);
    assert_eq!(response.error.as_deref(), Some("Sheet is locked"));
}

#[tokio::test]
async fn non_json_bodies_are_failures() {
    let (base, _requests) = spawn_proxy(json!({"success": true})).await;
    let backend = HttpBackend::new(&format!("{base}/broken")).unwrap();

    let response = backend.call(&Action::GetDeliveries).await;
    assert!(!response.success);
    assert!(response.error.unwrap().contains("Invalid JSON"));
}

#[tokio::test]
async fn unreachable_backend_is_a_failure_not_a_panic() {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);

    let backend = HttpBackend::new(&format!("http://{addr}/api/proxy")).unwrap();
    let response = backend.call(&Action::GetProducts).await;
    assert!(!response.success);
    assert!(response.error.is_some());
}
