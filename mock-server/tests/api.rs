use axum::http::{self, Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use mock_server::{app, app_with_polls, Status};
use serde_json::Value;
use tower::ServiceExt;

async fn body_json<T: serde::de::DeserializeOwned>(response: axum::response::Response) -> T {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(http::header::CONTENT_TYPE, "application/json")
        .body(body.to_string())
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<String> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(String::new())
        .unwrap()
}

async fn send(app: &Router, request: Request<String>) -> axum::response::Response {
    app.clone().oneshot(request).await.unwrap()
}

const POD: &str = r#"{"metadata":{"name":"web","labels":{"app":"web"}}}"#;

// --- list ---

#[tokio::test]
async fn list_empty_collection() {
    let resp = send(&app(), empty_request("GET", "/api/v1/pods")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let list: Value = body_json(resp).await;
    assert_eq!(list["kind"], "List");
    assert!(list["items"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn list_filters_by_labels() {
    let app = app();
    send(&app, json_request("POST", "/api/v1/pods", POD)).await;
    send(
        &app,
        json_request(
            "POST",
            "/api/v1/pods",
            r#"{"metadata":{"name":"db","labels":{"app":"db"}}}"#,
        ),
    )
    .await;

    let resp = send(&app, empty_request("GET", "/api/v1/pods?labels=app%3Dweb")).await;
    let list: Value = body_json(resp).await;
    let items = list["items"].as_array().unwrap();
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["metadata"]["name"], "web");
}

// --- create ---

#[tokio::test]
async fn create_returns_201_when_synchronous() {
    let resp = send(&app(), json_request("POST", "/api/v1/pods", POD)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = body_json(resp).await;
    assert_eq!(created["metadata"]["name"], "web");
}

#[tokio::test]
async fn create_without_name_returns_422() {
    let resp = send(&app(), json_request("POST", "/api/v1/pods", r#"{"spec":{}}"#)).await;
    assert_eq!(resp.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let status: Status = body_json(resp).await;
    assert_eq!(status.status, "Failure");
    assert_eq!(status.reason.as_deref(), Some("Invalid"));
}

#[tokio::test]
async fn create_duplicate_returns_409() {
    let app = app();
    send(&app, json_request("POST", "/api/v1/pods", POD)).await;
    let resp = send(&app, json_request("POST", "/api/v1/pods", POD)).await;
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

// --- get ---

#[tokio::test]
async fn get_missing_returns_404_status() {
    let resp = send(&app(), empty_request("GET", "/api/v1/pods/nope")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let status: Status = body_json(resp).await;
    assert_eq!(status.code, 404);
}

// --- namespaces ---

#[tokio::test]
async fn path_and_query_namespaces_address_the_same_object() {
    let app = app();
    let resp = send(&app, json_request("POST", "/api/v1/namespaces/team/pods", POD)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send(&app, empty_request("GET", "/api/v1/pods/web?namespace=team")).await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, empty_request("GET", "/api/v1/pods/web")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- asynchronous operations ---

#[tokio::test]
async fn mutation_returns_working_operation() {
    let app = app_with_polls(2);
    let resp = send(&app, json_request("POST", "/api/v1/pods", POD)).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);
    let status: Status = body_json(resp).await;
    assert_eq!(status.status, "Working");
    let id = status.details.unwrap().id.unwrap();

    let resp = send(&app, empty_request("GET", &format!("/api/v1/operations/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let resp = send(&app, empty_request("GET", &format!("/api/v1/operations/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
    let created: Value = body_json(resp).await;
    assert_eq!(created["metadata"]["name"], "web");

    // finished operations are forgotten
    let resp = send(&app, empty_request("GET", &format!("/api/v1/operations/{id}"))).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sync_param_skips_operation() {
    let app = app_with_polls(3);
    let resp = send(&app, json_request("POST", "/api/v1/pods?sync=true&timeout=10s", POD)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);
}

#[tokio::test]
async fn unknown_operation_returns_404() {
    let resp = send(&app_with_polls(1), empty_request("GET", "/api/v1/operations/missing")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

// --- full lifecycle ---

#[tokio::test]
async fn crud_lifecycle() {
    let app = app();

    let resp = send(&app, json_request("POST", "/api/v1/pods", POD)).await;
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = send(
        &app,
        json_request(
            "PUT",
            "/api/v1/pods/web",
            r#"{"metadata":{"name":"web"},"spec":{"replicas":3}}"#,
        ),
    )
    .await;
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = send(&app, empty_request("GET", "/api/v1/pods/web")).await;
    let fetched: Value = body_json(resp).await;
    assert_eq!(fetched["spec"]["replicas"], 3);

    let resp = send(&app, empty_request("DELETE", "/api/v1/pods/web")).await;
    assert_eq!(resp.status(), StatusCode::OK);
    let status: Status = body_json(resp).await;
    assert_eq!(status.status, "Success");

    let resp = send(&app, empty_request("DELETE", "/api/v1/pods/web")).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = send(&app, empty_request("PUT", "/api/v1/pods/web")).await;
    assert_ne!(resp.status(), StatusCode::OK);
}
