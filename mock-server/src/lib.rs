//! In-memory API server with asynchronous operations.
//!
//! Serves an arbitrary resource hierarchy under `/api/v1`. Mutations are
//! applied immediately but, unless the caller asks for `sync=true`, are
//! acknowledged with a `Working` status naming an entry in `/operations`.
//! That entry keeps answering `Working` until it has been polled
//! `polls_until_done` times and then returns the mutation's result.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::{net::TcpListener, sync::RwLock};
use tracing::debug;
use uuid::Uuid;

pub const API_PREFIX: &str = "/api/v1";
pub const DEFAULT_NAMESPACE: &str = "default";

#[derive(Clone, Debug, Default, Serialize, Deserialize, PartialEq)]
pub struct StatusDetails {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Status {
    pub kind: String,
    pub api_version: String,
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<StatusDetails>,
    pub code: u16,
}

impl Status {
    fn new(status: &str, code: StatusCode) -> Self {
        Self {
            kind: "Status".to_string(),
            api_version: "v1".to_string(),
            status: status.to_string(),
            message: None,
            reason: None,
            details: None,
            code: code.as_u16(),
        }
    }

    pub fn working(id: &str, kind: &str) -> Self {
        Self {
            details: Some(StatusDetails {
                id: Some(id.to_string()),
                kind: Some(kind.to_string()),
            }),
            ..Self::new("Working", StatusCode::ACCEPTED)
        }
    }

    pub fn success() -> Self {
        Self::new("Success", StatusCode::OK)
    }

    pub fn failure(code: StatusCode, reason: &str, message: impl Into<String>) -> Self {
        Self {
            reason: Some(reason.to_string()),
            message: Some(message.into()),
            ..Self::new("Failure", code)
        }
    }

    fn into_response_with(self, code: StatusCode) -> Response {
        (code, Json(self)).into_response()
    }
}

/// Query parameters understood by every route. Unknown parameters, such as
/// `timeout`, are accepted and ignored.
#[derive(Debug, Default, Deserialize)]
pub struct ApiQuery {
    pub namespace: Option<String>,
    pub sync: Option<bool>,
    pub labels: Option<String>,
}

struct PendingOperation {
    remaining: u32,
    code: StatusCode,
    result: Value,
    kind: String,
}

type Key = (String, String, String);

#[derive(Default)]
struct Store {
    objects: BTreeMap<Key, Value>,
    operations: HashMap<String, PendingOperation>,
}

#[derive(Clone)]
pub struct AppState {
    store: Arc<RwLock<Store>>,
    polls_until_done: u32,
}

/// Server whose mutations complete synchronously.
pub fn app() -> Router {
    app_with_polls(0)
}

/// Server whose mutations complete after `polls_until_done` operation polls.
pub fn app_with_polls(polls_until_done: u32) -> Router {
    let state = AppState {
        store: Arc::new(RwLock::new(Store::default())),
        polls_until_done,
    };
    let api = Router::new()
        .route("/operations/{name}", get(get_operation))
        .route(
            "/namespaces/{namespace}/{resource}",
            get(list_objects).post(create_object),
        )
        .route(
            "/namespaces/{namespace}/{resource}/{name}",
            get(get_object).put(update_object).delete(delete_object),
        )
        .route("/{resource}", get(list_objects).post(create_object))
        .route(
            "/{resource}/{name}",
            get(get_object).put(update_object).delete(delete_object),
        );
    Router::new().nest(API_PREFIX, api).with_state(state)
}

pub async fn run(listener: TcpListener, polls_until_done: u32) -> Result<(), std::io::Error> {
    axum::serve(listener, app_with_polls(polls_until_done)).await
}

struct Target {
    namespace: String,
    resource: String,
    name: Option<String>,
}

impl Target {
    fn from_request(params: HashMap<String, String>, query: &ApiQuery) -> Self {
        let mut params = params;
        let namespace = params
            .remove("namespace")
            .or_else(|| query.namespace.clone())
            .unwrap_or_else(|| DEFAULT_NAMESPACE.to_string());
        Self {
            namespace,
            resource: params.remove("resource").unwrap_or_default(),
            name: params.remove("name"),
        }
    }

    fn key(&self, name: &str) -> Key {
        (self.namespace.clone(), self.resource.clone(), name.to_string())
    }

    fn not_found(&self) -> Response {
        Status::failure(
            StatusCode::NOT_FOUND,
            "NotFound",
            format!(
                "{} {:?} not found in namespace {:?}",
                self.resource,
                self.name.as_deref().unwrap_or_default(),
                self.namespace
            ),
        )
        .into_response_with(StatusCode::NOT_FOUND)
    }
}

fn object_name(object: &Value) -> Option<&str> {
    object
        .pointer("/metadata/name")
        .and_then(Value::as_str)
        .filter(|name| !name.is_empty())
}

/// `key=value` pairs separated by commas; every pair must match.
fn matches_labels(object: &Value, selector: &str) -> bool {
    selector
        .split(',')
        .map(str::trim)
        .filter(|term| !term.is_empty())
        .all(|term| match term.split_once('=') {
            Some((key, value)) => {
                object
                    .pointer("/metadata/labels")
                    .and_then(|labels| labels.get(key.trim()))
                    .and_then(Value::as_str)
                    == Some(value.trim())
            }
            None => false,
        })
}

/// Answer a mutation directly or park its result behind a new operation.
async fn finish(
    state: &AppState,
    query: &ApiQuery,
    kind: &str,
    code: StatusCode,
    result: Value,
) -> Response {
    if query.sync.unwrap_or(false) || state.polls_until_done == 0 {
        return (code, Json(result)).into_response();
    }
    let id = Uuid::new_v4().to_string();
    state.store.write().await.operations.insert(
        id.clone(),
        PendingOperation {
            remaining: state.polls_until_done,
            code,
            result,
            kind: kind.to_string(),
        },
    );
    debug!(operation = %id, kind, "registered operation");
    Status::working(&id, kind).into_response_with(StatusCode::ACCEPTED)
}

async fn list_objects(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    Query(query): Query<ApiQuery>,
) -> Response {
    let target = Target::from_request(params, &query);
    let store = state.store.read().await;
    let items: Vec<Value> = store
        .objects
        .iter()
        .filter(|((ns, resource, _), _)| *ns == target.namespace && *resource == target.resource)
        .map(|(_, object)| object)
        .filter(|object| {
            query
                .labels
                .as_deref()
                .map_or(true, |selector| matches_labels(object, selector))
        })
        .cloned()
        .collect();
    Json(serde_json::json!({"kind": "List", "items": items})).into_response()
}

async fn create_object(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    Query(query): Query<ApiQuery>,
    Json(object): Json<Value>,
) -> Response {
    let target = Target::from_request(params, &query);
    let Some(name) = object_name(&object).map(str::to_string) else {
        return Status::failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            "Invalid",
            "metadata.name is required",
        )
        .into_response_with(StatusCode::UNPROCESSABLE_ENTITY);
    };
    {
        let mut store = state.store.write().await;
        let key = target.key(&name);
        if store.objects.contains_key(&key) {
            return Status::failure(
                StatusCode::CONFLICT,
                "AlreadyExists",
                format!("{} {name:?} already exists", target.resource),
            )
            .into_response_with(StatusCode::CONFLICT);
        }
        store.objects.insert(key, object.clone());
    }
    finish(&state, &query, &target.resource, StatusCode::CREATED, object).await
}

async fn get_object(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    Query(query): Query<ApiQuery>,
) -> Response {
    let target = Target::from_request(params, &query);
    let name = target.name.clone().unwrap_or_default();
    let store = state.store.read().await;
    match store.objects.get(&target.key(&name)) {
        Some(object) => Json(object.clone()).into_response(),
        None => target.not_found(),
    }
}

async fn update_object(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    Query(query): Query<ApiQuery>,
    Json(object): Json<Value>,
) -> Response {
    let target = Target::from_request(params, &query);
    let name = target.name.clone().unwrap_or_default();
    {
        let mut store = state.store.write().await;
        match store.objects.get_mut(&target.key(&name)) {
            Some(existing) => *existing = object.clone(),
            None => return target.not_found(),
        }
    }
    finish(&state, &query, &target.resource, StatusCode::OK, object).await
}

async fn delete_object(
    State(state): State<AppState>,
    Path(params): Path<HashMap<String, String>>,
    Query(query): Query<ApiQuery>,
) -> Response {
    let target = Target::from_request(params, &query);
    let name = target.name.clone().unwrap_or_default();
    if state
        .store
        .write()
        .await
        .objects
        .remove(&target.key(&name))
        .is_none()
    {
        return target.not_found();
    }
    let result = serde_json::to_value(Status::success()).unwrap_or_default();
    finish(&state, &query, &target.resource, StatusCode::OK, result).await
}

async fn get_operation(State(state): State<AppState>, Path(name): Path<String>) -> Response {
    let mut store = state.store.write().await;
    let Some(operation) = store.operations.get_mut(&name) else {
        return Status::failure(
            StatusCode::NOT_FOUND,
            "NotFound",
            format!("operation {name:?} not found"),
        )
        .into_response_with(StatusCode::NOT_FOUND);
    };
    operation.remaining = operation.remaining.saturating_sub(1);
    if operation.remaining > 0 {
        return Status::working(&name, &operation.kind).into_response_with(StatusCode::ACCEPTED);
    }
    match store.operations.remove(&name) {
        Some(done) => (done.code, Json(done.result)).into_response(),
        None => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn working_status_serializes_operation_id() {
        let json = serde_json::to_value(Status::working("op-1", "pods")).unwrap();
        assert_eq!(json["kind"], "Status");
        assert_eq!(json["apiVersion"], "v1");
        assert_eq!(json["status"], "Working");
        assert_eq!(json["details"]["id"], "op-1");
        assert_eq!(json["code"], 202);
        assert!(json.get("message").is_none());
    }

    #[test]
    fn failure_status_carries_reason() {
        let json =
            serde_json::to_value(Status::failure(StatusCode::CONFLICT, "AlreadyExists", "dup"))
                .unwrap();
        assert_eq!(json["status"], "Failure");
        assert_eq!(json["reason"], "AlreadyExists");
        assert_eq!(json["code"], 409);
    }

    #[test]
    fn object_name_requires_metadata_name() {
        assert_eq!(object_name(&json!({"metadata": {"name": "a"}})), Some("a"));
        assert_eq!(object_name(&json!({"metadata": {"name": ""}})), None);
        assert_eq!(object_name(&json!({"name": "a"})), None);
    }

    #[test]
    fn label_selector_requires_every_pair() {
        let object = json!({"metadata": {"labels": {"app": "web", "tier": "front"}}});
        assert!(matches_labels(&object, "app=web"));
        assert!(matches_labels(&object, "app=web, tier=front"));
        assert!(!matches_labels(&object, "app=web,tier=back"));
        assert!(!matches_labels(&object, "app"));
        assert!(matches_labels(&object, ""));
    }

    #[test]
    fn query_accepts_unknown_params() {
        let query: ApiQuery =
            serde_json::from_value(json!({"sync": true, "timeout": "10s"})).unwrap();
        assert_eq!(query.sync, Some(true));
        assert!(query.namespace.is_none());
    }

    #[test]
    fn target_prefers_path_namespace() {
        let query = ApiQuery {
            namespace: Some("from-query".to_string()),
            ..ApiQuery::default()
        };
        let params = HashMap::from([
            ("namespace".to_string(), "from-path".to_string()),
            ("resource".to_string(), "pods".to_string()),
        ]);
        let target = Target::from_request(params, &query);
        assert_eq!(target.namespace, "from-path");
        assert_eq!(target.resource, "pods");
        assert!(target.name.is_none());

        let target = Target::from_request(HashMap::new(), &ApiQuery::default());
        assert_eq!(target.namespace, DEFAULT_NAMESPACE);
    }
}
