//! In-memory stand-in for the assets collections service.
//!
//! Serves the same four paths the client talks to. Data is partitioned by
//! the `x-location-group` request header (no header = the default group).
//! Payloads are arbitrary JSON objects; the server injects a UUID `id`.

use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
};

use axum::{
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::{json, Map, Value};
use tokio::{net::TcpListener, sync::RwLock};
use tower_http::trace::TraceLayer;
use uuid::Uuid;

pub const LOCATION_GROUP_HEADER: &str = "x-location-group";
pub const TOTAL_COUNT_HEADER: &str = "x-total-count";
pub const RATELIMIT_HEADER: &str = "x-ratelimit-remaining";
pub const RATELIMIT_REMAINING: u32 = 1000;

type Object = Map<String, Value>;

#[derive(Debug, Default)]
pub struct Collection {
    pub data: Object,
    pub items: BTreeMap<String, Object>,
}

/// Collections of one location group, keyed by id.
pub type Group = BTreeMap<String, Collection>;

pub type Db = Arc<RwLock<HashMap<String, Group>>>;

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(HashMap::new()));
    Router::new()
        .route("/assets/collections", get(list_collections).post(create_collection))
        .route(
            "/assets/collections/{id}",
            get(get_collection).put(update_collection).delete(delete_collection),
        )
        .route("/assets/collections/{id}/items", get(list_items).post(create_item))
        .route(
            "/assets/collections/{id}/items/{item_id}",
            get(get_item).put(update_item).delete(delete_item),
        )
        .layer(middleware::map_response(add_ratelimit))
        .layer(TraceLayer::new_for_http())
        .with_state(db)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

/// Error answer in the service's `{"message": ...}` shape.
#[derive(Debug)]
pub struct Failure(StatusCode, String);

impl Failure {
    fn not_found(what: &str) -> Self {
        Self(StatusCode::NOT_FOUND, format!("{what} not found"))
    }
}

impl IntoResponse for Failure {
    fn into_response(self) -> Response {
        (self.0, Json(json!({ "message": self.1 }))).into_response()
    }
}

async fn add_ratelimit(mut response: Response) -> Response {
    response
        .headers_mut()
        .insert(RATELIMIT_HEADER, HeaderValue::from(RATELIMIT_REMAINING));
    response
}

fn group_of(headers: &HeaderMap) -> String {
    headers
        .get(LOCATION_GROUP_HEADER)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string()
}

fn object(payload: Value) -> Result<Object, Failure> {
    match payload {
        Value::Object(map) => Ok(map),
        _ => Err(Failure(
            StatusCode::UNPROCESSABLE_ENTITY,
            "payload must be a JSON object".to_string(),
        )),
    }
}

fn with_id(id: &str, mut data: Object) -> Object {
    data.insert("id".to_string(), Value::String(id.to_string()));
    data
}

fn merge(target: &mut Object, patch: Object) {
    for (key, value) in patch {
        if key != "id" {
            target.insert(key, value);
        }
    }
}

fn listing(values: Vec<Value>) -> Response {
    let total = values.len();
    let mut response = Json(Value::Array(values)).into_response();
    response
        .headers_mut()
        .insert(TOTAL_COUNT_HEADER, HeaderValue::from(total));
    response
}

// --- collections ---

async fn list_collections(State(db): State<Db>, headers: HeaderMap) -> Response {
    let db = db.read().await;
    let values: Vec<Value> = db
        .get(&group_of(&headers))
        .map(|group| group.values().map(|c| Value::Object(c.data.clone())).collect())
        .unwrap_or_default();
    listing(values)
}

async fn create_collection(
    State(db): State<Db>,
    headers: HeaderMap,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    let id = Uuid::new_v4().to_string();
    let data = with_id(&id, object(payload)?);
    db.write()
        .await
        .entry(group_of(&headers))
        .or_default()
        .insert(
            id,
            Collection {
                data: data.clone(),
                items: BTreeMap::new(),
            },
        );
    Ok((StatusCode::CREATED, Json(Value::Object(data))))
}

async fn get_collection(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Json<Value>, Failure> {
    let db = db.read().await;
    db.get(&group_of(&headers))
        .and_then(|group| group.get(&id))
        .map(|c| Json(Value::Object(c.data.clone())))
        .ok_or_else(|| Failure::not_found("collection"))
}

async fn update_collection(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, Failure> {
    let patch = object(payload)?;
    let mut db = db.write().await;
    let collection = db
        .get_mut(&group_of(&headers))
        .and_then(|group| group.get_mut(&id))
        .ok_or_else(|| Failure::not_found("collection"))?;
    merge(&mut collection.data, patch);
    Ok(Json(Value::Object(collection.data.clone())))
}

async fn delete_collection(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<StatusCode, Failure> {
    let mut db = db.write().await;
    db.get_mut(&group_of(&headers))
        .and_then(|group| group.remove(&id))
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| Failure::not_found("collection"))
}

// --- items ---

async fn list_items(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Result<Response, Failure> {
    let db = db.read().await;
    let collection = db
        .get(&group_of(&headers))
        .and_then(|group| group.get(&id))
        .ok_or_else(|| Failure::not_found("collection"))?;
    let values: Vec<Value> = collection.items.values().cloned().map(Value::Object).collect();
    Ok(listing(values))
}

async fn create_item(
    State(db): State<Db>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(payload): Json<Value>,
) -> Result<(StatusCode, Json<Value>), Failure> {
    let payload = object(payload)?;
    let mut db = db.write().await;
    let collection = db
        .get_mut(&group_of(&headers))
        .and_then(|group| group.get_mut(&id))
        .ok_or_else(|| Failure::not_found("collection"))?;
    let item_id = Uuid::new_v4().to_string();
    let data = with_id(&item_id, payload);
    collection.items.insert(item_id, data.clone());
    Ok((StatusCode::CREATED, Json(Value::Object(data))))
}

async fn get_item(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<Json<Value>, Failure> {
    let db = db.read().await;
    let collection = db
        .get(&group_of(&headers))
        .and_then(|group| group.get(&id))
        .ok_or_else(|| Failure::not_found("collection"))?;
    collection
        .items
        .get(&item_id)
        .map(|item| Json(Value::Object(item.clone())))
        .ok_or_else(|| Failure::not_found("item"))
}

async fn update_item(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((id, item_id)): Path<(String, String)>,
    Json(payload): Json<Value>,
) -> Result<Json<Value>, Failure> {
    let patch = object(payload)?;
    let mut db = db.write().await;
    let collection = db
        .get_mut(&group_of(&headers))
        .and_then(|group| group.get_mut(&id))
        .ok_or_else(|| Failure::not_found("collection"))?;
    let item = collection
        .items
        .get_mut(&item_id)
        .ok_or_else(|| Failure::not_found("item"))?;
    merge(item, patch);
    Ok(Json(Value::Object(item.clone())))
}

async fn delete_item(
    State(db): State<Db>,
    headers: HeaderMap,
    Path((id, item_id)): Path<(String, String)>,
) -> Result<StatusCode, Failure> {
    let mut db = db.write().await;
    let collection = db
        .get_mut(&group_of(&headers))
        .and_then(|group| group.get_mut(&id))
        .ok_or_else(|| Failure::not_found("collection"))?;
    collection
        .items
        .remove(&item_id)
        .map(|_| StatusCode::NO_CONTENT)
        .ok_or_else(|| Failure::not_found("item"))
}
