use std::{
    collections::{BTreeMap, HashMap},
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use axum::{
    extract::{Path, Request, State},
    http::{header, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::get,
    Form, Json, Router,
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value as JsonValue};
use tokio::{net::TcpListener, sync::RwLock};
use uuid::Uuid;

/// Path prefix the Streak API is served under.
pub const API_PREFIX: &str = "/api/v1";

const FIRST_STAGE_KEY: u32 = 5001;
const FIRST_FIELD_KEY: u32 = 1001;

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub user_key: String,
    pub email: String,
    pub display_name: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    pub pipeline_key: String,
    pub name: String,
    pub description: String,
    pub creator_key: String,
    pub stage_order: Vec<String>,
    pub creation_timestamp: i64,
    pub last_updated_timestamp: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StreakBox {
    pub box_key: String,
    pub pipeline_key: String,
    pub name: String,
    pub notes: String,
    pub stage_key: String,
    pub creator_key: String,
    pub creation_timestamp: i64,
    pub last_updated_timestamp: i64,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    pub key: String,
    pub name: String,
    pub background_color: String,
    pub text_color: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Field {
    pub key: String,
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FieldValue {
    pub key: String,
    pub value: JsonValue,
}

#[derive(Deserialize)]
pub struct EditValue {
    pub value: JsonValue,
}

/// In-memory state behind the mock API.
#[derive(Debug)]
struct Store {
    me: User,
    pipelines: HashMap<String, Pipeline>,
    boxes: HashMap<String, StreakBox>,
    stages: HashMap<String, BTreeMap<String, Stage>>,
    fields: HashMap<String, BTreeMap<String, Field>>,
    values: HashMap<String, BTreeMap<String, JsonValue>>,
    next_stage_key: u32,
    next_field_key: u32,
}

impl Default for Store {
    fn default() -> Self {
        Self {
            me: User {
                user_key: "mock-user".to_string(),
                email: "mock@example.com".to_string(),
                display_name: "Mock User".to_string(),
            },
            pipelines: HashMap::new(),
            boxes: HashMap::new(),
            stages: HashMap::new(),
            fields: HashMap::new(),
            values: HashMap::new(),
            next_stage_key: FIRST_STAGE_KEY,
            next_field_key: FIRST_FIELD_KEY,
        }
    }
}

impl Store {
    fn add_stage(&mut self, pipeline_key: &str, name: &str) -> Stage {
        let stage = Stage {
            key: self.next_stage_key.to_string(),
            name: name.to_string(),
            background_color: "#a6d4ff".to_string(),
            text_color: "#000000".to_string(),
        };
        self.next_stage_key += 1;
        self.stages
            .entry(pipeline_key.to_string())
            .or_default()
            .insert(stage.key.clone(), stage.clone());
        if let Some(pipeline) = self.pipelines.get_mut(pipeline_key) {
            pipeline.stage_order.push(stage.key.clone());
        }
        stage
    }

    fn pipeline(&self, pipeline_key: &str) -> Result<&Pipeline, ApiError> {
        self.pipelines
            .get(pipeline_key)
            .ok_or_else(|| ApiError::not_found("Pipeline not found"))
    }

    fn streak_box(&self, box_key: &str) -> Result<&StreakBox, ApiError> {
        self.boxes
            .get(box_key)
            .ok_or_else(|| ApiError::not_found("Box not found"))
    }

    /// The field definition a box's value for `field_key` would use.
    fn box_field(&self, box_key: &str, field_key: &str) -> Result<&Field, ApiError> {
        let streak_box = self.streak_box(box_key)?;
        self.fields
            .get(&streak_box.pipeline_key)
            .and_then(|fields| fields.get(field_key))
            .ok_or_else(|| ApiError::not_found("Field not found"))
    }
}

type Db = Arc<RwLock<Store>>;

/// Streak-style failure: `{"success": false, "error": "..."}`.
#[derive(Debug)]
pub struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.to_string(),
        }
    }

    fn bad_request(message: &str) -> Self {
        Self {
            status: StatusCode::BAD_REQUEST,
            message: message.to_string(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = json!({ "success": false, "error": self.message });
        (self.status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as i64)
        .unwrap_or_default()
}

fn new_key() -> String {
    Uuid::new_v4().simple().to_string()
}

fn required<'a>(form: &'a HashMap<String, String>, name: &str) -> Result<&'a str, ApiError> {
    form.get(name)
        .map(String::as_str)
        .filter(|value| !value.trim().is_empty())
        .ok_or_else(|| ApiError::bad_request(&format!("{name} is required")))
}

fn text<'a>(body: &'a Map<String, JsonValue>, name: &str) -> Option<&'a str> {
    body.get(name).and_then(JsonValue::as_str)
}

fn deleted() -> Json<JsonValue> {
    Json(json!({ "success": true }))
}

pub fn app() -> Router {
    let db: Db = Arc::new(RwLock::new(Store::default()));
    let api = Router::new()
        .route("/users/{user_key}", get(get_user))
        .route("/pipelines", get(list_pipelines).put(create_pipeline))
        .route("/pipelines/", get(list_pipelines).put(create_pipeline))
        .route(
            "/pipelines/{pipeline_key}",
            get(get_pipeline).post(edit_pipeline).delete(delete_pipeline),
        )
        .route(
            "/pipelines/{pipeline_key}/boxes",
            get(list_boxes_in_pipeline).put(create_box),
        )
        .route(
            "/pipelines/{pipeline_key}/stages",
            get(list_stages).put(create_stage),
        )
        .route(
            "/pipelines/{pipeline_key}/stages/{stage_key}",
            get(get_stage).post(edit_stage).delete(delete_stage),
        )
        .route(
            "/pipelines/{pipeline_key}/fields",
            get(list_fields).put(create_field),
        )
        .route(
            "/pipelines/{pipeline_key}/fields/{field_key}",
            get(get_field).post(edit_field).delete(delete_field),
        )
        .route("/boxes", get(list_boxes))
        .route("/boxes/", get(list_boxes))
        .route(
            "/boxes/{box_key}",
            get(get_box).post(edit_box).delete(delete_box),
        )
        .route("/boxes/{box_key}/fields", get(list_box_values))
        .route(
            "/boxes/{box_key}/fields/{field_key}",
            get(get_box_value).post(edit_box_value),
        )
        .layer(middleware::from_fn(require_basic_auth))
        .with_state(db);
    Router::new().nest(API_PREFIX, api)
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn require_basic_auth(request: Request, next: Next) -> Response {
    let authorized = request
        .headers()
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.starts_with("Basic ") && value.len() > "Basic ".len());
    if !authorized {
        tracing::warn!(uri = %request.uri(), "rejected unauthenticated request");
        return ApiError {
            status: StatusCode::UNAUTHORIZED,
            message: "Authentication required".to_string(),
        }
        .into_response();
    }
    tracing::debug!(method = %request.method(), uri = %request.uri(), "request");
    next.run(request).await
}

// ---- users ----

async fn get_user(State(db): State<Db>, Path(user_key): Path<String>) -> ApiResult<User> {
    let store = db.read().await;
    if user_key == "me" || user_key == store.me.user_key {
        return Ok(Json(store.me.clone()));
    }
    Err(ApiError::not_found("User not found"))
}

// ---- pipelines ----

async fn list_pipelines(State(db): State<Db>) -> Json<Vec<Pipeline>> {
    let store = db.read().await;
    Json(store.pipelines.values().cloned().collect())
}

async fn create_pipeline(
    State(db): State<Db>,
    Form(form): Form<HashMap<String, String>>,
) -> ApiResult<Pipeline> {
    let name = required(&form, "name")?;
    let mut store = db.write().await;
    let now = now_millis();
    let pipeline = Pipeline {
        pipeline_key: new_key(),
        name: name.to_string(),
        description: form.get("description").cloned().unwrap_or_default(),
        creator_key: store.me.user_key.clone(),
        stage_order: Vec::new(),
        creation_timestamp: now,
        last_updated_timestamp: now,
    };
    let key = pipeline.pipeline_key.clone();
    store.pipelines.insert(key.clone(), pipeline);
    if let Some(stage_names) = form.get("stageNames") {
        for stage_name in stage_names.split(',').map(str::trim).filter(|s| !s.is_empty()) {
            store.add_stage(&key, stage_name);
        }
    }
    tracing::info!(pipeline_key = %key, "pipeline created");
    Ok(Json(store.pipeline(&key)?.clone()))
}

async fn get_pipeline(
    State(db): State<Db>,
    Path(pipeline_key): Path<String>,
) -> ApiResult<Pipeline> {
    let store = db.read().await;
    store.pipeline(&pipeline_key).cloned().map(Json)
}

async fn edit_pipeline(
    State(db): State<Db>,
    Path(pipeline_key): Path<String>,
    Json(body): Json<Map<String, JsonValue>>,
) -> ApiResult<Pipeline> {
    let mut store = db.write().await;
    let pipeline = store
        .pipelines
        .get_mut(&pipeline_key)
        .ok_or_else(|| ApiError::not_found("Pipeline not found"))?;
    if let Some(name) = text(&body, "name") {
        pipeline.name = name.to_string();
    }
    if let Some(description) = text(&body, "description") {
        pipeline.description = description.to_string();
    }
    pipeline.last_updated_timestamp = now_millis();
    Ok(Json(pipeline.clone()))
}

async fn delete_pipeline(
    State(db): State<Db>,
    Path(pipeline_key): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let mut store = db.write().await;
    store
        .pipelines
        .remove(&pipeline_key)
        .ok_or_else(|| ApiError::not_found("Pipeline not found"))?;
    store.stages.remove(&pipeline_key);
    store.fields.remove(&pipeline_key);
    let orphaned: Vec<String> = store
        .boxes
        .values()
        .filter(|streak_box| streak_box.pipeline_key == pipeline_key)
        .map(|streak_box| streak_box.box_key.clone())
        .collect();
    for box_key in orphaned {
        store.boxes.remove(&box_key);
        store.values.remove(&box_key);
    }
    Ok(deleted())
}

// ---- boxes ----

async fn list_boxes(State(db): State<Db>) -> Json<Vec<StreakBox>> {
    let store = db.read().await;
    Json(store.boxes.values().cloned().collect())
}

async fn list_boxes_in_pipeline(
    State(db): State<Db>,
    Path(pipeline_key): Path<String>,
) -> ApiResult<Vec<StreakBox>> {
    let store = db.read().await;
    store.pipeline(&pipeline_key)?;
    Ok(Json(
        store
            .boxes
            .values()
            .filter(|streak_box| streak_box.pipeline_key == pipeline_key)
            .cloned()
            .collect(),
    ))
}

async fn create_box(
    State(db): State<Db>,
    Path(pipeline_key): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> ApiResult<StreakBox> {
    let name = required(&form, "name")?;
    let mut store = db.write().await;
    let first_stage = store
        .pipeline(&pipeline_key)?
        .stage_order
        .first()
        .cloned()
        .unwrap_or_default();
    let now = now_millis();
    let streak_box = StreakBox {
        box_key: new_key(),
        pipeline_key,
        name: name.to_string(),
        notes: form.get("notes").cloned().unwrap_or_default(),
        stage_key: form.get("stageKey").cloned().unwrap_or(first_stage),
        creator_key: store.me.user_key.clone(),
        creation_timestamp: now,
        last_updated_timestamp: now,
    };
    store
        .boxes
        .insert(streak_box.box_key.clone(), streak_box.clone());
    Ok(Json(streak_box))
}

async fn get_box(State(db): State<Db>, Path(box_key): Path<String>) -> ApiResult<StreakBox> {
    let store = db.read().await;
    store.streak_box(&box_key).cloned().map(Json)
}

async fn edit_box(
    State(db): State<Db>,
    Path(box_key): Path<String>,
    Json(body): Json<Map<String, JsonValue>>,
) -> ApiResult<StreakBox> {
    let mut store = db.write().await;
    let streak_box = store
        .boxes
        .get_mut(&box_key)
        .ok_or_else(|| ApiError::not_found("Box not found"))?;
    if let Some(name) = text(&body, "name") {
        streak_box.name = name.to_string();
    }
    if let Some(notes) = text(&body, "notes") {
        streak_box.notes = notes.to_string();
    }
    if let Some(stage_key) = text(&body, "stageKey") {
        streak_box.stage_key = stage_key.to_string();
    }
    streak_box.last_updated_timestamp = now_millis();
    Ok(Json(streak_box.clone()))
}

async fn delete_box(
    State(db): State<Db>,
    Path(box_key): Path<String>,
) -> Result<Json<JsonValue>, ApiError> {
    let mut store = db.write().await;
    store
        .boxes
        .remove(&box_key)
        .ok_or_else(|| ApiError::not_found("Box not found"))?;
    store.values.remove(&box_key);
    Ok(deleted())
}

// ---- stages ----

async fn list_stages(
    State(db): State<Db>,
    Path(pipeline_key): Path<String>,
) -> ApiResult<BTreeMap<String, Stage>> {
    let store = db.read().await;
    store.pipeline(&pipeline_key)?;
    Ok(Json(
        store.stages.get(&pipeline_key).cloned().unwrap_or_default(),
    ))
}

async fn create_stage(
    State(db): State<Db>,
    Path(pipeline_key): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> ApiResult<Stage> {
    let name = required(&form, "name")?;
    let mut store = db.write().await;
    store.pipeline(&pipeline_key)?;
    Ok(Json(store.add_stage(&pipeline_key, name)))
}

async fn get_stage(
    State(db): State<Db>,
    Path((pipeline_key, stage_key)): Path<(String, String)>,
) -> ApiResult<Stage> {
    let store = db.read().await;
    store
        .stages
        .get(&pipeline_key)
        .and_then(|stages| stages.get(&stage_key))
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Stage not found"))
}

async fn edit_stage(
    State(db): State<Db>,
    Path((pipeline_key, stage_key)): Path<(String, String)>,
    Json(body): Json<Map<String, JsonValue>>,
) -> ApiResult<Stage> {
    let mut store = db.write().await;
    let stage = store
        .stages
        .get_mut(&pipeline_key)
        .and_then(|stages| stages.get_mut(&stage_key))
        .ok_or_else(|| ApiError::not_found("Stage not found"))?;
    if let Some(name) = text(&body, "name") {
        stage.name = name.to_string();
    }
    Ok(Json(stage.clone()))
}

async fn delete_stage(
    State(db): State<Db>,
    Path((pipeline_key, stage_key)): Path<(String, String)>,
) -> Result<Json<JsonValue>, ApiError> {
    let mut store = db.write().await;
    store
        .stages
        .get_mut(&pipeline_key)
        .and_then(|stages| stages.remove(&stage_key))
        .ok_or_else(|| ApiError::not_found("Stage not found"))?;
    if let Some(pipeline) = store.pipelines.get_mut(&pipeline_key) {
        pipeline.stage_order.retain(|key| key != &stage_key);
    }
    Ok(deleted())
}

// ---- fields ----

async fn list_fields(
    State(db): State<Db>,
    Path(pipeline_key): Path<String>,
) -> ApiResult<Vec<Field>> {
    let store = db.read().await;
    store.pipeline(&pipeline_key)?;
    Ok(Json(
        store
            .fields
            .get(&pipeline_key)
            .map(|fields| fields.values().cloned().collect())
            .unwrap_or_default(),
    ))
}

async fn create_field(
    State(db): State<Db>,
    Path(pipeline_key): Path<String>,
    Form(form): Form<HashMap<String, String>>,
) -> ApiResult<Field> {
    let name = required(&form, "name")?;
    let field_type = required(&form, "type")?;
    let mut store = db.write().await;
    store.pipeline(&pipeline_key)?;
    let field = Field {
        key: store.next_field_key.to_string(),
        name: name.to_string(),
        field_type: field_type.to_string(),
    };
    store.next_field_key += 1;
    store
        .fields
        .entry(pipeline_key)
        .or_default()
        .insert(field.key.clone(), field.clone());
    Ok(Json(field))
}

async fn get_field(
    State(db): State<Db>,
    Path((pipeline_key, field_key)): Path<(String, String)>,
) -> ApiResult<Field> {
    let store = db.read().await;
    store
        .fields
        .get(&pipeline_key)
        .and_then(|fields| fields.get(&field_key))
        .cloned()
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Field not found"))
}

async fn edit_field(
    State(db): State<Db>,
    Path((pipeline_key, field_key)): Path<(String, String)>,
    Json(body): Json<Map<String, JsonValue>>,
) -> ApiResult<Field> {
    let mut store = db.write().await;
    let field = store
        .fields
        .get_mut(&pipeline_key)
        .and_then(|fields| fields.get_mut(&field_key))
        .ok_or_else(|| ApiError::not_found("Field not found"))?;
    if let Some(name) = text(&body, "name") {
        field.name = name.to_string();
    }
    Ok(Json(field.clone()))
}

async fn delete_field(
    State(db): State<Db>,
    Path((pipeline_key, field_key)): Path<(String, String)>,
) -> Result<Json<JsonValue>, ApiError> {
    let mut store = db.write().await;
    store
        .fields
        .get_mut(&pipeline_key)
        .and_then(|fields| fields.remove(&field_key))
        .ok_or_else(|| ApiError::not_found("Field not found"))?;
    for values in store.values.values_mut() {
        values.remove(&field_key);
    }
    Ok(deleted())
}

// ---- box field values ----

async fn list_box_values(
    State(db): State<Db>,
    Path(box_key): Path<String>,
) -> ApiResult<Vec<FieldValue>> {
    let store = db.read().await;
    store.streak_box(&box_key)?;
    Ok(Json(
        store
            .values
            .get(&box_key)
            .map(|values| {
                values
                    .iter()
                    .map(|(key, value)| FieldValue {
                        key: key.clone(),
                        value: value.clone(),
                    })
                    .collect()
            })
            .unwrap_or_default(),
    ))
}

async fn get_box_value(
    State(db): State<Db>,
    Path((box_key, field_key)): Path<(String, String)>,
) -> ApiResult<FieldValue> {
    let store = db.read().await;
    store.box_field(&box_key, &field_key)?;
    let value = store
        .values
        .get(&box_key)
        .and_then(|values| values.get(&field_key))
        .cloned()
        .unwrap_or_else(|| JsonValue::String(String::new()));
    Ok(Json(FieldValue {
        key: field_key,
        value,
    }))
}

async fn edit_box_value(
    State(db): State<Db>,
    Path((box_key, field_key)): Path<(String, String)>,
    Json(input): Json<EditValue>,
) -> ApiResult<FieldValue> {
    let mut store = db.write().await;
    store.box_field(&box_key, &field_key)?;
    store
        .values
        .entry(box_key)
        .or_default()
        .insert(field_key.clone(), input.value.clone());
    Ok(Json(FieldValue {
        key: field_key,
        value: input.value,
    }))
}
