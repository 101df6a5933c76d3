use std::{net::SocketAddr, str::FromStr, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, patch, post},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::{
    Actor, EntryId, EntryPatch, ErrorKind, OwnerId, OwnerSettings, ProgrammeEngine,
    ProgrammeEntry, ProgrammeError, Recalculation, RegisteredItem, Relationship, SplitPolicy,
    SplitSummary,
};

pub const ACTOR_ID_HEADER: &str = "x-actor-id";
pub const ACTOR_NAME_HEADER: &str = "x-actor-name";

#[derive(Clone)]
pub struct AppState {
    engine: Arc<ProgrammeEngine>,
}

impl AppState {
    pub fn new(engine: ProgrammeEngine) -> Self {
        Self {
            engine: Arc::new(engine),
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody<'a> {
    error: &'a str,
    message: String,
}

#[derive(Debug)]
enum ApiError {
    Engine(ProgrammeError),
    Invalid(String),
}

impl ApiError {
    fn invalid(message: impl Into<String>) -> Self {
        ApiError::Invalid(message.into())
    }
}

impl From<ProgrammeError> for ApiError {
    fn from(value: ProgrammeError) -> Self {
        ApiError::Engine(value)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error, message) = match self {
            ApiError::Engine(err) => {
                let kind = err.kind();
                let status = match kind {
                    ErrorKind::NotFound => StatusCode::NOT_FOUND,
                    ErrorKind::PreconditionFailed => StatusCode::PRECONDITION_FAILED,
                    ErrorKind::ValidationFailed => StatusCode::BAD_REQUEST,
                    ErrorKind::Persistence => {
                        tracing::error!(error = %err, "store failure");
                        StatusCode::INTERNAL_SERVER_ERROR
                    }
                };
                (status, kind.as_str(), err.to_string())
            }
            ApiError::Invalid(message) => (StatusCode::BAD_REQUEST, "invalid_request", message),
        };
        (status, Json(ErrorBody { error, message })).into_response()
    }
}

/// Entry as submitted by clients; ids are assigned when omitted and the owner
/// comes from the path.
#[derive(Debug, Deserialize)]
struct EntryInput {
    #[serde(default)]
    id: Option<EntryId>,
    group_key: String,
    #[serde(default)]
    pour_label: Option<String>,
    sequence_order: i32,
    cycle_days: u32,
    #[serde(default)]
    predecessor_sequence_order: Option<i32>,
    #[serde(default)]
    relationship: Option<Relationship>,
    #[serde(default)]
    manual_start_date: Option<NaiveDate>,
    #[serde(default)]
    manual_end_date: Option<NaiveDate>,
    #[serde(default)]
    estimated_start_date: Option<NaiveDate>,
    #[serde(default)]
    estimated_end_date: Option<NaiveDate>,
    #[serde(default)]
    notes: Option<String>,
}

impl EntryInput {
    fn into_entry(self, owner_id: &OwnerId) -> ProgrammeEntry {
        let mut entry = ProgrammeEntry::new(
            owner_id.clone(),
            self.group_key,
            self.sequence_order,
            self.cycle_days,
        );
        if let Some(id) = self.id {
            entry.id = id;
        }
        entry.pour_label = self.pour_label;
        entry.predecessor_sequence_order = self.predecessor_sequence_order;
        entry.relationship = self.relationship;
        entry.manual_start_date = self.manual_start_date;
        entry.manual_end_date = self.manual_end_date;
        entry.estimated_start_date = self.estimated_start_date;
        entry.estimated_end_date = self.estimated_end_date;
        entry.notes = self.notes;
        entry
    }
}

#[derive(Debug, Default, Deserialize)]
struct SplitRequest {
    #[serde(default)]
    parts: Option<u32>,
    #[serde(default)]
    sizes: Option<Vec<u32>>,
}

impl SplitRequest {
    fn policy(self) -> SplitPolicy {
        match (self.sizes, self.parts) {
            (Some(sizes), _) => SplitPolicy::Sizes { sizes },
            (None, Some(parts)) => SplitPolicy::Even { parts },
            (None, None) => SplitPolicy::default(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct SplitManyRequest {
    entry_ids: Vec<EntryId>,
    #[serde(flatten)]
    split: SplitRequest,
}

#[derive(Debug, Deserialize)]
struct ReorderRequest {
    ids: Vec<EntryId>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route(
            "/owners/:owner/settings",
            get(get_settings).put(put_settings),
        )
        .route("/owners/:owner/items", post(register_items))
        .route("/owners/:owner/entries", get(list_entries).put(save_entries))
        .route("/owners/:owner/generate", post(generate))
        .route("/owners/:owner/build", post(build))
        .route("/owners/:owner/recalculate", post(recalculate))
        .route("/owners/:owner/reorder", post(reorder))
        .route("/owners/:owner/split", post(split_many))
        .route(
            "/owners/:owner/entries/:id",
            patch(patch_entry).delete(delete_entry),
        )
        .route("/owners/:owner/entries/:id/split", post(split_entry))
        .with_state(state)
}

pub async fn serve(addr: SocketAddr, engine: ProgrammeEngine) -> std::io::Result<()> {
    let app = router(AppState::new(engine));
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "programme engine HTTP API listening");
    axum::serve(listener, app).await
}

fn actor(headers: &HeaderMap) -> Actor {
    let header = |name: &str| {
        headers
            .get(name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    };
    match header(ACTOR_ID_HEADER) {
        Some(id) => {
            let name = header(ACTOR_NAME_HEADER).unwrap_or_else(|| id.clone());
            Actor::new(id, name)
        }
        None => Actor::system(),
    }
}

fn parse_entry_id(raw: &str) -> Result<EntryId, ApiError> {
    EntryId::from_str(raw).map_err(|err| ApiError::invalid(format!("invalid entry id '{raw}': {err}")))
}

async fn health() -> impl IntoResponse {
    Json(json!({ "status": "ok" }))
}

async fn get_settings(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<OwnerSettings>, ApiError> {
    let settings = state.engine.owner_settings(&OwnerId::new(owner))?;
    Ok(Json(settings))
}

async fn put_settings(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(settings): Json<OwnerSettings>,
) -> Result<Json<OwnerSettings>, ApiError> {
    let owner_id = OwnerId::new(owner);
    if settings.owner_id != owner_id {
        return Err(ApiError::invalid(format!(
            "settings are for owner {}, not {owner_id}",
            settings.owner_id
        )));
    }
    state.engine.save_settings(&settings)?;
    Ok(Json(settings))
}

async fn register_items(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    Json(items): Json<Vec<RegisteredItem>>,
) -> Result<StatusCode, ApiError> {
    state.engine.register_items(&OwnerId::new(owner), &items)?;
    Ok(StatusCode::NO_CONTENT)
}

async fn list_entries(
    State(state): State<AppState>,
    Path(owner): Path<String>,
) -> Result<Json<Vec<ProgrammeEntry>>, ApiError> {
    Ok(Json(state.engine.entries(&OwnerId::new(owner))?))
}

async fn save_entries(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    headers: HeaderMap,
    Json(inputs): Json<Vec<EntryInput>>,
) -> Result<Json<Vec<ProgrammeEntry>>, ApiError> {
    let owner_id = OwnerId::new(owner);
    let entries = inputs
        .into_iter()
        .map(|input| input.into_entry(&owner_id))
        .collect();
    let stored = state
        .engine
        .save_programme(&owner_id, entries, &actor(&headers))?;
    Ok(Json(stored))
}

async fn generate(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProgrammeEntry>>, ApiError> {
    let entries = state
        .engine
        .generate_from_settings(&OwnerId::new(owner), &actor(&headers))?;
    Ok(Json(entries))
}

async fn build(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProgrammeEntry>>, ApiError> {
    let entries = state
        .engine
        .build_from_registered_items(&OwnerId::new(owner), &actor(&headers))?;
    Ok(Json(entries))
}

async fn recalculate(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Recalculation>, ApiError> {
    let result = state
        .engine
        .recalculate(&OwnerId::new(owner), &actor(&headers))?;
    Ok(Json(result))
}

async fn reorder(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<ReorderRequest>,
) -> Result<Json<Vec<ProgrammeEntry>>, ApiError> {
    let entries = state
        .engine
        .reorder(&OwnerId::new(owner), &payload.ids, &actor(&headers))?;
    Ok(Json(entries))
}

async fn split_entry(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(payload): Json<SplitRequest>,
) -> Result<Json<Vec<ProgrammeEntry>>, ApiError> {
    let entry_id = parse_entry_id(&id)?;
    let entries = state.engine.split(
        &OwnerId::new(owner),
        entry_id,
        &payload.policy(),
        &actor(&headers),
    )?;
    Ok(Json(entries))
}

async fn split_many(
    State(state): State<AppState>,
    Path(owner): Path<String>,
    headers: HeaderMap,
    Json(payload): Json<SplitManyRequest>,
) -> Result<Json<SplitSummary>, ApiError> {
    let summary = state.engine.split_many(
        &OwnerId::new(owner),
        &payload.entry_ids,
        &payload.split.policy(),
        &actor(&headers),
    )?;
    Ok(Json(summary))
}

async fn patch_entry(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
    headers: HeaderMap,
    Json(patch): Json<EntryPatch>,
) -> Result<Json<ProgrammeEntry>, ApiError> {
    let entry_id = parse_entry_id(&id)?;
    let entry = state
        .engine
        .patch(&OwnerId::new(owner), entry_id, &patch, &actor(&headers))?;
    Ok(Json(entry))
}

async fn delete_entry(
    State(state): State<AppState>,
    Path((owner, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<Vec<ProgrammeEntry>>, ApiError> {
    let entry_id = parse_entry_id(&id)?;
    let entries = state
        .engine
        .delete(&OwnerId::new(owner), entry_id, &actor(&headers))?;
    Ok(Json(entries))
}
