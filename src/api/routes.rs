use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    routing::{get, post, put},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::api::health::{HealthSnapshot, HealthState};
use crate::bus::{BusPayload, EventBus, Topic};
use crate::config::session_path;
use crate::error::AppError;
use crate::session::{normalize_code, SessionResolver, StaticIdentity};
use crate::state::{MatchVerdict, PitchLog};
use crate::store::DocumentStore;
use crate::types::{BatterSide, PitchCall, PitchEvent, PitchSummary, SessionDocument, SessionEvent};

#[derive(Clone)]
pub struct ApiState {
    pub store: Arc<dyn DocumentStore>,
    pub bus: Arc<EventBus>,
    pub pitch_log: Arc<PitchLog>,
    pub resolver: Arc<SessionResolver>,
    pub health: Arc<HealthState>,
    pub identity: Arc<StaticIdentity>,
}

pub fn router(state: ApiState) -> Router {
    Router::new()
        .route("/health", get(get_health))
        .route("/events/:topic", post(post_event))
        .route("/sessions", post(post_session))
        .route("/sessions/join", post(post_join))
        .route("/identity", put(put_identity).delete(delete_identity))
        .route("/games/:game_id/call", put(put_call).delete(delete_call))
        .route("/games/:game_id/pitches", post(post_pitch).get(get_pitches))
        .route("/games/:game_id/summary", get(get_summary))
        .with_state(state)
}

// ---------------------------------------------------------------------------
// Request types
// ---------------------------------------------------------------------------

#[derive(Deserialize)]
pub struct JoinRequest {
    pub code: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub user_id: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SeedSessionRequest {
    pub code: String,
    #[serde(flatten)]
    pub session: SessionDocument,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordPitchRequest {
    pub pitch: String,
    pub location: String,
    pub is_strike: bool,
    pub batter_side: BatterSide,
}

// ---------------------------------------------------------------------------
// Response types
// ---------------------------------------------------------------------------

#[derive(Serialize)]
pub struct PublishResponse {
    pub topic: &'static str,
    pub subscribers: usize,
}

#[derive(Serialize)]
pub struct RecordedPitchResponse {
    pub event: PitchEvent,
    pub verdict: MatchVerdict,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SummaryResponse {
    #[serde(flatten)]
    pub summary: PitchSummary,
    pub strike_success_rate: u32,
    pub ball_success_rate: u32,
}

impl From<PitchSummary> for SummaryResponse {
    fn from(summary: PitchSummary) -> Self {
        Self {
            strike_success_rate: summary.strike_success_rate(),
            ball_success_rate: summary.ball_success_rate(),
            summary,
        }
    }
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

async fn get_health(State(state): State<ApiState>) -> Json<HealthSnapshot> {
    Json(state.health.snapshot(
        state.resolver.is_observing(),
        state.bus.subscriber_count(Topic::GameOrSessionChosen),
        state.pitch_log.game_count(),
    ))
}

/// Accepts the loosely-typed payload shape the apps publish.
async fn post_event(
    State(state): State<ApiState>,
    Path(topic): Path<String>,
    Json(body): Json<serde_json::Value>,
) -> Result<(StatusCode, Json<PublishResponse>), AppError> {
    let topic = Topic::from_name(&topic)
        .ok_or_else(|| AppError::NotFound(format!("unknown topic '{topic}'")))?;

    let payload = match topic {
        Topic::GameOrSessionChosen => {
            let fields = body
                .as_object()
                .ok_or_else(|| AppError::BadRequest("payload must be a JSON object".to_string()))?;
            BusPayload::Session(SessionEvent::from_fields(fields))
        }
        _ => BusPayload::Notice(body),
    };

    let subscribers = state.bus.publish(topic, payload);
    Ok((StatusCode::ACCEPTED, Json(PublishResponse { topic: topic.as_str(), subscribers })))
}

/// Code validation happens in the resolver; this only puts the request on the bus.
async fn post_join(
    State(state): State<ApiState>,
    Json(req): Json<JoinRequest>,
) -> (StatusCode, Json<PublishResponse>) {
    let topic = Topic::GameOrSessionChosen;
    let subscribers = state
        .bus
        .publish(topic, BusPayload::Session(SessionEvent::code(req.code)));
    (StatusCode::ACCEPTED, Json(PublishResponse { topic: topic.as_str(), subscribers }))
}

async fn put_identity(
    State(state): State<ApiState>,
    Json(req): Json<SignInRequest>,
) -> Result<StatusCode, AppError> {
    let user_id = req.user_id.trim();
    if user_id.is_empty() {
        return Err(AppError::BadRequest("userId must not be empty".to_string()));
    }
    state.identity.sign_in(user_id);
    info!(user_id = %user_id, "signed in");
    Ok(StatusCode::NO_CONTENT)
}

async fn delete_identity(State(state): State<ApiState>) -> StatusCode {
    state.identity.sign_out();
    info!("signed out");
    StatusCode::NO_CONTENT
}

async fn post_session(
    State(state): State<ApiState>,
    Json(req): Json<SeedSessionRequest>,
) -> Result<StatusCode, AppError> {
    let code = normalize_code(&req.code)
        .ok_or_else(|| AppError::BadRequest(format!("'{}' is not a 6-digit code", req.code)))?;

    let document = match serde_json::to_value(&req.session)? {
        serde_json::Value::Object(map) => map,
        _ => return Err(AppError::BadRequest("session must be a JSON object".to_string())),
    };
    state.store.put(&session_path(&code), document).await?;
    info!(code = %code, "session document stored");
    Ok(StatusCode::CREATED)
}

async fn put_call(
    State(state): State<ApiState>,
    Path(game_id): Path<String>,
    Json(call): Json<PitchCall>,
) -> StatusCode {
    state.pitch_log.set_call(&game_id, call);
    StatusCode::NO_CONTENT
}

async fn delete_call(
    State(state): State<ApiState>,
    Path(game_id): Path<String>,
) -> Result<Json<PitchCall>, AppError> {
    state
        .pitch_log
        .clear_call(&game_id)
        .map(Json)
        .ok_or_else(|| AppError::NotFound(format!("no call in effect for game {game_id}")))
}

async fn post_pitch(
    State(state): State<ApiState>,
    Path(game_id): Path<String>,
    Json(req): Json<RecordPitchRequest>,
) -> (StatusCode, Json<RecordedPitchResponse>) {
    let (event, verdict) = state.pitch_log.record_pitch(
        &game_id,
        req.pitch,
        req.location,
        req.is_strike,
        req.batter_side,
    );
    (StatusCode::CREATED, Json(RecordedPitchResponse { event, verdict }))
}

async fn get_pitches(
    State(state): State<ApiState>,
    Path(game_id): Path<String>,
) -> Json<Vec<PitchEvent>> {
    Json(state.pitch_log.events(&game_id))
}

async fn get_summary(
    State(state): State<ApiState>,
    Path(game_id): Path<String>,
) -> Json<Vec<SummaryResponse>> {
    let summaries = state
        .pitch_log
        .summary(&game_id)
        .into_iter()
        .map(SummaryResponse::from)
        .collect();
    Json(summaries)
}
