// SPDX-License-Identifier: MIT

//! Session feed routes: create, list, fetch, and join.

use crate::db::FirestoreDb;
use crate::error::{AppError, Result};
use crate::models::{ActivityType, Session, SessionStatus};
use crate::AppState;
use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::{DateTime, Utc};
use futures_util::{stream, StreamExt};
use ring::rand::{SecureRandom, SystemRandom};
use serde::Deserialize;
use std::sync::Arc;

const MAX_CONCURRENT_DB_OPS: usize = 50;

/// Session feed routes.
///
/// The literal `/create` path is registered alongside `/{session_id}`;
/// axum matches literal segments before captures, so the create route is
/// never swallowed by the id pattern.
pub fn routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/", get(list_sessions))
        .route("/create", post(create_session))
        .route("/{session_id}", get(get_session))
        .route("/{session_id}/join", post(join_session))
}

// ─── Create ──────────────────────────────────────────────────

/// A JSON number or a numeric string.
///
/// Clients send `duration` and `maxParticipants` both ways, so both are
/// accepted and coerced.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum NumberOrString {
    Int(i64),
    Float(f64),
    Text(String),
}

impl NumberOrString {
    fn as_i64(&self) -> Option<i64> {
        match self {
            NumberOrString::Int(n) => Some(*n),
            NumberOrString::Float(f) => Some(*f as i64),
            NumberOrString::Text(s) => {
                let trimmed = s.trim();
                trimmed
                    .parse::<i64>()
                    .ok()
                    .or_else(|| trimmed.parse::<f64>().ok().map(|f| f as i64))
            }
        }
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct CreateSessionRequest {
    start_time: Option<String>,
    duration: Option<NumberOrString>,
    max_participants: Option<NumberOrString>,
    activity_type: Option<String>,
}

fn parse_start_time(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| {
            AppError::BadRequest("Invalid 'startTime': must be RFC3339 datetime".to_string())
        })
}

/// Generate an opaque session id: 8 random bytes, hex-encoded.
///
/// 64 bits of entropy makes collisions a non-issue at this scale, and the
/// id doubles as the Firestore document id so a collision could only
/// overwrite, never duplicate.
fn generate_session_id() -> Result<String> {
    let mut bytes = [0u8; 8];
    SystemRandom::new()
        .fill(&mut bytes)
        .map_err(|_| AppError::Internal(anyhow::anyhow!("Failed to generate session id")))?;
    Ok(hex::encode(bytes))
}

/// Create a new session.
async fn create_session(
    State(state): State<Arc<AppState>>,
    Json(req): Json<CreateSessionRequest>,
) -> Result<Json<Session>> {
    let (Some(start_raw), Some(duration_raw), Some(max_raw)) =
        (&req.start_time, &req.duration, &req.max_participants)
    else {
        return Err(AppError::BadRequest(
            "Please provide startTime, duration, and maxParticipants".to_string(),
        ));
    };

    let start_time = parse_start_time(start_raw)?;
    let duration = duration_raw
        .as_i64()
        .ok_or_else(|| AppError::BadRequest("Invalid 'duration': must be a number".to_string()))?;
    let max_participants = max_raw.as_i64().ok_or_else(|| {
        AppError::BadRequest("Invalid 'maxParticipants': must be a number".to_string())
    })?;

    let now = Utc::now();
    let session = Session {
        session_id: generate_session_id()?,
        activity_type: ActivityType::normalize(req.activity_type.as_deref()),
        start_time,
        duration,
        max_participants,
        participants: Vec::new(),
        status: SessionStatus::derive(start_time, duration, now),
        created_at: now,
    };

    state.db.upsert_session(&session).await?;

    tracing::info!(
        session_id = %session.session_id,
        activity_type = ?session.activity_type,
        start_time = %crate::time_utils::format_utc_rfc3339(session.start_time),
        "Session created"
    );

    Ok(Json(session))
}

// ─── Read ────────────────────────────────────────────────────

/// Recompute the cached status and persist it if it went stale.
///
/// Concurrent refreshes race harmlessly: both write the same pure
/// function of time.
async fn refresh_status(db: &FirestoreDb, mut session: Session) -> Result<Session> {
    let derived = session.derived_status(Utc::now());
    if derived != session.status {
        tracing::debug!(
            session_id = %session.session_id,
            from = ?session.status,
            to = ?derived,
            "Refreshing stale session status"
        );
        session.status = derived;
        db.upsert_session(&session).await?;
    }
    Ok(session)
}

/// List all sessions, sorted ascending by start time.
async fn list_sessions(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Session>>> {
    let sessions = state.db.list_sessions().await?;

    // Refresh stale statuses concurrently; `buffered` keeps the feed order.
    let refreshed = stream::iter(sessions)
        .map(|session| refresh_status(&state.db, session))
        .buffered(MAX_CONCURRENT_DB_OPS)
        .collect::<Vec<Result<Session>>>()
        .await
        .into_iter()
        .collect::<Result<Vec<Session>>>()?;

    Ok(Json(refreshed))
}

/// Get a session by id, refreshing its cached status.
async fn get_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
) -> Result<Json<Session>> {
    let session = state
        .db
        .get_session(&session_id)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("Session {} not found", session_id)))?;

    let session = refresh_status(&state.db, session).await?;
    Ok(Json(session))
}

// ─── Join ────────────────────────────────────────────────────

#[derive(Deserialize)]
struct JoinSessionRequest {
    name: Option<String>,
}

/// Join a session by name.
///
/// The name presence check happens here; the status, capacity, and
/// duplicate checks run inside a Firestore transaction in the db layer.
async fn join_session(
    State(state): State<Arc<AppState>>,
    Path(session_id): Path<String>,
    Json(req): Json<JoinSessionRequest>,
) -> Result<Json<Session>> {
    let Some(name) = req.name.filter(|n| !n.is_empty()) else {
        return Err(AppError::BadRequest("Name is required".to_string()));
    };

    let session = state.db.join_session(&session_id, &name).await?;
    Ok(Json(session))
}
