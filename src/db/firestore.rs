// SPDX-License-Identifier: MIT

//! Firestore client wrapper with typed operations.
//!
//! Provides high-level operations for session documents:
//! - point lookup and upsert by session id
//! - feed listing ordered by start time
//! - transactional join (capacity and duplicate checks are atomic)

use crate::db::collections;
use crate::error::AppError;
use crate::models::{Participant, Session, SessionStatus};

/// Firestore database client.
#[derive(Clone)]
pub struct FirestoreDb {
    client: Option<firestore::FirestoreDb>,
}

impl FirestoreDb {
    /// Create a new Firestore client.
    ///
    /// For local development with emulator, set FIRESTORE_EMULATOR_HOST.
    pub async fn new(project_id: &str) -> Result<Self, AppError> {
        // If the emulator environment variable is set, use unauthenticated connection
        // to avoid local credential warnings and leakage.
        if std::env::var("FIRESTORE_EMULATOR_HOST").is_ok() {
            return Self::create_emulator_client(project_id).await;
        }

        let client = firestore::FirestoreDb::new(project_id)
            .await
            .map_err(|e| AppError::Database(format!("Failed to connect to Firestore: {}", e)))?;

        tracing::info!(project = project_id, "Connected to Firestore");

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a Firestore client for the emulator with unauthenticated access.
    async fn create_emulator_client(project_id: &str) -> Result<Self, AppError> {
        tracing::info!("Using unauthenticated connection for Firestore Emulator");

        // Use ExternalJwtFunctionSource to provide a dummy token without needing
        // a custom TokenSource implementation struct.
        let token_source = gcloud_sdk::ExternalJwtFunctionSource::new(|| async {
            Ok(gcloud_sdk::Token {
                token_type: "Bearer".to_string(),
                token: gcloud_sdk::SecretValue::new(
                    "eyJhbGciOiJub25lIn0.eyJ1aWQiOiJ0ZXN0In0."
                        .to_string()
                        .into(),
                ),
                expiry: chrono::Utc::now() + chrono::Duration::hours(1),
            })
        });

        let options = firestore::FirestoreDbOptions::new(project_id.to_string());

        let client = firestore::FirestoreDb::with_options_token_source(
            options,
            gcloud_sdk::GCP_DEFAULT_SCOPES.clone(),
            gcloud_sdk::TokenSourceType::ExternalSource(Box::new(token_source)),
        )
        .await
        .map_err(|e| {
            AppError::Database(format!("Failed to connect to Firestore Emulator: {}", e))
        })?;

        tracing::info!(
            project = project_id,
            "Connected to Firestore (Emulator/Unauthenticated)"
        );

        Ok(Self {
            client: Some(client),
        })
    }

    /// Create a mock Firestore client for testing (offline mode).
    ///
    /// All database operations will return an error if called.
    pub fn new_mock() -> Self {
        Self { client: None }
    }

    /// Helper to get the client or return an error if offline.
    fn get_client(&self) -> Result<&firestore::FirestoreDb, AppError> {
        self.client
            .as_ref()
            .ok_or_else(|| AppError::Database("Database not connected (offline mode)".to_string()))
    }

    // ─── Session Operations ──────────────────────────────────────

    /// Get a session by its id.
    pub async fn get_session(&self, session_id: &str) -> Result<Option<Session>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .by_id_in(collections::SESSIONS)
            .obj()
            .one(session_id)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    /// Create or update a session document.
    ///
    /// Keying the document by session_id makes the id unique by
    /// construction: a colliding create would overwrite, never duplicate.
    pub async fn upsert_session(&self, session: &Session) -> Result<(), AppError> {
        let _: () = self
            .get_client()?
            .fluent()
            .update()
            .in_col(collections::SESSIONS)
            .document_id(&session.session_id)
            .object(session)
            .execute()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;
        Ok(())
    }

    /// List all sessions, ordered ascending by start time.
    ///
    /// No filtering or pagination: the feed is the whole collection.
    pub async fn list_sessions(&self) -> Result<Vec<Session>, AppError> {
        self.get_client()?
            .fluent()
            .select()
            .from(collections::SESSIONS)
            .order_by([("startTime", firestore::FirestoreQueryDirection::Ascending)])
            .obj()
            .query()
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    // ─── Transactional Join ──────────────────────────────────────

    /// Atomically join a session: re-check status, capacity, and duplicate
    /// name against a fresh snapshot, then append the participant.
    ///
    /// Uses `run_transaction`, which scopes the session read to the
    /// transaction (registering the document for conflict detection) and
    /// retries with backoff when a concurrent commit aborts ours. Two
    /// concurrent joins therefore cannot both pass the checks: the loser
    /// re-runs against the committed document and is rejected there.
    ///
    /// Business rejections are returned inside the transaction outcome so
    /// they commit nothing and are never retried.
    ///
    /// Returns the updated session on success.
    pub async fn join_session(&self, session_id: &str, name: &str) -> Result<Session, AppError> {
        let now = chrono::Utc::now();
        let session_id = session_id.to_string();
        let name = name.to_string();

        let outcome: Result<Session, AppError> = self
            .get_client()?
            .run_transaction(|db, transaction| {
                let session_id = session_id.clone();
                let name = name.clone();
                Box::pin(async move {
                    // `db` carries the transaction's consistency selector,
                    // so this read joins the transaction's read set.
                    let current: Option<Session> = db
                        .fluent()
                        .select()
                        .by_id_in(collections::SESSIONS)
                        .obj()
                        .one(&session_id)
                        .await?;

                    let Some(mut session) = current else {
                        return Ok(Err(AppError::NotFound(format!(
                            "Session {} not found",
                            session_id
                        ))));
                    };

                    // Joins are only accepted while the session is still
                    // scheduled, judged by the derived status, not the
                    // possibly-stale stored one.
                    if session.derived_status(now) != SessionStatus::Scheduled {
                        return Ok(Err(AppError::Forbidden(
                            "Session already started".to_string(),
                        )));
                    }

                    if session.is_full() {
                        return Ok(Err(AppError::Forbidden(
                            "Participant limit reached".to_string(),
                        )));
                    }

                    if session.has_participant(&name) {
                        return Ok(Err(AppError::BadRequest(
                            "Name already joined".to_string(),
                        )));
                    }

                    session.participants.push(Participant {
                        name,
                        joined_at: now,
                    });

                    db.fluent()
                        .update()
                        .in_col(collections::SESSIONS)
                        .document_id(&session.session_id)
                        .object(&session)
                        .add_to_transaction(transaction)?;

                    Ok(Ok(session))
                })
            })
            .await
            .map_err(|e| AppError::Database(format!("Join transaction failed: {}", e)))?;

        let session = outcome?;

        tracing::info!(
            session_id = %session.session_id,
            participant = %session.participants.last().map(|p| p.name.as_str()).unwrap_or_default(),
            count = session.participants.len(),
            "Participant joined session"
        );

        Ok(session)
    }
}
