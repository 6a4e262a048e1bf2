// SPDX-License-Identifier: MIT

//! Session and participant models for storage and API.
//!
//! The serialized (camelCase) shape doubles as the Firestore document
//! shape and the JSON wire format:
//! `{sessionId, activityType, startTime, duration, maxParticipants,
//!   participants, status, createdAt}`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Kind of group activity. Unrecognized input coerces to `Run`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Run,
    Gym,
    Sport,
    Other,
}

impl ActivityType {
    /// Normalize a raw client value: case-insensitive match against the
    /// fixed set; anything missing or unrecognized becomes `Run`.
    pub fn normalize(raw: Option<&str>) -> Self {
        match raw.map(str::to_lowercase).as_deref() {
            Some("gym") => ActivityType::Gym,
            Some("sport") => ActivityType::Sport,
            Some("other") => ActivityType::Other,
            _ => ActivityType::Run,
        }
    }
}

/// Lifecycle status derived from wall-clock time.
///
/// The stored value is a lazily-refreshed cache, not a source of truth:
/// every read recomputes it and rewrites the document if it went stale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Scheduled,
    Active,
    Completed,
}

impl SessionStatus {
    /// Pure derivation of status from `(start_time, duration, now)`.
    ///
    /// The three statuses partition time into contiguous intervals with
    /// boundaries at `start_time` and `start_time + duration` minutes.
    ///
    /// Durations are stored unchecked, so the end time may not be
    /// representable: a positive overflow means the session never ends
    /// (`Active` once started), a negative one that it ended before it
    /// began (`Completed`).
    pub fn derive(
        start_time: DateTime<Utc>,
        duration_minutes: i64,
        now: DateTime<Utc>,
    ) -> Self {
        if now < start_time {
            return SessionStatus::Scheduled;
        }

        let end_time = Duration::try_minutes(duration_minutes)
            .and_then(|d| start_time.checked_add_signed(d));

        match end_time {
            Some(end) if now < end => SessionStatus::Active,
            Some(_) => SessionStatus::Completed,
            None if duration_minutes > 0 => SessionStatus::Active,
            None => SessionStatus::Completed,
        }
    }
}

/// A named entrant in a session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Participant {
    /// Free-text name, unique within one session (case-sensitive)
    pub name: String,
    /// When the participant joined
    #[serde(with = "crate::time_utils::rfc3339")]
    pub joined_at: DateTime<Utc>,
}

/// Session document stored in Firestore, keyed by `session_id`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Opaque random id (also used as document ID)
    pub session_id: String,
    /// Kind of activity
    pub activity_type: ActivityType,
    /// Scheduled start
    #[serde(with = "crate::time_utils::rfc3339")]
    pub start_time: DateTime<Utc>,
    /// Duration in minutes
    pub duration: i64,
    /// Participant capacity
    pub max_participants: i64,
    /// Entrants in arrival order, append-only
    pub participants: Vec<Participant>,
    /// Cached derived status
    pub status: SessionStatus,
    /// When the session was created
    #[serde(with = "crate::time_utils::rfc3339")]
    pub created_at: DateTime<Utc>,
}

impl Session {
    /// Recompute status against the current clock.
    pub fn derived_status(&self, now: DateTime<Utc>) -> SessionStatus {
        SessionStatus::derive(self.start_time, self.duration, now)
    }

    /// Whether the participant list is at (or past) capacity.
    pub fn is_full(&self) -> bool {
        self.participants.len() as i64 >= self.max_participants
    }

    /// Whether a participant with this exact name already joined.
    pub fn has_participant(&self, name: &str) -> bool {
        self.participants.iter().any(|p| p.name == name)
    }
}
