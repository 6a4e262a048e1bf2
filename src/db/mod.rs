//! Database layer (Firestore).

pub mod firestore;

pub use firestore::FirestoreDb;

/// Collection names as constants.
pub mod collections {
    /// Session documents (keyed by session_id)
    pub const SESSIONS: &str = "sessions";
}
