// SPDX-License-Identifier: MIT

//! Runfeed: a scheduling feed for group activity sessions.
//!
//! This crate provides the backend API for creating sessions, listing the
//! feed, and letting named participants join until capacity is reached.

pub mod config;
pub mod db;
pub mod error;
pub mod middleware;
pub mod models;
pub mod routes;
pub mod time_utils;

use config::Config;
use db::FirestoreDb;

/// Shared application state.
pub struct AppState {
    pub config: Config,
    pub db: FirestoreDb,
}
