//! # profitboard-store
//!
//! Persistent storage for profiles and submissions, backed by SQLite.
//!
//! The crate exposes a synchronous `Database` handle that wraps a
//! `rusqlite::Connection` and provides typed CRUD helpers for every domain
//! model. Callers on an async runtime share it behind a mutex.

pub mod database;
pub mod migrations;
pub mod models;
pub mod profiles;
pub mod submissions;

mod columns;
mod error;

pub use database::Database;
pub use error::{Result, StoreError};
pub use models::*;
