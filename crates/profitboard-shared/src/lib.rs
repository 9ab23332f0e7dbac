//! # profitboard-shared
//!
//! Domain types and pure logic shared by the Profitboard store and server:
//! submission validation, the approval state machine, the admin decision
//! table and leaderboard aggregation. Nothing in here performs I/O.

pub mod auth;
pub mod constants;
pub mod error;
pub mod leaderboard;
pub mod submission;
pub mod types;

pub use error::{DomainError, FieldError};
pub use types::*;
