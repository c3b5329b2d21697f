//! Application state shared across handlers.

use database::Database;

use crate::password::Passwords;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Database connection.
    pub db: Database,
    /// Password hashing and policy.
    pub passwords: Passwords,
}

impl AppState {
    /// Create new application state.
    pub fn new(db: Database, passwords: Passwords) -> Self {
        Self { db, passwords }
    }
}
