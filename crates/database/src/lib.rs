//! SQLite persistence layer for the knowledge base service.
//!
//! This crate provides async database operations for accounts, teams, API
//! keys and knowledge bases (with their shares, tags and settings) using
//! SQLx with SQLite.
//!
//! Functions that act on behalf of a user never decide visibility on their
//! own; they go through [`access::authorize`] or the listing functions in
//! [`knowledge_base`], which share one visibility predicate.
//!
//! # Example
//!
//! ```no_run
//! use database::{access, knowledge_base, user, Database};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Connect and run migrations
//!     let db = Database::connect("sqlite:knowledge.db?mode=rwc").await?;
//!     db.migrate().await?;
//!
//!     let owner = user::create_user(
//!         db.pool(),
//!         &user::NewUser {
//!             email: "alice@example.com".to_string(),
//!             password_hash: "<argon2 hash>".to_string(),
//!             ..Default::default()
//!         },
//!     )
//!     .await?;
//!
//!     let kb = knowledge_base::create_knowledge_base(
//!         db.pool(),
//!         &owner.id,
//!         &knowledge_base::NewKnowledgeBase {
//!             name: "Handbook".to_string(),
//!             ..Default::default()
//!         },
//!     )
//!     .await?;
//!
//!     access::authorize(db.pool(), &kb.id, &owner.id, access::Access::Owner).await?;
//!     Ok(())
//! }
//! ```

pub mod access;
pub mod api_key;
pub mod document;
pub mod error;
pub mod knowledge_base;
pub mod models;
pub mod secret;
pub mod session;
pub mod settings;
pub mod share;
pub mod stats;
pub mod tag;
pub mod team;
pub mod user;
pub mod user_profile;
pub mod validation;

pub use access::Access;
pub use error::{DatabaseError, Result};
pub use models::{
    ApiKey, Document, IssuedApiKey, KnowledgeBase, KnowledgeBaseSettings, KnowledgeBaseShare,
    KnowledgeBaseStatus, KnowledgeBaseTag, Lifecycle, SearchMode, SharePermission, Team,
    TeamMember, TeamRole, User, UserProfile,
};
pub use validation::{PasswordPolicy, ValidationError};

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::str::FromStr;

/// Database connection wrapper.
#[derive(Debug, Clone)]
pub struct Database {
    pool: SqlitePool,
}

impl Database {
    /// Default pool size for database connections.
    const DEFAULT_POOL_SIZE: u32 = 20;

    /// Connect to a SQLite database.
    ///
    /// The URL should be in the format `sqlite:path/to/db.sqlite?mode=rwc`.
    /// Use `?mode=rwc` to create the database file if it doesn't exist.
    ///
    /// # Example
    ///
    /// ```no_run
    /// # async fn example() -> database::Result<()> {
    /// // File database
    /// let db = database::Database::connect("sqlite:data/knowledge.db?mode=rwc").await?;
    ///
    /// // In-memory database (for testing)
    /// let db = database::Database::connect_with_pool_size("sqlite::memory:", 1).await?;
    /// # Ok(())
    /// # }
    /// ```
    pub async fn connect(url: &str) -> Result<Self> {
        Self::connect_with_pool_size(url, Self::DEFAULT_POOL_SIZE).await
    }

    /// Connect to a SQLite database with a custom pool size.
    ///
    /// Foreign keys are enforced on every connection; deleting a user or a
    /// knowledge base cascades to the rows that hang off it.
    pub async fn connect_with_pool_size(url: &str, pool_size: u32) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(pool_size)
            .acquire_timeout(std::time::Duration::from_secs(30))
            .connect_with(options)
            .await?;

        tracing::info!(
            "Connected to database: {} (pool size: {})",
            url,
            pool_size
        );

        Ok(Self { pool })
    }

    /// Run database migrations.
    ///
    /// This should be called once after connecting to ensure the schema is up to date.
    pub async fn migrate(&self) -> Result<()> {
        tracing::info!("Running database migrations...");

        sqlx::migrate!("./migrations").run(&self.pool).await?;

        tracing::info!("Migrations complete");
        Ok(())
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Close the database connection pool.
    pub async fn close(&self) {
        self.pool.close().await;
    }
}

/// A migrated in-memory database.
///
/// Each in-memory connection is its own database, so the pool is pinned to a
/// single connection.
#[cfg(test)]
pub(crate) async fn test_db() -> Database {
    let db = Database::connect_with_pool_size("sqlite::memory:", 1)
        .await
        .unwrap();
    db.migrate().await.unwrap();
    db
}
