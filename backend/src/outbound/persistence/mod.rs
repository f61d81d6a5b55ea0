//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Repositories translate between Diesel row structs (`models.rs`, private)
//! and domain types. Connections come from a bb8 pool through
//! `diesel-async`; the schema is kept in sync by embedded migrations.
//!
//! ```ignore
//! use cervello::outbound::persistence::{DbPool, DieselUserRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/cervello")).await?;
//! let users = DieselUserRepository::new(pool);
//! ```

mod diesel_preferences_repository;
mod diesel_query_repository;
mod diesel_source_repository;
mod diesel_user_repository;
mod error_mapping;
mod migrations;
mod models;
mod pool;
mod schema;

pub use diesel_preferences_repository::DieselPreferencesRepository;
pub use diesel_query_repository::DieselQueryRepository;
pub use diesel_source_repository::DieselSourceRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use migrations::{MIGRATIONS, MigrationError, run_pending_migrations};
pub use pool::{DbPool, PoolConfig, PoolError};
