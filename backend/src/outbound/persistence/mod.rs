//! PostgreSQL persistence adapters using Diesel ORM.
//!
//! Concrete implementations of the domain ports backed by PostgreSQL via
//! `diesel-async` and `bb8` connection pooling.
//!
//! - **Thin adapters**: implementations only translate between rows and
//!   domain types.
//! - **Internal models**: row structs (`models.rs`) and table definitions
//!   (`schema.rs`) never leave this module.
//! - **Typed errors**: database failures map to each port's error enum.
//!
//! # Example
//!
//! ```ignore
//! use wiking::outbound::persistence::{DbPool, DieselMappingRepository, PoolConfig};
//!
//! let pool = DbPool::new(PoolConfig::new("postgres://localhost/wiking")).await?;
//! let mappings = DieselMappingRepository::new(pool);
//! ```

mod diesel_credential_repository;
pub(crate) mod diesel_helpers;
mod diesel_mapping_repository;
mod diesel_migration_runner;
mod diesel_panel_repository;
mod diesel_record_store;
mod diesel_role_repository;
mod diesel_session_repository;
mod diesel_table_version_repository;
mod diesel_user_repository;
mod models;
mod pool;
mod schema;

pub use diesel_credential_repository::DieselCredentialRepository;
pub use diesel_mapping_repository::DieselMappingRepository;
pub use diesel_migration_runner::DieselMigrationRunner;
pub use diesel_panel_repository::DieselPanelRepository;
pub use diesel_record_store::DieselRecordStore;
pub use diesel_role_repository::DieselRoleRepository;
pub use diesel_session_repository::DieselSessionRepository;
pub use diesel_table_version_repository::DieselTableVersionRepository;
pub use diesel_user_repository::DieselUserRepository;
pub use pool::{DbPool, PoolConfig, PoolError};
