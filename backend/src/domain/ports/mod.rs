//! Domain ports and supporting types for the hexagonal boundary.
//!
//! Ports describe how the dispatch core expects to reach driven adapters
//! (the database, the bug report channel). Each trait exposes a typed error
//! so adapters map their failures into predictable variants.

mod macros;
pub(crate) use macros::define_port_error;

mod bug_reporter;
mod credential_repository;
mod mapping_repository;
mod migration_runner;
mod panel_repository;
mod record_store;
mod role_repository;
mod session_repository;
mod table_version_repository;
mod user_repository;

#[cfg(test)]
pub use bug_reporter::MockBugReporter;
pub use bug_reporter::{BugReporter, BugReporterError, CollectingBugReporter};
pub use credential_repository::{
    CredentialRepository, CredentialRepositoryError, InMemoryCredentialRepository,
    PasswordRewrite,
};
#[cfg(test)]
pub use mapping_repository::MockMappingRepository;
pub use mapping_repository::{
    FixtureMappingRepository, MappingRepository, MappingRepositoryError,
};
#[cfg(test)]
pub use migration_runner::MockMigrationRunner;
pub use migration_runner::{MigrationRunner, MigrationRunnerError, RecordingMigrationRunner};
#[cfg(test)]
pub use panel_repository::MockPanelRepository;
pub use panel_repository::{FixturePanelRepository, PanelRepository, PanelRepositoryError};
#[cfg(test)]
pub use record_store::MockRecordStore;
pub use record_store::{InMemoryRecordStore, InMemoryTable, RecordStore, RecordStoreError};
#[cfg(test)]
pub use role_repository::MockRoleRepository;
pub use role_repository::{
    FixtureRoleRepository, RoleRepository, RoleRepositoryError, check_containment,
};
#[cfg(test)]
pub use session_repository::MockSessionRepository;
pub use session_repository::{
    InMemorySessionRepository, SessionRepository, SessionRepositoryError,
};
#[cfg(test)]
pub use table_version_repository::MockTableVersionRepository;
pub use table_version_repository::{
    FixtureTableVersionRepository, TableVersionRepository, TableVersionRepositoryError,
};
#[cfg(test)]
pub use user_repository::MockUserRepository;
pub use user_repository::{FixtureUserRepository, UserRepository, UserRepositoryError};
