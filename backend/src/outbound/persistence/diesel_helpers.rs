//! Shared error mapping for the Diesel adapters.
//!
//! Every port error carries a `Connection` and a `Query` variant; the
//! [`PortFailure`] trait lets one pair of mapping functions serve them all.

use tracing::debug;

use crate::domain::ports::{
    CredentialRepositoryError, MappingRepositoryError, MigrationRunnerError,
    PanelRepositoryError, RecordStoreError, RoleRepositoryError, SessionRepositoryError,
    TableVersionRepositoryError, UserRepositoryError,
};

use super::pool::PoolError;

/// Port errors with connection and query flavours.
pub(crate) trait PortFailure: Sized {
    fn connection_failure(message: String) -> Self;
    fn query_failure(message: String) -> Self;
}

macro_rules! port_failure {
    ($($error:ident),* $(,)?) => {
        $(
            impl PortFailure for $error {
                fn connection_failure(message: String) -> Self {
                    Self::connection(message)
                }

                fn query_failure(message: String) -> Self {
                    Self::query(message)
                }
            }
        )*
    };
}

port_failure!(
    MappingRepositoryError,
    PanelRepositoryError,
    UserRepositoryError,
    RoleRepositoryError,
    SessionRepositoryError,
    TableVersionRepositoryError,
    RecordStoreError,
    CredentialRepositoryError,
);

/// Map a pool failure to the port's connection error.
pub(crate) fn map_pool_error<E: PortFailure>(error: PoolError) -> E {
    match error {
        PoolError::Checkout { message } | PoolError::Build { message } => {
            E::connection_failure(message)
        }
    }
}

/// Map a Diesel failure to the port's error, logging the raw cause.
pub(crate) fn map_diesel_error<E: PortFailure>(error: diesel::result::Error) -> E {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match error {
        DieselError::DatabaseError(DatabaseErrorKind::ClosedConnection, info) => {
            debug!(message = info.message(), "database connection closed");
            E::connection_failure("database connection error".to_owned())
        }
        DieselError::DatabaseError(kind, info) => {
            debug!(?kind, message = info.message(), "diesel operation failed");
            E::query_failure(info.message().to_owned())
        }
        other => {
            debug!(error = %other, "diesel operation failed");
            E::query_failure(other.to_string())
        }
    }
}

/// Record store writes keep the database's own wording for constraint
/// violations so integrity matchers can parse it.
pub(crate) fn map_record_error(error: diesel::result::Error) -> RecordStoreError {
    use diesel::result::{DatabaseErrorKind, Error as DieselError};

    match error {
        DieselError::DatabaseError(
            DatabaseErrorKind::UniqueViolation
            | DatabaseErrorKind::ForeignKeyViolation
            | DatabaseErrorKind::NotNullViolation
            | DatabaseErrorKind::CheckViolation,
            info,
        ) => {
            debug!(message = info.message(), "constraint violation");
            RecordStoreError::constraint(info.message())
        }
        other => map_diesel_error(other),
    }
}

/// Migration scripts fail as a whole; the version points at the culprit.
pub(crate) fn map_script_error(version: u32, error: &diesel::result::Error) -> MigrationRunnerError {
    debug!(version, error = %error, "upgrade script failed");
    MigrationRunnerError::script(version, error.to_string())
}
