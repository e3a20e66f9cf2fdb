//! Unified error type for the ledger and connection workflows.
//!
//! Every operation returns [`Result`]. Store failures coming out of `sea-orm` are
//! classified on conversion so callers can tell a retryable conflict apart from an
//! unreachable database.

use crate::entities::ConnectionStatus;
use sea_orm::{DbErr, RuntimeErr};
use thiserror::Error;

/// All failures surfaced by the crate.
#[derive(Debug, Error)]
pub enum Error {
    /// Caller supplied a malformed or out-of-range value. Not retryable.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// What was wrong with the input
        message: String,
    },

    /// A concurrent commit invalidated what this operation read. Safe to retry from scratch.
    #[error("Transaction conflict on {resource}")]
    TransactionConflict {
        /// The record or stream that was contended
        resource: String,
    },

    /// The farmer and dealer already have an approved connection.
    #[error("Farmer {farmer_uid} is already connected to dealer {dealer_uid}")]
    AlreadyConnected {
        /// Farmer side of the pair
        farmer_uid: String,
        /// Dealer side of the pair
        dealer_uid: String,
    },

    /// A pending request already exists for the pair.
    #[error("Connection request {connection_id} is already pending")]
    RequestAlreadyPending {
        /// The pending connection
        connection_id: i64,
    },

    /// The dealer's plan does not allow another approved farmer.
    #[error("Dealer {dealer_uid} has reached the limit of {limit} connected farmers")]
    CapacityExceeded {
        /// The dealer at capacity
        dealer_uid: String,
        /// Maximum approved farmers allowed by the dealer's plan
        limit: u32,
    },

    /// The connection is not in a state that allows the requested transition.
    #[error("Connection {connection_id} is {status:?}, expected Pending")]
    InvalidState {
        /// The connection being resolved
        connection_id: i64,
        /// Its status at transaction time
        status: ConnectionStatus,
    },

    /// A referenced record does not exist.
    #[error("{entity} not found: {id}")]
    NotFound {
        /// Kind of record (e.g. `"user"`, `"connection"`)
        entity: &'static str,
        /// The id that was looked up
        id: String,
    },

    /// The backing store could not be reached.
    #[error("Storage unavailable: {message}")]
    StorageUnavailable {
        /// Underlying driver message
        message: String,
    },

    /// Any other store failure (constraint, decoding, query errors).
    #[error("Database error: {0}")]
    Database(DbErr),

    /// Configuration could not be loaded or is invalid.
    #[error("Configuration error: {message}")]
    Config {
        /// Description of the problem
        message: String,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Environment variable error
    #[error("Environment variable error: {0}")]
    EnvVar(#[from] std::env::VarError),
}

impl Error {
    /// Shorthand for [`Error::InvalidArgument`].
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Shorthand for [`Error::NotFound`].
    pub fn not_found(entity: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            entity,
            id: id.to_string(),
        }
    }

    /// Whether re-running the whole operation may succeed without the caller changing anything.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::TransactionConflict { .. })
    }
}

impl From<DbErr> for Error {
    fn from(err: DbErr) -> Self {
        match err {
            // Another writer holds the lock or our snapshot went stale.
            err if sqlite_code(&err).is_some_and(is_busy_code) => Self::TransactionConflict {
                resource: err.to_string(),
            },
            DbErr::ConnectionAcquire(_) | DbErr::Conn(_) => Self::StorageUnavailable {
                message: err.to_string(),
            },
            err => Self::Database(err),
        }
    }
}

/// Extended `SQLite` result code reported by the driver, if any.
fn sqlite_code(err: &DbErr) -> Option<i32> {
    let (DbErr::Conn(runtime) | DbErr::Exec(runtime) | DbErr::Query(runtime)) = err else {
        return None;
    };
    match runtime {
        RuntimeErr::SqlxError(sqlx_err) => sqlx_err.as_database_error()?.code()?.parse().ok(),
        _ => None,
    }
}

/// `SQLITE_BUSY` (5) or `SQLITE_LOCKED` (6), including extended codes such as
/// `SQLITE_BUSY_SNAPSHOT` (517).
const fn is_busy_code(code: i32) -> bool {
    matches!(code & 0xff, 5 | 6)
}

/// Convenience `Result` type
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;
    use sea_orm::ConnAcquireErr;

    #[test]
    fn test_connection_errors_are_storage_unavailable() {
        let err: Error = DbErr::ConnectionAcquire(ConnAcquireErr::Timeout).into();
        assert!(matches!(err, Error::StorageUnavailable { .. }));
        assert!(!err.is_retryable());

        let err: Error = DbErr::Conn(RuntimeErr::Internal("refused".to_string())).into();
        assert!(matches!(err, Error::StorageUnavailable { .. }));
    }

    #[test]
    fn test_busy_codes() {
        // SQLITE_BUSY, SQLITE_LOCKED, SQLITE_BUSY_SNAPSHOT, SQLITE_LOCKED_SHAREDCACHE
        for code in [5, 6, 517, 262] {
            assert!(is_busy_code(code), "{code} should be busy");
        }
        // SQLITE_CONSTRAINT_UNIQUE, SQLITE_CONSTRAINT_PRIMARYKEY, SQLITE_ERROR
        for code in [2067, 1555, 1] {
            assert!(!is_busy_code(code), "{code} should not be busy");
        }
    }

    #[test]
    fn test_lock_message_without_code_is_not_a_conflict() {
        let err: Error =
            DbErr::Exec(RuntimeErr::Internal("database is locked".to_string())).into();
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_other_errors_pass_through() {
        let err: Error = DbErr::RecordNotFound("ledger_entries".to_string()).into();
        assert!(matches!(err, Error::Database(_)));
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_domain_rejections_are_not_retryable() {
        assert!(!Error::invalid_argument("bad").is_retryable());
        assert!(
            !Error::AlreadyConnected {
                farmer_uid: "f".to_string(),
                dealer_uid: "d".to_string(),
            }
            .is_retryable()
        );
        assert!(!Error::not_found("user", "u1").is_retryable());
    }
}
