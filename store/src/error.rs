use sqlx::error::ErrorKind;

use crate::repositories::EntityId;

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("{entity} {} not found", describe_id(.id))]
    NotFound {
        entity: &'static str,
        id: Option<EntityId>,
    },
    #[error("constraint violated: {message}")]
    ConstraintViolation {
        constraint: Option<String>,
        message: String,
    },
    #[error("storage unavailable: {0}")]
    StorageUnavailable(#[source] sqlx::Error),
    #[error("storage backend error: {0}")]
    Backend(#[source] sqlx::Error),
}

fn describe_id(id: &Option<EntityId>) -> String {
    id.map_or_else(|| "without id".into(), |id| id.to_string())
}

impl RepositoryError {
    pub fn not_found(entity: &'static str, id: Option<EntityId>) -> Self {
        Self::NotFound { entity, id }
    }

    /// True only for transport failures.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::StorageUnavailable(_))
    }
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => match db.kind() {
                ErrorKind::UniqueViolation
                | ErrorKind::ForeignKeyViolation
                | ErrorKind::NotNullViolation
                | ErrorKind::CheckViolation => Self::ConstraintViolation {
                    constraint: db.constraint().map(str::to_owned),
                    message: db.message().to_owned(),
                },
                _ => Self::Backend(sqlx::Error::Database(db)),
            },
            err @ (sqlx::Error::Io(_)
            | sqlx::Error::Tls(_)
            | sqlx::Error::Protocol(_)
            | sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::WorkerCrashed) => Self::StorageUnavailable(err),
            err => Self::Backend(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io;

    use super::*;

    #[test]
    fn transport_failures_are_retryable() {
        let errors = [
            sqlx::Error::Io(io::Error::new(io::ErrorKind::ConnectionRefused, "refused")),
            sqlx::Error::Protocol("unexpected message".into()),
            sqlx::Error::PoolTimedOut,
            sqlx::Error::PoolClosed,
            sqlx::Error::WorkerCrashed,
        ];

        for err in errors {
            let err = RepositoryError::from(err);
            assert!(
                matches!(err, RepositoryError::StorageUnavailable(_)),
                "{err:?}"
            );
            assert!(err.is_retryable());
        }
    }

    #[test]
    fn other_failures_are_backend_errors() {
        let err = RepositoryError::from(sqlx::Error::ColumnNotFound("email".into()));
        assert!(matches!(err, RepositoryError::Backend(_)));
        assert!(!err.is_retryable());

        let err = RepositoryError::from(sqlx::Error::RowNotFound);
        assert!(matches!(err, RepositoryError::Backend(_)));
    }

    #[test]
    fn not_found_names_the_missing_id() {
        let err = RepositoryError::not_found("student", Some(42));
        assert_eq!(err.to_string(), "student 42 not found");
        assert!(!err.is_retryable());

        let err = RepositoryError::not_found("student", None);
        assert_eq!(err.to_string(), "student without id not found");
    }
}
