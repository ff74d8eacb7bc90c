use crate::domain::models::ChallengeId;
use chrono::NaiveDate;

/// Every failure the engine reports to its callers.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error(transparent)]
    Conflict(#[from] ConflictError),
    #[error(transparent)]
    NotFound(#[from] NotFoundError),
    #[error("storage unavailable: {0}")]
    StorageUnavailable(String),
}

impl EngineError {
    /// Only storage outages are worth retrying; everything else is final.
    pub fn is_retryable(&self) -> bool {
        matches!(self, EngineError::StorageUnavailable(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            EngineError::Validation(_) => "validation",
            EngineError::Conflict(_) => "conflict",
            EngineError::NotFound(_) => "not_found",
            EngineError::StorageUnavailable(_) => "storage_unavailable",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("{field} must be between 1 and 5, got {value}")]
    OutOfRange { field: &'static str, value: i32 },
    #[error("date {date} must fall between {earliest} and {today}")]
    InvalidDate {
        date: NaiveDate,
        earliest: NaiveDate,
        today: NaiveDate,
    },
    #[error("date {date} is outside the challenge window {start}..={end}")]
    OutOfWindow {
        date: NaiveDate,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("notes are limited to {max} characters, got {len}")]
    NotesTooLong { max: usize, len: usize },
    #[error("challenge {challenge_id} is not a {expected} challenge")]
    ChallengeKindMismatch {
        challenge_id: ChallengeId,
        expected: &'static str,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConflictError {
    #[error("a mood record for {date} already exists; edit its notes instead")]
    DuplicateRecord { date: NaiveDate },
    #[error("challenge {challenge_id} was already completed on {date}")]
    AlreadyCompleted {
        challenge_id: ChallengeId,
        date: NaiveDate,
    },
    #[error("already enrolled in weekly challenge {challenge_id}")]
    AlreadyEnrolled { challenge_id: ChallengeId },
    #[error("weekly challenge {challenge_id} already has a completion on {date}")]
    AlreadyCompletedToday {
        challenge_id: ChallengeId,
        date: NaiveDate,
    },
    #[error("weekly challenge {challenge_id} is already finished")]
    EnrollmentCompleted { challenge_id: ChallengeId },
    #[error("progression changed concurrently: {0}")]
    ConcurrentUpdate(String),
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NotFoundError {
    #[error("challenge {0} is not in the active catalog")]
    UnknownChallenge(ChallengeId),
    #[error("not enrolled in weekly challenge {0}")]
    NotEnrolled(ChallengeId),
    #[error("no mood record for {0}")]
    MoodRecord(NaiveDate),
}

/// Failures reported by a storage collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("storage unavailable: {0}")]
    Unavailable(String),
    #[error("write conflict: {0}")]
    Conflict(String),
    #[error("corrupt row: {0}")]
    Corrupt(String),
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Unavailable(msg) => EngineError::StorageUnavailable(msg),
            StoreError::Conflict(msg) => EngineError::Conflict(ConflictError::ConcurrentUpdate(msg)),
            StoreError::Corrupt(msg) => {
                tracing::error!("Storage returned an unreadable row: {}", msg);
                EngineError::StorageUnavailable(msg)
            }
        }
    }
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) if db.code().as_deref() == Some("23505") => {
                StoreError::Conflict(db.message().to_string())
            }
            e @ (sqlx::Error::ColumnDecode { .. }
            | sqlx::Error::Decode(_)
            | sqlx::Error::ColumnNotFound(_)) => StoreError::Corrupt(e.to_string()),
            other => StoreError::Unavailable(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_only_storage_errors_are_retryable() {
        assert!(EngineError::StorageUnavailable("timeout".into()).is_retryable());
        let conflict: EngineError = ConflictError::AlreadyEnrolled { challenge_id: 3 }.into();
        assert!(!conflict.is_retryable());
        assert_eq!(conflict.kind(), "conflict");
    }

    #[test]
    fn test_store_conflict_maps_to_engine_conflict() {
        let err: EngineError = StoreError::Conflict("version mismatch".into()).into();
        assert!(matches!(
            err,
            EngineError::Conflict(ConflictError::ConcurrentUpdate(_))
        ));
    }
}
