pub mod memory;
pub mod postgres;
pub mod seed;

use crate::domain::models::{
    AchievementDefinition, AchievementUnlock, Challenge, ChallengeCompletion, ChallengeId,
    MoodRecord, ProgressionState, WeeklyEnrollment,
};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::NaiveDate;
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

pub type StoreResult<T> = Result<T, StoreError>;

/// One write inside an atomic batch.
#[derive(Debug, Clone)]
pub enum Write {
    /// Insert, or replace the record with the same `(user_id, date)`.
    MoodRecord(MoodRecord),
    /// Compare-and-set: `expected_version` must match the stored row
    /// (0 = the row must not exist yet). The stored version becomes
    /// `state.version`.
    Progression {
        state: ProgressionState,
        expected_version: i64,
    },
    Completion(ChallengeCompletion),
    /// Insert, or replace the enrollment with the same id.
    Enrollment(WeeklyEnrollment),
    Unlock(AchievementUnlock),
}

#[derive(Debug, Clone)]
pub struct WriteBatch {
    pub user_id: Uuid,
    pub writes: Vec<Write>,
}

impl WriteBatch {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            writes: Vec::new(),
        }
    }

    pub fn put_mood_record(&mut self, record: MoodRecord) -> &mut Self {
        self.writes.push(Write::MoodRecord(record));
        self
    }

    /// Bumps the version of `state` past `expected_version` and queues it.
    pub fn put_progression(&mut self, mut state: ProgressionState, expected_version: i64) -> &mut Self {
        state.version = expected_version + 1;
        self.writes.push(Write::Progression {
            state,
            expected_version,
        });
        self
    }

    pub fn put_completion(&mut self, completion: ChallengeCompletion) -> &mut Self {
        self.writes.push(Write::Completion(completion));
        self
    }

    pub fn put_enrollment(&mut self, enrollment: WeeklyEnrollment) -> &mut Self {
        self.writes.push(Write::Enrollment(enrollment));
        self
    }

    pub fn put_unlocks(&mut self, unlocks: impl IntoIterator<Item = AchievementUnlock>) -> &mut Self {
        self.writes.extend(unlocks.into_iter().map(Write::Unlock));
        self
    }
}

/// Storage collaborator. Reads must be strongly consistent per user and
/// `apply` must persist all writes of a batch or none of them.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Records dated on or after `since`, oldest first.
    async fn get_mood_records(&self, user_id: Uuid, since: NaiveDate) -> StoreResult<Vec<MoodRecord>>;
    async fn get_mood_record(&self, user_id: Uuid, date: NaiveDate) -> StoreResult<Option<MoodRecord>>;
    async fn count_mood_records(&self, user_id: Uuid) -> StoreResult<u64>;
    async fn get_progression(&self, user_id: Uuid) -> StoreResult<Option<ProgressionState>>;
    async fn get_completions(&self, user_id: Uuid) -> StoreResult<Vec<ChallengeCompletion>>;
    /// All enrollments of the user in one weekly challenge, oldest attempt first.
    async fn get_enrollments(
        &self,
        user_id: Uuid,
        challenge_id: ChallengeId,
    ) -> StoreResult<Vec<WeeklyEnrollment>>;
    async fn get_catalog(&self) -> StoreResult<Vec<Challenge>>;
    async fn get_achievement_defs(&self) -> StoreResult<Vec<AchievementDefinition>>;
    async fn get_unlocks(&self, user_id: Uuid) -> StoreResult<Vec<AchievementUnlock>>;
    async fn apply(&self, batch: WriteBatch) -> StoreResult<()>;
}
