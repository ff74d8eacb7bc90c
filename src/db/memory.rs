use super::{Storage, StoreResult, Write, WriteBatch};
use crate::domain::models::{
    AchievementDefinition, AchievementUnlock, Challenge, ChallengeCompletion, ChallengeId,
    MoodRecord, ProgressionState, WeeklyEnrollment,
};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::NaiveDate;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
struct Tables {
    moods: BTreeMap<(Uuid, NaiveDate), MoodRecord>,
    progression: HashMap<Uuid, ProgressionState>,
    completions: Vec<ChallengeCompletion>,
    enrollments: Vec<WeeklyEnrollment>,
    unlocks: Vec<AchievementUnlock>,
    catalog: Vec<Challenge>,
    achievement_defs: Vec<AchievementDefinition>,
}

/// Process-local store. Batches are applied under one write lock after
/// every write has been checked, so a failed batch leaves nothing behind.
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    offline: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_catalog(challenges: Vec<Challenge>, achievement_defs: Vec<AchievementDefinition>) -> Self {
        Self {
            tables: RwLock::new(Tables {
                catalog: challenges,
                achievement_defs,
                ..Default::default()
            }),
            offline: AtomicBool::new(false),
        }
    }

    /// Rolls expired weekly windows in the held catalog forward to `today`.
    pub async fn roll_weekly_windows(&self, today: NaiveDate) -> usize {
        let mut tables = self.tables.write().await;
        super::seed::roll_expired_windows(&mut tables.catalog, today)
    }

    /// Simulates an outage: every call fails with `Unavailable` until reset.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    fn check_online(&self) -> StoreResult<()> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".into()));
        }
        Ok(())
    }
}

fn check_write(tables: &Tables, write: &Write) -> StoreResult<()> {
    match write {
        Write::Progression {
            state,
            expected_version,
        } => {
            let current = tables
                .progression
                .get(&state.user_id)
                .map(|p| p.version)
                .unwrap_or(0);
            if current != *expected_version {
                return Err(StoreError::Conflict(format!(
                    "progression for {} is at version {}, expected {}",
                    state.user_id, current, expected_version
                )));
            }
        }
        Write::Completion(c) => {
            let duplicate = tables.completions.iter().any(|existing| {
                existing.user_id == c.user_id
                    && existing.challenge_id == c.challenge_id
                    && existing.completion_date == c.completion_date
            });
            if duplicate {
                return Err(StoreError::Conflict(format!(
                    "completion of {} on {} already stored",
                    c.challenge_id, c.completion_date
                )));
            }
        }
        Write::MoodRecord(_) | Write::Enrollment(_) | Write::Unlock(_) => {}
    }
    Ok(())
}

fn apply_write(tables: &mut Tables, write: Write) {
    match write {
        Write::MoodRecord(record) => {
            tables.moods.insert((record.user_id, record.date), record);
        }
        Write::Progression { state, .. } => {
            tables.progression.insert(state.user_id, state);
        }
        Write::Completion(completion) => tables.completions.push(completion),
        Write::Enrollment(enrollment) => {
            match tables.enrollments.iter_mut().find(|e| e.id == enrollment.id) {
                Some(existing) => *existing = enrollment,
                None => tables.enrollments.push(enrollment),
            }
        }
        Write::Unlock(unlock) => tables.unlocks.push(unlock),
    }
}

#[async_trait]
impl Storage for MemoryStore {
    async fn get_mood_records(&self, user_id: Uuid, since: NaiveDate) -> StoreResult<Vec<MoodRecord>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables
            .moods
            .range((user_id, since)..=(user_id, NaiveDate::MAX))
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn get_mood_record(&self, user_id: Uuid, date: NaiveDate) -> StoreResult<Option<MoodRecord>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables.moods.get(&(user_id, date)).cloned())
    }

    async fn count_mood_records(&self, user_id: Uuid) -> StoreResult<u64> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables.moods.keys().filter(|(uid, _)| *uid == user_id).count() as u64)
    }

    async fn get_progression(&self, user_id: Uuid) -> StoreResult<Option<ProgressionState>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables.progression.get(&user_id).cloned())
    }

    async fn get_completions(&self, user_id: Uuid) -> StoreResult<Vec<ChallengeCompletion>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables
            .completions
            .iter()
            .filter(|c| c.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn get_enrollments(
        &self,
        user_id: Uuid,
        challenge_id: ChallengeId,
    ) -> StoreResult<Vec<WeeklyEnrollment>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        let mut enrollments: Vec<WeeklyEnrollment> = tables
            .enrollments
            .iter()
            .filter(|e| e.user_id == user_id && e.challenge_id == challenge_id)
            .cloned()
            .collect();
        enrollments.sort_by_key(|e| e.attempt);
        Ok(enrollments)
    }

    async fn get_catalog(&self) -> StoreResult<Vec<Challenge>> {
        self.check_online()?;
        Ok(self.tables.read().await.catalog.clone())
    }

    async fn get_achievement_defs(&self) -> StoreResult<Vec<AchievementDefinition>> {
        self.check_online()?;
        Ok(self.tables.read().await.achievement_defs.clone())
    }

    async fn get_unlocks(&self, user_id: Uuid) -> StoreResult<Vec<AchievementUnlock>> {
        self.check_online()?;
        let tables = self.tables.read().await;
        Ok(tables
            .unlocks
            .iter()
            .filter(|u| u.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        self.check_online()?;
        let mut tables = self.tables.write().await;
        for write in &batch.writes {
            check_write(&tables, write)?;
        }
        let count = batch.writes.len();
        for write in batch.writes {
            apply_write(&mut tables, write);
        }
        tracing::debug!("Applied {} writes for user {}", count, batch.user_id);
        Ok(())
    }
}
