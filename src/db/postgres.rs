use super::{Storage, StoreResult, Write, WriteBatch};
use crate::domain::models::{
    AchievementCriteria, AchievementDefinition, AchievementUnlock, Challenge, ChallengeCompletion,
    ChallengeId, ChallengeKind, ChallengeType, MoodRecord, ProgressionState, WeeklyEnrollment,
    WeeklyTerms,
};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Postgres, Row, Transaction};
use uuid::Uuid;

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unsigned<T: TryFrom<i64>>(value: i64, column: &str) -> StoreResult<T> {
    T::try_from(value).map_err(|_| StoreError::Corrupt(format!("{column} = {value} is out of range")))
}

fn challenge_type(raw: &str) -> StoreResult<ChallengeType> {
    ChallengeType::try_from(raw).map_err(|_| StoreError::Corrupt(format!("unknown challenge type '{raw}'")))
}

fn mood_from_row(row: &PgRow) -> StoreResult<MoodRecord> {
    Ok(MoodRecord {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        date: row.try_get("date")?,
        mood_rating: unsigned(row.try_get::<i16, _>("mood_rating")?.into(), "mood_rating")?,
        energy_level: unsigned(row.try_get::<i16, _>("energy_level")?.into(), "energy_level")?,
        anxiety_level: unsigned(row.try_get::<i16, _>("anxiety_level")?.into(), "anxiety_level")?,
        sleep_quality: unsigned(row.try_get::<i16, _>("sleep_quality")?.into(), "sleep_quality")?,
        activities: row.try_get::<Vec<String>, _>("activities")?,
        triggers: row.try_get::<Vec<String>, _>("triggers")?,
        notes: row.try_get::<Option<String>, _>("notes")?,
        created_at: row.try_get::<DateTime<Utc>, _>("created_at")?,
    })
}

fn optional_u32(row: &PgRow, column: &str) -> StoreResult<Option<u32>> {
    row.try_get::<Option<i32>, _>(column)?
        .map(|v| unsigned(v.into(), column))
        .transpose()
}

fn challenge_from_row(row: &PgRow) -> StoreResult<Challenge> {
    let variant: String = row.try_get("variant")?;
    let points_reward: u32 = unsigned(row.try_get::<i32, _>("points_reward")?.into(), "points_reward")?;
    let kind = match variant.as_str() {
        "daily" => ChallengeKind::Daily { points_reward },
        "weekly" => {
            let start_date: Option<NaiveDate> = row.try_get("start_date")?;
            let end_date: Option<NaiveDate> = row.try_get("end_date")?;
            let (Some(start_date), Some(end_date)) = (start_date, end_date) else {
                return Err(StoreError::Corrupt("weekly challenge without a window".into()));
            };
            ChallengeKind::Weekly(WeeklyTerms {
                points_per_day: points_reward,
                bonus_points: unsigned(row.try_get::<i32, _>("bonus_points")?.into(), "bonus_points")?,
                target_days: unsigned(row.try_get::<i32, _>("target_days")?.into(), "target_days")?,
                start_date,
                end_date,
                is_repeatable: row.try_get("is_repeatable")?,
            })
        }
        other => return Err(StoreError::Corrupt(format!("unknown challenge variant '{other}'"))),
    };

    Ok(Challenge {
        id: row.try_get("id")?,
        title: row.try_get("title")?,
        description: row.try_get("description")?,
        challenge_type: challenge_type(&row.try_get::<String, _>("challenge_type")?)?,
        instructions: row.try_get("instructions")?,
        duration_minutes: optional_u32(row, "duration_minutes")?,
        target_value: optional_u32(row, "target_value")?,
        is_active: row.try_get("is_active")?,
        kind,
    })
}

fn completion_from_row(row: &PgRow) -> StoreResult<ChallengeCompletion> {
    Ok(ChallengeCompletion {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        challenge_id: row.try_get("challenge_id")?,
        challenge_type: challenge_type(&row.try_get::<String, _>("challenge_type")?)?,
        completion_date: row.try_get("completion_date")?,
        completion_value: optional_u32(row, "completion_value")?,
        notes: row.try_get("notes")?,
        points_earned: unsigned(row.try_get::<i32, _>("points_earned")?.into(), "points_earned")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn enrollment_from_row(row: &PgRow) -> StoreResult<WeeklyEnrollment> {
    Ok(WeeklyEnrollment {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        challenge_id: row.try_get("challenge_id")?,
        attempt: unsigned(row.try_get::<i32, _>("attempt")?.into(), "attempt")?,
        days_completed: unsigned(row.try_get::<i32, _>("days_completed")?.into(), "days_completed")?,
        completion_dates: row.try_get::<Vec<NaiveDate>, _>("completion_dates")?,
        total_points_earned: unsigned(row.try_get::<i64, _>("total_points_earned")?, "total_points_earned")?,
        is_completed: row.try_get("is_completed")?,
        enrolled_at: row.try_get("enrolled_at")?,
        completed_at: row.try_get("completed_at")?,
    })
}

fn progression_from_row(row: &PgRow) -> StoreResult<ProgressionState> {
    Ok(ProgressionState {
        user_id: row.try_get("user_id")?,
        total_points: unsigned(row.try_get::<i64, _>("total_points")?, "total_points")?,
        current_streak: unsigned(row.try_get::<i32, _>("current_streak")?.into(), "current_streak")?,
        longest_streak: unsigned(row.try_get::<i32, _>("longest_streak")?.into(), "longest_streak")?,
        last_activity_date: row.try_get("last_activity_date")?,
        level: unsigned(row.try_get::<i32, _>("level")?.into(), "level")?,
        points_to_next_level: unsigned(
            row.try_get::<i64, _>("points_to_next_level")?,
            "points_to_next_level",
        )?,
        version: row.try_get("version")?,
    })
}

async fn write_one(tx: &mut Transaction<'static, Postgres>, write: Write) -> StoreResult<()> {
    match write {
        Write::MoodRecord(r) => {
            sqlx::query(
                r#"
                INSERT INTO mood_records
                    (id, user_id, date, mood_rating, energy_level, anxiety_level, sleep_quality,
                     activities, triggers, notes, created_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
                ON CONFLICT (user_id, date) DO UPDATE SET
                    mood_rating = EXCLUDED.mood_rating,
                    energy_level = EXCLUDED.energy_level,
                    anxiety_level = EXCLUDED.anxiety_level,
                    sleep_quality = EXCLUDED.sleep_quality,
                    activities = EXCLUDED.activities,
                    triggers = EXCLUDED.triggers,
                    notes = EXCLUDED.notes
                "#,
            )
            .bind(r.id)
            .bind(r.user_id)
            .bind(r.date)
            .bind(r.mood_rating as i16)
            .bind(r.energy_level as i16)
            .bind(r.anxiety_level as i16)
            .bind(r.sleep_quality as i16)
            .bind(&r.activities)
            .bind(&r.triggers)
            .bind(&r.notes)
            .bind(r.created_at)
            .execute(&mut **tx)
            .await?;
        }
        Write::Progression {
            state,
            expected_version,
        } => {
            let result = if expected_version == 0 {
                sqlx::query(
                    r#"
                    INSERT INTO progression_states
                        (user_id, total_points, current_streak, longest_streak, last_activity_date,
                         level, points_to_next_level, version)
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
                    ON CONFLICT (user_id) DO NOTHING
                    "#,
                )
                .bind(state.user_id)
                .bind(state.total_points as i64)
                .bind(state.current_streak as i32)
                .bind(state.longest_streak as i32)
                .bind(state.last_activity_date)
                .bind(state.level as i32)
                .bind(state.points_to_next_level as i64)
                .bind(state.version)
                .execute(&mut **tx)
                .await?
            } else {
                sqlx::query(
                    r#"
                    UPDATE progression_states SET
                        total_points = $2,
                        current_streak = $3,
                        longest_streak = $4,
                        last_activity_date = $5,
                        level = $6,
                        points_to_next_level = $7,
                        version = $8,
                        updated_at = now()
                    WHERE user_id = $1 AND version = $9
                    "#,
                )
                .bind(state.user_id)
                .bind(state.total_points as i64)
                .bind(state.current_streak as i32)
                .bind(state.longest_streak as i32)
                .bind(state.last_activity_date)
                .bind(state.level as i32)
                .bind(state.points_to_next_level as i64)
                .bind(state.version)
                .bind(expected_version)
                .execute(&mut **tx)
                .await?
            };
            if result.rows_affected() == 0 {
                return Err(StoreError::Conflict(format!(
                    "progression for {} is no longer at version {}",
                    state.user_id, expected_version
                )));
            }
        }
        Write::Completion(c) => {
            sqlx::query(
                r#"
                INSERT INTO challenge_completions
                    (id, user_id, challenge_id, challenge_type, completion_date, completion_value,
                     notes, points_earned, completed_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
                "#,
            )
            .bind(c.id)
            .bind(c.user_id)
            .bind(c.challenge_id)
            .bind(c.challenge_type.as_str())
            .bind(c.completion_date)
            .bind(c.completion_value.map(|v| v as i32))
            .bind(&c.notes)
            .bind(c.points_earned as i32)
            .bind(c.completed_at)
            .execute(&mut **tx)
            .await?;
        }
        Write::Enrollment(e) => {
            sqlx::query(
                r#"
                INSERT INTO weekly_enrollments
                    (id, user_id, challenge_id, attempt, days_completed, completion_dates,
                     total_points_earned, is_completed, enrolled_at, completed_at)
                VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
                ON CONFLICT (id) DO UPDATE SET
                    days_completed = EXCLUDED.days_completed,
                    completion_dates = EXCLUDED.completion_dates,
                    total_points_earned = EXCLUDED.total_points_earned,
                    is_completed = EXCLUDED.is_completed,
                    completed_at = EXCLUDED.completed_at
                "#,
            )
            .bind(e.id)
            .bind(e.user_id)
            .bind(e.challenge_id)
            .bind(e.attempt as i32)
            .bind(e.days_completed as i32)
            .bind(&e.completion_dates)
            .bind(e.total_points_earned as i64)
            .bind(e.is_completed)
            .bind(e.enrolled_at)
            .bind(e.completed_at)
            .execute(&mut **tx)
            .await?;
        }
        Write::Unlock(u) => {
            sqlx::query(
                r#"
                INSERT INTO achievement_unlocks (id, user_id, achievement_id, earned_at, points_earned)
                VALUES ($1, $2, $3, $4, $5)
                "#,
            )
            .bind(u.id)
            .bind(u.user_id)
            .bind(u.achievement_id)
            .bind(u.earned_at)
            .bind(u.points_earned as i32)
            .execute(&mut **tx)
            .await?;
        }
    }
    Ok(())
}

#[async_trait]
impl Storage for PgStore {
    async fn get_mood_records(&self, user_id: Uuid, since: NaiveDate) -> StoreResult<Vec<MoodRecord>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM mood_records
            WHERE user_id = $1 AND date >= $2
            ORDER BY date ASC
            "#,
        )
        .bind(user_id)
        .bind(since)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(mood_from_row).collect()
    }

    async fn get_mood_record(&self, user_id: Uuid, date: NaiveDate) -> StoreResult<Option<MoodRecord>> {
        let row = sqlx::query("SELECT * FROM mood_records WHERE user_id = $1 AND date = $2")
            .bind(user_id)
            .bind(date)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(mood_from_row).transpose()
    }

    async fn count_mood_records(&self, user_id: Uuid) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM mood_records WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;
        unsigned(count, "count")
    }

    async fn get_progression(&self, user_id: Uuid) -> StoreResult<Option<ProgressionState>> {
        let row = sqlx::query("SELECT * FROM progression_states WHERE user_id = $1")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;
        row.as_ref().map(progression_from_row).transpose()
    }

    async fn get_completions(&self, user_id: Uuid) -> StoreResult<Vec<ChallengeCompletion>> {
        let rows = sqlx::query(
            "SELECT * FROM challenge_completions WHERE user_id = $1 ORDER BY completed_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(completion_from_row).collect()
    }

    async fn get_enrollments(
        &self,
        user_id: Uuid,
        challenge_id: ChallengeId,
    ) -> StoreResult<Vec<WeeklyEnrollment>> {
        let rows = sqlx::query(
            r#"
            SELECT * FROM weekly_enrollments
            WHERE user_id = $1 AND challenge_id = $2
            ORDER BY attempt ASC
            "#,
        )
        .bind(user_id)
        .bind(challenge_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter().map(enrollment_from_row).collect()
    }

    async fn get_catalog(&self) -> StoreResult<Vec<Challenge>> {
        let rows = sqlx::query("SELECT * FROM challenges ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter().map(challenge_from_row).collect()
    }

    async fn get_achievement_defs(&self) -> StoreResult<Vec<AchievementDefinition>> {
        let rows = sqlx::query("SELECT * FROM achievement_definitions ORDER BY id ASC")
            .fetch_all(&self.pool)
            .await?;
        rows.iter()
            .map(|row| -> StoreResult<AchievementDefinition> {
                Ok(AchievementDefinition {
                    id: row.try_get("id")?,
                    name: row.try_get("name")?,
                    description: row.try_get("description")?,
                    category: row.try_get("category")?,
                    points_reward: unsigned(row.try_get::<i32, _>("points_reward")?.into(), "points_reward")?,
                    criteria: row.try_get::<Json<AchievementCriteria>, _>("criteria")?.0,
                    is_repeatable: row.try_get("is_repeatable")?,
                    is_active: row.try_get("is_active")?,
                })
            })
            .collect()
    }

    async fn get_unlocks(&self, user_id: Uuid) -> StoreResult<Vec<AchievementUnlock>> {
        let rows = sqlx::query(
            "SELECT * FROM achievement_unlocks WHERE user_id = $1 ORDER BY earned_at ASC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        rows.iter()
            .map(|row| -> StoreResult<AchievementUnlock> {
                Ok(AchievementUnlock {
                    id: row.try_get("id")?,
                    user_id: row.try_get("user_id")?,
                    achievement_id: row.try_get("achievement_id")?,
                    earned_at: row.try_get("earned_at")?,
                    points_earned: unsigned(row.try_get::<i32, _>("points_earned")?.into(), "points_earned")?,
                })
            })
            .collect()
    }

    async fn apply(&self, batch: WriteBatch) -> StoreResult<()> {
        let mut tx = self.pool.begin().await?;
        let count = batch.writes.len();
        for write in batch.writes {
            // Returning early drops `tx`, which rolls the whole batch back.
            write_one(&mut tx, write).await?;
        }
        tx.commit().await?;
        tracing::debug!("Committed {} writes for user {}", count, batch.user_id);
        Ok(())
    }
}
