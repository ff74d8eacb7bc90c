use crate::config::EngineConfig;
use crate::db::{Storage, StoreResult, WriteBatch};
use crate::domain::achievements::{self, UserMetrics};
use crate::domain::models::{
    AchievementDefinition, AchievementUnlock, Challenge, ChallengeCompletion, MoodPayload,
    MoodRecord, ProgressionState, WellnessScore,
};
use crate::domain::mood::{self, MAX_MOOD_NOTES_LEN};
use crate::domain::streak;
use crate::error::{ConflictError, EngineError, NotFoundError};
use crate::services::insights::{self, MoodInsights};
use crate::services::locks::UserLocks;
use crate::services::recommendations::{
    self, CatalogRecommender, RankedChallenge, RecommendationRequest, RecommendationSource,
};
use crate::services::scoring;
use crate::time_utils::EngineTimezone;
use chrono::{DateTime, Duration, NaiveDate, NaiveTime, Utc};
use serde::Serialize;
use std::future::Future;
use std::sync::atomic::{AtomicI32, Ordering};
use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

pub type EngineResult<T> = Result<T, EngineError>;

/// Source of "now" and of the calendar day activities are attributed to.
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock {
    timezone: EngineTimezone,
}

impl SystemClock {
    pub fn new(timezone: EngineTimezone) -> Self {
        Self { timezone }
    }
}

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn today(&self) -> NaiveDate {
        self.timezone.local_date(Utc::now())
    }
}

/// Clock pinned to a settable day; `now()` is noon UTC of that day.
pub struct FixedClock {
    days_from_ce: AtomicI32,
}

impl FixedClock {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            days_from_ce: AtomicI32::new(chrono::Datelike::num_days_from_ce(&today)),
        }
    }

    pub fn set_today(&self, today: NaiveDate) {
        self.days_from_ce
            .store(chrono::Datelike::num_days_from_ce(&today), Ordering::SeqCst);
    }

    pub fn advance_days(&self, days: i32) {
        self.days_from_ce.fetch_add(days, Ordering::SeqCst);
    }
}

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        self.today().and_time(NaiveTime::MIN).and_utc() + Duration::hours(12)
    }

    fn today(&self) -> NaiveDate {
        NaiveDate::from_num_days_from_ce_opt(self.days_from_ce.load(Ordering::SeqCst))
            .unwrap_or(NaiveDate::MIN)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MoodSubmission {
    pub record: MoodRecord,
    pub progression: ProgressionState,
    pub new_unlocks: Vec<AchievementUnlock>,
}

/// Progression loaded for one mutation, plus everything achievement
/// evaluation needs.
pub(crate) struct LedgerContext {
    pub progression: ProgressionState,
    pub expected_version: i64,
    pub mood_entries_count: u64,
    pub completions: Vec<ChallengeCompletion>,
    pub defs: Vec<AchievementDefinition>,
    pub unlocks: Vec<AchievementUnlock>,
}

#[derive(Clone)]
pub struct WellnessEngine {
    pub(crate) store: Arc<dyn Storage>,
    pub(crate) config: EngineConfig,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) locks: UserLocks,
    recommender: Arc<dyn RecommendationSource>,
}

impl WellnessEngine {
    pub fn new(store: Arc<dyn Storage>, config: EngineConfig) -> Self {
        let clock = Arc::new(SystemClock::new(config.timezone));
        Self {
            store,
            config,
            clock,
            locks: UserLocks::new(),
            recommender: Arc::new(CatalogRecommender),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn with_recommender(mut self, recommender: Arc<dyn RecommendationSource>) -> Self {
        self.recommender = recommender;
        self
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn locks(&self) -> &UserLocks {
        &self.locks
    }

    pub fn today(&self) -> NaiveDate {
        self.clock.today()
    }

    /// Runs one storage call under the configured timeout.
    pub(crate) async fn timed<T>(
        &self,
        op: &'static str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> EngineResult<T> {
        match tokio::time::timeout(self.config.storage_timeout, call).await {
            Ok(result) => result.map_err(EngineError::from),
            Err(_) => {
                warn!("Storage call {} timed out after {:?}", op, self.config.storage_timeout);
                Err(EngineError::StorageUnavailable(format!(
                    "{} timed out after {} ms",
                    op,
                    self.config.storage_timeout.as_millis()
                )))
            }
        }
    }

    pub(crate) async fn load_context(&self, user_id: Uuid) -> EngineResult<LedgerContext> {
        let progression = self
            .timed("get_progression", self.store.get_progression(user_id))
            .await?
            .unwrap_or_else(|| ProgressionState::new(user_id));
        let mood_entries_count = self
            .timed("count_mood_records", self.store.count_mood_records(user_id))
            .await?;
        let completions = self
            .timed("get_completions", self.store.get_completions(user_id))
            .await?;
        let defs = self
            .timed("get_achievement_defs", self.store.get_achievement_defs())
            .await?;
        let unlocks = self.timed("get_unlocks", self.store.get_unlocks(user_id)).await?;
        Ok(LedgerContext {
            expected_version: progression.version,
            progression,
            mood_entries_count,
            completions,
            defs,
            unlocks,
        })
    }

    /// Evaluates achievements against `ctx`, queues the progression and any
    /// unlocks onto `batch`, and applies the batch atomically.
    pub(crate) async fn commit(
        &self,
        mut ctx: LedgerContext,
        mut batch: WriteBatch,
    ) -> EngineResult<(ProgressionState, Vec<AchievementUnlock>)> {
        let mut metrics = UserMetrics::collect(&ctx.progression, ctx.mood_entries_count, &ctx.completions);
        let new_unlocks = achievements::settle(
            &ctx.defs,
            &ctx.unlocks,
            &mut ctx.progression,
            &mut metrics,
            self.clock.now(),
        );
        for unlock in &new_unlocks {
            info!(
                "User {} unlocked achievement {} (+{} points)",
                unlock.user_id, unlock.achievement_id, unlock.points_earned
            );
        }

        let user_id = ctx.progression.user_id;
        batch
            .put_progression(ctx.progression.clone(), ctx.expected_version)
            .put_unlocks(new_unlocks.iter().cloned());
        self.timed("apply", self.store.apply(batch)).await?;

        let mut progression = ctx.progression;
        progression.version = ctx.expected_version + 1;
        tracing::debug!("Progression for {} now at version {}", user_id, progression.version);
        Ok((progression, new_unlocks))
    }

    pub(crate) async fn active_catalog(&self) -> EngineResult<Vec<Challenge>> {
        let catalog = self.timed("get_catalog", self.store.get_catalog()).await?;
        Ok(catalog.into_iter().filter(|c| c.is_active).collect())
    }

    // ─────────────────────────────────────────────────────────
    // MOOD
    // ─────────────────────────────────────────────────────────

    /// Validates and stores one day's check-in. Counts as a qualifying activity
    /// for the streak and credits the configured entry points.
    pub async fn submit_mood(&self, user_id: Uuid, payload: MoodPayload) -> EngineResult<MoodSubmission> {
        let record = mood::build_record(
            user_id,
            &payload,
            self.today(),
            self.config.backdate_grace_days,
            self.clock.now(),
        )?;
        let _guard = self.locks.acquire(user_id).await;

        let existing = self
            .timed("get_mood_record", self.store.get_mood_record(user_id, record.date))
            .await?;
        if existing.is_some() {
            return Err(ConflictError::DuplicateRecord { date: record.date }.into());
        }

        let mut ctx = self.load_context(user_id).await?;
        ctx.progression.add_points(self.config.mood_entry_points as u64);
        let change = streak::record_activity(&mut ctx.progression, record.date);
        ctx.mood_entries_count += 1;

        let mut batch = WriteBatch::new(user_id);
        batch.put_mood_record(record.clone());
        let (progression, new_unlocks) = self.commit(ctx, batch).await?;

        info!(
            "Mood {} recorded for user {} on {} (streak {:?}, now {})",
            record.mood_rating, user_id, record.date, change, progression.current_streak
        );
        Ok(MoodSubmission {
            record,
            progression,
            new_unlocks,
        })
    }

    /// The only edit path for an existing record; ratings stay as submitted.
    pub async fn update_mood_notes(
        &self,
        user_id: Uuid,
        date: NaiveDate,
        notes: Option<String>,
    ) -> EngineResult<MoodRecord> {
        let notes = mood::check_notes(notes.as_deref(), MAX_MOOD_NOTES_LEN)?;
        let _guard = self.locks.acquire(user_id).await;

        let mut record = self
            .timed("get_mood_record", self.store.get_mood_record(user_id, date))
            .await?
            .ok_or(NotFoundError::MoodRecord(date))?;
        record.notes = notes;

        let mut batch = WriteBatch::new(user_id);
        batch.put_mood_record(record.clone());
        self.timed("apply", self.store.apply(batch)).await?;
        info!("Notes updated for user {} on {}", user_id, date);
        Ok(record)
    }

    /// Records of the last `days` days, oldest first.
    pub async fn mood_history(&self, user_id: Uuid, days: u32) -> EngineResult<Vec<MoodRecord>> {
        let today = self.today();
        let since = today
            .checked_sub_signed(Duration::days(days.max(1) as i64 - 1))
            .unwrap_or(NaiveDate::MIN);
        let records = self
            .timed("get_mood_records", self.store.get_mood_records(user_id, since))
            .await?;
        Ok(records.into_iter().filter(|r| r.date <= today).collect())
    }

    // ─────────────────────────────────────────────────────────
    // SCORE & INSIGHTS
    // ─────────────────────────────────────────────────────────

    pub async fn compute_score(&self, user_id: Uuid, window_days: Option<u32>) -> EngineResult<WellnessScore> {
        let window = window_days.unwrap_or(self.config.score_window_days).max(1);
        let records = self.mood_history(user_id, window).await?;
        Ok(scoring::compute(&records, window, self.config.consistency_bonus_max))
    }

    pub async fn mood_insights(&self, user_id: Uuid, days: Option<u32>) -> EngineResult<Option<MoodInsights>> {
        let days = days
            .unwrap_or(self.config.score_window_days)
            .clamp(1, insights::MAX_PERIOD_DAYS);
        let records = self.mood_history(user_id, days).await?;
        Ok(insights::analyze(&records, self.today(), days))
    }

    // ─────────────────────────────────────────────────────────
    // RECOMMENDATIONS
    // ─────────────────────────────────────────────────────────

    /// Never fails: an unreachable catalog or source degrades to the rule table,
    /// and "nothing fits" is an empty list.
    pub async fn recommend(&self, user_id: Uuid, request: RecommendationRequest) -> Vec<RankedChallenge> {
        let limit = request.limit.unwrap_or(self.config.recommendation_limit);
        if limit == 0 || !recommendations::is_actionable(&request) {
            return Vec::new();
        }

        let catalog = match self.active_catalog().await {
            Ok(catalog) => catalog,
            Err(e) => {
                warn!("Catalog unavailable for recommendations, using rule table: {}", e);
                return recommendations::rule_table(&request, limit);
            }
        };

        let sourced = tokio::time::timeout(
            self.config.storage_timeout,
            self.recommender.recommend(user_id, &request, &catalog),
        )
        .await;
        match sourced {
            Ok(Ok(ranked)) if !ranked.is_empty() => recommendations::finalize(ranked, limit),
            Ok(Ok(_)) => {
                warn!("Recommendation source returned nothing for {}, using rule table", user_id);
                recommendations::rule_table(&request, limit)
            }
            Ok(Err(e)) => {
                warn!("Recommendation source failed for {}: {}; using rule table", user_id, e);
                recommendations::rule_table(&request, limit)
            }
            Err(_) => {
                warn!("Recommendation source timed out for {}, using rule table", user_id);
                recommendations::rule_table(&request, limit)
            }
        }
    }

    /// Recommendations for the most recent check-in in the score window.
    pub async fn recommend_latest(&self, user_id: Uuid, limit: Option<usize>) -> EngineResult<Vec<RankedChallenge>> {
        let records = self.mood_history(user_id, self.config.score_window_days).await?;
        let Some(latest) = records.last() else {
            return Ok(Vec::new());
        };
        let request = RecommendationRequest {
            mood_rating: latest.mood_rating as i32,
            activities: latest.activities.clone(),
            triggers: latest.triggers.clone(),
            limit,
        };
        Ok(self.recommend(user_id, request).await)
    }

    // ─────────────────────────────────────────────────────────
    // READS
    // ─────────────────────────────────────────────────────────

    pub async fn progression(&self, user_id: Uuid) -> EngineResult<ProgressionState> {
        Ok(self
            .timed("get_progression", self.store.get_progression(user_id))
            .await?
            .unwrap_or_else(|| ProgressionState::new(user_id)))
    }

    pub async fn catalog(&self) -> EngineResult<Vec<Challenge>> {
        self.active_catalog().await
    }
}
