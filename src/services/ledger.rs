//! Points, streaks, challenge completion and achievement unlocks.
//!
//! Every mutation runs under the per-user lock and persists its ledger writes
//! together with the unlocks they cause in one batch.
use crate::db::WriteBatch;
use crate::domain::achievements::{self, AchievementProgress, UserMetrics};
use crate::domain::models::{
    AchievementUnlock, Challenge, ChallengeCompletion, ChallengeId, ChallengeKind,
    ProgressionState, WeeklyEnrollment, WeeklyTerms,
};
use crate::domain::mood::{check_activity_date, check_notes};
use crate::domain::streak;
use crate::engine::{EngineResult, WellnessEngine};
use crate::error::{ConflictError, NotFoundError, ValidationError};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

pub const MAX_COMPLETION_NOTES_LEN: usize = 300;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyCompletionRequest {
    /// Defaults to the engine's "today".
    #[serde(default)]
    pub date: Option<NaiveDate>,
    #[serde(default)]
    pub completion_value: Option<u32>,
    #[serde(default)]
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct CompletionOutcome {
    pub completion: ChallengeCompletion,
    pub points_credited: u64,
    pub progression: ProgressionState,
    pub new_unlocks: Vec<AchievementUnlock>,
}

#[derive(Debug, Clone, Serialize)]
pub struct WeeklyDayOutcome {
    pub enrollment: WeeklyEnrollment,
    pub points_credited: u64,
    pub bonus_awarded: bool,
    pub progression: ProgressionState,
    pub new_unlocks: Vec<AchievementUnlock>,
}

fn daily_points(challenge: &Challenge) -> EngineResult<u32> {
    match &challenge.kind {
        ChallengeKind::Daily { points_reward } => Ok(*points_reward),
        ChallengeKind::Weekly(_) => Err(ValidationError::ChallengeKindMismatch {
            challenge_id: challenge.id,
            expected: "daily",
        }
        .into()),
    }
}

fn weekly_terms(challenge: &Challenge) -> EngineResult<&WeeklyTerms> {
    match &challenge.kind {
        ChallengeKind::Weekly(terms) => Ok(terms),
        ChallengeKind::Daily { .. } => Err(ValidationError::ChallengeKindMismatch {
            challenge_id: challenge.id,
            expected: "weekly",
        }
        .into()),
    }
}

impl WellnessEngine {
    async fn find_challenge(&self, challenge_id: ChallengeId) -> EngineResult<Challenge> {
        self.active_catalog()
            .await?
            .into_iter()
            .find(|c| c.id == challenge_id)
            .ok_or_else(|| NotFoundError::UnknownChallenge(challenge_id).into())
    }

    pub async fn complete_daily_challenge(
        &self,
        user_id: Uuid,
        challenge_id: ChallengeId,
        request: DailyCompletionRequest,
    ) -> EngineResult<CompletionOutcome> {
        let today = self.today();
        let date = request.date.unwrap_or(today);
        check_activity_date(date, today, self.config.backdate_grace_days)?;
        let notes = check_notes(request.notes.as_deref(), MAX_COMPLETION_NOTES_LEN)?;

        let _guard = self.locks.acquire(user_id).await;
        let challenge = self.find_challenge(challenge_id).await?;
        let points = daily_points(&challenge)?;

        let mut ctx = self.load_context(user_id).await?;
        let duplicate = ctx
            .completions
            .iter()
            .any(|c| c.challenge_id == challenge_id && c.completion_date == date);
        if duplicate {
            return Err(ConflictError::AlreadyCompleted { challenge_id, date }.into());
        }

        let completion = ChallengeCompletion {
            id: Uuid::new_v4(),
            user_id,
            challenge_id,
            challenge_type: challenge.challenge_type,
            completion_date: date,
            completion_value: request.completion_value,
            notes,
            points_earned: points,
            completed_at: self.clock.now(),
        };
        ctx.progression.add_points(points as u64);
        streak::record_activity(&mut ctx.progression, date);
        ctx.completions.push(completion.clone());

        let mut batch = WriteBatch::new(user_id);
        batch.put_completion(completion.clone());
        let (progression, new_unlocks) = self.commit(ctx, batch).await?;

        info!(
            "User {} completed daily challenge {} on {} (+{} points, total {})",
            user_id, challenge_id, date, points, progression.total_points
        );
        Ok(CompletionOutcome {
            completion,
            points_credited: points as u64,
            progression,
            new_unlocks,
        })
    }

    pub async fn enroll_weekly_challenge(
        &self,
        user_id: Uuid,
        challenge_id: ChallengeId,
    ) -> EngineResult<WeeklyEnrollment> {
        let _guard = self.locks.acquire(user_id).await;
        let challenge = self.find_challenge(challenge_id).await?;
        let terms = weekly_terms(&challenge)?;

        let today = self.today();
        if today > terms.end_date {
            return Err(ValidationError::OutOfWindow {
                date: today,
                start: terms.start_date,
                end: terms.end_date,
            }
            .into());
        }

        let enrollments = self
            .timed("get_enrollments", self.store.get_enrollments(user_id, challenge_id))
            .await?;
        let attempt = match enrollments.last() {
            None => 1,
            Some(latest) if latest.is_completed && terms.is_repeatable => latest.attempt + 1,
            Some(_) => return Err(ConflictError::AlreadyEnrolled { challenge_id }.into()),
        };

        let enrollment = WeeklyEnrollment {
            id: Uuid::new_v4(),
            user_id,
            challenge_id,
            attempt,
            days_completed: 0,
            completion_dates: Vec::new(),
            total_points_earned: 0,
            is_completed: false,
            enrolled_at: self.clock.now(),
            completed_at: None,
        };
        let mut batch = WriteBatch::new(user_id);
        batch.put_enrollment(enrollment.clone());
        self.timed("apply", self.store.apply(batch)).await?;

        info!(
            "User {} enrolled in weekly challenge {} (attempt {})",
            user_id, challenge_id, attempt
        );
        Ok(enrollment)
    }

    /// Records one day of a weekly challenge. Reaching `target_days` closes
    /// the enrollment and credits the bonus.
    pub async fn complete_weekly_day(
        &self,
        user_id: Uuid,
        challenge_id: ChallengeId,
        date: Option<NaiveDate>,
    ) -> EngineResult<WeeklyDayOutcome> {
        let today = self.today();
        let date = date.unwrap_or(today);
        check_activity_date(date, today, self.config.backdate_grace_days)?;

        let _guard = self.locks.acquire(user_id).await;
        let challenge = self.find_challenge(challenge_id).await?;
        let terms = weekly_terms(&challenge)?;

        let mut enrollment = self
            .timed("get_enrollments", self.store.get_enrollments(user_id, challenge_id))
            .await?
            .pop()
            .ok_or(NotFoundError::NotEnrolled(challenge_id))?;
        if enrollment.is_completed {
            return Err(ConflictError::EnrollmentCompleted { challenge_id }.into());
        }
        if !terms.contains(date) {
            return Err(ValidationError::OutOfWindow {
                date,
                start: terms.start_date,
                end: terms.end_date,
            }
            .into());
        }

        let mut ctx = self.load_context(user_id).await?;
        // A day logged under an earlier attempt still counts as taken.
        let already_logged = enrollment.completion_dates.contains(&date)
            || ctx
                .completions
                .iter()
                .any(|c| c.challenge_id == challenge_id && c.completion_date == date);
        if already_logged {
            return Err(ConflictError::AlreadyCompletedToday { challenge_id, date }.into());
        }

        let now = self.clock.now();
        let mut points = terms.points_per_day as u64;
        enrollment.days_completed += 1;
        enrollment.completion_dates.push(date);
        let bonus_awarded = enrollment.days_completed >= terms.target_days;
        if bonus_awarded {
            points += terms.bonus_points as u64;
            enrollment.is_completed = true;
            enrollment.completed_at = Some(now);
        }
        enrollment.total_points_earned += points;

        let completion = ChallengeCompletion {
            id: Uuid::new_v4(),
            user_id,
            challenge_id,
            challenge_type: challenge.challenge_type,
            completion_date: date,
            completion_value: None,
            notes: None,
            points_earned: points as u32,
            completed_at: now,
        };
        ctx.progression.add_points(points);
        streak::record_activity(&mut ctx.progression, date);
        ctx.completions.push(completion.clone());

        let mut batch = WriteBatch::new(user_id);
        batch.put_enrollment(enrollment.clone()).put_completion(completion);
        let (progression, new_unlocks) = self.commit(ctx, batch).await?;

        info!(
            "User {} logged day {}/{} of weekly challenge {} (+{} points{})",
            user_id,
            enrollment.days_completed,
            terms.target_days,
            challenge_id,
            points,
            if bonus_awarded { ", bonus credited" } else { "" }
        );
        Ok(WeeklyDayOutcome {
            enrollment,
            points_credited: points,
            bonus_awarded,
            progression,
            new_unlocks,
        })
    }

    /// Real metric values against each active definition's next threshold.
    pub async fn achievement_progress(&self, user_id: Uuid) -> EngineResult<Vec<AchievementProgress>> {
        let ctx = self.load_context(user_id).await?;
        let metrics = UserMetrics::collect(&ctx.progression, ctx.mood_entries_count, &ctx.completions);
        Ok(achievements::progress_report(&ctx.defs, &ctx.unlocks, &metrics))
    }

    pub async fn unlocked_achievements(&self, user_id: Uuid) -> EngineResult<Vec<AchievementUnlock>> {
        self.timed("get_unlocks", self.store.get_unlocks(user_id)).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{seed, MemoryStore, Storage};
    use crate::domain::models::{AchievementCriteria, AchievementDefinition, AchievementMetric, ChallengeType};
    use crate::engine::tests::{day, engine_with, payload};
    use crate::error::EngineError;
    use std::sync::Arc;

    fn daily(id: i64, challenge_type: ChallengeType, points: u32) -> Challenge {
        Challenge {
            id,
            title: format!("Daily {id}"),
            description: String::new(),
            challenge_type,
            instructions: String::new(),
            duration_minutes: None,
            target_value: None,
            is_active: true,
            kind: ChallengeKind::Daily { points_reward: points },
        }
    }

    fn weekly(id: i64, repeatable: bool) -> Challenge {
        Challenge {
            id,
            title: format!("Weekly {id}"),
            description: String::new(),
            challenge_type: ChallengeType::HabitBuilding,
            instructions: String::new(),
            duration_minutes: None,
            target_value: None,
            is_active: true,
            kind: ChallengeKind::Weekly(WeeklyTerms {
                points_per_day: 10,
                bonus_points: 50,
                target_days: 7,
                start_date: day(1),
                end_date: day(14),
                is_repeatable: repeatable,
            }),
        }
    }

    fn definition(id: i64, metric: AchievementMetric, target: u64, points: u32) -> AchievementDefinition {
        AchievementDefinition {
            id,
            name: format!("Achievement {id}"),
            description: String::new(),
            category: "engagement".into(),
            points_reward: points,
            criteria: AchievementCriteria {
                metric,
                target,
                category: None,
            },
            is_repeatable: false,
            is_active: true,
        }
    }

    fn on(d: u32) -> DailyCompletionRequest {
        DailyCompletionRequest {
            date: Some(day(d)),
            ..Default::default()
        }
    }

    #[tokio::test]
    async fn test_daily_completion_then_next_day_activity_extends_streak() {
        let store = Arc::new(MemoryStore::with_catalog(
            vec![daily(1, ChallengeType::Breathing, 15)],
            vec![],
        ));
        let (engine, clock) = engine_with(store, day(1));
        let user = Uuid::new_v4();

        let outcome = engine.complete_daily_challenge(user, 1, on(1)).await.unwrap();
        assert_eq!(outcome.points_credited, 15);
        assert_eq!(outcome.progression.total_points, 15);
        assert_eq!(outcome.progression.current_streak, 1);

        clock.advance_days(1);
        let next = engine.submit_mood(user, payload(4, day(2))).await.unwrap();
        assert_eq!(next.progression.current_streak, 2);
        assert_eq!(next.progression.longest_streak, 2);
    }

    #[tokio::test]
    async fn test_same_day_activities_leave_streak_alone() {
        let store = Arc::new(MemoryStore::with_catalog(
            vec![daily(1, ChallengeType::Breathing, 15), daily(2, ChallengeType::Gratitude, 10)],
            vec![],
        ));
        let (engine, _) = engine_with(store, day(5));
        let user = Uuid::new_v4();

        engine.submit_mood(user, payload(3, day(5))).await.unwrap();
        engine.complete_daily_challenge(user, 1, on(5)).await.unwrap();
        let outcome = engine.complete_daily_challenge(user, 2, on(5)).await.unwrap();
        assert_eq!(outcome.progression.current_streak, 1);
        assert_eq!(outcome.progression.total_points, 5 + 15 + 10);
    }

    #[tokio::test]
    async fn test_gap_resets_streak_but_keeps_longest() {
        let store = Arc::new(MemoryStore::new());
        let (engine, clock) = engine_with(store, day(1));
        let user = Uuid::new_v4();

        for d in [1, 2, 3] {
            clock.set_today(day(d));
            engine.submit_mood(user, payload(3, day(d))).await.unwrap();
        }
        clock.set_today(day(6));
        let after_gap = engine.submit_mood(user, payload(3, day(6))).await.unwrap();
        assert_eq!(after_gap.progression.current_streak, 1);
        assert_eq!(after_gap.progression.longest_streak, 3);
    }

    #[tokio::test]
    async fn test_second_completion_same_day_is_conflict_without_credit() {
        let store = Arc::new(MemoryStore::with_catalog(
            vec![daily(1, ChallengeType::Physical, 12)],
            vec![],
        ));
        let (engine, _) = engine_with(store.clone(), day(3));
        let user = Uuid::new_v4();

        engine.complete_daily_challenge(user, 1, on(3)).await.unwrap();
        let err = engine.complete_daily_challenge(user, 1, on(3)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Conflict(ConflictError::AlreadyCompleted { challenge_id: 1, .. })
        ));
        assert_eq!(engine.progression(user).await.unwrap().total_points, 12);
        assert_eq!(store.get_completions(user).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_duplicates_credit_once() {
        let store = Arc::new(MemoryStore::with_catalog(
            vec![daily(1, ChallengeType::Physical, 12)],
            vec![],
        ));
        let (engine, _) = engine_with(store, day(3));
        let user = Uuid::new_v4();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let engine = engine.clone();
                tokio::spawn(async move { engine.complete_daily_challenge(user, 1, on(3)).await })
            })
            .collect();
        let mut successes = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                successes += 1;
            }
        }
        assert_eq!(successes, 1);
        assert_eq!(engine.progression(user).await.unwrap().total_points, 12);
    }

    #[tokio::test]
    async fn test_unknown_inactive_and_mismatched_challenges() {
        let mut inactive = daily(2, ChallengeType::Social, 8);
        inactive.is_active = false;
        let store = Arc::new(MemoryStore::with_catalog(
            vec![daily(1, ChallengeType::Social, 8), inactive, weekly(3, false)],
            vec![],
        ));
        let (engine, _) = engine_with(store, day(3));
        let user = Uuid::new_v4();

        for id in [2, 99] {
            let err = engine.complete_daily_challenge(user, id, on(3)).await.unwrap_err();
            assert!(matches!(err, EngineError::NotFound(NotFoundError::UnknownChallenge(_))));
        }
        let err = engine.complete_daily_challenge(user, 3, on(3)).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::ChallengeKindMismatch { expected: "daily", .. })
        ));
        let err = engine.enroll_weekly_challenge(user, 1).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Validation(ValidationError::ChallengeKindMismatch { expected: "weekly", .. })
        ));
    }

    #[tokio::test]
    async fn test_completion_input_validation() {
        let store = Arc::new(MemoryStore::with_catalog(
            vec![daily(1, ChallengeType::Learning, 15)],
            vec![],
        ));
        let (engine, _) = engine_with(store, day(3));
        let user = Uuid::new_v4();

        let err = engine.complete_daily_challenge(user, 1, on(4)).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::InvalidDate { .. })));
        let err = engine.complete_daily_challenge(user, 1, on(1)).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::InvalidDate { .. })));

        let long_notes = DailyCompletionRequest {
            date: Some(day(3)),
            notes: Some("n".repeat(MAX_COMPLETION_NOTES_LEN + 1)),
            ..Default::default()
        };
        let err = engine.complete_daily_challenge(user, 1, long_notes).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::NotesTooLong { .. })));
    }

    #[tokio::test]
    async fn test_weekly_challenge_runs_to_terminal_state() {
        let store = Arc::new(MemoryStore::with_catalog(vec![weekly(7, false)], vec![]));
        let (engine, clock) = engine_with(store, day(1));
        let user = Uuid::new_v4();

        let err = engine.complete_weekly_day(user, 7, Some(day(1))).await.unwrap_err();
        assert!(matches!(err, EngineError::NotFound(NotFoundError::NotEnrolled(7))));

        let enrollment = engine.enroll_weekly_challenge(user, 7).await.unwrap();
        assert_eq!(enrollment.attempt, 1);
        assert_eq!(enrollment.days_completed, 0);

        let mut last = None;
        for d in 1..=7 {
            clock.set_today(day(d));
            last = Some(engine.complete_weekly_day(user, 7, Some(day(d))).await.unwrap());
        }
        let last = last.unwrap();
        assert!(last.bonus_awarded);
        assert!(last.enrollment.is_completed);
        assert_eq!(last.enrollment.total_points_earned, 120);
        assert_eq!(last.progression.total_points, 120);
        assert_eq!(last.progression.current_streak, 7);

        clock.set_today(day(8));
        let err = engine.complete_weekly_day(user, 7, Some(day(8))).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Conflict(ConflictError::EnrollmentCompleted { challenge_id: 7 })
        ));
        assert_eq!(engine.progression(user).await.unwrap().total_points, 120);

        let err = engine.enroll_weekly_challenge(user, 7).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(ConflictError::AlreadyEnrolled { .. })));
    }

    #[tokio::test]
    async fn test_weekly_day_window_and_duplicates() {
        let store = Arc::new(MemoryStore::with_catalog(vec![weekly(7, false)], vec![]));
        let (engine, _) = engine_with(store, day(20));
        let user = Uuid::new_v4();

        // Enrollment after the window closed is refused.
        let err = engine.enroll_weekly_challenge(user, 7).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::OutOfWindow { .. })));

        let store = Arc::new(MemoryStore::with_catalog(vec![weekly(7, false)], vec![]));
        let (engine, clock) = engine_with(store, day(2));
        engine.enroll_weekly_challenge(user, 7).await.unwrap();
        assert!(matches!(
            engine.enroll_weekly_challenge(user, 7).await.unwrap_err(),
            EngineError::Conflict(ConflictError::AlreadyEnrolled { .. })
        ));

        clock.set_today(day(16));
        let err = engine.complete_weekly_day(user, 7, Some(day(15))).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::OutOfWindow { .. })));

        // Inside the window but older than the grace period.
        clock.set_today(day(5));
        let err = engine.complete_weekly_day(user, 7, Some(day(2))).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::InvalidDate { .. })));

        clock.set_today(day(3));
        engine.complete_weekly_day(user, 7, Some(day(2))).await.unwrap();
        let err = engine.complete_weekly_day(user, 7, Some(day(2))).await.unwrap_err();
        assert!(matches!(
            err,
            EngineError::Conflict(ConflictError::AlreadyCompletedToday { .. })
        ));
    }

    #[tokio::test]
    async fn test_repeatable_weekly_opens_a_new_attempt() {
        let store = Arc::new(MemoryStore::with_catalog(vec![weekly(9, true)], vec![]));
        let (engine, clock) = engine_with(store.clone(), day(1));
        let user = Uuid::new_v4();

        engine.enroll_weekly_challenge(user, 9).await.unwrap();
        for d in 1..=7 {
            clock.set_today(day(d));
            engine.complete_weekly_day(user, 9, Some(day(d))).await.unwrap();
        }
        let second = engine.enroll_weekly_challenge(user, 9).await.unwrap();
        assert_eq!(second.attempt, 2);

        // Days already logged under the first attempt stay taken.
        let err = engine.complete_weekly_day(user, 9, Some(day(7))).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(ConflictError::AlreadyCompletedToday { .. })));
        clock.set_today(day(8));
        let outcome = engine.complete_weekly_day(user, 9, Some(day(8))).await.unwrap();
        assert_eq!(outcome.enrollment.attempt, 2);
        assert_eq!(outcome.enrollment.days_completed, 1);
        assert_eq!(store.get_enrollments(user, 9).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_unlocks_chain_and_credit_points() {
        let defs = vec![
            definition(1, AchievementMetric::ChallengeCompletions, 1, 90),
            // Only reachable through the points the first unlock credits.
            definition(2, AchievementMetric::TotalPoints, 100, 5),
        ];
        let store = Arc::new(MemoryStore::with_catalog(
            vec![daily(1, ChallengeType::Breathing, 15)],
            defs,
        ));
        let (engine, _) = engine_with(store, day(3));
        let user = Uuid::new_v4();

        let outcome = engine.complete_daily_challenge(user, 1, on(3)).await.unwrap();
        let ids: Vec<i64> = outcome.new_unlocks.iter().map(|u| u.achievement_id).collect();
        assert_eq!(ids, vec![1, 2]);
        assert_eq!(outcome.progression.total_points, 15 + 90 + 5);
        assert_eq!(outcome.progression.level, 2);

        engine.complete_daily_challenge(user, 1, on(2)).await.unwrap();
        assert_eq!(engine.unlocked_achievements(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_repeatable_achievement_unlocks_at_each_multiple() {
        let mut def = definition(4, AchievementMetric::ChallengeCompletions, 2, 1);
        def.is_repeatable = true;
        let store = Arc::new(MemoryStore::with_catalog(
            vec![daily(1, ChallengeType::Breathing, 1)],
            vec![def],
        ));
        let (engine, clock) = engine_with(store, day(1));
        let user = Uuid::new_v4();

        let mut unlocked = 0;
        for d in 1..=5 {
            clock.set_today(day(d));
            let outcome = engine.complete_daily_challenge(user, 1, on(d)).await.unwrap();
            unlocked += outcome.new_unlocks.len();
        }
        assert_eq!(unlocked, 2);
        let progress = engine.achievement_progress(user).await.unwrap();
        assert_eq!(progress[0].times_unlocked, 2);
        assert_eq!(progress[0].target, 6);
        assert_eq!(progress[0].current, 5);
    }

    #[tokio::test]
    async fn test_failed_commit_rolls_back_everything() {
        let store = Arc::new(MemoryStore::with_catalog(
            vec![daily(1, ChallengeType::Breathing, 15)],
            vec![definition(1, AchievementMetric::ChallengeCompletions, 1, 10)],
        ));
        let (engine, _) = engine_with(store.clone(), day(3));
        let user = Uuid::new_v4();

        // Another process moved the progression row past the version we will read.
        let mut foreign = WriteBatch::new(user);
        foreign.put_progression(ProgressionState::new(user), 0);
        store.apply(foreign).await.unwrap();
        let ctx = engine.load_context(user).await.unwrap();
        let mut bump = WriteBatch::new(user);
        bump.put_progression(ctx.progression.clone(), ctx.expected_version);
        store.apply(bump).await.unwrap();

        let mut stale = WriteBatch::new(user);
        stale.put_completion(ChallengeCompletion {
            id: Uuid::new_v4(),
            user_id: user,
            challenge_id: 1,
            challenge_type: ChallengeType::Breathing,
            completion_date: day(3),
            completion_value: None,
            notes: None,
            points_earned: 15,
            completed_at: chrono::Utc::now(),
        });
        let err = engine.commit(ctx, stale).await.unwrap_err();
        assert!(matches!(err, EngineError::Conflict(ConflictError::ConcurrentUpdate(_))));
        assert!(store.get_completions(user).await.unwrap().is_empty());
        assert!(store.get_unlocks(user).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_progress_reports_real_metrics() {
        let store = Arc::new(MemoryStore::with_catalog(
            seed::default_challenges(day(1)),
            seed::default_achievements(),
        ));
        let (engine, _) = engine_with(store, day(3));
        let user = Uuid::new_v4();

        engine.submit_mood(user, payload(4, day(2))).await.unwrap();
        engine.submit_mood(user, payload(4, day(3))).await.unwrap();
        for id in [101, 102, 103] {
            engine.complete_daily_challenge(user, id, on(3)).await.unwrap();
        }

        let progress = engine.achievement_progress(user).await.unwrap();
        let by_name = |name: &str| progress.iter().find(|p| p.name == name).unwrap().clone();
        assert!(by_name("First Mood Entry").unlocked);
        assert_eq!(by_name("3-Day Streak").current, 2);
        assert_eq!(by_name("3-Day Streak").percent, 66);
        assert_eq!(by_name("10 Challenges").current, 3);
        assert_eq!(by_name("Wellness Explorer").current, 3);
        assert_eq!(by_name("Wellness Explorer").percent, 60);
    }

    #[tokio::test]
    async fn test_walking_dates_backwards_credits_nothing() {
        let store = Arc::new(MemoryStore::with_catalog(
            vec![daily(1, ChallengeType::Breathing, 15)],
            vec![],
        ));
        let (engine, _) = engine_with(store.clone(), day(20));
        let user = Uuid::new_v4();

        engine.complete_daily_challenge(user, 1, on(20)).await.unwrap();
        engine.complete_daily_challenge(user, 1, on(19)).await.unwrap();
        for d in (1..=18).rev() {
            let err = engine.complete_daily_challenge(user, 1, on(d)).await.unwrap_err();
            assert!(matches!(err, EngineError::Validation(ValidationError::InvalidDate { .. })));
        }
        let ancient = payload(4, chrono::NaiveDate::from_ymd_opt(1900, 1, 1).unwrap());
        assert!(engine.submit_mood(user, ancient).await.is_err());

        assert_eq!(engine.progression(user).await.unwrap().total_points, 30);
        assert_eq!(store.get_completions(user).await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_rolled_weekly_window_reopens_enrollment() {
        let store = Arc::new(MemoryStore::with_catalog(seed::default_challenges(day(1)), vec![]));
        let (engine, _) = engine_with(store.clone(), day(20));
        let user = Uuid::new_v4();

        let err = engine.enroll_weekly_challenge(user, 201).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(ValidationError::OutOfWindow { .. })));

        store.roll_weekly_windows(engine.today()).await;
        let enrollment = engine.enroll_weekly_challenge(user, 201).await.unwrap();
        assert_eq!(enrollment.attempt, 1);
        engine.complete_weekly_day(user, 201, None).await.unwrap();
    }
}
