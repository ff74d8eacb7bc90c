use crate::domain::models::{
    AchievementCriteria, AchievementDefinition, AchievementId, AchievementMetric,
    AchievementUnlock, ChallengeCompletion, ChallengeType, ProgressionState,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

/// Everything an achievement criterion can be measured against.
#[derive(Debug, Clone, Default, Serialize)]
pub struct UserMetrics {
    pub total_points: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub mood_entries_count: u64,
    pub challenge_completions: u64,
    pub completions_by_category: HashMap<ChallengeType, u64>,
}

impl UserMetrics {
    pub fn collect(
        progression: &ProgressionState,
        mood_entries_count: u64,
        completions: &[ChallengeCompletion],
    ) -> Self {
        let mut completions_by_category = HashMap::new();
        for completion in completions {
            *completions_by_category
                .entry(completion.challenge_type)
                .or_insert(0) += 1;
        }
        let mut metrics = Self {
            mood_entries_count,
            challenge_completions: completions.len() as u64,
            completions_by_category,
            ..Default::default()
        };
        metrics.sync_progression(progression);
        metrics
    }

    pub fn sync_progression(&mut self, progression: &ProgressionState) {
        self.total_points = progression.total_points;
        self.current_streak = progression.current_streak;
        self.longest_streak = progression.longest_streak;
    }

    pub fn value_of(&self, criteria: &AchievementCriteria) -> u64 {
        match criteria.metric {
            AchievementMetric::TotalPoints => self.total_points,
            AchievementMetric::StreakDays => self.current_streak as u64,
            AchievementMetric::LongestStreak => self.longest_streak as u64,
            AchievementMetric::MoodEntriesCount => self.mood_entries_count,
            AchievementMetric::ChallengeCompletions => self.challenge_completions,
            AchievementMetric::CategoryCompletions => criteria
                .category
                .and_then(|category| self.completions_by_category.get(&category).copied())
                .unwrap_or(0),
            AchievementMetric::ActivityVariety => self
                .completions_by_category
                .values()
                .filter(|count| **count > 0)
                .count() as u64,
        }
    }
}

pub fn unlock_counts(unlocks: &[AchievementUnlock]) -> HashMap<AchievementId, u64> {
    let mut counts = HashMap::new();
    for unlock in unlocks {
        *counts.entry(unlock.achievement_id).or_insert(0) += 1;
    }
    counts
}

/// Metric value the next unlock of `def` requires. Repeatable achievements
/// unlock again at every further multiple of the target.
pub fn next_threshold(def: &AchievementDefinition, times_unlocked: u64) -> u64 {
    if def.is_repeatable {
        def.criteria.target.max(1) * (times_unlocked + 1)
    } else {
        def.criteria.target
    }
}

pub fn is_eligible(def: &AchievementDefinition, times_unlocked: u64, metrics: &UserMetrics) -> bool {
    if !def.is_active || (!def.is_repeatable && times_unlocked > 0) {
        return false;
    }
    metrics.value_of(&def.criteria) >= next_threshold(def, times_unlocked)
}

/// Unlocks every eligible definition, crediting its points to `progression`.
/// Credited points can push other definitions over their threshold, so passes
/// repeat until nothing new unlocks. Each definition unlocks at most once per call.
pub fn settle(
    defs: &[AchievementDefinition],
    existing: &[AchievementUnlock],
    progression: &mut ProgressionState,
    metrics: &mut UserMetrics,
    now: DateTime<Utc>,
) -> Vec<AchievementUnlock> {
    let counts = unlock_counts(existing);
    let mut unlocked_now: HashSet<AchievementId> = HashSet::new();
    let mut unlocks = Vec::new();

    loop {
        let mut progressed = false;
        for def in defs {
            if unlocked_now.contains(&def.id) {
                continue;
            }
            let times = counts.get(&def.id).copied().unwrap_or(0);
            if !is_eligible(def, times, metrics) {
                continue;
            }
            unlocked_now.insert(def.id);
            progression.add_points(def.points_reward as u64);
            metrics.sync_progression(progression);
            unlocks.push(AchievementUnlock {
                id: Uuid::new_v4(),
                user_id: progression.user_id,
                achievement_id: def.id,
                earned_at: now,
                points_earned: def.points_reward,
            });
            progressed = true;
        }
        if !progressed {
            break;
        }
    }
    unlocks
}

#[derive(Debug, Clone, Serialize)]
pub struct AchievementProgress {
    pub achievement_id: AchievementId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub points_reward: u32,
    pub current: u64,
    pub target: u64,
    pub percent: u8,
    pub times_unlocked: u64,
    pub unlocked: bool,
}

pub fn progress_report(
    defs: &[AchievementDefinition],
    unlocks: &[AchievementUnlock],
    metrics: &UserMetrics,
) -> Vec<AchievementProgress> {
    let counts = unlock_counts(unlocks);
    defs.iter()
        .filter(|def| def.is_active)
        .map(|def| {
            let times = counts.get(&def.id).copied().unwrap_or(0);
            let target = next_threshold(def, times);
            let current = metrics.value_of(&def.criteria);
            let percent = if target == 0 {
                100
            } else {
                ((current.min(target) * 100) / target) as u8
            };
            AchievementProgress {
                achievement_id: def.id,
                name: def.name.clone(),
                description: def.description.clone(),
                category: def.category.clone(),
                points_reward: def.points_reward,
                current,
                target,
                percent,
                times_unlocked: times,
                unlocked: times > 0,
            }
        })
        .collect()
}
