use crate::domain::models::{MoodRecord, ScoreFactors, WellnessLevel, WellnessScore};

/// Minimum number of check-ins before a score is computed at all.
pub const MIN_ENTRIES: usize = 3;
const FACTOR_MAX: f64 = 30.0;
/// Largest possible population stdev for values in [1, 5].
const MAX_RATING_STDEV: f64 = 2.0;

/// Highest threshold first; the first row the score reaches wins.
const LEVELS: &[(u8, &str, &str)] = &[
    (80, "Thriving", "green"),
    (60, "Balanced", "blue"),
    (40, "Building Momentum", "orange"),
    (0, "Getting Started", "gray"),
];

pub fn level_for(score: u8) -> WellnessLevel {
    let (_, name, color) = LEVELS
        .iter()
        .find(|(threshold, _, _)| score >= *threshold)
        .copied()
        .unwrap_or((0, "Getting Started", "gray"));
    WellnessLevel {
        name: name.to_string(),
        color: color.to_string(),
    }
}

fn rescale_rating(avg: f64) -> f64 {
    ((avg - 1.0) / 4.0 * FACTOR_MAX).clamp(0.0, FACTOR_MAX)
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

fn population_stdev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let avg = mean(values);
    let variance = values.iter().map(|v| (v - avg).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Composite 0..=100 score over the records of one window. `records` must
/// already be limited to the window; sparse data yields the empty score.
pub fn compute(records: &[MoodRecord], window_days: u32, consistency_bonus_max: f64) -> WellnessScore {
    let window_days = window_days.max(1);
    if records.len() < MIN_ENTRIES {
        return WellnessScore {
            total_score: 0,
            factors: ScoreFactors::default(),
            level: level_for(0),
            entries_considered: records.len(),
            window_days,
        };
    }

    let moods: Vec<f64> = records.iter().map(|r| r.mood_rating as f64).collect();
    let energies: Vec<f64> = records.iter().map(|r| r.energy_level as f64).collect();

    let mood = rescale_rating(mean(&moods));
    let energy = rescale_rating(mean(&energies));
    let spread = (population_stdev(&moods) / MAX_RATING_STDEV * FACTOR_MAX).min(FACTOR_MAX);
    let stability = (FACTOR_MAX - spread).max(0.0);
    let bonus_max = consistency_bonus_max.max(0.0);
    let consistency = (records.len() as f64 / window_days as f64 * bonus_max).min(bonus_max);

    let total = (mood + energy + stability + consistency).round().clamp(0.0, 100.0) as u8;

    WellnessScore {
        total_score: total,
        factors: ScoreFactors {
            mood: round2(mood),
            energy: round2(energy),
            stability: round2(stability),
            consistency: round2(consistency),
        },
        level: level_for(total),
        entries_considered: records.len(),
        window_days,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, NaiveDate, Utc};
    use uuid::Uuid;

    fn records(ratings: &[(u8, u8)]) -> Vec<MoodRecord> {
        let user_id = Uuid::new_v4();
        let start = NaiveDate::from_ymd_opt(2024, 4, 1).unwrap();
        ratings
            .iter()
            .enumerate()
            .map(|(i, (mood, energy))| MoodRecord {
                id: Uuid::new_v4(),
                user_id,
                date: start + Duration::days(i as i64),
                mood_rating: *mood,
                energy_level: *energy,
                anxiety_level: 3,
                sleep_quality: 3,
                activities: vec![],
                triggers: vec![],
                notes: None,
                created_at: Utc::now(),
            })
            .collect()
    }

    #[test]
    fn test_sparse_data_returns_getting_started() {
        let score = compute(&records(&[(5, 5), (5, 5)]), 30, 10.0);
        assert_eq!(score.total_score, 0);
        assert_eq!(score.level.name, "Getting Started");
        assert_eq!(score.factors, ScoreFactors::default());

        let empty = compute(&[], 30, 10.0);
        assert_eq!(empty.total_score, 0);
    }

    #[test]
    fn test_perfect_month_scores_one_hundred() {
        let perfect = vec![(5u8, 5u8); 30];
        let score = compute(&records(&perfect), 30, 10.0);
        assert_eq!(score.total_score, 100);
        assert_eq!(score.level.name, "Thriving");
        assert_eq!(score.factors.stability, 30.0);
        assert_eq!(score.factors.consistency, 10.0);
    }

    #[test]
    fn test_flat_low_mood_is_stable_but_low() {
        let score = compute(&records(&[(1, 1), (1, 1), (1, 1)]), 30, 10.0);
        assert_eq!(score.factors.mood, 0.0);
        assert_eq!(score.factors.energy, 0.0);
        assert_eq!(score.factors.stability, 30.0);
        assert_eq!(score.factors.consistency, 1.0);
        assert_eq!(score.total_score, 31);
        assert_eq!(score.level.name, "Getting Started");
    }

    #[test]
    fn test_volatile_mood_loses_stability() {
        let score = compute(&records(&[(1, 3), (5, 3), (1, 3), (5, 3)]), 4, 10.0);
        // stdev is 2.0, the maximum, so stability bottoms out.
        assert_eq!(score.factors.stability, 0.0);
        assert_eq!(score.factors.mood, 15.0);
        assert_eq!(score.factors.consistency, 10.0);
        assert_eq!(score.total_score, 40);
        assert_eq!(score.level.name, "Building Momentum");
    }

    #[test]
    fn test_score_stays_bounded_for_all_extremes() {
        for rating in 1..=5u8 {
            for window in [1, 3, 7, 30, 365] {
                let score = compute(&records(&vec![(rating, rating); 10]), window, 10.0);
                assert!(score.total_score <= 100);
            }
        }
    }

    #[test]
    fn test_level_table_picks_highest_threshold_met() {
        assert_eq!(level_for(80).name, "Thriving");
        assert_eq!(level_for(79).name, "Balanced");
        assert_eq!(level_for(60).name, "Balanced");
        assert_eq!(level_for(40).name, "Building Momentum");
        assert_eq!(level_for(39).name, "Getting Started");
    }
}
