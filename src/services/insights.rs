use crate::domain::models::MoodRecord;
use chrono::{Datelike, Duration, NaiveDate};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RatingAverages {
    pub mood: f64,
    pub energy: f64,
    pub anxiety: f64,
    pub sleep: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WeeklyTrend {
    pub week_start: NaiveDate,
    pub week_end: NaiveDate,
    pub avg_mood: f64,
    pub entries: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TriggerCount {
    pub trigger: String,
    pub count: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoodInsights {
    pub period_start: NaiveDate,
    pub period_end: NaiveDate,
    pub averages: RatingAverages,
    pub weekly_trends: Vec<WeeklyTrend>,
    pub top_triggers: Vec<TriggerCount>,
    pub total_entries: usize,
    /// Share of days in the period with a check-in, 0..=100.
    pub consistency_score: f64,
    pub recommendations: Vec<String>,
    pub daily_affirmation: String,
}

const LOW_MOOD_MAX: u8 = 2;
const TOP_TRIGGERS: usize = 5;
const MAX_RECOMMENDATIONS: usize = 5;
/// Longest period analysed; larger requests are cut to this many days.
pub const MAX_PERIOD_DAYS: u32 = 3650;

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn average(records: &[&MoodRecord], pick: impl Fn(&MoodRecord) -> u8) -> f64 {
    if records.is_empty() {
        return 0.0;
    }
    let sum: u32 = records.iter().map(|r| pick(r) as u32).sum();
    round2(sum as f64 / records.len() as f64)
}

/// Pattern summary for `[end - days + 1, end]`, with `days` capped at
/// [`MAX_PERIOD_DAYS`]. `None` when there is nothing to analyse.
pub fn analyze(records: &[MoodRecord], end: NaiveDate, days: u32) -> Option<MoodInsights> {
    let days = days.clamp(1, MAX_PERIOD_DAYS);
    let start = end
        .checked_sub_signed(Duration::days(days as i64 - 1))
        .unwrap_or(NaiveDate::MIN);
    let mut in_period: Vec<&MoodRecord> = records
        .iter()
        .filter(|r| r.date >= start && r.date <= end)
        .collect();
    if in_period.is_empty() {
        return None;
    }
    in_period.sort_by_key(|r| r.date);

    let averages = RatingAverages {
        mood: average(&in_period, |r| r.mood_rating),
        energy: average(&in_period, |r| r.energy_level),
        anxiety: average(&in_period, |r| r.anxiety_level),
        sleep: average(&in_period, |r| r.sleep_quality),
    };

    let mut weekly_trends = Vec::new();
    let mut week_start = start;
    while week_start <= end {
        let week_end = week_start
            .checked_add_signed(Duration::days(6))
            .map_or(end, |d| d.min(end));
        let week: Vec<&MoodRecord> = in_period
            .iter()
            .copied()
            .filter(|r| r.date >= week_start && r.date <= week_end)
            .collect();
        if !week.is_empty() {
            weekly_trends.push(WeeklyTrend {
                week_start,
                week_end,
                avg_mood: average(&week, |r| r.mood_rating),
                entries: week.len(),
            });
        }
        match week_start.checked_add_signed(Duration::days(7)) {
            Some(next) => week_start = next,
            None => break,
        }
    }

    let top_triggers = low_mood_triggers(&in_period);
    let total_entries = in_period.len();
    let consistency_score = round2((total_entries as f64 / days as f64 * 100.0).min(100.0));

    let latest_mood = in_period.last().map(|r| r.mood_rating);
    let mut insights = MoodInsights {
        period_start: start,
        period_end: end,
        averages,
        weekly_trends,
        top_triggers,
        total_entries,
        consistency_score,
        recommendations: Vec::new(),
        daily_affirmation: daily_affirmation(latest_mood, end),
    };
    insights.recommendations = recommendations(&insights);
    Some(insights)
}

fn low_mood_triggers(records: &[&MoodRecord]) -> Vec<TriggerCount> {
    // Keyed by lowercase so "Work stress" and "work Stress" count together.
    let mut counts: HashMap<String, (String, usize)> = HashMap::new();
    for record in records.iter().filter(|r| r.mood_rating <= LOW_MOOD_MAX) {
        for trigger in &record.triggers {
            let entry = counts
                .entry(trigger.to_lowercase())
                .or_insert_with(|| (trigger.clone(), 0));
            entry.1 += 1;
        }
    }
    let mut sorted: Vec<TriggerCount> = counts
        .into_values()
        .map(|(trigger, count)| TriggerCount { trigger, count })
        .collect();
    sorted.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.trigger.cmp(&b.trigger)));
    sorted.truncate(TOP_TRIGGERS);
    sorted
}

/// Templated suggestions, highest priority first.
pub fn recommendations(insights: &MoodInsights) -> Vec<String> {
    let avg = &insights.averages;
    let mut candidates: Vec<(i32, String)> = Vec::new();

    if avg.mood < 3.0 {
        candidates.push((90, "Consider incorporating a daily gratitude practice".into()));
        candidates.push((70, "Try spending 10 minutes in nature each day".into()));
        candidates.push((60, "Connect with a friend or family member regularly".into()));
    } else if avg.mood >= 4.0 {
        candidates.push((50, "Great mood patterns! Keep up your current routine".into()));
        candidates.push((40, "Consider sharing your wellness strategies with others".into()));
    }

    if avg.energy < 3.0 {
        candidates.push((75, "Try light exercise like walking or stretching".into()));
        candidates.push((55, "Take short breaks throughout the day".into()));
    }

    if avg.anxiety > 3.0 {
        candidates.push((85, "Practice deep breathing exercises daily".into()));
        candidates.push((65, "Consider a short mindfulness meditation".into()));
    }

    if avg.sleep < 3.0 {
        candidates.push((80, "Establish a consistent bedtime routine".into()));
        candidates.push((58, "Limit screen time before bed".into()));
    }

    if let Some(top) = insights.top_triggers.first() {
        candidates.push((
            88,
            format!(
                "Work on coping strategies for '{}', your most common trigger on low days",
                top.trigger
            ),
        ));
    }

    if insights.consistency_score < 50.0 {
        candidates.push((45, "Check in daily to get more accurate insights".into()));
    }

    candidates.sort_by(|a, b| b.0.cmp(&a.0));
    candidates
        .into_iter()
        .map(|(_, text)| text)
        .take(MAX_RECOMMENDATIONS)
        .collect()
}

const LOW_AFFIRMATIONS: &[&str] = &[
    "Today is a new opportunity to feel better",
    "I am stronger than my challenges",
    "Small steps forward are still progress",
    "I deserve compassion, especially from myself",
];

const NEUTRAL_AFFIRMATIONS: &[&str] = &[
    "I am capable of creating positive change",
    "Every day brings new possibilities",
    "I choose to focus on what I can control",
    "I am worthy of happiness and peace",
];

const HIGH_AFFIRMATIONS: &[&str] = &[
    "I radiate positivity and attract good things",
    "My positive energy impacts everyone around me",
    "I am grateful for this moment of joy",
    "I celebrate my progress and achievements",
];

/// Picks an affirmation for the latest mood band; rotates daily.
pub fn daily_affirmation(latest_mood: Option<u8>, date: NaiveDate) -> String {
    let pool = match latest_mood {
        Some(m) if m <= LOW_MOOD_MAX => LOW_AFFIRMATIONS,
        Some(m) if m >= 4 => HIGH_AFFIRMATIONS,
        _ => NEUTRAL_AFFIRMATIONS,
    };
    let index = date.num_days_from_ce().unsigned_abs() as usize % pool.len();
    pool[index].to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn record(date: NaiveDate, mood: u8, triggers: &[&str]) -> MoodRecord {
        MoodRecord {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            date,
            mood_rating: mood,
            energy_level: 2,
            anxiety_level: 4,
            sleep_quality: 2,
            activities: vec![],
            triggers: triggers.iter().map(|t| t.to_string()).collect(),
            notes: None,
            created_at: Utc::now(),
        }
    }

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, d).unwrap()
    }

    #[test]
    fn test_no_records_means_no_insights() {
        assert!(analyze(&[], day(30), 30).is_none());
        let old = vec![record(day(1), 3, &[])];
        assert!(analyze(&old, day(30), 7).is_none());
    }

    #[test]
    fn test_averages_trends_and_triggers() {
        let records = vec![
            record(day(1), 1, &["Work Stress", "Sleep Deprivation"]),
            record(day(2), 2, &["work stress"]),
            record(day(3), 4, &["Deadline"]),
            record(day(9), 3, &[]),
        ];
        let insights = analyze(&records, day(14), 14).unwrap();
        assert_eq!(insights.period_start, day(1));
        assert_eq!(insights.total_entries, 4);
        assert_eq!(insights.averages.mood, 2.5);
        assert_eq!(insights.weekly_trends.len(), 2);
        assert_eq!(insights.weekly_trends[0].entries, 3);
        assert_eq!(insights.top_triggers[0].trigger, "Work Stress");
        assert_eq!(insights.top_triggers[0].count, 2);
        // Triggers on good days are not counted.
        assert!(insights.top_triggers.iter().all(|t| t.trigger != "Deadline"));
        assert!((insights.consistency_score - 28.57).abs() < 0.01);
    }

    #[test]
    fn test_oversized_periods_are_capped_not_overflowed() {
        assert!(analyze(&[], day(30), u32::MAX).is_none());

        let records = vec![record(day(1), 4, &[])];
        let insights = analyze(&records, day(30), 100_000_000).unwrap();
        assert_eq!(
            insights.period_start,
            day(30) - Duration::days(MAX_PERIOD_DAYS as i64 - 1)
        );
        assert_eq!(insights.weekly_trends.len(), 1);

        // Periods reaching the edges of the calendar still terminate.
        let edge = vec![record(NaiveDate::MAX, 3, &["Work"])];
        let insights = analyze(&edge, NaiveDate::MAX, 30).unwrap();
        assert_eq!(insights.weekly_trends.last().map(|w| w.week_end), Some(NaiveDate::MAX));
        let floor = vec![record(NaiveDate::MIN, 3, &[])];
        assert!(analyze(&floor, NaiveDate::MIN, 30).is_some());
    }

    #[test]
    fn test_recommendations_are_capped_and_prioritised() {
        let records = vec![record(day(1), 1, &["Work Stress"]), record(day(2), 2, &[])];
        let insights = analyze(&records, day(2), 2).unwrap();
        assert_eq!(insights.recommendations.len(), MAX_RECOMMENDATIONS);
        assert_eq!(
            insights.recommendations[0],
            "Consider incorporating a daily gratitude practice"
        );
        assert!(insights.recommendations[1].contains("Work Stress"));
    }

    #[test]
    fn test_affirmation_follows_mood_band_and_is_stable() {
        let low = daily_affirmation(Some(1), day(5));
        assert!(LOW_AFFIRMATIONS.contains(&low.as_str()));
        assert_eq!(low, daily_affirmation(Some(2), day(5)));
        assert!(HIGH_AFFIRMATIONS.contains(&daily_affirmation(Some(5), day(5)).as_str()));
        assert!(NEUTRAL_AFFIRMATIONS.contains(&daily_affirmation(None, day(5)).as_str()));
    }
}
