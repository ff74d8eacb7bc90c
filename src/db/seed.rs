use crate::domain::models::{
    AchievementCriteria, AchievementDefinition, AchievementMetric, Challenge, ChallengeKind,
    ChallengeType, WeeklyTerms,
};
use anyhow::{Context, Result};
use chrono::{Duration, NaiveDate};
use sqlx::types::Json;
use sqlx::PgPool;

struct SeedDaily<'a> {
    id: i64,
    title: &'a str,
    description: &'a str,
    challenge_type: ChallengeType,
    instructions: &'a str,
    points_reward: u32,
    duration_minutes: Option<u32>,
    target_value: Option<u32>,
}

struct SeedWeekly<'a> {
    id: i64,
    title: &'a str,
    description: &'a str,
    challenge_type: ChallengeType,
    instructions: &'a str,
    target_days: u32,
    points_per_day: u32,
    bonus_points: u32,
}

const DAILY: &[SeedDaily<'static>] = &[
    SeedDaily {
        id: 101,
        title: "Morning Gratitude",
        description: "Write down 3 things you're grateful for today",
        challenge_type: ChallengeType::Gratitude,
        instructions: "Take a moment to reflect on positive aspects of your life. Write down three specific things you're grateful for, no matter how big or small.",
        points_reward: 10,
        duration_minutes: Some(5),
        target_value: None,
    },
    SeedDaily {
        id: 102,
        title: "Deep Breathing Exercise",
        description: "Practice 4-7-8 breathing technique for 5 minutes",
        challenge_type: ChallengeType::Breathing,
        instructions: "Inhale for 4 counts, hold for 7 counts, exhale for 8 counts. Repeat this cycle for 5 minutes.",
        points_reward: 15,
        duration_minutes: Some(5),
        target_value: None,
    },
    SeedDaily {
        id: 103,
        title: "10-Minute Walk",
        description: "Take a 10-minute walk outside or indoors",
        challenge_type: ChallengeType::Physical,
        instructions: "Go for a brisk 10-minute walk. Focus on your surroundings and try to clear your mind.",
        points_reward: 12,
        duration_minutes: Some(10),
        target_value: Some(10),
    },
    SeedDaily {
        id: 104,
        title: "Connect with Someone",
        description: "Reach out to a friend, family member, or colleague",
        challenge_type: ChallengeType::Social,
        instructions: "Send a message, make a call, or have a conversation with someone you care about.",
        points_reward: 8,
        duration_minutes: Some(10),
        target_value: None,
    },
    SeedDaily {
        id: 105,
        title: "Mindful Meditation",
        description: "Practice mindfulness meditation for 10 minutes",
        challenge_type: ChallengeType::Mindfulness,
        instructions: "Find a quiet space, sit comfortably, and focus on your breath. When your mind wanders, gently bring attention back.",
        points_reward: 20,
        duration_minutes: Some(10),
        target_value: None,
    },
    SeedDaily {
        id: 106,
        title: "Learn Something New",
        description: "Spend 15 minutes learning about a topic that interests you",
        challenge_type: ChallengeType::Learning,
        instructions: "Read an article, watch an educational video, or practice a new skill.",
        points_reward: 15,
        duration_minutes: Some(15),
        target_value: None,
    },
    SeedDaily {
        id: 107,
        title: "Hydration Check",
        description: "Drink 8 glasses of water throughout the day",
        challenge_type: ChallengeType::Physical,
        instructions: "Keep track of your water intake and notice how proper hydration affects your energy.",
        points_reward: 8,
        duration_minutes: None,
        target_value: Some(8),
    },
    SeedDaily {
        id: 108,
        title: "Digital Detox Hour",
        description: "Spend 1 hour without screens or social media",
        challenge_type: ChallengeType::Mindfulness,
        instructions: "Take a break from all digital devices for one hour. Read, walk, or do something offline.",
        points_reward: 18,
        duration_minutes: Some(60),
        target_value: None,
    },
    SeedDaily {
        id: 109,
        title: "Positive Affirmations",
        description: "Practice 5 positive affirmations about yourself",
        challenge_type: ChallengeType::Gratitude,
        instructions: "Say 5 positive things about yourself. Focus on your strengths and achievements.",
        points_reward: 10,
        duration_minutes: Some(5),
        target_value: Some(5),
    },
    SeedDaily {
        id: 110,
        title: "Stretch Break",
        description: "Do 10 minutes of stretching exercises",
        challenge_type: ChallengeType::Physical,
        instructions: "Stretch the areas that feel tense. Stretching improves flexibility and reduces physical stress.",
        points_reward: 12,
        duration_minutes: Some(10),
        target_value: None,
    },
    SeedDaily {
        id: 111,
        title: "Wind-Down Routine",
        description: "Start a calming routine one hour before bed",
        challenge_type: ChallengeType::Sleep,
        instructions: "Dim the lights, put screens away, and do something relaxing like reading or gentle stretching.",
        points_reward: 12,
        duration_minutes: Some(30),
        target_value: None,
    },
    SeedDaily {
        id: 112,
        title: "Creative Sketch",
        description: "Spend 15 minutes drawing, writing or making music",
        challenge_type: ChallengeType::Creativity,
        instructions: "Pick any creative outlet and enjoy the process without judging the result.",
        points_reward: 15,
        duration_minutes: Some(15),
        target_value: None,
    },
];

const WEEKLY: &[SeedWeekly<'static>] = &[
    SeedWeekly {
        id: 201,
        title: "Daily Mood Tracking",
        description: "Log your mood every day for a week",
        challenge_type: ChallengeType::HabitBuilding,
        instructions: "Make it a habit to check in with yourself daily. Rate your mood, energy, and note significant events.",
        target_days: 7,
        points_per_day: 15,
        bonus_points: 50,
    },
    SeedWeekly {
        id: 202,
        title: "Exercise Every Day",
        description: "Do at least 20 minutes of physical activity daily",
        challenge_type: ChallengeType::Fitness,
        instructions: "Engage in any form of physical activity for at least 20 minutes each day.",
        target_days: 7,
        points_per_day: 20,
        bonus_points: 75,
    },
    SeedWeekly {
        id: 203,
        title: "Meditation Week",
        description: "Practice meditation for 10 minutes daily",
        challenge_type: ChallengeType::Mindfulness,
        instructions: "Dedicate 10 minutes each day to meditation or mindfulness practice.",
        target_days: 7,
        points_per_day: 18,
        bonus_points: 60,
    },
    SeedWeekly {
        id: 204,
        title: "Social Connection Challenge",
        description: "Connect with someone meaningful each day",
        challenge_type: ChallengeType::Social,
        instructions: "Reach out to friends, family, or colleagues and have a meaningful conversation.",
        target_days: 5,
        points_per_day: 12,
        bonus_points: 40,
    },
    SeedWeekly {
        id: 205,
        title: "Creative Expression Week",
        description: "Engage in creative activities daily",
        challenge_type: ChallengeType::Creativity,
        instructions: "Spend time drawing, writing, making music or crafting, whatever brings you joy.",
        target_days: 5,
        points_per_day: 15,
        bonus_points: 45,
    },
];

/// Length of a seeded weekly window past its first day.
const WEEKLY_WINDOW_DAYS: i64 = 7;

fn weekly_window_end(today: NaiveDate) -> NaiveDate {
    today
        .checked_add_signed(Duration::days(WEEKLY_WINDOW_DAYS))
        .unwrap_or(NaiveDate::MAX)
}

/// Moves every weekly window that ended before `today` to
/// `today..=today + 7`. Returns how many challenges moved.
pub fn roll_expired_windows(catalog: &mut [Challenge], today: NaiveDate) -> usize {
    let mut rolled = 0;
    for challenge in catalog.iter_mut() {
        if let ChallengeKind::Weekly(terms) = &mut challenge.kind {
            if terms.end_date < today {
                terms.start_date = today;
                terms.end_date = weekly_window_end(today);
                rolled += 1;
            }
        }
    }
    rolled
}

/// Default catalog. Weekly windows run from `today` through `today + 7`.
pub fn default_challenges(today: NaiveDate) -> Vec<Challenge> {
    let daily = DAILY.iter().map(|d| Challenge {
        id: d.id,
        title: d.title.to_string(),
        description: d.description.to_string(),
        challenge_type: d.challenge_type,
        instructions: d.instructions.to_string(),
        duration_minutes: d.duration_minutes,
        target_value: d.target_value,
        is_active: true,
        kind: ChallengeKind::Daily {
            points_reward: d.points_reward,
        },
    });
    let weekly = WEEKLY.iter().map(|w| Challenge {
        id: w.id,
        title: w.title.to_string(),
        description: w.description.to_string(),
        challenge_type: w.challenge_type,
        instructions: w.instructions.to_string(),
        duration_minutes: None,
        target_value: Some(w.target_days),
        is_active: true,
        kind: ChallengeKind::Weekly(WeeklyTerms {
            points_per_day: w.points_per_day,
            bonus_points: w.bonus_points,
            target_days: w.target_days,
            start_date: today,
            end_date: weekly_window_end(today),
            is_repeatable: false,
        }),
    });
    daily.chain(weekly).collect()
}

fn achievement(
    id: i64,
    name: &str,
    description: &str,
    category: &str,
    points_reward: u32,
    metric: AchievementMetric,
    target: u64,
) -> AchievementDefinition {
    AchievementDefinition {
        id,
        name: name.to_string(),
        description: description.to_string(),
        category: category.to_string(),
        points_reward,
        criteria: AchievementCriteria {
            metric,
            target,
            category: None,
        },
        is_repeatable: false,
        is_active: true,
    }
}

pub fn default_achievements() -> Vec<AchievementDefinition> {
    use AchievementMetric::*;
    vec![
        achievement(1, "First Mood Entry", "Log your first mood entry", "wellness", 10, MoodEntriesCount, 1),
        achievement(2, "3-Day Streak", "Log your mood for 3 consecutive days", "wellness", 25, StreakDays, 3),
        achievement(3, "7-Day Streak", "Log your mood for 7 consecutive days", "wellness", 50, StreakDays, 7),
        achievement(4, "30-Day Streak", "Log your mood for 30 consecutive days", "wellness", 200, StreakDays, 30),
        achievement(5, "First Challenge", "Complete your first challenge", "engagement", 15, ChallengeCompletions, 1),
        achievement(6, "10 Challenges", "Complete 10 challenges", "engagement", 75, ChallengeCompletions, 10),
        achievement(7, "50 Challenges", "Complete 50 challenges", "engagement", 250, ChallengeCompletions, 50),
        achievement(8, "Wellness Explorer", "Try five different types of wellness activities", "milestone", 100, ActivityVariety, 5),
    ]
}

pub async fn seed_all(pool: &PgPool, today: NaiveDate) -> Result<()> {
    seed_challenges(pool, today).await.context("seeding challenges")?;
    seed_achievements(pool).await.context("seeding achievements")?;
    Ok(())
}

async fn seed_challenges(pool: &PgPool, today: NaiveDate) -> Result<()> {
    for challenge in default_challenges(today) {
        let (variant, points_reward, bonus_points, target_days, start_date, end_date, is_repeatable) =
            match &challenge.kind {
                ChallengeKind::Daily { points_reward } => ("daily", *points_reward, 0, 0, None, None, false),
                ChallengeKind::Weekly(t) => (
                    "weekly",
                    t.points_per_day,
                    t.bonus_points,
                    t.target_days,
                    Some(t.start_date),
                    Some(t.end_date),
                    t.is_repeatable,
                ),
            };
        // Expired weekly windows roll forward; everything else is left as authored.
        sqlx::query(
            r#"
            INSERT INTO challenges
                (id, title, description, challenge_type, instructions, duration_minutes,
                 target_value, is_active, variant, points_reward, bonus_points, target_days,
                 start_date, end_date, is_repeatable)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15)
            ON CONFLICT (id) DO UPDATE SET
                start_date = EXCLUDED.start_date,
                end_date = EXCLUDED.end_date
            WHERE challenges.end_date < EXCLUDED.start_date
            "#,
        )
        .bind(challenge.id)
        .bind(&challenge.title)
        .bind(&challenge.description)
        .bind(challenge.challenge_type.as_str())
        .bind(&challenge.instructions)
        .bind(challenge.duration_minutes.map(|v| v as i32))
        .bind(challenge.target_value.map(|v| v as i32))
        .bind(challenge.is_active)
        .bind(variant)
        .bind(points_reward as i32)
        .bind(bonus_points as i32)
        .bind(target_days as i32)
        .bind(start_date)
        .bind(end_date)
        .bind(is_repeatable)
        .execute(pool)
        .await?;
    }
    Ok(())
}

async fn seed_achievements(pool: &PgPool) -> Result<()> {
    for def in default_achievements() {
        sqlx::query(
            r#"
            INSERT INTO achievement_definitions
                (id, name, description, category, points_reward, criteria, is_repeatable, is_active)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            ON CONFLICT (id) DO NOTHING
            "#,
        )
        .bind(def.id)
        .bind(&def.name)
        .bind(&def.description)
        .bind(&def.category)
        .bind(def.points_reward as i32)
        .bind(Json(&def.criteria))
        .bind(def.is_repeatable)
        .bind(def.is_active)
        .execute(pool)
        .await?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    #[test]
    fn test_catalog_ids_are_unique_and_clear_of_rule_ids() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let catalog = default_challenges(today);
        let ids: HashSet<i64> = catalog.iter().map(|c| c.id).collect();
        assert_eq!(ids.len(), catalog.len());
        assert!(ids.iter().all(|id| *id > 8));
    }

    #[test]
    fn test_weekly_windows_start_today() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        for challenge in default_challenges(today) {
            if let ChallengeKind::Weekly(terms) = challenge.kind {
                assert_eq!(terms.start_date, today);
                assert!(terms.contains(today + Duration::days(7)));
                assert!(terms.target_days <= 8);
            }
        }
    }

    #[test]
    fn test_expired_windows_roll_forward() {
        let seeded = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let mut catalog = default_challenges(seeded);

        assert_eq!(roll_expired_windows(&mut catalog, seeded + Duration::days(7)), 0);

        let later = seeded + Duration::days(30);
        assert_eq!(roll_expired_windows(&mut catalog, later), WEEKLY.len());
        for challenge in &catalog {
            match &challenge.kind {
                ChallengeKind::Weekly(terms) => {
                    assert_eq!(terms.start_date, later);
                    assert_eq!(terms.end_date, later + Duration::days(7));
                }
                ChallengeKind::Daily { .. } => {}
            }
        }
    }

    #[test]
    fn test_every_rule_type_has_a_daily_entry() {
        let today = NaiveDate::from_ymd_opt(2024, 3, 4).unwrap();
        let catalog = default_challenges(today);
        for ty in [
            ChallengeType::Breathing,
            ChallengeType::Gratitude,
            ChallengeType::Physical,
            ChallengeType::Mindfulness,
            ChallengeType::Social,
            ChallengeType::Creativity,
            ChallengeType::Sleep,
        ] {
            assert!(catalog
                .iter()
                .any(|c| c.challenge_type == ty && matches!(c.kind, ChallengeKind::Daily { .. })));
        }
    }

    #[test]
    fn test_achievement_catalog() {
        let defs = default_achievements();
        assert_eq!(defs.len(), 8);
        assert_eq!(defs[3].criteria.metric, AchievementMetric::StreakDays);
        assert_eq!(defs[3].criteria.target, 30);
        assert_eq!(defs[7].points_reward, 100);
    }
}
