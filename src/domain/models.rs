use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub type ChallengeId = i64;
pub type AchievementId = i64;

// ---------- Mood ----------

/// One check-in per user per calendar day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MoodRecord {
    pub id: Uuid,
    pub user_id: Uuid,
    pub date: NaiveDate,
    pub mood_rating: u8,
    pub energy_level: u8,
    pub anxiety_level: u8,
    pub sleep_quality: u8,
    pub activities: Vec<String>,
    pub triggers: Vec<String>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Raw submission as it arrives from the transport layer. Ratings are kept
/// wide so that out-of-range input can be reported instead of truncated.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MoodPayload {
    pub mood_rating: i32,
    pub energy_level: i32,
    pub anxiety_level: i32,
    pub sleep_quality: i32,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub notes: Option<String>,
    /// Defaults to the engine's "today".
    #[serde(default)]
    pub date: Option<NaiveDate>,
}

// ---------- Challenges ----------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "snake_case")]
pub enum ChallengeType {
    MoodCheckin,
    Breathing,
    Gratitude,
    Physical,
    Social,
    Learning,
    Mindfulness,
    Sleep,
    Energy,
    HabitBuilding,
    Fitness,
    Creativity,
}

impl ChallengeType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChallengeType::MoodCheckin => "mood_checkin",
            ChallengeType::Breathing => "breathing",
            ChallengeType::Gratitude => "gratitude",
            ChallengeType::Physical => "physical",
            ChallengeType::Social => "social",
            ChallengeType::Learning => "learning",
            ChallengeType::Mindfulness => "mindfulness",
            ChallengeType::Sleep => "sleep",
            ChallengeType::Energy => "energy",
            ChallengeType::HabitBuilding => "habit_building",
            ChallengeType::Fitness => "fitness",
            ChallengeType::Creativity => "creativity",
        }
    }
}

impl TryFrom<&str> for ChallengeType {
    type Error = ();

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        match value.trim().to_lowercase().as_str() {
            "mood_checkin" => Ok(ChallengeType::MoodCheckin),
            "breathing" => Ok(ChallengeType::Breathing),
            "gratitude" => Ok(ChallengeType::Gratitude),
            "physical" => Ok(ChallengeType::Physical),
            "social" => Ok(ChallengeType::Social),
            "learning" => Ok(ChallengeType::Learning),
            "mindfulness" => Ok(ChallengeType::Mindfulness),
            "sleep" => Ok(ChallengeType::Sleep),
            "energy" => Ok(ChallengeType::Energy),
            "habit_building" => Ok(ChallengeType::HabitBuilding),
            "fitness" => Ok(ChallengeType::Fitness),
            "creativity" => Ok(ChallengeType::Creativity),
            _ => Err(()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeeklyTerms {
    pub points_per_day: u32,
    pub bonus_points: u32,
    pub target_days: u32,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
    #[serde(default)]
    pub is_repeatable: bool,
}

impl WeeklyTerms {
    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start_date && date <= self.end_date
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "variant", rename_all = "snake_case")]
pub enum ChallengeKind {
    Daily { points_reward: u32 },
    Weekly(WeeklyTerms),
}

impl ChallengeKind {
    pub fn label(&self) -> &'static str {
        match self {
            ChallengeKind::Daily { .. } => "daily",
            ChallengeKind::Weekly(_) => "weekly",
        }
    }
}

/// Catalog entry. Authored elsewhere, read-only here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Challenge {
    pub id: ChallengeId,
    pub title: String,
    pub description: String,
    pub challenge_type: ChallengeType,
    pub instructions: String,
    pub duration_minutes: Option<u32>,
    pub target_value: Option<u32>,
    #[serde(default = "default_active")]
    pub is_active: bool,
    pub kind: ChallengeKind,
}

fn default_active() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChallengeCompletion {
    pub id: Uuid,
    pub user_id: Uuid,
    pub challenge_id: ChallengeId,
    pub challenge_type: ChallengeType,
    pub completion_date: NaiveDate,
    pub completion_value: Option<u32>,
    pub notes: Option<String>,
    pub points_earned: u32,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeeklyEnrollment {
    pub id: Uuid,
    pub user_id: Uuid,
    pub challenge_id: ChallengeId,
    /// 1 for the first enrollment, incremented on each repeat.
    pub attempt: u32,
    pub days_completed: u32,
    pub completion_dates: Vec<NaiveDate>,
    pub total_points_earned: u64,
    pub is_completed: bool,
    pub enrolled_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

// ---------- Achievements ----------

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum AchievementMetric {
    TotalPoints,
    #[serde(alias = "mood_streak", alias = "current_streak")]
    StreakDays,
    LongestStreak,
    #[serde(alias = "mood_count")]
    MoodEntriesCount,
    #[serde(alias = "challenge_count")]
    ChallengeCompletions,
    CategoryCompletions,
    ActivityVariety,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AchievementCriteria {
    #[serde(alias = "type")]
    pub metric: AchievementMetric,
    pub target: u64,
    /// Only meaningful for `category_completions`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<ChallengeType>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementDefinition {
    pub id: AchievementId,
    pub name: String,
    pub description: String,
    pub category: String,
    pub points_reward: u32,
    pub criteria: AchievementCriteria,
    #[serde(default)]
    pub is_repeatable: bool,
    #[serde(default = "default_active")]
    pub is_active: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AchievementUnlock {
    pub id: Uuid,
    pub user_id: Uuid,
    pub achievement_id: AchievementId,
    pub earned_at: DateTime<Utc>,
    pub points_earned: u32,
}

// ---------- Progression ----------

pub const LEVEL_STEP_POINTS: u64 = 100;

/// Points, streaks and level for one user. Only the ledger writes it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressionState {
    pub user_id: Uuid,
    pub total_points: u64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_activity_date: Option<NaiveDate>,
    pub level: u32,
    pub points_to_next_level: u64,
    /// Compare-and-set token; 0 means the row has never been stored.
    pub version: i64,
}

impl ProgressionState {
    pub fn new(user_id: Uuid) -> Self {
        Self {
            user_id,
            total_points: 0,
            current_streak: 0,
            longest_streak: 0,
            last_activity_date: None,
            level: 1,
            points_to_next_level: LEVEL_STEP_POINTS,
            version: 0,
        }
    }

    pub fn add_points(&mut self, points: u64) {
        self.total_points += points;
        while self.total_points >= self.points_to_next_level {
            self.level += 1;
            self.points_to_next_level = self.level as u64 * LEVEL_STEP_POINTS;
        }
    }
}

// ---------- Wellness score ----------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ScoreFactors {
    pub mood: f64,
    pub energy: f64,
    pub stability: f64,
    pub consistency: f64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WellnessLevel {
    pub name: String,
    pub color: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WellnessScore {
    pub total_score: u8,
    pub factors: ScoreFactors,
    pub level: WellnessLevel,
    pub entries_considered: usize,
    pub window_days: u32,
}
