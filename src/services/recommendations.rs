use crate::domain::models::{Challenge, ChallengeKind, ChallengeType};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Difficulty {
    Easy,
    Medium,
    Hard,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RecommendationOrigin {
    /// A catalog challenge picked for a fired rule.
    Catalog,
    /// A self-contained suggestion straight from the rule table. Its id is the
    /// rule's position (1-8), not a catalog id, so it cannot be completed
    /// through the ledger; clients show it as advice only.
    RuleTable,
    /// Returned by a pluggable external source.
    External,
}

/// A recommended challenge. Only `Catalog` and `External` entries name a
/// challenge the ledger will accept; check `origin` before offering completion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankedChallenge {
    pub challenge: Challenge,
    pub rule: String,
    pub origin: RecommendationOrigin,
    pub mood_relevance: u8,
    pub ai_reason: String,
    pub difficulty_level: Difficulty,
    pub expected_mood_impact: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecommendationRequest {
    pub mood_rating: i32,
    #[serde(default)]
    pub activities: Vec<String>,
    #[serde(default)]
    pub triggers: Vec<String>,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// An external recommendation service. Errors and empty answers make the
/// engine fall back to the rule table.
#[async_trait]
pub trait RecommendationSource: Send + Sync {
    async fn recommend(
        &self,
        user_id: Uuid,
        request: &RecommendationRequest,
        catalog: &[Challenge],
    ) -> anyhow::Result<Vec<RankedChallenge>>;
}

// ─────────────────────────────────────────────────────────
// RULE TABLE
// ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy)]
enum Signal {
    MoodAtMost(i32),
    MoodIs(i32),
    MoodAtLeast(i32),
    ActivityWithTrigger {
        activity: &'static str,
        trigger: &'static str,
    },
    Trigger(&'static str),
}

#[derive(Debug)]
struct Rule {
    key: &'static str,
    signal: Signal,
    fallback_id: i64,
    title: &'static str,
    description: &'static str,
    challenge_type: ChallengeType,
    instructions: &'static str,
    points_reward: u32,
    duration_minutes: u32,
    mood_relevance: u8,
    reason: &'static str,
    difficulty: Difficulty,
    expected_mood_impact: f64,
}

/// Ordered rule table. Insertion order breaks relevance ties, so new rules go
/// where their tie-break position should be.
static RULES: &[Rule] = &[
    Rule {
        key: "low_mood_breathing",
        signal: Signal::MoodAtMost(2),
        fallback_id: 1,
        title: "5-Minute Breathing Exercise",
        description: "Practice deep breathing to calm your mind and reduce stress",
        challenge_type: ChallengeType::Breathing,
        instructions: "Find a quiet space, sit comfortably, and focus on slow, deep breaths for 5 minutes.",
        points_reward: 15,
        duration_minutes: 5,
        mood_relevance: 95,
        reason: "Breathing exercises are highly effective for improving low mood and reducing anxiety.",
        difficulty: Difficulty::Easy,
        expected_mood_impact: 1.5,
    },
    Rule {
        key: "low_mood_gratitude",
        signal: Signal::MoodAtMost(2),
        fallback_id: 2,
        title: "Gratitude Reflection",
        description: "Write down three things you're grateful for today",
        challenge_type: ChallengeType::Gratitude,
        instructions: "Take a moment to reflect and write down three specific things you appreciate today.",
        points_reward: 10,
        duration_minutes: 10,
        mood_relevance: 88,
        reason: "Gratitude practice helps shift focus from negative to positive aspects of life.",
        difficulty: Difficulty::Easy,
        expected_mood_impact: 1.2,
    },
    Rule {
        key: "neutral_mood_walk",
        signal: Signal::MoodIs(3),
        fallback_id: 3,
        title: "10-Minute Walk",
        description: "Take a refreshing walk to boost your energy and mood",
        challenge_type: ChallengeType::Physical,
        instructions: "Step outside or walk indoors for 10 minutes, focusing on your surroundings.",
        points_reward: 20,
        duration_minutes: 10,
        mood_relevance: 85,
        reason: "Light physical activity can help elevate neutral mood and increase energy.",
        difficulty: Difficulty::Easy,
        expected_mood_impact: 1.0,
    },
    Rule {
        key: "neutral_mood_mindfulness",
        signal: Signal::MoodIs(3),
        fallback_id: 4,
        title: "Mindful Moment",
        description: "Practice 5 minutes of mindfulness meditation",
        challenge_type: ChallengeType::Mindfulness,
        instructions: "Sit quietly and focus on the present moment, observing your thoughts without judgment.",
        points_reward: 15,
        duration_minutes: 5,
        mood_relevance: 80,
        reason: "Mindfulness helps maintain emotional balance and prevents mood dips.",
        difficulty: Difficulty::Medium,
        expected_mood_impact: 0.8,
    },
    Rule {
        key: "high_mood_share",
        signal: Signal::MoodAtLeast(4),
        fallback_id: 5,
        title: "Share Positivity",
        description: "Reach out to someone and share something positive",
        challenge_type: ChallengeType::Social,
        instructions: "Send a kind message, compliment, or positive thought to a friend or family member.",
        points_reward: 25,
        duration_minutes: 15,
        mood_relevance: 90,
        reason: "Sharing positivity when you feel good helps maintain high mood and strengthens relationships.",
        difficulty: Difficulty::Medium,
        expected_mood_impact: 0.5,
    },
    Rule {
        key: "high_mood_creative",
        signal: Signal::MoodAtLeast(4),
        fallback_id: 6,
        title: "Creative Expression",
        description: "Spend 15 minutes on a creative activity",
        challenge_type: ChallengeType::Creativity,
        instructions: "Draw, write, sing, or engage in any creative activity that brings you joy.",
        points_reward: 30,
        duration_minutes: 15,
        mood_relevance: 85,
        reason: "Creative activities help maintain positive mood and provide a sense of accomplishment.",
        difficulty: Difficulty::Medium,
        expected_mood_impact: 0.7,
    },
    Rule {
        key: "work_stress_meditation",
        signal: Signal::ActivityWithTrigger {
            activity: "Work",
            trigger: "Work Stress",
        },
        fallback_id: 7,
        title: "Work Break Meditation",
        description: "Take a 5-minute meditation break during work",
        challenge_type: ChallengeType::Mindfulness,
        instructions: "Step away from work, close your eyes, and practice deep breathing or meditation.",
        points_reward: 20,
        duration_minutes: 5,
        mood_relevance: 92,
        reason: "Short meditation breaks can significantly reduce work-related stress.",
        difficulty: Difficulty::Easy,
        expected_mood_impact: 1.3,
    },
    Rule {
        key: "sleep_hygiene",
        signal: Signal::Trigger("Sleep Deprivation"),
        fallback_id: 8,
        title: "Sleep Hygiene Check",
        description: "Review and improve your sleep environment",
        challenge_type: ChallengeType::Sleep,
        instructions: "Check your bedroom temperature, lighting, and prepare for better sleep tonight.",
        points_reward: 15,
        duration_minutes: 10,
        mood_relevance: 88,
        reason: "Improving sleep hygiene can significantly impact mood.",
        difficulty: Difficulty::Easy,
        expected_mood_impact: 1.0,
    },
];

/// A neutral check-in with nothing else to go on carries no signal.
pub fn is_actionable(request: &RecommendationRequest) -> bool {
    (1..=5).contains(&request.mood_rating)
        && (request.mood_rating != 3 || !request.activities.is_empty() || !request.triggers.is_empty())
}

fn has_label(labels: &[String], wanted: &str) -> bool {
    labels.iter().any(|l| l.trim().eq_ignore_ascii_case(wanted))
}

fn mood_band(mood: i32) -> &'static str {
    match mood {
        m if m <= 2 => "low",
        3 => "neutral",
        _ => "high",
    }
}

impl Rule {
    /// Returns the templated reason when the rule fires.
    fn fire(&self, request: &RecommendationRequest) -> Option<String> {
        let mood = request.mood_rating;
        if !is_actionable(request) {
            return None;
        }
        match self.signal {
            Signal::MoodAtMost(max) if mood <= max => {}
            Signal::MoodIs(value) if mood == value => {}
            Signal::MoodAtLeast(min) if mood >= min => {}
            Signal::ActivityWithTrigger { activity, trigger }
                if has_label(&request.activities, activity) && has_label(&request.triggers, trigger) =>
            {
                return Some(format!(
                    "{} detected during \"{}\". {}",
                    trigger, activity, self.reason
                ));
            }
            Signal::Trigger(trigger) if has_label(&request.triggers, trigger) => {
                return Some(format!("{} reported. {}", trigger, self.reason));
            }
            _ => return None,
        }
        Some(format!(
            "You rated your mood {}/5 ({} mood). {}",
            mood,
            mood_band(mood),
            self.reason
        ))
    }

    fn fallback_challenge(&self) -> Challenge {
        Challenge {
            id: self.fallback_id,
            title: self.title.to_string(),
            description: self.description.to_string(),
            challenge_type: self.challenge_type,
            instructions: self.instructions.to_string(),
            duration_minutes: Some(self.duration_minutes),
            target_value: None,
            is_active: true,
            kind: ChallengeKind::Daily {
                points_reward: self.points_reward,
            },
        }
    }

    fn rank(&self, challenge: Challenge, origin: RecommendationOrigin, reason: String) -> RankedChallenge {
        RankedChallenge {
            challenge,
            rule: self.key.to_string(),
            origin,
            mood_relevance: self.mood_relevance,
            ai_reason: reason,
            difficulty_level: self.difficulty,
            expected_mood_impact: self.expected_mood_impact,
        }
    }
}

/// Sorts by relevance (stable, so insertion order breaks ties) and truncates.
pub fn finalize(mut ranked: Vec<RankedChallenge>, limit: usize) -> Vec<RankedChallenge> {
    ranked.sort_by(|a, b| b.mood_relevance.cmp(&a.mood_relevance));
    ranked.truncate(limit);
    ranked
}

/// Self-contained rule-table recommendations. Empty when no rule fires.
pub fn rule_table(request: &RecommendationRequest, limit: usize) -> Vec<RankedChallenge> {
    let ranked = RULES
        .iter()
        .filter_map(|rule| {
            rule.fire(request)
                .map(|reason| rule.rank(rule.fallback_challenge(), RecommendationOrigin::RuleTable, reason))
        })
        .collect();
    finalize(ranked, limit)
}

/// Maps each fired rule onto an active daily catalog challenge of the same type.
/// A catalog entry is used at most once.
pub fn catalog_matches(request: &RecommendationRequest, catalog: &[Challenge]) -> Vec<RankedChallenge> {
    let mut used = HashSet::new();
    let mut ranked = Vec::new();
    for rule in RULES {
        let Some(reason) = rule.fire(request) else {
            continue;
        };
        let candidate = catalog.iter().find(|c| {
            c.is_active
                && c.challenge_type == rule.challenge_type
                && matches!(c.kind, ChallengeKind::Daily { .. })
                && !used.contains(&c.id)
        });
        if let Some(challenge) = candidate {
            used.insert(challenge.id);
            ranked.push(rule.rank(challenge.clone(), RecommendationOrigin::Catalog, reason));
        }
    }
    ranked
}

/// Default catalog-backed source.
pub struct CatalogRecommender;

#[async_trait]
impl RecommendationSource for CatalogRecommender {
    async fn recommend(
        &self,
        _user_id: Uuid,
        request: &RecommendationRequest,
        catalog: &[Challenge],
    ) -> anyhow::Result<Vec<RankedChallenge>> {
        Ok(catalog_matches(request, catalog))
    }
}
