use crate::domain::models::{MoodPayload, MoodRecord};
use crate::error::ValidationError;
use chrono::{DateTime, Duration, NaiveDate, Utc};
use std::collections::HashSet;
use uuid::Uuid;

pub const MAX_MOOD_NOTES_LEN: usize = 500;

pub fn check_rating(field: &'static str, value: i32) -> Result<u8, ValidationError> {
    if (1..=5).contains(&value) {
        Ok(value as u8)
    } else {
        Err(ValidationError::OutOfRange { field, value })
    }
}

/// Accepts `today` and up to `grace_days` days before it. Anything older
/// would credit points without ever touching the streak.
pub fn check_activity_date(date: NaiveDate, today: NaiveDate, grace_days: u32) -> Result<(), ValidationError> {
    let earliest = today
        .checked_sub_signed(Duration::days(grace_days as i64))
        .unwrap_or(NaiveDate::MIN);
    if date > today || date < earliest {
        return Err(ValidationError::InvalidDate { date, earliest, today });
    }
    Ok(())
}

/// Trims notes, drops empty ones and enforces the length cap.
pub fn check_notes(notes: Option<&str>, max: usize) -> Result<Option<String>, ValidationError> {
    let Some(raw) = notes else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let len = trimmed.chars().count();
    if len > max {
        return Err(ValidationError::NotesTooLong { max, len });
    }
    Ok(Some(trimmed.to_string()))
}

/// De-duplicates labels case-insensitively, keeping the first spelling seen.
pub fn normalize_labels(labels: &[String]) -> Vec<String> {
    let mut seen = HashSet::new();
    labels
        .iter()
        .map(|label| label.trim())
        .filter(|label| !label.is_empty())
        .filter(|label| seen.insert(label.to_lowercase()))
        .map(str::to_string)
        .collect()
}

/// Validates a raw payload and turns it into a record ready to persist.
/// Duplicate detection needs storage and lives in the engine.
pub fn build_record(
    user_id: Uuid,
    payload: &MoodPayload,
    today: NaiveDate,
    grace_days: u32,
    now: DateTime<Utc>,
) -> Result<MoodRecord, ValidationError> {
    let mood_rating = check_rating("mood_rating", payload.mood_rating)?;
    let energy_level = check_rating("energy_level", payload.energy_level)?;
    let anxiety_level = check_rating("anxiety_level", payload.anxiety_level)?;
    let sleep_quality = check_rating("sleep_quality", payload.sleep_quality)?;

    let date = payload.date.unwrap_or(today);
    check_activity_date(date, today, grace_days)?;
    let notes = check_notes(payload.notes.as_deref(), MAX_MOOD_NOTES_LEN)?;

    Ok(MoodRecord {
        id: Uuid::new_v4(),
        user_id,
        date,
        mood_rating,
        energy_level,
        anxiety_level,
        sleep_quality,
        activities: normalize_labels(&payload.activities),
        triggers: normalize_labels(&payload.triggers),
        notes,
        created_at: now,
    })
}
