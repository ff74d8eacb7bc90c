use crate::domain::models::ProgressionState;
use chrono::NaiveDate;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreakChange {
    Started,
    Extended,
    Unchanged,
    Reset,
    /// Activity dated before the last recorded one; streak untouched.
    Backdated,
}

/// Applies streak continuity for one qualifying activity.
pub fn record_activity(state: &mut ProgressionState, date: NaiveDate) -> StreakChange {
    let change = match state.last_activity_date {
        None => {
            state.current_streak = 1;
            StreakChange::Started
        }
        Some(last) if date == last => StreakChange::Unchanged,
        Some(last) if date < last => StreakChange::Backdated,
        Some(last) if (date - last).num_days() == 1 => {
            state.current_streak += 1;
            StreakChange::Extended
        }
        Some(_) => {
            state.current_streak = 1;
            StreakChange::Reset
        }
    };

    if matches!(
        change,
        StreakChange::Started | StreakChange::Extended | StreakChange::Reset
    ) {
        state.last_activity_date = Some(date);
        state.longest_streak = state.longest_streak.max(state.current_streak);
    }
    change
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    #[test]
    fn test_same_day_is_idempotent() {
        let mut state = ProgressionState::new(Uuid::new_v4());
        assert_eq!(record_activity(&mut state, day(1)), StreakChange::Started);
        assert_eq!(record_activity(&mut state, day(1)), StreakChange::Unchanged);
        assert_eq!(state.current_streak, 1);
    }

    #[test]
    fn test_consecutive_days_extend() {
        let mut state = ProgressionState::new(Uuid::new_v4());
        for d in 1..=4 {
            record_activity(&mut state, day(d));
        }
        assert_eq!(state.current_streak, 4);
        assert_eq!(state.longest_streak, 4);
        assert_eq!(state.last_activity_date, Some(day(4)));
    }

    #[test]
    fn test_gap_resets_but_keeps_longest() {
        let mut state = ProgressionState::new(Uuid::new_v4());
        for d in 1..=5 {
            record_activity(&mut state, day(d));
        }
        assert_eq!(record_activity(&mut state, day(7)), StreakChange::Reset);
        assert_eq!(state.current_streak, 1);
        assert_eq!(state.longest_streak, 5);
    }

    #[test]
    fn test_month_boundary_counts_as_consecutive() {
        let mut state = ProgressionState::new(Uuid::new_v4());
        record_activity(&mut state, NaiveDate::from_ymd_opt(2024, 2, 29).unwrap());
        assert_eq!(record_activity(&mut state, day(1)), StreakChange::Extended);
        assert_eq!(state.current_streak, 2);
    }

    #[test]
    fn test_backdated_activity_leaves_streak_alone() {
        let mut state = ProgressionState::new(Uuid::new_v4());
        record_activity(&mut state, day(10));
        record_activity(&mut state, day(11));
        assert_eq!(record_activity(&mut state, day(3)), StreakChange::Backdated);
        assert_eq!(state.current_streak, 2);
        assert_eq!(state.last_activity_date, Some(day(11)));
    }
}
