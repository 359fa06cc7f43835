use chrono::{DateTime, Duration, NaiveDate, Utc};

/// A user's streak counter and the day it was last advanced.
///
/// `streak == 0` exactly when `last_log_date` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StreakState {
    pub streak: u32,
    pub last_log_date: Option<NaiveDate>,
}

impl StreakState {
    pub fn new(streak: u32, last_log_date: Option<NaiveDate>) -> Self {
        Self {
            streak,
            last_log_date,
        }
    }
}

/// Streak days are UTC calendar days.
pub fn log_day(timestamp: DateTime<Utc>) -> NaiveDate {
    timestamp.date_naive()
}

/// Applies one logged entry on `today` to `state`.
///
/// Same-day entries leave the counter alone, an entry the day after the last
/// one extends it, anything later restarts it at one. A `today` earlier than
/// the last log day (clock moved backwards) is treated like a same-day entry.
pub fn advance_streak(state: StreakState, today: NaiveDate) -> StreakState {
    match state.last_log_date {
        Some(last) if last >= today => state,
        Some(last) if last + Duration::days(1) == today => StreakState {
            streak: state.streak.saturating_add(1).max(1),
            last_log_date: Some(today),
        },
        _ => StreakState {
            streak: 1,
            last_log_date: Some(today),
        },
    }
}
