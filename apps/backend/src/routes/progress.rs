//! Study statistics: streak, accuracy, per-level counts, review forecast.

use std::collections::{HashMap, HashSet};

use axum::{extract::State, Json};
use chrono::{Days, NaiveDate};

use crate::clock;
use crate::error::Result;
use crate::models::{ForecastDay, JlptLevel, LevelStats, ProgressResponse};
use crate::AppState;

const FORECAST_DAYS: i64 = 7;

/// GET /api/progress
pub async fn progress(State(state): State<AppState>) -> Result<Json<ProgressResponse>> {
    let today = clock::today();

    let ((total, correct), level_rows, forecast_rows, timestamps) = tokio::try_join!(
        state.db.review_totals(),
        state.db.level_stats(today),
        state.db.due_forecast(today, FORECAST_DAYS),
        state.db.review_timestamps(),
    )?;

    let review_days: HashSet<NaiveDate> =
        timestamps.into_iter().map(clock::local_date).collect();

    Ok(Json(ProgressResponse {
        streak_days: streak(&review_days, today),
        all_time_accuracy: if total > 0 {
            100.0 * correct as f64 / total as f64
        } else {
            0.0
        },
        total_reviews: total,
        level_stats: zero_filled_levels(level_rows),
        forecast: zero_filled_forecast(forecast_rows, today),
    }))
}

/// Consecutive civil days with at least one review, counting back from
/// today. A quiet today does not break a streak that was alive yesterday.
fn streak(review_days: &HashSet<NaiveDate>, today: NaiveDate) -> i64 {
    let mut cursor = if review_days.contains(&today) {
        today
    } else {
        match today.pred_opt() {
            Some(yesterday) => yesterday,
            None => return 0,
        }
    };

    let mut days = 0;
    while review_days.contains(&cursor) {
        days += 1;
        cursor = match cursor.pred_opt() {
            Some(prev) => prev,
            None => break,
        };
    }
    days
}

/// All five levels in N5→N1 order, zeroes for levels the query omitted.
fn zero_filled_levels(rows: Vec<LevelStats>) -> Vec<LevelStats> {
    let mut by_level: HashMap<JlptLevel, LevelStats> =
        rows.into_iter().map(|r| (r.level, r)).collect();

    JlptLevel::ALL
        .into_iter()
        .map(|level| {
            by_level.remove(&level).unwrap_or(LevelStats {
                level,
                total: 0,
                seen: 0,
                mastered: 0,
                due_today: 0,
            })
        })
        .collect()
}

/// One entry per day for today..today+6, zero counts included.
fn zero_filled_forecast(rows: Vec<ForecastDay>, today: NaiveDate) -> Vec<ForecastDay> {
    let by_date: HashMap<NaiveDate, i64> =
        rows.into_iter().map(|r| (r.date, r.count)).collect();

    (0..FORECAST_DAYS)
        .map(|offset| {
            let date = today + Days::new(offset as u64);
            ForecastDay {
                date,
                count: by_date.get(&date).copied().unwrap_or(0),
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn d(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn streak_counts_back_from_today() {
        let days: HashSet<_> = [d("2025-03-08"), d("2025-03-09"), d("2025-03-10")]
            .into_iter()
            .collect();
        assert_eq!(streak(&days, d("2025-03-10")), 3);
    }

    #[test]
    fn quiet_today_keeps_yesterdays_streak() {
        let days: HashSet<_> = [d("2025-03-08"), d("2025-03-09")].into_iter().collect();
        assert_eq!(streak(&days, d("2025-03-10")), 2);
    }

    #[test]
    fn gap_breaks_the_streak() {
        let days: HashSet<_> = [d("2025-03-06"), d("2025-03-09"), d("2025-03-10")]
            .into_iter()
            .collect();
        assert_eq!(streak(&days, d("2025-03-10")), 2);
    }

    #[test]
    fn no_reviews_means_no_streak() {
        assert_eq!(streak(&HashSet::new(), d("2025-03-10")), 0);
    }

    #[test]
    fn levels_are_zero_filled_in_order() {
        let rows = vec![LevelStats {
            level: JlptLevel::N3,
            total: 10,
            seen: 4,
            mastered: 1,
            due_today: 2,
        }];
        let filled = zero_filled_levels(rows);
        assert_eq!(filled.len(), 5);
        assert_eq!(filled[0].level, JlptLevel::N5);
        assert_eq!(filled[0].total, 0);
        assert_eq!(filled[2].level, JlptLevel::N3);
        assert_eq!(filled[2].total, 10);
    }

    #[test]
    fn forecast_covers_seven_days_with_zeroes() {
        let today = d("2025-03-10");
        let rows = vec![ForecastDay {
            date: d("2025-03-12"),
            count: 4,
        }];
        let filled = zero_filled_forecast(rows, today);
        assert_eq!(filled.len(), 7);
        assert_eq!(filled[0].date, today);
        assert_eq!(filled[0].count, 0);
        assert_eq!(filled[2].count, 4);
        assert_eq!(filled[6].date, d("2025-03-16"));
    }
}
