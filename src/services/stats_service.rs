use chrono::{Duration, NaiveDate, Utc};
use std::collections::BTreeSet;
use uuid::Uuid;

use crate::errors::ApiResult;
use crate::models::{Achievement, TrainingSession, UserStats};
use crate::services::TrainingSessionService;

struct AchievementRule {
    id: &'static str,
    title: &'static str,
    description: &'static str,
    metric: Metric,
    target: f64,
}

#[derive(Clone, Copy)]
enum Metric {
    CompletedSessions,
    LongestStreak,
    TotalVolume,
}

const ACHIEVEMENTS: &[AchievementRule] = &[
    AchievementRule {
        id: "first_session",
        title: "First Steps",
        description: "Complete your first training session",
        metric: Metric::CompletedSessions,
        target: 1.0,
    },
    AchievementRule {
        id: "ten_sessions",
        title: "Getting Consistent",
        description: "Complete 10 training sessions",
        metric: Metric::CompletedSessions,
        target: 10.0,
    },
    AchievementRule {
        id: "fifty_sessions",
        title: "Dedicated",
        description: "Complete 50 training sessions",
        metric: Metric::CompletedSessions,
        target: 50.0,
    },
    AchievementRule {
        id: "hundred_sessions",
        title: "Centurion",
        description: "Complete 100 training sessions",
        metric: Metric::CompletedSessions,
        target: 100.0,
    },
    AchievementRule {
        id: "streak_3",
        title: "On a Roll",
        description: "Train 3 days in a row",
        metric: Metric::LongestStreak,
        target: 3.0,
    },
    AchievementRule {
        id: "streak_7",
        title: "Week Warrior",
        description: "Train 7 days in a row",
        metric: Metric::LongestStreak,
        target: 7.0,
    },
    AchievementRule {
        id: "streak_30",
        title: "Unstoppable",
        description: "Train 30 days in a row",
        metric: Metric::LongestStreak,
        target: 30.0,
    },
    AchievementRule {
        id: "volume_10k",
        title: "Heavy Lifter",
        description: "Move 10,000 kg in total",
        metric: Metric::TotalVolume,
        target: 10_000.0,
    },
];

/// Consecutive training days ending today, or yesterday when today is still empty
pub fn current_streak(dates: &BTreeSet<NaiveDate>, today: NaiveDate) -> u32 {
    let mut day = if dates.contains(&today) {
        today
    } else {
        today - Duration::days(1)
    };

    let mut streak = 0;
    while dates.contains(&day) {
        streak += 1;
        day -= Duration::days(1);
    }
    streak
}

pub fn longest_streak(dates: &BTreeSet<NaiveDate>) -> u32 {
    let mut longest = 0;
    let mut run = 0;
    let mut previous: Option<NaiveDate> = None;

    for &date in dates {
        run = match previous {
            Some(prev) if date - prev == Duration::days(1) => run + 1,
            _ => 1,
        };
        longest = longest.max(run);
        previous = Some(date);
    }
    longest
}

pub fn build_achievements(completed_sessions: i64, longest_streak: u32, total_volume: f64) -> Vec<Achievement> {
    ACHIEVEMENTS
        .iter()
        .map(|rule| {
            let value = match rule.metric {
                Metric::CompletedSessions => completed_sessions as f64,
                Metric::LongestStreak => longest_streak as f64,
                Metric::TotalVolume => total_volume,
            };
            Achievement {
                id: rule.id,
                title: rule.title,
                description: rule.description,
                target: rule.target,
                progress: value.min(rule.target),
                unlocked: value >= rule.target,
            }
        })
        .collect()
}

/// Fold completed sessions into stats as of `today`
pub fn summarize(total_sessions: i64, completed: &[TrainingSession], today: NaiveDate) -> UserStats {
    let dates: BTreeSet<NaiveDate> = completed
        .iter()
        .filter_map(|s| s.completed_at)
        .map(|at| at.date_naive())
        .collect();

    let week_start = today - Duration::days(6);
    let sessions_last_7_days = completed
        .iter()
        .filter_map(|s| s.completed_at)
        .filter(|at| at.date_naive() >= week_start && at.date_naive() <= today)
        .count() as i64;

    let total_volume: f64 = completed.iter().map(TrainingSession::total_volume).sum();
    let total_duration_seconds: i64 = completed.iter().filter_map(|s| s.duration_seconds).sum();
    let completed_sessions = completed.len() as i64;
    let longest = longest_streak(&dates);

    UserStats {
        total_sessions,
        completed_sessions,
        total_duration_seconds,
        total_volume,
        sessions_last_7_days,
        current_streak: current_streak(&dates, today),
        longest_streak: longest,
        last_session_date: dates.iter().next_back().copied(),
        achievements: build_achievements(completed_sessions, longest, total_volume),
    }
}

#[derive(Clone)]
pub struct StatsService {
    sessions: TrainingSessionService,
}

impl StatsService {
    pub fn new(sessions: TrainingSessionService) -> Self {
        Self { sessions }
    }

    pub async fn user_stats(&self, user_id: Uuid) -> ApiResult<UserStats> {
        let total = self.sessions.count_sessions(user_id).await?;
        let completed = self.sessions.completed_sessions(user_id).await?;

        Ok(summarize(total, &completed, Utc::now().date_naive()))
    }

    pub async fn achievements(&self, user_id: Uuid) -> ApiResult<Vec<Achievement>> {
        Ok(self.user_stats(user_id).await?.achievements)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SessionExercise, SessionSet, SessionStatus};
    use chrono::{DateTime, TimeZone};
    use proptest::prelude::*;
    use sqlx::types::Json;

    fn day(d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 3, d).unwrap()
    }

    fn dates(days: &[u32]) -> BTreeSet<NaiveDate> {
        days.iter().map(|&d| day(d)).collect()
    }

    fn completed_on(at: DateTime<Utc>, reps: i32, weight: f64) -> TrainingSession {
        TrainingSession {
            id: Uuid::new_v4(),
            user_id: Uuid::nil(),
            routine_id: None,
            name: "Session".to_string(),
            status: SessionStatus::Completed,
            started_at: at - Duration::minutes(45),
            completed_at: Some(at),
            duration_seconds: Some(2700),
            exercises: Json(vec![SessionExercise {
                exercise_id: Uuid::nil(),
                exercise_name: "Squat".to_string(),
                rest_seconds: 90,
                sets: vec![SessionSet {
                    set_number: 1,
                    target_reps: reps,
                    target_weight: Some(weight),
                    reps: Some(reps),
                    weight: Some(weight),
                    completed: true,
                    completed_at: Some(at),
                }],
            }]),
            rest_timer: None,
            notes: None,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_current_streak_includes_today() {
        assert_eq!(current_streak(&dates(&[8, 9, 10]), day(10)), 3);
    }

    #[test]
    fn test_current_streak_survives_until_day_ends() {
        assert_eq!(current_streak(&dates(&[8, 9]), day(10)), 2);
    }

    #[test]
    fn test_current_streak_gap_resets() {
        assert_eq!(current_streak(&dates(&[5, 6, 7]), day(10)), 0);
        assert_eq!(current_streak(&dates(&[6, 7, 9, 10]), day(10)), 2);
        assert_eq!(current_streak(&BTreeSet::new(), day(10)), 0);
    }

    #[test]
    fn test_longest_streak() {
        assert_eq!(longest_streak(&dates(&[1, 2, 3, 5, 6, 10, 11, 12, 13])), 4);
        assert_eq!(longest_streak(&dates(&[7])), 1);
        assert_eq!(longest_streak(&BTreeSet::new()), 0);
    }

    #[test]
    fn test_achievements_progress_is_capped() {
        let achievements = build_achievements(12, 4, 2_500.0);
        let get = |id: &str| achievements.iter().find(|a| a.id == id).unwrap();

        assert!(get("first_session").unlocked);
        assert!(get("ten_sessions").unlocked);
        assert_eq!(get("ten_sessions").progress, 10.0);
        assert!(!get("fifty_sessions").unlocked);
        assert_eq!(get("fifty_sessions").progress, 12.0);
        assert!(get("streak_3").unlocked);
        assert!(!get("streak_7").unlocked);
        assert!(!get("volume_10k").unlocked);
        assert_eq!(achievements.len(), 8);
    }

    #[test]
    fn test_summarize() {
        let today = day(10);
        let at = |d: u32, h: u32| Utc.with_ymd_and_hms(2024, 3, d, h, 0, 0).unwrap();
        let completed = vec![
            completed_on(at(1, 9), 10, 100.0),
            completed_on(at(8, 18), 5, 100.0),
            completed_on(at(9, 7), 5, 100.0),
            completed_on(at(9, 20), 5, 100.0),
        ];

        let stats = summarize(6, &completed, today);
        assert_eq!(stats.total_sessions, 6);
        assert_eq!(stats.completed_sessions, 4);
        assert_eq!(stats.total_volume, 2_500.0);
        assert_eq!(stats.total_duration_seconds, 4 * 2700);
        assert_eq!(stats.sessions_last_7_days, 3);
        assert_eq!(stats.current_streak, 2);
        assert_eq!(stats.longest_streak, 2);
        assert_eq!(stats.last_session_date, Some(day(9)));
    }

    proptest! {
        #[test]
        fn prop_streaks_are_bounded(offsets in proptest::collection::btree_set(0i64..60, 0..40)) {
            let today = day(31);
            let set: BTreeSet<NaiveDate> = offsets.iter().map(|o| today - Duration::days(*o)).collect();

            let current = current_streak(&set, today);
            let longest = longest_streak(&set);
            prop_assert!(current <= longest);
            prop_assert!(longest as usize <= set.len());
        }

        #[test]
        fn prop_unbroken_run_counts_every_day(len in 1i64..45, skip_today in any::<bool>()) {
            let today = day(31);
            let end = if skip_today { today - Duration::days(1) } else { today };
            let set: BTreeSet<NaiveDate> = (0..len).map(|o| end - Duration::days(o)).collect();

            prop_assert_eq!(current_streak(&set, today), len as u32);
            prop_assert_eq!(longest_streak(&set), len as u32);
        }
    }
}
