use chrono::NaiveDate;
use serde::Serialize;

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Achievement {
    pub id: &'static str,
    pub title: &'static str,
    pub description: &'static str,
    pub target: f64,
    pub progress: f64,
    pub unlocked: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct UserStats {
    pub total_sessions: i64,
    pub completed_sessions: i64,
    pub total_duration_seconds: i64,
    pub total_volume: f64,
    pub sessions_last_7_days: i64,
    pub current_streak: u32,
    pub longest_streak: u32,
    pub last_session_date: Option<NaiveDate>,
    pub achievements: Vec<Achievement>,
}
