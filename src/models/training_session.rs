use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::models::routine::{RoutineExercise, RoutineExerciseInput, DEFAULT_REST_SECONDS, MAX_NOTES_LEN};
use crate::models::validation::{
    validate_optional_text, validate_reps, validate_weight, ValidationError, ValidationResult,
};

pub const MAX_REST_TIMER_SECONDS: i64 = 3600;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    InProgress,
    Completed,
}

impl SessionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SessionStatus::InProgress => "in_progress",
            SessionStatus::Completed => "completed",
        }
    }
}

impl TryFrom<String> for SessionStatus {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "in_progress" => Ok(SessionStatus::InProgress),
            "completed" => Ok(SessionStatus::Completed),
            other => Err(format!("unknown session status: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSet {
    pub set_number: i32,
    pub target_reps: i32,
    pub target_weight: Option<f64>,
    pub reps: Option<i32>,
    pub weight: Option<f64>,
    pub completed: bool,
    pub completed_at: Option<DateTime<Utc>>,
}

impl SessionSet {
    /// Weight moved in this set; only completed sets count
    pub fn volume(&self) -> f64 {
        if !self.completed {
            return 0.0;
        }
        let reps = self.reps.unwrap_or(self.target_reps) as f64;
        let weight = self.weight.or(self.target_weight).unwrap_or(0.0);
        reps * weight
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionExercise {
    pub exercise_id: Uuid,
    pub exercise_name: String,
    pub rest_seconds: i32,
    pub sets: Vec<SessionSet>,
}

impl SessionExercise {
    pub fn from_routine_exercise(exercise: &RoutineExercise) -> Self {
        let sets = (1..=exercise.sets)
            .map(|set_number| SessionSet {
                set_number,
                target_reps: exercise.reps,
                target_weight: exercise.weight,
                reps: None,
                weight: None,
                completed: false,
                completed_at: None,
            })
            .collect();

        Self {
            exercise_id: exercise.exercise_id,
            exercise_name: exercise.exercise_name.clone(),
            rest_seconds: exercise.rest_seconds,
            sets,
        }
    }
}

/// Countdown persisted as wall-clock start plus duration, so a reload never loses it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct RestTimer {
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i64,
}

impl RestTimer {
    pub fn new(started_at: DateTime<Utc>, duration_seconds: i64) -> Self {
        Self {
            started_at,
            duration_seconds,
        }
    }

    pub fn ends_at(&self) -> DateTime<Utc> {
        self.started_at + Duration::seconds(self.duration_seconds)
    }

    /// Whole seconds left, rounded up, never negative
    pub fn remaining_seconds(&self, now: DateTime<Utc>) -> i64 {
        let remaining_ms = (self.ends_at() - now).num_milliseconds();
        if remaining_ms <= 0 {
            0
        } else {
            (remaining_ms + 999) / 1000
        }
    }

    pub fn status(&self, now: DateTime<Utc>) -> RestTimerStatus {
        let remaining_seconds = self.remaining_seconds(now);
        RestTimerStatus {
            started_at: self.started_at,
            duration_seconds: self.duration_seconds,
            ends_at: self.ends_at(),
            remaining_seconds,
            finished: remaining_seconds == 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RestTimerStatus {
    pub started_at: DateTime<Utc>,
    pub duration_seconds: i64,
    pub ends_at: DateTime<Utc>,
    pub remaining_seconds: i64,
    pub finished: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct TrainingSession {
    pub id: Uuid,
    pub user_id: Uuid,
    pub routine_id: Option<Uuid>,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub status: SessionStatus,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub duration_seconds: Option<i64>,
    pub exercises: Json<Vec<SessionExercise>>,
    pub rest_timer: Option<Json<RestTimer>>,
    pub notes: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrainingSession {
    pub fn is_completed(&self) -> bool {
        self.status == SessionStatus::Completed
    }

    pub fn total_volume(&self) -> f64 {
        self.exercises
            .iter()
            .flat_map(|e| e.sets.iter())
            .map(SessionSet::volume)
            .sum()
    }

    pub fn completed_sets(&self) -> usize {
        self.exercises
            .iter()
            .flat_map(|e| e.sets.iter())
            .filter(|s| s.completed)
            .count()
    }

    /// Rest length of the exercise whose set was completed last, else the first one
    pub fn default_rest_seconds(&self) -> i64 {
        let last_touched = self
            .exercises
            .iter()
            .filter_map(|e| {
                e.sets
                    .iter()
                    .filter_map(|s| s.completed_at)
                    .max()
                    .map(|at| (at, e.rest_seconds))
            })
            .max_by_key(|(at, _)| *at)
            .map(|(_, rest)| rest);

        let rest = last_touched
            .or_else(|| self.exercises.first().map(|e| e.rest_seconds))
            .unwrap_or(DEFAULT_REST_SECONDS);

        if rest > 0 {
            rest as i64
        } else {
            DEFAULT_REST_SECONDS as i64
        }
    }
}

/// Apply a set update in place. `now` stamps the first completion.
pub fn apply_set_update(
    exercises: &mut [SessionExercise],
    exercise_index: usize,
    set_index: usize,
    update: &UpdateSet,
    now: DateTime<Utc>,
) -> Option<()> {
    let set = exercises
        .get_mut(exercise_index)?
        .sets
        .get_mut(set_index)?;

    if let Some(reps) = update.reps {
        set.reps = Some(reps);
    }
    if let Some(weight) = update.weight {
        set.weight = Some(weight);
    }
    if let Some(completed) = update.completed {
        if completed && !set.completed {
            set.completed_at = Some(now);
        } else if !completed {
            set.completed_at = None;
        }
        set.completed = completed;
    }

    Some(())
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StartSession {
    pub routine_id: Option<Uuid>,
    pub name: Option<String>,
    /// Ad hoc exercises, used when no routine is given
    pub exercises: Option<Vec<RoutineExerciseInput>>,
}

impl StartSession {
    pub fn validate(&self) -> ValidationResult {
        match (&self.routine_id, &self.exercises) {
            (Some(_), Some(_)) => Err(ValidationError(
                "Provide either a routine or ad hoc exercises, not both".to_string(),
            )),
            (None, None) => Err(ValidationError(
                "A session needs a routine or at least one exercise".to_string(),
            )),
            (None, Some(exercises)) if exercises.is_empty() => Err(ValidationError(
                "A session needs a routine or at least one exercise".to_string(),
            )),
            (None, Some(exercises)) => {
                for (index, exercise) in exercises.iter().enumerate() {
                    exercise.validate().map_err(|err| {
                        ValidationError(format!("Exercise {}: {}", index + 1, err.0))
                    })?;
                }
                Ok(())
            }
            (Some(_), None) => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateSet {
    pub reps: Option<i32>,
    pub weight: Option<f64>,
    pub completed: Option<bool>,
}

impl UpdateSet {
    pub fn validate(&self) -> ValidationResult {
        if let Some(reps) = self.reps {
            // zero reps is a legitimate failed set
            if reps != 0 {
                validate_reps(reps)?;
            }
        }
        validate_weight(self.weight)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CompleteSession {
    pub notes: Option<String>,
}

impl CompleteSession {
    pub fn validate(&self) -> ValidationResult {
        validate_optional_text("Notes", self.notes.as_deref(), MAX_NOTES_LEN)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StartRestTimer {
    pub duration_seconds: Option<i64>,
}

impl StartRestTimer {
    pub fn validate(&self) -> ValidationResult {
        match self.duration_seconds {
            Some(seconds) if !(1..=MAX_REST_TIMER_SECONDS).contains(&seconds) => Err(
                ValidationError(format!(
                    "Rest timer must be between 1 and {} seconds",
                    MAX_REST_TIMER_SECONDS
                )),
            ),
            _ => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SessionQuery {
    pub status: Option<SessionStatus>,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl SessionQuery {
    pub fn validate(&self) -> Result<(), &'static str> {
        if let Some(limit) = self.limit {
            if !(1..=100).contains(&limit) {
                return Err("Limit must be between 1 and 100");
            }
        }
        if let Some(offset) = self.offset {
            if offset < 0 {
                return Err("Offset must be non-negative");
            }
        }
        Ok(())
    }

    pub fn get_limit(&self) -> i64 {
        self.limit.unwrap_or(50).clamp(1, 100)
    }

    pub fn get_offset(&self) -> i64 {
        self.offset.unwrap_or(0).max(0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::exercise::MuscleGroup;
    use chrono::TimeZone;

    fn routine_exercise(sets: i32, rest_seconds: i32) -> RoutineExercise {
        RoutineExercise {
            exercise_id: Uuid::new_v4(),
            exercise_name: "Bench Press".to_string(),
            muscle_group: MuscleGroup::Chest,
            sets,
            reps: 8,
            weight: Some(80.0),
            rest_seconds,
            notes: None,
        }
    }

    fn at(seconds: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000 + seconds, 0).unwrap()
    }

    fn session_with(exercises: Vec<SessionExercise>) -> TrainingSession {
        TrainingSession {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            routine_id: None,
            name: "Test".to_string(),
            status: SessionStatus::InProgress,
            started_at: at(0),
            completed_at: None,
            duration_seconds: None,
            exercises: Json(exercises),
            rest_timer: None,
            notes: None,
            created_at: at(0),
            updated_at: at(0),
        }
    }

    #[test]
    fn test_session_exercise_expands_sets() {
        let exercise = SessionExercise::from_routine_exercise(&routine_exercise(3, 120));
        assert_eq!(exercise.sets.len(), 3);
        assert_eq!(
            exercise.sets.iter().map(|s| s.set_number).collect::<Vec<_>>(),
            vec![1, 2, 3]
        );
        assert!(exercise.sets.iter().all(|s| !s.completed && s.target_reps == 8));
        assert_eq!(exercise.sets[0].target_weight, Some(80.0));
    }

    #[test]
    fn test_rest_timer_counts_down_from_wall_clock() {
        let timer = RestTimer::new(at(0), 90);
        assert_eq!(timer.remaining_seconds(at(0)), 90);
        assert_eq!(timer.remaining_seconds(at(30)), 60);
        assert_eq!(timer.remaining_seconds(at(90)), 0);
        assert_eq!(timer.remaining_seconds(at(500)), 0);

        let status = timer.status(at(100));
        assert!(status.finished);
        assert_eq!(status.ends_at, at(90));
    }

    #[test]
    fn test_rest_timer_rounds_partial_seconds_up() {
        let timer = RestTimer::new(at(0), 10);
        let now = at(0) + Duration::milliseconds(9_500);
        assert_eq!(timer.remaining_seconds(now), 1);
        assert!(!timer.status(now).finished);
    }

    #[test]
    fn test_apply_set_update_tracks_completion_time() {
        let mut exercises = vec![SessionExercise::from_routine_exercise(&routine_exercise(2, 60))];
        let update = UpdateSet {
            reps: Some(8),
            weight: Some(82.5),
            completed: Some(true),
        };

        assert!(apply_set_update(&mut exercises, 0, 1, &update, at(10)).is_some());
        let set = &exercises[0].sets[1];
        assert!(set.completed);
        assert_eq!(set.completed_at, Some(at(10)));
        assert_eq!(set.weight, Some(82.5));

        // re-completing keeps the first timestamp
        apply_set_update(&mut exercises, 0, 1, &update, at(20)).unwrap();
        assert_eq!(exercises[0].sets[1].completed_at, Some(at(10)));

        let undo = UpdateSet {
            completed: Some(false),
            ..Default::default()
        };
        apply_set_update(&mut exercises, 0, 1, &undo, at(30)).unwrap();
        assert!(!exercises[0].sets[1].completed);
        assert_eq!(exercises[0].sets[1].completed_at, None);
    }

    #[test]
    fn test_apply_set_update_out_of_range() {
        let mut exercises = vec![SessionExercise::from_routine_exercise(&routine_exercise(2, 60))];
        let update = UpdateSet::default();
        assert!(apply_set_update(&mut exercises, 1, 0, &update, at(0)).is_none());
        assert!(apply_set_update(&mut exercises, 0, 2, &update, at(0)).is_none());
    }

    #[test]
    fn test_volume_counts_completed_sets_only() {
        let mut exercises = vec![SessionExercise::from_routine_exercise(&routine_exercise(3, 60))];
        let done = UpdateSet {
            reps: Some(10),
            weight: Some(50.0),
            completed: Some(true),
        };
        apply_set_update(&mut exercises, 0, 0, &done, at(5)).unwrap();
        // completed without explicit values falls back to targets (8 x 80)
        apply_set_update(
            &mut exercises,
            0,
            1,
            &UpdateSet {
                completed: Some(true),
                ..Default::default()
            },
            at(6),
        )
        .unwrap();

        let session = session_with(exercises);
        assert_eq!(session.total_volume(), 500.0 + 640.0);
        assert_eq!(session.completed_sets(), 2);
    }

    #[test]
    fn test_default_rest_follows_last_completed_set() {
        let mut exercises = vec![
            SessionExercise::from_routine_exercise(&routine_exercise(1, 60)),
            SessionExercise::from_routine_exercise(&routine_exercise(1, 180)),
        ];
        assert_eq!(session_with(exercises.clone()).default_rest_seconds(), 60);

        let done = UpdateSet {
            completed: Some(true),
            ..Default::default()
        };
        apply_set_update(&mut exercises, 1, 0, &done, at(5)).unwrap();
        assert_eq!(session_with(exercises.clone()).default_rest_seconds(), 180);

        assert_eq!(
            session_with(vec![]).default_rest_seconds(),
            DEFAULT_REST_SECONDS as i64
        );
    }

    #[test]
    fn test_start_session_validation() {
        assert!(StartSession::default().validate().is_err());
        assert!(StartSession {
            routine_id: Some(Uuid::new_v4()),
            ..Default::default()
        }
        .validate()
        .is_ok());
        assert!(StartSession {
            routine_id: Some(Uuid::new_v4()),
            exercises: Some(vec![]),
            ..Default::default()
        }
        .validate()
        .is_err());
        assert!(StartSession {
            exercises: Some(vec![]),
            ..Default::default()
        }
        .validate()
        .is_err());
    }

    #[test]
    fn test_rest_timer_request_bounds() {
        assert!(StartRestTimer::default().validate().is_ok());
        assert!(StartRestTimer { duration_seconds: Some(0) }.validate().is_err());
        assert!(StartRestTimer { duration_seconds: Some(3601) }.validate().is_err());
        assert!(StartRestTimer { duration_seconds: Some(45) }.validate().is_ok());
    }
}
