use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{types::Json, FromRow};
use uuid::Uuid;

use crate::models::exercise::{MuscleGroup, MAX_DESCRIPTION_LEN};
use crate::models::validation::{
    validate_optional_text, validate_reps, validate_rest_seconds, validate_sets, validate_text,
    validate_weight, ValidationError, ValidationResult,
};

pub const MAX_ROUTINE_NAME_LEN: usize = 100;
pub const MAX_ROUTINE_EXERCISES: usize = 50;
pub const MAX_NOTES_LEN: usize = 500;
pub const DEFAULT_REST_SECONDS: i32 = 90;

/// One entry of a routine; its position in the list is its order
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RoutineExercise {
    pub exercise_id: Uuid,
    /// Denormalized so shared snapshots and sessions survive exercise changes
    pub exercise_name: String,
    pub muscle_group: MuscleGroup,
    pub sets: i32,
    pub reps: i32,
    pub weight: Option<f64>,
    pub rest_seconds: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Routine {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub exercises: Json<Vec<RoutineExercise>>,
    pub usage_count: i32,
    pub last_used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Name given to a duplicated routine
pub fn copy_name(name: &str) -> String {
    let candidate = format!("{} (copy)", name.trim());
    if candidate.chars().count() > MAX_ROUTINE_NAME_LEN {
        let keep = MAX_ROUTINE_NAME_LEN - " (copy)".len();
        let truncated: String = name.trim().chars().take(keep).collect();
        format!("{} (copy)", truncated.trim_end())
    } else {
        candidate
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutineExerciseInput {
    pub exercise_id: Uuid,
    pub sets: i32,
    pub reps: i32,
    pub weight: Option<f64>,
    #[serde(default = "default_rest_seconds")]
    pub rest_seconds: i32,
    pub notes: Option<String>,
}

fn default_rest_seconds() -> i32 {
    DEFAULT_REST_SECONDS
}

impl RoutineExerciseInput {
    pub fn validate(&self) -> ValidationResult {
        validate_sets(self.sets)?;
        validate_reps(self.reps)?;
        validate_weight(self.weight)?;
        validate_rest_seconds(self.rest_seconds)?;
        validate_optional_text("Notes", self.notes.as_deref(), MAX_NOTES_LEN)
    }
}

fn validate_exercise_list(exercises: &[RoutineExerciseInput]) -> ValidationResult {
    if exercises.len() > MAX_ROUTINE_EXERCISES {
        return Err(ValidationError(format!(
            "A routine can hold at most {} exercises",
            MAX_ROUTINE_EXERCISES
        )));
    }
    for (index, exercise) in exercises.iter().enumerate() {
        exercise
            .validate()
            .map_err(|err| ValidationError(format!("Exercise {}: {}", index + 1, err.0)))?;
    }
    Ok(())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRoutine {
    pub name: String,
    pub description: Option<String>,
    #[serde(default)]
    pub exercises: Vec<RoutineExerciseInput>,
}

impl CreateRoutine {
    pub fn validate(&self) -> ValidationResult {
        validate_text("Name", &self.name, MAX_ROUTINE_NAME_LEN)?;
        validate_optional_text("Description", self.description.as_deref(), MAX_DESCRIPTION_LEN)?;
        validate_exercise_list(&self.exercises)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateRoutine {
    pub name: Option<String>,
    /// Absent keeps the current value; an empty string clears it
    pub description: Option<String>,
    pub exercises: Option<Vec<RoutineExerciseInput>>,
}

impl UpdateRoutine {
    pub fn validate(&self) -> ValidationResult {
        if let Some(name) = &self.name {
            validate_text("Name", name, MAX_ROUTINE_NAME_LEN)?;
        }
        validate_optional_text("Description", self.description.as_deref(), MAX_DESCRIPTION_LEN)?;
        match &self.exercises {
            Some(exercises) => validate_exercise_list(exercises),
            None => Ok(()),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct RoutineUsage {
    pub id: Uuid,
    pub routine_id: Uuid,
    pub user_id: Uuid,
    pub session_id: Option<Uuid>,
    pub used_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(sets: i32, reps: i32) -> RoutineExerciseInput {
        RoutineExerciseInput {
            exercise_id: Uuid::new_v4(),
            sets,
            reps,
            weight: Some(60.0),
            rest_seconds: 90,
            notes: None,
        }
    }

    #[test]
    fn test_copy_name() {
        assert_eq!(copy_name("Push Day"), "Push Day (copy)");
        let long = "x".repeat(MAX_ROUTINE_NAME_LEN);
        let copied = copy_name(&long);
        assert!(copied.ends_with(" (copy)"));
        assert_eq!(copied.chars().count(), MAX_ROUTINE_NAME_LEN);
    }

    #[test]
    fn test_create_routine_validation_reports_position() {
        let routine = CreateRoutine {
            name: "Legs".to_string(),
            description: None,
            exercises: vec![input(3, 10), input(0, 10)],
        };
        let err = routine.validate().unwrap_err();
        assert!(err.0.starts_with("Exercise 2:"));
    }

    #[test]
    fn test_rest_seconds_defaults_when_missing() {
        let parsed: RoutineExerciseInput = serde_json::from_value(serde_json::json!({
            "exercise_id": Uuid::new_v4(),
            "sets": 3,
            "reps": 8,
            "weight": null
        }))
        .unwrap();
        assert_eq!(parsed.rest_seconds, DEFAULT_REST_SECONDS);
    }

    #[test]
    fn test_update_without_fields_is_valid() {
        assert!(UpdateRoutine::default().validate().is_ok());
    }
}
