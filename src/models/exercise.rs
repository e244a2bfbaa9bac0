use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::validation::{validate_optional_text, validate_text, ValidationResult};

pub const MAX_EXERCISE_NAME_LEN: usize = 100;
pub const MAX_DESCRIPTION_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum MuscleGroup {
    Chest,
    Back,
    Legs,
    Shoulders,
    Arms,
    Core,
    FullBody,
    Cardio,
    Other,
}

impl MuscleGroup {
    pub fn as_str(&self) -> &'static str {
        match self {
            MuscleGroup::Chest => "chest",
            MuscleGroup::Back => "back",
            MuscleGroup::Legs => "legs",
            MuscleGroup::Shoulders => "shoulders",
            MuscleGroup::Arms => "arms",
            MuscleGroup::Core => "core",
            MuscleGroup::FullBody => "full_body",
            MuscleGroup::Cardio => "cardio",
            MuscleGroup::Other => "other",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().replace([' ', '-'], "_").as_str() {
            "chest" => Some(MuscleGroup::Chest),
            "back" => Some(MuscleGroup::Back),
            "legs" => Some(MuscleGroup::Legs),
            "shoulders" => Some(MuscleGroup::Shoulders),
            "arms" => Some(MuscleGroup::Arms),
            "core" => Some(MuscleGroup::Core),
            "full_body" => Some(MuscleGroup::FullBody),
            "cardio" => Some(MuscleGroup::Cardio),
            "other" => Some(MuscleGroup::Other),
            _ => None,
        }
    }

    /// Lenient parse used for AI output; anything unknown becomes `Other`
    pub fn parse_or_other(s: &str) -> Self {
        Self::parse(s).unwrap_or(MuscleGroup::Other)
    }
}

impl TryFrom<String> for MuscleGroup {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        MuscleGroup::parse(&value).ok_or_else(|| format!("unknown muscle group: {}", value))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Exercise {
    pub id: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[sqlx(try_from = "String")]
    pub muscle_group: MuscleGroup,
    pub equipment: Option<String>,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateExercise {
    pub name: String,
    pub muscle_group: MuscleGroup,
    pub equipment: Option<String>,
    pub description: Option<String>,
}

impl CreateExercise {
    pub fn validate(&self) -> ValidationResult {
        validate_text("Name", &self.name, MAX_EXERCISE_NAME_LEN)?;
        validate_optional_text("Equipment", self.equipment.as_deref(), MAX_EXERCISE_NAME_LEN)?;
        validate_optional_text("Description", self.description.as_deref(), MAX_DESCRIPTION_LEN)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateExercise {
    pub name: Option<String>,
    pub muscle_group: Option<MuscleGroup>,
    /// Absent keeps the current value; an empty string clears it
    pub equipment: Option<String>,
    pub description: Option<String>,
}

impl UpdateExercise {
    pub fn validate(&self) -> ValidationResult {
        if let Some(name) = &self.name {
            validate_text("Name", name, MAX_EXERCISE_NAME_LEN)?;
        }
        validate_optional_text("Equipment", self.equipment.as_deref(), MAX_EXERCISE_NAME_LEN)?;
        validate_optional_text("Description", self.description.as_deref(), MAX_DESCRIPTION_LEN)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExerciseQuery {
    pub muscle_group: Option<MuscleGroup>,
    /// Case-insensitive substring match on the name
    pub search: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_muscle_group_parsing() {
        assert_eq!(MuscleGroup::parse("Full Body"), Some(MuscleGroup::FullBody));
        assert_eq!(MuscleGroup::parse("full-body"), Some(MuscleGroup::FullBody));
        assert_eq!(MuscleGroup::parse("CHEST"), Some(MuscleGroup::Chest));
        assert_eq!(MuscleGroup::parse("glutes"), None);
        assert_eq!(MuscleGroup::parse_or_other("glutes"), MuscleGroup::Other);
        assert!(MuscleGroup::try_from("legs".to_string()).is_ok());
    }

    #[test]
    fn test_muscle_group_wire_format() {
        let json = serde_json::to_string(&MuscleGroup::FullBody).unwrap();
        assert_eq!(json, "\"full_body\"");
        assert_eq!(MuscleGroup::FullBody.as_str(), "full_body");
    }

    #[test]
    fn test_create_exercise_validation() {
        let mut exercise = CreateExercise {
            name: "Squat".to_string(),
            muscle_group: MuscleGroup::Legs,
            equipment: Some("Barbell".to_string()),
            description: None,
        };
        assert!(exercise.validate().is_ok());

        exercise.name = "  ".to_string();
        assert!(exercise.validate().is_err());
    }
}
