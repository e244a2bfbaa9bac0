use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::models::exercise::MuscleGroup;
use crate::models::validation::{validate_text, ValidationError, ValidationResult};

pub const MAX_CHAT_MESSAGE_LEN: usize = 4000;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
        }
    }
}

impl TryFrom<String> for ChatRole {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "user" => Ok(ChatRole::User),
            "assistant" => Ok(ChatRole::Assistant),
            other => Err(format!("unknown chat role: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ChatMessage {
    pub id: Uuid,
    pub user_id: Uuid,
    #[sqlx(try_from = "String")]
    pub role: ChatRole,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChatRequest {
    pub message: String,
}

impl ChatRequest {
    pub fn validate(&self) -> ValidationResult {
        validate_text("Message", &self.message, MAX_CHAT_MESSAGE_LEN)
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ExperienceLevel {
    Beginner,
    Intermediate,
    Advanced,
}

impl ExperienceLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExperienceLevel::Beginner => "beginner",
            ExperienceLevel::Intermediate => "intermediate",
            ExperienceLevel::Advanced => "advanced",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct GenerateRoutineRequest {
    pub goal: String,
    pub experience_level: ExperienceLevel,
    pub days_per_week: Option<u8>,
    pub equipment: Option<Vec<String>>,
    #[serde(default)]
    pub save: bool,
}

impl GenerateRoutineRequest {
    pub fn validate(&self) -> ValidationResult {
        validate_text("Goal", &self.goal, 500)?;
        if let Some(days) = self.days_per_week {
            if !(1..=7).contains(&days) {
                return Err(ValidationError(
                    "Days per week must be between 1 and 7".to_string(),
                ));
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedExercise {
    pub name: String,
    pub muscle_group: MuscleGroup,
    pub sets: i32,
    pub reps: i32,
    pub rest_seconds: i32,
    pub notes: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct GeneratedRoutine {
    pub name: String,
    pub description: Option<String>,
    pub exercises: Vec<GeneratedExercise>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GenerateRoutineResponse {
    pub routine: GeneratedRoutine,
    /// Present when the request asked for the routine to be saved
    pub saved_routine: Option<crate::models::routine::Routine>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct FormAnalysisRequest {
    pub exercise_name: String,
    pub description: String,
}

impl FormAnalysisRequest {
    pub fn validate(&self) -> ValidationResult {
        validate_text("Exercise name", &self.exercise_name, 100)?;
        validate_text("Description", &self.description, MAX_CHAT_MESSAGE_LEN)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FormAnalysis {
    pub summary: String,
    pub issues: Vec<String>,
    pub cues: Vec<String>,
    /// 1 (unsafe) to 5 (safe)
    pub safety_rating: u8,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_role_round_trip_through_text() {
        assert_eq!(ChatRole::try_from("assistant".to_string()), Ok(ChatRole::Assistant));
        assert!(ChatRole::try_from("system".to_string()).is_err());
        assert_eq!(ChatRole::User.as_str(), "user");
    }

    #[test]
    fn test_generate_request_validation() {
        let mut request = GenerateRoutineRequest {
            goal: "Build strength".to_string(),
            experience_level: ExperienceLevel::Beginner,
            days_per_week: Some(3),
            equipment: None,
            save: false,
        };
        assert!(request.validate().is_ok());

        request.days_per_week = Some(8);
        assert!(request.validate().is_err());
    }
}
