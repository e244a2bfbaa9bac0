use chrono::Utc;
use serde::Deserialize;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::models::validation::{MAX_REPS, MAX_REST_SECONDS, MAX_SETS};
use crate::models::{
    ChatMessage, ChatRequest, ChatRole, FormAnalysis, FormAnalysisRequest, GenerateRoutineRequest,
    GenerateRoutineResponse, GeneratedExercise, GeneratedRoutine, MuscleGroup, RoutineExercise,
    DEFAULT_REST_SECONDS, MAX_ROUTINE_EXERCISES, MAX_ROUTINE_NAME_LEN,
};
use crate::services::ai_client::{AiClient, AssistantError, PromptMessage};
use crate::services::{ExerciseService, RoutineService};

pub const HISTORY_WINDOW: i64 = 20;

pub const SYSTEM_PROMPT: &str = "You are Routine Coach, a friendly strength and conditioning \
assistant. Give practical, safe training advice in short paragraphs. Recommend seeing a \
professional for pain or injury. Use kilograms for weights.";

const ROUTINE_PROMPT: &str = "Design one workout routine. Reply with a JSON object only: \
{\"name\": string, \"description\": string, \"exercises\": [{\"name\": string, \
\"muscle_group\": one of chest|back|legs|shoulders|arms|core|full_body|cardio|other, \
\"sets\": integer, \"reps\": integer, \"rest_seconds\": integer, \"notes\": string}]}";

const FORM_PROMPT: &str = "Review the described exercise technique. Reply with a JSON object only: \
{\"summary\": string, \"issues\": [string], \"cues\": [string], \
\"safety_rating\": integer from 1 (unsafe) to 5 (safe)}";

#[derive(Debug, Deserialize)]
struct RawRoutine {
    name: Option<String>,
    description: Option<String>,
    #[serde(default)]
    exercises: Vec<RawExercise>,
}

#[derive(Debug, Deserialize)]
struct RawExercise {
    name: Option<String>,
    muscle_group: Option<String>,
    sets: Option<f64>,
    reps: Option<f64>,
    rest_seconds: Option<f64>,
    notes: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawFormAnalysis {
    summary: Option<String>,
    #[serde(default)]
    issues: Vec<String>,
    #[serde(default)]
    cues: Vec<String>,
    safety_rating: Option<f64>,
}

fn clamp_count(value: Option<f64>, min: i32, max: i32, default: i32) -> i32 {
    value
        .filter(|v| v.is_finite())
        .map(|v| (v.round() as i64).clamp(min as i64, max as i64) as i32)
        .unwrap_or(default)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

/// Bring model output within routine bounds; nameless entries are dropped
fn normalize_generated_routine(raw: RawRoutine) -> Result<GeneratedRoutine, AssistantError> {
    let exercises: Vec<GeneratedExercise> = raw
        .exercises
        .into_iter()
        .filter_map(|e| {
            let name = non_empty(e.name)?;
            Some(GeneratedExercise {
                name: name.chars().take(MAX_ROUTINE_NAME_LEN).collect(),
                muscle_group: e
                    .muscle_group
                    .as_deref()
                    .map(MuscleGroup::parse_or_other)
                    .unwrap_or(MuscleGroup::Other),
                sets: clamp_count(e.sets, 1, MAX_SETS, 3),
                reps: clamp_count(e.reps, 1, MAX_REPS, 10),
                rest_seconds: clamp_count(e.rest_seconds, 0, MAX_REST_SECONDS, DEFAULT_REST_SECONDS),
                notes: non_empty(e.notes),
            })
        })
        .take(MAX_ROUTINE_EXERCISES)
        .collect();

    if exercises.is_empty() {
        return Err(AssistantError::MalformedOutput(
            "routine has no exercises".to_string(),
        ));
    }

    Ok(GeneratedRoutine {
        name: non_empty(raw.name)
            .map(|n| n.chars().take(MAX_ROUTINE_NAME_LEN).collect())
            .unwrap_or_else(|| "Generated routine".to_string()),
        description: non_empty(raw.description),
        exercises,
    })
}

fn normalize_form_analysis(raw: RawFormAnalysis) -> Result<FormAnalysis, AssistantError> {
    let summary = non_empty(raw.summary)
        .ok_or_else(|| AssistantError::MalformedOutput("missing summary".to_string()))?;

    let clean = |items: Vec<String>| -> Vec<String> {
        items
            .into_iter()
            .map(|i| i.trim().to_string())
            .filter(|i| !i.is_empty())
            .collect()
    };

    Ok(FormAnalysis {
        summary,
        issues: clean(raw.issues),
        cues: clean(raw.cues),
        safety_rating: clamp_count(raw.safety_rating, 1, 5, 3) as u8,
    })
}

fn routine_request_prompt(request: &GenerateRoutineRequest) -> String {
    let mut prompt = format!(
        "Goal: {}\nExperience level: {}",
        request.goal.trim(),
        request.experience_level.as_str()
    );
    if let Some(days) = request.days_per_week {
        prompt.push_str(&format!("\nTraining days per week: {}", days));
    }
    match request.equipment.as_deref() {
        Some(equipment) if !equipment.is_empty() => {
            prompt.push_str(&format!("\nAvailable equipment: {}", equipment.join(", ")));
        }
        _ => prompt.push_str("\nAvailable equipment: bodyweight only"),
    }
    prompt
}

#[derive(Clone)]
pub struct AssistantService {
    db: PgPool,
    client: Option<AiClient>,
    routine_service: RoutineService,
    exercise_service: ExerciseService,
}

impl AssistantService {
    pub fn new(db: PgPool, client: Option<AiClient>) -> Self {
        Self {
            routine_service: RoutineService::new(db.clone()),
            exercise_service: ExerciseService::new(db.clone()),
            client,
            db,
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.client.is_some()
    }

    fn client(&self) -> ApiResult<&AiClient> {
        self.client.as_ref().ok_or(ApiError::AssistantUnavailable)
    }

    async fn store_message(&self, user_id: Uuid, role: ChatRole, content: &str) -> ApiResult<ChatMessage> {
        let message = sqlx::query_as::<_, ChatMessage>(
            "INSERT INTO chat_messages (id, user_id, role, content, created_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, user_id, role, content, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(role.as_str())
        .bind(content)
        .bind(Utc::now())
        .fetch_one(&self.db)
        .await?;

        Ok(message)
    }

    async fn recent_messages(&self, user_id: Uuid, limit: i64) -> ApiResult<Vec<ChatMessage>> {
        let mut messages = sqlx::query_as::<_, ChatMessage>(
            "SELECT id, user_id, role, content, created_at FROM chat_messages
             WHERE user_id = $1
             ORDER BY created_at DESC, id DESC
             LIMIT $2",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.db)
        .await?;

        messages.reverse();
        Ok(messages)
    }

    pub async fn chat(&self, user_id: Uuid, request: ChatRequest) -> ApiResult<ChatMessage> {
        request.validate()?;
        let client = self.client()?;

        self.store_message(user_id, ChatRole::User, request.message.trim())
            .await?;
        let history = self.recent_messages(user_id, HISTORY_WINDOW).await?;

        let mut prompt = Vec::with_capacity(history.len() + 1);
        prompt.push(PromptMessage::system(SYSTEM_PROMPT));
        prompt.extend(history.iter().map(|m| match m.role {
            ChatRole::User => PromptMessage::user(m.content.as_str()),
            ChatRole::Assistant => PromptMessage::assistant(m.content.as_str()),
        }));

        let reply = client.complete(&prompt).await?;
        self.store_message(user_id, ChatRole::Assistant, &reply).await
    }

    pub async fn history(&self, user_id: Uuid, limit: Option<i64>) -> ApiResult<Vec<ChatMessage>> {
        let limit = limit.unwrap_or(100).clamp(1, 500);
        self.recent_messages(user_id, limit).await
    }

    pub async fn clear_history(&self, user_id: Uuid) -> ApiResult<u64> {
        let result = sqlx::query("DELETE FROM chat_messages WHERE user_id = $1")
            .bind(user_id)
            .execute(&self.db)
            .await?;

        Ok(result.rows_affected())
    }

    pub async fn generate_routine(
        &self,
        user_id: Uuid,
        request: GenerateRoutineRequest,
    ) -> ApiResult<GenerateRoutineResponse> {
        request.validate()?;
        let client = self.client()?;

        let prompt = [
            PromptMessage::system(format!("{}\n\n{}", SYSTEM_PROMPT, ROUTINE_PROMPT)),
            PromptMessage::user(routine_request_prompt(&request)),
        ];
        let raw: RawRoutine = client.complete_json(&prompt).await?;
        let routine = normalize_generated_routine(raw)?;

        let saved_routine = if request.save {
            Some(self.save_generated(user_id, &routine).await?)
        } else {
            None
        };

        Ok(GenerateRoutineResponse {
            routine,
            saved_routine,
        })
    }

    async fn save_generated(
        &self,
        user_id: Uuid,
        generated: &GeneratedRoutine,
    ) -> ApiResult<crate::models::Routine> {
        let mut exercises = Vec::with_capacity(generated.exercises.len());
        for entry in &generated.exercises {
            let exercise = self
                .exercise_service
                .find_or_create(user_id, &entry.name, entry.muscle_group)
                .await?;

            exercises.push(RoutineExercise {
                exercise_id: exercise.id,
                exercise_name: exercise.name,
                muscle_group: exercise.muscle_group,
                sets: entry.sets,
                reps: entry.reps,
                weight: None,
                rest_seconds: entry.rest_seconds,
                notes: entry.notes.clone(),
            });
        }

        let routine = self
            .routine_service
            .insert_routine(
                user_id,
                &generated.name,
                generated.description.as_deref(),
                exercises,
            )
            .await?;

        tracing::info!("Saved generated routine {} for user {}", routine.id, user_id);
        Ok(routine)
    }

    pub async fn analyze_form(&self, request: FormAnalysisRequest) -> ApiResult<FormAnalysis> {
        request.validate()?;
        let client = self.client()?;

        let prompt = [
            PromptMessage::system(format!("{}\n\n{}", SYSTEM_PROMPT, FORM_PROMPT)),
            PromptMessage::user(format!(
                "Exercise: {}\nWhat I do: {}",
                request.exercise_name.trim(),
                request.description.trim()
            )),
        ];
        let raw: RawFormAnalysis = client.complete_json(&prompt).await?;

        Ok(normalize_form_analysis(raw)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ExperienceLevel;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;

    fn parse_routine(json: &str) -> Result<GeneratedRoutine, AssistantError> {
        normalize_generated_routine(serde_json::from_str(json).unwrap())
    }

    #[test]
    fn test_generated_routine_is_clamped() {
        let routine = parse_routine(
            r#"{"name": "  Push Day ", "exercises": [
                {"name": "Bench Press", "muscle_group": "chest", "sets": 40, "reps": 0, "rest_seconds": 900},
                {"name": "Dips", "muscle_group": "Triceps", "sets": 3.4, "reps": 12},
                {"name": "  ", "sets": 3}
            ]}"#,
        )
        .unwrap();

        assert_eq!(routine.name, "Push Day");
        assert_eq!(routine.description, None);
        assert_eq!(routine.exercises.len(), 2);

        let bench = &routine.exercises[0];
        assert_eq!(bench.muscle_group, MuscleGroup::Chest);
        assert_eq!((bench.sets, bench.reps, bench.rest_seconds), (MAX_SETS, 1, MAX_REST_SECONDS));

        let dips = &routine.exercises[1];
        assert_eq!(dips.muscle_group, MuscleGroup::Other);
        assert_eq!((dips.sets, dips.reps, dips.rest_seconds), (3, 12, DEFAULT_REST_SECONDS));
    }

    #[test]
    fn test_generated_routine_needs_exercises() {
        assert_matches!(
            parse_routine(r#"{"name": "Empty", "exercises": []}"#),
            Err(AssistantError::MalformedOutput(_))
        );
        let unnamed = parse_routine(r#"{"exercises": [{"name": "Plank", "muscle_group": "core"}]}"#).unwrap();
        assert_eq!(unnamed.name, "Generated routine");
    }

    #[test]
    fn test_form_analysis_rating_clamped() {
        let raw: RawFormAnalysis = serde_json::from_str(
            r#"{"summary": "Mostly solid", "issues": ["knees cave", " "], "cues": ["push knees out"], "safety_rating": 9}"#,
        )
        .unwrap();
        let analysis = normalize_form_analysis(raw).unwrap();

        assert_eq!(analysis.safety_rating, 5);
        assert_eq!(analysis.issues, vec!["knees cave".to_string()]);

        let missing: RawFormAnalysis = serde_json::from_str(r#"{"issues": []}"#).unwrap();
        assert_matches!(normalize_form_analysis(missing), Err(AssistantError::MalformedOutput(_)));
    }

    #[test]
    fn test_routine_prompt_mentions_inputs() {
        let prompt = routine_request_prompt(&GenerateRoutineRequest {
            goal: "Run a faster 5k".to_string(),
            experience_level: ExperienceLevel::Intermediate,
            days_per_week: Some(4),
            equipment: Some(vec!["dumbbells".to_string(), "bench".to_string()]),
            save: false,
        });

        assert!(prompt.contains("Run a faster 5k"));
        assert!(prompt.contains("intermediate"));
        assert!(prompt.contains("Training days per week: 4"));
        assert!(prompt.contains("dumbbells, bench"));
    }

    #[tokio::test]
    async fn test_unconfigured_assistant_is_unavailable() {
        let pool = sqlx::postgres::PgPoolOptions::new()
            .connect_lazy("postgres://localhost/unused")
            .unwrap();
        let service = AssistantService::new(pool, None);

        assert!(!service.is_enabled());
        let result = service
            .analyze_form(FormAnalysisRequest {
                exercise_name: "Squat".to_string(),
                description: "I round my back at the bottom".to_string(),
            })
            .await;
        assert_matches!(result, Err(ApiError::AssistantUnavailable));
    }
}
