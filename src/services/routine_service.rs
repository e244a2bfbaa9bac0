use chrono::Utc;
use sqlx::{types::Json, PgPool};
use std::collections::HashMap;
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::models::{
    copy_name, CreateRoutine, Exercise, Routine, RoutineExercise, RoutineExerciseInput,
    RoutineUsage, UpdateRoutine,
};
use crate::services::ExerciseService;

const ROUTINE_COLUMNS: &str =
    "id, user_id, name, description, exercises, usage_count, last_used_at, created_at, updated_at";

#[derive(Clone)]
pub struct RoutineService {
    db: PgPool,
    exercise_service: ExerciseService,
}

/// Attach names and groups from the library to the requested entries, keeping order
pub fn resolve_routine_exercises(
    inputs: &[RoutineExerciseInput],
    library: &[Exercise],
) -> ApiResult<Vec<RoutineExercise>> {
    let by_id: HashMap<Uuid, &Exercise> = library.iter().map(|e| (e.id, e)).collect();

    inputs
        .iter()
        .map(|input| {
            let exercise = by_id.get(&input.exercise_id).ok_or_else(|| {
                ApiError::validation(format!("Unknown exercise {}", input.exercise_id))
            })?;

            Ok(RoutineExercise {
                exercise_id: exercise.id,
                exercise_name: exercise.name.clone(),
                muscle_group: exercise.muscle_group,
                sets: input.sets,
                reps: input.reps,
                weight: input.weight,
                rest_seconds: input.rest_seconds,
                notes: input.notes.clone(),
            })
        })
        .collect()
}

impl RoutineService {
    pub fn new(db: PgPool) -> Self {
        Self {
            exercise_service: ExerciseService::new(db.clone()),
            db,
        }
    }

    async fn resolve(&self, user_id: Uuid, inputs: &[RoutineExerciseInput]) -> ApiResult<Vec<RoutineExercise>> {
        if inputs.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = inputs.iter().map(|e| e.exercise_id).collect();
        let library = self.exercise_service.get_exercises_by_ids(user_id, &ids).await?;
        resolve_routine_exercises(inputs, &library)
    }

    pub async fn create_routine(&self, user_id: Uuid, data: CreateRoutine) -> ApiResult<Routine> {
        data.validate()?;
        let exercises = self.resolve(user_id, &data.exercises).await?;

        let routine = self
            .insert_routine(user_id, data.name.trim(), data.description.as_deref(), exercises)
            .await?;

        tracing::info!("Created routine {} for user {}", routine.id, user_id);
        Ok(routine)
    }

    /// Store an already-resolved routine; used by imports and AI generation
    pub async fn insert_routine(
        &self,
        user_id: Uuid,
        name: &str,
        description: Option<&str>,
        exercises: Vec<RoutineExercise>,
    ) -> ApiResult<Routine> {
        let now = Utc::now();

        let routine = sqlx::query_as::<_, Routine>(&format!(
            "INSERT INTO routines (id, user_id, name, description, exercises, usage_count, last_used_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, 0, NULL, $6, $6)
             RETURNING {}",
            ROUTINE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .bind(description)
        .bind(Json(exercises))
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        Ok(routine)
    }

    pub async fn list_routines(&self, user_id: Uuid) -> ApiResult<Vec<Routine>> {
        let routines = sqlx::query_as::<_, Routine>(&format!(
            "SELECT {} FROM routines WHERE user_id = $1 ORDER BY updated_at DESC",
            ROUTINE_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(routines)
    }

    pub async fn get_routine(&self, user_id: Uuid, routine_id: Uuid) -> ApiResult<Routine> {
        sqlx::query_as::<_, Routine>(&format!(
            "SELECT {} FROM routines WHERE id = $1 AND user_id = $2",
            ROUTINE_COLUMNS
        ))
        .bind(routine_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound("Routine"))
    }

    pub async fn update_routine(
        &self,
        user_id: Uuid,
        routine_id: Uuid,
        data: UpdateRoutine,
    ) -> ApiResult<Routine> {
        data.validate()?;

        let exercises = match &data.exercises {
            Some(inputs) => Some(Json(self.resolve(user_id, inputs).await?)),
            None => None,
        };

        sqlx::query_as::<_, Routine>(&format!(
            "UPDATE routines
             SET name = COALESCE($3, name),
                 description = CASE WHEN $4::text IS NULL THEN description ELSE NULLIF(btrim($4), '') END,
                 exercises = COALESCE($5, exercises),
                 updated_at = $6
             WHERE id = $1 AND user_id = $2
             RETURNING {}",
            ROUTINE_COLUMNS
        ))
        .bind(routine_id)
        .bind(user_id)
        .bind(data.name.as_deref().map(str::trim))
        .bind(&data.description)
        .bind(exercises)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound("Routine"))
    }

    pub async fn delete_routine(&self, user_id: Uuid, routine_id: Uuid) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM routines WHERE id = $1 AND user_id = $2")
            .bind(routine_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Routine"));
        }

        tracing::info!("Deleted routine {} for user {}", routine_id, user_id);
        Ok(())
    }

    /// Copy with a fresh identifier and no usage history
    pub async fn duplicate_routine(&self, user_id: Uuid, routine_id: Uuid) -> ApiResult<Routine> {
        let original = self.get_routine(user_id, routine_id).await?;

        let copy = self
            .insert_routine(
                user_id,
                &copy_name(&original.name),
                original.description.as_deref(),
                original.exercises.0,
            )
            .await?;

        tracing::info!("Duplicated routine {} into {}", routine_id, copy.id);
        Ok(copy)
    }

    /// Log one use of a routine and bump its counter
    pub async fn record_usage(
        &self,
        user_id: Uuid,
        routine_id: Uuid,
        session_id: Option<Uuid>,
    ) -> ApiResult<RoutineUsage> {
        let now = Utc::now();
        let mut tx = self.db.begin().await?;

        let updated = sqlx::query(
            "UPDATE routines SET usage_count = usage_count + 1, last_used_at = $3
             WHERE id = $1 AND user_id = $2",
        )
        .bind(routine_id)
        .bind(user_id)
        .bind(now)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            return Err(ApiError::NotFound("Routine"));
        }

        let usage = sqlx::query_as::<_, RoutineUsage>(
            "INSERT INTO routine_usages (id, routine_id, user_id, session_id, used_at)
             VALUES ($1, $2, $3, $4, $5)
             RETURNING id, routine_id, user_id, session_id, used_at",
        )
        .bind(Uuid::new_v4())
        .bind(routine_id)
        .bind(user_id)
        .bind(session_id)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(usage)
    }

    pub async fn list_usage(&self, user_id: Uuid, routine_id: Uuid) -> ApiResult<Vec<RoutineUsage>> {
        self.get_routine(user_id, routine_id).await?;

        let usages = sqlx::query_as::<_, RoutineUsage>(
            "SELECT id, routine_id, user_id, session_id, used_at FROM routine_usages
             WHERE routine_id = $1 AND user_id = $2
             ORDER BY used_at DESC",
        )
        .bind(routine_id)
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(usages)
    }
}
