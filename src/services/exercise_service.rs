use chrono::Utc;
use serde_json::json;
use sqlx::PgPool;
use uuid::Uuid;

use crate::errors::{is_unique_violation, ApiError, ApiResult};
use crate::models::{CreateExercise, Exercise, ExerciseQuery, MuscleGroup, UpdateExercise};

const EXERCISE_COLUMNS: &str =
    "id, user_id, name, muscle_group, equipment, description, created_at, updated_at";

fn duplicate_name(name: &str) -> ApiError {
    ApiError::conflict(format!("An exercise named '{}' already exists", name))
}

/// The unique index on `(user_id, lower(name))` settles races the pre-check misses
fn name_conflict_or(err: sqlx::Error, name: &str) -> ApiError {
    if is_unique_violation(&err) {
        duplicate_name(name)
    } else {
        ApiError::Database(err)
    }
}

#[derive(Clone)]
pub struct ExerciseService {
    db: PgPool,
}

impl ExerciseService {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }

    pub async fn create_exercise(&self, user_id: Uuid, data: CreateExercise) -> ApiResult<Exercise> {
        data.validate()?;
        let name = data.name.trim();

        if self.find_by_name(user_id, name).await?.is_some() {
            return Err(duplicate_name(name));
        }

        let now = Utc::now();
        let exercise = sqlx::query_as::<_, Exercise>(&format!(
            "INSERT INTO exercises (id, user_id, name, muscle_group, equipment, description, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $7)
             RETURNING {}",
            EXERCISE_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(name)
        .bind(data.muscle_group.as_str())
        .bind(&data.equipment)
        .bind(&data.description)
        .bind(now)
        .fetch_one(&self.db)
        .await
        .map_err(|err| name_conflict_or(err, name))?;

        tracing::info!("Created exercise {} for user {}", exercise.id, user_id);
        Ok(exercise)
    }

    pub async fn list_exercises(&self, user_id: Uuid, query: &ExerciseQuery) -> ApiResult<Vec<Exercise>> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(|s| format!("%{}%", s.replace('\\', "\\\\").replace('%', "\\%").replace('_', "\\_")));

        let exercises = sqlx::query_as::<_, Exercise>(&format!(
            "SELECT {} FROM exercises
             WHERE user_id = $1
               AND ($2::text IS NULL OR muscle_group = $2)
               AND ($3::text IS NULL OR name ILIKE $3)
             ORDER BY lower(name) ASC",
            EXERCISE_COLUMNS
        ))
        .bind(user_id)
        .bind(query.muscle_group.map(|g| g.as_str()))
        .bind(search)
        .fetch_all(&self.db)
        .await?;

        Ok(exercises)
    }

    pub async fn get_exercise(&self, user_id: Uuid, exercise_id: Uuid) -> ApiResult<Exercise> {
        sqlx::query_as::<_, Exercise>(&format!(
            "SELECT {} FROM exercises WHERE id = $1 AND user_id = $2",
            EXERCISE_COLUMNS
        ))
        .bind(exercise_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound("Exercise"))
    }

    /// Exercises matching `ids` that belong to the user, in no particular order
    pub async fn get_exercises_by_ids(&self, user_id: Uuid, ids: &[Uuid]) -> ApiResult<Vec<Exercise>> {
        let exercises = sqlx::query_as::<_, Exercise>(&format!(
            "SELECT {} FROM exercises WHERE user_id = $1 AND id = ANY($2)",
            EXERCISE_COLUMNS
        ))
        .bind(user_id)
        .bind(ids)
        .fetch_all(&self.db)
        .await?;

        Ok(exercises)
    }

    pub async fn find_by_name(&self, user_id: Uuid, name: &str) -> ApiResult<Option<Exercise>> {
        let exercise = sqlx::query_as::<_, Exercise>(&format!(
            "SELECT {} FROM exercises WHERE user_id = $1 AND lower(name) = lower($2)",
            EXERCISE_COLUMNS
        ))
        .bind(user_id)
        .bind(name.trim())
        .fetch_optional(&self.db)
        .await?;

        Ok(exercise)
    }

    /// Match an exercise by name in the user's library, creating it when missing
    pub async fn find_or_create(
        &self,
        user_id: Uuid,
        name: &str,
        muscle_group: MuscleGroup,
    ) -> ApiResult<Exercise> {
        if let Some(existing) = self.find_by_name(user_id, name).await? {
            return Ok(existing);
        }

        let created = self
            .create_exercise(
                user_id,
                CreateExercise {
                    name: name.trim().to_string(),
                    muscle_group,
                    equipment: None,
                    description: None,
                },
            )
            .await;

        match created {
            // another request created it first
            Err(ApiError::Conflict(_)) => self
                .find_by_name(user_id, name)
                .await?
                .ok_or_else(|| duplicate_name(name.trim())),
            other => other,
        }
    }

    pub async fn update_exercise(
        &self,
        user_id: Uuid,
        exercise_id: Uuid,
        data: UpdateExercise,
    ) -> ApiResult<Exercise> {
        data.validate()?;
        let current = self.get_exercise(user_id, exercise_id).await?;

        let new_name = data.name.as_deref().map(str::trim);
        if let Some(name) = new_name {
            if let Some(other) = self.find_by_name(user_id, name).await? {
                if other.id != exercise_id {
                    return Err(duplicate_name(name));
                }
            }
        }

        let mut tx = self.db.begin().await?;

        let exercise = sqlx::query_as::<_, Exercise>(&format!(
            "UPDATE exercises
             SET name = COALESCE($3, name),
                 muscle_group = COALESCE($4, muscle_group),
                 equipment = CASE WHEN $5::text IS NULL THEN equipment ELSE NULLIF(btrim($5), '') END,
                 description = CASE WHEN $6::text IS NULL THEN description ELSE NULLIF(btrim($6), '') END,
                 updated_at = $7
             WHERE id = $1 AND user_id = $2
             RETURNING {}",
            EXERCISE_COLUMNS
        ))
        .bind(exercise_id)
        .bind(user_id)
        .bind(new_name)
        .bind(data.muscle_group.map(|g| g.as_str()))
        .bind(&data.equipment)
        .bind(&data.description)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await
        .map_err(|err| name_conflict_or(err, new_name.unwrap_or(current.name.as_str())))?;

        // Routines embed the name and group; keep them in step
        if exercise.name != current.name || exercise.muscle_group != current.muscle_group {
            sqlx::query(
                "UPDATE routines
                 SET exercises = (
                     SELECT jsonb_agg(
                         CASE WHEN elem->>'exercise_id' = $2
                              THEN elem || jsonb_build_object('exercise_name', $3::text, 'muscle_group', $4::text)
                              ELSE elem END
                         ORDER BY idx)
                     FROM jsonb_array_elements(exercises) WITH ORDINALITY AS t(elem, idx)
                 )
                 WHERE user_id = $1 AND exercises @> $5::jsonb",
            )
            .bind(user_id)
            .bind(exercise_id.to_string())
            .bind(&exercise.name)
            .bind(exercise.muscle_group.as_str())
            .bind(json!([{ "exercise_id": exercise_id }]))
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(exercise)
    }

    /// Refused while any of the user's routines still lists the exercise
    pub async fn delete_exercise(&self, user_id: Uuid, exercise_id: Uuid) -> ApiResult<()> {
        self.get_exercise(user_id, exercise_id).await?;

        let referencing: Vec<String> = sqlx::query_scalar(
            "SELECT name FROM routines WHERE user_id = $1 AND exercises @> $2::jsonb ORDER BY name",
        )
        .bind(user_id)
        .bind(json!([{ "exercise_id": exercise_id }]))
        .fetch_all(&self.db)
        .await?;

        if !referencing.is_empty() {
            return Err(ApiError::conflict(format!(
                "Exercise is used by routine(s): {}",
                referencing.join(", ")
            )));
        }

        let result = sqlx::query("DELETE FROM exercises WHERE id = $1 AND user_id = $2")
            .bind(exercise_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Exercise"));
        }

        tracing::info!("Deleted exercise {} for user {}", exercise_id, user_id);
        Ok(())
    }
}
