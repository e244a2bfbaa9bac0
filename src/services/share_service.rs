use chrono::Utc;
use rand::Rng;
use sqlx::{types::Json, PgPool};
use std::future::Future;
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::models::{
    normalize_share_code, Routine, RoutineExercise, SharedRoutine, SHARE_CODE_ALPHABET,
    SHARE_CODE_LENGTH,
};
use crate::services::{ExerciseService, RoutineService};

pub const MAX_CODE_ATTEMPTS: usize = 10;

const SHARED_COLUMNS: &str = "id, code, routine_id, owner_id, name, description, exercises, \
     import_count, created_at, updated_at";

pub fn generate_share_code<R: Rng + ?Sized>(rng: &mut R) -> String {
    (0..SHARE_CODE_LENGTH)
        .map(|_| SHARE_CODE_ALPHABET[rng.gen_range(0..SHARE_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Draw codes until `exists` reports a free one, giving up after `MAX_CODE_ATTEMPTS`
pub async fn generate_unique_code<F, Fut>(mut exists: F) -> ApiResult<String>
where
    F: FnMut(String) -> Fut,
    Fut: Future<Output = ApiResult<bool>>,
{
    for attempt in 1..=MAX_CODE_ATTEMPTS {
        let code = generate_share_code(&mut rand::thread_rng());
        if !exists(code.clone()).await? {
            return Ok(code);
        }
        tracing::debug!("Share code collision on attempt {}", attempt);
    }

    Err(ApiError::Internal(anyhow::anyhow!(
        "could not generate a unique share code after {} attempts",
        MAX_CODE_ATTEMPTS
    )))
}

#[derive(Clone)]
pub struct ShareService {
    db: PgPool,
    routine_service: RoutineService,
    exercise_service: ExerciseService,
}

impl ShareService {
    pub fn new(db: PgPool) -> Self {
        Self {
            routine_service: RoutineService::new(db.clone()),
            exercise_service: ExerciseService::new(db.clone()),
            db,
        }
    }

    async fn code_exists(&self, code: String) -> ApiResult<bool> {
        let exists: bool =
            sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM shared_routines WHERE code = $1)")
                .bind(code)
                .fetch_one(&self.db)
                .await?;
        Ok(exists)
    }

    /// Publish a snapshot of the routine; sharing again keeps the code and refreshes the snapshot
    pub async fn share_routine(&self, user_id: Uuid, routine_id: Uuid) -> ApiResult<SharedRoutine> {
        let routine = self.routine_service.get_routine(user_id, routine_id).await?;
        let now = Utc::now();

        let refreshed = sqlx::query_as::<_, SharedRoutine>(&format!(
            "UPDATE shared_routines
             SET name = $3, description = $4, exercises = $5, updated_at = $6
             WHERE routine_id = $1 AND owner_id = $2
             RETURNING {}",
            SHARED_COLUMNS
        ))
        .bind(routine.id)
        .bind(user_id)
        .bind(&routine.name)
        .bind(&routine.description)
        .bind(&routine.exercises)
        .bind(now)
        .fetch_optional(&self.db)
        .await?;

        if let Some(shared) = refreshed {
            return Ok(shared);
        }

        let code = generate_unique_code(|code| self.code_exists(code)).await?;

        let shared = sqlx::query_as::<_, SharedRoutine>(&format!(
            "INSERT INTO shared_routines
                 (id, code, routine_id, owner_id, name, description, exercises, import_count, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 0, $8, $8)
             RETURNING {}",
            SHARED_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(&code)
        .bind(routine.id)
        .bind(user_id)
        .bind(&routine.name)
        .bind(&routine.description)
        .bind(&routine.exercises)
        .bind(now)
        .fetch_one(&self.db)
        .await?;

        tracing::info!("Shared routine {} as {}", routine_id, code);
        Ok(shared)
    }

    pub async fn unshare_routine(&self, user_id: Uuid, routine_id: Uuid) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM shared_routines WHERE routine_id = $1 AND owner_id = $2")
            .bind(routine_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Shared routine"));
        }
        Ok(())
    }

    pub async fn get_shared(&self, code: &str) -> ApiResult<SharedRoutine> {
        let code = normalize_share_code(code).ok_or(ApiError::NotFound("Shared routine"))?;

        sqlx::query_as::<_, SharedRoutine>(&format!(
            "SELECT {} FROM shared_routines WHERE code = $1",
            SHARED_COLUMNS
        ))
        .bind(code)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound("Shared routine"))
    }

    pub async fn list_my_shares(&self, user_id: Uuid) -> ApiResult<Vec<SharedRoutine>> {
        let shares = sqlx::query_as::<_, SharedRoutine>(&format!(
            "SELECT {} FROM shared_routines WHERE owner_id = $1 ORDER BY created_at DESC",
            SHARED_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(shares)
    }

    /// Copy a shared routine into the caller's library, matching exercises by name
    pub async fn import_shared(&self, user_id: Uuid, code: &str) -> ApiResult<Routine> {
        let shared = self.get_shared(code).await?;

        let mut exercises = Vec::with_capacity(shared.exercises.len());
        for entry in shared.exercises.iter() {
            let exercise = self
                .exercise_service
                .find_or_create(user_id, &entry.exercise_name, entry.muscle_group)
                .await?;

            exercises.push(RoutineExercise {
                exercise_id: exercise.id,
                exercise_name: exercise.name,
                muscle_group: exercise.muscle_group,
                ..entry.clone()
            });
        }

        let routine = self
            .routine_service
            .insert_routine(user_id, &shared.name, shared.description.as_deref(), exercises)
            .await?;

        sqlx::query("UPDATE shared_routines SET import_count = import_count + 1 WHERE id = $1")
            .bind(shared.id)
            .execute(&self.db)
            .await?;

        tracing::info!("User {} imported shared routine {}", user_id, shared.code);
        Ok(routine)
    }
}
