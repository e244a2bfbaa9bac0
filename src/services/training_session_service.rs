use chrono::Utc;
use sqlx::{types::Json, PgPool};
use uuid::Uuid;

use crate::errors::{ApiError, ApiResult};
use crate::models::{
    apply_set_update, CompleteSession, RestTimer, RestTimerStatus, SessionExercise, SessionQuery,
    SessionStatus, StartRestTimer, StartSession, TrainingSession, UpdateSet,
};
use crate::services::{ExerciseService, RoutineService};
use crate::services::routine_service::resolve_routine_exercises;

const SESSION_COLUMNS: &str = "id, user_id, routine_id, name, status, started_at, completed_at, \
     duration_seconds, exercises, rest_timer, notes, created_at, updated_at";

#[derive(Clone)]
pub struct TrainingSessionService {
    db: PgPool,
    routine_service: RoutineService,
    exercise_service: ExerciseService,
}

impl TrainingSessionService {
    pub fn new(db: PgPool) -> Self {
        Self {
            routine_service: RoutineService::new(db.clone()),
            exercise_service: ExerciseService::new(db.clone()),
            db,
        }
    }

    pub async fn start_session(&self, user_id: Uuid, data: StartSession) -> ApiResult<TrainingSession> {
        data.validate()?;

        let (routine_id, default_name, exercises) = match (data.routine_id, &data.exercises) {
            (Some(routine_id), _) => {
                let routine = self.routine_service.get_routine(user_id, routine_id).await?;
                if routine.exercises.is_empty() {
                    return Err(ApiError::validation("Routine has no exercises"));
                }
                let exercises: Vec<SessionExercise> = routine
                    .exercises
                    .iter()
                    .map(SessionExercise::from_routine_exercise)
                    .collect();
                (Some(routine.id), routine.name, exercises)
            }
            (None, Some(inputs)) => {
                let ids: Vec<Uuid> = inputs.iter().map(|e| e.exercise_id).collect();
                let library = self.exercise_service.get_exercises_by_ids(user_id, &ids).await?;
                let resolved = resolve_routine_exercises(inputs, &library)?;
                let exercises = resolved
                    .iter()
                    .map(SessionExercise::from_routine_exercise)
                    .collect();
                (None, "Quick workout".to_string(), exercises)
            }
            (None, None) => {
                return Err(ApiError::validation(
                    "Either routine_id or exercises is required",
                ))
            }
        };

        let name = data
            .name
            .as_deref()
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string)
            .unwrap_or(default_name);

        let now = Utc::now();
        let session = sqlx::query_as::<_, TrainingSession>(&format!(
            "INSERT INTO training_sessions
                 (id, user_id, routine_id, name, status, started_at, exercises, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $6, $6)
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(Uuid::new_v4())
        .bind(user_id)
        .bind(routine_id)
        .bind(&name)
        .bind(SessionStatus::InProgress.as_str())
        .bind(now)
        .bind(Json(exercises))
        .fetch_one(&self.db)
        .await?;

        if let Some(routine_id) = routine_id {
            self.routine_service
                .record_usage(user_id, routine_id, Some(session.id))
                .await?;
        }

        tracing::info!("Started session {} for user {}", session.id, user_id);
        Ok(session)
    }

    pub async fn list_sessions(&self, user_id: Uuid, query: &SessionQuery) -> ApiResult<Vec<TrainingSession>> {
        query.validate().map_err(ApiError::validation)?;

        let sessions = sqlx::query_as::<_, TrainingSession>(&format!(
            "SELECT {} FROM training_sessions
             WHERE user_id = $1 AND ($2::text IS NULL OR status = $2)
             ORDER BY started_at DESC
             LIMIT $3 OFFSET $4",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .bind(query.status.map(|s| s.as_str()))
        .bind(query.get_limit())
        .bind(query.get_offset())
        .fetch_all(&self.db)
        .await?;

        Ok(sessions)
    }

    pub async fn get_session(&self, user_id: Uuid, session_id: Uuid) -> ApiResult<TrainingSession> {
        sqlx::query_as::<_, TrainingSession>(&format!(
            "SELECT {} FROM training_sessions WHERE id = $1 AND user_id = $2",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(user_id)
        .fetch_optional(&self.db)
        .await?
        .ok_or(ApiError::NotFound("Session"))
    }

    async fn get_in_progress(&self, user_id: Uuid, session_id: Uuid) -> ApiResult<TrainingSession> {
        let session = self.get_session(user_id, session_id).await?;
        if session.is_completed() {
            return Err(ApiError::conflict("Session is already completed"));
        }
        Ok(session)
    }

    pub async fn update_set(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        exercise_index: usize,
        set_index: usize,
        update: UpdateSet,
    ) -> ApiResult<TrainingSession> {
        update.validate()?;
        let session = self.get_in_progress(user_id, session_id).await?;

        let mut exercises = session.exercises.0;
        apply_set_update(&mut exercises, exercise_index, set_index, &update, Utc::now())
            .ok_or(ApiError::NotFound("Set"))?;

        // status guard keeps a concurrent completion from being overwritten
        sqlx::query_as::<_, TrainingSession>(&format!(
            "UPDATE training_sessions SET exercises = $3, updated_at = $4
             WHERE id = $1 AND user_id = $2 AND status = 'in_progress'
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(user_id)
        .bind(Json(exercises))
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::conflict("Session is already completed"))
    }

    pub async fn complete_session(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        data: CompleteSession,
    ) -> ApiResult<TrainingSession> {
        data.validate()?;
        let session = self.get_in_progress(user_id, session_id).await?;

        let now = Utc::now();
        let duration_seconds = (now - session.started_at).num_seconds().max(0);

        let completed = sqlx::query_as::<_, TrainingSession>(&format!(
            "UPDATE training_sessions
             SET status = 'completed', completed_at = $3, duration_seconds = $4,
                 notes = COALESCE($5, notes), rest_timer = NULL, updated_at = $3
             WHERE id = $1 AND user_id = $2 AND status = 'in_progress'
             RETURNING {}",
            SESSION_COLUMNS
        ))
        .bind(session_id)
        .bind(user_id)
        .bind(now)
        .bind(duration_seconds)
        .bind(&data.notes)
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| ApiError::conflict("Session is already completed"))?;

        tracing::info!(
            "Completed session {} for user {} after {}s",
            session_id,
            user_id,
            duration_seconds
        );
        Ok(completed)
    }

    pub async fn delete_session(&self, user_id: Uuid, session_id: Uuid) -> ApiResult<()> {
        let result = sqlx::query("DELETE FROM training_sessions WHERE id = $1 AND user_id = $2")
            .bind(session_id)
            .bind(user_id)
            .execute(&self.db)
            .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Session"));
        }
        Ok(())
    }

    pub async fn start_rest_timer(
        &self,
        user_id: Uuid,
        session_id: Uuid,
        data: StartRestTimer,
    ) -> ApiResult<RestTimerStatus> {
        data.validate()?;
        let session = self.get_in_progress(user_id, session_id).await?;

        let now = Utc::now();
        let duration = data
            .duration_seconds
            .unwrap_or_else(|| session.default_rest_seconds());
        let timer = RestTimer::new(now, duration);

        let result = sqlx::query(
            "UPDATE training_sessions SET rest_timer = $3, updated_at = $4
             WHERE id = $1 AND user_id = $2 AND status = 'in_progress'",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(Json(timer))
        .bind(now)
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::conflict("Session is already completed"));
        }
        Ok(timer.status(now))
    }

    pub async fn rest_timer_status(&self, user_id: Uuid, session_id: Uuid) -> ApiResult<RestTimerStatus> {
        let session = self.get_session(user_id, session_id).await?;
        let timer = session.rest_timer.ok_or(ApiError::NotFound("Rest timer"))?;
        Ok(timer.0.status(Utc::now()))
    }

    pub async fn clear_rest_timer(&self, user_id: Uuid, session_id: Uuid) -> ApiResult<()> {
        let result = sqlx::query(
            "UPDATE training_sessions SET rest_timer = NULL, updated_at = $3
             WHERE id = $1 AND user_id = $2",
        )
        .bind(session_id)
        .bind(user_id)
        .bind(Utc::now())
        .execute(&self.db)
        .await?;

        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Session"));
        }
        Ok(())
    }

    /// Completed sessions, oldest first; input for stats
    pub async fn completed_sessions(&self, user_id: Uuid) -> ApiResult<Vec<TrainingSession>> {
        let sessions = sqlx::query_as::<_, TrainingSession>(&format!(
            "SELECT {} FROM training_sessions
             WHERE user_id = $1 AND status = 'completed'
             ORDER BY completed_at ASC",
            SESSION_COLUMNS
        ))
        .bind(user_id)
        .fetch_all(&self.db)
        .await?;

        Ok(sessions)
    }

    pub async fn count_sessions(&self, user_id: Uuid) -> ApiResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM training_sessions WHERE user_id = $1")
            .bind(user_id)
            .fetch_one(&self.db)
            .await?;
        Ok(count)
    }
}
