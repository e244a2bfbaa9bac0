use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::get,
    Extension, Router,
};
use uuid::Uuid;

use crate::auth::{jwt_auth_middleware, AuthService, UserSession};
use crate::errors::ApiResult;
use crate::models::{CreateExercise, Exercise, ExerciseQuery, UpdateExercise};
use crate::services::ExerciseService;

pub fn exercise_routes(exercise_service: ExerciseService, auth_service: AuthService) -> Router {
    Router::new()
        .route("/", get(list_exercises).post(create_exercise))
        .route(
            "/:exercise_id",
            get(get_exercise).put(update_exercise).delete(delete_exercise),
        )
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(exercise_service)
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn list_exercises(
    State(service): State<ExerciseService>,
    Extension(session): Extension<UserSession>,
    Query(query): Query<ExerciseQuery>,
) -> ApiResult<Json<Vec<Exercise>>> {
    let exercises = service.list_exercises(session.user_id, &query).await?;
    Ok(Json(exercises))
}

#[tracing::instrument(skip(service, session, request), fields(user_id = %session.user_id))]
async fn create_exercise(
    State(service): State<ExerciseService>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreateExercise>,
) -> ApiResult<(StatusCode, Json<Exercise>)> {
    let exercise = service.create_exercise(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(exercise)))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn get_exercise(
    State(service): State<ExerciseService>,
    Extension(session): Extension<UserSession>,
    Path(exercise_id): Path<Uuid>,
) -> ApiResult<Json<Exercise>> {
    let exercise = service.get_exercise(session.user_id, exercise_id).await?;
    Ok(Json(exercise))
}

#[tracing::instrument(skip(service, session, request), fields(user_id = %session.user_id))]
async fn update_exercise(
    State(service): State<ExerciseService>,
    Extension(session): Extension<UserSession>,
    Path(exercise_id): Path<Uuid>,
    Json(request): Json<UpdateExercise>,
) -> ApiResult<Json<Exercise>> {
    let exercise = service
        .update_exercise(session.user_id, exercise_id, request)
        .await?;
    Ok(Json(exercise))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn delete_exercise(
    State(service): State<ExerciseService>,
    Extension(session): Extension<UserSession>,
    Path(exercise_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    service.delete_exercise(session.user_id, exercise_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
