use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use uuid::Uuid;

use crate::auth::{jwt_auth_middleware, AuthService, UserSession};
use crate::errors::ApiResult;
use crate::models::{
    CompleteSession, RestTimerStatus, SessionQuery, StartRestTimer, StartSession,
    TrainingSession, UpdateSet,
};
use crate::services::TrainingSessionService;

pub fn session_routes(session_service: TrainingSessionService, auth_service: AuthService) -> Router {
    Router::new()
        .route("/", get(list_sessions).post(start_session))
        .route("/:session_id", get(get_session).delete(delete_session))
        .route(
            "/:session_id/exercises/:exercise_index/sets/:set_index",
            put(update_set),
        )
        .route("/:session_id/complete", post(complete_session))
        .route(
            "/:session_id/rest-timer",
            get(rest_timer_status)
                .post(start_rest_timer)
                .delete(clear_rest_timer),
        )
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(session_service)
}

#[tracing::instrument(skip(service, session, request), fields(user_id = %session.user_id))]
async fn start_session(
    State(service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<StartSession>,
) -> ApiResult<(StatusCode, Json<TrainingSession>)> {
    let started = service.start_session(session.user_id, request).await?;
    Ok((StatusCode::CREATED, Json(started)))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn list_sessions(
    State(service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Query(query): Query<SessionQuery>,
) -> ApiResult<Json<Vec<TrainingSession>>> {
    let sessions = service.list_sessions(session.user_id, &query).await?;
    Ok(Json(sessions))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn get_session(
    State(service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<TrainingSession>> {
    let training_session = service.get_session(session.user_id, session_id).await?;
    Ok(Json(training_session))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn delete_session(
    State(service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    service.delete_session(session.user_id, session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(service, session, request), fields(user_id = %session.user_id))]
async fn update_set(
    State(service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path((session_id, exercise_index, set_index)): Path<(Uuid, usize, usize)>,
    Json(request): Json<UpdateSet>,
) -> ApiResult<Json<TrainingSession>> {
    let updated = service
        .update_set(session.user_id, session_id, exercise_index, set_index, request)
        .await?;
    Ok(Json(updated))
}

#[tracing::instrument(skip(service, session, request), fields(user_id = %session.user_id))]
async fn complete_session(
    State(service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
    request: Option<Json<CompleteSession>>,
) -> ApiResult<Json<TrainingSession>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let completed = service
        .complete_session(session.user_id, session_id, request)
        .await?;
    Ok(Json(completed))
}

#[tracing::instrument(skip(service, session, request), fields(user_id = %session.user_id))]
async fn start_rest_timer(
    State(service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
    request: Option<Json<StartRestTimer>>,
) -> ApiResult<Json<RestTimerStatus>> {
    let request = request.map(|Json(r)| r).unwrap_or_default();
    let status = service
        .start_rest_timer(session.user_id, session_id, request)
        .await?;
    Ok(Json(status))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn rest_timer_status(
    State(service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<Json<RestTimerStatus>> {
    let status = service.rest_timer_status(session.user_id, session_id).await?;
    Ok(Json(status))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn clear_rest_timer(
    State(service): State<TrainingSessionService>,
    Extension(session): Extension<UserSession>,
    Path(session_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    service.clear_rest_timer(session.user_id, session_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
