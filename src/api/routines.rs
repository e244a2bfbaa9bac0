use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use uuid::Uuid;

use crate::auth::{jwt_auth_middleware, AuthService, UserSession};
use crate::errors::ApiResult;
use crate::models::{CreateRoutine, Routine, RoutineUsage, SharedRoutine, UpdateRoutine};
use crate::services::{RoutineService, ShareService};

#[derive(Clone)]
pub struct RoutinesState {
    pub routine_service: RoutineService,
    pub share_service: ShareService,
}

pub fn routine_routes(state: RoutinesState, auth_service: AuthService) -> Router {
    Router::new()
        .route("/", get(list_routines).post(create_routine))
        .route(
            "/:routine_id",
            get(get_routine).put(update_routine).delete(delete_routine),
        )
        .route("/:routine_id/duplicate", post(duplicate_routine))
        .route("/:routine_id/usage", get(list_usage))
        .route("/:routine_id/share", post(share_routine).delete(unshare_routine))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(state)
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn list_routines(
    State(state): State<RoutinesState>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<Vec<Routine>>> {
    let routines = state.routine_service.list_routines(session.user_id).await?;
    Ok(Json(routines))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn create_routine(
    State(state): State<RoutinesState>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<CreateRoutine>,
) -> ApiResult<(StatusCode, Json<Routine>)> {
    let routine = state
        .routine_service
        .create_routine(session.user_id, request)
        .await?;
    Ok((StatusCode::CREATED, Json(routine)))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn get_routine(
    State(state): State<RoutinesState>,
    Extension(session): Extension<UserSession>,
    Path(routine_id): Path<Uuid>,
) -> ApiResult<Json<Routine>> {
    let routine = state
        .routine_service
        .get_routine(session.user_id, routine_id)
        .await?;
    Ok(Json(routine))
}

#[tracing::instrument(skip(state, session, request), fields(user_id = %session.user_id))]
async fn update_routine(
    State(state): State<RoutinesState>,
    Extension(session): Extension<UserSession>,
    Path(routine_id): Path<Uuid>,
    Json(request): Json<UpdateRoutine>,
) -> ApiResult<Json<Routine>> {
    let routine = state
        .routine_service
        .update_routine(session.user_id, routine_id, request)
        .await?;
    Ok(Json(routine))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn delete_routine(
    State(state): State<RoutinesState>,
    Extension(session): Extension<UserSession>,
    Path(routine_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .routine_service
        .delete_routine(session.user_id, routine_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn duplicate_routine(
    State(state): State<RoutinesState>,
    Extension(session): Extension<UserSession>,
    Path(routine_id): Path<Uuid>,
) -> ApiResult<(StatusCode, Json<Routine>)> {
    let routine = state
        .routine_service
        .duplicate_routine(session.user_id, routine_id)
        .await?;
    Ok((StatusCode::CREATED, Json(routine)))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn list_usage(
    State(state): State<RoutinesState>,
    Extension(session): Extension<UserSession>,
    Path(routine_id): Path<Uuid>,
) -> ApiResult<Json<Vec<RoutineUsage>>> {
    let usage = state
        .routine_service
        .list_usage(session.user_id, routine_id)
        .await?;
    Ok(Json(usage))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn share_routine(
    State(state): State<RoutinesState>,
    Extension(session): Extension<UserSession>,
    Path(routine_id): Path<Uuid>,
) -> ApiResult<Json<SharedRoutine>> {
    let shared = state
        .share_service
        .share_routine(session.user_id, routine_id)
        .await?;
    Ok(Json(shared))
}

#[tracing::instrument(skip(state, session), fields(user_id = %session.user_id))]
async fn unshare_routine(
    State(state): State<RoutinesState>,
    Extension(session): Extension<UserSession>,
    Path(routine_id): Path<Uuid>,
) -> ApiResult<StatusCode> {
    state
        .share_service
        .unshare_routine(session.user_id, routine_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}
