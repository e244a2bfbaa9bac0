use axum::{
    extract::{Path, State},
    http::StatusCode,
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};

use crate::auth::{jwt_auth_middleware, AuthService, UserSession};
use crate::errors::ApiResult;
use crate::models::{Routine, SharedRoutine, SharedRoutinePreview};
use crate::services::ShareService;

/// `GET /:code` is public; everything else needs a signed-in user
pub fn shared_routes(share_service: ShareService, auth_service: AuthService) -> Router {
    let authenticated = Router::new()
        .route("/", get(list_my_shares))
        .route("/:code/import", post(import_shared))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware));

    Router::new()
        .route("/:code", get(get_shared))
        .merge(authenticated)
        .with_state(share_service)
}

#[tracing::instrument(skip(service))]
async fn get_shared(
    State(service): State<ShareService>,
    Path(code): Path<String>,
) -> ApiResult<Json<SharedRoutinePreview>> {
    let shared = service.get_shared(&code).await?;
    Ok(Json(shared.into()))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn import_shared(
    State(service): State<ShareService>,
    Extension(session): Extension<UserSession>,
    Path(code): Path<String>,
) -> ApiResult<(StatusCode, Json<Routine>)> {
    let routine = service.import_shared(session.user_id, &code).await?;
    Ok((StatusCode::CREATED, Json(routine)))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn list_my_shares(
    State(service): State<ShareService>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<Vec<SharedRoutine>>> {
    let shares = service.list_my_shares(session.user_id).await?;
    Ok(Json(shares))
}
