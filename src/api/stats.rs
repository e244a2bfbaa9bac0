use axum::{
    extract::State, middleware, response::Json, routing::get, Extension, Router,
};

use crate::auth::{jwt_auth_middleware, AuthService, UserSession};
use crate::errors::ApiResult;
use crate::models::{Achievement, UserStats};
use crate::services::StatsService;

pub fn stats_routes(stats_service: StatsService, auth_service: AuthService) -> Router {
    Router::new()
        .route("/", get(get_stats))
        .route("/achievements", get(get_achievements))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(stats_service)
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn get_stats(
    State(service): State<StatsService>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<UserStats>> {
    let stats = service.user_stats(session.user_id).await?;
    Ok(Json(stats))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn get_achievements(
    State(service): State<StatsService>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<Vec<Achievement>>> {
    let achievements = service.achievements(session.user_id).await?;
    Ok(Json(achievements))
}
