use axum::{
    extract::{Query, State},
    middleware,
    response::Json,
    routing::{get, post},
    Extension, Router,
};
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{jwt_auth_middleware, AuthService, UserSession};
use crate::errors::ApiResult;
use crate::models::{
    ChatMessage, ChatRequest, FormAnalysis, FormAnalysisRequest, GenerateRoutineRequest,
    GenerateRoutineResponse,
};
use crate::services::AssistantService;

#[derive(Debug, Deserialize)]
pub struct HistoryQuery {
    pub limit: Option<i64>,
}

pub fn assistant_routes(assistant_service: AssistantService, auth_service: AuthService) -> Router {
    Router::new()
        .route("/status", get(assistant_status))
        .route("/chat", post(chat))
        .route("/history", get(history).delete(clear_history))
        .route("/generate-routine", post(generate_routine))
        .route("/analyze-form", post(analyze_form))
        .route_layer(middleware::from_fn_with_state(auth_service, jwt_auth_middleware))
        .with_state(assistant_service)
}

async fn assistant_status(State(service): State<AssistantService>) -> Json<Value> {
    Json(json!({ "enabled": service.is_enabled() }))
}

#[tracing::instrument(skip(service, session, request), fields(user_id = %session.user_id))]
async fn chat(
    State(service): State<AssistantService>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<ChatRequest>,
) -> ApiResult<Json<ChatMessage>> {
    let reply = service.chat(session.user_id, request).await?;
    Ok(Json(reply))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn history(
    State(service): State<AssistantService>,
    Extension(session): Extension<UserSession>,
    Query(query): Query<HistoryQuery>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    let messages = service.history(session.user_id, query.limit).await?;
    Ok(Json(messages))
}

#[tracing::instrument(skip(service, session), fields(user_id = %session.user_id))]
async fn clear_history(
    State(service): State<AssistantService>,
    Extension(session): Extension<UserSession>,
) -> ApiResult<Json<Value>> {
    let deleted = service.clear_history(session.user_id).await?;
    Ok(Json(json!({ "deleted": deleted })))
}

#[tracing::instrument(skip(service, session, request), fields(user_id = %session.user_id))]
async fn generate_routine(
    State(service): State<AssistantService>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<GenerateRoutineRequest>,
) -> ApiResult<Json<GenerateRoutineResponse>> {
    let response = service.generate_routine(session.user_id, request).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(service, session, request), fields(user_id = %session.user_id))]
async fn analyze_form(
    State(service): State<AssistantService>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<FormAnalysisRequest>,
) -> ApiResult<Json<FormAnalysis>> {
    let analysis = service.analyze_form(request).await?;
    Ok(Json(analysis))
}
