use axum::{
    extract::{Path, State},
    http::HeaderMap,
    middleware,
    response::Json,
    routing::{get, post, put},
    Extension, Router,
};
use uuid::Uuid;

use crate::auth::{
    admin_only_middleware, extract_bearer_token, jwt_auth_middleware, rate_limit_middleware,
    AuthError, AuthResponse, AuthService, ChangePasswordRequest, ForgotPasswordRequest,
    LoginRequest, MessageResponse, RateLimitConfig, RateLimiter, RefreshTokenRequest,
    RegisterRequest, ResetPasswordRequest, TokenResponse, UpdateProfileRequest,
    UpdateRoleRequest, UserInfo, UserSession,
};

/// Authentication routes; credential endpoints share one limiter per router
pub fn auth_routes(auth_service: AuthService, rate_limit: &RateLimitConfig) -> Router {
    let rate_limiter = RateLimiter::from_config(rate_limit);

    let credentials = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route_layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let authenticated = Router::new()
        .route("/profile", get(get_profile).put(update_profile))
        .route("/change-password", post(change_password))
        .route_layer(middleware::from_fn_with_state(
            auth_service.clone(),
            jwt_auth_middleware,
        ));

    Router::new()
        .merge(credentials)
        .merge(authenticated)
        .route("/refresh", post(refresh_token))
        .route("/logout", post(logout))
        .with_state(auth_service)
}

#[tracing::instrument(skip(auth_service, request))]
async fn register(
    State(auth_service): State<AuthService>,
    Json(request): Json<RegisterRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let response = auth_service.register(request).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(auth_service, request))]
async fn login(
    State(auth_service): State<AuthService>,
    Json(request): Json<LoginRequest>,
) -> Result<Json<AuthResponse>, AuthError> {
    let response = auth_service.login(request).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(auth_service, request))]
async fn refresh_token(
    State(auth_service): State<AuthService>,
    Json(request): Json<RefreshTokenRequest>,
) -> Result<Json<TokenResponse>, AuthError> {
    let response = auth_service.refresh_token(request).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(auth_service, headers))]
async fn logout(
    State(auth_service): State<AuthService>,
    headers: HeaderMap,
) -> Result<Json<MessageResponse>, AuthError> {
    let auth_header = headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .ok_or(AuthError::MissingAuthHeader)?;

    let token = extract_bearer_token(auth_header)?;
    let response = auth_service.logout(token).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(auth_service, session), fields(user_id = %session.user_id))]
async fn get_profile(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
) -> Result<Json<UserInfo>, AuthError> {
    let user = auth_service.get_profile(session.user_id).await?;
    Ok(Json(user))
}

#[tracing::instrument(skip(auth_service, session, request), fields(user_id = %session.user_id))]
async fn update_profile(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<UpdateProfileRequest>,
) -> Result<Json<UserInfo>, AuthError> {
    let user = auth_service.update_profile(session.user_id, request).await?;
    Ok(Json(user))
}

#[tracing::instrument(skip(auth_service, session, request), fields(user_id = %session.user_id))]
async fn change_password(
    State(auth_service): State<AuthService>,
    Extension(session): Extension<UserSession>,
    Json(request): Json<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let response = auth_service.change_password(session.user_id, request).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(auth_service, request))]
async fn forgot_password(
    State(auth_service): State<AuthService>,
    Json(request): Json<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let response = auth_service.forgot_password(request).await?;
    Ok(Json(response))
}

#[tracing::instrument(skip(auth_service, request))]
async fn reset_password(
    State(auth_service): State<AuthService>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, AuthError> {
    let response = auth_service.reset_password(request).await?;
    Ok(Json(response))
}

/// Admin endpoints
pub fn admin_routes(auth_service: AuthService) -> Router {
    Router::new()
        .route("/users", get(list_users))
        .route("/users/:id/role", put(update_user_role))
        .route_layer(middleware::from_fn(admin_only_middleware))
        .route_layer(middleware::from_fn_with_state(
            auth_service.clone(),
            jwt_auth_middleware,
        ))
        .with_state(auth_service)
}

#[tracing::instrument(skip(auth_service))]
async fn list_users(State(auth_service): State<AuthService>) -> Result<Json<Vec<UserInfo>>, AuthError> {
    let users = auth_service.list_users().await?;
    Ok(Json(users))
}

#[tracing::instrument(skip(auth_service, request))]
async fn update_user_role(
    State(auth_service): State<AuthService>,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateRoleRequest>,
) -> Result<Json<UserInfo>, AuthError> {
    let user = auth_service.update_user_role(user_id, request.role).await?;
    Ok(Json(user))
}
