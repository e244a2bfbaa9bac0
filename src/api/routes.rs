use axum::{routing::get, Router};
use sqlx::PgPool;

use super::assistant::assistant_routes;
use super::auth::{admin_routes, auth_routes};
use super::exercises::exercise_routes;
use super::health::{health_check, readiness_check};
use super::routines::{routine_routes, RoutinesState};
use super::sessions::session_routes;
use super::shared::shared_routes;
use super::stats::stats_routes;
use crate::auth::{cors_layer, security_headers_layer, AuthService, RateLimitConfig};
use crate::services::{
    AiClient, AssistantService, EmailService, ExerciseService, RoutineService, ShareService,
    StatsService, TrainingSessionService,
};

/// Services shared by every router, built once at startup
#[derive(Clone)]
pub struct AppState {
    pub db: PgPool,
    pub auth_service: AuthService,
    pub exercise_service: ExerciseService,
    pub routine_service: RoutineService,
    pub session_service: TrainingSessionService,
    pub share_service: ShareService,
    pub stats_service: StatsService,
    pub assistant_service: AssistantService,
    pub rate_limit: RateLimitConfig,
}

impl AppState {
    pub fn new(
        db: PgPool,
        jwt_secret: &str,
        email_service: EmailService,
        ai_client: Option<AiClient>,
    ) -> Self {
        let session_service = TrainingSessionService::new(db.clone());

        Self {
            auth_service: AuthService::new(db.clone(), jwt_secret, email_service),
            exercise_service: ExerciseService::new(db.clone()),
            routine_service: RoutineService::new(db.clone()),
            stats_service: StatsService::new(session_service.clone()),
            session_service,
            share_service: ShareService::new(db.clone()),
            assistant_service: AssistantService::new(db.clone(), ai_client),
            rate_limit: RateLimitConfig::default(),
            db,
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitConfig) -> Self {
        self.rate_limit = rate_limit;
        self
    }
}

pub fn create_routes(state: AppState) -> Router {
    let auth_service = state.auth_service.clone();

    let routines = RoutinesState {
        routine_service: state.routine_service,
        share_service: state.share_service.clone(),
    };

    Router::new()
        .route("/health", get(health_check))
        .route("/health/ready", get(readiness_check).with_state(state.db))
        .nest("/api/auth", auth_routes(auth_service.clone(), &state.rate_limit))
        .nest("/api/admin", admin_routes(auth_service.clone()))
        .nest(
            "/api/exercises",
            exercise_routes(state.exercise_service, auth_service.clone()),
        )
        .nest("/api/routines", routine_routes(routines, auth_service.clone()))
        .nest(
            "/api/sessions",
            session_routes(state.session_service, auth_service.clone()),
        )
        .nest(
            "/api/shared",
            shared_routes(state.share_service, auth_service.clone()),
        )
        .nest(
            "/api/stats",
            stats_routes(state.stats_service, auth_service.clone()),
        )
        .nest(
            "/api/assistant",
            assistant_routes(state.assistant_service, auth_service),
        )
        .layer(security_headers_layer())
        .layer(cors_layer())
}
