use routine_coach::api::{create_routes, AppState};
use routine_coach::config::{
    run_migrations, AppConfig, AssistantConfig, DatabaseConfig, DatabaseSeeder, SmtpConfig,
};
use routine_coach::auth::RateLimitConfig;
use routine_coach::services::{AiClient, EmailService};
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::from_env()?;

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new(format!("routine_coach={0},tower_http={0}", config.log_level))),
        )
        .init();

    info!("Starting Routine Coach in {} mode", config.environment);

    let db_config = DatabaseConfig::from_env()?;
    let pool = db_config.create_pool().await?;
    run_migrations(&pool).await?;

    if config.seed_demo_data {
        DatabaseSeeder::new(pool.clone()).seed_all().await?;
    }

    let email_service = EmailService::new(&SmtpConfig::from_env(), &config.app_url)?;
    let assistant_config = AssistantConfig::from_env();
    if assistant_config.is_enabled() {
        info!("AI assistant using model {}", assistant_config.model);
    } else {
        warn!("AI_API_KEY not set; assistant endpoints will answer 503");
    }
    let ai_client = AiClient::from_config(&assistant_config)?;

    let state = AppState::new(pool, &config.jwt_secret, email_service, ai_client).with_rate_limit(
        RateLimitConfig {
            trust_proxy_headers: config.trust_proxy_headers,
            ..Default::default()
        },
    );
    let app = create_routes(state).layer(TraceLayer::new_for_http());

    let address = config.server_address();
    let listener = TcpListener::bind(&address).await?;
    info!("Routine Coach listening on http://{}", address);
    info!("Health check available at http://{}/health", address);

    // peer addresses feed the credential rate limiter
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}
