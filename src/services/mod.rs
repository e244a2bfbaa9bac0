// Business logic services

pub mod ai_client;
pub mod assistant_service;
pub mod email_service;
pub mod exercise_service;
pub mod routine_service;
pub mod share_service;
pub mod stats_service;
pub mod training_session_service;

pub use ai_client::{AiClient, AssistantError};
pub use assistant_service::AssistantService;
pub use email_service::{EmailError, EmailService};
pub use exercise_service::ExerciseService;
pub use routine_service::RoutineService;
pub use share_service::ShareService;
pub use stats_service::StatsService;
pub use training_session_service::TrainingSessionService;
