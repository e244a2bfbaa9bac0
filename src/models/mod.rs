// Domain records and request/response shapes

pub mod chat;
pub mod exercise;
pub mod routine;
pub mod shared_routine;
pub mod stats;
pub mod training_session;
pub mod user;
pub mod validation;

pub use chat::*;
pub use exercise::*;
pub use routine::*;
pub use shared_routine::*;
pub use stats::*;
pub use training_session::*;
pub use user::*;
