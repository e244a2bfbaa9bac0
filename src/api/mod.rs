// API routes and handlers

pub mod assistant;
pub mod auth;
pub mod exercises;
pub mod health;
pub mod routes;
pub mod routines;
pub mod sessions;
pub mod shared;
pub mod stats;

pub use routes::{create_routes, AppState};
