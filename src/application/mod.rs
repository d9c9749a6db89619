// src/application/mod.rs
//
// Application Layer
//
// ARCHITECTURE:
// - Sits above the repositories and services
// - Owns the composition root (AppState)
// - Translates internal errors into user-facing responses

pub mod error_handling;
pub mod state;

pub use error_handling::{ErrorResponse, ErrorType, ToErrorResponse};
pub use state::AppState;
