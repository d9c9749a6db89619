// src/app/mod.rs
//
// Process-level setup: configuration read once at startup.

pub mod config;

pub use config::AppConfig;
