// ABOUTME: Library root for caravel - exposes public types for testing.
// ABOUTME: The main binary is in main.rs.

pub mod artifact;
pub mod config;
pub mod engine;
pub mod error;
pub mod exec;
pub mod inventory;
pub mod module;
pub mod output;
