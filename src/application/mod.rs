// src/application/mod.rs
//
// Application Layer
//
// ARCHITECTURE:
// - Composition of repositories, gateways and services from configuration
// - The boundary hosts (the CLI binary, tests) build against
// - Never contains reconciliation logic

pub mod state;

pub use state::AppState;
