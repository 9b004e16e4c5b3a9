//! PeerHive zone service
//!
//! Serves the zone classifier over HTTP. The model is loaded once at
//! start-up; if that fails the server still comes up and answers
//! `POST /predict` with `{"error": "Model not loaded"}`.

pub mod cli;
pub mod config;
pub mod routes;
pub mod server;
pub mod state;

pub use config::ServerConfig;
pub use state::AppState;
