//! Nova learning portal backend.
//!
//! Conversational assessment (Nova), XP and achievements, career
//! recommendations and course generation over a bearer-authenticated
//! JSON API backed by SQLite.

pub mod anthropic;
pub mod assessment;
pub mod auth;
pub mod catalog;
pub mod config;
pub mod content;
pub mod db;
pub mod error;
pub mod gamification;
pub mod logging;
pub mod nova;
pub mod openai;
pub mod rewards;
pub mod roles;
pub mod routes;
pub mod script;
pub mod server;
pub mod state;

pub use config::Config;
pub use server::{build_router, start_server};
pub use state::AppState;
