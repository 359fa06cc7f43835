pub mod app;
pub mod auth;
pub mod config;
pub mod emissions;
pub mod errors;
pub mod extract;
pub mod handlers;
pub mod insights;
pub mod ledger;
pub mod models;
pub mod notify;
pub mod stats;
pub mod storage;
pub mod streak;
pub mod state;

pub use app::router;
pub use config::Config;
pub use ledger::Ledger;
pub use state::AppState;
pub use storage::{JsonStore, Store};
