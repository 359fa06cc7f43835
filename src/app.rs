use crate::handlers;
use crate::state::AppState;
use axum::{routing::{get, post}, Router};

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/health", get(handlers::health))
        .route("/api/auth/register", post(handlers::register))
        .route("/api/auth/login", post(handlers::login))
        .route("/api/logs", post(handlers::submit_entry))
        .route("/api/logs/stats/community", get(handlers::community_stats))
        .route("/api/logs/insights/:user_id", get(handlers::insights))
        .route("/api/logs/:user_id", get(handlers::list_entries))
        .route("/api/users/:user_id", get(handlers::user_summary))
        .with_state(state)
}
