use crate::state::AppState;
use axum::Router;

pub mod ai;
pub mod handlers;
mod pdf;
pub mod report;
pub mod repo;
pub mod repo_types;

pub fn router() -> Router<AppState> {
    handlers::report_routes()
}
