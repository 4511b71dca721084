//! Route modules, one per HTTP surface area (spec §6).

pub mod api_keys;
pub mod chat;
pub mod completions;
pub mod files;
pub mod health;
pub mod models;
pub mod sse;
pub mod tasks;

use axum::Router;

use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(api_keys::router())
        .merge(models::router())
        .merge(completions::router())
        .merge(files::router())
        .merge(tasks::router())
        .merge(sse::router())
        .merge(chat::router())
}
