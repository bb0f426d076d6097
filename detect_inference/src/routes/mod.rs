mod health;
mod predict;

use crate::server::AppState;
use axum::{
    routing::{get, post},
    Router,
};

pub fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/predict", post(predict::predict))
        .route("/health", get(health::healthcheck))
}
