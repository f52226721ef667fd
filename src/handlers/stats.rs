use crate::handlers::AppState;
use crate::models::Stats;
use axum::{extract::State, Json};

pub async fn get_stats(State(state): State<AppState>) -> Json<Stats> {
    Json(state.stats.snapshot())
}
