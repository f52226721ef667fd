use crate::handlers::AppState;
use crate::models::HealthStatus;
use axum::{extract::State, Json};
use chrono::Utc;

/// Liveness probe. Reports process readiness from local state only; it
/// must never touch the ledger.
pub async fn health_check(State(state): State<AppState>) -> Json<HealthStatus> {
    let outstanding = match &state.negotiator {
        Some(negotiator) => negotiator.outstanding_count().await,
        None => 0,
    };

    let status = if state.wallet.is_some() {
        "healthy"
    } else {
        // Unpriced dispatch still works; payment capability is down.
        "degraded"
    };

    Json(HealthStatus {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        wallet_ready: state.wallet.is_some(),
        endpoints: state.registry.len(),
        outstanding_requirements: outstanding,
        uptime_seconds: state.stats.uptime_seconds(),
        timestamp: Utc::now(),
    })
}
