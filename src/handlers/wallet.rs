use crate::error::GatewayError;
use crate::handlers::AppState;
use crate::models::{ApiResponse, TransactionRecord};
use axum::{extract::State, Json};
use futures::StreamExt;
use serde_json::{json, Value};

pub async fn wallet_info(
    State(state): State<AppState>,
) -> Result<Json<ApiResponse<Value>>, GatewayError> {
    let wallet = state.wallet.as_ref().ok_or(GatewayError::WalletUnavailable)?;
    let balance = wallet.get_balance().await?;
    let transactions: Vec<TransactionRecord> = wallet.history().await.take(10).collect().await;

    Ok(Json(ApiResponse::ok(json!({
        "address": wallet.address(),
        "balance": balance,
        "pending": wallet.pending_count().await,
        "transactions": transactions,
    }))))
}
