use crate::error::GatewayError;
use crate::handlers::AppState;
use crate::models::{ApiResponse, PaymentProof, ToolDefinition};
use axum::{
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde_json::{Map, Value};

pub async fn list_tools(State(state): State<AppState>) -> Json<ApiResponse<Vec<ToolDefinition>>> {
    Json(ApiResponse::ok(state.dispatcher.list_tools()))
}

/// Invoke a tool. The request body is the argument object; a payment proof,
/// when present, rides on the `X-Payment` header.
pub async fn call_tool(
    State(state): State<AppState>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Option<Json<Value>>,
) -> Result<Response, GatewayError> {
    let arguments = parse_arguments(body)?;
    let proof = parse_proof(&headers)?;

    let outcome = state.dispatcher.invoke(&name, arguments, proof).await?;

    // An upstream 402 travels through verbatim so the agent can negotiate
    // with the deeper service directly.
    if outcome.status == 402 {
        return Ok((StatusCode::PAYMENT_REQUIRED, Json(outcome.data)).into_response());
    }

    Ok(Json(ApiResponse::ok(outcome)).into_response())
}

fn parse_arguments(body: Option<Json<Value>>) -> Result<Map<String, Value>, GatewayError> {
    match body {
        None => Ok(Map::new()),
        Some(Json(Value::Null)) => Ok(Map::new()),
        Some(Json(Value::Object(map))) => Ok(map),
        Some(Json(other)) => Err(GatewayError::InvalidArguments(format!(
            "expected a JSON object, got {}",
            other
        ))),
    }
}

fn parse_proof(headers: &HeaderMap) -> Result<Option<PaymentProof>, GatewayError> {
    let Some(raw) = headers.get("X-Payment") else {
        return Ok(None);
    };
    let raw = raw.to_str().map_err(|_| {
        GatewayError::InvalidPaymentProof("X-Payment header is not valid UTF-8".to_string())
    })?;
    PaymentProof::from_header(raw)
        .map(Some)
        .ok_or_else(|| {
            GatewayError::InvalidPaymentProof(
                "expected X-Payment: <nonce>:<transaction-signature>".to_string(),
            )
        })
}
