use crate::error::GatewayError;
use crate::handlers::AppState;
use crate::models::{ApiResponse, EndpointDescriptor};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde_json::{json, Value};

pub async fn register_endpoint(
    State(state): State<AppState>,
    Json(descriptor): Json<EndpointDescriptor>,
) -> Result<(StatusCode, Json<ApiResponse<EndpointDescriptor>>), GatewayError> {
    state.registry.register(descriptor.clone())?;
    Ok((StatusCode::CREATED, Json(ApiResponse::ok(descriptor))))
}

pub async fn list_endpoints(
    State(state): State<AppState>,
) -> Json<ApiResponse<Vec<EndpointDescriptor>>> {
    let endpoints = state.registry.list().as_ref().clone();
    Json(ApiResponse::ok(endpoints))
}

pub async fn remove_endpoint(
    State(state): State<AppState>,
    Path(name): Path<String>,
) -> Result<Json<ApiResponse<Value>>, GatewayError> {
    if state.registry.remove(&name) {
        Ok(Json(ApiResponse::ok(json!({ "removed": name }))))
    } else {
        Err(GatewayError::ToolNotFound(name))
    }
}
