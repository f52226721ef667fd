use crate::models::PaymentRequirement;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

#[derive(Error, Debug)]
pub enum GatewayError {
    // Validation: rejected synchronously, never retried.
    #[error("duplicate endpoint name: {0}")]
    DuplicateName(String),

    #[error("invalid descriptor: {0}")]
    InvalidDescriptor(String),

    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("missing required parameter: {0}")]
    MissingRequiredParameter(String),

    #[error("type mismatch for parameter '{parameter}': expected {expected}, got {found}")]
    TypeMismatch {
        parameter: String,
        expected: String,
        found: String,
    },

    #[error("unknown parameter: {0}")]
    UnknownParameter(String),

    #[error("invalid arguments: {0}")]
    InvalidArguments(String),

    // Payment protocol: terminal for the attempt; restart the handshake.
    #[error("payment required: {} lamports to {}", .0.amount, .0.recipient)]
    PaymentRequired(PaymentRequirement),

    #[error("invalid payment proof: {0}")]
    InvalidPaymentProof(String),

    #[error("unknown payment nonce: {0}")]
    UnknownNonce(Uuid),

    #[error("payment requirement expired: {0}")]
    RequirementExpired(Uuid),

    #[error("payment nonce already consumed: {0}")]
    NonceAlreadyConsumed(Uuid),

    #[error("settlement rejected: {0}")]
    SettlementRejected(String),

    #[error("settlement pending: {0}")]
    SettlementPending(String),

    // Identity & signing.
    #[error("invalid transfer amount: {0}")]
    InvalidAmount(u64),

    #[error("invalid recipient address: {0}")]
    InvalidAddress(String),

    #[error("insufficient funds: need {needed} lamports, have {available} (short by {})", .needed - .available)]
    InsufficientFunds { needed: u64, available: u64 },

    #[error("wallet unavailable; priced tools cannot settle")]
    WalletUnavailable,

    // Ledger.
    #[error("ledger unavailable: {0}")]
    LedgerUnavailable(String),

    #[error("ledger rejected request: {0}")]
    LedgerRejected(String),

    // Upstream (the wrapped API).
    #[error("upstream returned {status}")]
    UpstreamError { status: u16, body: String },

    #[error("upstream unreachable: {0}")]
    UpstreamUnreachable(String),

    #[error("upstream timed out after {seconds}s")]
    UpstreamTimeout { seconds: f64 },

    #[error("configuration error: {0}")]
    ConfigError(String),

    #[error("internal error: {0}")]
    InternalError(String),
}

#[derive(Serialize, Deserialize, Debug)]
pub struct ErrorResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
    pub timestamp: chrono::DateTime<Utc>,
    pub request_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentInstructions>,
}

/// Machine-readable 402 body: everything an agent needs to settle and retry.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PaymentInstructions {
    pub nonce: Uuid,
    pub amount: u64,
    pub recipient: String,
    pub expires_at: chrono::DateTime<Utc>,
    pub tool: String,
    pub header: String,
    pub format: String,
}

impl PaymentInstructions {
    fn from_requirement(requirement: &PaymentRequirement) -> Self {
        Self {
            nonce: requirement.nonce,
            amount: requirement.amount,
            recipient: requirement.recipient.clone(),
            expires_at: requirement.expires_at,
            tool: requirement.tool.clone(),
            header: "X-Payment".to_string(),
            format: "<nonce>:<transaction-signature>".to_string(),
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let request_id = Uuid::new_v4().to_string();

        let (status, error_code, payment) = match &self {
            GatewayError::DuplicateName(_) => (StatusCode::CONFLICT, "DUPLICATE_NAME", None),
            GatewayError::InvalidDescriptor(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_DESCRIPTOR", None)
            }
            GatewayError::ToolNotFound(_) => (StatusCode::NOT_FOUND, "TOOL_NOT_FOUND", None),
            GatewayError::MissingRequiredParameter(_) => {
                (StatusCode::BAD_REQUEST, "MISSING_REQUIRED_PARAMETER", None)
            }
            GatewayError::TypeMismatch { .. } => (StatusCode::BAD_REQUEST, "TYPE_MISMATCH", None),
            GatewayError::UnknownParameter(_) => {
                (StatusCode::BAD_REQUEST, "UNKNOWN_PARAMETER", None)
            }
            GatewayError::InvalidArguments(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_ARGUMENTS", None)
            }
            GatewayError::PaymentRequired(requirement) => (
                StatusCode::PAYMENT_REQUIRED,
                "PAYMENT_REQUIRED",
                Some(PaymentInstructions::from_requirement(requirement)),
            ),
            GatewayError::InvalidPaymentProof(_) => {
                (StatusCode::BAD_REQUEST, "INVALID_PAYMENT_PROOF", None)
            }
            GatewayError::UnknownNonce(_) => {
                (StatusCode::PAYMENT_REQUIRED, "UNKNOWN_NONCE", None)
            }
            GatewayError::RequirementExpired(_) => {
                (StatusCode::PAYMENT_REQUIRED, "REQUIREMENT_EXPIRED", None)
            }
            GatewayError::NonceAlreadyConsumed(_) => {
                (StatusCode::PAYMENT_REQUIRED, "NONCE_ALREADY_CONSUMED", None)
            }
            GatewayError::SettlementRejected(_) => {
                (StatusCode::PAYMENT_REQUIRED, "SETTLEMENT_REJECTED", None)
            }
            GatewayError::SettlementPending(_) => {
                (StatusCode::PAYMENT_REQUIRED, "SETTLEMENT_PENDING", None)
            }
            GatewayError::InvalidAmount(_) => (StatusCode::BAD_REQUEST, "INVALID_AMOUNT", None),
            GatewayError::InvalidAddress(_) => (StatusCode::BAD_REQUEST, "INVALID_ADDRESS", None),
            GatewayError::InsufficientFunds { .. } => {
                (StatusCode::BAD_REQUEST, "INSUFFICIENT_FUNDS", None)
            }
            GatewayError::WalletUnavailable => {
                (StatusCode::SERVICE_UNAVAILABLE, "WALLET_UNAVAILABLE", None)
            }
            GatewayError::LedgerUnavailable(_) => {
                (StatusCode::SERVICE_UNAVAILABLE, "LEDGER_UNAVAILABLE", None)
            }
            GatewayError::LedgerRejected(_) => (StatusCode::BAD_GATEWAY, "LEDGER_REJECTED", None),
            GatewayError::UpstreamError { .. } | GatewayError::UpstreamUnreachable(_) => {
                (StatusCode::BAD_GATEWAY, "UPSTREAM_ERROR", None)
            }
            GatewayError::UpstreamTimeout { .. } => {
                (StatusCode::GATEWAY_TIMEOUT, "UPSTREAM_TIMEOUT", None)
            }
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL_ERROR", None),
        };

        let body = ErrorResponse {
            success: false,
            error: self.to_string(),
            error_code: error_code.to_string(),
            timestamp: Utc::now(),
            request_id,
            payment,
        };

        if status.is_server_error() {
            tracing::error!(error = ?self, error_code, "Request failed");
        } else {
            tracing::debug!(error = %self, error_code, "Request rejected");
        }

        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn payment_required_carries_instructions() {
        let requirement = PaymentRequirement {
            nonce: Uuid::new_v4(),
            amount: 1000,
            recipient: "recipient".to_string(),
            expires_at: Utc::now(),
            tool: "get_user".to_string(),
        };
        let instructions = PaymentInstructions::from_requirement(&requirement);
        assert_eq!(instructions.header, "X-Payment");
        assert_eq!(instructions.amount, 1000);
        assert_eq!(instructions.nonce, requirement.nonce);
    }
}
