use crate::error::GatewayError;
use crate::models::TxStatus;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

/// Ledger's view of a submitted transaction, as returned by the
/// transaction-status query.
#[derive(Debug, Clone, Deserialize)]
pub struct LedgerTransaction {
    pub status: TxStatus,
    pub amount: u64,
    pub recipient: String,
}

/// The opaque settlement service. Read-only calls retry with bounded
/// backoff on transient failure; `submit_transaction` never retries.
#[async_trait]
pub trait Ledger: Send + Sync {
    async fn get_balance(&self, address: &str) -> Result<u64, GatewayError>;
    async fn request_test_funds(&self, address: &str, amount: u64) -> Result<(), GatewayError>;
    async fn latest_blockhash(&self) -> Result<String, GatewayError>;
    async fn submit_transaction(&self, signed_blob: &str) -> Result<String, GatewayError>;
    async fn get_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<LedgerTransaction>, GatewayError>;
}

/// JSON-RPC 2.0 client for the ledger node.
pub struct RpcLedger {
    client: reqwest::Client,
    url: String,
    max_attempts: u32,
}

impl RpcLedger {
    pub fn new(url: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.to_string(),
            max_attempts: 3,
        }
    }

    async fn call(&self, method: &str, params: Value, retry: bool) -> Result<Value, GatewayError> {
        let attempts = if retry { self.max_attempts } else { 1 };
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let mut last_error = String::new();
        for attempt in 0..attempts {
            if attempt > 0 {
                let backoff = Duration::from_millis(200 * 2u64.pow(attempt - 1));
                tracing::debug!(method, attempt, "Retrying ledger call after {:?}", backoff);
                tokio::time::sleep(backoff).await;
            }

            let response = match self.client.post(&self.url).json(&body).send().await {
                Ok(response) => response,
                Err(e) => {
                    last_error = e.to_string();
                    tracing::warn!(method, "Ledger transport error: {}", e);
                    continue;
                }
            };

            let status = response.status();
            if status.is_server_error() {
                last_error = format!("ledger returned {}", status);
                tracing::warn!(method, %status, "Ledger server error");
                continue;
            }
            if !status.is_success() {
                // Auth rejection and friends: permanent, surfaced immediately.
                return Err(GatewayError::LedgerRejected(format!(
                    "{} returned {}",
                    method, status
                )));
            }

            let payload: Value = response
                .json()
                .await
                .map_err(|e| GatewayError::LedgerRejected(format!("malformed response: {}", e)))?;

            if let Some(error) = payload.get("error") {
                let message = error
                    .get("message")
                    .and_then(Value::as_str)
                    .unwrap_or("unknown RPC error");
                return Err(GatewayError::LedgerRejected(format!(
                    "{}: {}",
                    method, message
                )));
            }

            return payload
                .get("result")
                .cloned()
                .ok_or_else(|| GatewayError::LedgerRejected("missing result field".to_string()));
        }

        Err(GatewayError::LedgerUnavailable(last_error))
    }
}

#[async_trait]
impl Ledger for RpcLedger {
    async fn get_balance(&self, address: &str) -> Result<u64, GatewayError> {
        let result = self.call("getBalance", json!([address]), true).await?;
        result
            .get("value")
            .and_then(Value::as_u64)
            .ok_or_else(|| GatewayError::LedgerRejected("malformed balance response".to_string()))
    }

    async fn request_test_funds(&self, address: &str, amount: u64) -> Result<(), GatewayError> {
        self.call("requestAirdrop", json!([address, amount]), false)
            .await?;
        Ok(())
    }

    async fn latest_blockhash(&self) -> Result<String, GatewayError> {
        let result = self.call("getLatestBlockhash", json!([]), true).await?;
        result
            .get("blockhash")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::LedgerRejected("malformed blockhash response".to_string()))
    }

    async fn submit_transaction(&self, signed_blob: &str) -> Result<String, GatewayError> {
        // Write path: a silent retry could double-spend.
        let result = self
            .call("sendTransaction", json!([signed_blob]), false)
            .await?;
        result
            .get("signature")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| GatewayError::LedgerRejected("malformed submit response".to_string()))
    }

    async fn get_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<LedgerTransaction>, GatewayError> {
        let result = self.call("getTransaction", json!([signature]), true).await?;
        if result.is_null() {
            return Ok(None);
        }
        let tx: LedgerTransaction = serde_json::from_value(result).map_err(|e| {
            GatewayError::LedgerRejected(format!("malformed transaction response: {}", e))
        })?;
        Ok(Some(tx))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::Matcher;

    fn rpc_result(value: Value) -> String {
        json!({"jsonrpc": "2.0", "id": 1, "result": value}).to_string()
    }

    #[tokio::test]
    async fn balance_parsed_from_rpc_result() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .match_body(Matcher::PartialJson(json!({"method": "getBalance"})))
            .with_status(200)
            .with_body(rpc_result(json!({"value": 5_000_000})))
            .create_async()
            .await;

        let ledger = RpcLedger::new(&server.url());
        let balance = ledger.get_balance("some-address").await.unwrap();
        assert_eq!(balance, 5_000_000);
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn read_calls_retry_on_server_errors_then_give_up() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(500)
            .expect(3)
            .create_async()
            .await;

        let ledger = RpcLedger::new(&server.url());
        let err = ledger.get_balance("some-address").await.unwrap_err();
        assert!(matches!(err, GatewayError::LedgerUnavailable(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn submit_never_retries() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(500)
            .expect(1)
            .create_async()
            .await;

        let ledger = RpcLedger::new(&server.url());
        let err = ledger.submit_transaction("blob").await.unwrap_err();
        assert!(matches!(err, GatewayError::LedgerUnavailable(_)));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn rpc_application_errors_are_permanent() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/")
            .with_status(200)
            .with_body(
                json!({"jsonrpc": "2.0", "id": 1, "error": {"code": -32000, "message": "airdrop limit reached"}})
                    .to_string(),
            )
            .expect(1)
            .create_async()
            .await;

        let ledger = RpcLedger::new(&server.url());
        let err = ledger.get_balance("some-address").await.unwrap_err();
        match err {
            GatewayError::LedgerRejected(message) => {
                assert!(message.contains("airdrop limit reached"))
            }
            other => panic!("expected LedgerRejected, got {:?}", other),
        }
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn missing_transaction_is_none() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(rpc_result(Value::Null))
            .create_async()
            .await;

        let ledger = RpcLedger::new(&server.url());
        assert!(ledger.get_transaction("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn transaction_fields_deserialize() {
        let mut server = mockito::Server::new_async().await;
        server
            .mock("POST", "/")
            .with_status(200)
            .with_body(rpc_result(
                json!({"status": "confirmed", "amount": 1000, "recipient": "addr"}),
            ))
            .create_async()
            .await;

        let ledger = RpcLedger::new(&server.url());
        let tx = ledger.get_transaction("sig").await.unwrap().unwrap();
        assert_eq!(tx.status, TxStatus::Confirmed);
        assert_eq!(tx.amount, 1000);
        assert_eq!(tx.recipient, "addr");
    }
}
