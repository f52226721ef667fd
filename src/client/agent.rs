//! Demo payer agent: registers a priced endpoint on a running gateway,
//! walks into the 402, pays through its own wallet and retries with proof.
//!
//! Run the gateway first, then:
//!     cargo run --bin toll-agent

use anyhow::{bail, Context, Result};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;
use tollgate::error::ErrorResponse;
use tollgate::models::PaymentProof;
use tollgate::services::{Ledger, RpcLedger, WalletService};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let gateway_url =
        std::env::var("GATEWAY_URL").unwrap_or_else(|_| "http://127.0.0.1:8080".to_string());
    let ledger_rpc_url =
        std::env::var("LEDGER_RPC_URL").unwrap_or_else(|_| "http://127.0.0.1:8899".to_string());
    let key_path =
        std::env::var("AGENT_KEY_PATH").unwrap_or_else(|_| "toll-agent.key".to_string());

    let ledger: Arc<dyn Ledger> = Arc::new(RpcLedger::new(&ledger_rpc_url));
    let wallet = WalletService::new(ledger, key_path.as_ref(), 100_000, 10_000_000)
        .await
        .context("agent wallet setup failed")?;
    tracing::info!(address = %wallet.address(), "Agent wallet ready");

    let client = reqwest::Client::new();

    // 1. Register a priced demo endpoint.
    let descriptor = json!({
        "name": "demo_echo",
        "url": "https://httpbin.org/get",
        "method": "GET",
        "description": "Echo demo, 1000 lamports per call",
        "parameters": [{"name": "q", "type": "string", "required": false, "default": "hello"}],
        "price": 1000
    });
    let response = client
        .post(format!("{gateway_url}/api/endpoints"))
        .json(&descriptor)
        .send()
        .await?;
    tracing::info!(status = %response.status(), "Registered demo_echo");

    // 2. First call: expect the payment requirement.
    let response = client
        .post(format!("{gateway_url}/tools/demo_echo"))
        .json(&json!({}))
        .send()
        .await?;
    if response.status().as_u16() != 402 {
        bail!("expected 402, got {}", response.status());
    }
    let challenge: ErrorResponse = response.json().await?;
    let payment = challenge
        .payment
        .context("402 response carried no payment instructions")?;
    tracing::info!(
        nonce = %payment.nonce,
        amount = payment.amount,
        recipient = %payment.recipient,
        "Received payment requirement"
    );

    // 3. Pay.
    let record = wallet.transfer(&payment.recipient, payment.amount).await?;
    tracing::info!(signature = %record.signature, "Paid, retrying with proof");

    let proof = PaymentProof {
        nonce: payment.nonce,
        transaction: record.signature.clone(),
    };

    // 4. Retry with proof until the ledger confirms the transfer.
    for attempt in 1..=10 {
        let response = client
            .post(format!("{gateway_url}/tools/demo_echo"))
            .header("X-Payment", proof.to_header())
            .json(&json!({}))
            .send()
            .await?;

        let status = response.status();
        let body: Value = response.json().await.unwrap_or(Value::Null);

        if status.is_success() {
            println!("{}", serde_json::to_string_pretty(&body)?);
            return Ok(());
        }

        let code = body["error_code"].as_str().unwrap_or("");
        if status.as_u16() == 402 && code == "SETTLEMENT_PENDING" {
            tracing::info!(attempt, "Transaction not confirmed yet, retrying");
            tokio::time::sleep(Duration::from_secs(2)).await;
            continue;
        }

        bail!("tool call failed with {}: {}", status, body);
    }

    bail!("payment never confirmed")
}
