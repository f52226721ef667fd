//! In-memory ledger used by unit tests.

use crate::error::GatewayError;
use crate::models::TxStatus;
use crate::services::ledger::{Ledger, LedgerTransaction};
use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

#[derive(Default)]
pub struct MemoryLedger {
    balances: Mutex<HashMap<String, u64>>,
    transactions: Mutex<HashMap<String, LedgerTransaction>>,
    submitted: Mutex<Vec<String>>,
    fail_reads: AtomicBool,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_balance(&self, address: &str, amount: u64) {
        self.balances
            .lock()
            .unwrap()
            .insert(address.to_string(), amount);
    }

    pub fn insert_tx(&self, signature: &str, status: TxStatus, amount: u64, recipient: &str) {
        self.transactions.lock().unwrap().insert(
            signature.to_string(),
            LedgerTransaction {
                status,
                amount,
                recipient: recipient.to_string(),
            },
        );
    }

    pub fn confirm(&self, signature: &str) {
        if let Some(tx) = self.transactions.lock().unwrap().get_mut(signature) {
            tx.status = TxStatus::Confirmed;
        }
    }

    pub fn fail(&self, signature: &str) {
        if let Some(tx) = self.transactions.lock().unwrap().get_mut(signature) {
            tx.status = TxStatus::Failed;
        }
    }

    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn submitted_count(&self) -> usize {
        self.submitted.lock().unwrap().len()
    }

    fn check_reads(&self) -> Result<(), GatewayError> {
        if self.fail_reads.load(Ordering::SeqCst) {
            Err(GatewayError::LedgerUnavailable(
                "memory ledger offline".to_string(),
            ))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl Ledger for MemoryLedger {
    async fn get_balance(&self, address: &str) -> Result<u64, GatewayError> {
        self.check_reads()?;
        Ok(*self.balances.lock().unwrap().get(address).unwrap_or(&0))
    }

    async fn request_test_funds(&self, address: &str, amount: u64) -> Result<(), GatewayError> {
        let mut balances = self.balances.lock().unwrap();
        *balances.entry(address.to_string()).or_insert(0) += amount;
        Ok(())
    }

    async fn latest_blockhash(&self) -> Result<String, GatewayError> {
        self.check_reads()?;
        Ok("memory-blockhash".to_string())
    }

    async fn submit_transaction(&self, signed_blob: &str) -> Result<String, GatewayError> {
        let decoded = BASE64
            .decode(signed_blob)
            .map_err(|e| GatewayError::LedgerRejected(format!("bad blob: {}", e)))?;
        let envelope: serde_json::Value = serde_json::from_slice(&decoded)
            .map_err(|e| GatewayError::LedgerRejected(format!("bad envelope: {}", e)))?;

        let signature = envelope["signature"]
            .as_str()
            .ok_or_else(|| GatewayError::LedgerRejected("missing signature".to_string()))?
            .to_string();
        let amount = envelope["payload"]["amount"].as_u64().unwrap_or(0);
        let recipient = envelope["payload"]["to"].as_str().unwrap_or("").to_string();

        self.transactions.lock().unwrap().insert(
            signature.clone(),
            LedgerTransaction {
                status: TxStatus::Pending,
                amount,
                recipient,
            },
        );
        self.submitted.lock().unwrap().push(signature.clone());
        Ok(signature)
    }

    async fn get_transaction(
        &self,
        signature: &str,
    ) -> Result<Option<LedgerTransaction>, GatewayError> {
        self.check_reads()?;
        Ok(self.transactions.lock().unwrap().get(signature).cloned())
    }
}
