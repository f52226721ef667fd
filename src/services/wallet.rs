use crate::error::GatewayError;
use crate::models::{TransactionRecord, TxStatus};
use crate::services::ledger::Ledger;
use anyhow::{Context, Result};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine as _};
use chrono::Utc;
use ed25519_dalek::{Signer, SigningKey};
use futures::Stream;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::RwLock;

/// Transfer payload signed by the wallet. The serialized JSON of this struct
/// is the signed message; the base58 signature doubles as the transaction
/// identifier on the ledger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferPayload {
    pub from: String,
    pub to: String,
    pub amount: u64,
    pub blockhash: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignedTransfer {
    pub payload: TransferPayload,
    pub signature: String,
}

impl SignedTransfer {
    /// Wire blob submitted to the ledger.
    pub fn to_blob(&self) -> String {
        let envelope = serde_json::to_vec(self).expect("transfer envelope serializes");
        BASE64.encode(envelope)
    }
}

/// Identity & Signer: owns the ed25519 keypair, signs transfers, tracks
/// submitted transactions. The private key never leaves this service.
pub struct WalletService {
    signing_key: SigningKey,
    address: String,
    ledger: Arc<dyn Ledger>,
    records: RwLock<Vec<TransactionRecord>>,
}

impl WalletService {
    /// Load the identity from the key file, or generate and persist a new
    /// one. A fresh or underfunded wallet requests test funds from the
    /// ledger faucet; faucet failure is reported but never fatal.
    pub async fn new(
        ledger: Arc<dyn Ledger>,
        key_path: &Path,
        funding_threshold: u64,
        funding_amount: u64,
    ) -> Result<Self> {
        let signing_key = load_or_create_key(key_path)?;
        let address = bs58::encode(signing_key.verifying_key().to_bytes()).into_string();

        let wallet = Self {
            signing_key,
            address,
            ledger,
            records: RwLock::new(Vec::new()),
        };

        match wallet.ledger.get_balance(&wallet.address).await {
            Ok(balance) => {
                tracing::info!(address = %wallet.address, balance, "Wallet loaded");
                if balance < funding_threshold {
                    match wallet
                        .ledger
                        .request_test_funds(&wallet.address, funding_amount)
                        .await
                    {
                        Ok(()) => tracing::info!(
                            amount = funding_amount,
                            "Requested test funds from ledger faucet"
                        ),
                        Err(e) => tracing::warn!("Faucet request failed: {}", e),
                    }
                }
            }
            Err(e) => tracing::warn!("Could not read wallet balance at startup: {}", e),
        }

        Ok(wallet)
    }

    pub fn address(&self) -> &str {
        &self.address
    }

    pub async fn get_balance(&self) -> Result<u64, GatewayError> {
        self.ledger.get_balance(&self.address).await
    }

    /// Build and sign a transfer. Validation happens before any ledger I/O;
    /// only the blockhash and balance reads touch the network, signing
    /// itself is offline.
    pub async fn sign_transfer(
        &self,
        recipient: &str,
        amount: u64,
    ) -> Result<SignedTransfer, GatewayError> {
        if amount == 0 {
            return Err(GatewayError::InvalidAmount(amount));
        }
        let decoded = bs58::decode(recipient)
            .into_vec()
            .map_err(|_| GatewayError::InvalidAddress(recipient.to_string()))?;
        if decoded.len() != 32 {
            return Err(GatewayError::InvalidAddress(recipient.to_string()));
        }

        let balance = self.get_balance().await?;
        if balance < amount {
            return Err(GatewayError::InsufficientFunds {
                needed: amount,
                available: balance,
            });
        }

        let blockhash = self.ledger.latest_blockhash().await?;
        let payload = TransferPayload {
            from: self.address.clone(),
            to: recipient.to_string(),
            amount,
            blockhash,
        };
        let message = serde_json::to_vec(&payload)
            .map_err(|e| GatewayError::InternalError(e.to_string()))?;
        let signature = self.signing_key.sign(&message);

        Ok(SignedTransfer {
            payload,
            signature: bs58::encode(signature.to_bytes()).into_string(),
        })
    }

    /// Submit a signed transfer. Returns the pending record immediately;
    /// confirmation happens via `refresh_pending`.
    pub async fn submit(&self, signed: &SignedTransfer) -> Result<TransactionRecord, GatewayError> {
        let signature = self.ledger.submit_transaction(&signed.to_blob()).await?;

        let record = TransactionRecord {
            signature,
            amount: signed.payload.amount,
            recipient: signed.payload.to.clone(),
            status: TxStatus::Pending,
            timestamp: Utc::now(),
        };
        self.records.write().await.push(record.clone());

        tracing::info!(
            signature = %record.signature,
            amount = record.amount,
            recipient = %record.recipient,
            "Transfer submitted"
        );
        Ok(record)
    }

    pub async fn transfer(
        &self,
        recipient: &str,
        amount: u64,
    ) -> Result<TransactionRecord, GatewayError> {
        let signed = self.sign_transfer(recipient, amount).await?;
        self.submit(&signed).await
    }

    /// Transaction history, most-recent-first. Each call takes a fresh
    /// snapshot, so the stream is finite and restartable.
    pub async fn history(&self) -> impl Stream<Item = TransactionRecord> {
        let snapshot: Vec<TransactionRecord> = self.records.read().await.clone();
        futures::stream::iter(snapshot.into_iter().rev())
    }

    pub async fn recent(&self, limit: usize) -> Vec<TransactionRecord> {
        let records = self.records.read().await;
        records.iter().rev().take(limit).cloned().collect()
    }

    pub async fn pending_count(&self) -> usize {
        self.records
            .read()
            .await
            .iter()
            .filter(|r| r.status == TxStatus::Pending)
            .count()
    }

    /// Poll the ledger once for every pending record and fold in terminal
    /// statuses. Called on demand and once at shutdown.
    pub async fn refresh_pending(&self) -> usize {
        let pending: Vec<String> = self
            .records
            .read()
            .await
            .iter()
            .filter(|r| r.status == TxStatus::Pending)
            .map(|r| r.signature.clone())
            .collect();

        let mut updated = 0;
        for signature in pending {
            let status = match self.ledger.get_transaction(&signature).await {
                Ok(Some(tx)) => tx.status,
                Ok(None) => continue,
                Err(e) => {
                    tracing::warn!(%signature, "Status poll failed: {}", e);
                    continue;
                }
            };
            if status == TxStatus::Pending {
                continue;
            }
            let mut records = self.records.write().await;
            if let Some(record) = records
                .iter_mut()
                .find(|r| r.signature == signature && r.status == TxStatus::Pending)
            {
                record.status = status;
                updated += 1;
                tracing::info!(%signature, ?status, "Transaction reached terminal status");
            }
        }
        updated
    }
}

fn load_or_create_key(path: &Path) -> Result<SigningKey> {
    if path.exists() {
        let encoded = std::fs::read_to_string(path)
            .with_context(|| format!("reading key file {}", path.display()))?;
        let bytes = bs58::decode(encoded.trim())
            .into_vec()
            .context("key file is not valid base58")?;
        let seed: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("key file must contain a 32-byte seed"))?;
        tracing::info!(path = %path.display(), "Loaded existing wallet key");
        Ok(SigningKey::from_bytes(&seed))
    } else {
        let signing_key = SigningKey::generate(&mut OsRng);
        let encoded = bs58::encode(signing_key.to_bytes()).into_string();
        std::fs::write(path, encoded)
            .with_context(|| format!("writing key file {}", path.display()))?;
        tracing::info!(path = %path.display(), "No key found, generated new wallet");
        Ok(signing_key)
    }
}
