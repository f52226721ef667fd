use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TxStatus {
    Pending,
    Confirmed,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub signature: String,
    pub amount: u64,
    pub recipient: String,
    pub status: TxStatus,
    pub timestamp: DateTime<Utc>,
}

/// Issued when a priced tool is invoked without valid proof. Single-use:
/// the nonce binds exactly one settlement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PaymentRequirement {
    pub nonce: Uuid,
    pub amount: u64,
    pub recipient: String,
    pub expires_at: DateTime<Utc>,
    pub tool: String,
}

impl PaymentRequirement {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }
}

/// Proof of payment, carried on the `X-Payment` request header as
/// `<nonce>:<transaction signature>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentProof {
    pub nonce: Uuid,
    pub transaction: String,
}

impl PaymentProof {
    pub fn from_header(value: &str) -> Option<Self> {
        let (nonce, transaction) = value.split_once(':')?;
        let nonce = Uuid::parse_str(nonce.trim()).ok()?;
        let transaction = transaction.trim();
        if transaction.is_empty() {
            return None;
        }
        Some(Self {
            nonce,
            transaction: transaction.to_string(),
        })
    }

    pub fn to_header(&self) -> String {
        format!("{}:{}", self.nonce, self.transaction)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn proof_header_round_trip() {
        let proof = PaymentProof {
            nonce: Uuid::new_v4(),
            transaction: "5KtP3vbFmc".to_string(),
        };
        let parsed = PaymentProof::from_header(&proof.to_header()).unwrap();
        assert_eq!(parsed, proof);
    }

    #[test]
    fn malformed_headers_rejected() {
        assert!(PaymentProof::from_header("not-a-proof").is_none());
        assert!(PaymentProof::from_header("not-a-uuid:sig").is_none());
        let nonce = Uuid::new_v4();
        assert!(PaymentProof::from_header(&format!("{nonce}:")).is_none());
    }

    #[test]
    fn expiry_is_inclusive() {
        let now = Utc::now();
        let requirement = PaymentRequirement {
            nonce: Uuid::new_v4(),
            amount: 1000,
            recipient: "addr".to_string(),
            expires_at: now,
            tool: "get_user".to_string(),
        };
        assert!(requirement.is_expired(now));
        assert!(!requirement.is_expired(now - chrono::Duration::seconds(1)));
    }
}
