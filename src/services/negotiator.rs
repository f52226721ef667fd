use crate::error::GatewayError;
use crate::models::{PaymentProof, PaymentRequirement, TxStatus};
use crate::services::ledger::Ledger;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use uuid::Uuid;

struct Outstanding {
    requirement: PaymentRequirement,
    /// Serializes settlement attempts for this nonce.
    gate: Arc<Mutex<()>>,
}

struct NegotiatorState {
    outstanding: HashMap<Uuid, Outstanding>,
    /// Nonces that reached a terminal verdict, kept one TTL window so a
    /// duplicate submission gets `NonceAlreadyConsumed` rather than
    /// `UnknownNonce`.
    consumed: HashMap<Uuid, DateTime<Utc>>,
    /// Nonces whose requirement expired unsettled, kept one TTL window so
    /// a late proof gets `RequirementExpired`.
    expired: HashMap<Uuid, DateTime<Utc>>,
}

/// Payment Negotiator: the 402 challenge/response state machine.
///
/// Issues single-use requirements for priced tools and settles submitted
/// proofs against the ledger. Settlement and the terminal verdict consume
/// the nonce at most once; transient outcomes (ledger unreachable,
/// transaction still pending after the bounded poll) leave the requirement
/// outstanding so the same proof may be retried.
pub struct PaymentNegotiator {
    ledger: Arc<dyn Ledger>,
    recipient: String,
    ttl: ChronoDuration,
    poll_attempts: u32,
    poll_interval: Duration,
    state: Mutex<NegotiatorState>,
}

impl PaymentNegotiator {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        recipient: String,
        ttl_secs: u64,
        poll_attempts: u32,
        poll_interval_ms: u64,
    ) -> Self {
        Self {
            ledger,
            recipient,
            ttl: ChronoDuration::seconds(ttl_secs as i64),
            poll_attempts,
            poll_interval: Duration::from_millis(poll_interval_ms),
            state: Mutex::new(NegotiatorState {
                outstanding: HashMap::new(),
                consumed: HashMap::new(),
                expired: HashMap::new(),
            }),
        }
    }

    /// Issue a fresh requirement for a priced tool. The amount and the
    /// recipient are frozen here; later registry changes do not affect an
    /// outstanding requirement.
    pub async fn require(&self, tool: &str, amount: u64) -> PaymentRequirement {
        let requirement = PaymentRequirement {
            nonce: Uuid::new_v4(),
            amount,
            recipient: self.recipient.clone(),
            expires_at: Utc::now() + self.ttl,
            tool: tool.to_string(),
        };

        let mut state = self.state.lock().await;
        self.sweep(&mut state, Utc::now());
        state.outstanding.insert(
            requirement.nonce,
            Outstanding {
                requirement: requirement.clone(),
                gate: Arc::new(Mutex::new(())),
            },
        );

        tracing::info!(
            nonce = %requirement.nonce,
            amount,
            tool,
            expires_at = %requirement.expires_at,
            "Issued payment requirement"
        );
        requirement
    }

    pub async fn outstanding_count(&self) -> usize {
        self.state.lock().await.outstanding.len()
    }

    /// Settle a proof for `tool`. On success the nonce is consumed and the
    /// settled requirement is returned so the dispatcher can proceed.
    pub async fn settle(
        &self,
        proof: &PaymentProof,
        tool: &str,
    ) -> Result<PaymentRequirement, GatewayError> {
        // Locate the requirement and its per-nonce gate without holding the
        // table lock across any await.
        let gate = {
            let mut state = self.state.lock().await;
            self.sweep(&mut state, Utc::now());
            match state.outstanding.get(&proof.nonce) {
                Some(entry) => entry.gate.clone(),
                None => return Err(self.missing_nonce_error(&state, proof.nonce)),
            }
        };

        let _serialized = gate.lock().await;

        // Re-check under the gate: a concurrent attempt may have consumed
        // the nonce, or time may have run out while we waited.
        let requirement = {
            let mut state = self.state.lock().await;
            let now = Utc::now();
            self.sweep(&mut state, now);
            match state.outstanding.get(&proof.nonce) {
                Some(entry) => entry.requirement.clone(),
                None => return Err(self.missing_nonce_error(&state, proof.nonce)),
            }
        };

        if requirement.tool != tool {
            // Caller error, not ledger truth: the requirement stays
            // settleable for the tool it was issued for.
            return Err(GatewayError::InvalidPaymentProof(format!(
                "requirement {} was issued for tool '{}'",
                proof.nonce, requirement.tool
            )));
        }

        match self.confirm_on_ledger(proof, &requirement).await? {
            Verdict::Settled => {
                self.consume(proof.nonce).await;
                tracing::info!(
                    nonce = %proof.nonce,
                    transaction = %proof.transaction,
                    amount = requirement.amount,
                    "Payment settled"
                );
                Ok(requirement)
            }
            Verdict::Rejected(reason) => {
                // Ledger truth cannot change for this proof; terminal.
                self.consume(proof.nonce).await;
                tracing::warn!(nonce = %proof.nonce, %reason, "Settlement rejected");
                Err(GatewayError::SettlementRejected(reason))
            }
            Verdict::StillPending => {
                // Leave the requirement outstanding: the transaction may
                // yet confirm, and the caller can retry the same proof.
                Err(GatewayError::SettlementPending(format!(
                    "transaction {} not confirmed after {} polls",
                    proof.transaction, self.poll_attempts
                )))
            }
        }
    }

    /// Bounded poll of the ledger's transaction-status query.
    async fn confirm_on_ledger(
        &self,
        proof: &PaymentProof,
        requirement: &PaymentRequirement,
    ) -> Result<Verdict, GatewayError> {
        let mut last_seen_pending = false;
        for attempt in 0..self.poll_attempts {
            if attempt > 0 {
                tokio::time::sleep(self.poll_interval).await;
            }

            match self.ledger.get_transaction(&proof.transaction).await? {
                None => continue,
                Some(tx) => match tx.status {
                    TxStatus::Pending => {
                        last_seen_pending = true;
                        continue;
                    }
                    TxStatus::Failed => {
                        return Ok(Verdict::Rejected(format!(
                            "transaction {} failed on the ledger",
                            proof.transaction
                        )))
                    }
                    TxStatus::Confirmed => {
                        if tx.recipient != requirement.recipient {
                            return Ok(Verdict::Rejected(format!(
                                "payment went to '{}', required '{}'",
                                tx.recipient, requirement.recipient
                            )));
                        }
                        if tx.amount < requirement.amount {
                            return Ok(Verdict::Rejected(format!(
                                "insufficient payment: {} < {}",
                                tx.amount, requirement.amount
                            )));
                        }
                        return Ok(Verdict::Settled);
                    }
                },
            }
        }

        if last_seen_pending {
            Ok(Verdict::StillPending)
        } else {
            Ok(Verdict::Rejected(format!(
                "transaction {} not found on the ledger",
                proof.transaction
            )))
        }
    }

    async fn consume(&self, nonce: Uuid) {
        let mut state = self.state.lock().await;
        state.outstanding.remove(&nonce);
        state.consumed.insert(nonce, Utc::now());
    }

    fn missing_nonce_error(&self, state: &NegotiatorState, nonce: Uuid) -> GatewayError {
        if state.consumed.contains_key(&nonce) {
            GatewayError::NonceAlreadyConsumed(nonce)
        } else if state.expired.contains_key(&nonce) {
            GatewayError::RequirementExpired(nonce)
        } else {
            GatewayError::UnknownNonce(nonce)
        }
    }

    /// Move expired requirements out of the outstanding table and drop
    /// consumed/expired markers older than one extra TTL window. Markers
    /// are pruned before new expirations are recorded, so a marker always
    /// survives at least one full window.
    fn sweep(&self, state: &mut NegotiatorState, now: DateTime<Utc>) {
        let horizon = now - self.ttl;
        state.consumed.retain(|_, at| *at > horizon);
        state.expired.retain(|_, at| *at > horizon);

        let expired_nonces: Vec<Uuid> = state
            .outstanding
            .iter()
            .filter(|(_, entry)| entry.requirement.is_expired(now))
            .map(|(nonce, _)| *nonce)
            .collect();
        for nonce in expired_nonces {
            state.outstanding.remove(&nonce);
            state.expired.insert(nonce, now);
            tracing::debug!(%nonce, "Requirement expired unsettled");
        }
    }
}

enum Verdict {
    Settled,
    Rejected(String),
    StillPending,
}
