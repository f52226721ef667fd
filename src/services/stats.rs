use crate::models::Stats;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Instant;

/// In-memory gateway counters, reset on restart.
pub struct GatewayStats {
    tool_calls: AtomicU64,
    requirements_issued: AtomicU64,
    payments_settled: AtomicU64,
    revenue_lamports: AtomicU64,
    start_time: Instant,
}

impl GatewayStats {
    pub fn new() -> Self {
        Self {
            tool_calls: AtomicU64::new(0),
            requirements_issued: AtomicU64::new(0),
            payments_settled: AtomicU64::new(0),
            revenue_lamports: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub fn record_tool_call(&self) {
        self.tool_calls.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_requirement(&self) {
        self.requirements_issued.fetch_add(1, Ordering::SeqCst);
    }

    pub fn record_settlement(&self, amount: u64) {
        self.payments_settled.fetch_add(1, Ordering::SeqCst);
        self.revenue_lamports.fetch_add(amount, Ordering::SeqCst);
        tracing::info!(amount, "Payment recorded");
    }

    pub fn uptime_seconds(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    pub fn snapshot(&self) -> Stats {
        Stats {
            tool_calls: self.tool_calls.load(Ordering::SeqCst),
            requirements_issued: self.requirements_issued.load(Ordering::SeqCst),
            payments_settled: self.payments_settled.load(Ordering::SeqCst),
            revenue_lamports: self.revenue_lamports.load(Ordering::SeqCst),
            uptime_seconds: self.uptime_seconds(),
        }
    }
}

impl Default for GatewayStats {
    fn default() -> Self {
        Self::new()
    }
}
