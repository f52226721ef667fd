pub mod endpoints;
pub mod health;
pub mod stats;
pub mod tools;
pub mod wallet;

pub use endpoints::*;
pub use health::*;
pub use stats::*;
pub use tools::*;
pub use wallet::*;

use crate::services::{
    EndpointRegistry, GatewayStats, PaymentNegotiator, ToolDispatcher, WalletService,
};
use std::sync::Arc;

/// Process-wide context: every service is constructed once in `main` and
/// passed here explicitly.
#[derive(Clone)]
pub struct AppState {
    pub registry: Arc<EndpointRegistry>,
    pub dispatcher: Arc<ToolDispatcher>,
    pub negotiator: Option<Arc<PaymentNegotiator>>,
    pub wallet: Option<Arc<WalletService>>,
    pub stats: Arc<GatewayStats>,
}
