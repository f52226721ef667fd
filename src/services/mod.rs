pub mod dispatcher;
pub mod ledger;
pub mod negotiator;
pub mod registry;
pub mod stats;
pub mod wallet;

#[cfg(test)]
pub mod testing;

pub use dispatcher::ToolDispatcher;
pub use ledger::{Ledger, RpcLedger};
pub use negotiator::PaymentNegotiator;
pub use registry::EndpointRegistry;
pub use stats::GatewayStats;
pub use wallet::WalletService;
