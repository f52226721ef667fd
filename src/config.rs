use anyhow::{bail, Context, Result};
use std::path::PathBuf;

#[derive(Debug, Clone)]
pub enum Environment {
    Development,
    Testnet,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,

    // Ledger (settlement network)
    pub ledger_rpc_url: String,
    pub key_path: PathBuf,
    pub funding_threshold: u64,
    pub funding_amount: u64,

    // Payment handshake
    pub payment_ttl_secs: u64,
    pub settle_poll_attempts: u32,
    pub settle_poll_interval_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let environment = Self::parse_environment()?;

        let config = Self {
            environment: environment.clone(),
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid PORT")?,

            ledger_rpc_url: std::env::var("LEDGER_RPC_URL")
                .unwrap_or_else(|_| "http://127.0.0.1:8899".to_string()),
            key_path: std::env::var("KEY_PATH")
                .unwrap_or_else(|_| "tollgate.key".to_string())
                .into(),
            funding_threshold: std::env::var("FUNDING_THRESHOLD")
                .unwrap_or_else(|_| "100000".to_string())
                .parse()
                .context("Invalid FUNDING_THRESHOLD")?,
            funding_amount: std::env::var("FUNDING_AMOUNT")
                .unwrap_or_else(|_| "10000000".to_string())
                .parse()
                .context("Invalid FUNDING_AMOUNT")?,

            payment_ttl_secs: std::env::var("PAYMENT_TTL_SECS")
                .unwrap_or_else(|_| "300".to_string())
                .parse()
                .context("Invalid PAYMENT_TTL_SECS")?,
            settle_poll_attempts: std::env::var("SETTLE_POLL_ATTEMPTS")
                .unwrap_or_else(|_| "5".to_string())
                .parse()
                .context("Invalid SETTLE_POLL_ATTEMPTS")?,
            settle_poll_interval_ms: std::env::var("SETTLE_POLL_INTERVAL_MS")
                .unwrap_or_else(|_| "500".to_string())
                .parse()
                .context("Invalid SETTLE_POLL_INTERVAL_MS")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn parse_environment() -> Result<Environment> {
        let env = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        match env.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "testnet" | "test" => Ok(Environment::Testnet),
            "production" | "prod" => Ok(Environment::Production),
            _ => bail!("Unknown environment: {}", env),
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.ledger_rpc_url.starts_with("http") {
            bail!("LEDGER_RPC_URL must be HTTP(S) URL");
        }
        if self.payment_ttl_secs == 0 {
            bail!("PAYMENT_TTL_SECS must be positive");
        }
        if self.settle_poll_attempts == 0 {
            bail!("SETTLE_POLL_ATTEMPTS must be positive");
        }

        tracing::info!(
            "Configuration validated for {:?} environment",
            self.environment
        );

        Ok(())
    }
}
