use anyhow::{bail, Context, Result};

#[derive(Debug, Clone)]
pub enum Environment {
    Development,
    Staging,
    Production,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub environment: Environment,
    pub host: String,
    pub port: u16,

    /// Public base URL used to build claim links.
    pub base_url: String,

    // Redis (rate-limit counters)
    pub redis_url: String,

    // Transfers
    pub transfer_ttl_secs: i64,

    // Webhook delivery
    pub webhook_max_retries: u32,
    pub webhook_timeout_ms: u64,
    pub webhook_retry_delay_ms: u64,

    // Cron
    pub cron_secret: String,

    /// Shared secret for verifying inbound webhook signatures.
    pub inbound_webhook_secret: String,

    // Transaction verification collaborator
    pub verifier_url: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            environment: Self::parse_environment()?,
            host: std::env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
            port: std::env::var("PORT")
                .unwrap_or_else(|_| "8080".to_string())
                .parse()
                .context("Invalid PORT")?,

            base_url: std::env::var("BASE_URL")
                .unwrap_or_else(|_| "http://localhost:8080".to_string()),

            redis_url: std::env::var("REDIS_URL")
                .unwrap_or_else(|_| "redis://localhost:6379".to_string()),

            transfer_ttl_secs: std::env::var("TRANSFER_TTL_SECS")
                .unwrap_or_else(|_| "604800".to_string()) // 7 days
                .parse()
                .context("Invalid TRANSFER_TTL_SECS")?,

            webhook_max_retries: std::env::var("WEBHOOK_MAX_RETRIES")
                .unwrap_or_else(|_| "3".to_string())
                .parse()
                .context("Invalid WEBHOOK_MAX_RETRIES")?,
            webhook_timeout_ms: std::env::var("WEBHOOK_TIMEOUT")
                .unwrap_or_else(|_| "10000".to_string())
                .parse()
                .context("Invalid WEBHOOK_TIMEOUT")?,
            webhook_retry_delay_ms: std::env::var("WEBHOOK_RETRY_DELAY")
                .unwrap_or_else(|_| "1000".to_string())
                .parse()
                .context("Invalid WEBHOOK_RETRY_DELAY")?,

            cron_secret: std::env::var("CRON_SECRET").context("CRON_SECRET required")?,

            inbound_webhook_secret: std::env::var("WEBHOOK_INBOUND_SECRET")
                .context("WEBHOOK_INBOUND_SECRET required")?,

            verifier_url: std::env::var("VERIFIER_URL")
                .context("VERIFIER_URL required")?,
        };

        config.validate()?;
        Ok(config)
    }

    fn parse_environment() -> Result<Environment> {
        let env = std::env::var("ENVIRONMENT").unwrap_or_else(|_| "development".to_string());

        match env.to_lowercase().as_str() {
            "development" | "dev" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "production" | "prod" => Ok(Environment::Production),
            _ => bail!("Unknown environment: {}", env),
        }
    }

    fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http") {
            bail!("BASE_URL must be HTTP(S) URL");
        }
        if !self.verifier_url.starts_with("http") {
            bail!("VERIFIER_URL must be HTTP(S) URL");
        }
        if self.cron_secret.len() < 16 {
            bail!("CRON_SECRET must be at least 16 characters");
        }
        if self.transfer_ttl_secs <= 0 {
            bail!("TRANSFER_TTL_SECS must be positive");
        }
        if self.webhook_max_retries == 0 {
            bail!("WEBHOOK_MAX_RETRIES must be at least 1");
        }

        tracing::info!(
            "Configuration validated for {:?} environment",
            self.environment
        );

        Ok(())
    }
}
