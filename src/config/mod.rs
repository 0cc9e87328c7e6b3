use serde::Deserialize;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
    #[error("missing required env var: {0}")]
    MissingEnv(String),
    #[error("invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub indexer: IndexerConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub prices: PricesConfig,
    #[serde(default)]
    pub settlement: SettlementConfig,
    #[serde(default)]
    pub notify: NotifyConfig,
    #[serde(default)]
    pub dashboard: DashboardConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IndexerConfig {
    /// GraphQL endpoint - loaded from env GRAPHQL_API
    #[serde(default)]
    pub graphql_url: String,
    /// Contract type filter for the events query.
    #[serde(default = "default_contract_type")]
    pub contract_type: String,
    /// Poll interval in seconds.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Events older than this are ignored.
    #[serde(default = "default_freshness")]
    pub freshness_secs: u64,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ChainConfig {
    /// LCD REST gateway - loaded from env LCD_URL
    #[serde(default)]
    pub lcd_url: String,
    /// Wager contract address - loaded from env WAGER_CONTRACT
    #[serde(default)]
    pub wager_contract: String,
    /// Address that signs settlements - loaded from env OPERATOR_ADDRESS
    #[serde(default)]
    pub operator_address: String,
    #[serde(default = "default_fee_denom")]
    pub fee_denom: String,
    #[serde(default = "default_gas_limit")]
    pub gas_limit: u64,
    /// Broadcast settlements (false = paper mode).
    #[serde(default)]
    pub execute: bool,
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PricesConfig {
    /// Price API base URL - loaded from env KNOWLEDGE_API
    #[serde(default)]
    pub base_url: String,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SettlementConfig {
    /// Delay after wager expiry before settling.
    #[serde(default = "default_grace")]
    pub grace_secs: u64,
    /// Price fetch attempts at settlement time.
    #[serde(default = "default_retry_attempts")]
    pub price_retry_attempts: u32,
    /// First retry delay in milliseconds; doubles per attempt.
    #[serde(default = "default_retry_base_ms")]
    pub price_retry_base_ms: u64,
    #[serde(default = "default_submit_timeout")]
    pub submit_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NotifyConfig {
    /// Webhook URL - loaded from env WEBHOOK_URL. Empty disables notifications.
    #[serde(default)]
    pub webhook_url: String,
    #[serde(default = "default_display_name")]
    pub display_name: String,
    #[serde(default = "default_avatar_base_url")]
    pub avatar_base_url: String,
    #[serde(default = "default_matchmake_url")]
    pub matchmake_url: String,
    #[serde(default = "default_coin")]
    pub coin: String,
    #[serde(default = "default_request_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DashboardConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_contract_type() -> String {
    "crates.io:cw-wager".to_string()
}
fn default_poll_interval() -> u64 {
    6
}
fn default_freshness() -> u64 {
    15
}
fn default_request_timeout() -> u64 {
    10
}
fn default_fee_denom() -> String {
    "ustars".to_string()
}
fn default_gas_limit() -> u64 {
    666_666
}
fn default_grace() -> u64 {
    12
}
fn default_retry_attempts() -> u32 {
    5
}
fn default_retry_base_ms() -> u64 {
    500
}
fn default_submit_timeout() -> u64 {
    30
}
fn default_display_name() -> String {
    "Wizard".to_string()
}
fn default_avatar_base_url() -> String {
    "https://ipfs.io/ipfs/bafybeiawdykynb2757er3jikvi5yrpmbqrltsulhsli5mij3nfdmhxoity/png256_assets"
        .to_string()
}
fn default_matchmake_url() -> String {
    "https://duel.pixelwizards.art/wager".to_string()
}
fn default_coin() -> String {
    "STARS".to_string()
}
fn default_bind_addr() -> String {
    "0.0.0.0:3450".to_string()
}
fn default_log_level() -> String {
    "info".to_string()
}

impl Default for IndexerConfig {
    fn default() -> Self {
        Self {
            graphql_url: String::new(),
            contract_type: default_contract_type(),
            poll_interval_secs: default_poll_interval(),
            freshness_secs: default_freshness(),
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            lcd_url: String::new(),
            wager_contract: String::new(),
            operator_address: String::new(),
            fee_denom: default_fee_denom(),
            gas_limit: default_gas_limit(),
            execute: false,
            request_timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for PricesConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for SettlementConfig {
    fn default() -> Self {
        Self {
            grace_secs: default_grace(),
            price_retry_attempts: default_retry_attempts(),
            price_retry_base_ms: default_retry_base_ms(),
            submit_timeout_secs: default_submit_timeout(),
        }
    }
}

impl Default for NotifyConfig {
    fn default() -> Self {
        Self {
            webhook_url: String::new(),
            display_name: default_display_name(),
            avatar_base_url: default_avatar_base_url(),
            matchmake_url: default_matchmake_url(),
            coin: default_coin(),
            timeout_secs: default_request_timeout(),
        }
    }
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            bind_addr: default_bind_addr(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

impl IndexerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn freshness(&self) -> Duration {
        Duration::from_secs(self.freshness_secs)
    }
}

impl SettlementConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_secs(self.grace_secs)
    }
}

impl Config {
    /// Load config from a TOML file, then overlay environment variables for
    /// endpoints and addresses.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;
        config.apply_env();
        Ok(config)
    }

    /// Default config with env-only endpoints (no file needed).
    pub fn from_env() -> Self {
        let mut config = Config::default();
        config.apply_env();
        config
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var("GRAPHQL_API") {
            self.indexer.graphql_url = url;
        }
        if let Ok(url) = std::env::var("LCD_URL") {
            self.chain.lcd_url = url;
        }
        if let Ok(contract) = std::env::var("WAGER_CONTRACT") {
            self.chain.wager_contract = contract;
        }
        if let Ok(operator) = std::env::var("OPERATOR_ADDRESS") {
            self.chain.operator_address = operator;
        }
        if let Ok(url) = std::env::var("KNOWLEDGE_API") {
            self.prices.base_url = url;
        }
        if let Ok(url) = std::env::var("WEBHOOK_URL") {
            self.notify.webhook_url = url;
        }
        if let Ok(port) = std::env::var("PORT") {
            self.dashboard.bind_addr = format!("0.0.0.0:{port}");
        }
    }

    /// Check that every required endpoint is set.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let required = [
            ("GRAPHQL_API", &self.indexer.graphql_url),
            ("LCD_URL", &self.chain.lcd_url),
            ("WAGER_CONTRACT", &self.chain.wager_contract),
            ("OPERATOR_ADDRESS", &self.chain.operator_address),
            ("KNOWLEDGE_API", &self.prices.base_url),
        ];
        if let Some((name, _)) = required.iter().find(|(_, value)| value.is_empty()) {
            return Err(ConfigError::MissingEnv(name.to_string()));
        }
        if self.indexer.poll_interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "indexer.poll_interval_secs must be > 0".to_string(),
            ));
        }
        Ok(())
    }

    pub fn notifications_enabled(&self) -> bool {
        !self.notify.webhook_url.is_empty()
    }
}
