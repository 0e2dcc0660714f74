//! Layered configuration for the XMM engine.
//!
//! Configuration is loaded in layers with increasing priority:
//! 1. Compiled-in defaults (conservative risk limits, paper trading)
//! 2. TOML configuration file (if provided)
//! 3. Environment variable overrides (prefix `XMM_`, nested with `__`)
//! 4. Credential env vars per venue (`BINANCE_API_KEY`, `BINANCE_API_SECRET`,
//!    `BINANCE_API_PASSPHRASE`, and likewise for other venues)
//!
//! Credentials **must** come from environment variables, never from
//! configuration files, so they cannot be checked in by accident.

use std::path::PathBuf;
use std::str::FromStr;

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File};
use serde::Deserialize;

use crate::types::ExchangeId;

// ── Default value functions ────────────────────────────────────────────

fn default_timeout_ms() -> u64 {
    5_000
}

fn default_depth_levels() -> usize {
    20
}

fn default_quote_refresh_us() -> u64 {
    100_000
}

fn default_max_orders_per_second() -> u32 {
    100
}

fn default_max_open_orders() -> u32 {
    100
}

fn default_max_deviation_bps() -> f64 {
    100.0
}

fn default_error_threshold() -> u32 {
    10
}

fn default_reject_threshold() -> u32 {
    20
}

fn default_true() -> bool {
    true
}

fn default_min_profit_bps() -> f64 {
    5.0
}

fn default_max_opportunity_age_ms() -> u64 {
    100
}

fn default_min_liquidity_ratio() -> f64 {
    0.5
}

// ── Configuration structs ──────────────────────────────────────────────

/// Top-level application configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    /// Primary venue connection settings.
    pub exchange: ExchangeConfig,
    /// Trading mode and symbol selection.
    pub trading: TradingConfig,
    /// Quoting strategy parameters.
    pub strategy: StrategyConfig,
    /// Pre-trade risk limits.
    pub risk: RiskConfig,
    /// Cross-venue arbitrage detection settings.
    #[serde(default)]
    pub arbitrage: ArbitrageConfig,
}

/// Venue connection configuration.
///
/// API credentials come from environment variables only; the `#[serde
/// (default)]` annotations keep them out of the TOML schema.
#[derive(Debug, Clone, Deserialize)]
pub struct ExchangeConfig {
    /// Venue name (`binance`, `bybit`, ...).
    pub name: String,
    /// API key, loaded from `<NAME>_API_KEY`.
    #[serde(default)]
    pub api_key: String,
    /// API secret, loaded from `<NAME>_API_SECRET`.
    #[serde(default)]
    pub api_secret: String,
    /// API passphrase, loaded from `<NAME>_API_PASSPHRASE` (venues that
    /// require one).
    #[serde(default)]
    pub passphrase: String,
    /// Use testnet endpoints.
    #[serde(default)]
    pub testnet: bool,
    /// Request timeout in milliseconds.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
}

/// Trading mode configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct TradingConfig {
    /// Symbol to quote (e.g. `BTCUSDT`).
    pub symbol: String,
    /// Simulate execution instead of sending orders to a venue.
    #[serde(default = "default_true")]
    pub paper: bool,
    /// Order book depth to subscribe to.
    #[serde(default = "default_depth_levels")]
    pub depth_levels: usize,
    /// Strategy loop refresh interval in microseconds.
    #[serde(default = "default_quote_refresh_us")]
    pub quote_refresh_us: u64,
}

/// Quoting strategy parameters. Quantities are whole units (converted to
/// fixed-point at engine construction).
#[derive(Debug, Clone, Deserialize)]
pub struct StrategyConfig {
    /// Target quoted spread in basis points.
    pub target_spread_bps: f64,
    /// Spread clamp lower bound in basis points.
    pub min_spread_bps: f64,
    /// Spread clamp upper bound in basis points.
    pub max_spread_bps: f64,
    /// Maximum inventory in base units (0 = unlimited).
    pub max_position: f64,
    /// Inventory skew coefficient applied to the fair value in bps space.
    pub inventory_skew: f64,
    /// Default order size in base units.
    pub order_size: f64,
    /// Order size clamp lower bound.
    #[serde(default)]
    pub min_order_size: f64,
    /// Order size clamp upper bound (0 = no clamp above default).
    #[serde(default)]
    pub max_order_size: f64,
    /// Minimum quote lifetime in microseconds before requoting.
    #[serde(default)]
    pub min_quote_life_us: u64,
}

/// Pre-trade risk limits. Quantities are whole units; values are in quote
/// currency. Zero disables the corresponding check.
#[derive(Debug, Clone, Deserialize)]
pub struct RiskConfig {
    pub max_position_qty: f64,
    #[serde(default)]
    pub max_order_qty: f64,
    #[serde(default)]
    pub max_order_value: f64,
    #[serde(default = "default_max_orders_per_second")]
    pub max_orders_per_second: u32,
    #[serde(default = "default_max_open_orders")]
    pub max_open_orders: u32,
    pub max_daily_loss: f64,
    #[serde(default)]
    pub max_drawdown: f64,
    #[serde(default = "default_max_deviation_bps")]
    pub max_deviation_bps: f64,
    #[serde(default = "default_true")]
    pub kill_switch_enabled: bool,
    #[serde(default = "default_error_threshold")]
    pub error_threshold: u32,
    #[serde(default = "default_reject_threshold")]
    pub reject_threshold: u32,
}

/// Cross-venue arbitrage detection settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ArbitrageConfig {
    /// Run the scanner at all.
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_min_profit_bps")]
    pub min_profit_bps: f64,
    /// Minimum executable size in base units.
    #[serde(default)]
    pub min_quantity: f64,
    /// Cap on executable size in base units (0 = uncapped).
    #[serde(default)]
    pub max_quantity: f64,
    /// Opportunities older than this are discarded.
    #[serde(default = "default_max_opportunity_age_ms")]
    pub max_opportunity_age_ms: u64,
    #[serde(default = "default_true")]
    pub require_both_sides_liquid: bool,
    #[serde(default = "default_min_liquidity_ratio")]
    pub min_liquidity_ratio: f64,
}

impl Default for ArbitrageConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            min_profit_bps: default_min_profit_bps(),
            min_quantity: 0.0,
            max_quantity: 0.0,
            max_opportunity_age_ms: default_max_opportunity_age_ms(),
            require_both_sides_liquid: true,
            min_liquidity_ratio: default_min_liquidity_ratio(),
        }
    }
}

impl AppConfig {
    /// Load configuration from layered sources.
    ///
    /// 1. Compiled-in defaults.
    /// 2. TOML file at `config_path`, if given.
    /// 3. Env overrides with prefix `XMM_` and `__` as the nesting separator
    ///    (e.g. `XMM_RISK__MAX_DAILY_LOSS=500`).
    /// 4. Credential env vars derived from the venue name:
    ///    `BINANCE_API_KEY`, `BINANCE_API_SECRET`, `BINANCE_API_PASSPHRASE`.
    pub fn load(config_path: Option<PathBuf>) -> Result<Self> {
        let mut builder = Config::builder()
            // ── Layer 1: compiled-in defaults ───────────────────────
            .set_default("exchange.name", "binance")?
            .set_default("exchange.testnet", true)?
            .set_default("exchange.timeout_ms", 5_000i64)?
            .set_default("trading.symbol", "BTCUSDT")?
            .set_default("trading.paper", true)?
            .set_default("trading.depth_levels", 20i64)?
            .set_default("trading.quote_refresh_us", 100_000i64)?
            .set_default("strategy.target_spread_bps", 10.0)?
            .set_default("strategy.min_spread_bps", 5.0)?
            .set_default("strategy.max_spread_bps", 50.0)?
            .set_default("strategy.max_position", 0.1)?
            .set_default("strategy.inventory_skew", 0.5)?
            .set_default("strategy.order_size", 0.001)?
            .set_default("strategy.min_quote_life_us", 50_000i64)?
            .set_default("risk.max_position_qty", 0.1)?
            .set_default("risk.max_order_qty", 0.01)?
            .set_default("risk.max_daily_loss", 100.0)?
            .set_default("risk.max_drawdown", 200.0)?;

        // ── Layer 2: TOML file ─────────────────────────────────────
        if let Some(path) = config_path {
            let path_str = path.to_str().context("config path is not valid UTF-8")?;
            builder = builder.add_source(File::with_name(path_str).required(true));
        }

        // ── Layer 3: env var overrides (XMM_ prefix) ───────────────
        // The prefix separator is set explicitly to `_`; the `config` crate
        // would otherwise reuse the nesting separator and require a
        // double-underscore prefix.
        builder = builder.add_source(
            Environment::with_prefix("XMM")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let mut cfg: AppConfig = builder
            .build()
            .context("failed to build configuration")?
            .try_deserialize()
            .context("failed to deserialize configuration")?;

        // ── Layer 4: credential env vars ───────────────────────────
        let prefix = cfg.exchange.name.to_ascii_uppercase();
        if let Ok(v) = std::env::var(format!("{prefix}_API_KEY")) {
            cfg.exchange.api_key = v;
        }
        if let Ok(v) = std::env::var(format!("{prefix}_API_SECRET")) {
            cfg.exchange.api_secret = v;
        }
        if let Ok(v) = std::env::var(format!("{prefix}_API_PASSPHRASE")) {
            cfg.exchange.passphrase = v;
        }

        cfg.validate()?;
        Ok(cfg)
    }

    /// The configured venue as a typed id.
    pub fn exchange_id(&self) -> Result<ExchangeId> {
        ExchangeId::from_str(&self.exchange.name)
            .with_context(|| format!("unrecognized exchange '{}'", self.exchange.name))
    }

    /// Validate configuration invariants. Violations are fatal at startup.
    fn validate(&self) -> Result<()> {
        if self.trading.symbol.is_empty() {
            bail!("trading.symbol must not be empty");
        }
        self.exchange_id()?;
        if self.strategy.min_spread_bps > self.strategy.max_spread_bps {
            bail!(
                "strategy.min_spread_bps ({}) exceeds max_spread_bps ({})",
                self.strategy.min_spread_bps,
                self.strategy.max_spread_bps
            );
        }
        if !self.trading.paper
            && (self.exchange.api_key.is_empty() || self.exchange.api_secret.is_empty())
        {
            bail!(
                "API key and secret are required for live trading on {}",
                self.exchange.name
            );
        }
        Ok(())
    }
}
