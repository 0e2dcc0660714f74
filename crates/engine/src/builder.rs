//! Programmatic engine construction.
//!
//! The engine is driven through [`EngineBuilder`]: load (or supply) an
//! [`AppConfig`], optionally override the symbol and venue, plug in a
//! quoter and an adapter, and build. Configuration problems are fatal here,
//! before any thread starts.

use std::str::FromStr;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

use xmm_arb::ArbConfig;
use xmm_core::config::AppConfig;
use xmm_core::types::{ExchangeId, Quantity, Symbol};
use xmm_risk::RiskLimits;
use xmm_strategy::{BasicQuoter, Quoter, QuoterParams};

use crate::client::ExchangeClient;
use crate::engine::{Engine, EngineSettings};
use crate::paper::PaperClient;

/// Builder wiring configuration, strategy, and adapter into an [`Engine`].
#[derive(Default)]
pub struct EngineBuilder {
    config: Option<AppConfig>,
    symbol: Option<String>,
    exchange: Option<String>,
    risk_limits: Option<RiskLimits>,
    quoter: Option<Box<dyn Quoter>>,
    client: Option<Arc<dyn ExchangeClient>>,
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Use an already-loaded configuration.
    pub fn config(mut self, config: AppConfig) -> Self {
        self.config = Some(config);
        self
    }

    /// Override the configured symbol.
    pub fn symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = Some(symbol.into());
        self
    }

    /// Override the configured venue.
    pub fn exchange(mut self, exchange: impl Into<String>) -> Self {
        self.exchange = Some(exchange.into());
        self
    }

    /// Override the risk limits derived from configuration.
    pub fn risk_limits(mut self, limits: RiskLimits) -> Self {
        self.risk_limits = Some(limits);
        self
    }

    /// Supply the quoting strategy. Defaults to [`BasicQuoter`] built from
    /// the strategy configuration.
    pub fn quoter(mut self, quoter: Box<dyn Quoter>) -> Self {
        self.quoter = Some(quoter);
        self
    }

    /// Supply the venue adapter. Defaults to [`PaperClient`] in paper mode;
    /// live mode requires an explicit adapter.
    pub fn client(mut self, client: Arc<dyn ExchangeClient>) -> Self {
        self.client = Some(client);
        self
    }

    pub fn build(self) -> Result<Engine> {
        let config = match self.config {
            Some(config) => config,
            None => AppConfig::load(None)?,
        };

        let symbol_str = self.symbol.unwrap_or_else(|| config.trading.symbol.clone());
        if symbol_str.is_empty() {
            bail!("symbol must not be empty");
        }
        let symbol = Symbol::new(&symbol_str);

        let exchange_str = self.exchange.unwrap_or_else(|| config.exchange.name.clone());
        let exchange = ExchangeId::from_str(&exchange_str)
            .with_context(|| format!("unrecognized exchange '{exchange_str}'"))?;

        let limits = self.risk_limits.unwrap_or_else(|| risk_limits_from(&config));
        let quoter = self
            .quoter
            .unwrap_or_else(|| Box::new(BasicQuoter::new(quoter_params_from(&config))));

        let client = match self.client {
            Some(client) => client,
            None if config.trading.paper => Arc::new(PaperClient::new(exchange)),
            None => bail!(
                "live trading on {} requires an exchange adapter; \
                 pass one with EngineBuilder::client",
                exchange
            ),
        };

        let settings = EngineSettings {
            symbol,
            exchange,
            depth_levels: config.trading.depth_levels,
            quote_refresh_us: config.trading.quote_refresh_us,
            max_position: Quantity::from_f64(config.strategy.max_position),
            arb_enabled: config.arbitrage.enabled,
        };
        let arb_config = arb_config_from(&config);

        Ok(Engine::new(settings, limits, quoter, arb_config, client))
    }
}

/// Map the flat risk configuration onto gate limits.
fn risk_limits_from(config: &AppConfig) -> RiskLimits {
    let risk = &config.risk;
    RiskLimits {
        max_position_qty: Quantity::from_f64(risk.max_position_qty),
        max_order_qty: Quantity::from_f64(risk.max_order_qty),
        max_order_value: risk.max_order_value,
        max_orders_per_second: risk.max_orders_per_second,
        max_open_orders: risk.max_open_orders,
        max_daily_loss: risk.max_daily_loss,
        max_drawdown: risk.max_drawdown,
        max_deviation_bps: risk.max_deviation_bps,
        kill_switch_enabled: risk.kill_switch_enabled,
        error_threshold: risk.error_threshold,
        reject_threshold: risk.reject_threshold,
        ..RiskLimits::default()
    }
}

fn quoter_params_from(config: &AppConfig) -> QuoterParams {
    let strategy = &config.strategy;
    QuoterParams {
        min_spread_bps: strategy.min_spread_bps,
        max_spread_bps: strategy.max_spread_bps,
        target_spread_bps: strategy.target_spread_bps,
        max_position: Quantity::from_f64(strategy.max_position),
        inventory_skew_coeff: strategy.inventory_skew,
        default_order_size: Quantity::from_f64(strategy.order_size),
        min_order_size: Quantity::from_f64(strategy.min_order_size),
        max_order_size: Quantity::from_f64(strategy.max_order_size),
        min_quote_life_us: strategy.min_quote_life_us,
    }
}

fn arb_config_from(config: &AppConfig) -> ArbConfig {
    let arb = &config.arbitrage;
    ArbConfig {
        min_profit_bps: arb.min_profit_bps,
        min_quantity: Quantity::from_f64(arb.min_quantity),
        max_quantity: Quantity::from_f64(arb.max_quantity),
        max_opportunity_age_ns: arb.max_opportunity_age_ms * 1_000_000,
        require_both_sides_liquid: arb.require_both_sides_liquid,
        min_liquidity_ratio: arb.min_liquidity_ratio,
        ..ArbConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> AppConfig {
        // Defaults only; credentials and files are not touched.
        AppConfig::load(None).expect("default config loads")
    }

    #[test]
    fn test_build_paper_engine_with_defaults() {
        let engine = EngineBuilder::new()
            .config(test_config())
            .build()
            .expect("paper engine builds");
        assert!(!engine.is_running());
    }

    #[test]
    fn test_symbol_and_exchange_overrides() {
        let engine = EngineBuilder::new()
            .config(test_config())
            .symbol("ETHUSDT")
            .exchange("bybit")
            .build();
        assert!(engine.is_ok());
    }

    #[test]
    fn test_unknown_exchange_fails() {
        let result = EngineBuilder::new()
            .config(test_config())
            .exchange("lse")
            .build();
        assert!(result.is_err());
        assert!(format!("{:#}", result.unwrap_err()).contains("lse"));
    }

    #[test]
    fn test_empty_symbol_fails() {
        let result = EngineBuilder::new()
            .config(test_config())
            .symbol("")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn test_live_mode_without_adapter_fails() {
        let mut config = test_config();
        config.trading.paper = false;
        let result = EngineBuilder::new().config(config).build();
        assert!(result.is_err());
        assert!(format!("{}", result.unwrap_err()).contains("adapter"));
    }

    #[test]
    fn test_risk_limits_mapping() {
        let mut config = test_config();
        config.risk.max_position_qty = 2.5;
        config.risk.max_orders_per_second = 7;
        let limits = risk_limits_from(&config);
        assert_eq!(limits.max_position_qty, Quantity::from_f64(2.5));
        assert_eq!(limits.max_orders_per_second, 7);
        assert!(limits.kill_switch_enabled);
    }

    #[test]
    fn test_quoter_params_mapping() {
        let mut config = test_config();
        config.strategy.target_spread_bps = 12.0;
        config.strategy.order_size = 0.25;
        let params = quoter_params_from(&config);
        assert_eq!(params.target_spread_bps, 12.0);
        assert_eq!(params.default_order_size, Quantity::from_f64(0.25));
    }
}
