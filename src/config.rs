// src/config.rs
use config::{Config, ConfigBuilder, Environment, File, FileFormat, builder::DefaultState};
use serde::Deserialize;
use std::env;

use crate::error::{AppError, Result};
use crate::indicators::MacdParams;

#[derive(Debug, Deserialize, Clone)]
pub struct MarketConfig {
    pub base_url: String,
    pub symbol: String,
    pub interval: String,
    pub limit: u32,
    pub timeout_secs: u64,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
pub struct IndicatorSettings {
    pub ma_periods: Vec<usize>,
    pub macd_fast: usize,
    pub macd_slow: usize,
    pub macd_signal: usize,
}

impl Default for IndicatorSettings {
    fn default() -> Self {
        let macd = MacdParams::default();
        IndicatorSettings {
            ma_periods: vec![5, 10, 30],
            macd_fast: macd.fast,
            macd_slow: macd.slow,
            macd_signal: macd.signal,
        }
    }
}

impl IndicatorSettings {
    pub fn macd_params(&self) -> MacdParams {
        MacdParams::new(self.macd_fast, self.macd_slow, self.macd_signal)
    }

    pub fn validate(&self) -> Result<()> {
        if self.ma_periods.is_empty() {
            return Err(AppError::Validation("ma_periods must not be empty".into()));
        }
        if let Some(&p) = self.ma_periods.iter().find(|&&p| p == 0) {
            return Err(AppError::InvalidParameter {
                name: "ma_period",
                value: p,
            });
        }
        self.macd_params().validate()
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub market: MarketConfig,
    pub indicators: IndicatorSettings,
}

fn environment() -> Environment {
    Environment::with_prefix("APP")
        .separator("__")
        .try_parsing(true)
        .list_separator(",")
        .with_list_parse_key("indicators.ma_periods")
}

fn with_defaults() -> Result<ConfigBuilder<DefaultState>> {
    let builder = Config::builder()
        .set_default("market.base_url", "https://api.binance.com")?
        .set_default("market.symbol", "BTCUSDT")?
        .set_default("market.interval", "5m")?
        .set_default("market.limit", 100)?
        .set_default("market.timeout_secs", 10)?
        .set_default("indicators.ma_periods", vec![5, 10, 30])?
        .set_default("indicators.macd_fast", 12)?
        .set_default("indicators.macd_slow", 26)?
        .set_default("indicators.macd_signal", 9)?;
    Ok(builder)
}

impl AppConfig {
    /// Defaults, then `config/default.toml`, `config/{RUN_MODE}.toml`, an
    /// explicit file if given, and finally `APP__*` environment variables.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let run_mode = env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

        let mut builder = with_defaults()?
            .add_source(File::new("config/default.toml", FileFormat::Toml).required(false))
            .add_source(
                File::new(&format!("config/{}.toml", run_mode), FileFormat::Toml).required(false),
            );
        if let Some(p) = path {
            builder = builder.add_source(File::new(p, FileFormat::Toml));
        }

        let cfg: AppConfig = builder
            .add_source(environment())
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn from_toml_str(s: &str) -> Result<Self> {
        let cfg: AppConfig = with_defaults()?
            .add_source(File::from_str(s, FileFormat::Toml))
            .build()?
            .try_deserialize()?;
        cfg.validate()?;
        Ok(cfg)
    }

    pub fn validate(&self) -> Result<()> {
        if !(1..=1000).contains(&self.market.limit) {
            return Err(AppError::Validation(format!(
                "market.limit must be within 1..=1000, got {}",
                self.market.limit
            )));
        }
        self.indicators.validate()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_empty_document() {
        let cfg = AppConfig::from_toml_str("").unwrap();
        assert_eq!(cfg.market.base_url, "https://api.binance.com");
        assert_eq!(cfg.market.interval, "5m");
        assert_eq!(cfg.market.limit, 100);
        assert_eq!(cfg.indicators, IndicatorSettings::default());
        assert_eq!(cfg.indicators.macd_params(), MacdParams::default());
    }

    #[test]
    fn file_overrides_defaults() {
        let cfg = AppConfig::from_toml_str(
            r#"
            [market]
            symbol = "ETHUSDT"
            limit = 200

            [indicators]
            ma_periods = [7, 25]
            macd_signal = 5
            "#,
        )
        .unwrap();
        assert_eq!(cfg.market.symbol, "ETHUSDT");
        assert_eq!(cfg.market.limit, 200);
        assert_eq!(cfg.indicators.ma_periods, vec![7, 25]);
        assert_eq!(cfg.indicators.macd_signal, 5);
        assert_eq!(cfg.indicators.macd_fast, 12);
    }

    #[test]
    fn zero_period_is_rejected() {
        let err = AppConfig::from_toml_str("[indicators]\nmacd_slow = 0\n").unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter { name: "slow", .. }));

        let err = AppConfig::from_toml_str("[indicators]\nma_periods = [5, 0]\n").unwrap_err();
        assert!(matches!(err, AppError::InvalidParameter { name: "ma_period", .. }));
    }

    #[test]
    fn environment_overrides_lists_and_numbers() {
        let vars: config::Map<String, String> = [
            ("APP__INDICATORS__MA_PERIODS", "7,25,99"),
            ("APP__MARKET__LIMIT", "300"),
            ("APP__MARKET__SYMBOL", "ETHUSDT"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let cfg: AppConfig = with_defaults()
            .unwrap()
            .add_source(environment().source(Some(vars)))
            .build()
            .unwrap()
            .try_deserialize()
            .unwrap();
        assert_eq!(cfg.indicators.ma_periods, vec![7, 25, 99]);
        assert_eq!(cfg.market.limit, 300);
        assert_eq!(cfg.market.symbol, "ETHUSDT");
        assert_eq!(cfg.market.interval, "5m");
    }

    #[test]
    fn limit_out_of_range_is_rejected() {
        let err = AppConfig::from_toml_str("[market]\nlimit = 5000\n").unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
