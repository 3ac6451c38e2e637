// src/lib.rs
//! Chart indicator pipeline: candles from the Binance public API in,
//! MA / EMA / MACD overlays out.

pub mod chart;
pub mod config;
pub mod error;
pub mod indicators;
pub mod market_data;


pub use chart::{ChartSeries, IndicatorService};
pub use error::{AppError, Result};
pub use indicators::{MaLine, MacdParams, MacdSeries, ema, macd, moving_average, moving_averages};
pub use market_data::{BinanceClient, Candle, KlineQuery, KlineSource};
