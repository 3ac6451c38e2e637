// src/main.rs
use anyhow::{Context, Result};
use chart_indicators::config::AppConfig;
use chart_indicators::{
    BinanceClient, IndicatorService, KlineQuery, MacdParams, macd, moving_averages,
};
use clap::{Parser, Subcommand};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "chart-indicators", about = "MA / EMA / MACD overlays for exchange charts")]
struct Cli {
    /// extra TOML config file, applied after config/default.toml
    #[arg(long)]
    config: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// fetch klines and print the full chart series as JSON
    Chart {
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        interval: Option<String>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// print the 24h ticker for a symbol
    Ticker {
        #[arg(long)]
        symbol: Option<String>,
    },
    /// compute indicators for a literal list of closing prices
    Calc {
        #[arg(long, value_delimiter = ',', required = true, allow_negative_numbers = true)]
        closes: Vec<f64>,
        #[arg(long = "ma")]
        ma_periods: Vec<usize>,
        #[arg(long, default_value_t = 12)]
        fast: usize,
        #[arg(long, default_value_t = 26)]
        slow: usize,
        #[arg(long, default_value_t = 9)]
        signal: usize,
    },
}

#[derive(Serialize)]
struct CalcOutput {
    ma_lines: Vec<chart_indicators::MaLine>,
    macd: chart_indicators::MacdSeries,
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let s = serde_json::to_string_pretty(value).context("Failed to serialize output")?;
    println!("{}", s);
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Calc {
            closes,
            ma_periods,
            fast,
            slow,
            signal,
        } => {
            let ma_periods = if ma_periods.is_empty() {
                vec![5, 10, 30]
            } else {
                ma_periods
            };
            let output = CalcOutput {
                ma_lines: moving_averages(&closes, &ma_periods)?,
                macd: macd(&closes, MacdParams::new(fast, slow, signal))?,
            };
            print_json(&output)
        }
        Command::Chart {
            symbol,
            interval,
            limit,
        } => {
            let cfg = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;
            let query = KlineQuery::new(
                symbol.as_deref().unwrap_or(&cfg.market.symbol),
                interval.as_deref().unwrap_or(&cfg.market.interval),
                limit.unwrap_or(cfg.market.limit),
            )?;

            info!(symbol = %query.symbol, interval = %query.interval, "refreshing chart");
            let client = BinanceClient::new(&cfg.market)?;
            let service = IndicatorService::new(client, cfg.indicators.clone());
            let series = service
                .refresh(&query)
                .await
                .with_context(|| format!("Failed to build chart for {}", query.symbol))?;
            print_json(&series)
        }
        Command::Ticker { symbol } => {
            let cfg = AppConfig::load(cli.config.as_deref()).context("Failed to load config")?;
            let symbol = symbol.unwrap_or_else(|| cfg.market.symbol.clone());
            let client = BinanceClient::new(&cfg.market)?;
            let ticker = client
                .ticker_24h(&symbol)
                .await
                .with_context(|| format!("Failed to fetch ticker for {}", symbol))?;
            print_json(&ticker)
        }
    }
}
