// src/chart.rs
use serde::Serialize;
use tracing::{debug, instrument};

use crate::config::IndicatorSettings;
use crate::error::{AppError, Result};
use crate::indicators::{MaLine, MacdSeries, macd, moving_averages};
use crate::market_data::{Candle, KlineQuery, KlineSource, closes};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MacdPoint {
    pub ts: i64,
    pub price: f64,
    pub dif: f64,
    pub dea: f64,
    pub macd: f64,
}

/// Sign of a histogram bar, for colouring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Tone {
    Positive,
    Negative,
    Zero,
}

impl Tone {
    pub fn of(value: f64) -> Self {
        if value > 0.0 {
            Tone::Positive
        } else if value < 0.0 {
            Tone::Negative
        } else {
            Tone::Zero
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct HistogramBar {
    pub ts: i64,
    pub value: f64,
    pub tone: Tone,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CrossKind {
    Bullish,
    Bearish,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Crossover {
    pub index: usize,
    pub ts: i64,
    pub price: f64,
    pub kind: CrossKind,
}

/// Everything the chart needs for one refresh. Rebuilt from scratch each time.
#[derive(Debug, Clone, Serialize)]
pub struct ChartSeries {
    pub candles: Vec<Candle>,
    pub ma_lines: Vec<MaLine>,
    pub macd_points: Vec<MacdPoint>,
    pub histogram: Vec<HistogramBar>,
    pub crossovers: Vec<Crossover>,
    pub bullish_signals: usize,
    pub bearish_signals: usize,
}

impl ChartSeries {
    #[instrument(skip(candles), fields(candles = candles.len()))]
    pub fn build(candles: Vec<Candle>, settings: &IndicatorSettings) -> Result<Self> {
        settings.validate()?;

        let prices = closes(&candles);
        let ma_lines = moving_averages(&prices, &settings.ma_periods)?;
        let series = macd(&prices, settings.macd_params())?;

        let macd_points = zip_points(&candles, &series);
        let histogram = macd_points
            .iter()
            .map(|p| HistogramBar {
                ts: p.ts,
                value: p.macd,
                tone: Tone::of(p.macd),
            })
            .collect();
        let crossovers = find_crossovers(&macd_points);
        let bullish_signals = crossovers
            .iter()
            .filter(|c| c.kind == CrossKind::Bullish)
            .count();
        let bearish_signals = crossovers.len() - bullish_signals;

        debug!(bullish_signals, bearish_signals, "chart series built");

        Ok(ChartSeries {
            candles,
            ma_lines,
            macd_points,
            histogram,
            crossovers,
            bullish_signals,
            bearish_signals,
        })
    }
}

fn zip_points(candles: &[Candle], series: &MacdSeries) -> Vec<MacdPoint> {
    candles
        .iter()
        .enumerate()
        .map(|(i, c)| MacdPoint {
            ts: c.open_time,
            price: c.close,
            dif: series.dif[i],
            dea: series.dea[i],
            macd: series.macd[i],
        })
        .collect()
}

/// Histogram sign changes: `<= 0` to `> 0` is bullish, `>= 0` to `< 0` bearish.
pub fn find_crossovers(points: &[MacdPoint]) -> Vec<Crossover> {
    points
        .windows(2)
        .enumerate()
        .filter_map(|(i, w)| {
            let (prev, current) = (&w[0], &w[1]);
            let kind = if prev.macd <= 0.0 && current.macd > 0.0 {
                CrossKind::Bullish
            } else if prev.macd >= 0.0 && current.macd < 0.0 {
                CrossKind::Bearish
            } else {
                return None;
            };
            Some(Crossover {
                index: i + 1,
                ts: current.ts,
                price: current.price,
                kind,
            })
        })
        .collect()
}

/// Fetch-then-compute step of a chart refresh.
pub struct IndicatorService<S> {
    source: S,
    settings: IndicatorSettings,
}

impl<S: KlineSource> IndicatorService<S> {
    pub fn new(source: S, settings: IndicatorSettings) -> Self {
        Self { source, settings }
    }

    #[instrument(skip(self))]
    pub async fn refresh(&self, query: &KlineQuery) -> Result<ChartSeries> {
        let candles = self.source.klines(query).await?;
        if candles.is_empty() {
            return Err(AppError::DataNotFound(format!(
                "no klines for {} {}",
                query.symbol, query.interval
            )));
        }
        ChartSeries::build(candles, &self.settings)
    }

    pub fn settings(&self) -> &IndicatorSettings {
        &self.settings
    }
}
