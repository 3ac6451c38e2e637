// src/indicators.rs
//! Moving average, EMA and MACD calculators used to build the chart overlays.
//! All functions are pure: same input, same output, no state kept between calls.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{AppError, Result};

fn check_period(name: &'static str, period: usize) -> Result<()> {
    if period == 0 {
        return Err(AppError::InvalidParameter {
            name,
            value: period,
        });
    }
    Ok(())
}

/// Simple moving average over a closing-price series.
///
/// The output has the same length as `data`. Index `i` is `None` while fewer
/// than `period` values are available (`i < period - 1`), otherwise the mean
/// of `data[i + 1 - period..=i]`.
pub fn moving_average(data: &[f64], period: usize) -> Result<Vec<Option<f64>>> {
    check_period("period", period)?;

    let out = (0..data.len())
        .map(|i| {
            if i + 1 < period {
                None
            } else {
                let sum: f64 = data[i + 1 - period..=i].iter().sum();
                Some(sum / period as f64)
            }
        })
        .collect();
    Ok(out)
}

/// One MA overlay line for the chart.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MaLine {
    pub period: usize,
    pub values: Vec<Option<f64>>,
}

/// Compute one MA line per period. Every period is checked before any work.
pub fn moving_averages(data: &[f64], periods: &[usize]) -> Result<Vec<MaLine>> {
    for &p in periods {
        check_period("ma_period", p)?;
    }

    periods
        .iter()
        .map(|&period| {
            Ok(MaLine {
                period,
                values: moving_average(data, period)?,
            })
        })
        .collect()
}

/// Single step of the EMA recurrence, seeded with the first value it sees.
#[derive(Debug)]
struct EmaState {
    mult: f64,
    current: Option<f64>,
}

impl EmaState {
    fn new(period: usize) -> Self {
        EmaState {
            mult: 2.0 / (period as f64 + 1.0),
            current: None,
        }
    }

    fn next(&mut self, value: f64) -> f64 {
        // k == 1 reduces the recurrence to the input itself
        let v = match self.current {
            Some(prev) if self.mult != 1.0 => (value - prev) * self.mult + prev,
            _ => value,
        };
        self.current = Some(v);
        v
    }
}

/// Exponential moving average with `k = 2 / (period + 1)`.
///
/// `out[0] == data[0]`; the first value is the seed, not an SMA of the first
/// `period` values. Empty input gives empty output.
pub fn ema(data: &[f64], period: usize) -> Result<Vec<f64>> {
    check_period("period", period)?;
    let mut state = EmaState::new(period);
    Ok(data.iter().map(|&v| state.next(v)).collect())
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MacdParams {
    pub fast: usize,
    pub slow: usize,
    pub signal: usize,
}

impl Default for MacdParams {
    fn default() -> Self {
        MacdParams {
            fast: 12,
            slow: 26,
            signal: 9,
        }
    }
}

impl MacdParams {
    pub fn new(fast: usize, slow: usize, signal: usize) -> Self {
        MacdParams { fast, slow, signal }
    }

    pub fn validate(&self) -> Result<()> {
        check_period("fast", self.fast)?;
        check_period("slow", self.slow)?;
        check_period("signal", self.signal)
    }
}

/// DIF, DEA and histogram series, all the same length as the input.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct MacdSeries {
    pub dif: Vec<f64>,
    pub dea: Vec<f64>,
    pub macd: Vec<f64>,
}

impl MacdSeries {
    pub fn len(&self) -> usize {
        self.dif.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dif.is_empty()
    }
}

/// MACD over a closing-price series.
///
/// `dif = ema(fast) - ema(slow)`, `dea = ema(dif, signal)`,
/// `macd = 2 * (dif - dea)`. Index 0 is always zero for all three because
/// both EMAs are seeded with `data[0]`. `fast >= slow` is accepted.
pub fn macd(data: &[f64], params: MacdParams) -> Result<MacdSeries> {
    params.validate()?;

    let ema_fast = ema(data, params.fast)?;
    let ema_slow = ema(data, params.slow)?;

    let dif: Vec<f64> = ema_fast
        .iter()
        .zip(&ema_slow)
        .map(|(f, s)| f - s)
        .collect();
    let dea = ema(&dif, params.signal)?;
    let macd = dif
        .iter()
        .zip(&dea)
        .map(|(d, e)| (d - e) * 2.0)
        .collect();

    debug!(
        points = data.len(),
        fast = params.fast,
        slow = params.slow,
        signal = params.signal,
        "computed macd"
    );

    Ok(MacdSeries { dif, dea, macd })
}
