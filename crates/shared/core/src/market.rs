use std::collections::VecDeque;

use chrono::Duration;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};

use crate::values::{AssetId, Price, Quantity, Timestamp};

/// Sampling granularity of a market data series
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Timeframe {
    /// One minute
    M1,
    /// Five minutes
    M5,
    /// Fifteen minutes
    M15,
    /// One hour
    H1,
    /// Four hours
    H4,
    /// One day
    D1,
}

impl Timeframe {
    /// Duration of one sample interval
    pub fn interval(&self) -> Duration {
        match self {
            Timeframe::M1 => Duration::minutes(1),
            Timeframe::M5 => Duration::minutes(5),
            Timeframe::M15 => Duration::minutes(15),
            Timeframe::H1 => Duration::hours(1),
            Timeframe::H4 => Duration::hours(4),
            Timeframe::D1 => Duration::days(1),
        }
    }

    /// Canonical short name ("1m", "4h", ...)
    pub fn as_str(&self) -> &'static str {
        match self {
            Timeframe::M1 => "1m",
            Timeframe::M5 => "5m",
            Timeframe::M15 => "15m",
            Timeframe::H1 => "1h",
            Timeframe::H4 => "4h",
            Timeframe::D1 => "1d",
        }
    }
}

impl std::fmt::Display for Timeframe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A single observed price/volume point
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MarketSample {
    pub price: Price,
    pub volume: Quantity,
    pub timestamp: Timestamp,
}

impl MarketSample {
    pub fn new(price: Price, volume: Quantity, timestamp: Timestamp) -> Self {
        Self {
            price,
            volume,
            timestamp,
        }
    }
}

/// A market data event as delivered by a feed
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MarketEvent {
    pub asset: AssetId,
    pub timeframe: Timeframe,
    pub sample: MarketSample,
}

/// Bounded, time-ordered window of samples for one asset/timeframe.
///
/// Samples are appended in feed order; a sample whose timestamp is not
/// strictly newer than the last retained one is rejected, which makes the
/// window safe under at-least-once delivery. When the window exceeds its
/// capacity the oldest sample is evicted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SampleWindow {
    asset: AssetId,
    timeframe: Timeframe,
    capacity: usize,
    samples: VecDeque<MarketSample>,
}

impl SampleWindow {
    /// Create an empty window holding at most `capacity` samples
    pub fn new(asset: impl Into<AssetId>, timeframe: Timeframe, capacity: usize) -> Self {
        Self {
            asset: asset.into(),
            timeframe,
            capacity,
            samples: VecDeque::with_capacity(capacity.min(1024)),
        }
    }

    /// Build a window from an already-ordered series (capacity = series length)
    pub fn from_samples(
        asset: impl Into<AssetId>,
        timeframe: Timeframe,
        samples: Vec<MarketSample>,
    ) -> Self {
        let capacity = samples.len().max(1);
        Self {
            asset: asset.into(),
            timeframe,
            capacity,
            samples: samples.into(),
        }
    }

    /// Append a sample. Returns false for duplicates or stale timestamps.
    pub fn push(&mut self, sample: MarketSample) -> bool {
        if let Some(last) = self.samples.back() {
            if sample.timestamp <= last.timestamp {
                return false;
            }
        }
        self.samples.push_back(sample);
        while self.samples.len() > self.capacity {
            self.samples.pop_front();
        }
        true
    }

    pub fn asset(&self) -> &str {
        &self.asset
    }

    pub fn timeframe(&self) -> Timeframe {
        self.timeframe
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn first(&self) -> Option<&MarketSample> {
        self.samples.front()
    }

    pub fn last(&self) -> Option<&MarketSample> {
        self.samples.back()
    }

    /// Timestamp of the most recent sample
    pub fn last_timestamp(&self) -> Option<Timestamp> {
        self.samples.back().map(|s| s.timestamp)
    }

    /// Time covered from first to last sample (zero when fewer than 2 samples)
    pub fn span(&self) -> Duration {
        match (self.samples.front(), self.samples.back()) {
            (Some(first), Some(last)) => last.timestamp - first.timestamp,
            _ => Duration::zero(),
        }
    }

    pub fn iter(&self) -> impl Iterator<Item = &MarketSample> {
        self.samples.iter()
    }

    /// Price series as f64, in time order (for statistical routines)
    pub fn prices(&self) -> Vec<f64> {
        self.samples
            .iter()
            .map(|s| s.price.to_f64().unwrap_or(0.0))
            .collect()
    }

    /// Volume series as f64, in time order
    pub fn volumes(&self) -> Vec<f64> {
        self.samples
            .iter()
            .map(|s| s.volume.to_f64().unwrap_or(0.0))
            .collect()
    }
}
