use log::debug;
use proteus_core::{AssetId, SampleWindow, Timeframe, Timestamp};

use crate::classify;
use crate::config::DetectorConfig;
use crate::error::{DetectError, DetectResult};
use crate::features::WindowFeatures;
use crate::model::{DetectedPattern, PatternKind};

/// Classifiers always run in this order, so scans over equal windows
/// yield patterns in the same sequence
const CLASSIFIER_ORDER: [PatternKind; 5] = [
    PatternKind::Trend,
    PatternKind::Reversal,
    PatternKind::Breakout,
    PatternKind::Consolidation,
    PatternKind::Volatility,
];

/// Stateless pattern detector over sample windows
pub struct PatternDetector {
    config: DetectorConfig,
}

impl PatternDetector {
    pub fn new(config: DetectorConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    /// Scan a window lazily. Classifiers only run as the scan is consumed.
    pub fn detect<'a>(&'a self, window: &SampleWindow) -> DetectResult<PatternScan<'a>> {
        if window.len() < self.config.min_window_len {
            return Err(DetectError::InsufficientData {
                required: self.config.min_window_len,
                actual: window.len(),
            });
        }
        let Some(detected_at) = window.last_timestamp() else {
            return Err(DetectError::InsufficientData {
                required: self.config.min_window_len.max(1),
                actual: 0,
            });
        };
        Ok(PatternScan {
            config: &self.config,
            features: WindowFeatures::compute(window),
            asset: window.asset().to_string(),
            timeframe: window.timeframe(),
            detected_at,
            next: 0,
        })
    }

    /// Run the full scan eagerly
    pub fn detect_all(&self, window: &SampleWindow) -> DetectResult<Vec<DetectedPattern>> {
        Ok(self.detect(window)?.collect())
    }
}

impl Default for PatternDetector {
    fn default() -> Self {
        Self::new(DetectorConfig::default())
    }
}

/// Lazy scan over one window's classifier candidates, filtered by the
/// configured minimum confidence
pub struct PatternScan<'a> {
    config: &'a DetectorConfig,
    features: WindowFeatures,
    asset: AssetId,
    timeframe: Timeframe,
    detected_at: Timestamp,
    next: usize,
}

impl Iterator for PatternScan<'_> {
    type Item = DetectedPattern;

    fn next(&mut self) -> Option<DetectedPattern> {
        while self.next < CLASSIFIER_ORDER.len() {
            let kind = CLASSIFIER_ORDER[self.next];
            self.next += 1;

            let candidate = classify::run(
                kind,
                self.config,
                &self.features,
                &self.asset,
                self.timeframe,
                self.detected_at,
            );
            if let Some(pattern) = candidate
                && pattern.confidence >= self.config.min_confidence
            {
                debug!(
                    "[PATTERNS] {} {} {}: strength {:.2} confidence {:.2}",
                    pattern.asset, pattern.timeframe, pattern.kind, pattern.strength,
                    pattern.confidence
                );
                return Some(pattern);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::OutcomeDirection;
    use chrono::{TimeZone, Utc};
    use proteus_core::MarketSample;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn window_with_volumes(prices: &[f64], volumes: &[f64]) -> SampleWindow {
        let samples = prices
            .iter()
            .zip(volumes)
            .enumerate()
            .map(|(i, (p, v))| {
                MarketSample::new(
                    Decimal::from_f64_retain(*p).unwrap(),
                    Decimal::from_f64_retain(*v).unwrap(),
                    Utc.with_ymd_and_hms(2024, 1, 1, 0, i as u32, 0).unwrap(),
                )
            })
            .collect();
        SampleWindow::from_samples("BTC/USD", Timeframe::M1, samples)
    }

    fn window(prices: &[f64]) -> SampleWindow {
        window_with_volumes(prices, &vec![10.0; prices.len()])
    }

    fn kinds(patterns: &[DetectedPattern]) -> Vec<PatternKind> {
        patterns.iter().map(|p| p.kind).collect()
    }

    #[test]
    fn test_short_window_is_insufficient() {
        let detector = PatternDetector::default();
        let result = detector.detect(&window(&[100.0, 101.0, 102.0]));
        assert_eq!(
            result.err(),
            Some(DetectError::InsufficientData {
                required: 10,
                actual: 3
            })
        );
    }

    #[test]
    fn test_rising_series_yields_trend() {
        let detector = PatternDetector::default();
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let patterns = detector.detect_all(&window(&prices)).unwrap();

        let trend = patterns
            .iter()
            .find(|p| p.kind == PatternKind::Trend)
            .expect("rising series must classify as a trend");
        assert!(trend.confidence >= 0.6);
        assert_eq!(trend.expected_outcome.direction, OutcomeDirection::Up);
        assert!(trend.strength > 0.5);
        assert_eq!(
            trend.detected_at,
            Utc.with_ymd_and_hms(2024, 1, 1, 0, 9, 0).unwrap()
        );
    }

    #[test]
    fn test_detection_is_deterministic() {
        let detector = PatternDetector::default();
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let w = window(&prices);

        let first = detector.detect_all(&w).unwrap();
        let second = detector.detect_all(&w).unwrap();

        assert!(!first.is_empty());
        assert_eq!(first, second);
        // byte-identical, ids included
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_reversal_detected_after_peak() {
        let detector = PatternDetector::default();
        let prices = [
            100.0, 102.0, 104.0, 106.0, 108.0, 106.0, 104.0, 102.0, 100.0, 98.0,
        ];
        let patterns = detector.detect_all(&window(&prices)).unwrap();

        assert_eq!(kinds(&patterns), vec![PatternKind::Reversal]);
        let reversal = &patterns[0];
        assert!(reversal.confidence >= 0.6);
        assert_eq!(reversal.expected_outcome.direction, OutcomeDirection::Down);
        assert!(reversal.characteristics["first_leg_slope"] > 0.0);
        assert!(reversal.characteristics["second_leg_slope"] < 0.0);
    }

    #[test]
    fn test_breakout_requires_volume_support() {
        let detector = PatternDetector::default();
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();

        // flat volume: the push above the prior extreme is not backed
        let flat = detector.detect_all(&window(&prices)).unwrap();
        assert!(!flat.iter().any(|p| p.kind == PatternKind::Breakout));

        let volumes = [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 30.0, 30.0, 30.0];
        let backed = detector
            .detect_all(&window_with_volumes(&prices, &volumes))
            .unwrap();
        assert_eq!(
            kinds(&backed),
            vec![PatternKind::Trend, PatternKind::Breakout]
        );
        let breakout = &backed[1];
        assert_eq!(breakout.expected_outcome.direction, OutcomeDirection::Up);
        assert!(breakout.characteristics["volume_ratio"] > 1.2);
    }

    #[test]
    fn test_consolidation_detected_in_tight_range() {
        let detector = PatternDetector::default();
        let prices = [
            100.0, 100.1, 99.9, 100.05, 99.95, 100.1, 99.9, 100.0, 100.05, 99.95,
        ];
        let patterns = detector.detect_all(&window(&prices)).unwrap();

        assert_eq!(kinds(&patterns), vec![PatternKind::Consolidation]);
        assert_eq!(
            patterns[0].expected_outcome.direction,
            OutcomeDirection::Sideways
        );
        assert!(patterns[0].confidence >= 0.6);
    }

    #[test]
    fn test_volatility_expansion_detected() {
        let detector = PatternDetector::default();
        let prices = [
            100.0, 100.05, 99.95, 100.05, 100.0, 100.1, 102.0, 98.0, 103.0, 97.0,
        ];
        let patterns = detector.detect_all(&window(&prices)).unwrap();

        let expansion = patterns
            .iter()
            .find(|p| p.kind == PatternKind::Volatility)
            .expect("late swings must classify as a volatility expansion");
        assert!(expansion.confidence >= 0.6);
        assert!(expansion.characteristics["expansion_ratio"] > 1.5);
        assert_eq!(
            expansion.expected_outcome.direction,
            OutcomeDirection::Sideways
        );
    }

    #[test]
    fn test_min_confidence_suppresses_patterns() {
        let config = DetectorConfig {
            min_confidence: 0.99,
            ..DetectorConfig::default()
        };
        let detector = PatternDetector::new(config);
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();

        let patterns = detector.detect_all(&window(&prices)).unwrap();
        assert!(patterns.is_empty());
    }

    #[test]
    fn test_scan_is_lazy() {
        let detector = PatternDetector::default();
        let prices: Vec<f64> = (0..10).map(|i| 100.0 + i as f64).collect();
        let volumes = [10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 10.0, 30.0, 30.0, 30.0];
        let w = window_with_volumes(&prices, &volumes);

        // both trend and breakout qualify; taking one stops the scan early
        let first = detector.detect(&w).unwrap().next().unwrap();
        assert_eq!(first.kind, PatternKind::Trend);
    }
}
