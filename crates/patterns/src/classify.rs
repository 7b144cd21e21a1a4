use std::collections::BTreeMap;

use proteus_core::{Timeframe, Timestamp};

use crate::config::DetectorConfig;
use crate::features::WindowFeatures;
use crate::model::{
    Comparator, DetectedPattern, ExpectedOutcome, OutcomeDirection, PatternKind, TriggerCondition,
};

pub(crate) fn run(
    kind: PatternKind,
    config: &DetectorConfig,
    features: &WindowFeatures,
    asset: &str,
    timeframe: Timeframe,
    detected_at: Timestamp,
) -> Option<DetectedPattern> {
    let ctx = Ctx {
        config,
        features,
        asset,
        timeframe,
        detected_at,
    };
    match kind {
        PatternKind::Trend => trend(&ctx),
        PatternKind::Reversal => reversal(&ctx),
        PatternKind::Breakout => breakout(&ctx),
        PatternKind::Consolidation => consolidation(&ctx),
        PatternKind::Volatility => volatility(&ctx),
    }
}

struct Ctx<'a> {
    config: &'a DetectorConfig,
    features: &'a WindowFeatures,
    asset: &'a str,
    timeframe: Timeframe,
    detected_at: Timestamp,
}

impl Ctx<'_> {
    fn saturation(&self) -> f64 {
        let n = self.features.len as f64;
        n / (n + self.config.saturation_half_len.max(1.0))
    }

    fn build(
        &self,
        kind: PatternKind,
        strength: f64,
        confidence: f64,
        characteristics: BTreeMap<String, f64>,
        trigger_conditions: Vec<TriggerCondition>,
        expected_outcome: ExpectedOutcome,
    ) -> DetectedPattern {
        DetectedPattern {
            id: DetectedPattern::deterministic_id(self.asset, self.timeframe, kind, self.detected_at),
            kind,
            asset: self.asset.to_string(),
            timeframe: self.timeframe,
            strength: strength.clamp(0.0, 1.0),
            confidence: confidence.clamp(0.0, 1.0),
            duration_secs: self.features.span_secs,
            characteristics,
            trigger_conditions,
            expected_outcome,
            detected_at: self.detected_at,
        }
    }
}

/// Weighted blend of the three confidence terms
fn blend(sample_term: f64, signal: f64, agreement: f64) -> f64 {
    (0.3 * sample_term + 0.4 * signal + 0.3 * agreement).clamp(0.0, 1.0)
}

fn risk_reward(magnitude: f64, adverse: f64) -> f64 {
    (magnitude / adverse.max(1e-4)).clamp(0.1, 10.0)
}

fn trend(ctx: &Ctx<'_>) -> Option<DetectedPattern> {
    let f = ctx.features;
    let cfg = ctx.config;
    if f.slope.abs() < cfg.trend_min_slope {
        return None;
    }
    let rising = f.slope > 0.0;
    let agreeing = f
        .sub_slopes
        .iter()
        .filter(|s| if rising { **s > 0.0 } else { **s < 0.0 })
        .count();
    if agreeing < 2 {
        return None;
    }
    let agreement = agreeing as f64 / 3.0;
    let signal = f.snr / (f.snr + 1.0);
    let strength = (f.net_return.abs() / cfg.trend_full_strength_return).min(1.0);
    let confidence = blend(ctx.saturation(), signal, agreement);

    let mut characteristics = BTreeMap::new();
    characteristics.insert("slope".to_string(), f.slope);
    characteristics.insert("net_return".to_string(), f.net_return);
    characteristics.insert("volatility".to_string(), f.volatility);
    characteristics.insert("snr".to_string(), f.snr);
    characteristics.insert("agreement".to_string(), agreement);

    let trigger = if rising {
        TriggerCondition::new("slope", Comparator::GreaterOrEqual, cfg.trend_min_slope)
    } else {
        TriggerCondition::new("slope", Comparator::LessOrEqual, -cfg.trend_min_slope)
    };

    let magnitude = f.net_return.abs() * 0.5;
    let adverse = f.volatility * (f.len as f64).sqrt();
    let outcome = ExpectedOutcome {
        direction: if rising {
            OutcomeDirection::Up
        } else {
            OutcomeDirection::Down
        },
        magnitude,
        probability: confidence,
        risk_reward: risk_reward(magnitude, adverse),
    };

    Some(ctx.build(
        PatternKind::Trend,
        strength,
        confidence,
        characteristics,
        vec![trigger],
        outcome,
    ))
}

fn reversal(ctx: &Ctx<'_>) -> Option<DetectedPattern> {
    let f = ctx.features;
    let cfg = ctx.config;
    let [first_leg, second_leg] = f.half_slopes;
    if first_leg.abs() < cfg.reversal_min_leg_slope
        || second_leg.abs() < cfg.reversal_min_leg_slope
        || first_leg * second_leg >= 0.0
    {
        return None;
    }
    let toward_up = second_leg > 0.0;

    // A genuine reversal pivots around a swing extreme in the middle third
    let mid = (f.len / 3)..=(2 * f.len / 3);
    let pivot_present = if toward_up {
        f.swing_lows.iter().any(|i| mid.contains(i))
    } else {
        f.swing_highs.iter().any(|i| mid.contains(i))
    };
    let agreement = if pivot_present { 1.0 } else { 0.5 };

    let leg = first_leg.abs().min(second_leg.abs());
    let signal = (leg / (3.0 * cfg.reversal_min_leg_slope)).min(1.0);
    let strength = ((first_leg.abs() + second_leg.abs()) / (6.0 * cfg.reversal_min_leg_slope))
        .min(1.0);
    let confidence = blend(ctx.saturation(), signal, agreement);

    let mut characteristics = BTreeMap::new();
    characteristics.insert("first_leg_slope".to_string(), first_leg);
    characteristics.insert("second_leg_slope".to_string(), second_leg);
    characteristics.insert("net_return".to_string(), f.net_return);
    characteristics.insert("pivot".to_string(), if pivot_present { 1.0 } else { 0.0 });

    let min_leg = cfg.reversal_min_leg_slope;
    let triggers = if toward_up {
        vec![
            TriggerCondition::new("first_leg_slope", Comparator::LessOrEqual, -min_leg),
            TriggerCondition::new("second_leg_slope", Comparator::GreaterOrEqual, min_leg),
        ]
    } else {
        vec![
            TriggerCondition::new("first_leg_slope", Comparator::GreaterOrEqual, min_leg),
            TriggerCondition::new("second_leg_slope", Comparator::LessOrEqual, -min_leg),
        ]
    };

    let magnitude = second_leg.abs() * (f.len as f64 / 2.0);
    let adverse = f.volatility * (f.len as f64).sqrt();
    let outcome = ExpectedOutcome {
        direction: if toward_up {
            OutcomeDirection::Up
        } else {
            OutcomeDirection::Down
        },
        magnitude,
        probability: confidence,
        risk_reward: risk_reward(magnitude, adverse),
    };

    Some(ctx.build(
        PatternKind::Reversal,
        strength,
        confidence,
        characteristics,
        triggers,
        outcome,
    ))
}

fn breakout(ctx: &Ctx<'_>) -> Option<DetectedPattern> {
    let f = ctx.features;
    let cfg = ctx.config;
    if f.len < 2 {
        return None;
    }
    let tail = cfg.breakout_reference_tail.clamp(1, f.len - 1);
    let reference = &f.prices[..f.len - tail];
    let prior_max = reference.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    let prior_min = reference.iter().cloned().fold(f64::INFINITY, f64::min);

    let up_level = prior_max * (1.0 + cfg.breakout_min_margin);
    let down_level = prior_min * (1.0 - cfg.breakout_min_margin);
    let (upward, reference_extreme, excess, level) =
        if prior_max > 0.0 && f.last_price > up_level {
            (true, prior_max, f.last_price / prior_max - 1.0, up_level)
        } else if prior_min > 0.0 && f.last_price < down_level {
            (false, prior_min, 1.0 - f.last_price / prior_min, down_level)
        } else {
            return None;
        };
    if f.volume_ratio < cfg.breakout_volume_ratio {
        return None;
    }

    let strength = (excess / (3.0 * cfg.breakout_min_margin)).min(1.0);
    let volume_score = (f.volume_ratio / (2.0 * cfg.breakout_volume_ratio)).min(1.0);
    let confidence = blend(ctx.saturation(), strength, volume_score);

    let mut characteristics = BTreeMap::new();
    characteristics.insert("breakout_margin".to_string(), excess);
    characteristics.insert("reference_extreme".to_string(), reference_extreme);
    characteristics.insert("volume_ratio".to_string(), f.volume_ratio);

    let price_comparator = if upward {
        Comparator::GreaterThan
    } else {
        Comparator::LessThan
    };
    let triggers = vec![
        TriggerCondition::new("price", price_comparator, level),
        TriggerCondition::new(
            "volume_ratio",
            Comparator::GreaterOrEqual,
            cfg.breakout_volume_ratio,
        ),
    ];

    let magnitude = excess * 2.0;
    let outcome = ExpectedOutcome {
        direction: if upward {
            OutcomeDirection::Up
        } else {
            OutcomeDirection::Down
        },
        magnitude,
        probability: confidence,
        risk_reward: risk_reward(magnitude, f.range_fraction / 2.0),
    };

    Some(ctx.build(
        PatternKind::Breakout,
        strength,
        confidence,
        characteristics,
        triggers,
        outcome,
    ))
}

fn consolidation(ctx: &Ctx<'_>) -> Option<DetectedPattern> {
    let f = ctx.features;
    let cfg = ctx.config;
    if f.range_fraction > cfg.consolidation_max_range
        || f.slope.abs() > cfg.consolidation_max_slope
    {
        return None;
    }
    let tightness = if cfg.consolidation_max_range > 0.0 {
        (1.0 - f.range_fraction / cfg.consolidation_max_range).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let quiet = f
        .sub_vols
        .iter()
        .filter(|v| **v <= f.volatility * 1.5 + f64::EPSILON)
        .count();
    let agreement = quiet as f64 / 3.0;
    let confidence = blend(ctx.saturation(), tightness, agreement);

    let mut characteristics = BTreeMap::new();
    characteristics.insert("range_fraction".to_string(), f.range_fraction);
    characteristics.insert("slope".to_string(), f.slope);
    characteristics.insert("volatility".to_string(), f.volatility);

    let triggers = vec![
        TriggerCondition::new(
            "range_fraction",
            Comparator::LessOrEqual,
            cfg.consolidation_max_range,
        ),
        TriggerCondition::new("slope", Comparator::LessOrEqual, cfg.consolidation_max_slope),
        TriggerCondition::new(
            "slope",
            Comparator::GreaterOrEqual,
            -cfg.consolidation_max_slope,
        ),
    ];

    let magnitude = f.range_fraction / 2.0;
    let outcome = ExpectedOutcome {
        direction: OutcomeDirection::Sideways,
        magnitude,
        probability: confidence,
        risk_reward: risk_reward(magnitude, f.range_fraction / 2.0),
    };

    Some(ctx.build(
        PatternKind::Consolidation,
        tightness,
        confidence,
        characteristics,
        triggers,
        outcome,
    ))
}

fn volatility(ctx: &Ctx<'_>) -> Option<DetectedPattern> {
    let f = ctx.features;
    let cfg = ctx.config;
    let baseline = f.baseline_volatility();
    let recent = f.sub_vols[2];
    if recent <= 0.0 {
        return None;
    }
    let ratio = if baseline > f64::EPSILON {
        recent / baseline
    } else {
        // expansion from a silent baseline is maximal
        cfg.volatility_expansion_ratio * 4.0
    };
    if ratio < cfg.volatility_expansion_ratio {
        return None;
    }

    let denom = (cfg.volatility_expansion_ratio - 1.0).max(f64::EPSILON);
    let strength = ((ratio - 1.0) / (2.0 * denom)).clamp(0.0, 1.0);
    let ordered = f.sub_vols[2] > f.sub_vols[1] && f.sub_vols[1] > f.sub_vols[0];
    let agreement = if ordered { 1.0 } else { 0.6 };
    let confidence = blend(ctx.saturation(), strength, agreement);

    let mut characteristics = BTreeMap::new();
    characteristics.insert("expansion_ratio".to_string(), ratio);
    characteristics.insert("recent_volatility".to_string(), recent);
    characteristics.insert("baseline_volatility".to_string(), baseline);

    let triggers = vec![TriggerCondition::new(
        "volatility_ratio",
        Comparator::GreaterOrEqual,
        cfg.volatility_expansion_ratio,
    )];

    let magnitude = recent * (f.len as f64 / 3.0).sqrt();
    let outcome = ExpectedOutcome {
        direction: OutcomeDirection::Sideways,
        magnitude,
        probability: confidence,
        // expansion cuts both ways; the adverse estimate doubles
        risk_reward: risk_reward(magnitude, magnitude * 2.0),
    };

    Some(ctx.build(
        PatternKind::Volatility,
        strength,
        confidence,
        characteristics,
        triggers,
        outcome,
    ))
}
