//! Moving-average relative-change detection
//!
//! Classic fast/slow crossover: a short-window moving average tracks recent
//! behavior, a long-window one the baseline, and the relative gap between
//! them flags sustained shifts in the underlying value. The relative (not
//! absolute) change makes one threshold comparable across entities with
//! very different magnitudes, e.g. a 2ms endpoint next to a 2s endpoint.
//!
//! Classification is edge-triggered on threshold crossings: a sustained
//! step produces exactly one `Regressed` signal when the relative change
//! first reaches the threshold, not one per payload for as long as the gap
//! persists.

use serde::Serialize;

use crate::ema::ExponentialMovingAverage;
use crate::payload::DetectorPayload;

use super::config::DetectorConfig;
use super::state::DetectorState;

/// Trend classification emitted per update
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TrendType {
    Regressed,
    Improved,
    Unchanged,
}

impl std::fmt::Display for TrendType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Regressed => f.write_str("regressed"),
            Self::Improved => f.write_str("improved"),
            Self::Unchanged => f.write_str("unchanged"),
        }
    }
}

/// Stateful per-entity trend detector
///
/// Owns one [`DetectorState`] and two moving averages built from the
/// configured factories. Processed synchronously and sequentially through
/// one entity's payload stream; entities are independent of each other.
pub struct MovingAverageRelativeChangeDetector {
    kind: String,
    source: String,
    config: DetectorConfig,
    state: DetectorState,
    moving_avg_short: ExponentialMovingAverage,
    moving_avg_long: ExponentialMovingAverage,
}

impl MovingAverageRelativeChangeDetector {
    /// Fresh detector for a never-seen entity
    ///
    /// `kind` and `source` label emitted diagnostics only; they carry no
    /// algorithmic meaning.
    pub fn new(
        kind: impl Into<String>,
        source: impl Into<String>,
        config: DetectorConfig,
    ) -> Self {
        Self::from_state(kind, source, config, DetectorState::empty())
    }

    /// Detector resuming from persisted state
    ///
    /// Both moving averages are primed with the persisted values so a
    /// restart continues the same trajectory instead of restarting cold.
    pub fn from_state(
        kind: impl Into<String>,
        source: impl Into<String>,
        config: DetectorConfig,
        state: DetectorState,
    ) -> Self {
        let mut moving_avg_short = (config.short_moving_avg_factory)();
        let mut moving_avg_long = (config.long_moving_avg_factory)();
        if state.count > 0 {
            moving_avg_short.restore(state.moving_avg_short);
            moving_avg_long.restore(state.moving_avg_long);
        }
        Self {
            kind: kind.into(),
            source: source.into(),
            config,
            state,
            moving_avg_short,
            moving_avg_long,
        }
    }

    /// Fold one payload into the detector and classify the trend
    ///
    /// Returns the classification and a non-negative score, the magnitude
    /// of the relative change after the update. The score is returned on
    /// every call so callers can rank entities even when unchanged.
    ///
    /// While fewer than `min_data_points` payloads had been folded in
    /// before this one, the detector is warming up and always reports
    /// [`TrendType::Unchanged`]. The transition out of warm-up is
    /// one-directional.
    ///
    /// # Panics
    /// Payloads must arrive in non-decreasing timestamp order. Out-of-order
    /// input is a programming error, not a recoverable condition: there is
    /// no well-defined way to undo a moving-average update.
    pub fn update(&mut self, payload: &DetectorPayload) -> (TrendType, f64) {
        if let Some(last_seen) = self.state.timestamp {
            assert!(
                payload.timestamp >= last_seen,
                "payloads must be fed in non-decreasing timestamp order \
                 (last seen {}, got {} for {}/{})",
                last_seen,
                payload.timestamp,
                self.kind,
                self.source,
            );
        }

        let warming_up = self.state.count < self.config.min_data_points;

        let relative_change_old = relative_change(
            self.moving_avg_short.value(),
            self.moving_avg_long.value(),
        );
        self.moving_avg_short.update(payload.value);
        self.moving_avg_long.update(payload.value);
        let relative_change_new = relative_change(
            self.moving_avg_short.value(),
            self.moving_avg_long.value(),
        );

        self.state.count += 1;
        self.state.timestamp = Some(payload.timestamp);
        self.state.moving_avg_short = self.moving_avg_short.value();
        self.state.moving_avg_long = self.moving_avg_long.value();

        let score = relative_change_new.abs();
        let threshold = self.config.threshold;

        let trend = if warming_up {
            TrendType::Unchanged
        } else if relative_change_old < threshold && threshold <= relative_change_new {
            TrendType::Regressed
        } else if relative_change_old > -threshold && -threshold >= relative_change_new {
            TrendType::Improved
        } else {
            TrendType::Unchanged
        };

        (trend, score)
    }

    /// Current accumulated state, for persistence after a batch
    pub fn state(&self) -> &DetectorState {
        &self.state
    }

    /// Diagnostic detector-family label
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Diagnostic entity label
    pub fn source(&self) -> &str {
        &self.source
    }
}

/// Scale-invariant divergence of the fast average from the slow baseline
///
/// Defined as zero when the baseline is zero; that is the only numeric edge
/// case the algorithm handles explicitly. The denominator uses the
/// magnitude of the baseline so "short above long" reads as a regression
/// for negative-valued metrics too.
fn relative_change(short: f64, long: f64) -> f64 {
    if long == 0.0 {
        0.0
    } else {
        (short - long) / long.abs()
    }
}
