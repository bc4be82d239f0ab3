// Trend detection via dual moving-average comparison
//
// This module implements streaming step-change detection for per-entity
// performance measurements. Two exponential moving averages with different
// smoothing factors track the same series; a sustained shift drives the
// fast average away from the slow baseline, and the relative gap between
// them crossing a threshold classifies the entity as regressed or improved.
//
// Scientific Foundation:
// Roberts, S. W. (1959). Control chart tests based on geometric moving
// averages. Technometrics 1(3). EWMA control charts detect sustained
// process-mean shifts while absorbing single-point noise.

mod algorithm;
mod config;
mod state;

pub use algorithm::{MovingAverageRelativeChangeDetector, TrendType};
pub use config::{ConfigError, DetectorConfig, DetectorSettings, MovingAverageFactory};
pub use state::{
    DetectorState, StateCodecError, FIELD_COUNT, FIELD_MOVING_AVG_LONG, FIELD_MOVING_AVG_SHORT,
    FIELD_TIMESTAMP,
};

#[cfg(test)]
mod tests;
