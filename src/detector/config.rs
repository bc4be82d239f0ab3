//! Configuration for the moving-average relative-change detector
//!
//! Configuration is passed explicitly into each detector rather than read
//! from process-level globals, so tests can run in parallel with different
//! configurations safely.

use std::fmt;
use std::sync::Arc;

use anyhow::Context;
use serde::{Deserialize, Serialize};

use crate::ema::{ExponentialMovingAverage, InvalidSmoothingFactor};

/// Constructs a fresh moving average per detector instance
///
/// Each entity's detector needs its own independent statistic, so the
/// configuration carries a factory rather than a pre-built shared instance.
pub type MovingAverageFactory = Arc<dyn Fn() -> ExponentialMovingAverage + Send + Sync>;

/// Invalid detector configuration, rejected at construction
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error(transparent)]
    SmoothingFactor(#[from] InvalidSmoothingFactor),

    #[error("threshold must be a non-negative finite number, got {0}")]
    InvalidThreshold(f64),

    #[error("min_data_points must be at least 1")]
    ZeroMinDataPoints,
}

/// Immutable detector configuration
///
/// The short-window factory is expected to carry the higher smoothing
/// factor (faster reaction), the long-window factory the lower one
/// (slower baseline). Nothing enforces that ordering; a swapped pair
/// simply inverts the meaning of the classifications.
#[derive(Clone)]
pub struct DetectorConfig {
    /// Payloads that must be folded in before any classification other
    /// than `Unchanged` can be emitted
    pub min_data_points: u64,
    /// Minimum relative change required to classify as regressed/improved
    pub threshold: f64,
    /// Builds the short-window (fast) moving average
    pub short_moving_avg_factory: MovingAverageFactory,
    /// Builds the long-window (slow) moving average
    pub long_moving_avg_factory: MovingAverageFactory,
}

impl DetectorConfig {
    /// Create a configuration from explicit factories
    ///
    /// # Errors
    /// Fails immediately for a non-finite or negative threshold or a zero
    /// `min_data_points`; the detector must never be constructed from an
    /// invalid configuration.
    pub fn new(
        min_data_points: u64,
        threshold: f64,
        short_moving_avg_factory: MovingAverageFactory,
        long_moving_avg_factory: MovingAverageFactory,
    ) -> Result<Self, ConfigError> {
        if !(threshold.is_finite() && threshold >= 0.0) {
            return Err(ConfigError::InvalidThreshold(threshold));
        }
        if min_data_points == 0 {
            return Err(ConfigError::ZeroMinDataPoints);
        }
        Ok(Self {
            min_data_points,
            threshold,
            short_moving_avg_factory,
            long_moving_avg_factory,
        })
    }

    /// Create a configuration from window spans, `alpha = 2 / (span + 1)`
    ///
    /// # Errors
    /// Same as [`DetectorConfig::new`], plus [`ConfigError::SmoothingFactor`]
    /// for a zero span.
    pub fn with_spans(
        min_data_points: u64,
        threshold: f64,
        short_span: u32,
        long_span: u32,
    ) -> Result<Self, ConfigError> {
        // validate the spans once up front so the factories are infallible
        let short = ExponentialMovingAverage::with_span(short_span)?;
        let long = ExponentialMovingAverage::with_span(long_span)?;
        Self::new(
            min_data_points,
            threshold,
            Arc::new(move || short),
            Arc::new(move || long),
        )
    }
}

impl fmt::Debug for DetectorConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DetectorConfig")
            .field("min_data_points", &self.min_data_points)
            .field("threshold", &self.threshold)
            .field("short_moving_avg_factory", &"<factory>")
            .field("long_moving_avg_factory", &"<factory>")
            .finish()
    }
}

/// Serializable detector settings, the TOML-file face of [`DetectorConfig`]
///
/// # Example TOML
/// ```toml
/// min_data_points = 6
/// threshold = 0.1
/// short_span = 20
/// long_span = 40
/// ```
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorSettings {
    pub min_data_points: u64,
    pub threshold: f64,
    pub short_span: u32,
    pub long_span: u32,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            min_data_points: 6,
            threshold: 0.1,
            short_span: 20,
            long_span: 40,
        }
    }
}

impl DetectorSettings {
    /// Strict settings: fewer false positives, more false negatives
    ///
    /// Use when downstream acts automatically on emitted events.
    pub fn strict() -> Self {
        Self {
            min_data_points: 12,
            threshold: 0.2,
            ..Self::default()
        }
    }

    /// Permissive settings: catch potential trend changes early
    pub fn permissive() -> Self {
        Self {
            min_data_points: 3,
            threshold: 0.05,
            ..Self::default()
        }
    }

    /// Load settings from a TOML file
    pub fn from_toml<P: AsRef<std::path::Path>>(path: P) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read settings file: {}", path.as_ref().display())
        })?;
        toml::from_str(&content).with_context(|| "Failed to parse TOML detector settings")
    }

    /// Build the validated runtime configuration
    ///
    /// # Errors
    /// Same validation as [`DetectorConfig::with_spans`].
    pub fn build(&self) -> Result<DetectorConfig, ConfigError> {
        DetectorConfig::with_spans(
            self.min_data_points,
            self.threshold,
            self.short_span,
            self.long_span,
        )
    }
}
