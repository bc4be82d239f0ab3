//! Exponential moving average for streaming metric smoothing
//!
//! Maintains a running average that blends each new sample with the prior
//! value using a fixed smoothing factor, giving more weight to recent data
//! without storing history:
//!
//! > value = value + alpha * (sample - value)
//!
//! Scientific Foundation:
//! Roberts, S. W. (1959). Control chart tests based on geometric moving
//! averages. Technometrics, 1(3). The EWMA chart reacts to sustained shifts
//! in a process mean while staying robust to single-point noise.

use thiserror::Error;

/// Smoothing factor outside the open-closed interval (0, 1]
#[derive(Debug, Clone, Copy, PartialEq, Error)]
#[error("smoothing factor must be in (0, 1], got {0}")]
pub struct InvalidSmoothingFactor(pub f64);

/// Streaming exponential moving average with a fixed smoothing factor
///
/// Higher factors react faster to new data (shorter effective window),
/// lower factors are smoother and slower. Each detector owns private
/// instances; the type is intentionally not synchronized.
///
/// # Example
/// ```
/// use deriva::ema::ExponentialMovingAverage;
///
/// let mut ema = ExponentialMovingAverage::new(0.5).unwrap();
/// assert_eq!(ema.update(10.0), 10.0); // first sample initializes
/// assert_eq!(ema.update(20.0), 15.0);
/// ```
#[derive(Debug, Clone, Copy)]
pub struct ExponentialMovingAverage {
    smoothing_factor: f64,
    value: f64,
    initialized: bool,
}

impl ExponentialMovingAverage {
    /// Create a moving average with the given smoothing factor
    ///
    /// # Errors
    /// Returns [`InvalidSmoothingFactor`] unless `smoothing_factor` is in
    /// `(0, 1]`. NaN is rejected.
    pub fn new(smoothing_factor: f64) -> Result<Self, InvalidSmoothingFactor> {
        if !(smoothing_factor > 0.0 && smoothing_factor <= 1.0) {
            return Err(InvalidSmoothingFactor(smoothing_factor));
        }
        Ok(Self {
            smoothing_factor,
            value: 0.0,
            initialized: false,
        })
    }

    /// Create a moving average from a window span, `alpha = 2 / (span + 1)`
    ///
    /// A span of 20 gives the classic `2/21` factor. Spans of at least 1
    /// always map into `(0, 1]`.
    ///
    /// # Errors
    /// Returns [`InvalidSmoothingFactor`] for a span of 0.
    pub fn with_span(span: u32) -> Result<Self, InvalidSmoothingFactor> {
        Self::new(2.0 / (f64::from(span) + 1.0))
    }

    /// Fold a new sample into the average and return the updated value
    ///
    /// The very first sample initializes the average to the sample itself
    /// rather than blending against zero, which would bias the early window.
    pub fn update(&mut self, sample: f64) -> f64 {
        if self.initialized {
            self.value += self.smoothing_factor * (sample - self.value);
        } else {
            self.value = sample;
            self.initialized = true;
        }
        self.value
    }

    /// Current average; zero until the first sample arrives
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Smoothing factor fixed at construction
    pub fn smoothing_factor(&self) -> f64 {
        self.smoothing_factor
    }

    /// Prime the average from persisted state
    ///
    /// Marks the statistic as initialized so the next sample blends against
    /// the restored value instead of replacing it.
    pub(crate) fn restore(&mut self, value: f64) {
        self.value = value;
        self.initialized = true;
    }
}
