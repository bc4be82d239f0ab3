//! Persisted per-entity detector state and its field-map codec
//!
//! The wire format is a string-keyed field map so any key-value backend with
//! string fields can hold it. The typed struct stays internal to the
//! algorithm; the map representation is confined to [`to_field_map`] and
//! [`from_field_map`].
//!
//! [`to_field_map`]: DetectorState::to_field_map
//! [`from_field_map`]: DetectorState::from_field_map

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use thiserror::Error;

/// Field name for the last-processed timestamp, integer epoch seconds
pub const FIELD_TIMESTAMP: &str = "timestamp";
/// Field name for the total payloads folded in so far
pub const FIELD_COUNT: &str = "count";
/// Field name for the short-window moving average
pub const FIELD_MOVING_AVG_SHORT: &str = "moving_avg_short";
/// Field name for the long-window moving average
pub const FIELD_MOVING_AVG_LONG: &str = "moving_avg_long";

/// Errors decoding a persisted field map
///
/// Surfaced to the caller so the orchestration layer can decide between
/// falling back to fresh state and skipping the entity; the codec never
/// substitutes defaults on its own.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum StateCodecError {
    #[error("missing mandatory field '{0}' in persisted state")]
    MissingField(&'static str),

    #[error("field '{field}' holds unparsable value '{value}'")]
    InvalidValue { field: &'static str, value: String },

    #[error("timestamp {0} is outside the representable range")]
    TimestampOutOfRange(i64),
}

/// Accumulated statistics for one tracked entity
///
/// Created empty the first time an entity is seen, mutated exactly once per
/// detector update, and encoded to a field map after each batch. A `None`
/// timestamp means the state has never been updated.
#[derive(Debug, Clone, PartialEq)]
pub struct DetectorState {
    /// Timestamp of the last processed payload
    pub timestamp: Option<DateTime<Utc>>,
    /// Total number of payloads folded into this state
    pub count: u64,
    /// Current value of the short-window moving average
    pub moving_avg_short: f64,
    /// Current value of the long-window moving average
    pub moving_avg_long: f64,
}

impl DetectorState {
    /// Fresh state for a never-seen entity
    pub fn empty() -> Self {
        Self {
            timestamp: None,
            count: 0,
            moving_avg_short: 0.0,
            moving_avg_long: 0.0,
        }
    }

    /// Encode to the string-keyed wire format
    ///
    /// A `None` timestamp is omitted entirely, not encoded as an empty
    /// string.
    pub fn to_field_map(&self) -> HashMap<String, String> {
        let mut fields = HashMap::with_capacity(4);
        if let Some(timestamp) = self.timestamp {
            fields.insert(
                FIELD_TIMESTAMP.to_string(),
                timestamp.timestamp().to_string(),
            );
        }
        fields.insert(FIELD_COUNT.to_string(), self.count.to_string());
        fields.insert(
            FIELD_MOVING_AVG_SHORT.to_string(),
            self.moving_avg_short.to_string(),
        );
        fields.insert(
            FIELD_MOVING_AVG_LONG.to_string(),
            self.moving_avg_long.to_string(),
        );
        fields
    }

    /// Decode from the string-keyed wire format
    ///
    /// `count`, `moving_avg_short` and `moving_avg_long` are mandatory; a
    /// missing timestamp decodes to `None`, a present one to a UTC instant.
    ///
    /// # Errors
    /// [`StateCodecError::MissingField`] for an absent mandatory field,
    /// [`StateCodecError::InvalidValue`] for unparsable numerics.
    pub fn from_field_map(fields: &HashMap<String, String>) -> Result<Self, StateCodecError> {
        let timestamp = match fields.get(FIELD_TIMESTAMP) {
            None => None,
            Some(raw) => {
                let secs = parse_field::<i64>(FIELD_TIMESTAMP, raw)?;
                let instant = Utc
                    .timestamp_opt(secs, 0)
                    .single()
                    .ok_or(StateCodecError::TimestampOutOfRange(secs))?;
                Some(instant)
            }
        };

        Ok(Self {
            timestamp,
            count: parse_field(FIELD_COUNT, mandatory(fields, FIELD_COUNT)?)?,
            moving_avg_short: parse_field(
                FIELD_MOVING_AVG_SHORT,
                mandatory(fields, FIELD_MOVING_AVG_SHORT)?,
            )?,
            moving_avg_long: parse_field(
                FIELD_MOVING_AVG_LONG,
                mandatory(fields, FIELD_MOVING_AVG_LONG)?,
            )?,
        })
    }
}

fn mandatory<'a>(
    fields: &'a HashMap<String, String>,
    field: &'static str,
) -> Result<&'a String, StateCodecError> {
    fields.get(field).ok_or(StateCodecError::MissingField(field))
}

fn parse_field<T: std::str::FromStr>(
    field: &'static str,
    raw: &str,
) -> Result<T, StateCodecError> {
    raw.parse().map_err(|_| StateCodecError::InvalidValue {
        field,
        value: raw.to_string(),
    })
}
