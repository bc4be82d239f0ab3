//! Measurement payloads and entity identity
//!
//! A payload is one observed aggregate for one tracked entity at one point
//! in time, e.g. the p95 duration of a transaction over a bucket. Entities
//! are identified by `(project_id, group, fingerprint)` and tracked
//! independently of each other.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identity of one independently tracked entity
///
/// `group` is the coarse detector family (e.g. `"transaction"` or
/// `"function"`), `fingerprint` the specific entity within it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityKey {
    pub project_id: u64,
    pub group: String,
    pub fingerprint: u64,
}

impl EntityKey {
    /// Stable string encoding used as the state-store key
    pub fn storage_key(&self) -> String {
        format!("{}:{}:{}", self.project_id, self.group, self.fingerprint)
    }
}

impl std::fmt::Display for EntityKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.storage_key())
    }
}

/// One observed measurement for one entity at one point in time
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectorPayload {
    /// Owning scope identifier
    pub project_id: u64,
    /// Detector family this measurement belongs to
    pub group: String,
    /// The specific entity being tracked
    pub fingerprint: u64,
    /// Number of underlying raw samples aggregated into this payload
    pub count: u64,
    /// Aggregate metric value (e.g. p95 duration) at this timestamp
    pub value: f64,
    /// When the measurement was taken
    pub timestamp: DateTime<Utc>,
}

impl DetectorPayload {
    /// Entity identity of this payload
    pub fn entity_key(&self) -> EntityKey {
        EntityKey {
            project_id: self.project_id,
            group: self.group.clone(),
            fingerprint: self.fingerprint,
        }
    }

    /// Boundary validation applied by payload sources
    ///
    /// The detector itself does not special-case non-finite values; sources
    /// must reject them before feeding a detector.
    ///
    /// # Errors
    /// Returns [`PayloadError::NonFiniteValue`] for NaN or infinite values.
    pub fn validate(&self) -> Result<(), PayloadError> {
        if !self.value.is_finite() {
            return Err(PayloadError::NonFiniteValue {
                entity: self.entity_key(),
                value: self.value,
                timestamp: self.timestamp,
            });
        }
        Ok(())
    }
}

/// Payload rejected at the source boundary
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PayloadError {
    #[error("non-finite value {value} for entity {entity} at {timestamp}")]
    NonFiniteValue {
        entity: EntityKey,
        value: f64,
        timestamp: DateTime<Utc>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn payload(value: f64) -> DetectorPayload {
        DetectorPayload {
            project_id: 1,
            group: "transaction".to_string(),
            fingerprint: 42,
            count: 10,
            value,
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap(),
        }
    }

    #[test]
    fn test_storage_key_is_stable() {
        assert_eq!(payload(1.0).entity_key().storage_key(), "1:transaction:42");
    }

    #[test]
    fn test_validate_accepts_finite_values() {
        assert!(payload(0.0).validate().is_ok());
        assert!(payload(-12.5).validate().is_ok());
        assert!(payload(f64::MAX).validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_non_finite_values() {
        for bad in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            let err = payload(bad).validate();
            assert!(matches!(err, Err(PayloadError::NonFiniteValue { .. })));
        }
    }

    #[test]
    fn test_payload_json_round_trip() {
        let p = payload(250.5);
        let json = serde_json::to_string(&p).unwrap();
        let back: DetectorPayload = serde_json::from_str(&json).unwrap();
        assert_eq!(back, p);
    }
}
