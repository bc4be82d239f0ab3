//! JSON report format for batch results
//!
//! One report document per processing pass, for machine consumers
//! (dashboards, issue creation, notification routing). Events are sorted
//! most severe first so consumers can truncate safely.

use serde::Serialize;

use crate::runner::{BatchOutcome, TrendEvent};

/// Machine-readable result of one processing pass
#[derive(Debug, Clone, Serialize)]
pub struct JsonReport {
    pub entities_processed: usize,
    pub entities_skipped: usize,
    pub payloads_processed: usize,
    /// Trend events, descending by score
    pub events: Vec<TrendEvent>,
}

impl JsonReport {
    pub fn from_outcome(outcome: &BatchOutcome) -> Self {
        let mut events = outcome.events.clone();
        events.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Self {
            entities_processed: outcome.entities_processed,
            entities_skipped: outcome.entities_skipped,
            payloads_processed: outcome.payloads_processed,
            events,
        }
    }

    /// Render as pretty-printed JSON
    pub fn render(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detector::TrendType;
    use chrono::{TimeZone, Utc};

    fn event(fingerprint: u64, score: f64) -> TrendEvent {
        TrendEvent {
            project_id: 1,
            group: "transaction".to_string(),
            fingerprint,
            trend_type: TrendType::Regressed,
            score,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            value: 2.0,
            count: 100,
        }
    }

    fn outcome(events: Vec<TrendEvent>) -> BatchOutcome {
        BatchOutcome {
            entities_processed: 2,
            entities_skipped: 0,
            payloads_processed: 40,
            events,
        }
    }

    #[test]
    fn test_events_sorted_by_descending_score() {
        let report = JsonReport::from_outcome(&outcome(vec![event(1, 0.11), event(2, 0.35)]));
        assert_eq!(report.events[0].fingerprint, 2);
        assert_eq!(report.events[1].fingerprint, 1);
    }

    #[test]
    fn test_render_is_valid_json() {
        let report = JsonReport::from_outcome(&outcome(vec![event(1, 0.11)]));
        let rendered = report.render().unwrap();
        let value: serde_json::Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(value["entities_processed"], 2);
        assert_eq!(value["events"][0]["trend_type"], "regressed");
    }
}
