// End-to-end detector scenarios
//
// The reference configuration mirrors production defaults: six data points
// of warm-up, short window span 20 (alpha 2/21), long window span 40
// (alpha 2/41), 10% relative-change threshold, hourly measurements.

use chrono::{DateTime, Duration, TimeZone, Utc};

use super::{DetectorConfig, DetectorState, MovingAverageRelativeChangeDetector, TrendType};
use crate::payload::DetectorPayload;

fn reference_config() -> DetectorConfig {
    DetectorConfig::with_spans(6, 0.1, 20, 40).unwrap()
}

fn base_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

fn hourly_payloads(values: &[f64]) -> Vec<DetectorPayload> {
    values
        .iter()
        .enumerate()
        .map(|(i, &value)| DetectorPayload {
            project_id: 1,
            group: "transaction".to_string(),
            fingerprint: 7,
            count: 100,
            value,
            timestamp: base_time() + Duration::hours(i as i64),
        })
        .collect()
}

/// Feed all payloads through one detector; collect every classification
fn classify(values: &[f64]) -> Vec<(TrendType, f64)> {
    let mut detector =
        MovingAverageRelativeChangeDetector::new("transaction", "p95", reference_config());
    hourly_payloads(values)
        .iter()
        .map(|p| detector.update(p))
        .collect()
}

fn indices_of(results: &[(TrendType, f64)], trend: TrendType) -> Vec<usize> {
    results
        .iter()
        .enumerate()
        .filter(|(_, (t, _))| *t == trend)
        .map(|(i, _)| i)
        .collect()
}

#[test]
fn test_step_increase_regresses_once() {
    let mut values = vec![1.0; 10];
    values.extend(vec![2.0; 10]);
    let results = classify(&values);

    assert_eq!(indices_of(&results, TrendType::Regressed), vec![12]);
    assert_eq!(indices_of(&results, TrendType::Improved), Vec::<usize>::new());
}

#[test]
fn test_step_decrease_improves_once() {
    let mut values = vec![2.0; 10];
    values.extend(vec![1.0; 10]);
    let results = classify(&values);

    assert_eq!(indices_of(&results, TrendType::Improved), vec![15]);
    assert_eq!(
        indices_of(&results, TrendType::Regressed),
        Vec::<usize>::new()
    );
}

#[test]
fn test_quadratic_increase_regresses_once() {
    let values: Vec<f64> = (-10..20).map(|i| (f64::from(i) / 10.0).powi(2)).collect();
    let results = classify(&values);

    assert_eq!(indices_of(&results, TrendType::Regressed), vec![24]);
    assert_eq!(indices_of(&results, TrendType::Improved), Vec::<usize>::new());
}

#[test]
fn test_quadratic_decrease_improves_once() {
    let values: Vec<f64> = (-10..20)
        .map(|i| -(f64::from(i) / 10.0).powi(2))
        .collect();
    let results = classify(&values);

    assert_eq!(indices_of(&results, TrendType::Improved), vec![24]);
    assert_eq!(
        indices_of(&results, TrendType::Regressed),
        Vec::<usize>::new()
    );
}

#[test]
fn test_scores_are_never_negative() {
    let scenarios: Vec<Vec<f64>> = vec![
        [vec![1.0; 10], vec![2.0; 10]].concat(),
        [vec![2.0; 10], vec![1.0; 10]].concat(),
        (-10..20).map(|i| (f64::from(i) / 10.0).powi(2)).collect(),
        vec![0.0; 20],
    ];
    for values in scenarios {
        for (i, (_, score)) in classify(&values).iter().enumerate() {
            assert!(*score >= 0.0, "negative score at index {i}");
        }
    }
}

#[test]
fn test_warm_up_suppresses_extreme_changes() {
    // a 100x step inside the warm-up window must not classify
    let values = vec![1.0, 1.0, 100.0, 100.0, 1.0, 1.0];
    for (trend, _) in classify(&values) {
        assert_eq!(trend, TrendType::Unchanged);
    }
}

#[test]
fn test_all_zero_input_never_divides() {
    let results = classify(&[0.0; 20]);
    for (trend, score) in results {
        assert_eq!(trend, TrendType::Unchanged);
        assert_eq!(score, 0.0);
    }
}

#[test]
fn test_count_increments_by_one_per_payload() {
    // one per payload, not weighted by payload.count (which is 100 here)
    let mut detector =
        MovingAverageRelativeChangeDetector::new("transaction", "p95", reference_config());
    let payloads = hourly_payloads(&[1.0, 1.0, 1.0]);
    for p in &payloads {
        detector.update(p);
    }
    assert_eq!(detector.state().count, 3);
    assert_eq!(detector.state().timestamp, Some(payloads[2].timestamp));
}

#[test]
fn test_resume_from_state_matches_uninterrupted_run() {
    let mut values = vec![1.0; 10];
    values.extend(vec![2.0; 10]);
    let payloads = hourly_payloads(&values);

    let mut uninterrupted =
        MovingAverageRelativeChangeDetector::new("transaction", "p95", reference_config());
    let full: Vec<_> = payloads.iter().map(|p| uninterrupted.update(p)).collect();

    // replay the same series with a persistence round trip in the middle
    let mut first_half =
        MovingAverageRelativeChangeDetector::new("transaction", "p95", reference_config());
    let mut resumed_results: Vec<_> =
        payloads[..8].iter().map(|p| first_half.update(p)).collect();

    let fields = first_half.state().to_field_map();
    let restored = DetectorState::from_field_map(&fields).unwrap();
    let mut second_half = MovingAverageRelativeChangeDetector::from_state(
        "transaction",
        "p95",
        reference_config(),
        restored,
    );
    resumed_results.extend(payloads[8..].iter().map(|p| second_half.update(p)));

    assert_eq!(resumed_results, full);
    assert_eq!(second_half.state(), uninterrupted.state());
}

#[test]
fn test_fresh_state_starts_cold() {
    let detector =
        MovingAverageRelativeChangeDetector::new("transaction", "p95", reference_config());
    assert_eq!(detector.state(), &DetectorState::empty());
}

#[test]
#[should_panic(expected = "non-decreasing timestamp order")]
fn test_out_of_order_payload_panics() {
    let mut detector =
        MovingAverageRelativeChangeDetector::new("transaction", "p95", reference_config());
    let payloads = hourly_payloads(&[1.0, 1.0]);
    detector.update(&payloads[1]);
    detector.update(&payloads[0]);
}

#[test]
fn test_equal_timestamps_are_accepted() {
    // non-decreasing, not strictly increasing
    let mut detector =
        MovingAverageRelativeChangeDetector::new("transaction", "p95", reference_config());
    let payloads = hourly_payloads(&[1.0]);
    detector.update(&payloads[0]);
    detector.update(&payloads[0]);
    assert_eq!(detector.state().count, 2);
}
