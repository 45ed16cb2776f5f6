//! Tests for value classification and plot presentation
//!
//! Tests cover:
//! - JSON value type inference
//! - Boolean signal recognition
//! - Forced-boolean channels
//! - Plot traces with unit conversion

use serde_json::json;
use signal_browser::normalize::{classify, infer_value_type, is_boolean_signal, present, Presentation};
use signal_browser::parsers::{SeriesValues, TimeSeries, ValueType};
use signal_browser::timestamp::json_timestamp_to_instant;
use signal_browser::units::UnitConversion;

fn series(name: &str, values: SeriesValues) -> TimeSeries {
    let times = (0..values.len() as i64)
        .map(|i| json_timestamp_to_instant(100 + i, 0).unwrap())
        .collect();
    TimeSeries::from_samples(name, times, values).unwrap()
}

// ============================================
// Type Inference
// ============================================

#[test]
fn test_infer_sample_row() {
    let row = json!({"a": "true", "b": 3.5, "c": "hello"});
    let obj = row.as_object().unwrap();
    assert_eq!(infer_value_type(&obj["a"]), Some(ValueType::Bool));
    assert_eq!(infer_value_type(&obj["b"]), Some(ValueType::Float));
    assert_eq!(infer_value_type(&obj["c"]), Some(ValueType::String));
}

#[test]
fn test_infer_integers() {
    assert_eq!(infer_value_type(&json!(-4)), Some(ValueType::Int));
    assert_eq!(infer_value_type(&json!(18446744073709551615u64)), Some(ValueType::Int));
    assert_eq!(infer_value_type(&json!(4.0)), Some(ValueType::Float));
}

#[test]
fn test_infer_untypeable() {
    assert_eq!(infer_value_type(&json!(null)), None);
    assert_eq!(infer_value_type(&json!([1, 2])), None);
    assert_eq!(infer_value_type(&json!({"sec": 1, "nanosec": 0})), None);
}

// ============================================
// Classification
// ============================================

#[test]
fn test_boolean_signal_edge_cases() {
    assert!(is_boolean_signal(&[1.0, 1.0, 1.0]));
    assert!(is_boolean_signal(&[0.0]));
    assert!(!is_boolean_signal(&[0.0, f64::NAN]));
    assert!(!is_boolean_signal(&[-1.0, 0.0]));
}

#[test]
fn test_scenario_zero_one_trace_is_boolean() {
    let x = series("x", SeriesValues::Float(vec![1.0, 0.0]));
    assert_eq!(classify(&x, &[]), Presentation::Boolean);
}

#[test]
fn test_forced_boolean_overrides_values() {
    let pressure = series("pressure", SeriesValues::Float(vec![3.2, 4.1]));
    assert_eq!(classify(&pressure, &[]), Presentation::Numeric);
    assert_eq!(
        classify(&pressure, &["pressure".to_string()]),
        Presentation::Boolean
    );
}

#[test]
fn test_bool_series_is_boolean() {
    let flag = series("flag", SeriesValues::Bool(vec![true, false, true]));
    assert_eq!(classify(&flag, &[]), Presentation::Boolean);
    let trace = present(&flag, None, &[]);
    assert_eq!(trace.y, vec![1.0, 0.0, 1.0]);
}

// ============================================
// Presentation
// ============================================

#[test]
fn test_present_converts_numeric_trace() {
    let temp = series("coolant", SeriesValues::Float(vec![273.15, 373.15]));
    let conv = UnitConversion::between("K", "°C").unwrap();
    let trace = present(&temp, Some(&conv), &[]);

    assert_eq!(trace.presentation, Presentation::Numeric);
    assert!((trace.y[0] - 0.0).abs() < 1e-9);
    assert!((trace.y[1] - 100.0).abs() < 1e-9);
    assert_eq!(trace.unit.as_deref(), Some("°C"));
    assert_eq!(trace.times, temp.times());
}

#[test]
fn test_present_serializes() {
    let x = series("x", SeriesValues::Float(vec![2.0]));
    let trace = present(&x, None, &[]);
    let value = serde_json::to_value(&trace).unwrap();
    assert_eq!(value["name"], "x");
    assert_eq!(value["presentation"], "Numeric");
    assert_eq!(value["y"], json!([2.0]));
}
