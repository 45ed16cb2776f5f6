//! Tests for unit conversions
//!
//! Tests cover:
//! - Conversions within each quantity
//! - Roundtrip accuracy
//! - Rejection of unknown and incompatible pairs

use signal_browser::units::{Quantity, Unit, UnitConversion};

fn assert_close(actual: f64, expected: f64) {
    assert!(
        (actual - expected).abs() < 1e-6 * expected.abs().max(1.0),
        "expected {}, got {}",
        expected,
        actual
    );
}

#[test]
fn test_fahrenheit_to_celsius() {
    let conv = UnitConversion::between("°F", "°C").unwrap();
    assert_close(conv.apply(212.0), 100.0);
    assert_close(conv.apply(-40.0), -40.0);
}

#[test]
fn test_psi_to_kpa() {
    let conv = UnitConversion::between("psi", "kPa").unwrap();
    assert_close(conv.apply(14.5038), 100.0);
}

#[test]
fn test_ms_to_mph() {
    let conv = UnitConversion::between("m/s", "mph").unwrap();
    assert_close(conv.apply(0.44704), 1.0);
}

#[test]
fn test_mm_to_m() {
    let conv = UnitConversion::between("mm", "m").unwrap();
    assert_close(conv.apply(1500.0), 1.5);
    assert_eq!(conv.unit.as_deref(), Some("m"));
}

#[test]
fn test_roundtrip_every_pair() {
    let symbols = [
        "K", "°C", "°F", "kPa", "bar", "psi", "km/h", "mph", "m/s", "mm", "m", "in",
    ];
    for from in symbols {
        for to in symbols {
            let (Some(there), Some(back)) = (
                UnitConversion::between(from, to),
                UnitConversion::between(to, from),
            ) else {
                continue;
            };
            for value in [-12.5, 0.0, 1.0, 250.0] {
                assert_close(back.apply(there.apply(value)), value);
            }
        }
    }
}

#[test]
fn test_aliases_parse() {
    assert!(UnitConversion::between("degC", "degF").is_some());
    assert!(UnitConversion::between("PSI", "bar").is_some());
}

#[test]
fn test_cross_quantity_is_rejected() {
    assert!(UnitConversion::between("km/h", "mm").is_none());
    assert!(UnitConversion::between("°C", "kPa").is_none());
}

#[test]
fn test_quantities() {
    assert_eq!(Unit::Fahrenheit.quantity(), Quantity::Temperature);
    assert_eq!(Unit::Inch.quantity(), Quantity::Length);
    assert_eq!(Unit::Mph.symbol(), "mph");
}
