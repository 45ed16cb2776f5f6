//! Tests for channel selection state
//!
//! Tests cover:
//! - Checking and unchecking channels
//! - Palette assignment
//! - Channels that cannot be plotted

use signal_browser::parsers::{ChannelId, ChannelInfo, ValueType};
use signal_browser::state::{Axis, ChannelKey, ChannelRegistry, CheckError, CHART_COLORS};
use signal_browser::units::UnitConversion;

fn info(name: &str, description: Option<&str>, value_type: Option<ValueType>) -> ChannelInfo {
    ChannelInfo {
        id: ChannelId::Key(name.to_string()),
        name: name.to_string(),
        description: description.map(str::to_string),
        value_type,
    }
}

#[test]
fn test_entry_defaults() {
    let mut reg = ChannelRegistry::new();
    let key = ChannelKey::new("run.tdm", "G [1]", ChannelId::Index(3));
    let entry = reg
        .check(key.clone(), &info("Speed", Some("Motor speed"), None))
        .unwrap();

    assert_eq!(entry.display_name, "Speed (Motor speed)");
    assert_eq!(entry.axis, Axis::Left);
    assert!(entry.conversion.is_identity());
    assert_eq!(entry.color(), CHART_COLORS[0]);
    assert!(reg.is_checked(&key));
}

#[test]
fn test_same_channel_in_different_sources() {
    let mut reg = ChannelRegistry::new();
    let a = ChannelKey::new("a.db", "Motor", ChannelId::Key("x".into()));
    let b = ChannelKey::new("b.db", "Motor", ChannelId::Key("x".into()));
    reg.check(a, &info("x", None, Some(ValueType::Int))).unwrap();
    reg.check(b, &info("x", None, Some(ValueType::Int))).unwrap();
    assert_eq!(reg.len(), 2);
}

#[test]
fn test_bool_channels_are_plottable() {
    let mut reg = ChannelRegistry::new();
    let key = ChannelKey::new("a.db", "Motor", ChannelId::Key("on".into()));
    assert!(reg.check(key, &info("on", None, Some(ValueType::Bool))).is_ok());
}

#[test]
fn test_string_channels_are_rejected() {
    let mut reg = ChannelRegistry::new();
    let key = ChannelKey::new("a.db", "Motor", ChannelId::Key("mode".into()));
    assert_eq!(
        reg.check(key, &info("mode", None, Some(ValueType::String)))
            .unwrap_err(),
        CheckError::NotPlottable(ValueType::String)
    );
}

#[test]
fn test_uncheck_and_clear() {
    let mut reg = ChannelRegistry::new();
    let key = ChannelKey::new("a.bin", "a", ChannelId::Key("Force".into()));
    reg.check(key.clone(), &info("Force", None, None)).unwrap();
    reg.set_conversion(&key, UnitConversion::new(2.0, 0.0, None));

    let removed = reg.uncheck(&key).unwrap();
    assert_eq!(removed.conversion.factor, 2.0);
    assert!(reg.uncheck(&key).is_none());

    reg.check(key, &info("Force", None, None)).unwrap();
    reg.clear();
    assert!(reg.is_empty());
}
