//! Tests for reader settings persistence
//!
//! Tests cover:
//! - Default settings values
//! - Serialization/deserialization
//! - Settings roundtrip

use signal_browser::settings::{ReaderSettings, TdmTimeEncoding};

#[test]
fn test_settings_default_version() {
    assert_eq!(ReaderSettings::default().version, 1);
}

#[test]
fn test_settings_serialize_names() {
    let json = serde_json::to_value(ReaderSettings::default()).unwrap();
    assert_eq!(json["tdm_time_encoding"], "zero_epoch");
    assert_eq!(json["json_column"], "rti_json_sample");
    assert_eq!(json["max_merge_workers"], 100);
}

#[test]
fn test_settings_empty_object_gives_defaults() {
    let s: ReaderSettings = serde_json::from_str("{}").unwrap();
    assert_eq!(s.reception_column, "SampleInfo_reception_timestamp");
    assert!(s.follow_plc_chain);
    assert!(s.forced_boolean_channels.is_empty());
}

#[test]
fn test_settings_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");

    let settings = ReaderSettings {
        tdm_time_encoding: TdmTimeEncoding::UnixSeconds,
        forced_boolean_channels: vec!["Clamp".into(), "Valve".into()],
        max_merge_workers: 8,
        follow_plc_chain: false,
        plc_timestamp_continuation: true,
        ..ReaderSettings::default()
    };
    settings.save_to(&path).unwrap();

    let loaded = ReaderSettings::load_from(&path);
    assert_eq!(loaded.tdm_time_encoding, TdmTimeEncoding::UnixSeconds);
    assert_eq!(loaded.forced_boolean_channels, vec!["Clamp", "Valve"]);
    assert_eq!(loaded.max_merge_workers, 8);
    assert!(!loaded.follow_plc_chain);
    assert!(loaded.plc_timestamp_continuation);
}

#[test]
fn test_settings_empty_columns_are_restored() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    std::fs::write(&path, r#"{"json_column": "", "reception_column": ""}"#).unwrap();

    let loaded = ReaderSettings::load_from(&path);
    assert_eq!(loaded.json_column, "rti_json_sample");
    assert_eq!(loaded.reception_column, "SampleInfo_reception_timestamp");
}
