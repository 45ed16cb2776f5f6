//! PLC segment reader tests

use crate::common::plc::{segment_bytes, write_segment, write_zipped_segment};
use signal_browser::parsers::plc::{self, PlcReader, SegmentChain};
use signal_browser::parsers::{ChannelId, LogReader};
use signal_browser::settings::ReaderSettings;
use signal_browser::timestamp::ole_date_to_instant;
use signal_browser::ReaderError;

const ANCHOR: f64 = 45000.0;

fn secs_since_anchor(frame: &signal_browser::parsers::Frame) -> Vec<i64> {
    let anchor = ole_date_to_instant(ANCHOR).unwrap();
    frame
        .times
        .iter()
        .map(|t| (*t - anchor).num_seconds())
        .collect()
}

// ============================================
// Chains
// ============================================

#[test]
fn test_self_reference_stops_after_first_segment() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_segment(
        dir.path(),
        "seg1.bin",
        ANCHOR,
        &[0.0, 1.0],
        "seg1.bin",
        &[("A", vec![1.0, 2.0])],
    );
    write_segment(
        dir.path(),
        "seg2.bin",
        ANCHOR,
        &[2.0, 3.0],
        "",
        &[("A", vec![3.0, 4.0])],
    );

    let frame = plc::read_chain(&first, false).unwrap();
    assert_eq!(frame.len(), 2);
    assert_eq!(frame.column("A").unwrap().values, vec![1.0, 2.0]);
}

#[test]
fn test_chain_follows_next_pointers() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_segment(
        dir.path(),
        "seg1.bin",
        ANCHOR,
        &[0.0, 1.0],
        "seg2.bin",
        &[("A", vec![1.0, 2.0])],
    );
    write_segment(
        dir.path(),
        "seg2.bin",
        ANCHOR,
        &[1.0, 2.0],
        "seg3.bin",
        &[("A", vec![99.0, 3.0]), ("B", vec![5.0, 6.0])],
    );

    let frame = plc::read_chain(&first, false).unwrap();
    assert_eq!(secs_since_anchor(&frame), vec![0, 1, 2]);
    // First-wins at the shared instant
    assert_eq!(frame.column("A").unwrap().values, vec![1.0, 2.0, 3.0]);
    let b = &frame.column("B").unwrap().values;
    assert!(b[0].is_nan() && b[1].is_nan());
    assert_eq!(b[2], 6.0);
}

#[test]
fn test_cycle_is_read_once() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_segment(
        dir.path(),
        "a.bin",
        ANCHOR,
        &[0.0],
        "b.bin",
        &[("A", vec![1.0])],
    );
    write_segment(dir.path(), "b.bin", ANCHOR, &[1.0], "c.bin", &[("A", vec![2.0])]);
    write_segment(dir.path(), "c.bin", ANCHOR, &[2.0], "a.bin", &[("A", vec![3.0])]);

    let paths: Vec<_> = SegmentChain::new(&first, false)
        .map(|item| item.unwrap().0)
        .collect();
    assert_eq!(paths.len(), 3);

    let frame = plc::read_chain(&first, false).unwrap();
    assert_eq!(frame.column("A").unwrap().values, vec![1.0, 2.0, 3.0]);
}

#[test]
fn test_timestamp_continuation() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_segment(
        dir.path(),
        "a.bin",
        ANCHOR,
        &[0.0, 10.0],
        "b.bin",
        &[("A", vec![1.0, 2.0])],
    );
    // Anchor of the second segment is ignored in continuation mode
    write_segment(dir.path(), "b.bin", 1.0, &[5.0], "", &[("A", vec![3.0])]);

    let frame = plc::read_chain(&first, true).unwrap();
    assert_eq!(secs_since_anchor(&frame), vec![0, 10, 15]);
}

#[test]
fn test_multiple_chains_keep_list_order() {
    let dir = tempfile::tempdir().unwrap();
    let a = write_segment(dir.path(), "a.bin", ANCHOR, &[0.0, 1.0], "", &[("A", vec![1.0, 2.0])]);
    let b = write_segment(dir.path(), "b.bin", ANCHOR, &[1.0, 2.0], "", &[("A", vec![20.0, 3.0])]);

    let frame = plc::read_multiple_chains(&[a.clone(), b.clone()], false).unwrap();
    assert_eq!(frame.column("A").unwrap().values, vec![1.0, 2.0, 3.0]);

    let reversed = plc::read_multiple_chains(&[b, a], false).unwrap();
    assert_eq!(reversed.column("A").unwrap().values, vec![1.0, 20.0, 3.0]);
}

// ============================================
// Segment Files
// ============================================

#[test]
fn test_zipped_segment_in_chain() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_zipped_segment(
        dir.path(),
        "a.zip",
        &segment_bytes(ANCHOR, &[0.0], "", "b.bin", &[("A", vec![1.0])]),
    );
    write_segment(dir.path(), "b.bin", ANCHOR, &[1.0], "", &[("A", vec![2.0])]);

    let frame = plc::read_chain(&first, false).unwrap();
    assert_eq!(frame.column("A").unwrap().values, vec![1.0, 2.0]);
}

#[test]
fn test_truncated_segment_fails() {
    let dir = tempfile::tempdir().unwrap();
    let mut bytes = segment_bytes(ANCHOR, &[0.0, 1.0], "", "", &[("A", vec![1.0, 2.0])]);
    bytes.truncate(20);
    let path = crate::common::write_file(dir.path(), "short.bin", &bytes);

    let err = plc::read_chain(&path, false).unwrap_err();
    assert!(matches!(err, ReaderError::Format(_)));
}

// ============================================
// Reader Facade
// ============================================

#[test]
fn test_reader_single_group_named_after_file() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_segment(
        dir.path(),
        "press_01.bin",
        ANCHOR,
        &[0.0, 0.5],
        "",
        &[("Force", vec![1.0, 2.0]), ("Enable", vec![0.0, 1.0])],
    );

    let reader = PlcReader::new(vec![first], &ReaderSettings::default()).unwrap();
    assert_eq!(reader.list_groups().unwrap(), vec!["press_01"]);

    let channels = reader.list_channels("press_01").unwrap();
    let names: Vec<&str> = channels.iter().map(|c| c.name.as_str()).collect();
    assert_eq!(names, vec!["Force", "Enable"]);

    let force = reader
        .channel_series("press_01", &ChannelId::Key("Force".into()))
        .unwrap();
    assert_eq!(force.as_f64().unwrap(), &[1.0, 2.0]);

    let enable = reader.channel_series("press_01", &ChannelId::Index(1)).unwrap();
    assert_eq!(enable.name, "Enable");

    assert!(reader.list_channels("other").unwrap_err().is_not_found());
}

#[test]
fn test_resolve_channel_prefers_names() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_segment(
        dir.path(),
        "digits.bin",
        ANCHOR,
        &[0.0, 1.0],
        "",
        &[("Force", vec![1.0, 2.0]), ("1", vec![7.0, 8.0]), ("Clamp", vec![0.0, 1.0])],
    );
    let reader = PlcReader::new(vec![first], &ReaderSettings::default()).unwrap();

    let named = reader.resolve_channel("digits", "1").unwrap();
    let series = reader.channel_series("digits", &named).unwrap();
    assert_eq!(series.name, "1");
    assert_eq!(series.as_f64().unwrap(), &[7.0, 8.0]);

    let by_position = reader.resolve_channel("digits", "2").unwrap();
    let series = reader.channel_series("digits", &by_position).unwrap();
    assert_eq!(series.name, "Clamp");

    assert!(reader.resolve_channel("digits", "9").unwrap_err().is_not_found());
}

#[test]
fn test_reader_without_chain_following() {
    let dir = tempfile::tempdir().unwrap();
    let first = write_segment(dir.path(), "a.bin", ANCHOR, &[0.0], "b.bin", &[("A", vec![1.0])]);
    write_segment(dir.path(), "b.bin", ANCHOR, &[1.0], "", &[("A", vec![2.0])]);

    let settings = ReaderSettings {
        follow_plc_chain: false,
        ..ReaderSettings::default()
    };
    let reader = PlcReader::new(vec![first], &settings).unwrap();
    let frame = reader.load_frame().unwrap();
    assert_eq!(frame.len(), 1);
}
