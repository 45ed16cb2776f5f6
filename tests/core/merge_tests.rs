//! Tests for the multi-file merge engine
//!
//! Tests cover:
//! - Ordering and uniqueness of merged instants
//! - First-wins across files in list order
//! - Timestamp source decided over the concatenation
//! - Whole-merge failure on a bad shard

use std::path::PathBuf;

use crate::common::rti::{create_db, sample};
use signal_browser::merge::merge_channel;
use signal_browser::settings::ReaderSettings;
use signal_browser::ReaderError;

fn shard(dir: &std::path::Path, name: &str, samples: &[(i64, f64)]) -> PathBuf {
    let json: Vec<String> = samples
        .iter()
        .map(|(sec, x)| sample(*sec, &format!(r#""x": {}"#, x)))
        .collect();
    let rows: Vec<(Option<&str>, Option<i64>)> =
        json.iter().map(|j| (Some(j.as_str()), None)).collect();
    create_db(dir, name, "Motor", &rows)
}

fn secs(series: &signal_browser::parsers::TimeSeries) -> Vec<i64> {
    series.times().iter().map(|t| t.timestamp()).collect()
}

#[test]
fn test_merged_series_is_strictly_ascending() {
    let dir = tempfile::tempdir().unwrap();
    let files: Vec<PathBuf> = (0..6)
        .map(|i| {
            let samples: Vec<(i64, f64)> = (0..5).map(|k| ((k * 7 + i * 3) % 20, k as f64)).collect();
            shard(dir.path(), &format!("s{}.db", i), &samples)
        })
        .collect();

    let series = merge_channel(&files, "Motor", "x", &ReaderSettings::default()).unwrap();
    let times = series.times();
    assert!(!times.is_empty());
    for pair in times.windows(2) {
        assert!(pair[0] < pair[1]);
    }
}

#[test]
fn test_first_file_wins_overlap() {
    let dir = tempfile::tempdir().unwrap();
    let a = shard(dir.path(), "a.db", &[(100, 1.0), (101, 2.0)]);
    let b = shard(dir.path(), "b.db", &[(101, 50.0), (102, 3.0)]);

    let ab = merge_channel(
        &[a.clone(), b.clone()],
        "Motor",
        "x",
        &ReaderSettings::default(),
    )
    .unwrap();
    assert_eq!(secs(&ab), vec![100, 101, 102]);
    assert_eq!(ab.as_f64().unwrap(), &[1.0, 2.0, 3.0]);

    let ba = merge_channel(&[b, a], "Motor", "x", &ReaderSettings::default()).unwrap();
    assert_eq!(ba.as_f64().unwrap(), &[1.0, 50.0, 3.0]);
}

#[test]
fn test_single_file_merge() {
    let dir = tempfile::tempdir().unwrap();
    let a = shard(dir.path(), "a.db", &[(5, 1.0), (4, 0.0)]);
    let series = merge_channel(&[a], "Motor", "x", &ReaderSettings::default()).unwrap();
    assert_eq!(secs(&series), vec![4, 5]);
}

#[test]
fn test_reception_fallback_across_shards() {
    let dir = tempfile::tempdir().unwrap();
    let a = create_db(
        dir.path(),
        "a.db",
        "Motor",
        &[(Some(r#"{"x": 1}"#), Some(3_000_000_000))],
    );
    let b = create_db(
        dir.path(),
        "b.db",
        "Motor",
        &[(Some(r#"{"x": 2}"#), Some(1_000_000_000))],
    );
    let series = merge_channel(&[a, b], "Motor", "x", &ReaderSettings::default()).unwrap();
    assert_eq!(secs(&series), vec![1, 3]);
    assert_eq!(series.as_f64().unwrap(), &[2.0, 1.0]);
}

#[test]
fn test_shard_without_table_fails_merge() {
    let dir = tempfile::tempdir().unwrap();
    let a = shard(dir.path(), "a.db", &[(1, 1.0)]);
    let other = create_db(dir.path(), "other.db", "Pump", &[(Some(r#"{"x": 1}"#), Some(1))]);

    let err = merge_channel(&[a, other.clone()], "Motor", "x", &ReaderSettings::default())
        .unwrap_err();
    match &err {
        ReaderError::PartialRead { path, source } => {
            assert_eq!(path, &other);
            assert!(source.is_not_found());
        }
        e => panic!("expected PartialRead, got {:?}", e),
    }
    assert!(err.is_not_found());
}
