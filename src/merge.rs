//! Multi-file merge of recorder shards.
//!
//! A long recording is split over several database files. Each file is read
//! on its own connection by a bounded rayon pool, and the raw rows are joined
//! in file-list order before timestamps are resolved, so the result does not
//! depend on which shard finished first.

use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::error::{ReaderError, Result};
use crate::parsers::rti::{self, RtiColumns, TraceRow};
use crate::parsers::types::{TimeSeries, ValueType};
use crate::settings::ReaderSettings;

type ShardResult = (usize, Result<Vec<TraceRow>>);

fn read_shard(path: &Path, table: &str, key: &str, columns: &RtiColumns) -> Result<Vec<TraceRow>> {
    let conn = rti::open_database(path)?;
    rti::fetch_trace_rows(&conn, table, key, columns)
}

/// Read `key` of `table` from every file and merge into one canonical series.
///
/// Any failed file fails the whole merge with [`ReaderError::PartialRead`]
/// naming the first failing file in list order.
pub fn merge_channel(
    files: &[PathBuf],
    table: &str,
    key: &str,
    settings: &ReaderSettings,
) -> Result<TimeSeries> {
    if files.is_empty() {
        return Ok(TimeSeries::empty(key, ValueType::Float));
    }

    let columns = RtiColumns::from(settings);
    let workers = settings.max_merge_workers.clamp(1, files.len());
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("merge-{}", i))
        .build()
        .map_err(|e| ReaderError::format(format!("failed to start merge workers: {}", e)))?;

    tracing::info!(
        "Merging '{}.{}' from {} files on {} workers",
        table,
        key,
        files.len(),
        workers
    );

    let results: Mutex<Vec<ShardResult>> = Mutex::new(Vec::with_capacity(files.len()));
    pool.scope(|scope| {
        for (idx, path) in files.iter().enumerate() {
            let results = &results;
            let columns = &columns;
            scope.spawn(move |_| {
                let rows = read_shard(path, table, key, columns);
                if let Ok(mut guard) = results.lock() {
                    guard.push((idx, rows));
                }
            });
        }
    });

    let mut results = results
        .into_inner()
        .map_err(|_| ReaderError::format("merge worker panicked"))?;
    if results.len() != files.len() {
        return Err(ReaderError::format(format!(
            "merge collected {} of {} shard results",
            results.len(),
            files.len()
        )));
    }
    results.sort_by_key(|(idx, _)| *idx);

    let mut rows = Vec::new();
    for (idx, shard) in results {
        match shard {
            Ok(mut shard_rows) => {
                tracing::debug!("{} rows from {}", shard_rows.len(), files[idx].display());
                rows.append(&mut shard_rows);
            }
            Err(source) => {
                return Err(ReaderError::PartialRead {
                    path: files[idx].clone(),
                    source: Box::new(source),
                });
            }
        }
    }

    rti::resolve_trace(key, rows)
}
