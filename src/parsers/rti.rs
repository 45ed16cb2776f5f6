//! RTI recorder database reader
//!
//! Recorder databases are SQLite files with one table per topic. Each row
//! carries the sample as a JSON object in `rti_json_sample` and the
//! reception time (ns since Unix epoch) in `SampleInfo_reception_timestamp`.
//! Channels are the top-level keys of the JSON object.

use rusqlite::types::Value as SqlValue;
use rusqlite::{Connection, OpenFlags};
use std::path::{Path, PathBuf};

use super::types::{
    ChannelId, ChannelInfo, LogFormat, LogReader, SeriesValues, TimeSeries, ValueType,
};
use crate::error::{ReaderError, Result};
use crate::merge;
use crate::normalize::infer_value_type;
use crate::settings::ReaderSettings;
use crate::timestamp::{ns_timestamp_to_instant, Instant, JsonTimestamp};

/// Key of the embedded timestamp object inside a JSON sample
pub const JSON_TIMESTAMP_KEY: &str = "timestamp";

/// Column names used to locate samples in a recorder table
#[derive(Clone, Debug)]
pub struct RtiColumns {
    pub json: String,
    pub reception: String,
}

impl Default for RtiColumns {
    fn default() -> Self {
        Self::from(&ReaderSettings::default())
    }
}

impl From<&ReaderSettings> for RtiColumns {
    fn from(settings: &ReaderSettings) -> Self {
        Self {
            json: settings.json_column.clone(),
            reception: settings.reception_column.clone(),
        }
    }
}

/// One raw row of a channel trace, before timestamps are resolved
#[derive(Clone, Debug, PartialEq)]
pub struct TraceRow {
    /// JSON text of `$.timestamp`, if present
    pub json_timestamp: Option<String>,
    pub value: SqlValue,
    pub reception_ns: Option<i64>,
}

/// Open a recorder database read-only
pub fn open_database(path: &Path) -> Result<Connection> {
    let conn = Connection::open_with_flags(
        path,
        OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
    )?;
    Ok(conn)
}

/// Quote an identifier for interpolation into SQL
fn quote_ident(name: &str) -> String {
    format!("\"{}\"", name.replace('"', "\"\""))
}

/// Names of all base tables, in catalog order
pub fn list_tables(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY rowid")?;
    let names = stmt
        .query_map([], |row| row.get::<_, String>(0))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(names)
}

/// Column names of a table
pub fn table_columns(conn: &Connection, table: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(&format!("PRAGMA table_info({})", quote_ident(table)))?;
    let columns = stmt
        .query_map([], |row| row.get::<_, String>(1))?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(columns)
}

/// Columns of `table`, which must exist and carry the JSON sample column
fn sample_table_columns(conn: &Connection, table: &str, json_column: &str) -> Result<Vec<String>> {
    let columns = table_columns(conn, table)?;
    if columns.is_empty() {
        return Err(ReaderError::not_found(format!("table '{}'", table)));
    }
    if !columns.iter().any(|c| c == json_column) {
        return Err(ReaderError::not_found(format!(
            "column '{}' in table '{}'",
            json_column, table
        )));
    }
    Ok(columns)
}

/// Tables that have a column named exactly `column` (case-sensitive)
pub fn list_tables_with_column(conn: &Connection, column: &str) -> Result<Vec<String>> {
    let mut matching = Vec::new();
    for table in list_tables(conn)? {
        if table_columns(conn, &table)?.iter().any(|c| c == column) {
            matching.push(table);
        }
    }
    Ok(matching)
}

/// Whether at least one row of `table` holds a usable JSON sample
pub fn validate_has_sample(conn: &Connection, table: &str, json_column: &str) -> Result<bool> {
    let col = quote_ident(json_column);
    let sql = format!(
        "SELECT 1 FROM {table} WHERE json_valid({col}) \
         AND json_extract({col}, '$') IS NOT NULL \
         AND json_extract({col}, '$') != '' LIMIT 1",
        table = quote_ident(table),
        col = col
    );
    let mut stmt = conn.prepare(&sql)?;
    Ok(stmt.exists([])?)
}

/// Tables that carry the JSON column and at least one usable sample
pub fn discover_groups(conn: &Connection, columns: &RtiColumns) -> Result<Vec<String>> {
    let mut groups = Vec::new();
    for table in list_tables_with_column(conn, &columns.json)? {
        if validate_has_sample(conn, &table, &columns.json)? {
            groups.push(table);
        } else {
            tracing::debug!("Skipping table '{}': no usable JSON samples", table);
        }
    }
    Ok(groups)
}

/// Infer channel keys and types from a single sample object.
///
/// Keys whose type cannot be inferred (null, nested objects, arrays) are skipped.
pub fn infer_sample_types(
    sample: &serde_json::Map<String, serde_json::Value>,
) -> Vec<(String, ValueType)> {
    sample
        .iter()
        .filter_map(|(key, value)| match infer_value_type(value) {
            Some(t) => Some((key.clone(), t)),
            None => {
                tracing::debug!(
                    "Cannot infer a type for key '{}' from sample value {}",
                    key,
                    value
                );
                None
            }
        })
        .collect()
}

/// Infer the channels of a table from its first row.
///
/// Only one row is inspected, so a sparse first sample may hide keys or
/// mistype them.
pub fn infer_channels(
    conn: &Connection,
    table: &str,
    json_column: &str,
) -> Result<Vec<(String, ValueType)>> {
    sample_table_columns(conn, table, json_column)?;
    let sql = format!(
        "SELECT {col} FROM {table} LIMIT 1",
        col = quote_ident(json_column),
        table = quote_ident(table)
    );
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;

    let raw: Option<String> = match rows.next()? {
        Some(row) => row.get(0)?,
        None => None,
    };
    let Some(raw) = raw else {
        tracing::warn!("Table '{}' has no sample row to infer channels from", table);
        return Ok(Vec::new());
    };

    match serde_json::from_str::<serde_json::Value>(&raw)? {
        serde_json::Value::Object(map) => Ok(infer_sample_types(&map)),
        other => Err(ReaderError::format(format!(
            "sample in table '{}' is not a JSON object: {}",
            table, other
        ))),
    }
}

/// Fetch the raw rows of one channel, without resolving timestamps
pub fn fetch_trace_rows(
    conn: &Connection,
    table: &str,
    channel: &str,
    columns: &RtiColumns,
) -> Result<Vec<TraceRow>> {
    let table_cols = sample_table_columns(conn, table, &columns.json)?;
    let reception = if table_cols.iter().any(|c| *c == columns.reception) {
        format!("t.{}", quote_ident(&columns.reception))
    } else {
        "NULL".to_string()
    };

    // Keys are matched through json_each so any key text is accepted
    let col = quote_ident(&columns.json);
    let sql = format!(
        "SELECT json_extract(t.{col}, '$.{ts}'), j.value, {reception} \
         FROM {table} AS t, json_each(t.{col}) AS j \
         WHERE j.key = ?1 AND j.value IS NOT NULL",
        col = col,
        ts = JSON_TIMESTAMP_KEY,
        reception = reception,
        table = quote_ident(table)
    );

    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([channel], |row| {
            Ok(TraceRow {
                json_timestamp: match row.get::<_, SqlValue>(0)? {
                    SqlValue::Null => None,
                    SqlValue::Text(t) => Some(t),
                    SqlValue::Integer(i) => Some(i.to_string()),
                    SqlValue::Real(r) => Some(r.to_string()),
                    SqlValue::Blob(b) => Some(String::from_utf8_lossy(&b).into_owned()),
                },
                value: row.get::<_, SqlValue>(1)?,
                reception_ns: reception_to_ns(row.get::<_, SqlValue>(2)?),
            })
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;

    tracing::debug!(
        "Fetched {} rows for '{}' from table '{}'",
        rows.len(),
        channel,
        table
    );
    Ok(rows)
}

/// Reception time in ns from whatever storage class the column holds.
///
/// REAL values are truncated; text may be an integer, a float or an RFC 3339 date.
fn reception_to_ns(value: SqlValue) -> Option<i64> {
    match value {
        SqlValue::Integer(ns) => Some(ns),
        SqlValue::Real(ns) if ns.is_finite() => Some(ns as i64),
        SqlValue::Text(text) => {
            let text = text.trim();
            text.parse::<i64>()
                .ok()
                .or_else(|| {
                    text.parse::<f64>()
                        .ok()
                        .filter(|ns| ns.is_finite())
                        .map(|ns| ns as i64)
                })
                .or_else(|| {
                    chrono::DateTime::parse_from_rfc3339(text)
                        .ok()
                        .and_then(|d| d.timestamp_nanos_opt())
                })
        }
        _ => None,
    }
}

fn parse_json_timestamp(text: &str) -> Result<Instant> {
    serde_json::from_str::<JsonTimestamp>(text)?.to_instant()
}

/// Resolve timestamps of raw rows and build the canonical series.
///
/// When any row carries a JSON timestamp, JSON timestamps are used (rows
/// without one fall back to their reception timestamp); otherwise the
/// reception timestamp is used for every row. Rows with neither are dropped.
pub fn resolve_trace(name: &str, rows: Vec<TraceRow>) -> Result<TimeSeries> {
    let use_json = rows.iter().any(|r| r.json_timestamp.is_some());

    let mut times = Vec::with_capacity(rows.len());
    let mut values = Vec::with_capacity(rows.len());
    let mut dropped = 0usize;

    for row in rows {
        let instant = match (use_json, row.json_timestamp.as_deref(), row.reception_ns) {
            (true, Some(ts), _) => Some(parse_json_timestamp(ts)?),
            (_, _, Some(ns)) => Some(ns_timestamp_to_instant(ns)),
            _ => None,
        };
        match instant {
            Some(t) => {
                times.push(t);
                values.push(row.value);
            }
            None => dropped += 1,
        }
    }

    if dropped > 0 {
        tracing::warn!("Dropped {} rows of '{}' without any timestamp", dropped, name);
    }

    TimeSeries::from_samples(name, times, sql_values_to_series(values))
}

/// Pick the series type for a column of SQL values.
///
/// All numeric → float; all "true"/"false" text → bool; anything else → text.
fn sql_values_to_series(values: Vec<SqlValue>) -> SeriesValues {
    let numeric = values
        .iter()
        .all(|v| matches!(v, SqlValue::Integer(_) | SqlValue::Real(_)));
    if numeric {
        return SeriesValues::Float(
            values
                .iter()
                .map(|v| match v {
                    SqlValue::Integer(i) => *i as f64,
                    SqlValue::Real(r) => *r,
                    _ => f64::NAN,
                })
                .collect(),
        );
    }

    let as_bool = |v: &SqlValue| match v {
        SqlValue::Text(t) if t.eq_ignore_ascii_case("true") => Some(true),
        SqlValue::Text(t) if t.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    };
    if let Some(bools) = values.iter().map(as_bool).collect::<Option<Vec<bool>>>() {
        return SeriesValues::Bool(bools);
    }

    SeriesValues::Text(
        values
            .into_iter()
            .map(|v| match v {
                SqlValue::Text(t) => t,
                SqlValue::Integer(i) => i.to_string(),
                SqlValue::Real(r) => r.to_string(),
                SqlValue::Blob(b) => String::from_utf8_lossy(&b).into_owned(),
                SqlValue::Null => String::new(),
            })
            .collect(),
    )
}

/// Read one channel of one table as a canonical series
pub fn read_channel_trace(
    conn: &Connection,
    table: &str,
    channel: &str,
    columns: &RtiColumns,
) -> Result<TimeSeries> {
    let rows = fetch_trace_rows(conn, table, channel, columns)?;
    resolve_trace(channel, rows)
}

/// Detect a SQLite database by its header magic
pub fn detect(data: &[u8]) -> bool {
    data.len() >= 16 && &data[..16] == b"SQLite format 3\0"
}

/// [`LogReader`] over one or more shards of the same recording.
///
/// Discovery uses the first shard; channel reads merge every shard.
#[derive(Clone, Debug)]
pub struct RtiReader {
    shards: Vec<PathBuf>,
    settings: ReaderSettings,
}

impl RtiReader {
    pub fn new(shards: Vec<PathBuf>, settings: ReaderSettings) -> Result<Self> {
        if shards.is_empty() {
            return Err(ReaderError::not_found("no database files given"));
        }
        Ok(Self { shards, settings })
    }

    pub fn shards(&self) -> &[PathBuf] {
        &self.shards
    }

    fn primary(&self) -> Result<Connection> {
        open_database(&self.shards[0])
    }
}

impl LogReader for RtiReader {
    fn format(&self) -> LogFormat {
        LogFormat::RtiSqlite
    }

    fn list_groups(&self) -> Result<Vec<String>> {
        let conn = self.primary()?;
        let groups = discover_groups(&conn, &RtiColumns::from(&self.settings))?;
        tracing::info!(
            "Found {} sample tables in {}",
            groups.len(),
            self.shards[0].display()
        );
        Ok(groups)
    }

    fn list_channels(&self, group: &str) -> Result<Vec<ChannelInfo>> {
        let conn = self.primary()?;
        let channels = infer_channels(&conn, group, &self.settings.json_column)?;
        Ok(channels
            .into_iter()
            .map(|(key, value_type)| ChannelInfo {
                id: ChannelId::Key(key.clone()),
                name: key,
                description: None,
                value_type: Some(value_type),
            })
            .collect())
    }

    fn channel_series(&self, group: &str, channel: &ChannelId) -> Result<TimeSeries> {
        let key = channel.as_key();
        if self.shards.len() == 1 {
            let conn = self.primary()?;
            read_channel_trace(&conn, group, &key, &RtiColumns::from(&self.settings))
        } else {
            merge::merge_channel(&self.shards, group, &key, &self.settings)
        }
    }
}
