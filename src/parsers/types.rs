use serde::Serialize;
use std::collections::HashSet;
use strum::{Display, EnumString};

use crate::error::{ReaderError, Result};
use crate::timestamp::Instant;

/// Value type inferred for a channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Display, EnumString)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ValueType {
    Int,
    Float,
    Bool,
    String,
}

impl ValueType {
    /// Whether the channel can be drawn as a line
    pub fn is_plottable(&self) -> bool {
        !matches!(self, ValueType::String)
    }
}

/// How a channel is addressed inside its group
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ChannelId {
    /// Position inside a TDM channel group
    Index(usize),
    /// JSON key (RTI) or column name (PLC)
    Key(String),
}

impl ChannelId {
    /// Interpret a textual channel reference: digits become an index
    pub fn parse(text: &str) -> Self {
        match text.parse::<usize>() {
            Ok(index) => ChannelId::Index(index),
            Err(_) => ChannelId::Key(text.to_string()),
        }
    }

    pub fn as_key(&self) -> String {
        match self {
            ChannelId::Index(i) => i.to_string(),
            ChannelId::Key(k) => k.clone(),
        }
    }
}

impl std::fmt::Display for ChannelId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ChannelId::Index(i) => write!(f, "#{}", i),
            ChannelId::Key(k) => f.write_str(k),
        }
    }
}

/// Channel metadata returned by discovery
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelInfo {
    pub id: ChannelId,
    pub name: String,
    pub description: Option<String>,
    /// `None` for formats that are always numeric (TDM, PLC)
    pub value_type: Option<ValueType>,
}

impl ChannelInfo {
    pub fn numeric(id: ChannelId, name: impl Into<String>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            value_type: None,
        }
    }

    /// Name shown in channel lists, with the description appended when it adds something
    pub fn display_name(&self) -> String {
        match self.description.as_deref().map(str::trim) {
            Some(desc) if !desc.is_empty() && desc != self.name => {
                format!("{} ({})", self.name, desc)
            }
            _ => self.name.clone(),
        }
    }
}

/// Sample storage for one series. A series holds exactly one value type.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(tag = "type", content = "values", rename_all = "lowercase")]
pub enum SeriesValues {
    Float(Vec<f64>),
    Bool(Vec<bool>),
    Text(Vec<String>),
}

impl SeriesValues {
    pub fn len(&self) -> usize {
        match self {
            SeriesValues::Float(v) => v.len(),
            SeriesValues::Bool(v) => v.len(),
            SeriesValues::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn value_type(&self) -> ValueType {
        match self {
            SeriesValues::Float(_) => ValueType::Float,
            SeriesValues::Bool(_) => ValueType::Bool,
            SeriesValues::Text(_) => ValueType::String,
        }
    }

    fn select(&self, indices: &[usize]) -> Self {
        match self {
            SeriesValues::Float(v) => SeriesValues::Float(indices.iter().map(|&i| v[i]).collect()),
            SeriesValues::Bool(v) => SeriesValues::Bool(indices.iter().map(|&i| v[i]).collect()),
            SeriesValues::Text(v) => {
                SeriesValues::Text(indices.iter().map(|&i| v[i].clone()).collect())
            }
        }
    }
}

/// Canonical time series: unique instants in ascending order, one value type
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct TimeSeries {
    pub name: String,
    times: Vec<Instant>,
    values: SeriesValues,
}

impl TimeSeries {
    /// Build a canonical series from samples in any order.
    ///
    /// Duplicate instants keep the sample that appears first in the input;
    /// the survivors are then sorted ascending.
    pub fn from_samples(
        name: impl Into<String>,
        times: Vec<Instant>,
        values: SeriesValues,
    ) -> Result<Self> {
        if times.len() != values.len() {
            return Err(ReaderError::format(format!(
                "series has {} timestamps but {} values",
                times.len(),
                values.len()
            )));
        }

        let keep = canonical_order(&times);
        let series = if keep.len() == times.len() && keep.iter().enumerate().all(|(i, &k)| i == k)
        {
            Self {
                name: name.into(),
                times,
                values,
            }
        } else {
            Self {
                name: name.into(),
                times: keep.iter().map(|&i| times[i]).collect(),
                values: values.select(&keep),
            }
        };
        Ok(series)
    }

    pub fn empty(name: impl Into<String>, value_type: ValueType) -> Self {
        let values = match value_type {
            ValueType::Bool => SeriesValues::Bool(Vec::new()),
            ValueType::String => SeriesValues::Text(Vec::new()),
            ValueType::Int | ValueType::Float => SeriesValues::Float(Vec::new()),
        };
        Self {
            name: name.into(),
            times: Vec::new(),
            values,
        }
    }

    pub fn times(&self) -> &[Instant] {
        &self.times
    }

    pub fn values(&self) -> &SeriesValues {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn value_type(&self) -> ValueType {
        self.values.value_type()
    }

    /// Numeric samples, if this is a float series
    pub fn as_f64(&self) -> Option<&[f64]> {
        match &self.values {
            SeriesValues::Float(v) => Some(v),
            _ => None,
        }
    }

    pub fn first_time(&self) -> Option<Instant> {
        self.times.first().copied()
    }

    pub fn last_time(&self) -> Option<Instant> {
        self.times.last().copied()
    }
}

/// Indices that make `times` canonical: stable sort, then first-of-run dedup.
/// A stable sort keeps input order among equal instants, so the first
/// survivor of each run is the first occurrence in the input.
fn canonical_order(times: &[Instant]) -> Vec<usize> {
    let mut order: Vec<usize> = (0..times.len()).collect();
    order.sort_by_key(|&i| times[i]);
    order.dedup_by_key(|i| times[*i]);
    order
}

/// Named columns sharing one time index (one PLC segment or a whole chain)
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Frame {
    pub times: Vec<Instant>,
    pub columns: Vec<FrameColumn>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct FrameColumn {
    pub name: String,
    pub values: Vec<f64>,
}

impl Frame {
    pub fn len(&self) -> usize {
        self.times.len()
    }

    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(|c| c.name.clone()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&FrameColumn> {
        self.columns.iter().find(|c| c.name == name)
    }

    /// Append `other` below this frame, dropping rows whose instant is already present.
    ///
    /// Columns are matched by name; a column missing on either side is padded with NaN.
    pub fn append_first_wins(&mut self, other: Frame) {
        let mut seen: HashSet<Instant> = self.times.iter().copied().collect();
        let keep: Vec<usize> = other
            .times
            .iter()
            .enumerate()
            .filter(|(_, t)| seen.insert(**t))
            .map(|(i, _)| i)
            .collect();

        let existing_rows = self.times.len();
        for column in &other.columns {
            if self.column(&column.name).is_none() {
                self.columns.push(FrameColumn {
                    name: column.name.clone(),
                    values: vec![f64::NAN; existing_rows],
                });
            }
        }

        for column in &mut self.columns {
            match other.columns.iter().find(|c| c.name == column.name) {
                Some(src) => column.values.extend(
                    keep.iter()
                        .map(|&i| src.values.get(i).copied().unwrap_or(f64::NAN)),
                ),
                None => column
                    .values
                    .extend(std::iter::repeat(f64::NAN).take(keep.len())),
            }
        }
        self.times.extend(keep.iter().map(|&i| other.times[i]));
    }

    /// Stable sort by instant; of rows sharing an instant only the first is kept
    pub fn sort_by_time(&mut self) {
        let order = canonical_order(&self.times);
        self.times = order.iter().map(|&i| self.times[i]).collect();
        for column in &mut self.columns {
            column.values = order
                .iter()
                .map(|&i| column.values.get(i).copied().unwrap_or(f64::NAN))
                .collect();
        }
    }

    /// Project one column into a canonical series
    pub fn series(&self, name: &str) -> Result<TimeSeries> {
        let column = self
            .column(name)
            .ok_or_else(|| ReaderError::not_found(format!("channel '{}'", name)))?;
        TimeSeries::from_samples(
            name,
            self.times.clone(),
            SeriesValues::Float(column.values.clone()),
        )
    }
}

/// Supported log formats
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize)]
pub enum LogFormat {
    Tdm,
    RtiSqlite,
    PlcBinary,
}

impl LogFormat {
    pub fn name(&self) -> &'static str {
        match self {
            LogFormat::Tdm => "TDM",
            LogFormat::RtiSqlite => "RTI SQLite",
            LogFormat::PlcBinary => "PLC binary",
        }
    }
}

/// Read access to one log source (a file, a shard set or a segment chain).
///
/// Implementations reopen their files on every call and hold no handles
/// between calls, so a reader may be shared across threads freely.
pub trait LogReader: Send + Sync {
    fn format(&self) -> LogFormat;

    /// Group labels in source order
    fn list_groups(&self) -> Result<Vec<String>>;

    /// Channels of one group, in source order
    fn list_channels(&self, group: &str) -> Result<Vec<ChannelInfo>>;

    /// Canonical series for one channel
    fn channel_series(&self, group: &str, channel: &ChannelId) -> Result<TimeSeries>;

    /// Resolve a user-typed channel reference.
    ///
    /// A channel whose name matches `text` exactly wins; otherwise digits
    /// address a channel by position.
    fn resolve_channel(&self, group: &str, text: &str) -> Result<ChannelId> {
        let channels = self.list_channels(group)?;
        if let Some(info) = channels.iter().find(|c| c.name == text) {
            return Ok(info.id.clone());
        }
        match ChannelId::parse(text) {
            ChannelId::Index(i) => channels
                .get(i)
                .map(|c| c.id.clone())
                .ok_or_else(|| ReaderError::not_found(format!("channel #{} in '{}'", i, group))),
            key => Ok(key),
        }
    }
}
