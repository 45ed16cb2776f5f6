//! TDM (.tdm/.tdx) measurement file reader
//!
//! A TDM file is an XML index describing channel groups and channels, paired
//! with a binary payload file (.tdx) holding the raw sample arrays.
//! Only the subset needed for browsing is understood:
//! - `usi:include/file/block` payload descriptors (offset, length, value type)
//! - `tdm_root`, `tdm_channelgroup` and `tdm_channel` with name/description
//! - `localcolumn` and `*_sequence` links from channels to payload blocks
//!
//! Channel 0 of every group carries the group's timestamps.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use std::collections::HashMap;
use std::fs::File;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use super::types::{ChannelId, ChannelInfo, LogFormat, LogReader, SeriesValues, TimeSeries};
use crate::error::{ReaderError, Result};
use crate::settings::TdmTimeEncoding;
use crate::timestamp::{unix_seconds_to_instant, zero_epoch_to_instant, Instant};

/// Payload value types (`valueType` attribute of a block)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum TdxType {
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
}

impl TdxType {
    fn from_usi(name: &str) -> Option<Self> {
        match name {
            "eInt8Usi" => Some(Self::I8),
            "eInt16Usi" => Some(Self::I16),
            "eInt32Usi" => Some(Self::I32),
            "eInt64Usi" => Some(Self::I64),
            "eUInt8Usi" => Some(Self::U8),
            "eUInt16Usi" => Some(Self::U16),
            "eUInt32Usi" => Some(Self::U32),
            "eUInt64Usi" => Some(Self::U64),
            "eFloat32Usi" => Some(Self::F32),
            "eFloat64Usi" => Some(Self::F64),
            _ => None,
        }
    }

    fn byte_size(&self) -> usize {
        match self {
            Self::I8 | Self::U8 => 1,
            Self::I16 | Self::U16 => 2,
            Self::I32 | Self::U32 | Self::F32 => 4,
            Self::I64 | Self::U64 | Self::F64 => 8,
        }
    }

    fn decode(&self, bytes: &[u8], little_endian: bool) -> f64 {
        macro_rules! num {
            ($t:ty, $n:expr) => {{
                let mut raw = [0u8; $n];
                raw.copy_from_slice(&bytes[..$n]);
                if little_endian {
                    <$t>::from_le_bytes(raw) as f64
                } else {
                    <$t>::from_be_bytes(raw) as f64
                }
            }};
        }
        match self {
            Self::I8 => bytes[0] as i8 as f64,
            Self::U8 => bytes[0] as f64,
            Self::I16 => num!(i16, 2),
            Self::U16 => num!(u16, 2),
            Self::I32 => num!(i32, 4),
            Self::U32 => num!(u32, 4),
            Self::I64 => num!(i64, 8),
            Self::U64 => num!(u64, 8),
            Self::F32 => num!(f32, 4),
            Self::F64 => num!(f64, 8),
        }
    }
}

/// One payload block inside a .tdx file
#[derive(Clone, Debug)]
struct Block {
    file: String,
    little_endian: bool,
    byte_offset: usize,
    length: usize,
    value_type: TdxType,
    /// Distance between consecutive values when channels are interleaved
    stride: Option<usize>,
}

#[derive(Clone, Debug, Default)]
struct GroupDef {
    name: String,
    channel_ids: Vec<String>,
}

#[derive(Clone, Debug, Default)]
struct ChannelDef {
    name: String,
    description: Option<String>,
    column_ids: Vec<String>,
}

/// Parsed TDM index
#[derive(Debug, Default)]
pub struct TdmIndex {
    base_dir: PathBuf,
    blocks: HashMap<String, Block>,
    group_order: Vec<String>,
    groups: HashMap<String, GroupDef>,
    channels: HashMap<String, ChannelDef>,
    /// localcolumn id -> sequence id
    columns: HashMap<String, String>,
    /// sequence id -> block id
    sequences: HashMap<String, String>,
}

/// Element currently being collected while walking the index
#[derive(Debug)]
enum Collecting {
    Root,
    Group(String),
    Channel(String),
    Column(String),
    Sequence(String),
}

/// Extract the ids of an `#xpointer(id("a") id("b"))` reference list
fn parse_xpointer(text: &str) -> Vec<String> {
    let mut ids = Vec::new();
    let mut rest = text;
    while let Some(start) = rest.find("id(\"") {
        rest = &rest[start + 4..];
        match rest.find("\")") {
            Some(end) => {
                ids.push(rest[..end].to_string());
                rest = &rest[end + 2..];
            }
            None => break,
        }
    }
    ids
}

fn attr(e: &BytesStart, name: &str) -> Result<Option<String>> {
    match e.try_get_attribute(name)? {
        Some(a) => Ok(Some(a.unescape_value()?.into_owned())),
        None => Ok(None),
    }
}

fn required_attr(e: &BytesStart, name: &str) -> Result<String> {
    attr(e, name)?.ok_or_else(|| {
        ReaderError::format(format!(
            "<{}> is missing attribute '{}'",
            String::from_utf8_lossy(e.local_name().as_ref()),
            name
        ))
    })
}

fn parse_usize(value: &str, what: &str) -> Result<usize> {
    value
        .trim()
        .parse::<usize>()
        .map_err(|_| ReaderError::format(format!("invalid {}: '{}'", what, value)))
}

impl TdmIndex {
    /// Open and parse the XML index of a TDM file
    pub fn open(path: &Path) -> Result<Self> {
        let xml = std::fs::read_to_string(path)?;
        let base_dir = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let index = Self::parse(&xml, base_dir)?;

        tracing::info!(
            "Opened TDM index {}: {} groups, {} channels, {} blocks",
            path.display(),
            index.group_order.len(),
            index.channels.len(),
            index.blocks.len()
        );
        Ok(index)
    }

    /// Parse index XML; payload paths are resolved against `base_dir`
    pub fn parse(xml: &str, base_dir: PathBuf) -> Result<Self> {
        let mut index = TdmIndex {
            base_dir,
            ..Default::default()
        };

        let mut reader = Reader::from_str(xml);
        reader.config_mut().trim_text(true);

        let mut current_file: Option<(String, bool)> = None;
        let mut collecting: Option<Collecting> = None;
        let mut field: Option<String> = None;
        let mut text = String::new();
        let mut document_groups: Vec<String> = Vec::new();

        loop {
            match reader.read_event()? {
                Event::Start(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    match name.as_str() {
                        "file" => {
                            let url = required_attr(&e, "url")?;
                            let little = attr(&e, "byteOrder")?
                                .map(|b| b != "bigEndian")
                                .unwrap_or(true);
                            current_file = Some((url, little));
                        }
                        "tdm_root" => collecting = Some(Collecting::Root),
                        "tdm_channelgroup" => {
                            let id = required_attr(&e, "id")?;
                            document_groups.push(id.clone());
                            index.groups.insert(id.clone(), GroupDef::default());
                            collecting = Some(Collecting::Group(id));
                        }
                        "tdm_channel" => {
                            let id = required_attr(&e, "id")?;
                            index.channels.insert(id.clone(), ChannelDef::default());
                            collecting = Some(Collecting::Channel(id));
                        }
                        "localcolumn" => {
                            collecting = Some(Collecting::Column(required_attr(&e, "id")?))
                        }
                        n if n.ends_with("_sequence") => {
                            collecting = Some(Collecting::Sequence(required_attr(&e, "id")?))
                        }
                        "values" => {
                            index.collect_sequence_values(&collecting, &e)?;
                            field = Some(name);
                            text.clear();
                        }
                        _ if collecting.is_some() => {
                            field = Some(name);
                            text.clear();
                        }
                        _ => {}
                    }
                }
                Event::Empty(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    match name.as_str() {
                        "block" => index.add_block(&e, current_file.as_ref())?,
                        "values" => index.collect_sequence_values(&collecting, &e)?,
                        _ => {}
                    }
                }
                Event::Text(e) => {
                    if field.is_some() {
                        text.push_str(&e.unescape()?);
                    }
                }
                Event::CData(e) => {
                    if field.is_some() {
                        text.push_str(&String::from_utf8_lossy(&e));
                    }
                }
                Event::End(e) => {
                    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                    if field.as_deref() == Some(name.as_str()) {
                        index.apply_field(&collecting, &name, &text);
                        field = None;
                        text.clear();
                        continue;
                    }
                    match name.as_str() {
                        "file" => current_file = None,
                        "tdm_root" | "tdm_channelgroup" | "tdm_channel" | "localcolumn" => {
                            collecting = None
                        }
                        n if n.ends_with("_sequence") => collecting = None,
                        _ => {}
                    }
                }
                Event::Eof => break,
                _ => {}
            }
        }

        // Groups not referenced from tdm_root are kept in document order
        for id in document_groups {
            if !index.group_order.contains(&id) {
                index.group_order.push(id);
            }
        }
        index.group_order.retain(|id| index.groups.contains_key(id));

        Ok(index)
    }

    fn add_block(&mut self, e: &BytesStart, file: Option<&(String, bool)>) -> Result<()> {
        let (url, little_endian) = file
            .cloned()
            .ok_or_else(|| ReaderError::format("<block> outside of <file>"))?;
        let id = required_attr(e, "id")?;
        let value_type_name = required_attr(e, "valueType")?;
        let value_type = TdxType::from_usi(&value_type_name).ok_or_else(|| {
            ReaderError::format(format!("unsupported value type '{}'", value_type_name))
        })?;
        let stride = match attr(e, "blockOffset")? {
            Some(v) => Some(parse_usize(&v, "blockOffset")?).filter(|&s| s > 0),
            None => None,
        };

        self.blocks.insert(
            id,
            Block {
                file: url,
                little_endian,
                byte_offset: parse_usize(&required_attr(e, "byteOffset")?, "byteOffset")?,
                length: parse_usize(&required_attr(e, "length")?, "length")?,
                value_type,
                stride,
            },
        );
        Ok(())
    }

    fn collect_sequence_values(
        &mut self,
        collecting: &Option<Collecting>,
        e: &BytesStart,
    ) -> Result<()> {
        if let Some(Collecting::Sequence(id)) = collecting {
            if let Some(block) = attr(e, "external")? {
                self.sequences.insert(id.clone(), block);
            }
        }
        Ok(())
    }

    fn apply_field(&mut self, collecting: &Option<Collecting>, field: &str, text: &str) {
        match (collecting, field) {
            (Some(Collecting::Root), "channelgroups") => self.group_order = parse_xpointer(text),
            (Some(Collecting::Group(id)), "name") => {
                if let Some(g) = self.groups.get_mut(id) {
                    g.name = text.to_string();
                }
            }
            (Some(Collecting::Group(id)), "channels") => {
                if let Some(g) = self.groups.get_mut(id) {
                    g.channel_ids = parse_xpointer(text);
                }
            }
            (Some(Collecting::Channel(id)), "name") => {
                if let Some(c) = self.channels.get_mut(id) {
                    c.name = text.to_string();
                }
            }
            (Some(Collecting::Channel(id)), "description") => {
                if let Some(c) = self.channels.get_mut(id) {
                    c.description = Some(text.to_string()).filter(|d| !d.is_empty());
                }
            }
            (Some(Collecting::Channel(id)), "local_columns") => {
                if let Some(c) = self.channels.get_mut(id) {
                    c.column_ids = parse_xpointer(text);
                }
            }
            (Some(Collecting::Column(id)), "values") => {
                if let Some(seq) = parse_xpointer(text).into_iter().next() {
                    self.columns.insert(id.clone(), seq);
                }
            }
            _ => {}
        }
    }

    /// Raw group names in file order
    pub fn group_names(&self) -> Vec<String> {
        self.group_order
            .iter()
            .filter_map(|id| self.groups.get(id))
            .map(|g| g.name.clone())
            .collect()
    }

    /// Group labels with repeated names disambiguated
    pub fn group_labels(&self) -> Vec<String> {
        label_groups(&self.group_names())
    }

    fn resolve_group(&self, label: &str) -> Result<&GroupDef> {
        let names = self.group_names();
        let position = GroupRef::parse(label)
            .position_in(&names)
            .or_else(|| GroupRef::literal(label).position_in(&names))
            .ok_or_else(|| ReaderError::not_found(format!("group '{}'", label)))?;

        self.group_order
            .get(position)
            .and_then(|id| self.groups.get(id))
            .ok_or_else(|| ReaderError::not_found(format!("group '{}'", label)))
    }

    fn channel_def(&self, group: &GroupDef, index: usize) -> Result<&ChannelDef> {
        group
            .channel_ids
            .get(index)
            .and_then(|id| self.channels.get(id))
            .ok_or_else(|| {
                ReaderError::not_found(format!("channel {} in group '{}'", index, group.name))
            })
    }

    /// Channels of a group, addressed by position
    pub fn channels(&self, group_label: &str) -> Result<Vec<ChannelInfo>> {
        let group = self.resolve_group(group_label)?;
        let mut infos = Vec::with_capacity(group.channel_ids.len());
        for index in 0..group.channel_ids.len() {
            let def = self.channel_def(group, index)?;
            infos.push(ChannelInfo {
                id: ChannelId::Index(index),
                name: def.name.clone(),
                description: def.description.clone(),
                value_type: None,
            });
        }
        Ok(infos)
    }

    fn block_for(&self, channel: &ChannelDef) -> Result<&Block> {
        let block_id = channel
            .column_ids
            .first()
            .and_then(|col| self.columns.get(col))
            .and_then(|seq| self.sequences.get(seq))
            .ok_or_else(|| {
                ReaderError::format(format!("channel '{}' has no payload block", channel.name))
            })?;
        self.blocks
            .get(block_id)
            .ok_or_else(|| ReaderError::format(format!("missing payload block '{}'", block_id)))
    }

    /// Read one channel's samples as f64
    pub fn read_channel(&self, group_label: &str, index: usize) -> Result<(String, Vec<f64>)> {
        let group = self.resolve_group(group_label)?;
        let def = self.channel_def(group, index)?;
        let block = self.block_for(def)?;
        let values = self.read_block(block)?;
        Ok((def.name.clone(), values))
    }

    fn read_block(&self, block: &Block) -> Result<Vec<f64>> {
        if block.length == 0 {
            return Ok(Vec::new());
        }
        let size = block.value_type.byte_size();
        let stride = block.stride.unwrap_or(size);
        let span = (block.length - 1)
            .checked_mul(stride)
            .and_then(|n| n.checked_add(size))
            .ok_or_else(|| ReaderError::format("payload block size overflows"))?;
        let end = block
            .byte_offset
            .checked_add(span)
            .ok_or_else(|| ReaderError::format("payload block offset overflows"))?;

        let path = self.base_dir.join(&block.file);
        let mut file = File::open(&path)?;
        let file_len = file.metadata()?.len();
        if end as u64 > file_len {
            return Err(ReaderError::format(format!(
                "payload block ends at byte {} but {} has only {} bytes",
                end,
                path.display(),
                file_len
            )));
        }

        let mut raw = vec![0u8; span];
        file.seek(SeekFrom::Start(block.byte_offset as u64))?;
        file.read_exact(&mut raw)?;

        Ok((0..block.length)
            .map(|i| {
                let at = i * stride;
                block
                    .value_type
                    .decode(&raw[at..at + size], block.little_endian)
            })
            .collect())
    }
}

/// Reference to one physical group: its name plus which repetition of that name
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroupRef {
    pub name: String,
    /// 0 for the first group carrying `name`, 1 for the second, ...
    pub occurrence: usize,
}

impl GroupRef {
    fn literal(label: &str) -> Self {
        Self {
            name: label.to_string(),
            occurrence: 0,
        }
    }

    /// Invert [`label_groups`]: `"G [1]"` is the second group named `G`
    pub fn parse(label: &str) -> Self {
        if let Some(stripped) = label.strip_suffix(']') {
            if let Some((base, n)) = stripped.rsplit_once(" [") {
                if let Ok(occurrence) = n.parse::<usize>() {
                    if occurrence > 0 {
                        return Self {
                            name: base.to_string(),
                            occurrence,
                        };
                    }
                }
            }
        }
        Self::literal(label)
    }

    fn position_in(&self, names: &[String]) -> Option<usize> {
        names
            .iter()
            .enumerate()
            .filter(|(_, n)| **n == self.name)
            .nth(self.occurrence)
            .map(|(i, _)| i)
    }
}

/// Label group names, suffixing repeats with `" [n]"` (n = prior duplicates of that name)
pub fn label_groups(names: &[String]) -> Vec<String> {
    let mut seen: HashMap<&str, usize> = HashMap::new();
    names
        .iter()
        .map(|name| {
            let count = seen.entry(name.as_str()).or_insert(0);
            let label = if *count == 0 {
                name.clone()
            } else {
                format!("{} [{}]", name, count)
            };
            *count += 1;
            label
        })
        .collect()
}

/// List group labels of a TDM file in file order
pub fn list_groups(path: &Path) -> Result<Vec<String>> {
    Ok(TdmIndex::open(path)?.group_labels())
}

/// List the channels of a group
pub fn list_channels(path: &Path, group: &str) -> Result<Vec<ChannelInfo>> {
    TdmIndex::open(path)?.channels(group)
}

/// Read one channel, timestamped by channel 0 of its group
pub fn channel_series(
    path: &Path,
    group: &str,
    channel_index: usize,
    encoding: TdmTimeEncoding,
) -> Result<TimeSeries> {
    let index = TdmIndex::open(path)?;
    let (_, raw_times) = index.read_channel(group, 0)?;
    let (name, mut values) = index.read_channel(group, channel_index)?;

    let mut times: Vec<Instant> = raw_times
        .iter()
        .map(|&t| match encoding {
            TdmTimeEncoding::ZeroEpoch => zero_epoch_to_instant(t),
            TdmTimeEncoding::UnixSeconds => unix_seconds_to_instant(t),
        })
        .collect::<Result<_>>()?;

    if times.len() != values.len() {
        tracing::warn!(
            "Channel '{}' in group '{}' has {} samples but the time channel has {}; truncating",
            name,
            group,
            values.len(),
            times.len()
        );
        let n = times.len().min(values.len());
        times.truncate(n);
        values.truncate(n);
    }

    tracing::debug!("Read TDM channel '{}': {} samples", name, values.len());
    TimeSeries::from_samples(name, times, SeriesValues::Float(values))
}

/// [`LogReader`] over one TDM file
#[derive(Clone, Debug)]
pub struct TdmReader {
    path: PathBuf,
    encoding: TdmTimeEncoding,
}

impl TdmReader {
    pub fn new(path: impl Into<PathBuf>, encoding: TdmTimeEncoding) -> Self {
        Self {
            path: path.into(),
            encoding,
        }
    }

    /// Detect a TDM index by its XML root element
    pub fn detect(data: &[u8]) -> bool {
        let head = String::from_utf8_lossy(&data[..data.len().min(512)]);
        head.trim_start().starts_with('<') && head.contains("usi:tdm")
    }
}

impl LogReader for TdmReader {
    fn format(&self) -> LogFormat {
        LogFormat::Tdm
    }

    fn list_groups(&self) -> Result<Vec<String>> {
        list_groups(&self.path)
    }

    fn list_channels(&self, group: &str) -> Result<Vec<ChannelInfo>> {
        list_channels(&self.path, group)
    }

    fn channel_series(&self, group: &str, channel: &ChannelId) -> Result<TimeSeries> {
        let index = match channel {
            ChannelId::Index(i) => *i,
            ChannelId::Key(k) => {
                let channels = list_channels(&self.path, group)?;
                channels
                    .iter()
                    .position(|c| &c.name == k)
                    .ok_or_else(|| ReaderError::not_found(format!("channel '{}'", k)))?
            }
        };
        channel_series(&self.path, group, index, self.encoding)
    }
}
