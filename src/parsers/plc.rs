//! PLC binary segment reader
//!
//! A PLC logger writes fixed-size segments, each naming its predecessor and
//! successor file, so one recording is a chain of segments in one directory.
//! Segments may be stored plain or as the first entry of a zip archive.
//!
//! Segment layout (all little-endian):
//!
//! | field            | type                          |
//! |------------------|-------------------------------|
//! | sample count N   | u32                           |
//! | version          | u32                           |
//! | anchor           | f64 OLE date                  |
//! | offsets          | N × f32 seconds               |
//! | channel count C  | u32                           |
//! | previous file    | string                        |
//! | next file        | string                        |
//! | C channels       | string name, then N × f32     |
//!
//! Strings are a u32 byte length followed by UTF-8 bytes.

use rayon::prelude::*;
use std::collections::HashSet;
use std::fs::File;
use std::io::{BufReader, Cursor, Read};
use std::path::{Path, PathBuf};

use super::types::{
    ChannelId, ChannelInfo, Frame, FrameColumn, LogFormat, LogReader, TimeSeries,
};
use crate::error::{ReaderError, Result};
use crate::settings::ReaderSettings;
use crate::timestamp::{ole_date_to_instant, seconds_to_delta, Instant};

const ZIP_MAGIC: &[u8; 4] = b"PK\x03\x04";

/// Largest channel count accepted in a segment header
const MAX_CHANNELS: u32 = 4096;

/// Largest string accepted for file and channel names
const MAX_STRING_LEN: u32 = 4096;

/// Largest sample count accepted in a segment header
const MAX_SAMPLES: u32 = 1 << 26;

/// Where the offsets of a segment are counted from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeBase {
    /// The segment's own anchor date
    Anchor,
    /// The last instant of the previous segment
    Continue(Instant),
}

/// One decoded segment
#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub version: u32,
    pub frame: Frame,
    pub prev_file: String,
    pub next_file: String,
    /// Instant of the last sample, before any dedup
    pub last_instant: Option<Instant>,
}

fn truncated(what: &str, e: std::io::Error) -> ReaderError {
    if e.kind() == std::io::ErrorKind::UnexpectedEof {
        ReaderError::format(format!("segment truncated while reading {}", what))
    } else {
        ReaderError::Io(e)
    }
}

fn read_u32<R: Read>(reader: &mut R, what: &str) -> Result<u32> {
    let mut buf = [0u8; 4];
    reader.read_exact(&mut buf).map_err(|e| truncated(what, e))?;
    Ok(u32::from_le_bytes(buf))
}

fn read_f64<R: Read>(reader: &mut R, what: &str) -> Result<f64> {
    let mut buf = [0u8; 8];
    reader.read_exact(&mut buf).map_err(|e| truncated(what, e))?;
    Ok(f64::from_le_bytes(buf))
}

fn read_f32_array<R: Read>(reader: &mut R, count: usize, what: &str) -> Result<Vec<f32>> {
    let mut bytes = vec![0u8; count * 4];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| truncated(what, e))?;
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

fn read_string<R: Read>(reader: &mut R, what: &str) -> Result<String> {
    let len = read_u32(reader, what)?;
    if len > MAX_STRING_LEN {
        return Err(ReaderError::format(format!(
            "{} length {} exceeds limit of {}",
            what, len, MAX_STRING_LEN
        )));
    }
    let mut bytes = vec![0u8; len as usize];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| truncated(what, e))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Decode one segment.
pub fn read_segment<R: Read>(reader: &mut R, time_base: TimeBase) -> Result<Segment> {
    let sample_count = read_u32(reader, "sample count")?;
    if sample_count > MAX_SAMPLES {
        return Err(ReaderError::format(format!(
            "sample count {} exceeds limit of {}",
            sample_count, MAX_SAMPLES
        )));
    }
    let version = read_u32(reader, "version")?;
    let anchor = read_f64(reader, "anchor")?;
    let offsets = read_f32_array(reader, sample_count as usize, "time offsets")?;

    let base = match time_base {
        TimeBase::Anchor => ole_date_to_instant(anchor)?,
        TimeBase::Continue(last) => last,
    };
    let times = offsets
        .iter()
        .map(|&offset| {
            let delta = seconds_to_delta(offset as f64)?;
            base.checked_add_signed(delta).ok_or_else(|| {
                ReaderError::InvalidTimestamp(format!("offset {} s overflows", offset))
            })
        })
        .collect::<Result<Vec<Instant>>>()?;

    let channel_count = read_u32(reader, "channel count")?;
    if channel_count > MAX_CHANNELS {
        return Err(ReaderError::format(format!(
            "channel count {} exceeds limit of {}",
            channel_count, MAX_CHANNELS
        )));
    }
    let prev_file = read_string(reader, "previous file name")?;
    let next_file = read_string(reader, "next file name")?;

    let mut columns = Vec::with_capacity(channel_count as usize);
    for _ in 0..channel_count {
        let name = read_string(reader, "channel name")?;
        let values = read_f32_array(reader, sample_count as usize, &name)?;
        columns.push(FrameColumn {
            name,
            values: values.into_iter().map(f64::from).collect(),
        });
    }

    let last_instant = times.last().copied();
    Ok(Segment {
        version,
        frame: Frame { times, columns },
        prev_file,
        next_file,
        last_instant,
    })
}

/// Open a segment file for reading; zip archives yield their first entry
pub fn open_segment(path: &Path) -> Result<Box<dyn Read + Send>> {
    let mut file = File::open(path)?;
    let mut magic = [0u8; 4];
    let n = file.read(&mut magic)?;
    drop(file);

    if n == 4 && &magic == ZIP_MAGIC {
        let mut archive = zip::ZipArchive::new(File::open(path)?)?;
        if archive.len() == 0 {
            return Err(ReaderError::format(format!(
                "zip archive {} has no entries",
                path.display()
            )));
        }
        let mut entry = archive.by_index(0)?;
        tracing::debug!("Reading segment '{}' from {}", entry.name(), path.display());
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        Ok(Box::new(Cursor::new(bytes)))
    } else {
        Ok(Box::new(BufReader::new(File::open(path)?)))
    }
}

/// Read and decode the segment at `path`
pub fn read_segment_file(path: &Path, time_base: TimeBase) -> Result<Segment> {
    let mut reader = open_segment(path)?;
    read_segment(&mut reader, time_base)
}

fn identity(path: &Path) -> PathBuf {
    std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf())
}

enum ChainState {
    Reading(PathBuf),
    Done,
}

/// Walks a segment chain through the "next file" pointers.
///
/// Yields each segment with its path. The walk ends when the next name is
/// empty, names no existing sibling file, or names a segment already read.
/// An error is yielded once and ends the walk.
pub struct SegmentChain {
    state: ChainState,
    visited: HashSet<PathBuf>,
    continuation: bool,
    last_instant: Option<Instant>,
}

impl SegmentChain {
    pub fn new(start: impl Into<PathBuf>, continuation: bool) -> Self {
        Self {
            state: ChainState::Reading(start.into()),
            visited: HashSet::new(),
            continuation,
            last_instant: None,
        }
    }

    fn successor(&mut self, current: &Path, next_name: &str) -> ChainState {
        if next_name.is_empty() {
            return ChainState::Done;
        }
        let next = match current.parent() {
            Some(dir) => dir.join(next_name),
            None => PathBuf::from(next_name),
        };
        if !next.is_file() {
            tracing::debug!("Chain ends at {}: '{}' not found", current.display(), next_name);
            return ChainState::Done;
        }
        if self.visited.contains(&identity(&next)) {
            tracing::warn!(
                "Chain loop at {}: '{}' was already read",
                current.display(),
                next_name
            );
            return ChainState::Done;
        }
        ChainState::Reading(next)
    }
}

impl Iterator for SegmentChain {
    type Item = Result<(PathBuf, Segment)>;

    fn next(&mut self) -> Option<Self::Item> {
        let path = match std::mem::replace(&mut self.state, ChainState::Done) {
            ChainState::Reading(path) => path,
            ChainState::Done => return None,
        };
        self.visited.insert(identity(&path));

        let time_base = match (self.continuation, self.last_instant) {
            (true, Some(last)) => TimeBase::Continue(last),
            _ => TimeBase::Anchor,
        };

        match read_segment_file(&path, time_base) {
            Ok(segment) => {
                if segment.last_instant.is_some() {
                    self.last_instant = segment.last_instant;
                }
                self.state = self.successor(&path, &segment.next_file);
                Some(Ok((path, segment)))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Read a whole chain starting at `path` into one frame
pub fn read_chain(path: &Path, continuation: bool) -> Result<Frame> {
    let mut frame = Frame::default();
    let mut segments = 0usize;
    for item in SegmentChain::new(path, continuation) {
        let (segment_path, segment) = item?;
        tracing::debug!(
            "Segment {} (v{}): {} samples",
            segment_path.display(),
            segment.version,
            segment.frame.len()
        );
        frame.append_first_wins(segment.frame);
        segments += 1;
    }
    frame.sort_by_time();
    tracing::info!(
        "Read PLC chain from {}: {} segments, {} samples",
        path.display(),
        segments,
        frame.len()
    );
    Ok(frame)
}

fn concat_frames(frames: Vec<Frame>) -> Frame {
    let mut merged = Frame::default();
    for frame in frames {
        merged.append_first_wins(frame);
    }
    merged.sort_by_time();
    merged
}

/// Read independent chains in parallel and combine them in list order
pub fn read_multiple_chains(files: &[PathBuf], continuation: bool) -> Result<Frame> {
    let frames = files
        .par_iter()
        .map(|path| read_chain(path, continuation))
        .collect::<Result<Vec<Frame>>>()?;
    Ok(concat_frames(frames))
}

/// Read each file as a single segment, ignoring chain pointers
pub fn read_segments(files: &[PathBuf]) -> Result<Frame> {
    let frames = files
        .par_iter()
        .map(|path| read_segment_file(path, TimeBase::Anchor).map(|s| s.frame))
        .collect::<Result<Vec<Frame>>>()?;
    Ok(concat_frames(frames))
}

/// Detect a PLC segment: a zip archive, or a header with a plausible anchor date
pub fn detect(data: &[u8]) -> bool {
    if data.len() >= 4 && &data[..4] == ZIP_MAGIC {
        return true;
    }
    if data.len() < 16 {
        return false;
    }
    let count = u32::from_le_bytes([data[0], data[1], data[2], data[3]]);
    let mut anchor = [0u8; 8];
    anchor.copy_from_slice(&data[8..16]);
    let anchor = f64::from_le_bytes(anchor);
    count <= MAX_SAMPLES && anchor.is_finite() && (1.0..2_958_466.0).contains(&anchor)
}

/// [`LogReader`] over PLC segment files.
///
/// Exposes one group named after the first file; its channels are the frame
/// columns. Every call re-reads the files.
#[derive(Clone, Debug)]
pub struct PlcReader {
    files: Vec<PathBuf>,
    follow_chain: bool,
    continuation: bool,
}

impl PlcReader {
    pub fn new(files: Vec<PathBuf>, settings: &ReaderSettings) -> Result<Self> {
        if files.is_empty() {
            return Err(ReaderError::not_found("no segment files given"));
        }
        Ok(Self {
            files,
            follow_chain: settings.follow_plc_chain,
            continuation: settings.plc_timestamp_continuation,
        })
    }

    fn group_name(&self) -> String {
        self.files[0]
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "PLC".to_string())
    }

    fn check_group(&self, group: &str) -> Result<()> {
        if group == self.group_name() {
            Ok(())
        } else {
            Err(ReaderError::not_found(format!("group '{}'", group)))
        }
    }

    /// Read all files into one frame, honouring the chain settings
    pub fn load_frame(&self) -> Result<Frame> {
        if self.follow_chain {
            read_multiple_chains(&self.files, self.continuation)
        } else {
            read_segments(&self.files)
        }
    }
}

impl LogReader for PlcReader {
    fn format(&self) -> LogFormat {
        LogFormat::PlcBinary
    }

    fn list_groups(&self) -> Result<Vec<String>> {
        Ok(vec![self.group_name()])
    }

    fn list_channels(&self, group: &str) -> Result<Vec<ChannelInfo>> {
        self.check_group(group)?;
        let frame = self.load_frame()?;
        Ok(frame
            .columns
            .iter()
            .map(|c| ChannelInfo::numeric(ChannelId::Key(c.name.clone()), c.name.clone()))
            .collect())
    }

    fn channel_series(&self, group: &str, channel: &ChannelId) -> Result<TimeSeries> {
        self.check_group(group)?;
        let frame = self.load_frame()?;
        match channel {
            ChannelId::Key(name) => frame.series(name),
            ChannelId::Index(i) => {
                let column = frame
                    .columns
                    .get(*i)
                    .ok_or_else(|| ReaderError::not_found(format!("channel #{}", i)))?;
                frame.series(&column.name)
            }
        }
    }
}
