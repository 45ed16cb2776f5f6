pub mod plc;
pub mod rti;
pub mod tdm;
pub mod types;

use std::io::Read;
use std::path::{Path, PathBuf};

pub use plc::PlcReader;
pub use rti::RtiReader;
pub use tdm::{GroupRef, TdmReader};
pub use types::{
    ChannelId, ChannelInfo, Frame, LogFormat, LogReader, SeriesValues, TimeSeries, ValueType,
};

use crate::error::{ReaderError, Result};
use crate::settings::ReaderSettings;

const SNIFF_LEN: usize = 512;

impl LogFormat {
    /// Detect the format of a file from its first bytes, falling back to the extension
    pub fn detect(path: &Path) -> Result<LogFormat> {
        let mut head = Vec::with_capacity(SNIFF_LEN);
        std::fs::File::open(path)?
            .take(SNIFF_LEN as u64)
            .read_to_end(&mut head)?;

        if rti::detect(&head) {
            return Ok(LogFormat::RtiSqlite);
        }
        if TdmReader::detect(&head) {
            return Ok(LogFormat::Tdm);
        }

        let ext = path
            .extension()
            .map(|e| e.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "tdm" => Ok(LogFormat::Tdm),
            "db" | "sqlite" | "sqlite3" => Ok(LogFormat::RtiSqlite),
            _ if plc::detect(&head) => Ok(LogFormat::PlcBinary),
            "bin" | "plc" | "zip" => Ok(LogFormat::PlcBinary),
            _ => Err(ReaderError::format(format!(
                "unrecognised log format: {}",
                path.display()
            ))),
        }
    }
}

/// Open a reader over `paths`.
///
/// All paths must share one format. Several SQLite files are treated as
/// shards of one recording; several PLC files as independent chains. TDM
/// takes exactly one file.
pub fn open_reader(paths: &[PathBuf], settings: &ReaderSettings) -> Result<Box<dyn LogReader>> {
    let first = paths
        .first()
        .ok_or_else(|| ReaderError::not_found("no log files given"))?;
    if !first.is_file() {
        return Err(ReaderError::not_found(format!("file {}", first.display())));
    }
    let format = LogFormat::detect(first)?;

    for path in &paths[1..] {
        let other = LogFormat::detect(path)?;
        if other != format {
            return Err(ReaderError::format(format!(
                "{} is {} but {} is {}",
                path.display(),
                other.name(),
                first.display(),
                format.name()
            )));
        }
    }

    tracing::info!("Opening {} file(s) as {}", paths.len(), format.name());

    match format {
        LogFormat::Tdm => {
            if paths.len() > 1 {
                return Err(ReaderError::format("TDM reader takes a single file"));
            }
            Ok(Box::new(TdmReader::new(first.clone(), settings.tdm_time_encoding)))
        }
        LogFormat::RtiSqlite => Ok(Box::new(RtiReader::new(paths.to_vec(), settings.clone())?)),
        LogFormat::PlcBinary => Ok(Box::new(PlcReader::new(paths.to_vec(), settings)?)),
    }
}
