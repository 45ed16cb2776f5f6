//! Reader settings persistence.
//!
//! This module handles loading and saving the options that change how log
//! files are decoded (time channel encoding, merge fan-out, chain following).

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Column holding the JSON sample in RTI recorder tables
pub const DEFAULT_JSON_COLUMN: &str = "rti_json_sample";

/// Column holding the integer reception timestamp (ns since Unix epoch)
pub const DEFAULT_RECEPTION_COLUMN: &str = "SampleInfo_reception_timestamp";

/// Upper bound on concurrent shard reads during a merge
pub const DEFAULT_MAX_MERGE_WORKERS: usize = 100;

/// How channel 0 of a TDM group encodes its timestamps
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TdmTimeEncoding {
    /// Seconds counted from year zero (older loggers)
    #[default]
    ZeroEpoch,
    /// Seconds since the Unix epoch (newer loggers)
    UnixSeconds,
}

/// Settings that persist across sessions
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReaderSettings {
    /// Settings file version for migration support
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub tdm_time_encoding: TdmTimeEncoding,
    /// Channels always presented as boolean, whatever their values
    #[serde(default)]
    pub forced_boolean_channels: Vec<String>,
    #[serde(default = "default_max_merge_workers")]
    pub max_merge_workers: usize,
    /// Follow the "next file" pointer of PLC segments
    #[serde(default = "default_true")]
    pub follow_plc_chain: bool,
    /// Treat PLC offsets as a running counter continued across segments
    #[serde(default)]
    pub plc_timestamp_continuation: bool,
    #[serde(default = "default_json_column")]
    pub json_column: String,
    #[serde(default = "default_reception_column")]
    pub reception_column: String,
}

fn default_version() -> u32 {
    1
}

fn default_max_merge_workers() -> usize {
    DEFAULT_MAX_MERGE_WORKERS
}

fn default_true() -> bool {
    true
}

fn default_json_column() -> String {
    DEFAULT_JSON_COLUMN.to_string()
}

fn default_reception_column() -> String {
    DEFAULT_RECEPTION_COLUMN.to_string()
}

impl Default for ReaderSettings {
    fn default() -> Self {
        Self {
            version: 1,
            tdm_time_encoding: TdmTimeEncoding::default(),
            forced_boolean_channels: Vec::new(),
            max_merge_workers: DEFAULT_MAX_MERGE_WORKERS,
            follow_plc_chain: true,
            plc_timestamp_continuation: false,
            json_column: default_json_column(),
            reception_column: default_reception_column(),
        }
    }
}

impl ReaderSettings {
    /// Get the config directory path for signal-browser
    pub fn get_config_dir() -> Option<PathBuf> {
        #[cfg(target_os = "macos")]
        {
            dirs::data_dir().map(|p| p.join("SignalBrowser"))
        }
        #[cfg(target_os = "windows")]
        {
            dirs::config_dir().map(|p| p.join("SignalBrowser"))
        }
        #[cfg(not(any(target_os = "macos", target_os = "windows")))]
        {
            dirs::config_dir().map(|p| p.join("signal-browser"))
        }
    }

    /// Get the path to the settings JSON file
    pub fn get_settings_path() -> Option<PathBuf> {
        Self::get_config_dir().map(|p| p.join("settings.json"))
    }

    /// Load settings from the default location
    pub fn load() -> Self {
        match Self::get_settings_path() {
            Some(path) => Self::load_from(&path),
            None => Self::default(),
        }
    }

    /// Load settings from a file, falling back to defaults when it is missing or unreadable
    pub fn load_from(path: &std::path::Path) -> Self {
        if !path.exists() {
            return Self::default();
        }

        match std::fs::read_to_string(path) {
            Ok(content) => serde_json::from_str::<Self>(&content)
                .map(Self::sanitized)
                .unwrap_or_else(|e| {
                    tracing::warn!("Ignoring unreadable settings {}: {}", path.display(), e);
                    Self::default()
                }),
            Err(_) => Self::default(),
        }
    }

    /// Save settings to the default location
    pub fn save(&self) -> Result<(), String> {
        let path = Self::get_settings_path()
            .ok_or_else(|| "Could not determine config directory".to_string())?;
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &std::path::Path) -> Result<(), String> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| format!("Failed to create config directory: {}", e))?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| format!("Failed to serialize settings: {}", e))?;

        std::fs::write(path, content)
            .map_err(|e| format!("Failed to write settings file: {}", e))?;

        Ok(())
    }

    /// Whether `channel` is on the forced-boolean list
    pub fn is_forced_boolean(&self, channel: &str) -> bool {
        self.forced_boolean_channels.iter().any(|c| c == channel)
    }

    fn sanitized(mut self) -> Self {
        if self.max_merge_workers == 0 {
            self.max_merge_workers = 1;
        }
        if self.json_column.is_empty() {
            self.json_column = default_json_column();
        }
        if self.reception_column.is_empty() {
            self.reception_column = default_reception_column();
        }
        self
    }
}
