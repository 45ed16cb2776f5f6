//! Channel selection state.
//!
//! The registry records which channels the user has checked for plotting,
//! with their display properties. It is owned by the caller; readers never
//! touch it.

use serde::Serialize;
use std::collections::HashSet;

use crate::parsers::types::{ChannelId, ChannelInfo, ValueType};
use crate::units::UnitConversion;

// ============================================================================
// Constants
// ============================================================================

/// Maximum number of channels that can be checked simultaneously
pub const MAX_CHANNELS: usize = 16;

/// Color palette for chart lines
pub const CHART_COLORS: &[[u8; 3]] = &[
    [113, 120, 78],  // Olive green
    [191, 78, 48],   // Rust orange
    [71, 108, 155],  // Blue
    [159, 166, 119], // Sage green
    [253, 193, 73],  // Amber
    [135, 30, 28],   // Dark red
    [100, 149, 237], // Cornflower blue
    [255, 127, 80],  // Coral
    [144, 238, 144], // Light green
    [153, 153, 153], // Gray
];

// ============================================================================
// Core Types
// ============================================================================

/// Identifies one channel across all open sources
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize)]
pub struct ChannelKey {
    /// Source label (usually the file name)
    pub source: String,
    /// Group label as returned by the reader
    pub group: String,
    pub channel: ChannelId,
}

impl ChannelKey {
    pub fn new(source: impl Into<String>, group: impl Into<String>, channel: ChannelId) -> Self {
        Self {
            source: source.into(),
            group: group.into(),
            channel,
        }
    }
}

/// Y axis a trace is drawn against
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub enum Axis {
    #[default]
    Left,
    Right,
}

/// A channel checked for plotting
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ChannelEntry {
    pub key: ChannelKey,
    pub display_name: String,
    pub value_type: Option<ValueType>,
    pub conversion: UnitConversion,
    /// Index into [`CHART_COLORS`]
    pub color_index: usize,
    pub axis: Axis,
}

impl ChannelEntry {
    pub fn color(&self) -> [u8; 3] {
        CHART_COLORS[self.color_index % CHART_COLORS.len()]
    }
}

/// Why a channel could not be checked
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CheckError {
    /// The channel's values cannot be drawn as a line
    NotPlottable(ValueType),
    /// [`MAX_CHANNELS`] are already checked
    Full,
}

/// Checked channels, in the order they were checked
#[derive(Clone, Debug, Default)]
pub struct ChannelRegistry {
    entries: Vec<ChannelEntry>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn entries(&self) -> &[ChannelEntry] {
        &self.entries
    }

    pub fn is_checked(&self, key: &ChannelKey) -> bool {
        self.get(key).is_some()
    }

    pub fn get(&self, key: &ChannelKey) -> Option<&ChannelEntry> {
        self.entries.iter().find(|e| e.key == *key)
    }

    /// First palette slot not used by a checked channel
    fn next_color(&self) -> usize {
        let used: HashSet<usize> = self.entries.iter().map(|e| e.color_index).collect();
        (0..CHART_COLORS.len())
            .find(|i| !used.contains(i))
            .unwrap_or(self.entries.len() % CHART_COLORS.len())
    }

    /// Check a channel. Checking an already checked channel returns its entry unchanged.
    pub fn check(
        &mut self,
        key: ChannelKey,
        info: &ChannelInfo,
    ) -> Result<&ChannelEntry, CheckError> {
        if let Some(pos) = self.entries.iter().position(|e| e.key == key) {
            return Ok(&self.entries[pos]);
        }
        if let Some(value_type) = info.value_type {
            if !value_type.is_plottable() {
                return Err(CheckError::NotPlottable(value_type));
            }
        }
        if self.entries.len() >= MAX_CHANNELS {
            return Err(CheckError::Full);
        }

        let color_index = self.next_color();
        self.entries.push(ChannelEntry {
            key,
            display_name: info.display_name(),
            value_type: info.value_type,
            conversion: UnitConversion::identity(),
            color_index,
            axis: Axis::default(),
        });
        let last = self.entries.len() - 1;
        Ok(&self.entries[last])
    }

    /// Uncheck a channel, returning its entry if it was checked
    pub fn uncheck(&mut self, key: &ChannelKey) -> Option<ChannelEntry> {
        let pos = self.entries.iter().position(|e| e.key == *key)?;
        Some(self.entries.remove(pos))
    }

    pub fn set_conversion(&mut self, key: &ChannelKey, conversion: UnitConversion) -> bool {
        match self.entries.iter_mut().find(|e| e.key == *key) {
            Some(entry) => {
                entry.conversion = conversion;
                true
            }
            None => false,
        }
    }

    pub fn set_axis(&mut self, key: &ChannelKey, axis: Axis) -> bool {
        match self.entries.iter_mut().find(|e| e.key == *key) {
            Some(entry) => {
                entry.axis = axis;
                true
            }
            None => false,
        }
    }

    /// Uncheck every channel of `source`
    pub fn remove_source(&mut self, source: &str) {
        self.entries.retain(|e| e.key.source != source);
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}
