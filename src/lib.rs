//! Signal Browser - readers for industrial measurement logs
//!
//! This library discovers and reads time-stamped channels from three log
//! formats and turns them into canonical, plot-ready series.
//!
//! ## Module Structure
//!
//! - [`parsers`] - Log readers (TDM, RTI recorder SQLite, PLC binary segments)
//!   and the format-independent [`parsers::LogReader`] facade
//! - [`merge`] - Parallel merge of one channel across recorder shards
//! - [`timestamp`] - Conversions from the source timestamp encodings
//! - [`normalize`] - Value type inference and boolean/numeric/text classification
//! - [`units`] - Linear unit conversions for display
//! - [`state`] - Caller-owned registry of checked channels
//! - [`settings`] - Reader settings persistence
//! - [`error`] - Error type shared by all readers

pub mod error;
pub mod merge;
pub mod normalize;
pub mod parsers;
pub mod settings;
pub mod state;
pub mod timestamp;
pub mod units;

pub use error::{ReaderError, Result};
