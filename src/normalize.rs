//! Value classification for presentation.
//!
//! Sources rarely declare their value types, so these heuristics decide how a
//! channel is typed during discovery and how a series is drawn once read:
//!
//! - [`infer_value_type`] types one JSON sample value (channel discovery)
//! - [`is_boolean_signal`] recognises 0/1 signals in numeric series
//! - [`classify`] combines the above with the forced-boolean channel list
//! - [`present`] turns a series into a plot-ready trace, applying unit conversion

use serde::Serialize;

use crate::parsers::types::{SeriesValues, TimeSeries, ValueType};
use crate::timestamp::Instant;
use crate::units::UnitConversion;

/// How a series should be drawn
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum Presentation {
    /// Step trace limited to 0 and 1
    Boolean,
    /// Continuous line, optionally unit-converted
    Numeric,
    /// Labels only, not drawn as a line
    Text,
}

/// Type a JSON sample value.
///
/// Strings spelling `true`/`false` (any case) count as booleans, as do JSON
/// booleans. Integral numbers are `Int`, other numbers `Float`, remaining
/// strings `String`. Null, objects and arrays cannot be typed from one sample.
pub fn infer_value_type(value: &serde_json::Value) -> Option<ValueType> {
    match value {
        serde_json::Value::Bool(_) => Some(ValueType::Bool),
        serde_json::Value::String(s) if is_bool_text(s) => Some(ValueType::Bool),
        serde_json::Value::String(_) => Some(ValueType::String),
        serde_json::Value::Number(n) if n.is_i64() || n.is_u64() => Some(ValueType::Int),
        serde_json::Value::Number(_) => Some(ValueType::Float),
        serde_json::Value::Null | serde_json::Value::Object(_) | serde_json::Value::Array(_) => {
            None
        }
    }
}

fn is_bool_text(s: &str) -> bool {
    s.eq_ignore_ascii_case("true") || s.eq_ignore_ascii_case("false")
}

/// True when every value is exactly 0 or 1 (all zeros and all ones included)
pub fn is_boolean_signal(values: &[f64]) -> bool {
    !values.is_empty() && values.iter().all(|&v| v == 0.0 || v == 1.0)
}

/// Decide how a series is presented.
///
/// Channels named in `forced_boolean` are always boolean.
pub fn classify(series: &TimeSeries, forced_boolean: &[String]) -> Presentation {
    if forced_boolean.iter().any(|name| *name == series.name) {
        return Presentation::Boolean;
    }
    match series.values() {
        SeriesValues::Bool(_) => Presentation::Boolean,
        SeriesValues::Text(_) => Presentation::Text,
        SeriesValues::Float(values) if is_boolean_signal(values) => Presentation::Boolean,
        SeriesValues::Float(_) => Presentation::Numeric,
    }
}

/// Plot-ready trace handed to the rendering layer
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct PlotTrace {
    pub name: String,
    pub times: Vec<Instant>,
    /// Numeric y values; empty for text traces
    pub y: Vec<f64>,
    /// Sample labels for text traces; empty otherwise
    pub labels: Vec<String>,
    pub presentation: Presentation,
    pub unit: Option<String>,
}

/// Convert a series to a plot trace.
///
/// The conversion applies only to numeric traces; boolean traces are drawn
/// as 0/1 and text traces keep their labels.
pub fn present(
    series: &TimeSeries,
    conversion: Option<&UnitConversion>,
    forced_boolean: &[String],
) -> PlotTrace {
    let presentation = classify(series, forced_boolean);

    let (y, labels) = match series.values() {
        SeriesValues::Float(values) => match (presentation, conversion) {
            (Presentation::Numeric, Some(conv)) => {
                (values.iter().map(|&v| conv.apply(v)).collect(), Vec::new())
            }
            (Presentation::Boolean, _) => (
                values
                    .iter()
                    .map(|&v| if v != 0.0 && !v.is_nan() { 1.0 } else { 0.0 })
                    .collect(),
                Vec::new(),
            ),
            _ => (values.clone(), Vec::new()),
        },
        SeriesValues::Bool(values) => (
            values.iter().map(|&b| if b { 1.0 } else { 0.0 }).collect(),
            Vec::new(),
        ),
        SeriesValues::Text(values) => match presentation {
            Presentation::Boolean => (
                values
                    .iter()
                    .map(|s| if s.eq_ignore_ascii_case("true") { 1.0 } else { 0.0 })
                    .collect(),
                Vec::new(),
            ),
            _ => (Vec::new(), values.clone()),
        },
    };

    let unit = match presentation {
        Presentation::Numeric => conversion.and_then(|c| c.unit.clone()),
        _ => None,
    };

    PlotTrace {
        name: series.name.clone(),
        times: series.times().to_vec(),
        y,
        labels,
        presentation,
        unit,
    }
}
