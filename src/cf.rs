//! The parts of the CF conventions needed to turn raw DAP values into
//! physical ones: fill masking, packing and time coordinates.

use crate::dap::das::AttributeTable;
use crate::dap::dds::BaseType;
use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeDelta, Utc};

/// Masking and unpacking rules read from a variable's attributes.
#[derive(Debug, Clone, PartialEq)]
pub struct CfDecoding {
    fill_values: Vec<f64>,
    scale_factor: Option<f64>,
    add_offset: Option<f64>,
    single_precision: bool,
}

impl CfDecoding {
    pub fn from_attributes(attributes: &AttributeTable, base_type: BaseType) -> Self {
        let fill_values = ["_FillValue", "missing_value"]
            .iter()
            .filter_map(|name| attributes.number(name))
            .collect();
        Self {
            fill_values,
            scale_factor: attributes.number("scale_factor"),
            add_offset: attributes.number("add_offset"),
            single_precision: base_type == BaseType::Float32,
        }
    }

    fn is_fill(&self, raw: f64) -> bool {
        self.fill_values.iter().any(|&fill| {
            if self.single_precision {
                raw as f32 == fill as f32
            } else {
                raw == fill
            }
        })
    }

    /// Fill values become NaN, everything else is unpacked.
    pub fn apply(&self, raw: f64) -> f64 {
        if self.is_fill(raw) {
            return f64::NAN;
        }
        raw * self.scale_factor.unwrap_or(1.0) + self.add_offset.unwrap_or(0.0)
    }
}

fn seconds_per_unit(unit: &str) -> Option<f64> {
    Some(match unit.trim().to_ascii_lowercase().as_str() {
        "seconds" | "second" | "secs" | "sec" | "s" => 1.0,
        "minutes" | "minute" | "mins" | "min" => 60.0,
        "hours" | "hour" | "hrs" | "hr" | "h" => 3_600.0,
        "days" | "day" | "d" => 86_400.0,
        _ => return None,
    })
}

fn parse_reference(text: &str) -> Option<DateTime<Utc>> {
    let trimmed = text.trim();
    let trimmed = trimmed
        .strip_suffix("UTC")
        .or_else(|| trimmed.strip_suffix("GMT"))
        .or_else(|| trimmed.strip_suffix('Z'))
        .unwrap_or(trimmed)
        .trim()
        .replace('T', " ");

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%d %H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(parsed) = NaiveDateTime::parse_from_str(&trimmed, format) {
            return Some(parsed.and_utc());
        }
    }
    NaiveDate::parse_from_str(&trimmed, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}

/// Decodes `value` given CF time units like
/// `seconds since 1970-01-01 00:00:00 UTC`.
pub fn decode_time(value: f64, units: &str) -> Option<DateTime<Utc>> {
    if !value.is_finite() {
        return None;
    }
    let (unit, reference) = units.split_once(" since ")?;
    let millis = (value * seconds_per_unit(unit)? * 1_000.0).round() as i64;
    parse_reference(reference)?.checked_add_signed(TimeDelta::try_milliseconds(millis)?)
}
