//! Utility functions for record formatting and sample math

use std::fmt::Debug;
use time::macros::format_description;
use time::{OffsetDateTime, UtcOffset};

/// Format a timestamp for human-readable logging
///
/// Converts an OffsetDateTime to DD.MM.YYYY - HH:MM:SS format
/// Falls back to default string representation if formatting fails.
pub fn format_datetime(dt: &OffsetDateTime) -> String {
    dt.format(format_description!(
        "[day].[month].[year] - [hour]:[minute]:[second]"
    ))
    .unwrap_or_else(|_| dt.to_string())
}

/// Offset of the local time zone, or UTC if it cannot be determined
///
/// Must be called before the runtime spawns worker threads: the lookup is
/// refused in multi-threaded processes on some platforms.
pub fn local_offset() -> UtcOffset {
    UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC)
}

/// Euclidean norm of a 3-axis acceleration vector
pub fn magnitude(ax: f32, ay: f32, az: f32) -> f32 {
    (ax * ax + ay * ay + az * az).sqrt()
}

/// Render a float for the data file
///
/// Whole numbers keep their decimal point (`20.0`, `0.0`) and fractional
/// values use the shortest representation that round-trips. Below 1e-4
/// the output switches to exponent form without a decimal point (`1e-5`),
/// and large values stay positional (`10000000.0`). Readers expecting
/// `1.0E-5` or `1.0E7` notation will see these forms instead.
pub fn format_float<T: Debug>(value: T) -> String {
    format!("{:?}", value)
}

pub fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}
