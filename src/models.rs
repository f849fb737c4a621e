use std::fmt;
use std::str::FromStr;

use crate::utils::{format_float, yes_no};

/// Minimum nanoseconds between two accepted light samples
pub const LIGHT_INTERVAL_NANOS: i64 = 5_000_000_000; // 5 s
/// Minimum nanoseconds between two accepted acceleration samples
pub const MOTION_INTERVAL_NANOS: i64 = 8_000_000; // 8 ms

/// The sensor streams that are debounced and averaged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SampleKind {
    Light,
    Motion,
}

/// Per-kind minimum inter-sample intervals
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceIntervals {
    pub light_nanos: i64,
    pub motion_nanos: i64,
}

impl DebounceIntervals {
    pub fn for_kind(&self, kind: SampleKind) -> i64 {
        match kind {
            SampleKind::Light => self.light_nanos,
            SampleKind::Motion => self.motion_nanos,
        }
    }
}

impl Default for DebounceIntervals {
    fn default() -> Self {
        DebounceIntervals {
            light_nanos: LIGHT_INTERVAL_NANOS,
            motion_nanos: MOTION_INTERVAL_NANOS,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Audio ringer mode
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RingerProfile {
    Normal,
    Vibrate,
    Silent,
}

impl RingerProfile {
    pub fn as_str(&self) -> &'static str {
        match self {
            RingerProfile::Normal => "normal",
            RingerProfile::Vibrate => "vibrate",
            RingerProfile::Silent => "silent",
        }
    }
}

impl FromStr for RingerProfile {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "normal" => Ok(RingerProfile::Normal),
            "vibrate" => Ok(RingerProfile::Vibrate),
            "silent" => Ok(RingerProfile::Silent),
            other => Err(format!(
                "expected 'normal', 'vibrate' or 'silent', got '{}'",
                other
            )),
        }
    }
}

/// Coarse part of the day derived from the hour
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayPart {
    Morning,
    Forenoon,
    Afternoon,
    Evening,
    Night,
}

impl DayPart {
    pub fn from_hour(hour: u8) -> Self {
        match hour {
            6..=9 => DayPart::Morning,
            10..=11 => DayPart::Forenoon,
            12..=17 => DayPart::Afternoon,
            18..=21 => DayPart::Evening,
            _ => DayPart::Night,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DayPart::Morning => "morning",
            DayPart::Forenoon => "forenoon",
            DayPart::Afternoon => "afternoon",
            DayPart::Evening => "evening",
            DayPart::Night => "night",
        }
    }
}

/// One line of the data file
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub location: Option<Location>,
    pub profile: RingerProfile,
    pub hour: u8,
    pub weekday: time::Weekday,
    pub screen_on: bool,
    pub app_count: usize,
    pub headset: bool,
    pub in_call: bool,
    pub ap_mac: String,
    pub motion: f32,
    pub light: f32,
    pub message: String,
}

impl Record {
    pub fn day_part(&self) -> DayPart {
        DayPart::from_hour(self.hour)
    }

    pub fn weekday_abbrev(&self) -> &'static str {
        match self.weekday {
            time::Weekday::Monday => "mon",
            time::Weekday::Tuesday => "tue",
            time::Weekday::Wednesday => "wed",
            time::Weekday::Thursday => "thu",
            time::Weekday::Friday => "fri",
            time::Weekday::Saturday => "sat",
            time::Weekday::Sunday => "sun",
        }
    }

    pub fn is_weekend(&self) -> bool {
        matches!(
            self.weekday,
            time::Weekday::Saturday | time::Weekday::Sunday
        )
    }
}

impl fmt::Display for Record {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (latitude, longitude) = self
            .location
            .map(|l| (l.latitude, l.longitude))
            .unwrap_or((0.0, 0.0));

        write!(
            f,
            "{},{},{},{},{},{},{},{},{},{},{},{},{},{},{}",
            format_float(latitude),
            format_float(longitude),
            self.profile.as_str(),
            self.hour,
            self.day_part().as_str(),
            self.weekday_abbrev(),
            yes_no(self.is_weekend()),
            if self.screen_on { "on" } else { "off" },
            self.app_count,
            yes_no(self.headset),
            yes_no(self.in_call),
            self.ap_mac,
            format_float(self.motion),
            format_float(self.light),
            self.message
        )
    }
}
