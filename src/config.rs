use log::{debug, info};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::ConfigError;
use crate::models::{DebounceIntervals, Location, RingerProfile};

const DEFAULT_DATA_FILE: &str = "data.csv";
const DEFAULT_MESSAGES_FILE: &str = "messages.csv";
const DEFAULT_TIMER_DELAY_SECS: u64 = 30;
const DEFAULT_TIMER_PERIOD_SECS: u64 = 30;
const DEFAULT_IIO_DEVICE: &str = "/sys/bus/iio/devices/iio:device0";
const DEFAULT_WIFI_IFACE: &str = "wlan0";

/// Where sensor events come from
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SensorSource {
    /// Linux Industrial I/O sysfs device
    Iio,
    /// Synthetic readings, for hosts without sensors
    Simulated,
}

impl FromStr for SensorSource {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "iio" => Ok(SensorSource::Iio),
            "simulated" | "sim" => Ok(SensorSource::Simulated),
            other => Err(format!("expected 'iio' or 'simulated', got '{}'", other)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct CollectorConfig {
    pub data_file: PathBuf,
    pub messages_file: PathBuf,
    /// Label used when `run` is given none
    pub message: Option<String>,
    pub timer_delay_secs: u64,
    pub timer_period_secs: u64,
    pub intervals: DebounceIntervals,
    pub sensor_source: SensorSource,
    pub iio_device: PathBuf,
    pub wifi_iface: String,
    pub ringer_profile: RingerProfile,
    pub in_call: bool,
    pub location: Option<Location>,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            messages_file: PathBuf::from(DEFAULT_MESSAGES_FILE),
            message: None,
            timer_delay_secs: DEFAULT_TIMER_DELAY_SECS,
            timer_period_secs: DEFAULT_TIMER_PERIOD_SECS,
            intervals: DebounceIntervals::default(),
            sensor_source: SensorSource::Iio,
            iio_device: PathBuf::from(DEFAULT_IIO_DEVICE),
            wifi_iface: DEFAULT_WIFI_IFACE.to_string(),
            ringer_profile: RingerProfile::Normal,
            in_call: false,
            location: None,
        }
    }
}

impl CollectorConfig {
    pub fn new() -> Result<Self, ConfigError> {
        // Load environment variables
        dotenv::dotenv().ok();

        let config = Self::from_lookup(|key| env::var(key).ok())?;
        info!(
            "Configuration loaded: data file {}, period {}s, source {:?}",
            config.data_file.display(),
            config.timer_period_secs,
            config.sensor_source
        );
        Ok(config)
    }

    /// Build a configuration from an arbitrary key lookup, falling back to
    /// defaults for every key the lookup does not know.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = CollectorConfig::default();

        if let Some(path) = lookup("COLLECTOR_DATA_FILE") {
            config.data_file = PathBuf::from(path);
        }
        if let Some(path) = lookup("COLLECTOR_MESSAGES_FILE") {
            config.messages_file = PathBuf::from(path);
        }
        config.message = lookup("COLLECTOR_MESSAGE")
            .map(|m| m.trim().to_string())
            .filter(|m| !m.is_empty());

        config.timer_delay_secs =
            parse_or(&lookup, "COLLECTOR_TIMER_DELAY_SECS", config.timer_delay_secs)?;
        config.timer_period_secs = parse_or(
            &lookup,
            "COLLECTOR_TIMER_PERIOD_SECS",
            config.timer_period_secs,
        )?;
        if config.timer_period_secs == 0 {
            return Err(ConfigError::ZeroPeriod);
        }

        config.intervals.light_nanos = parse_or(
            &lookup,
            "COLLECTOR_LIGHT_INTERVAL_NS",
            config.intervals.light_nanos,
        )?;
        config.intervals.motion_nanos = parse_or(
            &lookup,
            "COLLECTOR_MOTION_INTERVAL_NS",
            config.intervals.motion_nanos,
        )?;

        config.sensor_source =
            parse_or(&lookup, "COLLECTOR_SENSOR_SOURCE", config.sensor_source)?;
        if let Some(path) = lookup("COLLECTOR_IIO_DEVICE") {
            config.iio_device = PathBuf::from(path);
        }
        if let Some(iface) = lookup("COLLECTOR_WIFI_IFACE") {
            config.wifi_iface = iface.trim().to_string();
        }

        config.ringer_profile =
            parse_or(&lookup, "COLLECTOR_RINGER_PROFILE", config.ringer_profile)?;
        config.in_call = parse_or(&lookup, "COLLECTOR_IN_CALL", config.in_call)?;

        let latitude: Option<f64> = parse_opt(&lookup, "COLLECTOR_LATITUDE")?;
        let longitude: Option<f64> = parse_opt(&lookup, "COLLECTOR_LONGITUDE")?;
        config.location = match (latitude, longitude) {
            (Some(latitude), Some(longitude)) => Some(Location {
                latitude,
                longitude,
            }),
            _ => None,
        };

        debug!("Effective configuration: {:?}", config);
        Ok(config)
    }
}

fn parse_opt<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            }),
        None => Ok(None),
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    Ok(parse_opt(lookup, key)?.unwrap_or(default))
}
