//! Sensor devices and the tasks that push their readings into an aggregator

use log::{debug, error, info, warn};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::task::{self, JoinHandle};
use tokio::time::{interval, Duration, MissedTickBehavior};

use crate::error::SessionError;
use crate::platform::clock::sensor_clock_nanos;
use crate::sensing::SensorAggregator;

/// Light sensor polling period ("normal" delivery rate)
const LIGHT_POLL_MS: u64 = 200;
/// Accelerometer polling period ("fastest" delivery rate)
const MOTION_POLL_MS: u64 = 5;
/// Standard gravity, used by the simulated accelerometer
const GRAVITY: f32 = 9.81;

/// A source of raw light and acceleration readings
pub trait SensorDevice: Send + Sync {
    fn name(&self) -> String;
    /// Ambient light in lux
    fn illuminance(&self) -> io::Result<f32>;
    /// Acceleration in m/s² along x, y, z
    fn acceleration(&self) -> io::Result<[f32; 3]>;
}

/// Linux Industrial I/O device exposed through sysfs
#[derive(Debug, Clone)]
pub struct IioDevice {
    path: PathBuf,
}

impl IioDevice {
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, SessionError> {
        let path = path.into();
        if !path.is_dir() {
            return Err(SessionError::SensorUnavailable {
                path,
                reason: "not a directory".to_string(),
            });
        }

        let has_light = path.join("in_illuminance_input").exists()
            || path.join("in_illuminance_raw").exists();
        let has_accel = path.join("in_accel_x_raw").exists();
        if !has_light && !has_accel {
            return Err(SessionError::SensorUnavailable {
                path,
                reason: "no illuminance or accelerometer channels".to_string(),
            });
        }
        if !has_light {
            warn!("{} has no illuminance channel", path.display());
        }
        if !has_accel {
            warn!("{} has no accelerometer channels", path.display());
        }

        Ok(IioDevice { path })
    }

    fn scale(&self, file: &str) -> f32 {
        read_f32(&self.path.join(file)).unwrap_or(1.0)
    }
}

impl SensorDevice for IioDevice {
    fn name(&self) -> String {
        fs::read_to_string(self.path.join("name"))
            .map(|n| n.trim().to_string())
            .unwrap_or_else(|_| self.path.display().to_string())
    }

    fn illuminance(&self) -> io::Result<f32> {
        // Processed value when the driver provides one
        match read_f32(&self.path.join("in_illuminance_input")) {
            Ok(lux) => Ok(lux),
            Err(_) => {
                let raw = read_f32(&self.path.join("in_illuminance_raw"))?;
                Ok(raw * self.scale("in_illuminance_scale"))
            }
        }
    }

    fn acceleration(&self) -> io::Result<[f32; 3]> {
        let scale = self.scale("in_accel_scale");
        let x = read_f32(&self.path.join("in_accel_x_raw"))?;
        let y = read_f32(&self.path.join("in_accel_y_raw"))?;
        let z = read_f32(&self.path.join("in_accel_z_raw"))?;
        Ok([x * scale, y * scale, z * scale])
    }
}

fn read_f32(path: &Path) -> io::Result<f32> {
    let contents = fs::read_to_string(path)?;
    contents
        .trim()
        .parse::<f32>()
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))
}

/// Synthetic device for hosts without sensors
///
/// Light drifts slowly around 300 lx and the accelerometer reports gravity
/// plus a small sway, both derived from the sensor clock.
#[derive(Debug, Clone, Default)]
pub struct SimulatedDevice;

impl SensorDevice for SimulatedDevice {
    fn name(&self) -> String {
        "simulated".to_string()
    }

    fn illuminance(&self) -> io::Result<f32> {
        let t = sensor_clock_nanos() as f64 / 1e9;
        Ok((300.0 + 50.0 * (t / 60.0).sin()) as f32)
    }

    fn acceleration(&self) -> io::Result<[f32; 3]> {
        let t = sensor_clock_nanos() as f64 / 1e9;
        Ok([
            (0.2 * (t * 2.0).sin()) as f32,
            (0.2 * (t * 3.0).cos()) as f32,
            GRAVITY,
        ])
    }
}

/// Spawn one polling task per sensor kind
///
/// Device reads are blocking file I/O and run on the blocking pool. Each
/// reading is stamped with the sensor clock and handed to the aggregator
/// synchronously. Read failures are logged once per run of failures and the
/// task keeps polling.
pub fn spawn_feeds(
    device: Arc<dyn SensorDevice>,
    aggregator: Arc<SensorAggregator>,
) -> Vec<JoinHandle<()>> {
    info!("Starting sensor feeds from {}", device.name());

    let light = {
        let device = Arc::clone(&device);
        let aggregator = Arc::clone(&aggregator);
        tokio::spawn(async move {
            let mut ticker = interval(Duration::from_millis(LIGHT_POLL_MS));
            ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut failing = false;
            loop {
                ticker.tick().await;
                let reader = Arc::clone(&device);
                match task::spawn_blocking(move || reader.illuminance()).await {
                    Ok(Ok(lux)) => {
                        failing = false;
                        aggregator.ingest_light(lux, sensor_clock_nanos());
                    }
                    Ok(Err(e)) => report_failure(&mut failing, "light", &e),
                    Err(e) => error!("Light read task failed: {}", e),
                }
            }
        })
    };

    let motion = tokio::spawn(async move {
        let mut ticker = interval(Duration::from_millis(MOTION_POLL_MS));
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut failing = false;
        loop {
            ticker.tick().await;
            let reader = Arc::clone(&device);
            match task::spawn_blocking(move || reader.acceleration()).await {
                Ok(Ok([ax, ay, az])) => {
                    failing = false;
                    aggregator.ingest_motion(ax, ay, az, sensor_clock_nanos());
                }
                Ok(Err(e)) => report_failure(&mut failing, "accelerometer", &e),
                Err(e) => error!("Accelerometer read task failed: {}", e),
            }
        }
    });

    vec![light, motion]
}

fn report_failure(failing: &mut bool, sensor: &str, error: &io::Error) {
    if *failing {
        debug!("Reading {} failed again: {}", sensor, error);
    } else {
        warn!("Failed to read {}: {}", sensor, error);
        *failing = true;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{DebounceIntervals, SampleKind};
    use tempfile::TempDir;

    fn fake_iio(files: &[(&str, &str)]) -> TempDir {
        let dir = TempDir::new().unwrap();
        for (name, contents) in files {
            fs::write(dir.path().join(name), contents).unwrap();
        }
        dir
    }

    #[test]
    fn test_iio_processed_illuminance() {
        let dir = fake_iio(&[("name", "als\n"), ("in_illuminance_input", "123.5\n")]);
        let device = IioDevice::open(dir.path()).unwrap();
        assert_eq!(device.name(), "als");
        assert_eq!(device.illuminance().unwrap(), 123.5);
    }

    #[test]
    fn test_iio_raw_illuminance_is_scaled() {
        let dir = fake_iio(&[
            ("in_illuminance_raw", "200\n"),
            ("in_illuminance_scale", "0.5\n"),
        ]);
        let device = IioDevice::open(dir.path()).unwrap();
        assert_eq!(device.illuminance().unwrap(), 100.0);
    }

    #[test]
    fn test_iio_acceleration_is_scaled() {
        let dir = fake_iio(&[
            ("in_accel_x_raw", "100\n"),
            ("in_accel_y_raw", "-200\n"),
            ("in_accel_z_raw", "1000\n"),
            ("in_accel_scale", "0.0098\n"),
        ]);
        let device = IioDevice::open(dir.path()).unwrap();
        let [x, y, z] = device.acceleration().unwrap();
        assert!((x - 0.98).abs() < 1e-5);
        assert!((y + 1.96).abs() < 1e-5);
        assert!((z - 9.8).abs() < 1e-4);
    }

    #[test]
    fn test_iio_missing_channel_is_an_error() {
        let dir = fake_iio(&[("in_illuminance_input", "5\n")]);
        let device = IioDevice::open(dir.path()).unwrap();
        assert!(device.acceleration().is_err());
    }

    #[test]
    fn test_iio_garbage_value_is_an_error() {
        let dir = fake_iio(&[("in_illuminance_input", "bright\n")]);
        let device = IioDevice::open(dir.path()).unwrap();
        let err = device.illuminance().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::InvalidData);
    }

    #[test]
    fn test_iio_open_rejects_empty_device() {
        let dir = fake_iio(&[("name", "nothing\n")]);
        assert!(matches!(
            IioDevice::open(dir.path()),
            Err(SessionError::SensorUnavailable { .. })
        ));
        assert!(IioDevice::open(dir.path().join("missing")).is_err());
    }

    #[test]
    fn test_simulated_device_reports_gravity() {
        let device = SimulatedDevice;
        let [_, _, z] = device.acceleration().unwrap();
        assert_eq!(z, GRAVITY);
        let lux = device.illuminance().unwrap();
        assert!((250.0..=350.0).contains(&lux));
    }

    #[tokio::test]
    async fn test_feeds_deliver_into_aggregator() {
        let aggregator = Arc::new(SensorAggregator::new(DebounceIntervals::default()));
        let tasks = spawn_feeds(Arc::new(SimulatedDevice), Arc::clone(&aggregator));

        tokio::time::sleep(Duration::from_millis(100)).await;
        for task in &tasks {
            task.abort();
        }

        // First light sample is always admitted
        assert_eq!(aggregator.pending(SampleKind::Light), 1);
        assert!(aggregator.pending(SampleKind::Motion) >= 1);
        let motion = aggregator.drain_motion();
        assert!(motion > 9.0 && motion < 10.5);
    }

    struct SlowDevice;

    impl SensorDevice for SlowDevice {
        fn name(&self) -> String {
            "slow".to_string()
        }
        fn illuminance(&self) -> io::Result<f32> {
            std::thread::sleep(std::time::Duration::from_millis(300));
            Ok(1.0)
        }
        fn acceleration(&self) -> io::Result<[f32; 3]> {
            std::thread::sleep(std::time::Duration::from_millis(300));
            Ok([0.0, 0.0, 1.0])
        }
    }

    #[tokio::test]
    async fn test_slow_device_does_not_block_runtime() {
        let aggregator = Arc::new(SensorAggregator::new(DebounceIntervals::default()));
        let tasks = spawn_feeds(Arc::new(SlowDevice), Arc::clone(&aggregator));

        // Single-threaded runtime: a read on this thread would delay the wakeup
        let started = std::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_millis(200));

        for task in &tasks {
            task.abort();
        }
    }
}
