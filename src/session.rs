//! Collection session: sensor feeds, the record timer and the active label

use log::{error, info, warn};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use time::{OffsetDateTime, UtcOffset};
use tokio::task::{self, JoinHandle};
use tokio::time::{interval_at, Duration, Instant, MissedTickBehavior};

use crate::config::CollectorConfig;
use crate::error::SessionError;
use crate::models::{DebounceIntervals, Record};
use crate::platform::{spawn_feeds, DeviceProbe, SensorDevice};
use crate::sensing::SensorAggregator;
use crate::storage::store_record;
use crate::utils::format_datetime;

/// Assemble one record from the probe and the aggregator
///
/// Drains motion, then light, in record field order.
pub fn build_record(
    probe: &dyn DeviceProbe,
    aggregator: &SensorAggregator,
    message: &str,
    now: OffsetDateTime,
) -> Record {
    Record {
        location: probe.location(),
        profile: probe.ringer_profile(),
        hour: now.hour(),
        weekday: now.weekday(),
        screen_on: probe.screen_on(),
        app_count: probe.running_app_count(),
        headset: probe.headset_connected(),
        in_call: probe.in_call(),
        ap_mac: probe.ap_mac(),
        motion: aggregator.drain_motion(),
        light: aggregator.drain_light(),
        message: message.to_string(),
    }
}

struct Running {
    aggregator: Arc<SensorAggregator>,
    message: Arc<Mutex<String>>,
    tasks: Vec<JoinHandle<()>>,
}

pub struct Session {
    data_file: PathBuf,
    timer_delay: Duration,
    timer_period: Duration,
    intervals: DebounceIntervals,
    utc_offset: UtcOffset,
    probe: Arc<dyn DeviceProbe>,
    device: Arc<dyn SensorDevice>,
    running: Option<Running>,
}

impl Session {
    pub fn new(
        config: &CollectorConfig,
        utc_offset: UtcOffset,
        probe: Arc<dyn DeviceProbe>,
        device: Arc<dyn SensorDevice>,
    ) -> Self {
        Session {
            data_file: config.data_file.clone(),
            timer_delay: Duration::from_secs(config.timer_delay_secs),
            timer_period: Duration::from_secs(config.timer_period_secs),
            intervals: config.intervals,
            utc_offset,
            probe,
            device,
            running: None,
        }
    }

    /// Override the timer cadence
    #[cfg(test)]
    pub fn with_timer(mut self, delay: Duration, period: Duration) -> Self {
        self.timer_delay = delay;
        self.timer_period = period;
        self
    }

    pub fn is_running(&self) -> bool {
        self.running.is_some()
    }

    /// Begin collecting for `message`
    ///
    /// Does nothing if a session is already running.
    pub fn start(&mut self, message: &str) -> Result<(), SessionError> {
        if self.running.is_some() {
            info!("Collection already running, ignoring start");
            return Ok(());
        }
        if message.is_empty() {
            return Err(SessionError::EmptyMessage);
        }

        let aggregator = Arc::new(SensorAggregator::new(self.intervals));
        let message = Arc::new(Mutex::new(message.to_string()));

        let mut tasks = spawn_feeds(Arc::clone(&self.device), Arc::clone(&aggregator));
        tasks.push(self.spawn_timer(Arc::clone(&aggregator), Arc::clone(&message)));

        info!(
            "Started collecting for '{}': first record in {}s, then every {}s",
            lock(&message),
            self.timer_delay.as_secs(),
            self.timer_period.as_secs()
        );

        self.running = Some(Running {
            aggregator,
            message,
            tasks,
        });
        Ok(())
    }

    /// Replace the label used by subsequent records
    ///
    /// Does nothing if no session is running.
    pub fn set_message(&self, message: &str) {
        let Some(running) = &self.running else {
            return;
        };
        let mut current = lock(&running.message);
        if *current != message {
            info!("Message changed from '{}' to '{}'", current, message);
            *current = message.to_string();
        }
    }

    pub fn message(&self) -> Option<String> {
        self.running.as_ref().map(|r| lock(&r.message).clone())
    }

    /// Stop the feeds and the timer and discard partial averages
    pub fn stop(&mut self) {
        if let Some(running) = self.running.take() {
            for task in &running.tasks {
                task.abort();
            }
            running.aggregator.reset();
            info!("Stopped collecting for '{}'", lock(&running.message));
        }
    }

    fn spawn_timer(
        &self,
        aggregator: Arc<SensorAggregator>,
        message: Arc<Mutex<String>>,
    ) -> JoinHandle<()> {
        let probe = Arc::clone(&self.probe);
        let data_file = self.data_file.clone();
        let utc_offset = self.utc_offset;
        let start = Instant::now() + self.timer_delay;
        let period = self.timer_period;

        tokio::spawn(async move {
            let mut ticker = interval_at(start, period);
            // Fixed delay between records, like a repeating timer task
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let now = OffsetDateTime::now_utc().to_offset(utc_offset);
                let label = lock(&message).clone();

                // Probe queries read sysfs and run `iw`
                let probe = Arc::clone(&probe);
                let aggregator = Arc::clone(&aggregator);
                let record = match task::spawn_blocking(move || {
                    build_record(probe.as_ref(), &aggregator, &label, now)
                })
                .await
                {
                    Ok(record) => record,
                    Err(e) => {
                        error!("Failed to assemble record: {}", e);
                        continue;
                    }
                };

                match store_record(&data_file, &record).await {
                    Ok(()) => info!(
                        "Stored record at {}: motion {:.3}, light {:.2}, '{}'",
                        format_datetime(&now),
                        record.motion,
                        record.light,
                        record.message
                    ),
                    Err(e) => error!("Failed to store record: {}", e),
                }
            }
        })
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if self.running.is_some() {
            warn!("Session dropped while running, stopping collection");
            self.stop();
        }
    }
}

fn lock(message: &Mutex<String>) -> std::sync::MutexGuard<'_, String> {
    message.lock().unwrap_or_else(|p| p.into_inner())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Location, RingerProfile};
    use crate::platform::SimulatedDevice;
    use tempfile::TempDir;

    struct FixedProbe;

    impl DeviceProbe for FixedProbe {
        fn location(&self) -> Option<Location> {
            Some(Location {
                latitude: 49.5,
                longitude: 16.5,
            })
        }
        fn ringer_profile(&self) -> RingerProfile {
            RingerProfile::Silent
        }
        fn screen_on(&self) -> bool {
            true
        }
        fn running_app_count(&self) -> usize {
            12
        }
        fn headset_connected(&self) -> bool {
            false
        }
        fn in_call(&self) -> bool {
            true
        }
        fn ap_mac(&self) -> String {
            "aa:bb:cc:dd:ee:ff".to_string()
        }
    }

    struct SlowProbe;

    impl DeviceProbe for SlowProbe {
        fn location(&self) -> Option<Location> {
            None
        }
        fn ringer_profile(&self) -> RingerProfile {
            RingerProfile::Normal
        }
        fn screen_on(&self) -> bool {
            true
        }
        fn running_app_count(&self) -> usize {
            1
        }
        fn headset_connected(&self) -> bool {
            false
        }
        fn in_call(&self) -> bool {
            false
        }
        fn ap_mac(&self) -> String {
            std::thread::sleep(Duration::from_millis(300));
            String::new()
        }
    }

    fn session_in(dir: &TempDir) -> Session {
        let config = CollectorConfig {
            data_file: dir.path().join("data.csv"),
            ..CollectorConfig::default()
        };
        Session::new(
            &config,
            UtcOffset::UTC,
            Arc::new(FixedProbe),
            Arc::new(SimulatedDevice),
        )
        .with_timer(Duration::ZERO, Duration::from_millis(200))
    }

    #[test]
    fn test_build_record_drains_aggregator() {
        let aggregator = SensorAggregator::new(DebounceIntervals::default());
        aggregator.ingest_light(10.0, 0);
        aggregator.ingest_light(30.0, 6_000_000_000);
        aggregator.ingest_motion(0.0, 3.0, 4.0, 0);

        let now = time::macros::datetime!(2024-06-15 19:30:00 UTC);
        let record = build_record(&FixedProbe, &aggregator, "running", now);

        assert_eq!(
            record.to_string(),
            "49.5,16.5,silent,19,evening,sat,yes,on,12,no,yes,aa:bb:cc:dd:ee:ff,5.0,20.0,running"
        );
        assert_eq!(aggregator.drain_light(), 0.0);
        assert_eq!(aggregator.drain_motion(), 0.0);
    }

    #[tokio::test]
    async fn test_start_writes_records_until_stopped() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);

        session.start("walking").unwrap();
        assert!(session.is_running());
        tokio::time::sleep(Duration::from_millis(500)).await;
        session.stop();
        assert!(!session.is_running());

        let contents = std::fs::read_to_string(dir.path().join("data.csv")).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert!(!lines.is_empty());
        for line in &lines {
            assert_eq!(line.split(',').count(), 15);
            assert!(line.ends_with(",walking"));
            assert!(line.starts_with("49.5,16.5,silent,"));
        }

        // Nothing more is written after stop
        tokio::time::sleep(Duration::from_millis(400)).await;
        let after = std::fs::read_to_string(dir.path().join("data.csv")).unwrap();
        assert_eq!(after, contents);
    }

    #[tokio::test]
    async fn test_second_start_is_ignored() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);

        session.start("sitting").unwrap();
        session.start("walking").unwrap();
        assert_eq!(session.message().as_deref(), Some("sitting"));
        session.stop();
    }

    #[tokio::test]
    async fn test_set_message_while_running() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);

        // Ignored before start
        session.set_message("ignored");
        assert_eq!(session.message(), None);

        session.start("sitting").unwrap();
        session.set_message("walking");
        assert_eq!(session.message().as_deref(), Some("walking"));

        tokio::time::sleep(Duration::from_millis(300)).await;
        session.stop();

        let contents = std::fs::read_to_string(dir.path().join("data.csv")).unwrap();
        assert!(contents.lines().all(|l| l.ends_with(",walking")));
    }

    #[tokio::test]
    async fn test_empty_message_is_refused() {
        let dir = TempDir::new().unwrap();
        let mut session = session_in(&dir);
        assert!(matches!(
            session.start(""),
            Err(SessionError::EmptyMessage)
        ));
        assert!(!session.is_running());
    }

    #[tokio::test]
    async fn test_slow_probe_does_not_block_runtime() {
        let dir = TempDir::new().unwrap();
        let config = CollectorConfig {
            data_file: dir.path().join("data.csv"),
            ..CollectorConfig::default()
        };
        let mut session = Session::new(
            &config,
            UtcOffset::UTC,
            Arc::new(SlowProbe),
            Arc::new(SimulatedDevice),
        )
        .with_timer(Duration::ZERO, Duration::from_secs(10));

        session.start("sitting").unwrap();
        // Let the timer fire and start querying the probe
        tokio::task::yield_now().await;

        let started = std::time::Instant::now();
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_millis(200));

        tokio::time::sleep(Duration::from_millis(500)).await;
        session.stop();
        let contents = std::fs::read_to_string(dir.path().join("data.csv")).unwrap();
        assert_eq!(contents.lines().count(), 1);
    }
}
