//! Per-session light and motion averaging shared between sensor feeds and
//! the record timer

use log::debug;
use std::sync::{Mutex, MutexGuard};

use crate::models::{DebounceIntervals, SampleKind};
use crate::sensing::debounce::DebounceState;
use crate::sensing::mean::RunningMean;
use crate::utils::magnitude;

/// Debounce state and running mean for one sample kind
///
/// Both live under the same lock so the admission check and the update are
/// one critical section.
#[derive(Debug, Clone, Copy)]
struct Channel {
    filter: DebounceState,
    mean: RunningMean,
}

impl Channel {
    fn new(min_interval_nanos: i64) -> Self {
        Channel {
            filter: DebounceState::new(min_interval_nanos),
            mean: RunningMean::new(),
        }
    }
}

/// Aggregates light and acceleration events for one collection session
///
/// Ingest calls come from the sensor feeds, drains from the record timer.
/// Light and motion are guarded by separate locks and never touch each
/// other's state.
#[derive(Debug)]
pub struct SensorAggregator {
    intervals: DebounceIntervals,
    light: Mutex<Channel>,
    motion: Mutex<Channel>,
}

impl SensorAggregator {
    pub fn new(intervals: DebounceIntervals) -> Self {
        SensorAggregator {
            intervals,
            light: Mutex::new(Channel::new(intervals.for_kind(SampleKind::Light))),
            motion: Mutex::new(Channel::new(intervals.for_kind(SampleKind::Motion))),
        }
    }

    fn channel(&self, kind: SampleKind) -> MutexGuard<'_, Channel> {
        let lock = match kind {
            SampleKind::Light => &self.light,
            SampleKind::Motion => &self.motion,
        };
        // Every critical section leaves Channel consistent, so a poisoned
        // lock still holds usable state.
        lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Feed one ambient light reading in lux
    pub fn ingest_light(&self, raw_lux: f32, timestamp_nanos: i64) {
        let mut channel = self.channel(SampleKind::Light);
        if channel.filter.accept(timestamp_nanos) {
            channel.mean.update(raw_lux);
            debug!(
                "Light sample accepted: {:.2} lx at {} ns ({} in interval)",
                raw_lux,
                timestamp_nanos,
                channel.mean.count()
            );
        }
    }

    /// Feed one 3-axis acceleration reading; its magnitude is averaged
    pub fn ingest_motion(&self, ax: f32, ay: f32, az: f32, timestamp_nanos: i64) {
        let mut channel = self.channel(SampleKind::Motion);
        if channel.filter.accept(timestamp_nanos) {
            channel.mean.update(magnitude(ax, ay, az));
        }
    }

    /// Average light since the previous drain, 0.0 if none
    pub fn drain_light(&self) -> f32 {
        self.drain(SampleKind::Light)
    }

    /// Average motion magnitude since the previous drain, 0.0 if none
    pub fn drain_motion(&self) -> f32 {
        self.drain(SampleKind::Motion)
    }

    fn drain(&self, kind: SampleKind) -> f32 {
        let mut channel = self.channel(kind);
        let samples = channel.mean.count();
        let value = channel.mean.drain();
        debug!(
            "Drained {:?}: {} from {} samples (last accepted at {:?} ns)",
            kind,
            value,
            samples,
            channel.filter.last_accepted_nanos()
        );
        value
    }

    /// Discard all accumulated state, including debounce history
    pub fn reset(&self) {
        for kind in [SampleKind::Light, SampleKind::Motion] {
            *self.channel(kind) = Channel::new(self.intervals.for_kind(kind));
        }
    }

    /// Number of samples averaged since the last drain
    #[cfg(test)]
    pub fn pending(&self, kind: SampleKind) -> u32 {
        self.channel(kind).mean.count()
    }

    /// Timestamp of the last admitted sample
    #[cfg(test)]
    pub fn last_accepted(&self, kind: SampleKind) -> Option<i64> {
        self.channel(kind).filter.last_accepted_nanos()
    }
}

impl Default for SensorAggregator {
    fn default() -> Self {
        Self::new(DebounceIntervals::default())
    }
}
