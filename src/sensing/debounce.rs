//! Time-based admission of raw sensor samples

/// Tracks the last accepted timestamp for one sensor stream
///
/// A sample stamped `t` is admitted iff `t - last_accepted > min_interval`
/// (strictly greater). Until the first admission there is no last
/// timestamp and any sample is admitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DebounceState {
    min_interval_nanos: i64,
    last_accepted_nanos: Option<i64>,
}

impl DebounceState {
    pub fn new(min_interval_nanos: i64) -> Self {
        DebounceState {
            min_interval_nanos,
            last_accepted_nanos: None,
        }
    }

    /// Decide whether a sample stamped `timestamp_nanos` is admitted
    ///
    /// On admission the stored timestamp moves to `timestamp_nanos`; a
    /// rejected sample leaves the state untouched. Timestamps that go
    /// backwards produce a negative delta and are rejected.
    pub fn accept(&mut self, timestamp_nanos: i64) -> bool {
        let admitted = match self.last_accepted_nanos {
            Some(last) => timestamp_nanos.saturating_sub(last) > self.min_interval_nanos,
            None => true,
        };
        if admitted {
            self.last_accepted_nanos = Some(timestamp_nanos);
        }
        admitted
    }

    pub fn last_accepted_nanos(&self) -> Option<i64> {
        self.last_accepted_nanos
    }
}
