//! Streaming mean accumulator for per-record sensor averages

/// Running mean of a scalar series, drained once per report
///
/// Updates use the incremental form `mean += (v - mean) / count`, so the
/// accumulator holds two numbers regardless of how many samples it has seen.
/// An empty accumulator reports 0.0.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RunningMean {
    mean: f32,
    count: u32,
}

impl RunningMean {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn update(&mut self, value: f32) {
        self.count += 1;
        self.mean += (value - self.mean) / self.count as f32;
    }

    /// Return the current mean and reset to empty
    pub fn drain(&mut self) -> f32 {
        let result = self.mean;
        *self = Self::default();
        result
    }

    pub fn count(&self) -> u32 {
        self.count
    }
}
