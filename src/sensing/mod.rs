pub mod aggregator;
pub mod debounce;
pub mod mean;

pub use aggregator::SensorAggregator;
