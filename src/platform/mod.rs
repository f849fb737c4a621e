pub mod clock;
pub mod feeds;
pub mod probe;

pub use feeds::{spawn_feeds, IioDevice, SensorDevice, SimulatedDevice};
pub use probe::{DeviceProbe, SystemProbe};
