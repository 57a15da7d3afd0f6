pub mod clock;
pub mod config;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Configuration, DroppedTablesConfig};
