pub mod clock;
pub mod config;
pub mod error;

pub use clock::{fixed_clock, system_clock, Clock, FixedClock, SystemClock};
pub use config::AppConfig;
pub use error::{AnalyticsError, AnalyticsResult};
