pub mod clock;
pub mod config;
pub mod error;
pub mod types;

pub use clock::{Clock, ManualClock, SharedClock, SystemClock};
pub use config::FarmaConfig;
pub use error::{FarmaError, Result};
pub use types::*;
