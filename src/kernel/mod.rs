pub mod flight;
pub mod manual;
pub mod scheduler;
pub mod telemetry;
pub mod time;

pub use flight::{Generation, SingleFlight};
pub use manual::ManualTime;
pub use scheduler::{Scheduler, TimerAction, TimerHandle, TokioScheduler};
pub use time::{Clock, SystemClock, Timestamp};
