pub mod classifier;
pub mod log;
pub mod notify;
pub mod pipeline;
pub mod types;

pub use classifier::{classify, strip_country_code, MatchConfiguration, COUNTRY_CODE_PREFIXES};
pub use log::{AlarmLogStore, InMemoryAlarmLog};
pub use notify::{NotificationService, TracingNotifier};
pub use pipeline::{AlarmPipeline, HandledAlarm};
pub use types::{AlarmRecord, AlarmType, Classification, NO_TRIGGER};
