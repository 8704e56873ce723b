pub mod api;
pub mod auth;
pub mod backoff;
pub mod clock;
pub mod config;
pub mod error;
pub mod estimator;
pub mod logger;
pub mod model;
pub mod progress;
pub mod repl;
pub mod reporter;
pub mod resume;
pub mod session;
pub mod storage;

mod macros;

#[cfg(test)]
mod testing;

pub mod prelude {
    pub use crate::api::{ApiError, Backend, HttpBackend, TrackRequest, TrackResponse};
    pub use crate::auth::{AuthError, TokenGuard};
    pub use crate::backoff::RateLimitPolicy;
    pub use crate::clock::{Clock, IntervalTicker, ManualClock, ManualTicker, SystemClock, Ticker};
    pub use crate::config::Config;
    pub use crate::estimator::resume_position;
    pub use crate::model::{CourseContext, CourseId, CourseProgress, Timestamp, VideoId, VideoViewState};
    pub use crate::reporter::{ProgressUpdate, ReportOutcome, Reporter};
    pub use crate::resume::{CourseResume, ResumeStore};
    pub use crate::session::{Notice, ProgressTracker, SessionSnapshot, TrackerHandle, VideoSession};
    pub use crate::storage::{FileStorage, MemoryStorage, Storage};
}
