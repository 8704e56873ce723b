use std::sync::Arc;

use chrono::Duration;
use derive_new::new;
use serde::{Deserialize, Serialize};
use snafu::ResultExt;

use crate::model::{CourseId, Timestamp, VideoId, VideoViewState};
use crate::storage::{self, course_state_key, SerializeSnafu, Storage};

/// Entries older than this are dropped instead of resumed.
pub const STALE_AFTER_DAYS: i64 = 7;

/// Where a viewer left a course, kept across sessions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, new)]
#[serde(rename_all = "camelCase")]
pub struct CourseResume {
    pub last_video_id: VideoId,
    pub timestamp: Timestamp,
    /// seconds into `last_video_id`
    pub position: f64,
}

impl CourseResume {
    /// The entry as a prior view of `video_id`, if it is the video the viewer left off in.
    pub fn view_of(&self, video_id: &VideoId) -> Option<VideoViewState> {
        if &self.last_video_id != video_id || self.position <= 0.0 {
            return None;
        }

        Some(VideoViewState::new(
            video_id.clone(),
            0.0,
            false,
            self.position,
            0,
            self.timestamp,
        ))
    }
}

#[derive(Clone)]
pub struct ResumeStore {
    storage: Arc<dyn Storage>,
}

impl std::fmt::Debug for ResumeStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResumeStore").finish_non_exhaustive()
    }
}

impl ResumeStore {
    pub fn new(storage: Arc<dyn Storage>) -> Self {
        Self { storage }
    }

    pub fn save(&self, course_id: &CourseId, resume: &CourseResume) -> storage::Result<()> {
        let key = course_state_key(course_id);
        let value = serde_json::to_string(resume).context(SerializeSnafu { key: &key })?;
        self.storage.set(&key, value)
    }

    /// The saved entry for `course_id`, unless it is missing, unreadable or stale.
    /// Unreadable and stale entries are removed.
    pub fn load(&self, course_id: &CourseId, now: Timestamp) -> Option<CourseResume> {
        let key = course_state_key(course_id);
        let raw = self.storage.get(&key)?;

        match serde_json::from_str::<CourseResume>(&raw) {
            Ok(resume) if now - resume.timestamp <= Duration::days(STALE_AFTER_DAYS) => Some(resume),
            Ok(resume) => {
                tracing::info!(%course_id, saved_at = %resume.timestamp, "discarding stale course resume state");
                self.discard(&key)
            }
            Err(error) => {
                tracing::warn!(%course_id, %error, "discarding unreadable course resume state");
                self.discard(&key)
            }
        }
    }

    fn discard(&self, key: &str) -> Option<CourseResume> {
        if let Err(error) = self.storage.remove(key) {
            tracing::warn!(key, %error, "could not remove course resume state");
        }
        None
    }
}
