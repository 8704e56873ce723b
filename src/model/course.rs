use serde::{Deserialize, Serialize};

use super::{clamp_percentage, CourseId, Timestamp, VideoId};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CourseProgress {
    pub completion_percentage: u8,
    pub is_completed: bool,
    pub last_video_id: VideoId,
    pub last_access_date: Timestamp,
}

impl CourseProgress {
    /// Local estimate used when the backend does not report course progress:
    /// every video at or before the current one counts as complete.
    pub fn local_fallback(course: &CourseContext, now: Timestamp) -> Self {
        let total = course.videos.len().max(1);
        let position = course.index().map_or(0, |index| index + 1);
        let completion_percentage = clamp_percentage(position as f64 / total as f64 * 100.0);

        Self {
            completion_percentage,
            is_completed: completion_percentage >= 100,
            last_video_id: course.current.clone(),
            last_access_date: now,
        }
    }
}

/// Where the tracked video sits inside its course.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CourseContext {
    pub course_id: CourseId,
    pub current: VideoId,
    /// every video of the course, in playback order
    #[serde(default)]
    pub videos: Vec<VideoId>,
}

impl CourseContext {
    pub fn index(&self) -> Option<usize> {
        self.videos.iter().position(|video| video == &self.current)
    }
}
