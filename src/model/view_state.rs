use derive_new::new;
use serde::{Deserialize, Serialize};

use super::{Timestamp, VideoId};

/// What the viewer has seen of a single video, as the page sees it.
///
/// This mirrors the server-side view record for the (user, video) pair. Use
/// [VideoViewState::new] to build one so the percentage and position invariants
/// hold.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoViewState {
    pub video_id: VideoId,
    pub watched_percentage: u8,
    pub is_completed: bool,
    /// seconds
    pub last_position: f64,
    /// milliseconds
    pub view_duration: u64,
    pub timestamp: Timestamp,
}

impl VideoViewState {
    pub fn new(
        video_id: VideoId,
        watched_percentage: f64,
        is_completed: bool,
        last_position: f64,
        view_duration: u64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            video_id,
            watched_percentage: clamp_percentage(watched_percentage),
            is_completed,
            last_position: clamp_position(last_position, None),
            view_duration,
            timestamp,
        }
    }

    /// Clamp `last_position` into the bounds of a video whose duration is now known.
    pub fn with_duration(mut self, duration: f64) -> Self {
        self.last_position = clamp_position(self.last_position, Some(duration));
        self
    }
}

/// Round and clamp into `0..=100`. Non-finite input counts as no progress.
pub fn clamp_percentage(value: f64) -> u8 {
    if !value.is_finite() {
        return 0;
    }

    value.round().clamp(0.0, 100.0) as u8
}

pub fn clamp_position(position: f64, duration: Option<f64>) -> f64 {
    if !position.is_finite() || position < 0.0 {
        return 0.0;
    }

    match duration {
        Some(duration) if duration.is_finite() && duration >= 0.0 => position.min(duration),
        _ => position,
    }
}

/// A prior view record as `GET /api/courses/videos/{videoId}/views` returns it.
///
/// Field casing follows the backend. Every field is optional since older view
/// rows may lack the position column entirely.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, new)]
pub struct RemoteView {
    #[serde(rename = "WatchedPercentage", default)]
    pub watched_percentage: Option<f64>,
    #[serde(rename = "IsCompleted", default)]
    pub is_completed: Option<Flag>,
    #[serde(rename = "lastPosition", default)]
    pub last_position: Option<f64>,
    #[serde(rename = "ViewDate", default)]
    pub view_date: Option<String>,
}

impl RemoteView {
    pub fn into_state(self, video_id: VideoId, fallback_time: Timestamp) -> VideoViewState {
        let timestamp = self
            .view_date
            .as_deref()
            .and_then(Timestamp::parse_lenient)
            .unwrap_or(fallback_time);

        VideoViewState::new(
            video_id,
            self.watched_percentage.unwrap_or_default(),
            self.is_completed.is_some_and(Flag::is_set),
            self.last_position.unwrap_or_default(),
            0,
            timestamp,
        )
    }
}

/// A boolean column that some endpoints serialise as `0`/`1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Flag {
    Bool(bool),
    Int(i64),
}

impl Flag {
    pub fn is_set(self) -> bool {
        match self {
            Flag::Bool(value) => value,
            Flag::Int(value) => value != 0,
        }
    }
}
