use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::model::{RemoteView, Timestamp, VideoId};

pub use error::*;
pub use http::*;

mod error;
mod http;

/// Body of `POST /api/courses/videos/{videoId}/track`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackRequest {
    pub watched_percentage: u8,
    pub is_completed: bool,
    pub last_position: f64,
    /// milliseconds
    pub view_duration: u64,
    pub timestamp: Timestamp,
    pub tracking_id: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackResponse {
    #[serde(default)]
    pub course_completion_percentage: Option<f64>,
    #[serde(default)]
    pub course_completed: Option<bool>,
}

#[derive(Debug, Clone, PartialEq, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewsResponse {
    #[serde(default)]
    pub video_view: Option<RemoteView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RefreshRequest<'a> {
    pub refresh_token: &'a str,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RefreshResponse {
    pub access: String,
    #[serde(default)]
    pub refresh: Option<String>,
}

/// The REST endpoints the tracker talks to.
#[async_trait]
pub trait Backend: Send + Sync {
    async fn track(
        &self,
        video_id: &VideoId,
        token: &str,
        request: &TrackRequest,
    ) -> Result<TrackResponse>;

    /// `Ok(None)` when the viewer has never opened the video.
    async fn views(&self, video_id: &VideoId, token: &str) -> Result<Option<RemoteView>>;

    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn track_request_wire_format() {
        let request = TrackRequest {
            watched_percentage: 42,
            is_completed: false,
            last_position: 126.5,
            view_duration: 3000,
            timestamp: Timestamp::from_unix_seconds(1_700_000_000).unwrap(),
            tracking_id: "abc".into(),
        };

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            serde_json::json!({
                "watchedPercentage": 42,
                "isCompleted": false,
                "lastPosition": 126.5,
                "viewDuration": 3000,
                "timestamp": "2023-11-14T22:13:20.000Z",
                "trackingId": "abc",
            })
        );
    }

    #[test]
    fn track_response_fields_are_optional() {
        let response: TrackResponse = serde_json::from_str(r#"{"message": "ok"}"#).unwrap();
        assert_eq!(response, TrackResponse::default());

        let response: TrackResponse =
            serde_json::from_str(r#"{"courseCompletionPercentage": 37.5, "courseCompleted": false}"#)
                .unwrap();
        assert_eq!(response.course_completion_percentage, Some(37.5));
    }

    #[test]
    fn views_response_may_be_null() {
        let response: ViewsResponse = serde_json::from_str(r#"{"videoView": null}"#).unwrap();
        assert_eq!(response.video_view, None);
    }
}
