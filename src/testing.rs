//! Test doubles shared by the unit tests.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;

use crate::api::{self, ApiError, Backend, RefreshResponse, TrackRequest, TrackResponse};
use crate::model::{RemoteView, Timestamp, VideoId};

/// A JWT-shaped token whose payload carries the given expiry.
pub fn jwt_expiring_at(expiry: Timestamp) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{},"sub":"4"}}"#, expiry.timestamp()));
    format!("{header}.{payload}.c2lnbmF0dXJl")
}

/// Status `0` stands for a 200 with a body that is not JSON.
pub fn api_error(endpoint: &str, status: u16) -> ApiError {
    let endpoint = endpoint.to_string();
    match status {
        0 => ApiError::Parse {
            endpoint,
            body: "<html>".into(),
            source: serde_json::from_str::<TrackResponse>("<html>").unwrap_err(),
        },
        401 => ApiError::Unauthorized { endpoint },
        429 => ApiError::RateLimited { endpoint },
        status => ApiError::Status {
            endpoint,
            status,
            body: String::new(),
        },
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackCall {
    pub video_id: VideoId,
    pub token: String,
    pub request: TrackRequest,
}

/// Answers from queues filled by the test, and records every call.
///
/// With an empty queue `track` succeeds with an empty response, `views` finds
/// nothing and `refresh` is refused.
#[derive(Debug, Default)]
pub struct ScriptedBackend {
    track: Mutex<VecDeque<Result<TrackResponse, u16>>>,
    views: Mutex<VecDeque<Result<Option<RemoteView>, u16>>>,
    refresh: Mutex<VecDeque<Result<(String, Option<String>), u16>>>,

    track_calls: Mutex<Vec<TrackCall>>,
    refresh_calls: Mutex<usize>,
}

impl ScriptedBackend {
    pub fn push_track(&self, result: Result<TrackResponse, u16>) {
        self.track.lock().unwrap().push_back(result);
    }

    pub fn push_views(&self, result: Result<Option<RemoteView>, u16>) {
        self.views.lock().unwrap().push_back(result);
    }

    pub fn push_refresh(&self, result: Result<(String, Option<String>), u16>) {
        self.refresh.lock().unwrap().push_back(result);
    }

    pub fn track_calls(&self) -> Vec<TrackCall> {
        self.track_calls.lock().unwrap().clone()
    }

    pub fn reported_percentages(&self) -> Vec<u8> {
        self.track_calls()
            .iter()
            .map(|call| call.request.watched_percentage)
            .collect()
    }

    pub fn refresh_calls(&self) -> usize {
        *self.refresh_calls.lock().unwrap()
    }
}

#[async_trait]
impl Backend for ScriptedBackend {
    async fn track(
        &self,
        video_id: &VideoId,
        token: &str,
        request: &TrackRequest,
    ) -> api::Result<TrackResponse> {
        self.track_calls.lock().unwrap().push(TrackCall {
            video_id: video_id.clone(),
            token: token.to_string(),
            request: request.clone(),
        });

        let next = self.track.lock().unwrap().pop_front();
        next.unwrap_or(Ok(TrackResponse::default()))
            .map_err(|status| api_error("track", status))
    }

    async fn views(&self, _video_id: &VideoId, _token: &str) -> api::Result<Option<RemoteView>> {
        let next = self.views.lock().unwrap().pop_front();
        next.unwrap_or(Ok(None))
            .map_err(|status| api_error("views", status))
    }

    async fn refresh(&self, _refresh_token: &str) -> api::Result<RefreshResponse> {
        *self.refresh_calls.lock().unwrap() += 1;

        let next = self.refresh.lock().unwrap().pop_front();
        next.unwrap_or(Err(401))
            .map(|(access, refresh)| RefreshResponse { access, refresh })
            .map_err(|status| api_error("refresh", status))
    }
}
