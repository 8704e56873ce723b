use std::sync::Arc;

use tracing::instrument;

use crate::api::{ApiError, Backend, TrackRequest, TrackResponse};
use crate::auth::TokenGuard;
use crate::backoff::RateLimitPolicy;
use crate::clock::Clock;
use crate::model::{VideoId, VideoViewState};

/// How a single report attempt ended.
#[derive(Debug, Clone, PartialEq)]
pub enum ReportOutcome {
    Success(TrackResponse),
    /// The backend kept answering 401 after one refresh and one retry.
    AuthRetryExhausted,
    RateLimited,
    /// Worth trying again later: network trouble or a server error.
    TransientError { message: String },
    /// Retrying the same request will not help.
    FatalError { message: String },
}

impl ReportOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, ReportOutcome::Success(_))
    }

    fn from_error(error: ApiError) -> Self {
        match error {
            ApiError::Unauthorized { .. } => ReportOutcome::AuthRetryExhausted,
            ApiError::RateLimited { .. } => ReportOutcome::RateLimited,
            error if error.is_transient() => ReportOutcome::TransientError {
                message: error.to_string(),
            },
            error => ReportOutcome::FatalError {
                message: error.to_string(),
            },
        }
    }
}

impl std::fmt::Display for ReportOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReportOutcome::Success(_) => f.write_str("progress saved"),
            ReportOutcome::AuthRetryExhausted => {
                f.write_str("progress not saved: session expired, log in again")
            }
            ReportOutcome::RateLimited => f.write_str("progress not saved: too many requests"),
            ReportOutcome::TransientError { message } => {
                write!(f, "progress not saved, try again: {message}")
            }
            ReportOutcome::FatalError { message } => write!(f, "progress not saved: {message}"),
        }
    }
}

/// One progress snapshot, before it gets a tracking id.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressUpdate {
    pub watched_percentage: u8,
    pub is_completed: bool,
    pub last_position: f64,
    pub view_duration: u64,
}

impl ProgressUpdate {
    pub fn into_request(self, clock: &dyn Clock) -> TrackRequest {
        TrackRequest {
            watched_percentage: self.watched_percentage,
            is_completed: self.is_completed,
            last_position: self.last_position,
            view_duration: self.view_duration,
            timestamp: clock.now(),
            tracking_id: uuid::Uuid::new_v4().to_string(),
        }
    }
}

/// Sends progress reports through the [TokenGuard].
#[derive(Clone)]
pub struct Reporter {
    backend: Arc<dyn Backend>,
    guard: TokenGuard,
    clock: Arc<dyn Clock>,
    rate_limit: RateLimitPolicy,
}

impl std::fmt::Debug for Reporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Reporter")
            .field("guard", &self.guard)
            .field("rate_limit", &self.rate_limit)
            .finish_non_exhaustive()
    }
}

impl Reporter {
    pub fn new(backend: Arc<dyn Backend>, guard: TokenGuard, clock: Arc<dyn Clock>) -> Self {
        Self {
            backend,
            guard,
            clock,
            rate_limit: RateLimitPolicy::default(),
        }
    }

    pub fn with_rate_limit(mut self, rate_limit: RateLimitPolicy) -> Self {
        self.rate_limit = rate_limit;
        self
    }

    pub fn guard(&self) -> &TokenGuard {
        &self.guard
    }

    pub fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }

    /// Check the token, send, and on a 401 refresh once and send once more.
    #[instrument(skip(self, update), fields(percentage = update.watched_percentage))]
    pub async fn report(&self, video_id: &VideoId, update: ProgressUpdate) -> ReportOutcome {
        let token = match self.guard.token().await {
            Ok(token) => token,
            Err(error) => {
                tracing::warn!(%error, "not reporting progress");
                return ReportOutcome::FatalError {
                    message: error.to_string(),
                };
            }
        };

        let request = update.into_request(self.clock());
        tracing::debug!(tracking_id = %request.tracking_id, ?request, "sending progress report");

        let error = match self.send(video_id, &token, &request).await {
            Ok(response) => return self.succeeded(&request, response),
            Err(error) if error.is_unauthorized() => error,
            Err(error) => return self.failed(&request, error),
        };

        tracing::info!(%error, tracking_id = %request.tracking_id, "report unauthorized, refreshing token once");
        let Some(token) = self.guard.refresh().await else {
            tracing::warn!(tracking_id = %request.tracking_id, "token refresh failed, giving up");
            return ReportOutcome::AuthRetryExhausted;
        };

        match self.send(video_id, &token, &request).await {
            Ok(response) => self.succeeded(&request, response),
            Err(error) => self.failed(&request, error),
        }
    }

    /// The viewer's previous view of a video, if the backend knows one.
    ///
    /// Lookup failures are logged and treated as a first view.
    #[instrument(skip(self))]
    pub async fn fetch_view(&self, video_id: &VideoId) -> Option<VideoViewState> {
        let token = match self.guard.token().await {
            Ok(token) => token,
            Err(error) => {
                tracing::warn!(%error, "cannot look up previous view");
                return None;
            }
        };

        match self.backend.views(video_id, &token).await {
            Ok(view) => view.map(|view| view.into_state(video_id.clone(), self.clock.now())),
            Err(error) => {
                tracing::warn!(%error, "could not fetch previous view, starting from the beginning");
                None
            }
        }
    }

    async fn send(
        &self,
        video_id: &VideoId,
        token: &str,
        request: &TrackRequest,
    ) -> Result<TrackResponse, ApiError> {
        let backend = self.backend.as_ref();
        self.rate_limit
            .run(move || backend.track(video_id, token, request))
            .await
    }

    fn succeeded(&self, request: &TrackRequest, response: TrackResponse) -> ReportOutcome {
        tracing::info!(
            tracking_id = %request.tracking_id,
            percentage = request.watched_percentage,
            completed = request.is_completed,
            "progress saved"
        );
        ReportOutcome::Success(response)
    }

    fn failed(&self, request: &TrackRequest, error: ApiError) -> ReportOutcome {
        tracing::error!(%error, tracking_id = %request.tracking_id, "progress report failed");
        ReportOutcome::from_error(error)
    }
}
