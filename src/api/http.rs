use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, CACHE_CONTROL, EXPIRES, PRAGMA};
use reqwest::{RequestBuilder, StatusCode};
use serde::de::DeserializeOwned;
use snafu::ResultExt;
use tracing::instrument;
use url::Url;

use super::*;

pub const TRACKING_ID_HEADER: &str = "X-Tracking-ID";

#[derive(Debug, Clone)]
pub struct HttpBackend {
    client: reqwest::Client,
    base: Url,
}

impl HttpBackend {
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context(RequestSnafu {
                endpoint: base.to_string(),
            })?;

        Ok(Self::with_client(client, base))
    }

    pub fn with_client(client: reqwest::Client, mut base: Url) -> Self {
        // `Url::join` replaces the last segment unless the base ends with a slash
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }

        Self { client, base }
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        self.base.join(path).context(EndpointSnafu { endpoint: path })
    }

    async fn execute<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        request: RequestBuilder,
    ) -> Result<Option<T>> {
        let response = request.send().await.context(RequestSnafu { endpoint })?;
        let status = response.status();
        let body = response.text().await.context(RequestSnafu { endpoint })?;

        match status {
            StatusCode::UNAUTHORIZED => return UnauthorizedSnafu { endpoint }.fail(),
            StatusCode::TOO_MANY_REQUESTS => return RateLimitedSnafu { endpoint }.fail(),
            StatusCode::NOT_FOUND => return Ok(None),
            status if !status.is_success() => {
                return StatusSnafu {
                    endpoint,
                    status: status.as_u16(),
                    body,
                }
                .fail()
            }
            _ => {}
        }

        match serde_json::from_str(&body) {
            Ok(value) => Ok(Some(value)),
            Err(source) => {
                tracing::error!(endpoint, %body, error = %source, "could not parse response body");
                Err(source).context(ParseSnafu { endpoint, body })
            }
        }
    }
}

fn no_cache_headers() -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    headers.insert(PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(EXPIRES, HeaderValue::from_static("0"));
    headers
}

#[async_trait]
impl Backend for HttpBackend {
    #[instrument(skip(self, token, request), fields(tracking_id = %request.tracking_id))]
    async fn track(
        &self,
        video_id: &VideoId,
        token: &str,
        request: &TrackRequest,
    ) -> Result<TrackResponse> {
        let endpoint = format!("api/courses/videos/{video_id}/track");
        let url = self.endpoint(&endpoint)?;

        let builder = self
            .client
            .post(url)
            .bearer_auth(token)
            .headers(no_cache_headers())
            .header(TRACKING_ID_HEADER, request.tracking_id.as_str())
            .json(request);

        let response: Option<TrackResponse> = self.execute(&endpoint, builder).await?;

        // a 404 here means the video is gone, which is not "nothing to report"
        response.ok_or_else(|| ApiError::Status {
            endpoint,
            status: StatusCode::NOT_FOUND.as_u16(),
            body: String::new(),
        })
    }

    #[instrument(skip(self, token))]
    async fn views(&self, video_id: &VideoId, token: &str) -> Result<Option<RemoteView>> {
        let endpoint = format!("api/courses/videos/{video_id}/views");
        let url = self.endpoint(&endpoint)?;

        let builder = self
            .client
            .get(url)
            .bearer_auth(token)
            .headers(no_cache_headers());

        let response: Option<ViewsResponse> = self.execute(&endpoint, builder).await?;
        Ok(response.and_then(|response| response.video_view))
    }

    #[instrument(skip_all)]
    async fn refresh(&self, refresh_token: &str) -> Result<RefreshResponse> {
        let endpoint = "api/auth/refresh-token";
        let url = self.endpoint(endpoint)?;

        let builder = self
            .client
            .post(url)
            .json(&RefreshRequest { refresh_token });

        let response: Option<RefreshResponse> = self.execute(endpoint, builder).await?;

        response.ok_or_else(|| ApiError::Status {
            endpoint: endpoint.to_string(),
            status: StatusCode::NOT_FOUND.as_u16(),
            body: String::new(),
        })
    }
}
