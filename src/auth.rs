use std::sync::Arc;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine;
use chrono::Duration;
use serde::Deserialize;
use snafu::{OptionExt, ResultExt, Snafu};
use tracing::instrument;

use crate::api::Backend;
use crate::clock::Clock;
use crate::model::Timestamp;
use crate::storage::{Storage, ACCESS_TOKEN, REFRESH_TOKEN};

pub const DEFAULT_REFRESH_WINDOW_MS: i64 = 60_000;

#[derive(Debug, Clone, PartialEq, Eq, Snafu)]
pub enum AuthError {
    #[snafu(display("not authenticated, log in first"))]
    NotAuthenticated,
}

#[derive(Debug, Snafu)]
pub enum TokenDecodeError {
    #[snafu(display("token does not have three dot-separated segments"))]
    Segments,

    #[snafu(display("token payload is not base64: {source}"))]
    Base64 { source: base64::DecodeError },

    #[snafu(display("token payload is not a JSON claim set: {source}"))]
    Claims { source: serde_json::Error },

    #[snafu(display("token expiry `{exp}` is out of range"))]
    Expiry { exp: i64 },
}

#[derive(Debug, Deserialize)]
struct Claims {
    exp: i64,
}

/// Read the `exp` claim out of a JWT without verifying its signature.
pub fn token_expiry(token: &str) -> Result<Timestamp, TokenDecodeError> {
    let mut segments = token.split('.');
    let (Some(_header), Some(payload), Some(_signature), None) = (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) else {
        return SegmentsSnafu.fail();
    };

    // accept both alphabets, with or without padding
    let normalized: String = payload
        .trim_end_matches('=')
        .chars()
        .map(|c| match c {
            '+' => '-',
            '/' => '_',
            c => c,
        })
        .collect();

    let bytes = URL_SAFE_NO_PAD
        .decode(normalized.as_bytes())
        .context(Base64Snafu)?;
    let claims: Claims = serde_json::from_slice(&bytes).context(ClaimsSnafu)?;

    Timestamp::from_unix_seconds(claims.exp).context(ExpirySnafu { exp: claims.exp })
}

/// Keeps a usable bearer token in front of every tracked request.
///
/// This is best effort: when the token cannot be decoded or the refresh fails,
/// the current token is handed out anyway and the 401 path of the caller takes
/// over.
#[derive(Clone)]
pub struct TokenGuard {
    storage: Arc<dyn Storage>,
    backend: Arc<dyn Backend>,
    clock: Arc<dyn Clock>,
    refresh_window: Duration,
}

impl std::fmt::Debug for TokenGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenGuard")
            .field("refresh_window", &self.refresh_window)
            .finish_non_exhaustive()
    }
}

impl TokenGuard {
    pub fn new(storage: Arc<dyn Storage>, backend: Arc<dyn Backend>, clock: Arc<dyn Clock>) -> Self {
        Self {
            storage,
            backend,
            clock,
            refresh_window: Duration::milliseconds(DEFAULT_REFRESH_WINDOW_MS),
        }
    }

    pub fn with_refresh_window(mut self, refresh_window: Duration) -> Self {
        self.refresh_window = refresh_window;
        self
    }

    pub fn current(&self) -> Option<String> {
        self.storage.get(ACCESS_TOKEN).filter(|token| !token.is_empty())
    }

    /// Store the credentials issued at login.
    pub fn login(&self, access: String, refresh: Option<String>) -> crate::storage::Result<()> {
        self.storage.set(ACCESS_TOKEN, access)?;
        if let Some(refresh) = refresh {
            self.storage.set(REFRESH_TOKEN, refresh)?;
        }
        Ok(())
    }

    /// The token to send, refreshed first when it is about to expire.
    #[instrument(skip(self))]
    pub async fn token(&self) -> Result<String, AuthError> {
        let token = self.current().context(NotAuthenticatedSnafu)?;

        let expiry = match token_expiry(&token) {
            Ok(expiry) => expiry,
            Err(error) => {
                tracing::debug!(%error, "could not read token expiry, using it as is");
                return Ok(token);
            }
        };

        let remaining = expiry - self.clock.now();
        if remaining > self.refresh_window {
            return Ok(token);
        }

        tracing::info!(
            remaining_ms = remaining.num_milliseconds(),
            "access token is about to expire, refreshing"
        );
        Ok(self.refresh().await.unwrap_or(token))
    }

    /// Exchange the refresh token for a new access token.
    ///
    /// Returns `None` and leaves storage untouched when there is no refresh token
    /// or the backend refuses it.
    #[instrument(skip(self))]
    pub async fn refresh(&self) -> Option<String> {
        let Some(refresh_token) = self.storage.get(REFRESH_TOKEN) else {
            tracing::warn!("no refresh token stored, cannot refresh access token");
            return None;
        };

        let response = match self.backend.refresh(&refresh_token).await {
            Ok(response) => response,
            Err(error) => {
                tracing::warn!(%error, "token refresh failed");
                return None;
            }
        };

        if let Err(error) = self.storage.set(ACCESS_TOKEN, response.access.clone()) {
            tracing::error!(%error, "could not persist refreshed access token");
        }
        if let Some(refresh) = response.refresh {
            if let Err(error) = self.storage.set(REFRESH_TOKEN, refresh) {
                tracing::error!(%error, "could not persist refreshed refresh token");
            }
        }

        tracing::info!("access token refreshed");
        Some(response.access)
    }
}
