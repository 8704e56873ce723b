use snafu::Snafu;

pub type Result<T, E = ApiError> = ::std::result::Result<T, E>;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApiError {
    #[snafu(display("cannot build url for endpoint `{endpoint}`: {source}"))]
    Endpoint {
        endpoint: String,
        source: url::ParseError,
    },

    #[snafu(display("request to `{endpoint}` failed: {source}"))]
    Request {
        endpoint: String,
        source: reqwest::Error,
    },

    #[snafu(display("`{endpoint}` rejected the bearer token"))]
    Unauthorized { endpoint: String },

    #[snafu(display("`{endpoint}` is rate limiting this client"))]
    RateLimited { endpoint: String },

    #[snafu(display("`{endpoint}` responded with status {status}: {body}"))]
    Status {
        endpoint: String,
        status: u16,
        body: String,
    },

    #[snafu(display("malformed response from `{endpoint}`: {source}"))]
    Parse {
        endpoint: String,
        body: String,
        source: serde_json::Error,
    },
}

impl ApiError {
    /// Failures that may go away on their own: connection problems, timeouts and
    /// server-side errors.
    pub fn is_transient(&self) -> bool {
        match self {
            ApiError::Request { .. } => true,
            ApiError::Status { status, .. } => *status >= 500,
            _ => false,
        }
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, ApiError::Unauthorized { .. })
    }

    pub fn is_rate_limited(&self) -> bool {
        matches!(self, ApiError::RateLimited { .. })
    }
}
