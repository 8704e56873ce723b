use snafu::{Location, Snafu};

use crate::api::ApiError;
use crate::config::ConfigError;
use crate::repl::ReplError;
use crate::storage::StorageError;

#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ApplicationError {
    /// could not read the configuration from the environment
    ConfigLoad {
        source: ConfigError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not initialize the logger
    InitializeLogger {
        source: tracing::subscriber::SetGlobalDefaultError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not open the client storage file
    OpenStorage {
        source: StorageError,
        #[snafu(implicit)]
        location: Location,
    },

    /// Could not build the HTTP client
    HttpClient {
        source: ApiError,
        #[snafu(implicit)]
        location: Location,
    },

    /// The interactive prompt failed
    Repl {
        source: ReplError,
        #[snafu(implicit)]
        location: Location,
    },
}
