use std::sync::Arc;

use dotenvy::dotenv;
use snafu::ResultExt;

use wisentia_tracker::clock::SystemClock;
use wisentia_tracker::config::Config;
use wisentia_tracker::error::{
    ApplicationError, ConfigLoadSnafu, HttpClientSnafu, OpenStorageSnafu, ReplSnafu,
};
use wisentia_tracker::repl::{self, Repl};
use wisentia_tracker::{logger, storage::Storage};

#[tokio::main]
async fn main() -> Result<(), ApplicationError> {
    dotenv().ok();

    let config = Config::from_env().context(ConfigLoadSnafu)?;

    let _guard = logger::init(&config)?;

    let storage: Arc<dyn Storage> = Arc::new(config.storage().context(OpenStorageSnafu)?);
    let backend = Arc::new(config.backend().context(HttpClientSnafu)?);
    let reporter = config.reporter(backend, storage.clone(), Arc::new(SystemClock));

    let mut repl = Repl::new().context(ReplSnafu)?;
    repl::start(&mut repl, &config, reporter, storage)
        .await
        .context(ReplSnafu)
}
