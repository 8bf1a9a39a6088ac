use std::env;

use devmatch_server::config::Config;
use devmatch_server::State;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    fmt().with_env_filter(EnvFilter::from_default_env()).init();

    let config = Config::load()?.with_args(env::args())?;
    info!(db = %config.db_path, "opening store");
    let state = State::new(config)?;
    devmatch_server::serve(state).await
}
