use anyhow::Result;
use common::banner::Compositor;
use common::cache::{unix_now, HiscoreCache};
use common::runescape::RuneScapeClient;

mod cli;

#[tokio::main]
async fn main() -> Result<()> {
    let config = common::config::Config::load()?;

    let (dispatch, _otel_guard) = common::observability::build_dispatch(
        "sigctl",
        &config.general.log_level,
        config.general.log_format,
    );
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    let cmd = cli::parse_args(std::env::args()).map_err(anyhow::Error::msg)?;
    tracing::debug!(?cmd, "sigctl starting");

    let client = RuneScapeClient::new(&config.runescape)?;
    let cache = HiscoreCache::new(config.cache.ledger(), config.cache.store(), client);
    let compositor = Compositor::new(&config.banner.resources_dir);
    let session = cli::Session {
        cache: &cache,
        compositor: &compositor,
        default_theme: config.banner.default_theme,
        now: unix_now(),
    };
    cli::run_command(&session, cmd).await
}
