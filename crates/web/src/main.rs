mod metrics;

use anyhow::{Context, Result};
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use common::banner::sources;
use common::banner::Compositor;
use common::cache::{self, CacheError, HiscoreCache};
use common::config::Config;
use common::fetcher::HiscoreFetcher;
use common::runescape::RuneScapeClient;
use common::subject::{Subject, SubjectError};
use metrics_exporter_prometheus::PrometheusHandle;
use serde::Deserialize;
use std::net::SocketAddr;
use std::sync::Arc;
use tower_http::trace::TraceLayer;

pub struct AppState<F> {
    pub cache: HiscoreCache<F>,
    pub compositor: Compositor,
    pub default_theme: usize,
    /// When set, only members of this clan get a banner.
    pub whitelist: Option<Subject>,
    pub prometheus: Option<PrometheusHandle>,
}

#[derive(Debug, Deserialize)]
struct BannerQuery {
    user: Option<String>,
    theme: Option<String>,
}

/// Failure modes of `/banner`. Every one answers with an empty body.
#[derive(Debug)]
enum BannerError {
    InvalidSubject(SubjectError),
    NotWhitelisted,
    Cache(CacheError),
    Render(String),
}

impl From<CacheError> for BannerError {
    fn from(e: CacheError) -> Self {
        Self::Cache(e)
    }
}

impl IntoResponse for BannerError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::InvalidSubject(e) => {
                tracing::debug!(error = %e, "rejected banner request");
                StatusCode::BAD_REQUEST
            }
            Self::NotWhitelisted => StatusCode::FORBIDDEN,
            Self::Cache(e @ CacheError::Unavailable { .. }) => {
                tracing::warn!(error = %e, "banner unavailable");
                StatusCode::SERVICE_UNAVAILABLE
            }
            Self::Cache(e) => {
                tracing::error!(error = %e, "banner failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Render(e) => {
                tracing::error!(error = %e, "banner render failed");
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        ::metrics::counter!("sigbanner_banner_requests_total", "status" => status.as_str().to_string())
            .increment(1);
        status.into_response()
    }
}

// --- Handlers ---

async fn banner<F>(
    State(state): State<Arc<AppState<F>>>,
    Query(query): Query<BannerQuery>,
) -> Response
where
    F: HiscoreFetcher + Send + Sync + 'static,
{
    match render_banner(state, query).await {
        Ok(png) => {
            ::metrics::counter!("sigbanner_banner_requests_total", "status" => "200").increment(1);
            ([(header::CONTENT_TYPE, "image/png")], png).into_response()
        }
        Err(e) => e.into_response(),
    }
}

/// Negative indexes clamp to the first theme; anything non-numeric uses `default`.
fn theme_index(raw: Option<&str>, default: usize) -> usize {
    raw.and_then(|t| t.trim().parse::<i64>().ok())
        .map_or(default, |t| usize::try_from(t.max(0)).unwrap_or(usize::MAX))
}

async fn render_banner<F>(state: Arc<AppState<F>>, query: BannerQuery) -> Result<Vec<u8>, BannerError>
where
    F: HiscoreFetcher + Send + Sync + 'static,
{
    let player = Subject::player(query.user.as_deref().unwrap_or_default())
        .map_err(BannerError::InvalidSubject)?;
    let theme = theme_index(query.theme.as_deref(), state.default_theme);
    let now = cache::unix_now();

    if let Some(clan) = &state.whitelist {
        let roster = state.cache.clan(clan, now).await?;
        if !roster.is_member(player.display_name()) {
            tracing::info!(player = %player, clan = %clan, "player not on clan roster");
            return Err(BannerError::NotWhitelisted);
        }
    }

    let sources = sources::gather(&state.cache, &player, now).await?;
    let render_state = Arc::clone(&state);
    let encoded = tokio::task::spawn_blocking(move || {
        let banner = render_state.compositor.render(&sources.request(theme));
        if !banner.missing.is_empty() {
            tracing::debug!(player = %sources.card.name, missing = banner.missing.len(), "banner rendered with gaps");
        }
        banner.encode_png()
    })
    .await
    .map_err(|e| BannerError::Render(e.to_string()))?;
    encoded.map_err(|e| BannerError::Render(e.to_string()))
}

async fn health() -> &'static str {
    "ok"
}

async fn prometheus_metrics<F>(State(state): State<Arc<AppState<F>>>) -> Response {
    let Some(handle) = &state.prometheus else {
        return StatusCode::NOT_FOUND.into_response();
    };
    handle.run_upkeep();
    (
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4")],
        handle.render(),
    )
        .into_response()
}

// --- Router ---

pub fn create_router_with_state<F>(state: Arc<AppState<F>>) -> Router
where
    F: HiscoreFetcher + Send + Sync + 'static,
{
    Router::new()
        .route("/banner", get(banner::<F>))
        .route("/health", get(health))
        .route("/metrics", get(prometheus_metrics::<F>))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn whitelist_clan(config: &Config) -> Result<Option<Subject>> {
    if !config.clan.enforce_whitelist {
        return Ok(None);
    }
    let name = config
        .clan
        .name
        .as_deref()
        .context("[clan] enforce_whitelist is set but no clan name is configured")?;
    Ok(Some(Subject::clan(name)?))
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;

    let (dispatch, _otel_guard) = common::observability::build_dispatch(
        "sigbanner-web",
        &config.general.log_level,
        config.general.log_format,
    );
    tracing::dispatcher::set_global_default(dispatch).map_err(anyhow::Error::msg)?;

    let prometheus = metrics::init_global(config.observability.prometheus_port)?;

    let web_port = config.web.as_ref().map_or(8080, |w| w.port);
    let web_host = config
        .web
        .as_ref()
        .map_or("0.0.0.0".to_string(), |w| w.host.clone());

    let client = RuneScapeClient::new(&config.runescape)?;
    let state = Arc::new(AppState {
        cache: HiscoreCache::new(config.cache.ledger(), config.cache.store(), client),
        compositor: Compositor::new(&config.banner.resources_dir),
        default_theme: config.banner.default_theme,
        whitelist: whitelist_clan(&config)?,
        prometheus: Some(prometheus),
    });

    let app = create_router_with_state(state);
    let addr: SocketAddr = format!("{web_host}:{web_port}").parse()?;
    tracing::info!("banner service listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
