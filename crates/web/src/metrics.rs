use std::net::SocketAddr;
use std::sync::OnceLock;

use anyhow::Result;
use metrics::{describe_counter, describe_gauge};
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

static PROM_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

pub fn describe() {
    common::metrics::describe();
    describe_counter!(
        "sigbanner_banner_requests_total",
        "Banner requests by response status."
    );
    describe_gauge!(
        "sigbanner_web_build_info",
        "Build info for the banner service (value is always 1)."
    );
}

/// Install the global Prometheus recorder once, with a scrape listener on
/// `prometheus_port`, and return a handle for rendering `/metrics`.
///
/// Upkeep runs on each `/metrics` request.
pub fn init_global(prometheus_port: u16) -> Result<PrometheusHandle> {
    if let Some(handle) = PROM_HANDLE.get() {
        return Ok(handle.clone());
    }

    let addr: SocketAddr = ([0, 0, 0, 0], prometheus_port).into();
    let (recorder, exporter) = PrometheusBuilder::new().with_http_listener(addr).build()?;
    let handle = recorder.handle();
    ::metrics::set_global_recorder(recorder)
        .map_err(|e| anyhow::anyhow!("metrics recorder already installed: {e}"))?;
    tokio::spawn(exporter);

    describe();
    let git_sha = std::env::var("GIT_SHA").unwrap_or_else(|_| "unknown".to_string());
    ::metrics::gauge!(
        "sigbanner_web_build_info",
        "version" => env!("CARGO_PKG_VERSION"),
        "git_sha" => git_sha,
    )
    .set(1.0);

    Ok(PROM_HANDLE.get_or_init(|| handle).clone())
}
