use ::metrics::{describe_counter, describe_histogram};

pub fn describe() {
    describe_counter!(
        "sigbanner_upstream_requests_total",
        "Upstream requests by endpoint and status."
    );
    describe_histogram!(
        "sigbanner_upstream_latency_ms",
        "Upstream request latency in milliseconds."
    );
    describe_counter!(
        "sigbanner_cache_hits_total",
        "Requests served from a snapshot that was still fresh."
    );
    describe_counter!(
        "sigbanner_cache_refreshes_total",
        "Snapshots replaced after a successful upstream fetch."
    );
    describe_counter!(
        "sigbanner_cache_fallbacks_total",
        "Stale snapshots served because the upstream fetch failed."
    );
    describe_counter!(
        "sigbanner_banners_rendered_total",
        "Banners rendered, by theme."
    );
    describe_counter!(
        "sigbanner_assets_missing_total",
        "Optional banner assets that could not be loaded."
    );
}
