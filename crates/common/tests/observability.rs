use common::config::LogFormat;
use metrics_exporter_prometheus::PrometheusBuilder;

// Integration test so it exercises the public `common::observability` surface.

#[test]
fn tracing_error_events_counter_increments_on_error_event() {
    for format in [LogFormat::Json, LogFormat::Pretty] {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let (dispatch, _otel_guard) =
                common::observability::build_dispatch("test-service", "info", format);

            tracing::dispatcher::with_default(&dispatch, || {
                tracing::error!(subject = "user:zezima", "boom");
            });
        });

        let rendered = handle.render();
        assert!(
            rendered.contains("tracing_error_events"),
            "expected tracing_error_events in rendered metrics for {format:?}, got:\n{rendered}"
        );
    }
}
