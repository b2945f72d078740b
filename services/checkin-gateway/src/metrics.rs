//! Prometheus metrics exposition
//!
//! - `gateway_requests_total` (counter): labels `status`, `route`
//! - `gateway_request_duration_seconds` (histogram): label `route`
//! - `gateway_token_exchanges_total` (counter): label `outcome`
//! - `gateway_dropped_messages_total` (counter)

use metrics_exporter_prometheus::{BuildError, Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "gateway_request_duration_seconds";

/// 5ms to 30s; `/qr` waits on several Gmail round trips.
const DURATION_BUCKETS: &[f64] = &[
    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0,
];

fn builder() -> Result<PrometheusBuilder, BuildError> {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
}

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// The duration metric gets explicit buckets so it renders as a Prometheus
/// histogram (`_bucket` lines) rather than the default summary.
pub fn install_recorder() -> Result<PrometheusHandle, BuildError> {
    builder()?.install_recorder()
}

/// Record a completed request. `route` is the matched route template, not
/// the raw path, so user names never become label values.
pub fn record_request(status: u16, route: &str, duration_secs: f64) {
    metrics::counter!("gateway_requests_total", "status" => status.to_string(), "route" => route.to_string())
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "route" => route.to_string()).record(duration_secs);
}

/// Record the outcome of an authorization-code exchange.
pub fn record_token_exchange(outcome: &str) {
    metrics::counter!("gateway_token_exchanges_total", "outcome" => outcome.to_string())
        .increment(1);
}

/// Record messages dropped from a batch because their details failed.
pub fn record_dropped_messages(count: usize) {
    if count > 0 {
        metrics::counter!("gateway_dropped_messages_total").increment(count as u64);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        record_request(200, "/health", 0.05);
        record_token_exchange("success");
        record_dropped_messages(2);
    }

    /// Isolated recorder/handle pair; `install_recorder()` can only succeed
    /// once per process.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = builder().unwrap().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_request_increments_counter_and_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request(200, "/qr/{name}", 0.042);
        record_request(400, "/oauth2callback", 0.001);

        let output = handle.render();
        assert!(output.contains("gateway_requests_total"));
        assert!(output.contains("status=\"200\""));
        assert!(output.contains("route=\"/qr/{name}\""));
        assert!(output.contains("status=\"400\""));
        assert!(
            output.contains("gateway_request_duration_seconds_bucket"),
            "histogram must render _bucket lines for histogram_quantile() queries"
        );
    }

    #[test]
    fn token_exchange_outcomes_are_labelled() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_token_exchange("success");
        record_token_exchange("rejected");

        let output = handle.render();
        assert!(output.contains("outcome=\"success\""));
        assert!(output.contains("outcome=\"rejected\""));
    }

    #[test]
    fn dropped_messages_accumulate() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_dropped_messages(1);
        record_dropped_messages(0);
        record_dropped_messages(2);

        let output = handle.render();
        assert!(
            output.contains("gateway_dropped_messages_total 3"),
            "got: {output}"
        );
    }

    #[test]
    fn histogram_buckets_cover_range() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request(200, "/health", 0.003);

        let output = handle.render();
        assert!(output.contains("le=\"0.005\""), "5ms bucket must exist");
        assert!(output.contains("le=\"30\""), "30s bucket must exist");
        assert!(output.contains("le=\"+Inf\""));
    }
}
