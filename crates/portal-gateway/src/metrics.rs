//! Gateway metrics
//!
//! Records the instruments consumed by the operations dashboards:
//!
//! - `gateway_requests_total` (counter): labels `method`, `outcome`
//! - `gateway_request_duration_seconds` (histogram): label `outcome`
//! - `gateway_credential_refreshes_total` (counter): label `outcome`
//! - `gateway_session_invalidations_total` (counter)
//!
//! These are facade calls; installing a recorder is the embedding
//! application's concern.

use std::time::Duration;

/// Record a completed request with its method and outcome labels.
///
/// `outcome` is one of `success`, `network`, `http`, `request`.
pub(crate) fn record_request(method: &str, outcome: &str, duration: Duration) {
    metrics::counter!("gateway_requests_total", "method" => method.to_string(), "outcome" => outcome.to_string())
        .increment(1);
    metrics::histogram!("gateway_request_duration_seconds", "outcome" => outcome.to_string())
        .record(duration.as_secs_f64());
}

/// Record a settled credential refresh (`success` or `failure`).
pub(crate) fn record_refresh(outcome: &'static str) {
    metrics::counter!("gateway_credential_refreshes_total", "outcome" => outcome).increment(1);
}

/// Record an irrecoverable session invalidation.
pub(crate) fn record_session_invalidated() {
    metrics::counter!("gateway_session_invalidations_total").increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle, PrometheusRecorder};

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        // When no recorder is installed, metrics calls are no-ops.
        // This verifies the functions don't panic in test environments.
        record_request("GET", "success", Duration::from_millis(5));
        record_refresh("failure");
        record_session_invalidated();
    }

    /// Create an isolated recorder/handle pair for unit tests.
    /// Uses build_recorder() instead of install_recorder() to avoid the
    /// global recorder singleton constraint: only one global recorder can
    /// exist per process, and install_recorder() panics on a second call.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_request_increments_counter_and_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("GET", "success", Duration::from_millis(42));
        record_request("POST", "http", Duration::from_secs(1));

        let output = handle.render();
        assert!(
            output.contains("gateway_requests_total"),
            "rendered output must contain gateway_requests_total counter"
        );
        assert!(
            output.contains("method=\"GET\""),
            "counter must carry method label"
        );
        assert!(
            output.contains("outcome=\"success\""),
            "counter must carry outcome label"
        );
        assert!(
            output.contains("outcome=\"http\""),
            "second request outcome label must appear"
        );
        assert!(
            output.contains("gateway_request_duration_seconds"),
            "histogram must be recorded"
        );
    }

    #[test]
    fn record_refresh_carries_outcome_label() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_refresh("success");
        record_refresh("failure");

        let output = handle.render();
        assert!(output.contains("gateway_credential_refreshes_total"));
        assert!(
            output.contains("outcome=\"success\""),
            "success outcome must be recorded"
        );
        assert!(
            output.contains("outcome=\"failure\""),
            "failure outcome must be recorded separately"
        );
    }

    #[test]
    fn record_session_invalidated_increments_counter() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_session_invalidated();

        let output = handle.render();
        assert!(output.contains("gateway_session_invalidations_total"));
    }
}
