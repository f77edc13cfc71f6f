//! Prometheus metrics setup and metric definitions

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};

/// Histogram buckets (seconds) shared by HTTP and Keycloak latency metrics
const LATENCY_BUCKETS: &[f64] = &[
    0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Install the Prometheus recorder and return a handle for rendering metrics.
pub fn install_prometheus_recorder() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new()
        .set_buckets(LATENCY_BUCKETS)?
        .install_recorder()
}

/// Register metric descriptions and emit initial zero values so Prometheus output
/// includes HELP/TYPE lines for all metrics from startup.
pub fn describe_metrics() {
    describe_counter!(
        "individuals_http_requests_total",
        "Total number of HTTP requests"
    );
    describe_histogram!(
        "individuals_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
    describe_gauge!(
        "individuals_http_requests_in_flight",
        "Number of HTTP requests currently being processed"
    );

    describe_counter!(
        "individuals_keycloak_requests_total",
        "Keycloak calls by operation and result (success/error/unavailable)"
    );
    describe_histogram!(
        "individuals_keycloak_request_duration_seconds",
        "Keycloak call duration in seconds, retries included"
    );
    describe_counter!(
        "individuals_service_token_renewals_total",
        "Service token renewals by mode (fetch/refresh)"
    );

    describe_counter!(
        "individuals_auth_registrations_total",
        "Registration attempts by result"
    );
    describe_counter!("individuals_auth_logins_total", "Login attempts by result");
    describe_counter!(
        "individuals_auth_token_refreshes_total",
        "Token refresh attempts by result"
    );

    gauge!("individuals_http_requests_in_flight").set(0.0);
    counter!("individuals_keycloak_requests_total", "operation" => "authenticate_user", "result" => "success")
        .absolute(0);
    histogram!("individuals_keycloak_request_duration_seconds", "operation" => "authenticate_user")
        .record(0.0);
    counter!("individuals_service_token_renewals_total", "mode" => "fetch").absolute(0);
    counter!("individuals_auth_registrations_total", "result" => "success").absolute(0);
    counter!("individuals_auth_logins_total", "result" => "success").absolute(0);
    counter!("individuals_auth_token_refreshes_total", "result" => "success").absolute(0);
}
