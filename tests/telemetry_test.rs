//! Integration tests for telemetry initialization.

#[test]
fn telemetry_initializes_without_endpoint() {
    // Note: tracing subscriber can only be set once per process.
    // Using try_init() in the implementation avoids panics if another
    // test already initialized a subscriber.
    let config = signq::telemetry::TelemetryConfig {
        endpoint: None,
        service_name: "signq-test".to_string(),
    };
    // This may return Err if a global subscriber was already set by
    // another test in this process; that is acceptable.
    let _guard = signq::telemetry::init_telemetry(config);
}

#[test]
fn pipeline_annotation_emission_is_infallible() {
    signq::telemetry::annotate::pipeline_error("nil message with ID: 42");
    signq::telemetry::annotate::pipeline_error("");
}
