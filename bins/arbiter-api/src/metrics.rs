// Prometheus metrics for runs and validations

use lazy_static::lazy_static;
use prometheus::{
    register_histogram, register_int_counter_vec, Encoder, Histogram, IntCounterVec, TextEncoder,
};

lazy_static! {
    pub static ref RUNS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "arbiter_runs_total",
        "Code runs by outcome",
        &["outcome"]
    )
    .expect("arbiter_runs_total registers once");
    pub static ref VALIDATIONS_TOTAL: IntCounterVec = register_int_counter_vec!(
        "arbiter_validations_total",
        "Problem validations by outcome",
        &["outcome"]
    )
    .expect("arbiter_validations_total registers once");
    pub static ref RUN_DURATION: Histogram = register_histogram!(
        "arbiter_run_duration_seconds",
        "Wall time from submission to verdict",
        vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
    )
    .expect("arbiter_run_duration_seconds registers once");
}

/// Text exposition of the default registry
pub fn render() -> Result<String, prometheus::Error> {
    let encoder = TextEncoder::new();
    let mut buffer = Vec::new();
    encoder.encode(&prometheus::gather(), &mut buffer)?;
    String::from_utf8(buffer).map_err(|e| prometheus::Error::Msg(e.to_string()))
}
