//! Prometheus export and domain counters.
//!
//! HTTP request metrics are recorded by `service_core::middleware::metrics`;
//! this module installs the recorder and adds workflow-level counters.

use metrics::counter;
use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};
use service_core::error::AppError;
use std::sync::OnceLock;

static METRICS_HANDLE: OnceLock<PrometheusHandle> = OnceLock::new();

/// Install the global Prometheus recorder. Calling it again is a no-op.
pub fn init_metrics() -> Result<(), AppError> {
    if METRICS_HANDLE.get().is_some() {
        return Ok(());
    }

    let handle = PrometheusBuilder::new().install_recorder().map_err(|e| {
        AppError::InternalError(anyhow::anyhow!("Failed to install Prometheus recorder: {}", e))
    })?;

    let _ = METRICS_HANDLE.set(handle);
    Ok(())
}

pub fn get_metrics() -> String {
    METRICS_HANDLE
        .get()
        .map(|handle| handle.render())
        .unwrap_or_else(|| "# Metrics recorder not initialized\n".to_string())
}

/// `event` is one of register, login, verify_email, reset_password.
pub fn record_auth_event(event: &'static str, outcome: &'static str) {
    counter!("tirelire_auth_events_total", "event" => event, "outcome" => outcome).increment(1);
}

pub fn record_mail_dispatch(kind: &'static str, delivered: bool) {
    let outcome = if delivered { "sent" } else { "failed" };
    counter!("tirelire_mail_dispatch_total", "kind" => kind, "outcome" => outcome).increment(1);
}

pub fn record_kyc_submission() {
    counter!("tirelire_kyc_submissions_total").increment(1);
}

/// `source` is `ai` or `human`; `status` is the resulting KYC status.
pub fn record_kyc_decision(source: &'static str, status: &'static str) {
    counter!("tirelire_kyc_decisions_total", "source" => source, "status" => status).increment(1);
}

pub fn record_face_match(outcome: &'static str) {
    counter!("tirelire_face_match_total", "outcome" => outcome).increment(1);
}
