// SPDX-FileCopyrightText: 2026 Nexus Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Metric registration and recording helpers.
//!
//! Uses the metrics-rs facade so any recorder (Prometheus, statsd, etc.)
//! can collect these metrics. Without an installed recorder every call is
//! a no-op, which is what tests rely on.

use metrics::{describe_counter, describe_gauge, describe_histogram};

/// Register all Nexus metric descriptions.
///
/// Called once at startup after the recorder is installed.
pub fn register_metrics() {
    describe_counter!(
        "nexus_webhooks_total",
        "Webhook deliveries by platform and outcome"
    );
    describe_counter!(
        "nexus_inbound_messages_total",
        "Inbound messages stored, excluding duplicates"
    );
    describe_counter!(
        "nexus_outbound_messages_total",
        "Outbound send attempts by platform and outcome"
    );
    describe_counter!(
        "nexus_ai_decisions_total",
        "AI orchestrator decisions by action"
    );
    describe_gauge!("nexus_cached_adapters", "Live adapters in the registry");
    describe_gauge!("nexus_dispatch_queue_depth", "Jobs waiting for a worker");
    describe_histogram!(
        "nexus_send_latency_seconds",
        "Platform send latency in seconds"
    );
}

/// Record one webhook delivery. `outcome` is `accepted`, `rejected` or `failed`.
pub fn record_webhook(platform: &str, outcome: &'static str) {
    metrics::counter!("nexus_webhooks_total", "platform" => platform.to_string(), "outcome" => outcome)
        .increment(1);
}

pub fn record_inbound_message(platform: &str) {
    metrics::counter!("nexus_inbound_messages_total", "platform" => platform.to_string())
        .increment(1);
}

/// Record an outbound send. `outcome` is `sent` or an error kind label.
pub fn record_outbound(platform: &str, outcome: &str) {
    metrics::counter!(
        "nexus_outbound_messages_total",
        "platform" => platform.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);
}

pub fn record_ai_decision(action: &'static str) {
    metrics::counter!("nexus_ai_decisions_total", "action" => action).increment(1);
}

pub fn set_cached_adapters(count: usize) {
    metrics::gauge!("nexus_cached_adapters").set(count as f64);
}

pub fn set_queue_depth(depth: usize) {
    metrics::gauge!("nexus_dispatch_queue_depth").set(depth as f64);
}

/// Record platform send latency.
pub fn record_send_latency(platform: &str, seconds: f64) {
    metrics::histogram!("nexus_send_latency_seconds", "platform" => platform.to_string())
        .record(seconds);
}
