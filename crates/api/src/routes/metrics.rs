//! Prometheus metrics endpoint.

use axum::extract::State;
use axum::http::{StatusCode, header};
use axum::response::IntoResponse;
use metrics::{Unit, describe_counter, describe_histogram};
use metrics_exporter_prometheus::PrometheusHandle;

/// Registers help text for the order and payment metrics.
pub fn describe() {
    describe_counter!("orders_placed_total", "Orders created from a cart");
    describe_counter!(
        "order_placement_rejected_total",
        "Order placements rejected, by reason"
    );
    describe_histogram!(
        "order_placement_duration_seconds",
        Unit::Seconds,
        "Time spent placing an order"
    );
    describe_counter!("payments_recorded_total", "Payments accepted for an order");
    describe_counter!("payment_rejected_total", "Payments rejected, by reason");
}

/// GET /metrics: returns Prometheus-formatted metrics.
pub async fn get(State(handle): State<PrometheusHandle>) -> impl IntoResponse {
    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; version=0.0.4; charset=utf-8")],
        handle.render(),
    )
}
