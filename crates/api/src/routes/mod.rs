//! HTTP handlers grouped by resource.

use serde::Serialize;

pub mod cart;
pub mod health;
pub mod metrics;
pub mod orders;
pub mod products;
pub mod users;

/// Success body: `{"data": ...}`.
#[derive(Debug, Serialize)]
pub struct Envelope<T> {
    pub data: T,
}

impl<T> Envelope<T> {
    pub fn new(data: T) -> axum::Json<Self> {
        axum::Json(Self { data })
    }
}
