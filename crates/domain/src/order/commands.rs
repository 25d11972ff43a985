//! Order commands.

use common::{Money, OrderId};
use serde::Deserialize;

use crate::validation::{Validate, ValidationErrors, Validator};

/// Request to pay for an order.
///
/// The payment token travels separately; it is whatever the buyer was
/// handed when the order was placed.
#[derive(Debug, Clone, Deserialize)]
pub struct PayOrder {
    /// The order being paid for.
    pub order_id: Option<OrderId>,

    /// URL of the proof of payment (receipt, transfer slip).
    #[serde(default)]
    pub proof_url: String,

    /// Amount paid, in minor units.
    #[serde(default)]
    pub amount: Money,

    /// Free-form payment method, e.g. `bank_transfer`.
    #[serde(default)]
    pub method: String,
}

impl PayOrder {
    pub fn new(
        order_id: OrderId,
        proof_url: impl Into<String>,
        amount: Money,
        method: impl Into<String>,
    ) -> Self {
        Self {
            order_id: Some(order_id),
            proof_url: proof_url.into(),
            amount,
            method: method.into(),
        }
    }
}

impl Validate for PayOrder {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .present("order_id", self.order_id.as_ref())
            .required("proof_url", &self.proof_url)
            .http_url("proof_url", &self.proof_url)
            .positive("amount", self.amount.cents())
            .required("method", &self.method)
            .finish()
    }
}
