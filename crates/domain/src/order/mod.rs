//! Order placement and payment.

mod commands;
mod service;

pub use commands::PayOrder;
pub use service::{OrderDetails, OrderService};

use common::{Money, OrderId, ProductId};
use thiserror::Error;

/// Errors that can occur while placing or paying for an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// A cart line asks for more than the product has on hand.
    #[error("Product {product_id} is out of stock: requested {requested}, available {available}")]
    OutOfStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// No such order, or the order belongs to someone else.
    #[error("Order not found: {0}")]
    OrderNotFound(OrderId),

    #[error("Order {0} is already paid")]
    OrderAlreadyPaid(OrderId),

    /// The presented token does not match the order's payment token.
    #[error("Payment token does not match order {0}")]
    PaymentTokenMismatch(OrderId),

    /// The amount paid is less than the order total.
    #[error("Amount {actual} does not cover order total {expected}")]
    AmountMismatch { expected: Money, actual: Money },

    /// The cart's total does not fit in a money amount.
    #[error("Order total is too large")]
    TotalTooLarge,
}

impl OrderError {
    /// Stable, machine-readable name of the error.
    pub fn kind(&self) -> &'static str {
        match self {
            OrderError::OutOfStock { .. } => "out_of_stock",
            OrderError::OrderNotFound(_) => "order_not_found",
            OrderError::OrderAlreadyPaid(_) => "order_already_paid",
            OrderError::PaymentTokenMismatch(_) => "payment_token_mismatch",
            OrderError::AmountMismatch { .. } => "amount_mismatch",
            OrderError::TotalTooLarge => "total_too_large",
        }
    }
}
