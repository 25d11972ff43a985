//! Shared types for the storefront backend.

pub mod money;
pub mod types;

pub use money::Money;
pub use types::{CartItemId, OrderId, OrderLineId, PaymentId, ProductId, UserId};
