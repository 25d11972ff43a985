//! Records persisted by the store and the inputs used to create them.

use chrono::{DateTime, Utc};
use common::{CartItemId, Money, OrderId, OrderLineId, PaymentId, ProductId, UserId};

/// A registered user account.
#[derive(Debug, Clone, PartialEq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Input for creating a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub password_hash: String,
    pub full_name: String,
}

/// A catalog product with its quantity on hand.
#[derive(Debug, Clone, PartialEq)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub category: String,
    pub price: Money,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Input for creating a product.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub category: String,
    pub price: Money,
    pub stock: i32,
}

/// Offset-based page selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub limit: i64,
    pub offset: i64,
}

/// One page of products plus the total number of products.
#[derive(Debug, Clone)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub total: i64,
}

/// A (user, product) pairing in a cart with the price captured when the
/// product was first added.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLine {
    pub id: CartItemId,
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Input for adding a product to a cart.
///
/// If the user already has a line for the product, `quantity` is added to
/// it and the originally captured price is kept.
#[derive(Debug, Clone)]
pub struct NewCartLine {
    pub user_id: UserId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
}

/// Product fields shown alongside a cart line.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSummary {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub price: Money,
}

/// A cart line joined with its product.
#[derive(Debug, Clone, PartialEq)]
pub struct CartLineView {
    pub id: CartItemId,
    pub product: ProductSummary,
    pub quantity: i32,
    pub unit_price: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl CartLineView {
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// A cart line joined with the live stock of its product, read under a row
/// lock at order placement time.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshotLine {
    pub product_id: ProductId,
    pub stock: i32,
    pub quantity: i32,
    pub unit_price: Money,
}

impl CartSnapshotLine {
    /// Returns true if the product has enough stock to cover the line.
    pub fn is_covered(&self) -> bool {
        self.quantity <= self.stock
    }

    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Payment status of an order.
///
/// ```text
/// Unpaid ──► Paid
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OrderStatus {
    #[default]
    Unpaid,
    Paid,
}

impl OrderStatus {
    /// Returns true if a payment may still be recorded.
    pub fn can_pay(&self) -> bool {
        matches!(self, OrderStatus::Unpaid)
    }

    /// Returns the status as stored in the database.
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::Unpaid => "unpaid",
            OrderStatus::Paid => "paid",
        }
    }

    /// Parses a stored status value.
    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "unpaid" => Some(OrderStatus::Unpaid),
            "paid" => Some(OrderStatus::Paid),
            _ => None,
        }
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An order header. `total_price` is fixed at creation time.
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    pub id: OrderId,
    pub user_id: UserId,
    pub total_price: Money,
    pub status: OrderStatus,
    pub payment_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Input for creating an order header. New orders are always unpaid.
#[derive(Debug, Clone)]
pub struct NewOrder {
    pub user_id: UserId,
    pub total_price: Money,
    pub payment_token: String,
}

/// An immutable order line.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderLine {
    pub id: OrderLineId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
}

impl OrderLine {
    pub fn subtotal(&self) -> Money {
        self.unit_price.multiply(self.quantity)
    }
}

/// Input for one order line.
#[derive(Debug, Clone)]
pub struct NewOrderLine {
    pub product_id: ProductId,
    pub quantity: i32,
    pub unit_price: Money,
}

impl From<&CartSnapshotLine> for NewOrderLine {
    fn from(line: &CartSnapshotLine) -> Self {
        Self {
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
        }
    }
}

/// A payment recorded against an order.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub user_id: UserId,
    pub proof_url: String,
    pub amount: Money,
    pub method: String,
    pub created_at: DateTime<Utc>,
}

/// Input for recording a payment.
#[derive(Debug, Clone)]
pub struct NewPayment {
    pub order_id: OrderId,
    pub user_id: UserId,
    pub proof_url: String,
    pub amount: Money,
    pub method: String,
}
