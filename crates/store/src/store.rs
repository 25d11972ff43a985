use async_trait::async_trait;
use common::{CartItemId, OrderId, ProductId, UserId};

use crate::{
    CartLine, CartLineView, CartSnapshotLine, NewCartLine, NewOrder, NewOrderLine, NewPayment,
    NewProduct, NewUser, Order, OrderLine, PageRequest, Payment, Product, ProductPage,
    ProductPatch, Result, User,
};

/// Names of the integrity constraints declared by the schema.
///
/// Both store implementations report violations under these names so callers
/// can map them to domain errors.
pub mod constraints {
    pub const USERS_EMAIL_KEY: &str = "users_email_key";
    pub const PRODUCTS_STOCK_CHECK: &str = "products_stock_check";
    pub const CART_ITEMS_USER_PRODUCT_KEY: &str = "cart_items_user_id_product_id_key";
    pub const ORDER_ITEMS_PRODUCT_FKEY: &str = "order_items_product_id_fkey";
    pub const PAYMENTS_ORDER_ID_KEY: &str = "payments_order_id_key";
}

/// Entry point to the store: hands out atomic units of work.
#[async_trait]
pub trait Store: Send + Sync {
    /// Begins a new transaction.
    async fn begin(&self) -> Result<Box<dyn StoreTx>>;
}

/// An open transaction.
///
/// Changes become visible to other transactions only after [`commit`].
/// Dropping the transaction, or calling [`rollback`], discards them.
///
/// [`commit`]: StoreTx::commit
/// [`rollback`]: StoreTx::rollback
#[async_trait]
pub trait StoreTx: Send {
    // -- users --

    /// Inserts a user. Fails with a conflict on `users_email_key` if the
    /// email is taken.
    async fn insert_user(&mut self, user: NewUser) -> Result<User>;

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>>;

    // -- catalog and inventory --

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product>;

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>>;

    /// Applies the present fields of `patch`. Returns `None` if the product
    /// does not exist.
    async fn update_product(
        &mut self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>>;

    /// Deletes a product and any cart lines holding it. Returns false if the
    /// product does not exist. Products referenced by an order cannot be
    /// deleted (conflict on `order_items_product_id_fkey`).
    async fn delete_product(&mut self, id: ProductId) -> Result<bool>;

    /// Lists products in creation order.
    async fn list_products(&mut self, page: PageRequest) -> Result<ProductPage>;

    /// Returns the quantity on hand of a product.
    async fn product_stock(&mut self, id: ProductId) -> Result<Option<i32>>;

    /// Decrements a product's stock by `quantity`, provided at least that
    /// much is on hand. Returns false if nothing was decremented.
    async fn decrement_stock(&mut self, id: ProductId, quantity: i32) -> Result<bool>;

    // -- cart --

    /// Adds to the user's line for the product, creating it if needed.
    async fn upsert_cart_line(&mut self, line: NewCartLine) -> Result<CartLine>;

    async fn get_cart_line(&mut self, user_id: UserId, id: CartItemId)
    -> Result<Option<CartLine>>;

    /// Overwrites the quantity of one of the user's cart lines.
    async fn set_cart_line_quantity(
        &mut self,
        user_id: UserId,
        id: CartItemId,
        quantity: i32,
    ) -> Result<Option<CartLine>>;

    /// Removes one of the user's cart lines. Returns false if the line does
    /// not exist or belongs to another user.
    async fn delete_cart_line(&mut self, user_id: UserId, id: CartItemId) -> Result<bool>;

    /// Lists the user's cart lines joined with their products.
    async fn cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLineView>>;

    /// Sum of quantities across the user's cart.
    async fn cart_quantity(&mut self, user_id: UserId) -> Result<i64>;

    /// Reads the user's cart joined with live stock, locking the cart lines
    /// and every involved product row until the transaction ends. Rows are
    /// locked in product id order. A line removed by a transaction this one
    /// waited on is not returned.
    async fn lock_cart_snapshot(&mut self, user_id: UserId) -> Result<Vec<CartSnapshotLine>>;

    /// Removes every line from the user's cart.
    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64>;

    // -- orders --

    /// Inserts an unpaid order header.
    async fn insert_order(&mut self, order: NewOrder) -> Result<Order>;

    async fn insert_order_lines(
        &mut self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLine>>;

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    /// Reads an order and locks its row until the transaction ends.
    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>>;

    async fn order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>>;

    /// Lists the user's orders, newest first.
    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>>;

    async fn mark_order_paid(&mut self, id: OrderId) -> Result<()>;

    // -- payments --

    /// Records a payment. Fails with a conflict on `payments_order_id_key`
    /// if the order already has one.
    async fn insert_payment(&mut self, payment: NewPayment) -> Result<Payment>;

    async fn payments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Payment>>;

    // -- lifecycle --

    async fn commit(self: Box<Self>) -> Result<()>;

    async fn rollback(self: Box<Self>) -> Result<()>;
}
