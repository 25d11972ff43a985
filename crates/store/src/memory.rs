use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use common::{CartItemId, OrderId, OrderLineId, PaymentId, ProductId, UserId};
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::{
    CartLine, CartLineView, CartSnapshotLine, NewCartLine, NewOrder, NewOrderLine, NewPayment,
    NewProduct, NewUser, Order, OrderLine, OrderStatus, PageRequest, Payment, Product,
    ProductPage, ProductPatch, ProductSummary, Result, StoreError, User,
    store::{Store, StoreTx, constraints},
};

#[derive(Debug, Clone, Default)]
struct MemoryState {
    users: Vec<User>,
    products: Vec<Product>,
    cart: Vec<CartLine>,
    orders: Vec<Order>,
    order_lines: Vec<OrderLine>,
    payments: Vec<Payment>,
}

/// In-memory store implementation for testing.
///
/// Transactions are fully serialized: `begin` waits for the previous
/// transaction to finish, then works on a private copy of the state that is
/// published only on commit.
#[derive(Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the committed stock of a product.
    pub async fn stock_of(&self, id: ProductId) -> Option<i32> {
        let state = self.state.lock().await;
        state.products.iter().find(|p| p.id == id).map(|p| p.stock)
    }

    /// Returns the number of committed orders.
    pub async fn order_count(&self) -> usize {
        self.state.lock().await.orders.len()
    }

    /// Returns the number of committed order lines.
    pub async fn order_line_count(&self) -> usize {
        self.state.lock().await.order_lines.len()
    }

    /// Returns the number of committed payments.
    pub async fn payment_count(&self) -> usize {
        self.state.lock().await.payments.len()
    }

    /// Clears all data.
    pub async fn clear(&self) {
        *self.state.lock().await = MemoryState::default();
    }
}

#[async_trait]
impl Store for InMemoryStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let guard = self.state.clone().lock_owned().await;
        let working = guard.clone();
        Ok(Box::new(InMemoryTx { guard, working }))
    }
}

/// A transaction holding the store lock and a working copy of the state.
pub struct InMemoryTx {
    guard: OwnedMutexGuard<MemoryState>,
    working: MemoryState,
}

fn conflict(constraint: &str) -> StoreError {
    StoreError::Conflict {
        constraint: constraint.to_string(),
    }
}

#[async_trait]
impl StoreTx for InMemoryTx {
    async fn insert_user(&mut self, user: NewUser) -> Result<User> {
        if self.working.users.iter().any(|u| u.email == user.email) {
            return Err(conflict(constraints::USERS_EMAIL_KEY));
        }

        let user = User {
            id: UserId::new(),
            email: user.email,
            password_hash: user.password_hash,
            full_name: user.full_name,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.working.users.push(user.clone());
        Ok(user)
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>> {
        Ok(self
            .working
            .users
            .iter()
            .find(|u| u.email == email)
            .cloned())
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        if product.stock < 0 {
            return Err(conflict(constraints::PRODUCTS_STOCK_CHECK));
        }

        let product = Product {
            id: ProductId::new(),
            name: product.name,
            description: product.description,
            image_url: product.image_url,
            category: product.category,
            price: product.price,
            stock: product.stock,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.working.products.push(product.clone());
        Ok(product)
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        Ok(self.working.products.iter().find(|p| p.id == id).cloned())
    }

    async fn update_product(
        &mut self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>> {
        if patch.stock.is_some_and(|stock| stock < 0) {
            return Err(conflict(constraints::PRODUCTS_STOCK_CHECK));
        }

        let Some(product) = self.working.products.iter_mut().find(|p| p.id == id) else {
            return Ok(None);
        };
        if !patch.is_empty() {
            patch.apply_to(product);
            product.updated_at = Some(Utc::now());
        }
        Ok(Some(product.clone()))
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool> {
        if self.working.order_lines.iter().any(|l| l.product_id == id) {
            return Err(conflict(constraints::ORDER_ITEMS_PRODUCT_FKEY));
        }

        let before = self.working.products.len();
        self.working.products.retain(|p| p.id != id);
        if self.working.products.len() == before {
            return Ok(false);
        }
        self.working.cart.retain(|c| c.product_id != id);
        Ok(true)
    }

    async fn list_products(&mut self, page: PageRequest) -> Result<ProductPage> {
        let offset = usize::try_from(page.offset).unwrap_or(0);
        let limit = usize::try_from(page.limit).unwrap_or(0);
        Ok(ProductPage {
            products: self
                .working
                .products
                .iter()
                .skip(offset)
                .take(limit)
                .cloned()
                .collect(),
            total: self.working.products.len() as i64,
        })
    }

    async fn product_stock(&mut self, id: ProductId) -> Result<Option<i32>> {
        Ok(self
            .working
            .products
            .iter()
            .find(|p| p.id == id)
            .map(|p| p.stock))
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: i32) -> Result<bool> {
        match self.working.products.iter_mut().find(|p| p.id == id) {
            Some(product) if product.stock >= quantity => {
                product.stock -= quantity;
                product.updated_at = Some(Utc::now());
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn upsert_cart_line(&mut self, line: NewCartLine) -> Result<CartLine> {
        if !self.working.products.iter().any(|p| p.id == line.product_id) {
            return Err(conflict("cart_items_product_id_fkey"));
        }

        if let Some(existing) = self
            .working
            .cart
            .iter_mut()
            .find(|c| c.user_id == line.user_id && c.product_id == line.product_id)
        {
            existing.quantity = existing
                .quantity
                .checked_add(line.quantity)
                .ok_or_else(|| StoreError::OutOfRange("cart_items.qty".to_string()))?;
            existing.updated_at = Some(Utc::now());
            return Ok(existing.clone());
        }

        let line = CartLine {
            id: CartItemId::new(),
            user_id: line.user_id,
            product_id: line.product_id,
            quantity: line.quantity,
            unit_price: line.unit_price,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.working.cart.push(line.clone());
        Ok(line)
    }

    async fn get_cart_line(
        &mut self,
        user_id: UserId,
        id: CartItemId,
    ) -> Result<Option<CartLine>> {
        Ok(self
            .working
            .cart
            .iter()
            .find(|c| c.id == id && c.user_id == user_id)
            .cloned())
    }

    async fn set_cart_line_quantity(
        &mut self,
        user_id: UserId,
        id: CartItemId,
        quantity: i32,
    ) -> Result<Option<CartLine>> {
        let Some(line) = self
            .working
            .cart
            .iter_mut()
            .find(|c| c.id == id && c.user_id == user_id)
        else {
            return Ok(None);
        };
        line.quantity = quantity;
        line.updated_at = Some(Utc::now());
        Ok(Some(line.clone()))
    }

    async fn delete_cart_line(&mut self, user_id: UserId, id: CartItemId) -> Result<bool> {
        let before = self.working.cart.len();
        self.working
            .cart
            .retain(|c| !(c.id == id && c.user_id == user_id));
        Ok(self.working.cart.len() < before)
    }

    async fn cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLineView>> {
        let products = &self.working.products;
        Ok(self
            .working
            .cart
            .iter()
            .filter(|c| c.user_id == user_id)
            .filter_map(|c| {
                let product = products.iter().find(|p| p.id == c.product_id)?;
                Some(CartLineView {
                    id: c.id,
                    product: ProductSummary {
                        id: product.id,
                        name: product.name.clone(),
                        description: product.description.clone(),
                        image_url: product.image_url.clone(),
                        price: product.price,
                    },
                    quantity: c.quantity,
                    unit_price: c.unit_price,
                    created_at: c.created_at,
                    updated_at: c.updated_at,
                })
            })
            .collect())
    }

    async fn cart_quantity(&mut self, user_id: UserId) -> Result<i64> {
        Ok(self
            .working
            .cart
            .iter()
            .filter(|c| c.user_id == user_id)
            .map(|c| i64::from(c.quantity))
            .sum())
    }

    async fn lock_cart_snapshot(&mut self, user_id: UserId) -> Result<Vec<CartSnapshotLine>> {
        let products = &self.working.products;
        let mut lines: Vec<CartSnapshotLine> = self
            .working
            .cart
            .iter()
            .filter(|c| c.user_id == user_id)
            .filter_map(|c| {
                let product = products.iter().find(|p| p.id == c.product_id)?;
                Some(CartSnapshotLine {
                    product_id: product.id,
                    stock: product.stock,
                    quantity: c.quantity,
                    unit_price: c.unit_price,
                })
            })
            .collect();
        lines.sort_by_key(|l| l.product_id);
        Ok(lines)
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64> {
        let before = self.working.cart.len();
        self.working.cart.retain(|c| c.user_id != user_id);
        Ok((before - self.working.cart.len()) as u64)
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let order = Order {
            id: OrderId::new(),
            user_id: order.user_id,
            total_price: order.total_price,
            status: OrderStatus::Unpaid,
            payment_token: order.payment_token,
            created_at: Utc::now(),
            updated_at: None,
        };
        self.working.orders.push(order.clone());
        Ok(order)
    }

    async fn insert_order_lines(
        &mut self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLine>> {
        if !self.working.orders.iter().any(|o| o.id == order_id) {
            return Err(conflict("order_items_order_id_fkey"));
        }

        let inserted: Vec<OrderLine> = lines
            .iter()
            .map(|line| OrderLine {
                id: OrderLineId::new(),
                order_id,
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.unit_price,
            })
            .collect();
        self.working.order_lines.extend(inserted.iter().cloned());
        Ok(inserted)
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        Ok(self.working.orders.iter().find(|o| o.id == id).cloned())
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        self.get_order(id).await
    }

    async fn order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        let mut lines: Vec<OrderLine> = self
            .working
            .order_lines
            .iter()
            .filter(|l| l.order_id == order_id)
            .cloned()
            .collect();
        lines.sort_by_key(|l| l.product_id);
        Ok(lines)
    }

    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        Ok(self
            .working
            .orders
            .iter()
            .rev()
            .filter(|o| o.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn mark_order_paid(&mut self, id: OrderId) -> Result<()> {
        if let Some(order) = self.working.orders.iter_mut().find(|o| o.id == id) {
            order.status = OrderStatus::Paid;
            order.updated_at = Some(Utc::now());
        }
        Ok(())
    }

    async fn insert_payment(&mut self, payment: NewPayment) -> Result<Payment> {
        if self
            .working
            .payments
            .iter()
            .any(|p| p.order_id == payment.order_id)
        {
            return Err(conflict(constraints::PAYMENTS_ORDER_ID_KEY));
        }

        let payment = Payment {
            id: PaymentId::new(),
            order_id: payment.order_id,
            user_id: payment.user_id,
            proof_url: payment.proof_url,
            amount: payment.amount,
            method: payment.method,
            created_at: Utc::now(),
        };
        self.working.payments.push(payment.clone());
        Ok(payment)
    }

    async fn payments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Payment>> {
        Ok(self
            .working
            .payments
            .iter()
            .filter(|p| p.order_id == order_id)
            .cloned()
            .collect())
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        let InMemoryTx { mut guard, working } = *self;
        *guard = working;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use common::Money;

    use super::*;

    fn widget(stock: i32) -> NewProduct {
        NewProduct {
            name: "Widget".to_string(),
            description: "A widget".to_string(),
            image_url: String::new(),
            category: String::new(),
            price: Money::from_cents(100),
            stock,
        }
    }

    #[tokio::test]
    async fn uncommitted_changes_are_discarded() {
        let store = InMemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let product = tx.insert_product(widget(5)).await.unwrap();
        drop(tx);

        assert_eq!(store.stock_of(product.id).await, None);
    }

    #[tokio::test]
    async fn committed_changes_are_visible() {
        let store = InMemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let product = tx.insert_product(widget(5)).await.unwrap();
        assert!(tx.decrement_stock(product.id, 2).await.unwrap());
        tx.commit().await.unwrap();

        assert_eq!(store.stock_of(product.id).await, Some(3));
    }

    #[tokio::test]
    async fn decrement_never_goes_negative() {
        let store = InMemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let product = tx.insert_product(widget(1)).await.unwrap();
        assert!(!tx.decrement_stock(product.id, 2).await.unwrap());
        assert_eq!(tx.product_stock(product.id).await.unwrap(), Some(1));
    }

    #[tokio::test]
    async fn upsert_accumulates_quantity_and_keeps_first_price() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();

        let mut tx = store.begin().await.unwrap();
        let product = tx.insert_product(widget(10)).await.unwrap();
        let first = tx
            .upsert_cart_line(NewCartLine {
                user_id,
                product_id: product.id,
                quantity: 2,
                unit_price: Money::from_cents(100),
            })
            .await
            .unwrap();
        let second = tx
            .upsert_cart_line(NewCartLine {
                user_id,
                product_id: product.id,
                quantity: 3,
                unit_price: Money::from_cents(999),
            })
            .await
            .unwrap();

        assert_eq!(first.id, second.id);
        assert_eq!(second.quantity, 5);
        assert_eq!(second.unit_price, Money::from_cents(100));
        assert_eq!(tx.cart_quantity(user_id).await.unwrap(), 5);
    }

    #[tokio::test]
    async fn upsert_reports_quantity_overflow() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();

        let mut tx = store.begin().await.unwrap();
        let product = tx.insert_product(widget(10)).await.unwrap();
        let line = |quantity| NewCartLine {
            user_id,
            product_id: product.id,
            quantity,
            unit_price: Money::from_cents(100),
        };
        tx.upsert_cart_line(line(i32::MAX)).await.unwrap();

        let err = tx.upsert_cart_line(line(1)).await.unwrap_err();
        assert!(matches!(err, StoreError::OutOfRange(_)));
        assert_eq!(tx.cart_quantity(user_id).await.unwrap(), i64::from(i32::MAX));
    }

    #[tokio::test]
    async fn second_payment_for_order_conflicts() {
        let store = InMemoryStore::new();
        let user_id = UserId::new();

        let mut tx = store.begin().await.unwrap();
        let order = tx
            .insert_order(NewOrder {
                user_id,
                total_price: Money::zero(),
                payment_token: "token".to_string(),
            })
            .await
            .unwrap();
        let payment = NewPayment {
            order_id: order.id,
            user_id,
            proof_url: "https://example.com/proof.png".to_string(),
            amount: Money::zero(),
            method: "transfer".to_string(),
        };
        tx.insert_payment(payment.clone()).await.unwrap();

        let err = tx.insert_payment(payment).await.unwrap_err();
        assert!(err.is_conflict_on(constraints::PAYMENTS_ORDER_ID_KEY));
    }

    #[tokio::test]
    async fn ordered_products_cannot_be_deleted() {
        let store = InMemoryStore::new();

        let mut tx = store.begin().await.unwrap();
        let product = tx.insert_product(widget(3)).await.unwrap();
        let order = tx
            .insert_order(NewOrder {
                user_id: UserId::new(),
                total_price: Money::from_cents(100),
                payment_token: "token".to_string(),
            })
            .await
            .unwrap();
        tx.insert_order_lines(
            order.id,
            &[NewOrderLine {
                product_id: product.id,
                quantity: 1,
                unit_price: Money::from_cents(100),
            }],
        )
        .await
        .unwrap();

        let err = tx.delete_product(product.id).await.unwrap_err();
        assert!(err.is_conflict_on(constraints::ORDER_ITEMS_PRODUCT_FKEY));
    }
}
