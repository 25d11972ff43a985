use async_trait::async_trait;
use common::{CartItemId, OrderId, OrderLineId, PaymentId, ProductId, UserId};
use sqlx::{PgPool, Postgres, QueryBuilder, Row, Transaction, postgres::PgRow};

use crate::{
    CartLine, CartLineView, CartSnapshotLine, NewCartLine, NewOrder, NewOrderLine, NewPayment,
    NewProduct, NewUser, Order, OrderLine, OrderStatus, PageRequest, Payment, Product,
    ProductPage, ProductPatch, ProductSummary, Result, StoreError, User,
    store::{Store, StoreTx},
};

const USER_COLUMNS: &str = "id, email, password_hash, full_name, created_at, updated_at";
const PRODUCT_COLUMNS: &str =
    "id, name, description, image_url, category, price, stock, created_at, updated_at";
const CART_COLUMNS: &str = "id, user_id, product_id, qty, price, created_at, updated_at";
const ORDER_COLUMNS: &str =
    "id, user_id, total_price, status, payment_token, created_at, updated_at";
const ORDER_LINE_COLUMNS: &str = "id, order_id, product_id, qty, price";
const PAYMENT_COLUMNS: &str = "id, order_id, user_id, proof_url, amount, method, created_at";

/// PostgreSQL-backed store.
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Creates a new PostgreSQL store.
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Gets a reference to the underlying connection pool.
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Runs the database migrations.
    pub async fn run_migrations(&self) -> Result<()> {
        sqlx::migrate!("../../migrations").run(&self.pool).await?;
        Ok(())
    }
}

#[async_trait]
impl Store for PostgresStore {
    async fn begin(&self) -> Result<Box<dyn StoreTx>> {
        let tx = self.pool.begin().await?;
        Ok(Box::new(PostgresTx { tx }))
    }
}

/// A transaction on a pooled connection. Dropping it without committing
/// rolls it back.
pub struct PostgresTx {
    tx: Transaction<'static, Postgres>,
}

fn row_to_user(row: PgRow) -> Result<User> {
    Ok(User {
        id: row.try_get("id")?,
        email: row.try_get("email")?,
        password_hash: row.try_get("password_hash")?,
        full_name: row.try_get("full_name")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_product(row: PgRow) -> Result<Product> {
    Ok(Product {
        id: row.try_get("id")?,
        name: row.try_get("name")?,
        description: row.try_get("description")?,
        image_url: row.try_get("image_url")?,
        category: row.try_get("category")?,
        price: row.try_get("price")?,
        stock: row.try_get("stock")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_cart_line(row: PgRow) -> Result<CartLine> {
    Ok(CartLine {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        product_id: row.try_get("product_id")?,
        quantity: row.try_get("qty")?,
        unit_price: row.try_get("price")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order(row: PgRow) -> Result<Order> {
    let status: String = row.try_get("status")?;
    Ok(Order {
        id: row.try_get("id")?,
        user_id: row.try_get("user_id")?,
        total_price: row.try_get("total_price")?,
        status: OrderStatus::parse(&status)
            .ok_or_else(|| StoreError::Corrupt(format!("unknown order status '{status}'")))?,
        payment_token: row.try_get("payment_token")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

fn row_to_order_line(row: PgRow) -> Result<OrderLine> {
    Ok(OrderLine {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        product_id: row.try_get("product_id")?,
        quantity: row.try_get("qty")?,
        unit_price: row.try_get("price")?,
    })
}

fn row_to_payment(row: PgRow) -> Result<Payment> {
    Ok(Payment {
        id: row.try_get("id")?,
        order_id: row.try_get("order_id")?,
        user_id: row.try_get("user_id")?,
        proof_url: row.try_get("proof_url")?,
        amount: row.try_get("amount")?,
        method: row.try_get("method")?,
        created_at: row.try_get("created_at")?,
    })
}

#[async_trait]
impl StoreTx for PostgresTx {
    async fn insert_user(&mut self, user: NewUser) -> Result<User> {
        let row = sqlx::query(&format!(
            "INSERT INTO users (id, email, password_hash, full_name) VALUES ($1, $2, $3, $4) \
             RETURNING {USER_COLUMNS}"
        ))
        .bind(UserId::new())
        .bind(&user.email)
        .bind(&user.password_hash)
        .bind(&user.full_name)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        row_to_user(row)
    }

    async fn find_user_by_email(&mut self, email: &str) -> Result<Option<User>> {
        sqlx::query(&format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1"))
            .bind(email)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_user)
            .transpose()
    }

    async fn insert_product(&mut self, product: NewProduct) -> Result<Product> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO products (id, name, description, image_url, category, price, stock)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {PRODUCT_COLUMNS}
            "#
        ))
        .bind(ProductId::new())
        .bind(&product.name)
        .bind(&product.description)
        .bind(&product.image_url)
        .bind(&product.category)
        .bind(product.price)
        .bind(product.stock)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        row_to_product(row)
    }

    async fn get_product(&mut self, id: ProductId) -> Result<Option<Product>> {
        sqlx::query(&format!("SELECT {PRODUCT_COLUMNS} FROM products WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_product)
            .transpose()
    }

    async fn update_product(
        &mut self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Option<Product>> {
        if patch.is_empty() {
            return self.get_product(id).await;
        }

        let mut query = QueryBuilder::<Postgres>::new("UPDATE products SET ");
        let mut fields = query.separated(", ");
        if let Some(name) = &patch.name {
            fields.push("name = ").push_bind_unseparated(name.clone());
        }
        if let Some(description) = &patch.description {
            fields
                .push("description = ")
                .push_bind_unseparated(description.clone());
        }
        if let Some(image_url) = &patch.image_url {
            fields
                .push("image_url = ")
                .push_bind_unseparated(image_url.clone());
        }
        if let Some(category) = &patch.category {
            fields
                .push("category = ")
                .push_bind_unseparated(category.clone());
        }
        if let Some(price) = patch.price {
            fields.push("price = ").push_bind_unseparated(price);
        }
        if let Some(stock) = patch.stock {
            fields.push("stock = ").push_bind_unseparated(stock);
        }
        fields.push("updated_at = NOW()");
        query.push(" WHERE id = ").push_bind(id);
        query.push(format!(" RETURNING {PRODUCT_COLUMNS}"));

        query
            .build()
            .fetch_optional(&mut *self.tx)
            .await
            .map_err(StoreError::from_sqlx)?
            .map(row_to_product)
            .transpose()
    }

    async fn delete_product(&mut self, id: ProductId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM products WHERE id = $1")
            .bind(id)
            .execute(&mut *self.tx)
            .await
            .map_err(StoreError::from_sqlx)?;

        Ok(result.rows_affected() > 0)
    }

    async fn list_products(&mut self, page: PageRequest) -> Result<ProductPage> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products")
            .fetch_one(&mut *self.tx)
            .await?;

        let rows = sqlx::query(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products ORDER BY created_at ASC, id ASC \
             LIMIT $1 OFFSET $2"
        ))
        .bind(page.limit)
        .bind(page.offset)
        .fetch_all(&mut *self.tx)
        .await?;

        Ok(ProductPage {
            products: rows
                .into_iter()
                .map(row_to_product)
                .collect::<Result<_>>()?,
            total,
        })
    }

    async fn product_stock(&mut self, id: ProductId) -> Result<Option<i32>> {
        Ok(
            sqlx::query_scalar("SELECT stock FROM products WHERE id = $1")
                .bind(id)
                .fetch_optional(&mut *self.tx)
                .await?,
        )
    }

    async fn decrement_stock(&mut self, id: ProductId, quantity: i32) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE products SET stock = stock - $1, updated_at = NOW() \
             WHERE id = $2 AND stock >= $1",
        )
        .bind(quantity)
        .bind(id)
        .execute(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        Ok(result.rows_affected() == 1)
    }

    async fn upsert_cart_line(&mut self, line: NewCartLine) -> Result<CartLine> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO cart_items (id, user_id, product_id, qty, price)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (user_id, product_id) DO UPDATE SET
                qty = cart_items.qty + EXCLUDED.qty,
                updated_at = NOW()
            RETURNING {CART_COLUMNS}
            "#
        ))
        .bind(CartItemId::new())
        .bind(line.user_id)
        .bind(line.product_id)
        .bind(line.quantity)
        .bind(line.unit_price)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        row_to_cart_line(row)
    }

    async fn get_cart_line(
        &mut self,
        user_id: UserId,
        id: CartItemId,
    ) -> Result<Option<CartLine>> {
        sqlx::query(&format!(
            "SELECT {CART_COLUMNS} FROM cart_items WHERE id = $1 AND user_id = $2"
        ))
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(row_to_cart_line)
        .transpose()
    }

    async fn set_cart_line_quantity(
        &mut self,
        user_id: UserId,
        id: CartItemId,
        quantity: i32,
    ) -> Result<Option<CartLine>> {
        sqlx::query(&format!(
            "UPDATE cart_items SET qty = $1, updated_at = NOW() \
             WHERE id = $2 AND user_id = $3 RETURNING {CART_COLUMNS}"
        ))
        .bind(quantity)
        .bind(id)
        .bind(user_id)
        .fetch_optional(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?
        .map(row_to_cart_line)
        .transpose()
    }

    async fn delete_cart_line(&mut self, user_id: UserId, id: CartItemId) -> Result<bool> {
        let result = sqlx::query("DELETE FROM cart_items WHERE id = $1 AND user_id = $2")
            .bind(id)
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn cart_lines(&mut self, user_id: UserId) -> Result<Vec<CartLineView>> {
        let rows = sqlx::query(
            r#"
            SELECT c.id, c.qty, c.price, c.created_at, c.updated_at,
                   p.id AS product_id, p.name, p.description, p.image_url,
                   p.price AS product_price
            FROM cart_items c
            INNER JOIN products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CartLineView {
                    id: row.try_get("id")?,
                    product: ProductSummary {
                        id: row.try_get("product_id")?,
                        name: row.try_get("name")?,
                        description: row.try_get("description")?,
                        image_url: row.try_get("image_url")?,
                        price: row.try_get("product_price")?,
                    },
                    quantity: row.try_get("qty")?,
                    unit_price: row.try_get("price")?,
                    created_at: row.try_get("created_at")?,
                    updated_at: row.try_get("updated_at")?,
                })
            })
            .collect()
    }

    async fn cart_quantity(&mut self, user_id: UserId) -> Result<i64> {
        let total: Option<i64> =
            sqlx::query_scalar("SELECT SUM(qty)::BIGINT FROM cart_items WHERE user_id = $1")
                .bind(user_id)
                .fetch_one(&mut *self.tx)
                .await?;

        Ok(total.unwrap_or(0))
    }

    async fn lock_cart_snapshot(&mut self, user_id: UserId) -> Result<Vec<CartSnapshotLine>> {
        let rows = sqlx::query(
            r#"
            SELECT p.id AS product_id, p.stock, c.qty, c.price
            FROM cart_items c
            INNER JOIN products p ON p.id = c.product_id
            WHERE c.user_id = $1
            ORDER BY p.id
            FOR UPDATE OF c, p
            "#,
        )
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?;

        rows.into_iter()
            .map(|row| {
                Ok(CartSnapshotLine {
                    product_id: row.try_get("product_id")?,
                    stock: row.try_get("stock")?,
                    quantity: row.try_get("qty")?,
                    unit_price: row.try_get("price")?,
                })
            })
            .collect()
    }

    async fn clear_cart(&mut self, user_id: UserId) -> Result<u64> {
        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.tx)
            .await?;

        Ok(result.rows_affected())
    }

    async fn insert_order(&mut self, order: NewOrder) -> Result<Order> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO orders (id, user_id, total_price, status, payment_token)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(OrderId::new())
        .bind(order.user_id)
        .bind(order.total_price)
        .bind(OrderStatus::Unpaid.as_str())
        .bind(&order.payment_token)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        row_to_order(row)
    }

    async fn insert_order_lines(
        &mut self,
        order_id: OrderId,
        lines: &[NewOrderLine],
    ) -> Result<Vec<OrderLine>> {
        if lines.is_empty() {
            return Ok(Vec::new());
        }

        let mut query =
            QueryBuilder::<Postgres>::new("INSERT INTO order_items (id, order_id, product_id, qty, price) ");
        query.push_values(lines, |mut row, line| {
            row.push_bind(OrderLineId::new())
                .push_bind(order_id)
                .push_bind(line.product_id)
                .push_bind(line.quantity)
                .push_bind(line.unit_price);
        });
        query.push(format!(" RETURNING {ORDER_LINE_COLUMNS}"));

        query
            .build()
            .fetch_all(&mut *self.tx)
            .await
            .map_err(StoreError::from_sqlx)?
            .into_iter()
            .map(row_to_order_line)
            .collect()
    }

    async fn get_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        sqlx::query(&format!("SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.tx)
            .await?
            .map(row_to_order)
            .transpose()
    }

    async fn lock_order(&mut self, id: OrderId) -> Result<Option<Order>> {
        sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *self.tx)
        .await?
        .map(row_to_order)
        .transpose()
    }

    async fn order_lines(&mut self, order_id: OrderId) -> Result<Vec<OrderLine>> {
        sqlx::query(&format!(
            "SELECT {ORDER_LINE_COLUMNS} FROM order_items WHERE order_id = $1 ORDER BY product_id"
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(row_to_order_line)
        .collect()
    }

    async fn orders_for_user(&mut self, user_id: UserId) -> Result<Vec<Order>> {
        sqlx::query(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = $1 ORDER BY created_at DESC, id"
        ))
        .bind(user_id)
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(row_to_order)
        .collect()
    }

    async fn mark_order_paid(&mut self, id: OrderId) -> Result<()> {
        sqlx::query("UPDATE orders SET status = $1, updated_at = NOW() WHERE id = $2")
            .bind(OrderStatus::Paid.as_str())
            .bind(id)
            .execute(&mut *self.tx)
            .await?;

        Ok(())
    }

    async fn insert_payment(&mut self, payment: NewPayment) -> Result<Payment> {
        let row = sqlx::query(&format!(
            r#"
            INSERT INTO payments (id, order_id, user_id, proof_url, amount, method)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {PAYMENT_COLUMNS}
            "#
        ))
        .bind(PaymentId::new())
        .bind(payment.order_id)
        .bind(payment.user_id)
        .bind(&payment.proof_url)
        .bind(payment.amount)
        .bind(&payment.method)
        .fetch_one(&mut *self.tx)
        .await
        .map_err(StoreError::from_sqlx)?;

        row_to_payment(row)
    }

    async fn payments_for_order(&mut self, order_id: OrderId) -> Result<Vec<Payment>> {
        sqlx::query(&format!(
            "SELECT {PAYMENT_COLUMNS} FROM payments WHERE order_id = $1 ORDER BY created_at"
        ))
        .bind(order_id)
        .fetch_all(&mut *self.tx)
        .await?
        .into_iter()
        .map(row_to_payment)
        .collect()
    }

    async fn commit(self: Box<Self>) -> Result<()> {
        self.tx.commit().await?;
        Ok(())
    }

    async fn rollback(self: Box<Self>) -> Result<()> {
        self.tx.rollback().await?;
        Ok(())
    }
}
