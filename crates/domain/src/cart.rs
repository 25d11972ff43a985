//! Shopping cart.

use common::{CartItemId, Money, ProductId, UserId};
use serde::Deserialize;
use store::{CartLineView, NewCartLine, Store, StoreError, StoreTx};
use thiserror::Error;

use crate::catalog::CatalogError;
use crate::coordinator::{Coordinator, settle};
use crate::error::DomainError;
use crate::validation::{FieldError, Validate, ValidationErrors, Validator};

/// Errors specific to the cart.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CartError {
    #[error("Cart item not found: {0}")]
    CartItemNotFound(CartItemId),

    /// The cart would hold more of a product than is in stock.
    #[error("Product {product_id} is out of stock: requested {requested}, available {available}")]
    OutOfStock {
        product_id: ProductId,
        requested: i32,
        available: i32,
    },

    /// The cart's total would not fit in a money amount.
    #[error("Cart total is too large")]
    TotalTooLarge,
}

impl CartError {
    /// Stable, machine-readable name of the error.
    pub fn kind(&self) -> &'static str {
        match self {
            CartError::CartItemNotFound(_) => "cart_item_not_found",
            CartError::OutOfStock { .. } => "out_of_stock",
            CartError::TotalTooLarge => "total_too_large",
        }
    }
}

/// Request to put a product in the cart.
#[derive(Debug, Clone, Deserialize)]
pub struct AddCartItem {
    pub product_id: Option<ProductId>,
    #[serde(default, rename = "qty")]
    pub quantity: i32,
}

impl Validate for AddCartItem {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .present("product_id", self.product_id.as_ref())
            .positive("qty", i64::from(self.quantity))
            .finish()
    }
}

/// Request to overwrite the quantity of a cart line.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct UpdateCartItem {
    #[serde(default, rename = "qty")]
    pub quantity: i32,
}

impl Validate for UpdateCartItem {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .positive("qty", i64::from(self.quantity))
            .finish()
    }
}

/// The user's cart with its totals.
#[derive(Debug, Clone, PartialEq)]
pub struct Cart {
    pub lines: Vec<CartLineView>,
    pub total_price: Money,
    pub item_count: usize,
    pub total_quantity: i64,
}

impl Cart {
    fn from_lines(lines: Vec<CartLineView>) -> Result<Self, CartError> {
        let total_price = cart_total(&lines).ok_or(CartError::TotalTooLarge)?;
        let total_quantity = lines.iter().map(|line| i64::from(line.quantity)).sum();
        Ok(Self {
            item_count: lines.len(),
            lines,
            total_price,
            total_quantity,
        })
    }
}

fn cart_total(lines: &[CartLineView]) -> Option<Money> {
    lines
        .iter()
        .map(|line| line.unit_price.checked_multiply(line.quantity))
        .try_fold(Money::zero(), |total, subtotal| total.checked_add(subtotal?))
}

fn out_of_stock(product_id: ProductId, requested: i64, available: i32) -> CartError {
    CartError::OutOfStock {
        product_id,
        requested: i32::try_from(requested).unwrap_or(i32::MAX),
        available,
    }
}

/// Fails if the cart can no longer be priced.
async fn ensure_priceable(tx: &mut dyn StoreTx, user_id: UserId) -> Result<(), DomainError> {
    let lines = tx.cart_lines(user_id).await?;
    cart_total(&lines).ok_or(CartError::TotalTooLarge)?;
    Ok(())
}

/// Service for editing a user's cart.
///
/// Every mutation returns the total quantity left in the cart.
pub struct CartService<S: Store> {
    coordinator: Coordinator<S>,
}

impl<S: Store> CartService<S> {
    pub fn new(coordinator: Coordinator<S>) -> Self {
        Self { coordinator }
    }

    /// Adds `quantity` of a product, capturing its current price on first add.
    #[tracing::instrument(skip(self))]
    pub async fn add_item(&self, user_id: UserId, cmd: AddCartItem) -> Result<i64, DomainError> {
        cmd.validate()?;
        let Some(product_id) = cmd.product_id else {
            return Err(DomainError::Validation(
                FieldError::required("product_id").into(),
            ));
        };

        self.coordinator
            .run("add_cart_item", async {
                let mut tx = self.coordinator.begin().await?;
                let result = Self::add_item_in(&mut *tx, user_id, product_id, cmd.quantity).await;
                settle(tx, result).await
            })
            .await
    }

    async fn add_item_in(
        tx: &mut dyn StoreTx,
        user_id: UserId,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<i64, DomainError> {
        let product = tx
            .get_product(product_id)
            .await?
            .ok_or(CatalogError::ProductNotFound(product_id))?;

        let in_cart = tx
            .cart_lines(user_id)
            .await?
            .iter()
            .find(|line| line.product.id == product_id)
            .map_or(0, |line| i64::from(line.quantity));
        let requested = in_cart + i64::from(quantity);
        if requested > i64::from(product.stock) {
            return Err(out_of_stock(product_id, requested, product.stock).into());
        }

        let line = match tx
            .upsert_cart_line(NewCartLine {
                user_id,
                product_id,
                quantity,
                unit_price: product.price,
            })
            .await
        {
            Ok(line) => line,
            Err(StoreError::OutOfRange(_)) => {
                return Err(out_of_stock(product_id, requested, product.stock).into());
            }
            Err(err) => return Err(err.into()),
        };

        // A concurrent add for the same product may have landed in between.
        if line.quantity > product.stock {
            return Err(out_of_stock(product_id, i64::from(line.quantity), product.stock).into());
        }

        ensure_priceable(tx, user_id).await?;
        Ok(tx.cart_quantity(user_id).await?)
    }

    /// Overwrites the quantity of one of the user's cart lines.
    #[tracing::instrument(skip(self))]
    pub async fn update_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
        cmd: UpdateCartItem,
    ) -> Result<i64, DomainError> {
        cmd.validate()?;

        self.coordinator
            .run("update_cart_item", async {
                let mut tx = self.coordinator.begin().await?;
                let result = Self::update_item_in(&mut *tx, user_id, item_id, cmd.quantity).await;
                settle(tx, result).await
            })
            .await
    }

    async fn update_item_in(
        tx: &mut dyn StoreTx,
        user_id: UserId,
        item_id: CartItemId,
        quantity: i32,
    ) -> Result<i64, DomainError> {
        let line = tx
            .get_cart_line(user_id, item_id)
            .await?
            .ok_or(CartError::CartItemNotFound(item_id))?;

        let available = tx
            .product_stock(line.product_id)
            .await?
            .ok_or(CatalogError::ProductNotFound(line.product_id))?;
        if quantity > available {
            return Err(CartError::OutOfStock {
                product_id: line.product_id,
                requested: quantity,
                available,
            }
            .into());
        }

        tx.set_cart_line_quantity(user_id, item_id, quantity)
            .await?
            .ok_or(CartError::CartItemNotFound(item_id))?;

        ensure_priceable(tx, user_id).await?;
        Ok(tx.cart_quantity(user_id).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_item(
        &self,
        user_id: UserId,
        item_id: CartItemId,
    ) -> Result<i64, DomainError> {
        self.coordinator
            .run("remove_cart_item", async {
                let mut tx = self.coordinator.begin().await?;
                let result = match tx.delete_cart_line(user_id, item_id).await {
                    Ok(true) => tx.cart_quantity(user_id).await.map_err(DomainError::from),
                    Ok(false) => Err(CartError::CartItemNotFound(item_id).into()),
                    Err(err) => Err(err.into()),
                };
                settle(tx, result).await
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_cart(&self, user_id: UserId) -> Result<Cart, DomainError> {
        self.coordinator
            .run("get_cart", async {
                let mut tx = self.coordinator.begin().await?;
                let result = match tx.cart_lines(user_id).await {
                    Ok(lines) => Cart::from_lines(lines).map_err(DomainError::from),
                    Err(err) => Err(err.into()),
                };
                settle(tx, result).await
            })
            .await
    }
}
