//! Shopping cart endpoints for the authenticated customer.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use chrono::{DateTime, Utc};
use common::{CartItemId, Money, ProductId};
use domain::{AddCartItem, Cart, UpdateCartItem};
use serde::Serialize;
use store::{CartLineView, Store};

use super::Envelope;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct CartProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub price: Money,
}

#[derive(Debug, Serialize)]
pub struct CartItemResponse {
    pub id: CartItemId,
    pub product: CartProductResponse,
    pub qty: i32,
    pub unit_price: Money,
    pub subtotal: Money,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<CartLineView> for CartItemResponse {
    fn from(line: CartLineView) -> Self {
        let subtotal = line.subtotal();
        Self {
            id: line.id,
            product: CartProductResponse {
                id: line.product.id,
                name: line.product.name,
                description: line.product.description,
                image_url: line.product.image_url,
                price: line.product.price,
            },
            qty: line.quantity,
            unit_price: line.unit_price,
            subtotal,
            created_at: line.created_at,
            updated_at: line.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CartResponse {
    pub items: Vec<CartItemResponse>,
    pub total_price: Money,
    pub item_count: usize,
    pub total_quantity: i64,
}

impl From<Cart> for CartResponse {
    fn from(cart: Cart) -> Self {
        Self {
            items: cart.lines.into_iter().map(Into::into).collect(),
            total_price: cart.total_price,
            item_count: cart.item_count,
            total_quantity: cart.total_quantity,
        }
    }
}

/// Body returned by every cart mutation.
#[derive(Debug, Serialize)]
pub struct CartQuantityResponse {
    pub total_quantity: i64,
}

/// GET /api/cart
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<CartResponse>>, ApiError> {
    let cart = state.cart.get_cart(user_id).await?;
    Ok(Envelope::new(cart.into()))
}

/// POST /api/cart
#[tracing::instrument(skip(state, body))]
pub async fn add<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
    body: Result<Json<AddCartItem>, JsonRejection>,
) -> Result<Json<Envelope<CartQuantityResponse>>, ApiError> {
    let Json(cmd) = body?;
    let total_quantity = state.cart.add_item(user_id, cmd).await?;
    Ok(Envelope::new(CartQuantityResponse { total_quantity }))
}

/// PUT /api/cart/{id}
#[tracing::instrument(skip(state, body))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<CartItemId>, PathRejection>,
    body: Result<Json<UpdateCartItem>, JsonRejection>,
) -> Result<Json<Envelope<CartQuantityResponse>>, ApiError> {
    let Path(id) = id?;
    let Json(cmd) = body?;
    let total_quantity = state.cart.update_item(user_id, id, cmd).await?;
    Ok(Envelope::new(CartQuantityResponse { total_quantity }))
}

/// DELETE /api/cart/{id}
#[tracing::instrument(skip(state))]
pub async fn remove<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<CartItemId>, PathRejection>,
) -> Result<Json<Envelope<CartQuantityResponse>>, ApiError> {
    let Path(id) = id?;
    let total_quantity = state.cart.remove_item(user_id, id).await?;
    Ok(Envelope::new(CartQuantityResponse { total_quantity }))
}
