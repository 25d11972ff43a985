//! Order placement, payment and read endpoints.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{Path, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, OrderId, OrderLineId, PaymentId, ProductId};
use domain::{OrderDetails, PayOrder};
use serde::Serialize;
use store::{Order, OrderLine, Payment, Store};

use super::Envelope;
use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::state::AppState;

// -- Response types --

#[derive(Debug, Serialize)]
pub struct OrderItemResponse {
    pub id: OrderLineId,
    pub product_id: ProductId,
    pub qty: i32,
    pub unit_price: Money,
    pub subtotal: Money,
}

impl From<OrderLine> for OrderItemResponse {
    fn from(line: OrderLine) -> Self {
        Self {
            id: line.id,
            product_id: line.product_id,
            qty: line.quantity,
            unit_price: line.unit_price,
            subtotal: line.subtotal(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentResponse {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub proof_url: String,
    pub amount: Money,
    pub method: String,
    pub created_at: DateTime<Utc>,
}

impl From<Payment> for PaymentResponse {
    fn from(payment: Payment) -> Self {
        Self {
            id: payment.id,
            order_id: payment.order_id,
            proof_url: payment.proof_url,
            amount: payment.amount,
            method: payment.method,
            created_at: payment.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct OrderResponse {
    pub id: OrderId,
    pub status: &'static str,
    pub total_price: Money,
    pub payment_token: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Vec<OrderItemResponse>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment: Option<PaymentResponse>,
}

impl From<Order> for OrderResponse {
    fn from(order: Order) -> Self {
        Self {
            id: order.id,
            status: order.status.as_str(),
            total_price: order.total_price,
            payment_token: order.payment_token,
            created_at: order.created_at,
            updated_at: order.updated_at,
            items: None,
            payment: None,
        }
    }
}

impl From<OrderDetails> for OrderResponse {
    fn from(details: OrderDetails) -> Self {
        let mut response = OrderResponse::from(details.order);
        response.items = Some(details.lines.into_iter().map(Into::into).collect());
        response.payment = details.payment.map(Into::into);
        response
    }
}

// -- Handlers --

/// POST /api/orders: turns the customer's cart into an unpaid order.
#[tracing::instrument(skip(state))]
pub async fn place<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
) -> Result<(StatusCode, Json<Envelope<OrderResponse>>), ApiError> {
    let details = state.orders.place_order(user_id).await?;
    Ok((StatusCode::CREATED, Envelope::new(details.into())))
}

/// GET /api/orders: the customer's orders, newest first.
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
) -> Result<Json<Envelope<Vec<OrderResponse>>>, ApiError> {
    let orders = state.orders.list_orders(user_id).await?;
    Ok(Envelope::new(orders.into_iter().map(Into::into).collect()))
}

/// GET /api/orders/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
    id: Result<Path<OrderId>, PathRejection>,
) -> Result<Json<Envelope<OrderResponse>>, ApiError> {
    let Path(id) = id?;
    let details = state.orders.get_order(user_id, id).await?;
    Ok(Envelope::new(details.into()))
}

/// POST /api/orders/pay/{token}: records a payment for an unpaid order.
#[tracing::instrument(skip(state, token, body))]
pub async fn pay<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    AuthUser(user_id): AuthUser,
    token: Result<Path<String>, PathRejection>,
    body: Result<Json<PayOrder>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<PaymentResponse>>), ApiError> {
    let Path(token) = token?;
    let Json(cmd) = body?;
    let payment = state.orders.pay_order(user_id, &token, cmd).await?;
    Ok((StatusCode::CREATED, Envelope::new(payment.into())))
}
