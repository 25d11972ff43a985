//! Order service: turns a cart into an order and records payments.

use std::time::Instant;

use common::{Money, OrderId, UserId};
use store::{
    NewOrder, NewOrderLine, NewPayment, Order, OrderLine, Payment, Store, StoreTx, constraints,
};

use crate::coordinator::{Coordinator, settle};
use crate::error::DomainError;
use crate::token::{RandomTokenGenerator, TokenGenerator};
use crate::validation::{FieldError, Validate};

use super::{OrderError, PayOrder};

/// An order with its lines and, once paid, its payment.
#[derive(Debug, Clone, PartialEq)]
pub struct OrderDetails {
    pub order: Order,
    pub lines: Vec<OrderLine>,
    pub payment: Option<Payment>,
}

impl OrderDetails {
    /// Sum of the line subtotals.
    pub fn lines_total(&self) -> Money {
        self.lines.iter().map(OrderLine::subtotal).sum()
    }
}

/// Service for placing and paying for orders.
///
/// Each operation runs as a single transaction under the coordinator's
/// deadline. Any error rolls the whole transaction back.
pub struct OrderService<S: Store, G: TokenGenerator = RandomTokenGenerator> {
    coordinator: Coordinator<S>,
    tokens: G,
}

impl<S: Store> OrderService<S> {
    /// Creates an order service with random payment tokens and the default
    /// deadline.
    pub fn new(store: S) -> Self {
        Self::with_tokens(Coordinator::new(store), RandomTokenGenerator::default())
    }
}

impl<S: Store, G: TokenGenerator> OrderService<S, G> {
    pub fn with_tokens(coordinator: Coordinator<S>, tokens: G) -> Self {
        Self {
            coordinator,
            tokens,
        }
    }

    /// Returns a reference to the underlying coordinator.
    pub fn coordinator(&self) -> &Coordinator<S> {
        &self.coordinator
    }

    /// Converts the user's cart into an unpaid order.
    ///
    /// Product rows are locked for the whole transaction, so concurrent
    /// placements touching the same products run one after the other and
    /// stock never goes negative. An empty cart produces an order with no
    /// lines and a zero total.
    #[tracing::instrument(skip(self))]
    pub async fn place_order(&self, user_id: UserId) -> Result<OrderDetails, DomainError> {
        let started = Instant::now();

        let result = self
            .coordinator
            .run("place_order", async {
                let mut tx = self.coordinator.begin().await?;
                let result = self.place_order_in(&mut *tx, user_id).await;
                settle(tx, result).await
            })
            .await;

        metrics::histogram!("order_placement_duration_seconds")
            .record(started.elapsed().as_secs_f64());

        match &result {
            Ok(details) => {
                metrics::counter!("orders_placed_total").increment(1);
                tracing::info!(
                    order_id = %details.order.id,
                    total = %details.order.total_price,
                    lines = details.lines.len(),
                    "order placed"
                );
            }
            Err(err) => {
                metrics::counter!("order_placement_rejected_total", "reason" => err.kind())
                    .increment(1);
                tracing::info!(error = %err, "order placement rejected");
            }
        }

        result
    }

    async fn place_order_in(
        &self,
        tx: &mut dyn StoreTx,
        user_id: UserId,
    ) -> Result<OrderDetails, DomainError> {
        let snapshot = tx.lock_cart_snapshot(user_id).await?;

        if let Some(line) = snapshot.iter().find(|line| !line.is_covered()) {
            return Err(OrderError::OutOfStock {
                product_id: line.product_id,
                requested: line.quantity,
                available: line.stock,
            }
            .into());
        }

        let total_price = snapshot
            .iter()
            .map(|line| line.unit_price.checked_multiply(line.quantity))
            .try_fold(Money::zero(), |total, subtotal| total.checked_add(subtotal?))
            .ok_or(OrderError::TotalTooLarge)?;

        let order = tx
            .insert_order(NewOrder {
                user_id,
                total_price,
                payment_token: self.tokens.generate(),
            })
            .await?;

        let new_lines: Vec<NewOrderLine> = snapshot.iter().map(NewOrderLine::from).collect();
        let lines = tx.insert_order_lines(order.id, &new_lines).await?;

        tx.clear_cart(user_id).await?;

        for line in &snapshot {
            if !tx.decrement_stock(line.product_id, line.quantity).await? {
                let available = tx.product_stock(line.product_id).await?.unwrap_or(0);
                return Err(OrderError::OutOfStock {
                    product_id: line.product_id,
                    requested: line.quantity,
                    available,
                }
                .into());
            }
        }

        Ok(OrderDetails {
            order,
            lines,
            payment: None,
        })
    }

    /// Records a payment for an unpaid order and marks it paid.
    ///
    /// `payment_token` must match the token issued when the order was
    /// placed. Overpayment is accepted as-is.
    #[tracing::instrument(skip(self, payment_token))]
    pub async fn pay_order(
        &self,
        user_id: UserId,
        payment_token: &str,
        cmd: PayOrder,
    ) -> Result<Payment, DomainError> {
        let result = self.pay_order_inner(user_id, payment_token, cmd).await;

        match &result {
            Ok(payment) => {
                metrics::counter!("payments_recorded_total").increment(1);
                tracing::info!(
                    order_id = %payment.order_id,
                    payment_id = %payment.id,
                    amount = %payment.amount,
                    "payment recorded"
                );
            }
            Err(err) => {
                metrics::counter!("payment_rejected_total", "reason" => err.kind()).increment(1);
                tracing::info!(error = %err, "payment rejected");
            }
        }

        result
    }

    async fn pay_order_inner(
        &self,
        user_id: UserId,
        payment_token: &str,
        cmd: PayOrder,
    ) -> Result<Payment, DomainError> {
        cmd.validate()?;
        let Some(order_id) = cmd.order_id else {
            return Err(DomainError::Validation(FieldError::required("order_id").into()));
        };

        self.coordinator
            .run("pay_order", async {
                let mut tx = self.coordinator.begin().await?;
                let result = Self::pay_order_in(&mut *tx, user_id, order_id, payment_token, cmd)
                    .await;
                settle(tx, result).await
            })
            .await
    }

    async fn pay_order_in(
        tx: &mut dyn StoreTx,
        user_id: UserId,
        order_id: OrderId,
        payment_token: &str,
        cmd: PayOrder,
    ) -> Result<Payment, DomainError> {
        let order = tx
            .lock_order(order_id)
            .await?
            .ok_or(OrderError::OrderNotFound(order_id))?;

        if !order.status.can_pay() {
            return Err(OrderError::OrderAlreadyPaid(order_id).into());
        }
        if order.payment_token != payment_token {
            return Err(OrderError::PaymentTokenMismatch(order_id).into());
        }
        if cmd.amount < order.total_price {
            return Err(OrderError::AmountMismatch {
                expected: order.total_price,
                actual: cmd.amount,
            }
            .into());
        }

        let payment = tx
            .insert_payment(NewPayment {
                order_id,
                user_id,
                proof_url: cmd.proof_url,
                amount: cmd.amount,
                method: cmd.method,
            })
            .await
            .map_err(|err| {
                if err.is_conflict_on(constraints::PAYMENTS_ORDER_ID_KEY) {
                    DomainError::from(OrderError::OrderAlreadyPaid(order_id))
                } else {
                    err.into()
                }
            })?;

        tx.mark_order_paid(order_id).await?;

        Ok(payment)
    }

    /// Loads one of the user's orders with its lines and payment.
    ///
    /// Orders belonging to other users are reported as not found.
    #[tracing::instrument(skip(self))]
    pub async fn get_order(
        &self,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<OrderDetails, DomainError> {
        self.coordinator
            .run("get_order", async {
                let mut tx = self.coordinator.begin().await?;
                let result = Self::get_order_in(&mut *tx, user_id, order_id).await;
                settle(tx, result).await
            })
            .await
    }

    async fn get_order_in(
        tx: &mut dyn StoreTx,
        user_id: UserId,
        order_id: OrderId,
    ) -> Result<OrderDetails, DomainError> {
        let order = match tx.get_order(order_id).await? {
            Some(order) if order.user_id == user_id => order,
            _ => return Err(OrderError::OrderNotFound(order_id).into()),
        };
        let lines = tx.order_lines(order_id).await?;
        let payment = tx.payments_for_order(order_id).await?.into_iter().next();

        Ok(OrderDetails {
            order,
            lines,
            payment,
        })
    }

    /// Lists the user's orders, newest first.
    #[tracing::instrument(skip(self))]
    pub async fn list_orders(&self, user_id: UserId) -> Result<Vec<Order>, DomainError> {
        self.coordinator
            .run("list_orders", async {
                let mut tx = self.coordinator.begin().await?;
                let result = tx.orders_for_user(user_id).await.map_err(DomainError::from);
                settle(tx, result).await
            })
            .await
    }
}
