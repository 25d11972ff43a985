//! Integration tests for order placement and payment.
//!
//! These tests run the services against the in-memory store and check the
//! ordering guarantees end to end: stock, cart, order and payment state after
//! each operation.

use std::sync::Arc;
use std::time::Duration;

use common::{Money, OrderId, ProductId, UserId};
use domain::{
    AddCartItem, CartError, CartService, CatalogService, Coordinator, DomainError, OrderError,
    OrderService, PayOrder, SequenceTokenGenerator,
};
use store::{InMemoryStore, NewCartLine, NewProduct, OrderStatus, ProductPatch, Store};

struct Harness {
    store: InMemoryStore,
    cart: CartService<InMemoryStore>,
    catalog: CatalogService<InMemoryStore>,
    orders: OrderService<InMemoryStore, SequenceTokenGenerator>,
}

/// Helper to create services sharing one store
fn harness() -> Harness {
    harness_with_deadline(domain::DEFAULT_DEADLINE)
}

fn harness_with_deadline(deadline: Duration) -> Harness {
    let store = InMemoryStore::new();
    let coordinator = Coordinator::with_deadline(store.clone(), deadline);
    Harness {
        cart: CartService::new(coordinator.clone()),
        catalog: CatalogService::new(coordinator.clone()),
        orders: OrderService::with_tokens(
            coordinator,
            SequenceTokenGenerator::new(["tok-first-order", "tok-second-order"]),
        ),
        store,
    }
}

impl Harness {
    async fn product(&self, name: &str, price: i64, stock: i32) -> ProductId {
        let mut tx = self.store.begin().await.unwrap();
        let product = tx
            .insert_product(NewProduct {
                name: name.to_string(),
                description: format!("{name} description"),
                image_url: String::new(),
                category: "test".to_string(),
                price: Money::from_cents(price),
                stock,
            })
            .await
            .unwrap();
        tx.commit().await.unwrap();
        product.id
    }

    async fn add(&self, user_id: UserId, product_id: ProductId, quantity: i32) {
        self.cart
            .add_item(
                user_id,
                AddCartItem {
                    product_id: Some(product_id),
                    quantity,
                },
            )
            .await
            .unwrap();
    }

    /// Overwrites a product's stock behind the cart's back.
    async fn set_stock(&self, product_id: ProductId, stock: i32) {
        let mut tx = self.store.begin().await.unwrap();
        tx.update_product(product_id, &ProductPatch::builder().stock(stock).build())
            .await
            .unwrap();
        tx.commit().await.unwrap();
    }

    async fn stock(&self, product_id: ProductId) -> i32 {
        self.store.stock_of(product_id).await.unwrap()
    }

    async fn cart_quantity(&self, user_id: UserId) -> i64 {
        self.cart.get_cart(user_id).await.unwrap().total_quantity
    }
}

fn payment(order_id: OrderId, amount: Money) -> PayOrder {
    PayOrder::new(
        order_id,
        "https://example.com/receipt.png",
        amount,
        "bank_transfer",
    )
}

mod placement {
    use super::*;

    #[tokio::test]
    async fn two_product_cart_becomes_order() {
        let h = harness();
        let user_id = UserId::new();
        let a = h.product("A", 100, 5).await;
        let b = h.product("B", 50, 5).await;
        h.add(user_id, a, 2).await;
        h.add(user_id, b, 1).await;

        let details = h.orders.place_order(user_id).await.unwrap();

        assert_eq!(details.order.total_price, Money::from_cents(250));
        assert_eq!(details.order.status, OrderStatus::Unpaid);
        assert_eq!(details.order.payment_token, "tok-first-order");
        assert_eq!(details.lines.len(), 2);
        assert_eq!(details.lines_total(), details.order.total_price);
        assert!(details.payment.is_none());

        assert_eq!(h.stock(a).await, 3);
        assert_eq!(h.stock(b).await, 4);
        assert_eq!(h.cart_quantity(user_id).await, 0);
    }

    #[tokio::test]
    async fn short_stock_fails_and_changes_nothing() {
        let h = harness();
        let user_id = UserId::new();
        let a = h.product("A", 100, 5).await;
        let b = h.product("B", 50, 5).await;
        h.add(user_id, a, 2).await;
        h.add(user_id, b, 1).await;
        h.set_stock(a, 1).await;

        let err = h.orders.place_order(user_id).await.unwrap_err();

        assert!(matches!(
            err,
            DomainError::Order(OrderError::OutOfStock {
                product_id,
                requested: 2,
                available: 1,
            }) if product_id == a
        ));
        assert_eq!(err.kind(), "out_of_stock");

        assert_eq!(h.stock(a).await, 1);
        assert_eq!(h.stock(b).await, 5);
        assert_eq!(h.cart_quantity(user_id).await, 3);
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.store.order_line_count().await, 0);
    }

    #[tokio::test]
    async fn empty_cart_yields_zero_order() {
        let h = harness();
        let user_id = UserId::new();

        let details = h.orders.place_order(user_id).await.unwrap();

        assert_eq!(details.order.total_price, Money::zero());
        assert!(details.lines.is_empty());
        assert_eq!(h.store.order_count().await, 1);
    }

    #[tokio::test]
    async fn total_uses_cart_time_prices_and_never_changes() {
        let h = harness();
        let user_id = UserId::new();
        let a = h.product("A", 100, 5).await;
        h.add(user_id, a, 3).await;

        // Price rises after the product went into the cart.
        h.catalog
            .update_product(
                a,
                ProductPatch::builder().price(Money::from_cents(999)).build(),
            )
            .await
            .unwrap();

        let placed = h.orders.place_order(user_id).await.unwrap();
        assert_eq!(placed.order.total_price, Money::from_cents(300));
        assert_eq!(placed.lines[0].unit_price, Money::from_cents(100));

        h.catalog
            .update_product(
                a,
                ProductPatch::builder().price(Money::from_cents(1)).build(),
            )
            .await
            .unwrap();

        let reloaded = h.orders.get_order(user_id, placed.order.id).await.unwrap();
        assert_eq!(reloaded.order.total_price, Money::from_cents(300));
        assert_eq!(reloaded.lines_total(), reloaded.order.total_price);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_placements_never_oversell() {
        let h = Arc::new(harness());
        let product_id = h.product("Scarce", 100, 5).await;

        let users: Vec<UserId> = (0..8).map(|_| UserId::new()).collect();
        for user_id in &users {
            h.add(*user_id, product_id, 2).await;
        }

        let mut handles = Vec::new();
        for user_id in users {
            let h = h.clone();
            handles.push(tokio::spawn(async move {
                h.orders.place_order(user_id).await
            }));
        }

        let mut placed = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(details) => placed += details.lines[0].quantity,
                Err(err) => assert_eq!(err.kind(), "out_of_stock"),
            }
        }

        assert_eq!(placed, 4);
        assert_eq!(h.stock(product_id).await, 1);
        assert_eq!(h.store.order_count().await, 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn double_submit_by_same_user_places_cart_once() {
        let h = Arc::new(harness());
        let user_id = UserId::new();
        let a = h.product("A", 200, 5).await;
        h.add(user_id, a, 2).await;

        let first = tokio::spawn({
            let h = h.clone();
            async move { h.orders.place_order(user_id).await }
        });
        let second = tokio::spawn({
            let h = h.clone();
            async move { h.orders.place_order(user_id).await }
        });

        let placed: Vec<_> = [first.await.unwrap(), second.await.unwrap()]
            .into_iter()
            .map(Result::unwrap)
            .collect();
        let ordered: i32 = placed
            .iter()
            .flat_map(|details| &details.lines)
            .map(|line| line.quantity)
            .sum();

        assert_eq!(ordered, 2);
        assert_eq!(h.stock(a).await, 3);
        assert!(placed.iter().any(|d| d.order.total_price.is_zero()));
    }

    #[tokio::test]
    async fn total_beyond_money_range_is_rejected_without_trace() {
        let h = harness();
        let user_id = UserId::new();
        let pricey = h.product("Pricey", i64::MAX / 2 + 1, 5).await;

        let err = h
            .cart
            .add_item(
                user_id,
                AddCartItem {
                    product_id: Some(pricey),
                    quantity: 2,
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, DomainError::Cart(CartError::TotalTooLarge)));
        assert_eq!(h.cart_quantity(user_id).await, 0);

        // Written straight to the store, past the cart total check.
        let mut tx = h.store.begin().await.unwrap();
        tx.upsert_cart_line(NewCartLine {
            user_id,
            product_id: pricey,
            quantity: 2,
            unit_price: Money::from_cents(i64::MAX / 2 + 1),
        })
        .await
        .unwrap();
        tx.commit().await.unwrap();

        let err = h.orders.place_order(user_id).await.unwrap_err();
        assert!(matches!(err, DomainError::Order(OrderError::TotalTooLarge)));
        assert_eq!(err.kind(), "total_too_large");
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.stock(pricey).await, 5);
    }

    #[tokio::test(start_paused = true)]
    async fn placement_blocked_past_deadline_times_out() {
        let h = harness_with_deadline(Duration::from_millis(100));
        let user_id = UserId::new();
        let a = h.product("A", 100, 5).await;
        h.add(user_id, a, 1).await;

        // An open transaction holds the store until it is dropped.
        let blocker = h.store.begin().await.unwrap();

        let err = h.orders.place_order(user_id).await.unwrap_err();
        assert!(matches!(
            err,
            DomainError::Timeout {
                operation: "place_order",
                ..
            }
        ));

        drop(blocker);
        assert_eq!(h.store.order_count().await, 0);
        assert_eq!(h.stock(a).await, 5);

        h.orders.place_order(user_id).await.unwrap();
        assert_eq!(h.stock(a).await, 4);
    }
}

mod payments {
    use super::*;

    async fn placed_order(h: &Harness, user_id: UserId) -> (OrderId, String, Money) {
        let a = h.product("A", 100, 5).await;
        h.add(user_id, a, 2).await;
        let details = h.orders.place_order(user_id).await.unwrap();
        (
            details.order.id,
            details.order.payment_token,
            details.order.total_price,
        )
    }

    #[tokio::test]
    async fn exact_amount_marks_order_paid() {
        let h = harness();
        let user_id = UserId::new();
        let (order_id, token, total) = placed_order(&h, user_id).await;

        let paid = h
            .orders
            .pay_order(user_id, &token, payment(order_id, total))
            .await
            .unwrap();

        assert_eq!(paid.order_id, order_id);
        assert_eq!(paid.amount, total);
        assert_eq!(paid.method, "bank_transfer");

        let details = h.orders.get_order(user_id, order_id).await.unwrap();
        assert_eq!(details.order.status, OrderStatus::Paid);
        assert_eq!(details.payment, Some(paid));
    }

    #[tokio::test]
    async fn overpayment_is_kept_as_is() {
        let h = harness();
        let user_id = UserId::new();
        let (order_id, token, total) = placed_order(&h, user_id).await;
        let amount = total + Money::from_cents(75);

        let paid = h
            .orders
            .pay_order(user_id, &token, payment(order_id, amount))
            .await
            .unwrap();

        assert_eq!(paid.amount, amount);
    }

    #[tokio::test]
    async fn underpayment_is_rejected_and_order_stays_unpaid() {
        let h = harness();
        let user_id = UserId::new();
        let (order_id, token, total) = placed_order(&h, user_id).await;

        let err = h
            .orders
            .pay_order(
                user_id,
                &token,
                payment(order_id, total - Money::from_cents(1)),
            )
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Order(OrderError::AmountMismatch { expected, .. }) if expected == total
        ));
        let details = h.orders.get_order(user_id, order_id).await.unwrap();
        assert_eq!(details.order.status, OrderStatus::Unpaid);
        assert_eq!(h.store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn second_payment_is_rejected() {
        let h = harness();
        let user_id = UserId::new();
        let (order_id, token, total) = placed_order(&h, user_id).await;

        h.orders
            .pay_order(user_id, &token, payment(order_id, total))
            .await
            .unwrap();
        let err = h
            .orders
            .pay_order(user_id, &token, payment(order_id, total))
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "order_already_paid");
        assert_eq!(h.store.payment_count().await, 1);
    }

    #[tokio::test]
    async fn wrong_token_is_rejected() {
        let h = harness();
        let user_id = UserId::new();
        let (order_id, _, total) = placed_order(&h, user_id).await;

        let err = h
            .orders
            .pay_order(user_id, "tok-guessed", payment(order_id, total))
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            DomainError::Order(OrderError::PaymentTokenMismatch(id)) if id == order_id
        ));
        assert_eq!(h.store.payment_count().await, 0);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found() {
        let h = harness();
        let err = h
            .orders
            .pay_order(
                UserId::new(),
                "tok-first-order",
                payment(OrderId::new(), Money::from_cents(100)),
            )
            .await
            .unwrap_err();

        assert_eq!(err.kind(), "order_not_found");
    }

    #[tokio::test]
    async fn invalid_request_never_reaches_the_store() {
        let h = harness();
        let user_id = UserId::new();
        let (order_id, token, _) = placed_order(&h, user_id).await;

        let err = h
            .orders
            .pay_order(
                user_id,
                &token,
                PayOrder::new(order_id, "not a url", Money::zero(), ""),
            )
            .await
            .unwrap_err();

        let DomainError::Validation(errors) = err else {
            panic!("expected validation error, got {err:?}");
        };
        assert_eq!(errors.errors().len(), 3);
        assert_eq!(h.store.payment_count().await, 0);
    }
}

mod read_side {
    use super::*;

    #[tokio::test]
    async fn orders_are_private_and_listed_newest_first() {
        let h = harness();
        let owner = UserId::new();
        let a = h.product("A", 100, 10).await;

        h.add(owner, a, 1).await;
        let first = h.orders.place_order(owner).await.unwrap();
        tokio::time::sleep(Duration::from_millis(5)).await;
        h.add(owner, a, 1).await;
        let second = h.orders.place_order(owner).await.unwrap();

        let listed = h.orders.list_orders(owner).await.unwrap();
        let ids: Vec<OrderId> = listed.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![second.order.id, first.order.id]);

        let err = h
            .orders
            .get_order(UserId::new(), first.order.id)
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "order_not_found");
        assert!(h.orders.list_orders(UserId::new()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn ordered_products_cannot_be_deleted() {
        let h = harness();
        let user_id = UserId::new();
        let a = h.product("A", 100, 10).await;
        h.add(user_id, a, 1).await;
        h.orders.place_order(user_id).await.unwrap();

        let err = h.catalog.delete_product(a).await.unwrap_err();
        assert_eq!(err.kind(), "product_referenced");
        assert_eq!(h.stock(a).await, 9);
    }
}
