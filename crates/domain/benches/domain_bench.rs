use common::{Money, ProductId, UserId};
use criterion::{Criterion, criterion_group, criterion_main};
use domain::{
    AddCartItem, CartService, Coordinator, OrderService, PayOrder, SequenceTokenGenerator,
};
use store::{InMemoryStore, NewProduct, Store};

async fn seed_products(store: &InMemoryStore, count: usize) -> Vec<ProductId> {
    let mut tx = store.begin().await.unwrap();
    let mut ids = Vec::with_capacity(count);
    for i in 0..count {
        let product = tx
            .insert_product(NewProduct {
                name: format!("Product {i}"),
                description: "Benchmark product".to_string(),
                image_url: String::new(),
                category: "bench".to_string(),
                price: Money::from_cents(100 * (i as i64 + 1)),
                stock: i32::MAX,
            })
            .await
            .unwrap();
        ids.push(product.id);
    }
    tx.commit().await.unwrap();
    ids
}

async fn fill_cart(cart: &CartService<InMemoryStore>, user_id: UserId, products: &[ProductId]) {
    for product_id in products {
        cart.add_item(
            user_id,
            AddCartItem {
                product_id: Some(*product_id),
                quantity: 1,
            },
        )
        .await
        .unwrap();
    }
}

fn bench_place_order(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let products = rt.block_on(seed_products(&store, 1));
    let cart = CartService::new(Coordinator::new(store.clone()));
    let orders = OrderService::new(store);
    let user_id = UserId::new();

    c.bench_function("domain/place_order_1_line", |b| {
        b.iter(|| {
            rt.block_on(async {
                fill_cart(&cart, user_id, &products).await;
                orders.place_order(user_id).await.unwrap();
            });
        });
    });
}

fn bench_place_order_20_lines(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let products = rt.block_on(seed_products(&store, 20));
    let cart = CartService::new(Coordinator::new(store.clone()));
    let orders = OrderService::new(store);
    let user_id = UserId::new();

    c.bench_function("domain/place_order_20_lines", |b| {
        b.iter(|| {
            rt.block_on(async {
                fill_cart(&cart, user_id, &products).await;
                orders.place_order(user_id).await.unwrap();
            });
        });
    });
}

fn bench_place_and_pay(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().unwrap();
    let store = InMemoryStore::new();
    let products = rt.block_on(seed_products(&store, 3));
    let cart = CartService::new(Coordinator::new(store.clone()));
    let orders = OrderService::with_tokens(
        Coordinator::new(store),
        SequenceTokenGenerator::default(),
    );
    let user_id = UserId::new();

    c.bench_function("domain/place_and_pay", |b| {
        b.iter(|| {
            rt.block_on(async {
                fill_cart(&cart, user_id, &products).await;
                let details = orders.place_order(user_id).await.unwrap();
                let token = details.order.payment_token.clone();
                orders
                    .pay_order(
                        user_id,
                        &token,
                        PayOrder::new(
                            details.order.id,
                            "https://example.com/receipt.png",
                            details.order.total_price,
                            "bank_transfer",
                        ),
                    )
                    .await
                    .unwrap();
            });
        });
    });
}

criterion_group!(
    benches,
    bench_place_order,
    bench_place_order_20_lines,
    bench_place_and_pay,
);
criterion_main!(benches);
