//! Transactional storage for products, carts, orders and payments.
//!
//! Every read and write goes through a [`StoreTx`], an atomic unit obtained
//! from [`Store::begin`]. Dropping a transaction without committing discards
//! all of its changes.

pub mod error;
pub mod memory;
pub mod patch;
pub mod postgres;
pub mod record;
pub mod store;

pub use error::{Result, StoreError};
pub use memory::InMemoryStore;
pub use patch::{ProductPatch, ProductPatchBuilder};
pub use postgres::PostgresStore;
pub use record::{
    CartLine, CartLineView, CartSnapshotLine, NewCartLine, NewOrder, NewOrderLine, NewPayment,
    NewProduct, NewUser, Order, OrderLine, OrderStatus, PageRequest, Payment, Product, ProductPage,
    ProductSummary, User,
};
pub use store::{Store, StoreTx, constraints};
