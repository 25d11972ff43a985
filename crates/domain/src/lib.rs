//! Domain layer for the storefront backend.
//!
//! This crate provides the services behind the HTTP surface:
//! - `OrderService`: turns a cart into an order and records its payment
//! - `CatalogService`, `CartService` and `UserService` for the rest
//! - `Coordinator`: runs each unit of work in one transaction under a deadline
//! - typed request validation and payment token generation

pub mod cart;
pub mod catalog;
pub mod coordinator;
pub mod error;
pub mod order;
pub mod token;
pub mod user;
pub mod validation;

pub use cart::{AddCartItem, Cart, CartError, CartService, UpdateCartItem};
pub use catalog::{CatalogError, CatalogService, CreateProduct, Paging, ProductListing};
pub use coordinator::{Coordinator, DEFAULT_DEADLINE};
pub use error::DomainError;
pub use order::{OrderDetails, OrderError, OrderService, PayOrder};
pub use token::{RandomTokenGenerator, SequenceTokenGenerator, TokenGenerator};
pub use user::{Credentials, RegisterUser, UserError, UserService};
pub use validation::{FieldError, Rule, Validate, ValidationErrors};
