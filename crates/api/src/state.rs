//! Shared application state.

use std::sync::Arc;

use domain::{CartService, CatalogService, Coordinator, OrderService, UserService};
use store::Store;

use crate::auth::{AdminCredentials, JwtKeys};
use crate::config::Config;

/// Shared application state accessible from all handlers.
pub struct AppState<S: Store> {
    pub orders: OrderService<S>,
    pub catalog: CatalogService<S>,
    pub cart: CartService<S>,
    pub users: UserService<S>,
    pub jwt: JwtKeys,
    pub admin: AdminCredentials,
}

impl<S: Store + Clone + 'static> AppState<S> {
    /// Wires every service to `store` with the configured deadline and
    /// credentials.
    pub fn new(store: S, config: &Config) -> Self {
        let coordinator = Coordinator::with_deadline(store, config.tx_timeout);
        Self {
            orders: OrderService::with_tokens(coordinator.clone(), Default::default()),
            catalog: CatalogService::new(coordinator.clone()),
            cart: CartService::new(coordinator.clone()),
            users: UserService::new(coordinator),
            jwt: JwtKeys::from_secret(config.jwt_secret.as_bytes(), config.jwt_ttl),
            admin: AdminCredentials::new(&config.admin_username, &config.admin_password),
        }
    }

    pub fn shared(self) -> Arc<Self> {
        Arc::new(self)
    }
}
