//! Catalog endpoints. Reads need a customer token, writes need the admin.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::{JsonRejection, PathRejection, QueryRejection};
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use chrono::{DateTime, Utc};
use common::{Money, ProductId};
use domain::{CreateProduct, Paging, ProductListing};
use serde::{Deserialize, Serialize};
use store::{Product, ProductPatch, Store};

use super::Envelope;
use crate::auth::{AdminUser, AuthUser};
use crate::error::ApiError;
use crate::state::AppState;

// -- Request types --

/// Partial product update. Absent fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateProductRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<i32>,
}

impl From<UpdateProductRequest> for ProductPatch {
    fn from(req: UpdateProductRequest) -> Self {
        let mut builder = ProductPatch::builder();
        if let Some(name) = req.name {
            builder = builder.name(name);
        }
        if let Some(description) = req.description {
            builder = builder.description(description);
        }
        if let Some(image_url) = req.image_url {
            builder = builder.image_url(image_url);
        }
        if let Some(category) = req.category {
            builder = builder.category(category);
        }
        if let Some(price) = req.price {
            builder = builder.price(price);
        }
        if let Some(stock) = req.stock {
            builder = builder.stock(stock);
        }
        builder.build()
    }
}

// -- Response types --

#[derive(Debug, Serialize)]
pub struct ProductResponse {
    pub id: ProductId,
    pub name: String,
    pub description: String,
    pub image_url: String,
    pub category: String,
    pub price: Money,
    pub stock: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<Product> for ProductResponse {
    fn from(product: Product) -> Self {
        Self {
            id: product.id,
            name: product.name,
            description: product.description,
            image_url: product.image_url,
            category: product.category,
            price: product.price,
            stock: product.stock,
            created_at: product.created_at,
            updated_at: product.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductListResponse {
    pub products: Vec<ProductResponse>,
    pub total: i64,
    pub max_page: i64,
}

impl From<ProductListing> for ProductListResponse {
    fn from(listing: ProductListing) -> Self {
        Self {
            products: listing.products.into_iter().map(Into::into).collect(),
            total: listing.total,
            max_page: listing.max_page,
        }
    }
}

// -- Handlers --

/// GET /api/products?page=&per_page=
#[tracing::instrument(skip(state))]
pub async fn list<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: AuthUser,
    paging: Result<Query<Paging>, QueryRejection>,
) -> Result<Json<Envelope<ProductListResponse>>, ApiError> {
    let Query(paging) = paging?;
    let listing = state.catalog.list_products(paging).await?;
    Ok(Envelope::new(listing.into()))
}

/// GET /api/products/{id}
#[tracing::instrument(skip(state))]
pub async fn get<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _user: AuthUser,
    id: Result<Path<ProductId>, PathRejection>,
) -> Result<Json<Envelope<ProductResponse>>, ApiError> {
    let Path(id) = id?;
    let product = state.catalog.get_product(id).await?;
    Ok(Envelope::new(product.into()))
}

/// POST /api/products
#[tracing::instrument(skip(state, body))]
pub async fn create<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    body: Result<Json<CreateProduct>, JsonRejection>,
) -> Result<(StatusCode, Json<Envelope<ProductResponse>>), ApiError> {
    let Json(cmd) = body?;
    let product = state.catalog.create_product(cmd).await?;
    Ok((StatusCode::CREATED, Envelope::new(product.into())))
}

/// PUT /api/products/{id}
#[tracing::instrument(skip(state, body))]
pub async fn update<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    id: Result<Path<ProductId>, PathRejection>,
    body: Result<Json<UpdateProductRequest>, JsonRejection>,
) -> Result<Json<Envelope<ProductResponse>>, ApiError> {
    let Path(id) = id?;
    let Json(req) = body?;
    let product = state.catalog.update_product(id, req.into()).await?;
    Ok(Envelope::new(product.into()))
}

/// DELETE /api/products/{id}
#[tracing::instrument(skip(state))]
pub async fn delete<S: Store + Clone + 'static>(
    State(state): State<Arc<AppState<S>>>,
    _admin: AdminUser,
    id: Result<Path<ProductId>, PathRejection>,
) -> Result<StatusCode, ApiError> {
    let Path(id) = id?;
    state.catalog.delete_product(id).await?;
    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn update_request_keeps_absent_fields_out_of_patch() {
        let req: UpdateProductRequest =
            serde_json::from_str(r#"{"price": 1500, "stock": 0}"#).unwrap();
        let patch = ProductPatch::from(req);

        assert_eq!(patch.price, Some(Money::from_cents(1500)));
        assert_eq!(patch.stock, Some(0));
        assert!(patch.name.is_none());
        assert!(patch.image_url.is_none());
    }

    #[test]
    fn empty_update_request_gives_empty_patch() {
        let patch = ProductPatch::from(UpdateProductRequest::default());
        assert!(patch.is_empty());
    }
}
