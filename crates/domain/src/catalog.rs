//! Product catalog management.

use common::{Money, ProductId};
use serde::Deserialize;
use store::{NewProduct, PageRequest, Product, ProductPatch, Store, constraints};
use thiserror::Error;

use crate::coordinator::{Coordinator, settle};
use crate::error::DomainError;
use crate::validation::{FieldError, Rule, Validate, ValidationErrors, Validator};

/// Page size used when the caller does not ask for one.
pub const DEFAULT_PER_PAGE: u32 = 20;

/// Largest page a caller may ask for.
pub const MAX_PER_PAGE: u32 = 100;

/// Errors specific to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("Product not found: {0}")]
    ProductNotFound(ProductId),

    /// The product appears on an order and cannot be removed.
    #[error("Product {0} is referenced by an order")]
    ProductReferenced(ProductId),
}

impl CatalogError {
    /// Stable, machine-readable name of the error.
    pub fn kind(&self) -> &'static str {
        match self {
            CatalogError::ProductNotFound(_) => "product_not_found",
            CatalogError::ProductReferenced(_) => "product_referenced",
        }
    }
}

/// Request to add a product to the catalog.
#[derive(Debug, Clone, Deserialize)]
pub struct CreateProduct {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub image_url: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub price: Money,
    #[serde(default)]
    pub stock: i32,
}

impl Validate for CreateProduct {
    fn validate(&self) -> Result<(), ValidationErrors> {
        Validator::new()
            .required("name", &self.name)
            .required("description", &self.description)
            .http_url("image_url", &self.image_url)
            .positive("price", self.price.cents())
            .non_negative("stock", i64::from(self.stock))
            .finish()
    }
}

impl From<CreateProduct> for NewProduct {
    fn from(cmd: CreateProduct) -> Self {
        NewProduct {
            name: cmd.name,
            description: cmd.description,
            image_url: cmd.image_url,
            category: cmd.category,
            price: cmd.price,
            stock: cmd.stock,
        }
    }
}

impl Validate for ProductPatch {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut validator = Validator::new();
        validator.check(!self.is_empty(), || {
            FieldError::new(
                "product",
                Rule::AtLeastOneField,
                "at least one field must be provided",
            )
        });
        if let Some(name) = &self.name {
            validator.required("name", name);
        }
        if let Some(description) = &self.description {
            validator.required("description", description);
        }
        if let Some(image_url) = &self.image_url {
            validator.http_url("image_url", image_url);
        }
        if let Some(price) = self.price {
            validator.positive("price", price.cents());
        }
        if let Some(stock) = self.stock {
            validator.non_negative("stock", i64::from(stock));
        }
        validator.finish()
    }
}

/// A 1-based page selector as callers send it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
pub struct Paging {
    pub page: Option<u32>,
    #[serde(alias = "limit")]
    pub per_page: Option<u32>,
}

impl Paging {
    /// Returns the page number, never less than 1.
    pub fn page(&self) -> u32 {
        self.page.unwrap_or(1).max(1)
    }

    /// Returns the page size, clamped to `1..=MAX_PER_PAGE`.
    pub fn per_page(&self) -> u32 {
        self.per_page
            .unwrap_or(DEFAULT_PER_PAGE)
            .clamp(1, MAX_PER_PAGE)
    }

    fn to_request(self) -> PageRequest {
        let per_page = i64::from(self.per_page());
        PageRequest {
            limit: per_page,
            offset: i64::from(self.page() - 1) * per_page,
        }
    }
}

/// One page of the catalog.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductListing {
    pub products: Vec<Product>,
    pub total: i64,
    pub max_page: i64,
}

/// Service for managing the product catalog.
pub struct CatalogService<S: Store> {
    coordinator: Coordinator<S>,
}

impl<S: Store> CatalogService<S> {
    pub fn new(coordinator: Coordinator<S>) -> Self {
        Self { coordinator }
    }

    #[tracing::instrument(skip(self))]
    pub async fn create_product(&self, cmd: CreateProduct) -> Result<Product, DomainError> {
        cmd.validate()?;

        let product = self
            .coordinator
            .run("create_product", async {
                let mut tx = self.coordinator.begin().await?;
                let result = tx
                    .insert_product(NewProduct::from(cmd))
                    .await
                    .map_err(DomainError::from);
                settle(tx, result).await
            })
            .await?;

        tracing::info!(product_id = %product.id, "product created");
        Ok(product)
    }

    /// Applies the fields present in `patch` to a product.
    #[tracing::instrument(skip(self))]
    pub async fn update_product(
        &self,
        id: ProductId,
        patch: ProductPatch,
    ) -> Result<Product, DomainError> {
        patch.validate()?;

        self.coordinator
            .run("update_product", async {
                let mut tx = self.coordinator.begin().await?;
                let result = match tx.update_product(id, &patch).await {
                    Ok(Some(product)) => Ok(product),
                    Ok(None) => Err(CatalogError::ProductNotFound(id).into()),
                    Err(err) => Err(err.into()),
                };
                settle(tx, result).await
            })
            .await
    }

    /// Removes a product. Products that appear on an order are kept.
    #[tracing::instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> Result<(), DomainError> {
        self.coordinator
            .run("delete_product", async {
                let mut tx = self.coordinator.begin().await?;
                let result = match tx.delete_product(id).await {
                    Ok(true) => Ok(()),
                    Ok(false) => Err(CatalogError::ProductNotFound(id).into()),
                    Err(err) if err.is_conflict_on(constraints::ORDER_ITEMS_PRODUCT_FKEY) => {
                        Err(CatalogError::ProductReferenced(id).into())
                    }
                    Err(err) => Err(err.into()),
                };
                settle(tx, result).await
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn get_product(&self, id: ProductId) -> Result<Product, DomainError> {
        self.coordinator
            .run("get_product", async {
                let mut tx = self.coordinator.begin().await?;
                let result = match tx.get_product(id).await {
                    Ok(Some(product)) => Ok(product),
                    Ok(None) => Err(CatalogError::ProductNotFound(id).into()),
                    Err(err) => Err(err.into()),
                };
                settle(tx, result).await
            })
            .await
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_products(&self, paging: Paging) -> Result<ProductListing, DomainError> {
        let request = paging.to_request();

        let page = self
            .coordinator
            .run("list_products", async {
                let mut tx = self.coordinator.begin().await?;
                let result = tx.list_products(request).await.map_err(DomainError::from);
                settle(tx, result).await
            })
            .await?;

        let max_page = (page.total + request.limit - 1) / request.limit;
        Ok(ProductListing {
            products: page.products,
            total: page.total,
            max_page,
        })
    }
}
