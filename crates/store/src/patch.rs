//! Partial product updates.

use common::Money;

use crate::record::Product;

/// A partial update to a product.
///
/// Each field is `Some` when it should be written and `None` when the stored
/// value must be left untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ProductPatch {
    pub name: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub category: Option<String>,
    pub price: Option<Money>,
    pub stock: Option<i32>,
}

impl ProductPatch {
    /// Creates a new patch builder.
    pub fn builder() -> ProductPatchBuilder {
        ProductPatchBuilder::default()
    }

    /// Returns true if the patch would not change anything.
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.description.is_none()
            && self.image_url.is_none()
            && self.category.is_none()
            && self.price.is_none()
            && self.stock.is_none()
    }

    /// Writes the present fields onto a product.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(name) = &self.name {
            product.name = name.clone();
        }
        if let Some(description) = &self.description {
            product.description = description.clone();
        }
        if let Some(image_url) = &self.image_url {
            product.image_url = image_url.clone();
        }
        if let Some(category) = &self.category {
            product.category = category.clone();
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
    }
}

/// Builder for [`ProductPatch`].
#[derive(Debug, Default)]
pub struct ProductPatchBuilder {
    patch: ProductPatch,
}

impl ProductPatchBuilder {
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.patch.name = Some(name.into());
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.patch.description = Some(description.into());
        self
    }

    pub fn image_url(mut self, image_url: impl Into<String>) -> Self {
        self.patch.image_url = Some(image_url.into());
        self
    }

    pub fn category(mut self, category: impl Into<String>) -> Self {
        self.patch.category = Some(category.into());
        self
    }

    pub fn price(mut self, price: Money) -> Self {
        self.patch.price = Some(price);
        self
    }

    pub fn stock(mut self, stock: i32) -> Self {
        self.patch.stock = Some(stock);
        self
    }

    /// Sets every field from optional values, leaving absent ones untouched.
    pub fn merge(mut self, other: ProductPatch) -> Self {
        self.patch.name = other.name.or(self.patch.name);
        self.patch.description = other.description.or(self.patch.description);
        self.patch.image_url = other.image_url.or(self.patch.image_url);
        self.patch.category = other.category.or(self.patch.category);
        self.patch.price = other.price.or(self.patch.price);
        self.patch.stock = other.stock.or(self.patch.stock);
        self
    }

    pub fn build(self) -> ProductPatch {
        self.patch
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use common::ProductId;

    use super::*;

    fn product() -> Product {
        Product {
            id: ProductId::new(),
            name: "Widget".to_string(),
            description: "A widget".to_string(),
            image_url: String::new(),
            category: "tools".to_string(),
            price: Money::from_cents(1000),
            stock: 5,
            created_at: Utc::now(),
            updated_at: None,
        }
    }

    #[test]
    fn empty_builder_yields_empty_patch() {
        assert!(ProductPatch::builder().build().is_empty());
    }

    #[test]
    fn apply_only_touches_present_fields() {
        let patch = ProductPatch::builder()
            .price(Money::from_cents(1500))
            .stock(0)
            .build();
        assert!(!patch.is_empty());

        let mut p = product();
        patch.apply_to(&mut p);
        assert_eq!(p.name, "Widget");
        assert_eq!(p.category, "tools");
        assert_eq!(p.price, Money::from_cents(1500));
        assert_eq!(p.stock, 0);
    }

    #[test]
    fn merge_prefers_incoming_values() {
        let patch = ProductPatch::builder()
            .name("Old")
            .category("misc")
            .merge(ProductPatch {
                name: Some("New".to_string()),
                ..Default::default()
            })
            .build();
        assert_eq!(patch.name.as_deref(), Some("New"));
        assert_eq!(patch.category.as_deref(), Some("misc"));
    }
}
