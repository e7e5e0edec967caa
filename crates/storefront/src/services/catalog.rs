//! Back-office catalog management: product and category forms, bulk
//! product actions, and the category delete guard.

use std::sync::LazyLock;

use highstreet_core::{CategoryId, FieldErrors, Price, ProductId};
use regex::Regex;
use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;
use tracing::{info, instrument, warn};

use crate::api::{
    ApiClient, ApiError, Category, CategoryInput, ImageUpload, Product, ProductInput,
    ProductQuery, ProductSort, SortOrder,
};

/// Products per page on the admin list.
pub const ADMIN_PRODUCTS_PER_PAGE: u32 = 10;

/// Most images a product may carry.
pub const MAX_PRODUCT_IMAGES: usize = 5;

/// Shortest accepted product description, in characters.
pub const MIN_DESCRIPTION_LENGTH: usize = 10;

static SLUG_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z0-9]+(?:-[a-z0-9]+)*$").expect("Invalid regex"));

/// Errors from catalog operations.
#[derive(Debug, Error)]
pub enum CatalogError {
    /// The form failed validation; nothing was sent.
    #[error("validation failed: {0}")]
    Validation(FieldErrors),

    /// The category still has products and cannot be deleted.
    #[error("category has {0} products")]
    CategoryInUse(u32),

    /// No category has that ID.
    #[error("category not found")]
    CategoryNotFound,

    /// A bulk action was requested with nothing selected.
    #[error("no products selected")]
    NoSelection,

    /// Backend call failed.
    #[error(transparent)]
    Api(#[from] ApiError),
}

impl CatalogError {
    /// Whether the backend rejected the session token.
    #[must_use]
    pub const fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Api(ApiError::Unauthorized))
    }

    /// Message for the flash notification.
    #[must_use]
    pub fn user_message(&self, fallback: &str) -> String {
        match self {
            Self::Validation(_) => "Please fix the errors in the form".to_string(),
            Self::CategoryInUse(count) => format!("Cannot delete - has {count} products"),
            Self::CategoryNotFound => "Category not found".to_string(),
            Self::NoSelection => "No products selected".to_string(),
            Self::Api(e) => e.user_message(fallback),
        }
    }
}

// =============================================================================
// Product form
// =============================================================================

/// Product create/edit form as submitted.
///
/// Numbers arrive as text so bad input can be reported per field instead
/// of rejecting the whole request.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub price: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub stock: String,
    /// Checkbox: present when ticked.
    #[serde(default)]
    pub availability: Option<String>,
    /// Comma-separated.
    #[serde(default)]
    pub sizes: String,
    /// Comma-separated.
    #[serde(default)]
    pub tags: String,
}

impl ProductForm {
    /// Prefill the edit form from a product.
    #[must_use]
    pub fn from_product(product: &Product) -> Self {
        Self {
            name: product.name.clone(),
            description: product.description.clone(),
            price: product.price.amount().to_string(),
            category: product.category.clone(),
            stock: product.stock.to_string(),
            availability: product.availability.then(|| "on".to_string()),
            sizes: product.sizes.join(", "),
            tags: product.tags.join(", "),
        }
    }

    #[must_use]
    pub const fn is_available(&self) -> bool {
        self.availability.is_some()
    }

    /// Validate the form and build the product fields.
    ///
    /// `image_count` is the number of new images uploaded with the form.
    ///
    /// # Errors
    ///
    /// Returns one message per failing field.
    pub fn parse(&self, image_count: usize) -> Result<ProductInput, FieldErrors> {
        let mut errors = FieldErrors::new();

        let name = self.name.trim();
        if name.is_empty() {
            errors.insert("name", "Name is required");
        }

        let price = self
            .price
            .trim()
            .parse::<Decimal>()
            .ok()
            .map(Price::new)
            .filter(Price::is_positive);
        if price.is_none() {
            errors.insert("price", "Valid price is required");
        }

        let category = self.category.trim();
        if category.is_empty() {
            errors.insert("category", "Category is required");
        }

        let stock = match self.stock.trim() {
            "" => Some(0),
            raw => match raw.parse::<i64>() {
                Ok(n) if n < 0 => {
                    errors.insert("stock", "Stock cannot be negative");
                    None
                }
                Ok(n) => {
                    let stock = u32::try_from(n).ok();
                    if stock.is_none() {
                        errors.insert("stock", "Stock is too large");
                    }
                    stock
                }
                Err(_) => {
                    errors.insert("stock", "Stock must be a whole number");
                    None
                }
            },
        };

        let description = self.description.trim();
        if description.chars().count() < MIN_DESCRIPTION_LENGTH {
            errors.insert(
                "description",
                format!("Description must be at least {MIN_DESCRIPTION_LENGTH} characters"),
            );
        }

        if image_count > MAX_PRODUCT_IMAGES {
            errors.insert(
                "images",
                format!("Maximum {MAX_PRODUCT_IMAGES} images allowed"),
            );
        }

        match (price, stock) {
            (Some(price), Some(stock)) if errors.is_empty() => Ok(ProductInput {
                name: name.to_string(),
                description: description.to_string(),
                price,
                category: category.to_string(),
                stock,
                availability: self.is_available(),
                sizes: split_list(&self.sizes),
                tags: split_list(&self.tags),
            }),
            _ => Err(errors),
        }
    }
}

/// Split a comma-separated field, dropping blanks.
fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(ToString::to_string)
        .collect()
}

// =============================================================================
// Category form
// =============================================================================

/// Category create/edit form as submitted.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CategoryForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub description: String,
}

impl CategoryForm {
    #[must_use]
    pub fn from_category(category: &Category) -> Self {
        Self {
            name: category.name.clone(),
            slug: category.slug.clone(),
            description: category.description.clone(),
        }
    }

    /// Validate the form. The slug is lowercased and whitespace runs become
    /// hyphens before it is checked.
    ///
    /// # Errors
    ///
    /// Returns one message per failing field.
    pub fn parse(&self) -> Result<CategoryInput, FieldErrors> {
        let mut errors = FieldErrors::new();
        let name = self.name.trim();
        let slug = normalize_slug(&self.slug);

        if name.is_empty() || slug.is_empty() {
            let field = if name.is_empty() { "name" } else { "slug" };
            errors.insert(field, "Name and slug are required");
        } else if !SLUG_RE.is_match(&slug) {
            errors.insert(
                "slug",
                "Slug may only contain lowercase letters, numbers, and single hyphens",
            );
        }

        errors.into_result(CategoryInput {
            name: name.to_string(),
            slug,
            description: self.description.trim().to_string(),
        })
    }
}

/// Lowercase a slug and turn whitespace runs into hyphens.
#[must_use]
pub fn normalize_slug(raw: &str) -> String {
    raw.trim()
        .to_lowercase()
        .split_whitespace()
        .collect::<Vec<_>>()
        .join("-")
}

/// Refuse to delete a category that still has products.
///
/// # Errors
///
/// Returns `CatalogError::CategoryInUse` when the product count is non-zero.
pub fn check_category_delete(category: &Category) -> Result<(), CatalogError> {
    if category.is_deletable() {
        Ok(())
    } else {
        Err(CatalogError::CategoryInUse(category.product_count))
    }
}

// =============================================================================
// Admin product list
// =============================================================================

/// Query string of the admin product list.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AdminProductQuery {
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub sort: Option<ProductSort>,
    #[serde(default)]
    pub order: Option<SortOrder>,
    /// Name filter applied to the loaded page.
    #[serde(default)]
    pub search: String,
}

impl AdminProductQuery {
    /// The backend query for this page.
    #[must_use]
    pub fn to_query(&self) -> ProductQuery {
        ProductQuery {
            category: self.category.clone().filter(|c| !c.trim().is_empty()),
            page: self.page.unwrap_or(1).max(1),
            limit: ADMIN_PRODUCTS_PER_PAGE,
            sort: self.sort,
            order: self.order,
        }
    }
}

/// Products whose name contains `term`, case-insensitively.
#[must_use]
pub fn filter_by_name<'p>(products: &'p [Product], term: &str) -> Vec<&'p Product> {
    let term = term.trim().to_lowercase();
    products
        .iter()
        .filter(|p| term.is_empty() || p.name.to_lowercase().contains(&term))
        .collect()
}

// =============================================================================
// Bulk actions
// =============================================================================

/// An action applied to every selected product.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BulkAction {
    Delete,
    Activate,
    Deactivate,
}

impl BulkAction {
    /// Past tense for the result message.
    #[must_use]
    pub const fn past_tense(&self) -> &'static str {
        match self {
            Self::Delete => "deleted",
            Self::Activate => "activated",
            Self::Deactivate => "deactivated",
        }
    }
}

/// Per-item result of a bulk action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkOutcome {
    pub action: BulkAction,
    pub succeeded: Vec<ProductId>,
    pub failed: Vec<(ProductId, String)>,
}

impl BulkOutcome {
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }

    /// One-line summary, e.g. `3 products activated, 1 failed`.
    #[must_use]
    pub fn summary(&self) -> String {
        let done = format!(
            "{} {} {}",
            self.succeeded.len(),
            plural(self.succeeded.len()),
            self.action.past_tense()
        );
        if self.failed.is_empty() {
            done
        } else {
            format!("{done}, {} failed", self.failed.len())
        }
    }
}

const fn plural(n: usize) -> &'static str {
    if n == 1 { "product" } else { "products" }
}

// =============================================================================
// Service
// =============================================================================

/// Catalog operations for an admin.
pub struct CatalogService<'a> {
    api: &'a ApiClient,
    token: &'a str,
}

impl<'a> CatalogService<'a> {
    #[must_use]
    pub const fn new(api: &'a ApiClient, token: &'a str) -> Self {
        Self { api, token }
    }

    /// Validate and create a product with its images.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` without calling the backend, or
    /// an error if the backend rejects the product.
    #[instrument(skip_all, fields(images = images.len()))]
    pub async fn create_product(
        &self,
        form: &ProductForm,
        images: Vec<ImageUpload>,
    ) -> Result<(), CatalogError> {
        let input = form.parse(images.len()).map_err(CatalogError::Validation)?;
        self.api.create_product(self.token, &input, images).await?;
        info!(name = %input.name, "Product created");
        Ok(())
    }

    /// Validate and update a product's fields. Existing images are kept.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` without calling the backend, or
    /// an error if the backend rejects the update.
    #[instrument(skip(self, form), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        id: &ProductId,
        form: &ProductForm,
    ) -> Result<(), CatalogError> {
        let input = form.parse(0).map_err(CatalogError::Validation)?;
        self.api.update_product(self.token, id, &input).await?;
        Ok(())
    }

    /// Flip a product's availability, returning the new value.
    ///
    /// # Errors
    ///
    /// Returns an error if the product cannot be loaded or updated.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn toggle_availability(&self, id: &ProductId) -> Result<bool, CatalogError> {
        let product = self.api.get_product(id).await?;
        let availability = !product.availability;
        self.api
            .set_product_availability(self.token, id, availability)
            .await?;
        Ok(availability)
    }

    /// Apply an action to each selected product, one request at a time.
    ///
    /// A failure on one product does not stop the rest; every product is
    /// reported as succeeded or failed.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::NoSelection` when `ids` is empty.
    #[instrument(skip(self, ids), fields(count = ids.len()))]
    pub async fn bulk(
        &self,
        action: BulkAction,
        ids: &[ProductId],
    ) -> Result<BulkOutcome, CatalogError> {
        if ids.is_empty() {
            return Err(CatalogError::NoSelection);
        }

        let mut outcome = BulkOutcome {
            action,
            succeeded: Vec::with_capacity(ids.len()),
            failed: Vec::new(),
        };

        for id in ids {
            let result = match action {
                BulkAction::Delete => self.api.delete_product(self.token, id).await,
                BulkAction::Activate => {
                    self.api.set_product_availability(self.token, id, true).await
                }
                BulkAction::Deactivate => {
                    self.api
                        .set_product_availability(self.token, id, false)
                        .await
                }
            };
            match result {
                Ok(()) => outcome.succeeded.push(id.clone()),
                Err(e) => {
                    warn!(product_id = %id, error = %e, "Bulk action failed for product");
                    outcome.failed.push((id.clone(), e.user_message("Request failed")));
                }
            }
        }

        info!(
            succeeded = outcome.succeeded.len(),
            failed = outcome.failed.len(),
            "Bulk action finished"
        );
        Ok(outcome)
    }

    /// Validate and create a category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` without calling the backend, or
    /// an error if the backend rejects the category.
    pub async fn create_category(&self, form: &CategoryForm) -> Result<(), CatalogError> {
        let input = form.parse().map_err(CatalogError::Validation)?;
        self.api.create_category(self.token, &input).await?;
        Ok(())
    }

    /// Validate and update a category.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::Validation` without calling the backend, or
    /// an error if the backend rejects the update.
    pub async fn update_category(
        &self,
        id: &CategoryId,
        form: &CategoryForm,
    ) -> Result<(), CatalogError> {
        let input = form.parse().map_err(CatalogError::Validation)?;
        self.api.update_category(self.token, id, &input).await?;
        Ok(())
    }

    /// Delete a category that has no products.
    ///
    /// The product count is read fresh from the backend; no delete request
    /// is sent for a category that still has products.
    ///
    /// # Errors
    ///
    /// Returns `CatalogError::CategoryInUse` or `CatalogError::CategoryNotFound`
    /// without deleting, or an error if the backend rejects the deletion.
    #[instrument(skip(self), fields(category_id = %id))]
    pub async fn delete_category(&self, id: &CategoryId) -> Result<(), CatalogError> {
        let categories = self.api.get_admin_categories(self.token).await?;
        let category = categories
            .iter()
            .find(|c| &c.id == id)
            .ok_or(CatalogError::CategoryNotFound)?;
        check_category_delete(category)?;

        self.api.delete_category(self.token, id).await?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    fn valid_form() -> ProductForm {
        ProductForm {
            name: "Linen Shirt".to_string(),
            description: "Breathable summer linen.".to_string(),
            price: "29.99".to_string(),
            category: "shirts".to_string(),
            stock: "12".to_string(),
            availability: Some("on".to_string()),
            sizes: "S, M, , L".to_string(),
            tags: "linen,summer".to_string(),
        }
    }

    #[test]
    fn test_product_form_parses() {
        let input = valid_form().parse(2).unwrap();
        assert_eq!(input.price, Price::from_pence(2999));
        assert_eq!(input.stock, 12);
        assert!(input.availability);
        assert_eq!(input.sizes, vec!["S", "M", "L"]);
        assert_eq!(input.tags, vec!["linen", "summer"]);
    }

    #[test]
    fn test_product_form_errors() {
        let form = ProductForm {
            name: " ".to_string(),
            description: "short".to_string(),
            price: "0".to_string(),
            category: String::new(),
            stock: "-3".to_string(),
            ..ProductForm::default()
        };
        let errors = form.parse(6).unwrap_err();

        assert_eq!(errors.get("name"), Some("Name is required"));
        assert_eq!(errors.get("price"), Some("Valid price is required"));
        assert_eq!(errors.get("category"), Some("Category is required"));
        assert_eq!(errors.get("stock"), Some("Stock cannot be negative"));
        assert_eq!(
            errors.get("description"),
            Some("Description must be at least 10 characters")
        );
        assert_eq!(errors.get("images"), Some("Maximum 5 images allowed"));
    }

    #[test]
    fn test_product_form_rejects_non_numeric_price() {
        let form = ProductForm {
            price: "ten pounds".to_string(),
            ..valid_form()
        };
        assert!(form.parse(0).unwrap_err().has("price"));
    }

    #[test]
    fn test_category_form() {
        let form = CategoryForm {
            name: "Home Goods".to_string(),
            slug: " Home  Goods ".to_string(),
            description: String::new(),
        };
        assert_eq!(form.parse().unwrap().slug, "home-goods");

        let missing = CategoryForm {
            name: "Home".to_string(),
            ..CategoryForm::default()
        };
        assert_eq!(
            missing.parse().unwrap_err().get("slug"),
            Some("Name and slug are required")
        );

        let unsafe_slug = CategoryForm {
            name: "Home".to_string(),
            slug: "home/goods".to_string(),
            description: String::new(),
        };
        assert!(unsafe_slug.parse().unwrap_err().has("slug"));
    }

    #[test]
    fn test_category_delete_guard() {
        let used: Category = serde_json::from_value(json!({
            "_id": "c1", "name": "Shirts", "slug": "shirts", "productCount": 4
        }))
        .unwrap();
        assert!(matches!(
            check_category_delete(&used),
            Err(CatalogError::CategoryInUse(4))
        ));

        let empty: Category = serde_json::from_value(json!({
            "_id": "c2", "name": "Hats", "slug": "hats"
        }))
        .unwrap();
        assert!(check_category_delete(&empty).is_ok());
    }

    #[test]
    fn test_bulk_summary() {
        let outcome = BulkOutcome {
            action: BulkAction::Activate,
            succeeded: vec!["p1".into(), "p2".into()],
            failed: vec![("p3".into(), "Not found".to_string())],
        };
        assert_eq!(outcome.summary(), "2 products activated, 1 failed");
        assert!(!outcome.is_complete());
    }

    #[test]
    fn test_filter_by_name() {
        let products: Vec<Product> = serde_json::from_value(json!([
            { "_id": "p1", "name": "Linen Shirt", "price": 1 },
            { "_id": "p2", "name": "Wool Scarf", "price": 1 }
        ]))
        .unwrap();
        assert_eq!(filter_by_name(&products, "SHIRT").len(), 1);
        assert_eq!(filter_by_name(&products, "").len(), 2);
    }

    #[test]
    fn test_admin_query_defaults() {
        let query = AdminProductQuery {
            category: Some(String::new()),
            page: Some(0),
            ..AdminProductQuery::default()
        };
        let backend = query.to_query();
        assert_eq!(backend.page, 1);
        assert_eq!(backend.limit, 10);
        assert!(backend.category.is_none());
    }
}
