//! Category endpoints.
//!
//! The category list changes rarely and is read on nearly every catalog
//! page, so both the public and admin lists are cached. Any mutation
//! invalidates the whole cache.

use reqwest::Method;
use tracing::{debug, instrument};

use highstreet_core::CategoryId;

use super::{ApiClient, ApiError, CacheValue, Category, CategoryInput, segment};

const PUBLIC_KEY: &str = "categories:public";
const ADMIN_KEY: &str = "categories:admin";

impl ApiClient {
    /// Get the public category list.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_categories(&self) -> Result<Vec<Category>, ApiError> {
        self.cached_categories(PUBLIC_KEY, "/categories", None)
            .await
    }

    /// Get the admin category list (includes product counts).
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip_all)]
    pub async fn get_admin_categories(&self, token: &str) -> Result<Vec<Category>, ApiError> {
        self.cached_categories(ADMIN_KEY, "/admin/categories", Some(token))
            .await
    }

    /// Create a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the category.
    #[instrument(skip(self, token, input), fields(slug = %input.slug))]
    pub async fn create_category(&self, token: &str, input: &CategoryInput) -> Result<(), ApiError> {
        let result = self
            .execute_unit(
                self.request(Method::POST, "/categories", Some(token))
                    .json(input),
            )
            .await;
        self.invalidate_categories();
        result
    }

    /// Update a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the update.
    #[instrument(skip(self, token, input), fields(category_id = %id))]
    pub async fn update_category(
        &self,
        token: &str,
        id: &CategoryId,
        input: &CategoryInput,
    ) -> Result<(), ApiError> {
        let path = format!("/categories/{}", segment(id.as_str()));
        let result = self
            .execute_unit(self.request(Method::PUT, &path, Some(token)).json(input))
            .await;
        self.invalidate_categories();
        result
    }

    /// Delete a category.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the deletion.
    #[instrument(skip(self, token), fields(category_id = %id))]
    pub async fn delete_category(&self, token: &str, id: &CategoryId) -> Result<(), ApiError> {
        let path = format!("/categories/{}", segment(id.as_str()));
        let result = self
            .execute_unit(self.request(Method::DELETE, &path, Some(token)))
            .await;
        self.invalidate_categories();
        result
    }

    /// Drop every cached category list.
    pub fn invalidate_categories(&self) {
        self.inner.cache.invalidate_all();
    }

    async fn cached_categories(
        &self,
        key: &str,
        path: &str,
        token: Option<&str>,
    ) -> Result<Vec<Category>, ApiError> {
        if let Some(CacheValue::Categories(categories)) = self.inner.cache.get(key).await {
            debug!("Cache hit for categories");
            return Ok(categories);
        }

        let categories: Vec<Category> = self
            .execute(self.request(Method::GET, path, token))
            .await?;

        self.inner
            .cache
            .insert(key.to_string(), CacheValue::Categories(categories.clone()))
            .await;

        Ok(categories)
    }
}
