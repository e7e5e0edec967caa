//! Product endpoints.

use reqwest::Method;
use reqwest::multipart::{Form, Part};
use tracing::instrument;

use highstreet_core::ProductId;

use super::{
    ApiClient, ApiError, AvailabilityUpdate, ImageUpload, Product, ProductInput, ProductPage,
    ProductQuery, segment,
};

impl ApiClient {
    /// Get a page of products.
    ///
    /// # Errors
    ///
    /// Returns an error if the API request fails.
    #[instrument(skip(self))]
    pub async fn get_products(&self, query: &ProductQuery) -> Result<ProductPage, ApiError> {
        self.execute(self.request(Method::GET, "/products", None).query(query))
            .await
    }

    /// Get a single product.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::NotFound` if the product does not exist.
    #[instrument(skip(self), fields(product_id = %id))]
    pub async fn get_product(&self, id: &ProductId) -> Result<Product, ApiError> {
        let path = format!("/products/{}", segment(id.as_str()));
        self.execute(self.request(Method::GET, &path, None)).await
    }

    /// Create a product with its images (multipart).
    ///
    /// Images are sent as repeated `images` parts; the first is the primary
    /// image. Sizes and tags are sent comma-joined.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the product.
    #[instrument(skip(self, input, images), fields(name = %input.name, images = images.len()))]
    pub async fn create_product(
        &self,
        token: &str,
        input: &ProductInput,
        images: Vec<ImageUpload>,
    ) -> Result<Product, ApiError> {
        let mut form = Form::new()
            .text("name", input.name.clone())
            .text("description", input.description.clone())
            .text("price", input.price.amount().to_string())
            .text("category", input.category.clone())
            .text("stock", input.stock.to_string())
            .text("availability", input.availability.to_string());

        if !input.sizes.is_empty() {
            form = form.text("sizes", input.sizes.join(","));
        }
        if !input.tags.is_empty() {
            form = form.text("tags", input.tags.join(","));
        }

        for image in images {
            let part = Part::bytes(image.bytes)
                .file_name(image.file_name)
                .mime_str(&image.content_type)?;
            form = form.part("images", part);
        }

        self.execute(
            self.request(Method::POST, "/products", Some(token))
                .multipart(form),
        )
        .await
    }

    /// Update a product's fields (images are left untouched).
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the update.
    #[instrument(skip(self, token, input), fields(product_id = %id))]
    pub async fn update_product(
        &self,
        token: &str,
        id: &ProductId,
        input: &ProductInput,
    ) -> Result<(), ApiError> {
        let path = format!("/products/{}", segment(id.as_str()));
        self.execute_unit(self.request(Method::PUT, &path, Some(token)).json(input))
            .await
    }

    /// Show or hide a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the update.
    #[instrument(skip(self, token), fields(product_id = %id))]
    pub async fn set_product_availability(
        &self,
        token: &str,
        id: &ProductId,
        availability: bool,
    ) -> Result<(), ApiError> {
        let path = format!("/products/{}", segment(id.as_str()));
        self.execute_unit(
            self.request(Method::PUT, &path, Some(token))
                .json(&AvailabilityUpdate { availability }),
        )
        .await
    }

    /// Delete a product.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend rejects the deletion.
    #[instrument(skip(self, token), fields(product_id = %id))]
    pub async fn delete_product(&self, token: &str, id: &ProductId) -> Result<(), ApiError> {
        let path = format!("/products/{}", segment(id.as_str()));
        self.execute_unit(self.request(Method::DELETE, &path, Some(token)))
            .await
    }
}
