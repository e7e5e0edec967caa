//! Back-office product management.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    body::Bytes,
    extract::{Multipart, Path, Query, State},
    response::{IntoResponse, Redirect, Response},
};
use highstreet_core::{FieldErrors, ProductId};
use tower_sessions::Session;
use tracing::instrument;

use crate::api::{ApiError, Category, ImageUpload, Product};
use crate::error::{AppError, Result};
use crate::filters;
use crate::middleware::{RequireAdmin, push_flash};
use crate::models::{CurrentUser, Flash};
use crate::routes::{Chrome, Pager, session_expired};
use crate::services::catalog::{AdminProductQuery, MAX_PRODUCT_IMAGES, filter_by_name};
use crate::services::{BulkAction, CatalogError, CatalogService, ProductForm};
use crate::state::AppState;

/// Product row display data for the admin table.
#[derive(Clone)]
pub struct AdminProductRow {
    pub id: String,
    pub name: String,
    pub price: String,
    pub category: String,
    pub stock: u32,
    pub stock_label: &'static str,
    pub stock_badge: &'static str,
    pub available: bool,
    pub image: Option<String>,
}

impl From<&Product> for AdminProductRow {
    fn from(product: &Product) -> Self {
        let status = product.stock_status();
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price: product.price.display(),
            category: product.category.clone(),
            stock: product.stock,
            stock_label: status.label(),
            stock_badge: status.badge(),
            available: product.availability,
            image: product.primary_image().map(|i| i.data_uri()),
        }
    }
}

/// Product list template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products/index.html")]
pub struct AdminProductsTemplate {
    pub chrome: Chrome,
    pub products: Vec<AdminProductRow>,
    pub categories: Vec<Category>,
    pub category: String,
    pub sort: String,
    pub order: String,
    pub search: String,
    pub total: u32,
    pub pager: Pager,
}

/// Product table row fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/admin_product_row.html")]
pub struct ProductRowTemplate {
    pub product: AdminProductRow,
}

/// New/edit product form template.
#[derive(Template, WebTemplate)]
#[template(path = "admin/products/form.html")]
pub struct ProductFormTemplate {
    pub chrome: Chrome,
    pub title: &'static str,
    pub action: String,
    /// Whether the form uploads images (create only).
    pub with_images: bool,
    pub max_images: usize,
    pub form: ProductForm,
    pub errors: FieldErrors,
    pub categories: Vec<Category>,
}

impl ProductFormTemplate {
    /// The error message for a field, or an empty string.
    #[must_use]
    pub fn error(&self, field: &str) -> &str {
        self.errors.get(field).unwrap_or_default()
    }
}

async fn categories(state: &AppState, admin: &CurrentUser) -> Vec<Category> {
    state
        .api()
        .get_admin_categories(&admin.token)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(error = %e, "Failed to load categories");
            Vec::new()
        })
}

// =============================================================================
// List
// =============================================================================

/// Product list.
#[instrument(skip(state, session, admin, query), fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Query(query): Query<AdminProductQuery>,
) -> Result<impl IntoResponse> {
    let backend_query = query.to_query();
    let (page, categories) = tokio::join!(
        state.api().get_products(&backend_query),
        categories(&state, &admin),
    );
    let page = page?;

    let products = filter_by_name(&page.products, &query.search)
        .into_iter()
        .map(AdminProductRow::from)
        .collect();

    let category = backend_query.category.clone().unwrap_or_default();
    let sort = query.sort.map(|s| s.as_str()).unwrap_or_default();
    let order = query.order.map(|o| o.as_str()).unwrap_or_default();

    Ok(AdminProductsTemplate {
        pager: Pager::new(
            backend_query.page,
            page.total_pages,
            "/admin/products",
            &[
                ("category", category.as_str()),
                ("sort", sort),
                ("order", order),
                ("search", query.search.trim()),
            ],
        ),
        chrome: Chrome::new(&session, Some(admin)).await,
        products,
        categories,
        category,
        sort: sort.to_string(),
        order: order.to_string(),
        search: query.search,
        total: page.total,
    })
}

// =============================================================================
// Create / Edit
// =============================================================================

/// New product form.
pub async fn new(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
) -> impl IntoResponse {
    let categories = categories(&state, &admin).await;
    ProductFormTemplate {
        chrome: Chrome::new(&session, Some(admin)).await,
        title: "Add Product",
        action: "/admin/products".to_string(),
        with_images: true,
        max_images: MAX_PRODUCT_IMAGES,
        form: ProductForm {
            availability: Some("true".to_string()),
            ..ProductForm::default()
        },
        errors: FieldErrors::new(),
        categories,
    }
}

/// Read the multipart product form: text fields plus image files.
///
/// Empty file inputs are skipped.
async fn read_product_upload(
    mut multipart: Multipart,
) -> std::result::Result<(ProductForm, Vec<ImageUpload>), AppError> {
    let mut form = ProductForm::default();
    let mut images = Vec::new();
    let bad_upload = |e: axum::extract::multipart::MultipartError| {
        AppError::BadRequest(format!("Invalid upload: {e}"))
    };

    while let Some(field) = multipart.next_field().await.map_err(bad_upload)? {
        let name = field.name().unwrap_or_default().to_string();
        if name == "images" {
            let file_name = field.file_name().unwrap_or_default().to_string();
            let content_type = field
                .content_type()
                .unwrap_or("application/octet-stream")
                .to_string();
            let bytes = field.bytes().await.map_err(bad_upload)?;
            if !file_name.is_empty() && !bytes.is_empty() {
                images.push(ImageUpload {
                    file_name,
                    content_type,
                    bytes: bytes.to_vec(),
                });
            }
            continue;
        }

        let value = field.text().await.map_err(bad_upload)?;
        match name.as_str() {
            "name" => form.name = value,
            "description" => form.description = value,
            "price" => form.price = value,
            "category" => form.category = value,
            "stock" => form.stock = value,
            "availability" => form.availability = Some(value),
            "sizes" => form.sizes = value,
            "tags" => form.tags = value,
            _ => {}
        }
    }

    Ok((form, images))
}

/// Create a product.
#[instrument(skip(state, session, admin, multipart), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    multipart: Multipart,
) -> Result<Response> {
    let (form, images) = read_product_upload(multipart).await?;

    let result = CatalogService::new(state.api(), &admin.token)
        .create_product(&form, images)
        .await;
    let errors = match result {
        Ok(()) => {
            push_flash(&session, Flash::success("Product created")).await;
            return Ok(Redirect::to("/admin/products").into_response());
        }
        Err(e) => form_failure(&session, e, "Failed to create product").await?,
    };

    let categories = categories(&state, &admin).await;
    Ok(ProductFormTemplate {
        chrome: Chrome::new(&session, Some(admin)).await,
        title: "Add Product",
        action: "/admin/products".to_string(),
        with_images: true,
        max_images: MAX_PRODUCT_IMAGES,
        form,
        errors,
        categories,
    }
    .into_response())
}

/// Edit product form.
#[instrument(skip(state, session, admin), fields(admin_id = %admin.id, product_id = %id))]
pub async fn edit(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let (product, categories) =
        tokio::join!(state.api().get_product(&id), categories(&state, &admin));
    let product = product?;

    Ok(ProductFormTemplate {
        chrome: Chrome::new(&session, Some(admin)).await,
        title: "Edit Product",
        action: format!("/admin/products/{id}"),
        with_images: false,
        max_images: MAX_PRODUCT_IMAGES,
        form: ProductForm::from_product(&product),
        errors: FieldErrors::new(),
        categories,
    })
}

/// Update a product's fields.
#[instrument(skip(state, session, admin, form), fields(admin_id = %admin.id, product_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
    Form(form): Form<ProductForm>,
) -> Result<Response> {
    let result = CatalogService::new(state.api(), &admin.token)
        .update_product(&id, &form)
        .await;
    let errors = match result {
        Ok(()) => {
            push_flash(&session, Flash::success("Product updated")).await;
            return Ok(Redirect::to("/admin/products").into_response());
        }
        Err(e) => form_failure(&session, e, "Failed to update product").await?,
    };

    let categories = categories(&state, &admin).await;
    Ok(ProductFormTemplate {
        chrome: Chrome::new(&session, Some(admin)).await,
        title: "Edit Product",
        action: format!("/admin/products/{id}"),
        with_images: false,
        max_images: MAX_PRODUCT_IMAGES,
        form,
        errors,
        categories,
    }
    .into_response())
}

/// Turn a failed save into field errors for the re-rendered form.
///
/// Backend failures become a flash; an expired token propagates.
async fn form_failure(
    session: &Session,
    error: CatalogError,
    fallback: &str,
) -> std::result::Result<FieldErrors, AppError> {
    match error {
        CatalogError::Validation(errors) => Ok(errors),
        CatalogError::Api(ApiError::Unauthorized) => Err(AppError::Api(ApiError::Unauthorized)),
        e => {
            tracing::warn!(error = %e, "Product save failed");
            push_flash(session, Flash::error(e.user_message(fallback))).await;
            Ok(FieldErrors::new())
        }
    }
}

// =============================================================================
// Delete / Toggle / Bulk
// =============================================================================

/// Delete a product.
#[instrument(skip(state, session, admin), fields(admin_id = %admin.id, product_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Response {
    match state.api().delete_product(&admin.token, &id).await {
        Ok(()) => push_flash(&session, Flash::success("Product deleted")).await,
        Err(ApiError::Unauthorized) => return session_expired(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to delete product");
            push_flash(&session, Flash::error(e.user_message("Failed to delete product"))).await;
        }
    }
    Redirect::to("/admin/products").into_response()
}

/// Flip availability and re-render the row (HTMX).
#[instrument(skip(state, admin), fields(admin_id = %admin.id, product_id = %id))]
pub async fn toggle(
    State(state): State<AppState>,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let service = CatalogService::new(state.api(), &admin.token);
    match service.toggle_availability(&id).await {
        Ok(available) => tracing::info!(available, "Product availability changed"),
        Err(CatalogError::Api(e)) => return Err(e.into()),
        Err(e) => return Err(AppError::Internal(e.to_string())),
    }

    let product = state.api().get_product(&id).await?;
    Ok(ProductRowTemplate {
        product: AdminProductRow::from(&product),
    })
}

/// Parse the bulk form: repeated `ids` checkboxes plus an `action`.
fn parse_bulk(body: &[u8]) -> (Option<BulkAction>, Vec<ProductId>) {
    let mut action = None;
    let mut ids = Vec::new();
    for (key, value) in url::form_urlencoded::parse(body) {
        match key.as_ref() {
            "ids" if !value.trim().is_empty() => ids.push(ProductId::new(value.trim())),
            "action" => {
                action = match value.as_ref() {
                    "delete" => Some(BulkAction::Delete),
                    "activate" => Some(BulkAction::Activate),
                    "deactivate" => Some(BulkAction::Deactivate),
                    _ => None,
                };
            }
            _ => {}
        }
    }
    (action, ids)
}

/// Apply a bulk action to the selected products.
#[instrument(skip(state, session, admin, body), fields(admin_id = %admin.id))]
pub async fn bulk(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    body: Bytes,
) -> Response {
    let (action, ids) = parse_bulk(&body);
    let Some(action) = action else {
        push_flash(&session, Flash::error("Please choose an action")).await;
        return Redirect::to("/admin/products").into_response();
    };

    match CatalogService::new(state.api(), &admin.token)
        .bulk(action, &ids)
        .await
    {
        Ok(outcome) if outcome.is_complete() => {
            push_flash(&session, Flash::success(outcome.summary())).await;
        }
        Ok(outcome) => push_flash(&session, Flash::error(outcome.summary())).await,
        Err(e) => push_flash(&session, Flash::error(e.user_message("Bulk action failed"))).await,
    }
    Redirect::to("/admin/products").into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_bulk() {
        let (action, ids) = parse_bulk(b"ids=p1&ids=p2&ids=&action=deactivate");
        assert_eq!(action, Some(BulkAction::Deactivate));
        assert_eq!(ids, vec![ProductId::new("p1"), ProductId::new("p2")]);

        let (action, ids) = parse_bulk(b"action=archive");
        assert_eq!(action, None);
        assert!(ids.is_empty());
    }

    #[test]
    fn test_row_badges() {
        let product: Product = serde_json::from_value(serde_json::json!({
            "_id": "p1", "name": "Mug", "price": 8.5, "stock": 3, "availability": false
        }))
        .unwrap();
        let row = AdminProductRow::from(&product);
        assert_eq!(row.price, "£8.50");
        assert_eq!(row.stock_label, "Low Stock");
        assert!(!row.available);
    }
}
