//! Back-office route handlers.
//!
//! Every handler takes [`RequireAdmin`](crate::middleware::RequireAdmin):
//! anonymous requests go to login, customers go home.
//!
//! ```text
//! GET  /admin                           - Dashboard (?days=7|30|90)
//! GET  /admin/products                  - Product list (?category&page&sort&order&search)
//! GET  /admin/products/new              - New product form
//! POST /admin/products                  - Create product (multipart, up to 5 images)
//! GET  /admin/products/{id}/edit        - Edit product form
//! POST /admin/products/{id}             - Update product fields
//! POST /admin/products/{id}/delete      - Delete product
//! POST /admin/products/{id}/toggle      - Flip availability (HTMX row)
//! POST /admin/products/bulk             - Bulk delete/activate/deactivate
//! GET  /admin/categories                - Category list and create form
//! POST /admin/categories                - Create category
//! GET  /admin/categories/{id}/edit      - Edit category form
//! POST /admin/categories/{id}           - Update category
//! POST /admin/categories/{id}/delete    - Delete category (only when empty)
//! GET  /admin/orders                    - Order list (?page&search&status)
//! GET  /admin/orders/{id}               - Order detail with status form
//! POST /admin/orders/{id}/status        - Change status
//! GET  /admin/orders/{id}/invoice       - Printable invoice
//! ```

pub mod categories;
pub mod dashboard;
pub mod orders;
pub mod products;

use axum::{
    Router,
    extract::DefaultBodyLimit,
    routing::{get, post},
};

use crate::state::AppState;

/// Upload ceiling for the product create form (five images plus fields).
const PRODUCT_UPLOAD_LIMIT: usize = 25 * 1024 * 1024;

/// Create the back-office router.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/", get(dashboard::dashboard))
        .route(
            "/products",
            get(products::index)
                .post(products::create)
                .layer(DefaultBodyLimit::max(PRODUCT_UPLOAD_LIMIT)),
        )
        .route("/products/new", get(products::new))
        .route("/products/bulk", post(products::bulk))
        .route("/products/{id}", post(products::update))
        .route("/products/{id}/edit", get(products::edit))
        .route("/products/{id}/delete", post(products::delete))
        .route("/products/{id}/toggle", post(products::toggle))
        .route("/categories", get(categories::index).post(categories::create))
        .route("/categories/{id}", post(categories::update))
        .route("/categories/{id}/edit", get(categories::edit))
        .route("/categories/{id}/delete", post(categories::delete))
        .route("/orders", get(orders::index))
        .route("/orders/{id}", get(orders::show))
        .route("/orders/{id}/status", post(orders::update_status))
        .route("/orders/{id}/invoice", get(orders::invoice))
}
