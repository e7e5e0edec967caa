//! Catalog route handlers.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::HeaderMap,
    response::{AppendHeaders, IntoResponse, Redirect, Response},
};
use highstreet_core::ProductId;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::api::{Category, Product, ProductQuery, ProductSort, SortOrder};
use crate::error::{AppError, Result, add_breadcrumb};
use crate::filters;
use crate::middleware::{OptionalAuth, RequireAuth, push_flash};
use crate::models::Flash;
use crate::routes::{CART_UPDATED_TRIGGER, Chrome, Pager, is_htmx, session_expired};
use crate::services::CartService;
use crate::state::AppState;

/// Products per page on the public listing.
pub const PRODUCTS_PER_PAGE: u32 = 12;

/// Product display data for listing cards.
#[derive(Clone)]
pub struct ProductCard {
    pub id: String,
    pub name: String,
    pub price: String,
    pub image: Option<String>,
    pub stock_label: &'static str,
    pub stock_badge: &'static str,
    pub purchasable: bool,
}

impl From<&Product> for ProductCard {
    fn from(product: &Product) -> Self {
        let status = product.stock_status();
        Self {
            id: product.id.to_string(),
            name: product.name.clone(),
            price: product.price.display(),
            image: product.primary_image().map(|i| i.data_uri()),
            stock_label: if product.availability {
                status.label()
            } else {
                "Unavailable"
            },
            stock_badge: if product.availability {
                status.badge()
            } else {
                "muted"
            },
            purchasable: product.is_purchasable(),
        }
    }
}

/// Listing query parameters.
#[derive(Debug, Default, Deserialize)]
pub struct CatalogQuery {
    pub category: Option<String>,
    pub page: Option<u32>,
    pub sort: Option<ProductSort>,
    pub order: Option<SortOrder>,
}

impl CatalogQuery {
    fn category(&self) -> Option<&str> {
        self.category.as_deref().map(str::trim).filter(|c| !c.is_empty())
    }

    fn to_query(&self) -> ProductQuery {
        ProductQuery {
            category: self.category().map(str::to_string),
            page: self.page.unwrap_or(1).max(1),
            limit: PRODUCTS_PER_PAGE,
            sort: self.sort,
            order: self.order,
        }
    }
}

/// Add-to-cart form data.
#[derive(Debug, Deserialize)]
pub struct AddToCartForm {
    pub quantity: Option<u32>,
}

/// Product listing page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/index.html")]
pub struct ProductsIndexTemplate {
    pub chrome: Chrome,
    pub products: Vec<ProductCard>,
    pub categories: Vec<Category>,
    pub category: String,
    pub sort: String,
    pub order: String,
    pub total: u32,
    pub pager: Pager,
}

/// Product detail page template.
#[derive(Template, WebTemplate)]
#[template(path = "products/show.html")]
pub struct ProductShowTemplate {
    pub chrome: Chrome,
    pub product: Product,
    pub images: Vec<String>,
    pub stock_label: &'static str,
    pub stock_badge: &'static str,
    pub category_name: Option<String>,
}

/// Add-to-cart result fragment (for HTMX).
#[derive(Template, WebTemplate)]
#[template(path = "partials/add_to_cart_result.html")]
pub struct AddToCartResultTemplate {
    pub ok: bool,
    pub message: String,
}

/// Display the product listing.
#[instrument(skip(state, session, user))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<CatalogQuery>,
) -> Result<impl IntoResponse> {
    let page = state.api().get_products(&query.to_query()).await?;
    let categories = state.api().get_categories().await.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load categories");
        Vec::new()
    });

    let category = query.category().unwrap_or_default().to_string();
    let sort = query.sort.map(|s| s.as_str()).unwrap_or_default().to_string();
    let order = query.order.map(|o| o.as_str()).unwrap_or_default().to_string();
    let pager = Pager::new(
        page.page,
        page.total_pages,
        "/products",
        &[
            ("category", category.as_str()),
            ("sort", sort.as_str()),
            ("order", order.as_str()),
        ],
    );

    Ok(ProductsIndexTemplate {
        chrome: Chrome::new(&session, user).await,
        products: page.products.iter().map(ProductCard::from).collect(),
        categories,
        category,
        sort,
        order,
        total: page.total,
        pager,
    })
}

/// Display a single product.
#[instrument(skip(state, session, user), fields(product_id = %id))]
pub async fn show(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let product = state.api().get_product(&id).await.map_err(|e| match e {
        crate::api::ApiError::NotFound(_) => AppError::NotFound(format!("product {id}")),
        other => AppError::Api(other),
    })?;

    let category_name = state.api().get_categories().await.ok().and_then(|cats| {
        cats.into_iter()
            .find(|c| c.slug == product.category)
            .map(|c| c.name)
    });

    add_breadcrumb("catalog", "Viewed product", Some(&[("product_id", id.as_str())]));

    let status = product.stock_status();
    Ok(ProductShowTemplate {
        chrome: Chrome::new(&session, user).await,
        images: product.images.iter().map(|i| i.data_uri()).collect(),
        stock_label: if product.availability {
            status.label()
        } else {
            "Unavailable"
        },
        stock_badge: status.badge(),
        category_name,
        product,
    })
}

/// Add a product to the cart.
///
/// Stock and availability are checked against a fresh product fetch before
/// the cart is touched. HTMX requests get a result fragment and a
/// `cart-updated` trigger; plain form posts redirect back with a flash.
#[instrument(skip(state, session, user, headers, form), fields(product_id = %id))]
pub async fn add_to_cart(
    State(state): State<AppState>,
    session: Session,
    RequireAuth(user): RequireAuth,
    headers: HeaderMap,
    Path(id): Path<ProductId>,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let quantity = form.quantity.unwrap_or(1);
    let htmx = is_htmx(&headers);

    let result = match state.api().get_product(&id).await {
        Ok(product) => CartService::new(state.api(), &user.token)
            .add(&product, quantity)
            .await
            .map(|cart| (product.name, cart)),
        Err(e) => Err(e.into()),
    };

    let (ok, message) = match result {
        Ok((name, cart)) => {
            add_breadcrumb("cart", "Added to cart", Some(&[("product_id", id.as_str())]));
            tracing::info!(items = cart.count(), "Added to cart");
            (true, format!("{name} added to cart"))
        }
        Err(e) if e.is_unauthorized() => return session_expired(),
        Err(e) => {
            tracing::warn!(error = %e, "Add to cart failed");
            (false, e.user_message("Failed to add to cart"))
        }
    };

    if htmx {
        let fragment = AddToCartResultTemplate { ok, message };
        return if ok {
            (AppendHeaders(CART_UPDATED_TRIGGER), fragment).into_response()
        } else {
            fragment.into_response()
        };
    }

    let flash = if ok {
        Flash::success(message)
    } else {
        Flash::error(message)
    };
    push_flash(&session, flash).await;
    Redirect::to(&format!("/products/{}", urlencoding::encode(id.as_str()))).into_response()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_card_for_unavailable_product() {
        let product: Product = serde_json::from_value(json!({
            "_id": "p1", "name": "Wool Scarf", "price": 12.5, "stock": 4, "availability": false
        }))
        .unwrap();
        let card = ProductCard::from(&product);
        assert_eq!(card.price, "£12.50");
        assert_eq!(card.stock_label, "Unavailable");
        assert!(!card.purchasable);
    }

    #[test]
    fn test_catalog_query_ignores_blank_category() {
        let query = CatalogQuery {
            category: Some("  ".to_string()),
            page: Some(0),
            ..CatalogQuery::default()
        };
        let q = query.to_query();
        assert_eq!(q.category, None);
        assert_eq!(q.page, 1);
        assert_eq!(q.limit, PRODUCTS_PER_PAGE);
    }
}
