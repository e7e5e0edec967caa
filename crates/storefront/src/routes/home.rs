//! Home page route handler.

use askama::Template;
use askama_web::WebTemplate;
use axum::{extract::State, response::IntoResponse};
use tower_sessions::Session;
use tracing::instrument;

use crate::api::{Category, ProductQuery, ProductSort, SortOrder};
use crate::filters;
use crate::middleware::OptionalAuth;
use crate::routes::Chrome;
use crate::routes::products::ProductCard;
use crate::state::AppState;

/// Newest products shown on the home page.
const FEATURED_COUNT: u32 = 8;

/// Home page template.
#[derive(Template, WebTemplate)]
#[template(path = "home.html")]
pub struct HomeTemplate {
    pub chrome: Chrome,
    pub featured: Vec<ProductCard>,
    pub categories: Vec<Category>,
}

/// Display the home page.
///
/// The backend being down degrades to an empty page rather than an error;
/// the layout, login, and cart links still work.
#[instrument(skip(state, session, user))]
pub async fn home(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(user): OptionalAuth,
) -> impl IntoResponse {
    let query = ProductQuery {
        limit: FEATURED_COUNT,
        sort: Some(ProductSort::CreatedAt),
        order: Some(SortOrder::Desc),
        ..ProductQuery::default()
    };

    let (products, categories) =
        tokio::join!(state.api().get_products(&query), state.api().get_categories());

    let featured = match products {
        Ok(page) => page.products.iter().map(ProductCard::from).collect(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to load featured products");
            Vec::new()
        }
    };
    let categories = categories.unwrap_or_else(|e| {
        tracing::warn!(error = %e, "Failed to load categories");
        Vec::new()
    });

    HomeTemplate {
        chrome: Chrome::new(&session, user).await,
        featured,
        categories,
    }
}
