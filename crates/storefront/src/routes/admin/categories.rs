//! Back-office category management.
//!
//! Every mutation invalidates the cached category list inside the API
//! client, so the storefront menus pick up the change on the next request.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, State},
    response::{IntoResponse, Redirect, Response},
};
use highstreet_core::{CategoryId, FieldErrors};
use tower_sessions::Session;
use tracing::instrument;

use crate::api::{ApiError, Category};
use crate::error::Result;
use crate::filters;
use crate::middleware::{RequireAdmin, push_flash};
use crate::models::{CurrentUser, Flash};
use crate::routes::{Chrome, session_expired};
use crate::services::{CatalogError, CatalogService, CategoryForm};
use crate::state::AppState;

/// Category list with the create form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/categories/index.html")]
pub struct CategoriesTemplate {
    pub chrome: Chrome,
    pub categories: Vec<Category>,
    pub form: CategoryForm,
    pub errors: FieldErrors,
}

/// Category edit form.
#[derive(Template, WebTemplate)]
#[template(path = "admin/categories/form.html")]
pub struct CategoryEditTemplate {
    pub chrome: Chrome,
    pub category_id: String,
    pub form: CategoryForm,
    pub errors: FieldErrors,
}

/// Category list.
#[instrument(skip(state, session, admin), fields(admin_id = %admin.id))]
pub async fn index(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
) -> Result<impl IntoResponse> {
    let categories = state.api().get_admin_categories(&admin.token).await?;
    Ok(CategoriesTemplate {
        chrome: Chrome::new(&session, Some(admin)).await,
        categories,
        form: CategoryForm::default(),
        errors: FieldErrors::new(),
    })
}

/// Create a category.
#[instrument(skip(state, session, admin, form), fields(admin_id = %admin.id))]
pub async fn create(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    let result = CatalogService::new(state.api(), &admin.token)
        .create_category(&form)
        .await;
    let Some(errors) = save_outcome(&session, result, "Category created").await? else {
        return Ok(Redirect::to("/admin/categories").into_response());
    };

    let categories = state.api().get_admin_categories(&admin.token).await?;
    Ok(CategoriesTemplate {
        chrome: Chrome::new(&session, Some(admin)).await,
        categories,
        form,
        errors,
    }
    .into_response())
}

/// Category edit form.
#[instrument(skip(state, session, admin), fields(admin_id = %admin.id, category_id = %id))]
pub async fn edit(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Result<Response> {
    let Some(category) = find(&state, &admin, &id).await? else {
        push_flash(&session, Flash::error("Category not found")).await;
        return Ok(Redirect::to("/admin/categories").into_response());
    };

    Ok(CategoryEditTemplate {
        chrome: Chrome::new(&session, Some(admin)).await,
        category_id: id.to_string(),
        form: CategoryForm::from_category(&category),
        errors: FieldErrors::new(),
    }
    .into_response())
}

/// Update a category.
#[instrument(skip(state, session, admin, form), fields(admin_id = %admin.id, category_id = %id))]
pub async fn update(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
    Form(form): Form<CategoryForm>,
) -> Result<Response> {
    let result = CatalogService::new(state.api(), &admin.token)
        .update_category(&id, &form)
        .await;
    let Some(errors) = save_outcome(&session, result, "Category updated").await? else {
        return Ok(Redirect::to("/admin/categories").into_response());
    };

    Ok(CategoryEditTemplate {
        chrome: Chrome::new(&session, Some(admin)).await,
        category_id: id.to_string(),
        form,
        errors,
    }
    .into_response())
}

/// Delete a category that has no products.
#[instrument(skip(state, session, admin), fields(admin_id = %admin.id, category_id = %id))]
pub async fn delete(
    State(state): State<AppState>,
    session: Session,
    RequireAdmin(admin): RequireAdmin,
    Path(id): Path<CategoryId>,
) -> Response {
    match CatalogService::new(state.api(), &admin.token)
        .delete_category(&id)
        .await
    {
        Ok(()) => push_flash(&session, Flash::success("Category deleted")).await,
        Err(e) if e.is_unauthorized() => return session_expired(),
        Err(e) => {
            tracing::warn!(error = %e, "Category delete refused");
            push_flash(&session, Flash::error(e.user_message("Failed to delete category"))).await;
        }
    }
    Redirect::to("/admin/categories").into_response()
}

async fn find(
    state: &AppState,
    admin: &CurrentUser,
    id: &CategoryId,
) -> Result<Option<Category>> {
    Ok(state
        .api()
        .get_admin_categories(&admin.token)
        .await?
        .into_iter()
        .find(|c| &c.id == id))
}

/// `None` when the save went through (flash pushed), otherwise the errors
/// to re-render the form with.
async fn save_outcome(
    session: &Session,
    result: std::result::Result<(), CatalogError>,
    done: &str,
) -> Result<Option<FieldErrors>> {
    match result {
        Ok(()) => {
            push_flash(session, Flash::success(done)).await;
            Ok(None)
        }
        Err(CatalogError::Validation(errors)) => Ok(Some(errors)),
        Err(CatalogError::Api(ApiError::Unauthorized)) => Err(ApiError::Unauthorized.into()),
        Err(e) => {
            tracing::warn!(error = %e, "Category save failed");
            push_flash(session, Flash::error(e.user_message("Failed to save category"))).await;
            Ok(Some(FieldErrors::new()))
        }
    }
}
