//! Authentication route handlers.
//!
//! Login and registration post plain forms. Failures re-render the form with
//! the submitted values and per-field errors; success stores the
//! [`CurrentUser`] in the session and redirects.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Query, State},
    response::{IntoResponse, Redirect, Response},
};
use highstreet_core::FieldErrors;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::instrument;

use crate::error::{clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::{OptionalAuth, clear_current_user, push_flash, set_current_user};
use crate::models::{CurrentUser, Flash};
use crate::routes::Chrome;
use crate::services::auth::safe_redirect;
use crate::services::{AuthError, AuthService, LoginForm, RegisterForm};
use crate::state::AppState;

/// Query parameters for the login page.
#[derive(Debug, Deserialize)]
pub struct LoginQuery {
    pub next: Option<String>,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/login.html")]
pub struct LoginTemplate {
    pub chrome: Chrome,
    pub email: String,
    pub next: String,
    pub error: Option<String>,
    pub errors: FieldErrors,
}

/// Register page template.
#[derive(Template, WebTemplate)]
#[template(path = "auth/register.html")]
pub struct RegisterTemplate {
    pub chrome: Chrome,
    pub form: RegisterForm,
    pub error: Option<String>,
    pub errors: FieldErrors,
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
///
/// Already logged-in users go straight to `next`.
pub async fn login_page(
    session: Session,
    OptionalAuth(user): OptionalAuth,
    Query(query): Query<LoginQuery>,
) -> Response {
    if user.is_some() {
        return Redirect::to(&safe_redirect(query.next.as_deref())).into_response();
    }

    LoginTemplate {
        chrome: Chrome::new(&session, None).await,
        email: String::new(),
        next: query.next.unwrap_or_default(),
        error: None,
        errors: FieldErrors::new(),
    }
    .into_response()
}

/// Handle login form submission.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<LoginForm>,
) -> Response {
    match AuthService::new(state.api()).login(&form).await {
        Ok(user) => {
            if let Err(response) = establish(&session, &user).await {
                return response;
            }
            push_flash(&session, Flash::success(format!("Welcome back, {}", user.name))).await;
            Redirect::to(&safe_redirect(form.next.as_deref())).into_response()
        }
        Err(e) => {
            if !matches!(e, AuthError::Validation(_) | AuthError::InvalidCredentials) {
                tracing::warn!(error = %e, "Login failed");
            }
            LoginTemplate {
                chrome: Chrome::new(&session, None).await,
                email: form.email.clone(),
                next: form.next.clone().unwrap_or_default(),
                error: Some(e.user_message("Login failed. Please try again.")),
                errors: e.field_errors(),
            }
            .into_response()
        }
    }
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(session: Session, OptionalAuth(user): OptionalAuth) -> Response {
    if user.is_some() {
        return Redirect::to("/").into_response();
    }

    RegisterTemplate {
        chrome: Chrome::new(&session, None).await,
        form: RegisterForm::default(),
        error: None,
        errors: FieldErrors::new(),
    }
    .into_response()
}

/// Handle registration form submission.
///
/// A successful registration logs the new user in.
#[instrument(skip(state, session, form), fields(email = %form.email))]
pub async fn register(
    State(state): State<AppState>,
    session: Session,
    Form(form): Form<RegisterForm>,
) -> Response {
    match AuthService::new(state.api()).register(&form).await {
        Ok(user) => {
            if let Err(response) = establish(&session, &user).await {
                return response;
            }
            push_flash(&session, Flash::success("Your account has been created")).await;
            Redirect::to("/").into_response()
        }
        Err(e) => {
            tracing::warn!(error = %e, "Registration failed");
            let errors = e.field_errors();
            RegisterTemplate {
                chrome: Chrome::new(&session, None).await,
                // Never echo passwords back into the page
                form: RegisterForm {
                    password: String::new(),
                    confirm_password: String::new(),
                    ..form
                },
                error: Some(e.user_message("Registration failed. Please try again.")),
                errors,
            }
            .into_response()
        }
    }
}

// =============================================================================
// Logout
// =============================================================================

/// Handle logout.
///
/// Drops the token and every piece of per-user session state.
pub async fn logout(session: Session) -> Response {
    if let Err(e) = clear_current_user(&session).await {
        tracing::error!(error = %e, "Failed to clear session on logout");
    }
    clear_sentry_user();
    push_flash(&session, Flash::info("You have been logged out")).await;
    Redirect::to("/").into_response()
}

/// Store the user in the session and tag Sentry with them.
async fn establish(session: &Session, user: &CurrentUser) -> Result<(), Response> {
    if let Err(e) = set_current_user(session, user).await {
        tracing::error!(error = %e, "Failed to store user in session");
        push_flash(session, Flash::error("Login failed. Please try again.")).await;
        return Err(Redirect::to("/login").into_response());
    }
    set_sentry_user(&user.id, Some(&user.email));
    tracing::info!(user_id = %user.id, admin = user.is_admin, "User logged in");
    Ok(())
}
