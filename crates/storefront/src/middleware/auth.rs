//! Authentication extractors.
//!
//! The logged-in user lives in the session as a [`CurrentUser`]. Handlers ask
//! for one of these extractors instead of reading the session directly.

use axum::{
    extract::{FromRequestParts, OriginalUri, Request},
    http::{HeaderMap, HeaderValue, StatusCode, request::Parts},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use tower_sessions::Session;

use crate::error::{SessionExpired, clear_sentry_user};
use crate::middleware::flash::push_flash;
use crate::models::{CurrentUser, Flash, session_keys};

/// Extractor that requires a logged-in user.
///
/// If nobody is logged in, the request is redirected to the login page with
/// the current path as `next`.
///
/// # Example
///
/// ```rust,ignore
/// async fn profile(RequireAuth(user): RequireAuth) -> impl IntoResponse {
///     format!("Hello, {}!", user.name)
/// }
/// ```
pub struct RequireAuth(pub CurrentUser);

/// Extractor that requires a logged-in admin.
///
/// Anonymous requests go to login; logged-in non-admins go home.
pub struct RequireAdmin(pub CurrentUser);

/// Extractor that optionally gets the current user.
pub struct OptionalAuth(pub Option<CurrentUser>);

/// Rejection for the authentication extractors.
#[derive(Debug)]
pub enum AuthRejection {
    /// Send the browser to login, then back to `next`.
    RedirectToLogin { next: String, htmx: bool },
    /// Logged in but not allowed here.
    RedirectHome { htmx: bool },
    /// The session layer is missing.
    Unavailable,
}

impl IntoResponse for AuthRejection {
    fn into_response(self) -> Response {
        match self {
            Self::RedirectToLogin { next, htmx } => {
                let target = format!("/login?next={}", urlencoding::encode(&next));
                redirect(&target, htmx)
            }
            Self::RedirectHome { htmx } => redirect("/", htmx),
            Self::Unavailable => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
        }
    }
}

/// Full-page redirect. HTMX requests get `HX-Redirect` so the whole page
/// navigates instead of swapping the login page into a fragment.
fn redirect(target: &str, htmx: bool) -> Response {
    if htmx && let Ok(value) = HeaderValue::from_str(target) {
        let mut headers = HeaderMap::new();
        headers.insert("HX-Redirect", value);
        return (StatusCode::OK, headers).into_response();
    }
    Redirect::to(target).into_response()
}

fn is_htmx(parts: &Parts) -> bool {
    parts.headers.contains_key("HX-Request")
}

/// Path and query of the page being requested, for the `next` parameter.
///
/// HTMX fragment requests come back to the page they were issued from.
fn return_path(parts: &Parts) -> String {
    if is_htmx(parts)
        && let Some(current) = parts
            .headers
            .get("HX-Current-URL")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| url::Url::parse(v).ok())
    {
        return match current.query() {
            Some(query) => format!("{}?{query}", current.path()),
            None => current.path().to_string(),
        };
    }
    // Nested routers strip their prefix from `parts.uri`
    let uri = parts
        .extensions
        .get::<OriginalUri>()
        .map_or(&parts.uri, |original| &original.0);
    uri.path_and_query()
        .map_or_else(|| "/".to_string(), |pq| pq.as_str().to_string())
}

async fn current_user(parts: &Parts) -> Result<Option<CurrentUser>, AuthRejection> {
    let session = parts
        .extensions
        .get::<Session>()
        .ok_or(AuthRejection::Unavailable)?;

    Ok(session
        .get::<CurrentUser>(session_keys::CURRENT_USER)
        .await
        .ok()
        .flatten())
}

impl<S> FromRequestParts<S> for RequireAuth
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        current_user(parts)
            .await?
            .map(Self)
            .ok_or_else(|| AuthRejection::RedirectToLogin {
                next: return_path(parts),
                htmx: is_htmx(parts),
            })
    }
}

impl<S> FromRequestParts<S> for RequireAdmin
where
    S: Send + Sync,
{
    type Rejection = AuthRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        match current_user(parts).await? {
            Some(user) if user.is_admin => Ok(Self(user)),
            Some(user) => {
                tracing::warn!(user_id = %user.id, path = %parts.uri.path(), "Non-admin denied");
                Err(AuthRejection::RedirectHome {
                    htmx: is_htmx(parts),
                })
            }
            None => Err(AuthRejection::RedirectToLogin {
                next: return_path(parts),
                htmx: is_htmx(parts),
            }),
        }
    }
}

impl<S> FromRequestParts<S> for OptionalAuth
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self(current_user(parts).await.ok().flatten()))
    }
}

/// Store the logged-in user in the session.
///
/// The session ID is cycled first so a pre-login session ID cannot be reused.
/// A fresh postcode search scope is stored alongside, so concurrent searches
/// from the new session always share one scope.
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn set_current_user(
    session: &Session,
    user: &CurrentUser,
) -> Result<(), tower_sessions::session::Error> {
    session.cycle_id().await?;
    session
        .insert(session_keys::SEARCH_SCOPE, uuid::Uuid::new_v4().to_string())
        .await?;
    session.insert(session_keys::CURRENT_USER, user).await
}

/// Clear the user and any per-user state from the session (logout).
///
/// # Errors
///
/// Returns an error if the session cannot be modified.
pub async fn clear_current_user(session: &Session) -> Result<(), tower_sessions::session::Error> {
    session
        .remove::<CurrentUser>(session_keys::CURRENT_USER)
        .await?;
    session
        .remove::<serde_json::Value>(session_keys::CHECKOUT)
        .await?;
    session
        .remove::<serde_json::Value>(session_keys::ADDRESS_SUGGESTIONS)
        .await?;
    Ok(())
}

/// Log the user out when a handler reports that the backend rejected the
/// session token.
///
/// Handlers signal this through the [`SessionExpired`] response extension
/// (set by `AppError`). HTMX requests get an `HX-Redirect` so the login
/// page replaces the whole document.
pub async fn expire_stale_session(session: Session, request: Request, next: Next) -> Response {
    let htmx = request.headers().contains_key("HX-Request");
    let response = next.run(request).await;

    if response.extensions().get::<SessionExpired>().is_none() {
        return response;
    }

    if let Err(e) = clear_current_user(&session).await {
        tracing::warn!(error = %e, "Failed to clear expired session");
    }
    clear_sentry_user();
    push_flash(
        &session,
        Flash::info("Your session has expired. Please log in again."),
    )
    .await;

    if htmx {
        redirect("/login", true)
    } else {
        response
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::{Request, header};

    use super::*;

    fn parts(uri: &str, headers: &[(&str, &str)]) -> Parts {
        let mut builder = Request::builder().uri(uri);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        builder.body(()).unwrap().into_parts().0
    }

    #[test]
    fn test_return_path_keeps_query() {
        let p = parts("/orders/abc/details?print=1", &[]);
        assert_eq!(return_path(&p), "/orders/abc/details?print=1");
    }

    #[test]
    fn test_return_path_uses_htmx_page() {
        let p = parts(
            "/cart/items/p1",
            &[
                ("HX-Request", "true"),
                ("HX-Current-URL", "http://localhost:3000/products/p1?ref=home"),
            ],
        );
        assert_eq!(return_path(&p), "/products/p1?ref=home");
    }

    #[test]
    fn test_login_redirect_encodes_next() {
        let response = AuthRejection::RedirectToLogin {
            next: "/checkout?step=review".to_string(),
            htmx: false,
        }
        .into_response();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/login?next=%2Fcheckout%3Fstep%3Dreview"
        );
    }

    #[test]
    fn test_htmx_redirect_header() {
        let response = AuthRejection::RedirectHome { htmx: true }.into_response();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("HX-Redirect").unwrap(), "/");
    }

    #[tokio::test]
    async fn test_nested_route_bounces_with_full_path() {
        use axum::{Router, body::Body, routing::get};
        use tower::ServiceExt;
        use tower_sessions::{MemoryStore, SessionManagerLayer};

        async fn protected(RequireAuth(_user): RequireAuth) -> &'static str {
            "ok"
        }

        let orders = Router::new().route("/{id}/success", get(protected));
        let app = Router::new()
            .nest("/orders", orders)
            .layer(SessionManagerLayer::new(MemoryStore::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/orders/o1/success?session_id=cs_1")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(
            response.headers().get(header::LOCATION).unwrap(),
            "/login?next=%2Forders%2Fo1%2Fsuccess%3Fsession_id%3Dcs_1"
        );
    }

    #[tokio::test]
    async fn test_expired_token_redirects_htmx_to_login() {
        use axum::{Router, body::Body, routing::get};
        use tower::ServiceExt;
        use tower_sessions::{MemoryStore, SessionManagerLayer};

        use crate::api::ApiError;
        use crate::error::AppError;

        async fn rejected() -> Result<&'static str, AppError> {
            Err(AppError::Api(ApiError::Unauthorized))
        }

        let app = Router::new()
            .route("/cart/count", get(rejected))
            .layer(axum::middleware::from_fn(expire_stale_session))
            .layer(SessionManagerLayer::new(MemoryStore::default()));

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/cart/count")
                    .header("HX-Request", "true")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers().get("HX-Redirect").unwrap(), "/login");
    }

    #[tokio::test]
    async fn test_login_starts_a_fresh_search_scope() {
        use std::sync::Arc;

        use tower_sessions::MemoryStore;

        let session = Session::new(None, Arc::new(MemoryStore::default()), None);
        session
            .insert(session_keys::SEARCH_SCOPE, "anonymous".to_string())
            .await
            .unwrap();
        let user = CurrentUser {
            id: "u1".into(),
            name: "Ada Lovelace".to_string(),
            email: "ada@example.com".to_string(),
            is_admin: false,
            phone: None,
            token: "t".to_string(),
        };

        set_current_user(&session, &user).await.unwrap();

        let scope: String = session
            .get(session_keys::SEARCH_SCOPE)
            .await
            .unwrap()
            .unwrap();
        assert_ne!(scope, "anonymous");
        assert_eq!(
            session
                .get::<CurrentUser>(session_keys::CURRENT_USER)
                .await
                .unwrap()
                .map(|u| u.email),
            Some("ada@example.com".to_string())
        );
    }
}
