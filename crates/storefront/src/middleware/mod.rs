//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layers (hub per request, transaction per route)
//! 2. `TraceLayer` (request span)
//! 3. Request ID (recorded into the span and Sentry scope)
//! 4. Session layer (tower-sessions, in-memory store)
//! 5. Stale session expiry (logs out on a backend token rejection)
//! 6. Security headers (CSP, frame and referrer policy)
//! 7. Rate limiting (governor), on auth, cart, and postcode routes only
//!
//! Authentication is not a layer: handlers opt in through the
//! [`RequireAuth`], [`RequireAdmin`], and [`OptionalAuth`] extractors.

pub mod auth;
pub mod flash;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use auth::{
    AuthRejection, OptionalAuth, RequireAdmin, RequireAuth, clear_current_user,
    expire_stale_session, set_current_user,
};
pub use flash::{push_flash, take_flashes};
pub use rate_limit::{api_rate_limiter, auth_rate_limiter, lookup_rate_limiter};
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::create_session_layer;
