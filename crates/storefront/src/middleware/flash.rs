//! One-shot notifications carried in the session.
//!
//! A handler pushes a [`Flash`] before redirecting; the next full page render
//! takes every pending flash and shows it once.

use tower_sessions::Session;

use crate::models::{Flash, session_keys};

/// Most notifications kept at once; older ones are dropped.
const MAX_PENDING: usize = 5;

/// Queue a notification for the next rendered page.
///
/// Session failures are logged and otherwise ignored: a lost notification
/// must never fail the request that produced it.
pub async fn push_flash(session: &Session, flash: Flash) {
    let mut pending = session
        .get::<Vec<Flash>>(session_keys::FLASH)
        .await
        .ok()
        .flatten()
        .unwrap_or_default();
    pending.push(flash);
    if pending.len() > MAX_PENDING {
        pending.drain(..pending.len() - MAX_PENDING);
    }

    if let Err(e) = session.insert(session_keys::FLASH, pending).await {
        tracing::warn!(error = %e, "Failed to store flash message");
    }
}

/// Take every pending notification, clearing them from the session.
pub async fn take_flashes(session: &Session) -> Vec<Flash> {
    match session.remove::<Vec<Flash>>(session_keys::FLASH).await {
        Ok(pending) => pending.unwrap_or_default(),
        Err(e) => {
            tracing::warn!(error = %e, "Failed to read flash messages");
            Vec::new()
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use tower_sessions::MemoryStore;

    use super::*;

    fn session() -> Session {
        Session::new(None, Arc::new(MemoryStore::default()), None)
    }

    #[tokio::test]
    async fn test_flash_is_shown_once() {
        let session = session();
        push_flash(&session, Flash::success("Added to cart!")).await;
        push_flash(&session, Flash::error("Failed to update cart")).await;

        let shown = take_flashes(&session).await;
        assert_eq!(shown.len(), 2);
        assert_eq!(shown[0].message, "Added to cart!");
        assert!(take_flashes(&session).await.is_empty());
    }

    #[tokio::test]
    async fn test_pending_flashes_are_capped() {
        let session = session();
        for i in 0..8 {
            push_flash(&session, Flash::info(format!("note {i}"))).await;
        }
        let shown = take_flashes(&session).await;
        assert_eq!(shown.len(), MAX_PENDING);
        assert_eq!(shown[0].message, "note 3");
    }
}
