//! Cart operations against the fake backend.
//!
//! Every mutation must be followed by a refetch, so the assertions look at
//! both the returned cart and the request log.

#![allow(clippy::unwrap_used)]

use highstreet_core::{Price, ProductId};
use highstreet_integration_tests::{FakeBackend, Line};
use highstreet_storefront::services::{CartError, CartService};

const TOKEN: &str = "tok-ada@example.com";

async fn seeded(lines: Vec<Line>) -> FakeBackend {
    let backend = FakeBackend::start().await;
    backend.with(|data| data.cart = lines);
    backend
}

#[tokio::test]
async fn test_totals_from_backend_cart() {
    let backend = seeded(vec![Line::new("p1", 10.0, 2), Line::new("p2", 5.0, 1)]).await;
    let api = backend.client();

    let cart = CartService::new(&api, TOKEN).fetch().await.unwrap();

    assert_eq!(cart.total(), Price::from_pence(2500));
    assert_eq!(cart.count(), 3);
}

#[tokio::test]
async fn test_quantity_below_one_removes_line() {
    for quantity in [0, -1, -40] {
        let backend = seeded(vec![Line::new("p1", 10.0, 2), Line::new("p2", 5.0, 1)]).await;
        let api = backend.client();

        let cart = CartService::new(&api, TOKEN)
            .update(&ProductId::new("p1"), quantity)
            .await
            .unwrap();

        assert!(cart.line(&ProductId::new("p1")).is_none(), "q={quantity}");
        assert_eq!(cart.count(), 1);
        assert_eq!(backend.log.count("DELETE /cart/p1"), 1);
        assert_eq!(backend.log.count("POST /cart"), 0);
    }
}

#[tokio::test]
async fn test_update_refetches_cart() {
    let backend = seeded(vec![Line::new("p1", 10.0, 2)]).await;
    let api = backend.client();

    let cart = CartService::new(&api, TOKEN)
        .update(&ProductId::new("p1"), 4)
        .await
        .unwrap();

    assert_eq!(cart.count(), 4);
    assert_eq!(
        backend.log.entries(),
        vec!["POST /cart".to_string(), "GET /cart".to_string()]
    );
}

#[tokio::test]
async fn test_clear_removes_each_line() {
    let backend = seeded(vec![
        Line::new("p1", 10.0, 1),
        Line::new("p2", 5.0, 1),
        Line::new("p3", 2.5, 4),
    ])
    .await;
    let api = backend.client();

    let cart = CartService::new(&api, TOKEN).clear().await.unwrap();

    assert!(cart.is_empty());
    assert_eq!(backend.log.count("DELETE /cart/"), 3);
}

#[tokio::test]
async fn test_clear_reports_partial_progress() {
    let backend = seeded(vec![
        Line::new("p1", 10.0, 1),
        Line::new("p2", 5.0, 1),
        Line::new("p3", 2.5, 4),
    ])
    .await;
    backend.with(|data| data.cart_delete_budget = Some(1));
    let api = backend.client();

    let err = CartService::new(&api, TOKEN).clear().await.unwrap_err();

    assert!(matches!(
        err,
        CartError::PartialClear {
            removed: 1,
            total: 3,
            ..
        }
    ));
    assert_eq!(
        err.user_message("Failed to clear cart"),
        "Removed 1 of 3 items before an error occurred"
    );
    assert_eq!(backend.with(|data| data.cart.len()), 2);
}

#[tokio::test]
async fn test_repeated_fetch_is_stable() {
    let backend = seeded(vec![Line::new("p1", 10.0, 2), Line::new("p2", 5.0, 1)]).await;
    let api = backend.client();
    let service = CartService::new(&api, TOKEN);

    let first = service.fetch().await.unwrap();
    let second = service.fetch().await.unwrap();

    assert_eq!(first, second);
}

#[tokio::test]
async fn test_rejected_token_is_unauthorized() {
    let backend = seeded(vec![Line::new("p1", 10.0, 2)]).await;
    backend.with(|data| data.reject_tokens = true);
    let api = backend.client();

    let err = CartService::new(&api, TOKEN).fetch().await.unwrap_err();

    assert!(err.is_unauthorized());
}
