//! Order placement against the fake backend.

#![allow(clippy::unwrap_used)]

use highstreet_core::{AddressInput, Price};
use highstreet_integration_tests::{FakeBackend, Line};
use highstreet_storefront::api::{Address, ApiError};
use highstreet_storefront::models::CurrentUser;
use highstreet_storefront::services::checkout::AddressChoice;
use highstreet_storefront::services::{
    CartService, CheckoutDraft, CheckoutError, CheckoutService, CheckoutStep,
};
use serde_json::json;

fn shopper() -> CurrentUser {
    CurrentUser {
        id: "u1".into(),
        name: "Ada Lovelace".to_string(),
        email: "ada@example.com".to_string(),
        is_admin: false,
        phone: Some("07700900123".to_string()),
        token: "tok-ada@example.com".to_string(),
    }
}

fn new_address() -> AddressInput {
    AddressInput {
        name: "Ada Lovelace".to_string(),
        phone: "07700 900123".to_string(),
        house_number: "12".to_string(),
        street: "Marylebone Road".to_string(),
        city: "London".to_string(),
        county: "Greater London".to_string(),
        postcode: "NW1 5LR".to_string(),
        ..AddressInput::default()
    }
}

async fn backend_with_cart() -> FakeBackend {
    let backend = FakeBackend::start().await;
    backend.with(|data| data.cart = vec![Line::new("p1", 10.0, 2), Line::new("p2", 5.0, 1)]);
    backend
}

#[tokio::test]
async fn test_new_address_is_saved_before_the_order() {
    let backend = backend_with_cart().await;
    let api = backend.client();
    let user = shopper();
    let cart = CartService::new(&api, &user.token).fetch().await.unwrap();

    let mut draft = CheckoutDraft::start(Some(&[]), &user);
    draft.update_new_address(new_address());
    draft.submit_address(&[]).unwrap();
    assert_eq!(draft.step, CheckoutStep::Review);

    draft.begin_submission().unwrap();
    let url = CheckoutService::new(&api, &user, Price::from_pence(350))
        .place_order(&mut draft, &cart, &[])
        .await
        .unwrap();

    assert_eq!(url, "https://pay.example.test/session/cs_test_1");
    let saved_at = backend.log.position("POST /user/address").unwrap();
    let ordered_at = backend.log.position("POST /orders").unwrap();
    assert!(saved_at < ordered_at);
    assert!(matches!(draft.choice, AddressChoice::Saved(_)));

    let order = backend.with(|data| data.placed_orders.first().cloned()).unwrap();
    assert_eq!(order["userId"], "u1");
    assert_eq!(order["paymentMethod"], "stripe");
    assert_eq!(order["customerEmail"], "ada@example.com");
    assert_eq!(order["totalAmount"], json!(25.0));
    assert_eq!(order["taxAmount"], json!(0.0));
    assert_eq!(order["shippingCost"], json!(3.5));
    assert_eq!(order["grandTotal"], json!(28.5));
    assert_eq!(order["shippingAddress"]["street"], "12 Marylebone Road");
    assert_eq!(order["items"].as_array().map(Vec::len), Some(2));
    assert_eq!(order["items"][0]["subtotal"], json!(20.0));
}

#[tokio::test]
async fn test_missing_checkout_url_fails_and_allows_retry() {
    let backend = backend_with_cart().await;
    backend.with(|data| data.checkout_url = None);
    let api = backend.client();
    let user = shopper();
    let cart = CartService::new(&api, &user.token).fetch().await.unwrap();
    let saved: Vec<Address> = vec![
        serde_json::from_value(json!({
            "_id": "addr-home",
            "name": "Ada Lovelace",
            "phone": "07700900123",
            "street": "12 Marylebone Road",
            "city": "London",
            "county": "Greater London",
            "postcode": "NW1 5LR",
            "isDefault": true
        }))
        .unwrap(),
    ];

    let mut draft = CheckoutDraft::start(Some(&saved), &user);
    draft.submit_address(&saved).unwrap();
    draft.begin_submission().unwrap();

    let err = CheckoutService::new(&api, &user, Price::from_pence(350))
        .place_order(&mut draft, &cart, &saved)
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        CheckoutError::Api(ApiError::MissingCheckoutUrl)
    ));
    assert_eq!(err.user_message(), "Failed to place order");
    assert!(!draft.processing);
    assert!(draft.begin_submission().is_ok());
}

#[tokio::test]
async fn test_incomplete_new_address_blocks_without_network() {
    let backend = backend_with_cart().await;
    let api = backend.client();
    let user = shopper();
    let cart = CartService::new(&api, &user.token).fetch().await.unwrap();
    backend.log.reset();

    let incomplete = [
        AddressInput {
            name: String::new(),
            ..new_address()
        },
        AddressInput {
            phone: "0207 946 0000".to_string(),
            ..new_address()
        },
        AddressInput {
            street: " ".to_string(),
            ..new_address()
        },
        AddressInput {
            city: String::new(),
            ..new_address()
        },
        AddressInput {
            county: String::new(),
            ..new_address()
        },
        AddressInput {
            postcode: "NW1".to_string(),
            ..new_address()
        },
    ];

    for input in incomplete {
        let mut draft = CheckoutDraft::start(None, &user);
        draft.update_new_address(input);

        assert!(draft.submit_address(&[]).is_err());
        assert_eq!(draft.step, CheckoutStep::Address);

        draft.begin_submission().unwrap();
        let err = CheckoutService::new(&api, &user, Price::from_pence(350))
            .place_order(&mut draft, &cart, &[])
            .await
            .unwrap_err();
        assert!(matches!(err, CheckoutError::Validation(_)));
        assert!(!draft.processing);
    }

    assert!(backend.log.entries().is_empty());
}

#[tokio::test]
async fn test_double_submission_is_refused() {
    let user = shopper();
    let mut draft = CheckoutDraft::start(None, &user);

    draft.begin_submission().unwrap();

    assert!(matches!(
        draft.begin_submission(),
        Err(CheckoutError::InProgress)
    ));
}
