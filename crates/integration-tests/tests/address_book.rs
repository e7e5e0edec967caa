//! Address book operations against the fake backend.

#![allow(clippy::unwrap_used)]

use highstreet_core::{AddressId, AddressInput};
use highstreet_integration_tests::FakeBackend;
use highstreet_storefront::services::{AddressBook, AddressError};
use serde_json::{Value, json};

const TOKEN: &str = "tok-ada@example.com";

fn stored(id: &str, is_default: bool) -> Value {
    json!({
        "_id": id,
        "name": "Ada Lovelace",
        "phone": "07700900123",
        "street": format!("{} Marylebone Road", id.len()),
        "city": "London",
        "county": "Greater London",
        "postcode": "NW1 5LR",
        "country": "United Kingdom",
        "isDefault": is_default
    })
}

async fn backend_with(addresses: Vec<Value>) -> FakeBackend {
    let backend = FakeBackend::start().await;
    backend.with(|data| data.addresses = addresses);
    backend
}

#[tokio::test]
async fn test_set_default_leaves_exactly_one_default() {
    for sloppy in [false, true] {
        let backend =
            backend_with(vec![stored("a1", true), stored("a2", false), stored("a3", false)]).await;
        backend.with(|data| data.sloppy_defaults = sloppy);
        let api = backend.client();

        let addresses = AddressBook::new(&api, TOKEN)
            .set_default(&AddressId::new("a3"))
            .await
            .unwrap();

        let defaults: Vec<_> = addresses.iter().filter(|a| a.is_default).collect();
        assert_eq!(defaults.len(), 1, "sloppy={sloppy}");
        assert_eq!(defaults[0].id.as_str(), "a3");
        assert_eq!(backend.log.count("PUT /user/address/a3/default"), 1);
    }
}

#[tokio::test]
async fn test_default_address_delete_is_refused_locally() {
    let backend = backend_with(vec![stored("a1", true), stored("a2", false)]).await;
    let api = backend.client();

    let err = AddressBook::new(&api, TOKEN)
        .delete(&AddressId::new("a1"))
        .await
        .unwrap_err();

    assert!(matches!(err, AddressError::DefaultInUse));
    assert_eq!(backend.log.count("DELETE /user/address/"), 0);
}

#[tokio::test]
async fn test_delete_refetches() {
    let backend = backend_with(vec![stored("a1", true), stored("a2", false)]).await;
    let api = backend.client();

    let addresses = AddressBook::new(&api, TOKEN)
        .delete(&AddressId::new("a2"))
        .await
        .unwrap();

    assert_eq!(addresses.len(), 1);
    assert_eq!(backend.log.count("DELETE /user/address/a2"), 1);
}

#[tokio::test]
async fn test_invalid_address_is_not_sent() {
    let backend = backend_with(Vec::new()).await;
    let api = backend.client();
    let input = AddressInput {
        name: "Ada Lovelace".to_string(),
        phone: "12345".to_string(),
        street: "Marylebone Road".to_string(),
        city: "London".to_string(),
        county: "Greater London".to_string(),
        postcode: "NW1 5LR".to_string(),
        ..AddressInput::default()
    };

    let err = AddressBook::new(&api, TOKEN).create(&input).await.unwrap_err();

    let AddressError::Validation(errors) = err else {
        panic!("expected validation error");
    };
    assert!(errors.get("phone").is_some());
    assert!(backend.log.entries().is_empty());
}

#[tokio::test]
async fn test_create_joins_house_number() {
    let backend = backend_with(Vec::new()).await;
    let api = backend.client();
    let input = AddressInput {
        name: "Ada Lovelace".to_string(),
        phone: "07700900123".to_string(),
        house_number: "221B".to_string(),
        street: "Baker Street".to_string(),
        city: "London".to_string(),
        county: "Greater London".to_string(),
        postcode: "nw1 6xe".to_string(),
        is_default: true,
        ..AddressInput::default()
    };

    let addresses = AddressBook::new(&api, TOKEN).create(&input).await.unwrap();

    assert_eq!(addresses.len(), 1);
    assert_eq!(addresses[0].street, "221B Baker Street");
    assert!(addresses[0].is_default);
}
