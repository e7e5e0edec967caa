//! The whole storefront router served against the fakes, driven like a
//! browser: cookies kept, redirects inspected rather than followed.

#![allow(clippy::unwrap_used)]

use highstreet_integration_tests::{Storefront, location};
use reqwest::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_health_endpoints() {
    let app = Storefront::start().await;
    let browser = app.browser();

    let live = browser.get(app.at("/health")).send().await.unwrap();
    assert_eq!(live.status(), StatusCode::OK);
    assert_eq!(live.text().await.unwrap(), "ok");

    let ready = browser.get(app.at("/health/ready")).send().await.unwrap();
    assert_eq!(ready.status(), StatusCode::OK);
    assert_eq!(app.backend.log.count("GET /categories"), 1);
}

#[tokio::test]
async fn test_responses_carry_security_headers_and_request_id() {
    let app = Storefront::start().await;

    let response = app.browser().get(app.at("/health")).send().await.unwrap();

    let headers = response.headers();
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert!(headers.get("content-security-policy").is_some());
    assert!(headers.get("x-request-id").is_some());
}

#[tokio::test]
async fn test_protected_page_bounces_to_login_and_back() {
    let app = Storefront::start().await;
    let browser = app.browser();

    let bounced = browser.get(app.at("/account")).send().await.unwrap();
    assert_eq!(bounced.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&bounced).as_deref(), Some("/login?next=%2Faccount"));

    let login = browser
        .post(app.at("/login"))
        .form(&[
            ("email", "ada@example.com"),
            ("password", highstreet_integration_tests::PASSWORD),
            ("next", "/account"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(login.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&login).as_deref(), Some("/account"));
    assert_eq!(app.backend.log.count("GET /user/profile"), 1);
}

#[tokio::test]
async fn test_invalid_login_stays_on_form() {
    let app = Storefront::start().await;
    let browser = app.browser();

    let response = browser
        .post(app.at("/login"))
        .form(&[("email", "ada@example.com"), ("password", "wrong")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.text().await.unwrap().contains("Invalid email or password"));

    let protected = browser.get(app.at("/cart")).send().await.unwrap();
    assert_eq!(protected.status(), StatusCode::SEE_OTHER);
}

#[tokio::test]
async fn test_malformed_login_is_not_sent() {
    let app = Storefront::start().await;

    let response = app
        .browser()
        .post(app.at("/login"))
        .form(&[("email", "not-an-email"), ("password", "")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(app.backend.log.count("POST /auth/login"), 0);
}

#[tokio::test]
async fn test_customers_cannot_open_admin() {
    let app = Storefront::start().await;
    let browser = app.browser();
    app.login(&browser, "ada@example.com").await;

    let response = browser.get(app.at("/admin")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/"));
}

#[tokio::test]
async fn test_expired_token_logs_out() {
    let app = Storefront::start().await;
    let browser = app.browser();
    app.login(&browser, "ada@example.com").await;

    let cart = browser.get(app.at("/cart")).send().await.unwrap();
    assert_eq!(cart.status(), StatusCode::OK);

    app.backend.with(|data| data.reject_tokens = true);
    let expired = browser.get(app.at("/cart")).send().await.unwrap();
    assert_eq!(expired.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&expired).as_deref(), Some("/login"));

    // The session no longer carries the user
    app.backend.with(|data| data.reject_tokens = false);
    let again = browser.get(app.at("/cart")).send().await.unwrap();
    assert_eq!(location(&again).as_deref(), Some("/login?next=%2Fcart"));
}

#[tokio::test]
async fn test_shipping_without_courier_details_is_not_sent() {
    let app = Storefront::start().await;
    app.backend.with(|data| {
        data.orders.push(json!({
            "_id": "ord0001",
            "userId": "u1",
            "items": [{ "productId": "p1", "name": "Wool Scarf", "price": 18.0,
                        "quantity": 1, "subtotal": 18.0 }],
            "totalAmount": 18.0,
            "shippingCost": 3.5,
            "grandTotal": 21.5,
            "orderStatus": "processing",
            "paymentStatus": "completed"
        }));
    });
    let browser = app.browser();
    app.login(&browser, "admin@example.com").await;

    let response = browser
        .post(app.at("/admin/orders/ord0001/status"))
        .form(&[("status", "shipped"), ("courier_name", ""), ("tracking_number", " ")])
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let page = response.text().await.unwrap();
    assert!(page.contains("Please enter courier company name"));
    assert!(page.contains("Please enter tracking number"));
    assert_eq!(app.backend.log.count("PUT /orders/ord0001/status"), 0);

    let shipped = browser
        .post(app.at("/admin/orders/ord0001/status"))
        .form(&[
            ("status", "shipped"),
            ("courier_name", "Royal Mail"),
            ("tracking_number", "RM123456785GB"),
        ])
        .send()
        .await
        .unwrap();
    assert_eq!(shipped.status(), StatusCode::SEE_OTHER);
    let update = app
        .backend
        .with(|data| data.status_updates.first().cloned())
        .unwrap();
    assert_eq!(update["status"], "shipped");
    assert_eq!(update["shippingInfo"]["courierName"], "Royal Mail");
    assert_eq!(update["shippingInfo"]["trackingNumber"], "RM123456785GB");
}

#[tokio::test]
async fn test_category_with_products_is_not_deleted() {
    let app = Storefront::start().await;
    app.backend.with(|data| {
        data.categories = vec![
            json!({ "_id": "cat1", "name": "Scarves", "slug": "scarves", "productCount": 3 }),
            json!({ "_id": "cat2", "name": "Gloves", "slug": "gloves", "productCount": 0 }),
        ];
    });
    let browser = app.browser();
    app.login(&browser, "admin@example.com").await;

    let refused = browser
        .post(app.at("/admin/categories/cat1/delete"))
        .send()
        .await
        .unwrap();
    assert_eq!(refused.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.backend.log.count("DELETE /categories/"), 0);

    let deleted = browser
        .post(app.at("/admin/categories/cat2/delete"))
        .send()
        .await
        .unwrap();
    assert_eq!(deleted.status(), StatusCode::SEE_OTHER);
    assert_eq!(app.backend.log.count("DELETE /categories/cat2"), 1);
}

#[tokio::test]
async fn test_empty_cart_cannot_check_out() {
    let app = Storefront::start().await;
    let browser = app.browser();
    app.login(&browser, "ada@example.com").await;

    let response = browser.get(app.at("/checkout")).send().await.unwrap();

    assert_eq!(response.status(), StatusCode::SEE_OTHER);
    assert_eq!(location(&response).as_deref(), Some("/cart"));
}
