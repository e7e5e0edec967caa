//! In-process fakes for the storefront's upstream services.
//!
//! The storefront owns no data, so flow tests run the real `reqwest`-based
//! clients (and, where useful, the whole router) against a fake backend API
//! and a fake postcode service. Both are small axum apps on an ephemeral
//! port that record every request they receive, so tests can assert that a
//! locally rejected operation never reached the network.
//!
//! ```rust,ignore
//! let backend = FakeBackend::start().await;
//! let api = backend.client();
//! let cart = CartService::new(&api, "tok-ada").fetch().await?;
//! assert_eq!(backend.log.count("DELETE /cart/"), 0);
//! ```

#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    extract::{Path, Request, State},
    http::{HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{delete, get, post, put},
};
use highstreet_storefront::api::ApiClient;
use highstreet_storefront::config::StorefrontConfig;
use highstreet_storefront::postcode::PostcodeClient;
use highstreet_storefront::state::AppState;
use serde_json::{Value, json};
use tokio::net::TcpListener;

/// Password the fake backend accepts for every account.
pub const PASSWORD: &str = "correct-horse";

/// Outbound timeout for clients pointed at the fakes.
const CLIENT_TIMEOUT: Duration = Duration::from_secs(5);

// =============================================================================
// Request log
// =============================================================================

/// Every request a fake received, as `"METHOD /path"`.
#[derive(Clone, Default)]
pub struct RequestLog(Arc<Mutex<Vec<String>>>);

impl RequestLog {
    fn record(&self, entry: String) {
        self.0.lock().expect("request log lock").push(entry);
    }

    /// All recorded requests, oldest first.
    #[must_use]
    pub fn entries(&self) -> Vec<String> {
        self.0.lock().expect("request log lock").clone()
    }

    /// Number of requests starting with `prefix`, e.g. `"DELETE /cart/"`.
    #[must_use]
    pub fn count(&self, prefix: &str) -> usize {
        self.entries()
            .iter()
            .filter(|e| e.starts_with(prefix))
            .count()
    }

    /// Position of the first request starting with `prefix`.
    #[must_use]
    pub fn position(&self, prefix: &str) -> Option<usize> {
        self.entries().iter().position(|e| e.starts_with(prefix))
    }

    pub fn reset(&self) {
        self.0.lock().expect("request log lock").clear();
    }
}

async fn record_request(State(log): State<RequestLog>, request: Request, next: Next) -> Response {
    let path = request.uri().path().trim_start_matches("/api").to_string();
    log.record(format!("{} {path}", request.method()));
    next.run(request).await
}

async fn serve(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind ephemeral port");
    let addr = listener.local_addr().expect("local address");
    tokio::spawn(async move {
        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await
        .expect("fake server");
    });
    addr
}

// =============================================================================
// Fake backend API
// =============================================================================

/// A cart line held by the fake backend.
#[derive(Debug, Clone)]
pub struct Line {
    pub product_id: String,
    pub name: String,
    pub price: f64,
    pub quantity: u32,
}

impl Line {
    #[must_use]
    pub fn new(product_id: &str, price: f64, quantity: u32) -> Self {
        Self {
            product_id: product_id.to_string(),
            name: format!("Product {product_id}"),
            price,
            quantity,
        }
    }
}

/// Mutable state behind the fake backend. Tests seed it directly.
#[derive(Debug, Default)]
pub struct BackendData {
    pub cart: Vec<Line>,
    pub addresses: Vec<Value>,
    pub categories: Vec<Value>,
    pub products: Vec<Value>,
    pub orders: Vec<Value>,
    /// Bodies received on `POST /orders`.
    pub placed_orders: Vec<Value>,
    /// Bodies received on `PUT /orders/{id}/status`.
    pub status_updates: Vec<Value>,
    /// URL returned from `POST /orders`; `None` omits it from the response.
    pub checkout_url: Option<String>,
    /// Cart deletes after this many succeed fail with a 500.
    pub cart_delete_budget: Option<usize>,
    /// Set-default leaves the previous default flagged, like a racy backend.
    pub sloppy_defaults: bool,
    /// Every authenticated call answers 401.
    pub reject_tokens: bool,
    next_id: u32,
}

impl BackendData {
    fn next_id(&mut self, prefix: &str) -> String {
        self.next_id += 1;
        format!("{prefix}{:04}", self.next_id)
    }
}

type Shared = Arc<Mutex<BackendData>>;

/// Fake backend REST API mounted under `/api`.
pub struct FakeBackend {
    pub url: String,
    pub log: RequestLog,
    data: Shared,
}

impl FakeBackend {
    /// Start the fake on an ephemeral port with an empty store.
    pub async fn start() -> Self {
        let data: Shared = Arc::default();
        data.lock().expect("backend lock").checkout_url =
            Some("https://pay.example.test/session/cs_test_1".to_string());
        let log = RequestLog::default();

        let api = Router::new()
            .route("/auth/login", post(login))
            .route("/user/profile", get(profile))
            .route("/cart", get(get_cart).post(set_cart_line))
            .route("/cart/{product_id}", delete(remove_cart_line))
            .route("/user/addresses", get(list_addresses))
            .route("/user/address", post(create_address))
            .route(
                "/user/address/{id}",
                put(update_address).delete(delete_address),
            )
            .route("/user/address/{id}/default", put(set_default_address))
            .route("/categories", get(list_categories).post(accepted))
            .route("/categories/{id}", put(accepted).delete(accepted))
            .route("/admin/categories", get(list_categories))
            .route("/products", get(list_products))
            .route("/orders", post(create_order))
            .route("/orders/{id}/details", get(order_details))
            .route("/orders/{id}/status", put(update_status))
            .with_state(data.clone());

        let router = Router::new()
            .nest("/api", api)
            .layer(middleware::from_fn_with_state(log.clone(), record_request));

        let addr = serve(router).await;
        Self {
            url: format!("http://{addr}/api"),
            log,
            data,
        }
    }

    /// Seed or inspect the store.
    pub fn with<R>(&self, f: impl FnOnce(&mut BackendData) -> R) -> R {
        f(&mut self.data.lock().expect("backend lock"))
    }

    /// A real API client pointed at this fake.
    #[must_use]
    pub fn client(&self) -> ApiClient {
        ApiClient::with_base_url(&self.url, CLIENT_TIMEOUT).expect("api client")
    }
}

fn authorized(headers: &HeaderMap, data: &Shared) -> Result<String, Response> {
    let token = headers
        .get("authorization")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(str::to_string);
    match token {
        Some(token) if !data.lock().expect("backend lock").reject_tokens => Ok(token),
        _ => Err((
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Token expired" })),
        )
            .into_response()),
    }
}

async fn login(Json(body): Json<Value>) -> Response {
    let email = body["email"].as_str().unwrap_or_default().to_string();
    if body["password"].as_str() != Some(PASSWORD) {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({ "message": "Invalid credentials" })),
        )
            .into_response();
    }
    Json(json!({
        "token": format!("tok-{email}"),
        "userId": "u1",
        "isAdmin": email.starts_with("admin"),
    }))
    .into_response()
}

async fn profile(State(data): State<Shared>, headers: HeaderMap) -> Response {
    let token = match authorized(&headers, &data) {
        Ok(token) => token,
        Err(rejection) => return rejection,
    };
    let email = token.trim_start_matches("tok-").to_string();
    Json(json!({
        "_id": "u1",
        "name": "Ada Lovelace",
        "email": email,
        "isAdmin": email.starts_with("admin"),
        "phone": "07700900123",
    }))
    .into_response()
}

fn cart_json(cart: &[Line]) -> Value {
    Value::Array(
        cart.iter()
            .map(|line| {
                json!({
                    "productId": line.product_id,
                    "quantity": line.quantity,
                    "product": { "name": line.name, "price": line.price, "availability": true },
                })
            })
            .collect(),
    )
}

async fn get_cart(State(data): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorized(&headers, &data) {
        return rejection;
    }
    Json(cart_json(&data.lock().expect("backend lock").cart)).into_response()
}

async fn set_cart_line(
    State(data): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorized(&headers, &data) {
        return rejection;
    }
    let product_id = body["productId"].as_str().unwrap_or_default().to_string();
    let Some(quantity) = body["quantity"].as_u64().and_then(|q| u32::try_from(q).ok()) else {
        return (StatusCode::BAD_REQUEST, Json(json!({ "error": "Bad quantity" }))).into_response();
    };
    if quantity == 0 {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": "Quantity must be at least 1" })),
        )
            .into_response();
    }

    let mut data = data.lock().expect("backend lock");
    match data.cart.iter_mut().find(|l| l.product_id == product_id) {
        Some(line) => line.quantity = quantity,
        None => data.cart.push(Line::new(&product_id, 10.0, quantity)),
    }
    Json(json!({ "message": "Cart updated" })).into_response()
}

async fn remove_cart_line(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(product_id): Path<String>,
) -> Response {
    if let Err(rejection) = authorized(&headers, &data) {
        return rejection;
    }
    let mut data = data.lock().expect("backend lock");
    if let Some(budget) = data.cart_delete_budget.as_mut() {
        if *budget == 0 {
            return (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Database unavailable" })),
            )
                .into_response();
        }
        *budget -= 1;
    }
    data.cart.retain(|l| l.product_id != product_id);
    Json(json!({ "message": "Removed" })).into_response()
}

async fn list_addresses(State(data): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorized(&headers, &data) {
        return rejection;
    }
    let addresses = data.lock().expect("backend lock").addresses.clone();
    Json(json!({ "addresses": addresses })).into_response()
}

async fn create_address(
    State(data): State<Shared>,
    headers: HeaderMap,
    Json(mut body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorized(&headers, &data) {
        return rejection;
    }
    let mut data = data.lock().expect("backend lock");
    body["_id"] = Value::String(data.next_id("addr"));
    data.addresses.push(body.clone());
    (StatusCode::CREATED, Json(json!({ "address": body }))).into_response()
}

async fn update_address(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(mut body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorized(&headers, &data) {
        return rejection;
    }
    let mut data = data.lock().expect("backend lock");
    body["_id"] = Value::String(id.clone());
    for address in &mut data.addresses {
        if address["_id"] == id.as_str() {
            *address = body.clone();
        }
    }
    Json(json!({ "address": body })).into_response()
}

async fn delete_address(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(rejection) = authorized(&headers, &data) {
        return rejection;
    }
    data.lock()
        .expect("backend lock")
        .addresses
        .retain(|a| a["_id"] != id.as_str());
    StatusCode::NO_CONTENT.into_response()
}

async fn set_default_address(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(rejection) = authorized(&headers, &data) {
        return rejection;
    }
    let mut data = data.lock().expect("backend lock");
    let sloppy = data.sloppy_defaults;
    for address in &mut data.addresses {
        if address["_id"] == id.as_str() {
            address["isDefault"] = Value::Bool(true);
        } else if !sloppy {
            address["isDefault"] = Value::Bool(false);
        }
    }
    Json(json!({ "message": "Default address updated" })).into_response()
}

async fn list_categories(State(data): State<Shared>) -> Response {
    Json(data.lock().expect("backend lock").categories.clone()).into_response()
}

async fn list_products(State(data): State<Shared>) -> Response {
    let products = data.lock().expect("backend lock").products.clone();
    let total = products.len();
    Json(json!({
        "products": products,
        "total": total,
        "page": 1,
        "limit": 10,
        "totalPages": 1,
    }))
    .into_response()
}

async fn accepted(State(data): State<Shared>, headers: HeaderMap) -> Response {
    if let Err(rejection) = authorized(&headers, &data) {
        return rejection;
    }
    Json(json!({ "success": true })).into_response()
}

async fn create_order(
    State(data): State<Shared>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorized(&headers, &data) {
        return rejection;
    }
    let mut data = data.lock().expect("backend lock");
    let order_id = data.next_id("ord");
    data.placed_orders.push(body);
    let mut response = json!({ "orderId": order_id });
    if let Some(url) = &data.checkout_url {
        response["checkoutUrl"] = Value::String(url.clone());
    }
    (StatusCode::CREATED, Json(response)).into_response()
}

async fn order_details(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
) -> Response {
    if let Err(rejection) = authorized(&headers, &data) {
        return rejection;
    }
    let order = data
        .lock()
        .expect("backend lock")
        .orders
        .iter()
        .find(|o| o["_id"] == id.as_str())
        .cloned();
    match order {
        Some(order) => Json(json!({ "success": true, "order": order })).into_response(),
        None => Json(json!({ "success": false, "error": "Order not found" })).into_response(),
    }
}

async fn update_status(
    State(data): State<Shared>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<Value>,
) -> Response {
    if let Err(rejection) = authorized(&headers, &data) {
        return rejection;
    }
    let mut data = data.lock().expect("backend lock");
    let status = body["status"].clone();
    for order in &mut data.orders {
        if order["_id"] == id.as_str() {
            order["orderStatus"] = status.clone();
        }
    }
    data.status_updates.push(body);
    Json(json!({ "success": true })).into_response()
}

// =============================================================================
// Fake postcode service
// =============================================================================

/// Fake postcodes.io-compatible lookup service.
///
/// Knows the `SW1A 1` sector: `SW1A 1AA` has a ward and district, and
/// autocomplete offers three neighbours of which one is unknown. `NW1 5LR`
/// is known but has no neighbours.
pub struct FakePostcodes {
    pub url: String,
    pub log: RequestLog,
    delays: LookupDelays,
}

/// Artificial latency per normalized postcode.
type LookupDelays = Arc<Mutex<HashMap<String, Duration>>>;

impl FakePostcodes {
    pub async fn start() -> Self {
        let log = RequestLog::default();
        let delays = LookupDelays::default();
        let router = Router::new()
            .route("/postcodes/{postcode}", get(lookup_postcode))
            .route("/postcodes/{postcode}/autocomplete", get(autocomplete))
            .with_state(delays.clone())
            .layer(middleware::from_fn_with_state(log.clone(), record_request));

        let addr = serve(router).await;
        Self {
            url: format!("http://{addr}"),
            log,
            delays,
        }
    }

    /// Hold every lookup of `postcode` (e.g. `"NW15LR"`) for `delay`.
    pub fn delay_lookup(&self, postcode: &str, delay: Duration) {
        self.delays
            .lock()
            .expect("lookup delays lock")
            .insert(postcode.to_string(), delay);
    }

    /// A real postcode client pointed at this fake.
    #[must_use]
    pub fn client(&self) -> PostcodeClient {
        PostcodeClient::with_base_url(&self.url, CLIENT_TIMEOUT).expect("postcode client")
    }
}

fn known_postcode(postcode: &str) -> Option<Value> {
    let (ward, district, formatted) = match postcode {
        "SW1A1AA" => ("St James's", "Westminster", "SW1A 1AA"),
        "SW1A1AB" => ("St James's", "Westminster", "SW1A 1AB"),
        "SW1A1AD" => ("Vincent Square", "Westminster", "SW1A 1AD"),
        "NW15LR" => ("Regent's Park", "Camden", "NW1 5LR"),
        _ => return None,
    };
    Some(json!({
        "postcode": formatted,
        "admin_ward": ward,
        "admin_district": district,
        "admin_county": null,
        "region": "London",
        "country": "England",
    }))
}

async fn lookup_postcode(
    State(delays): State<LookupDelays>,
    Path(postcode): Path<String>,
) -> Response {
    let key = postcode.replace(' ', "").to_uppercase();
    let delay = delays.lock().expect("lookup delays lock").get(&key).copied();
    if let Some(delay) = delay {
        tokio::time::sleep(delay).await;
    }
    match known_postcode(&key) {
        Some(result) => Json(json!({ "status": 200, "result": result })).into_response(),
        None => (
            StatusCode::NOT_FOUND,
            Json(json!({ "status": 404, "error": "Postcode not found" })),
        )
            .into_response(),
    }
}

async fn autocomplete(Path(postcode): Path<String>) -> Response {
    let result = if postcode.starts_with("SW1A") {
        json!(["SW1A 1AA", "SW1A 1AB", "SW1A 1AD", "SW1A 1ZZ"])
    } else {
        Value::Null
    };
    Json(json!({ "status": 200, "result": result })).into_response()
}

// =============================================================================
// Storefront under test
// =============================================================================

/// The full storefront router served against the fakes.
pub struct Storefront {
    pub url: String,
    pub backend: FakeBackend,
    pub postcodes: FakePostcodes,
}

impl Storefront {
    pub async fn start() -> Self {
        let backend = FakeBackend::start().await;
        let postcodes = FakePostcodes::start().await;

        let vars = [
            ("STOREFRONT_BASE_URL", "http://127.0.0.1".to_string()),
            ("API_BASE_URL", backend.url.clone()),
            ("POSTCODE_API_URL", postcodes.url.clone()),
            ("HTTP_TIMEOUT_SECS", "5".to_string()),
        ];
        let config = StorefrontConfig::from_lookup(|key| {
            vars.iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| v.clone())
        })
        .expect("storefront config");

        let state = AppState::from_parts(config, backend.client(), postcodes.client());
        let addr = serve(highstreet_storefront::app(state)).await;

        Self {
            url: format!("http://{addr}"),
            backend,
            postcodes,
        }
    }

    /// A browser-like client: keeps cookies, does not follow redirects.
    #[must_use]
    pub fn browser(&self) -> reqwest::Client {
        reqwest::Client::builder()
            .cookie_store(true)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .expect("browser client")
    }

    #[must_use]
    pub fn at(&self, path: &str) -> String {
        format!("{}{path}", self.url)
    }

    /// Log in through the real login form.
    pub async fn login(&self, browser: &reqwest::Client, email: &str) -> reqwest::Response {
        browser
            .post(self.at("/login"))
            .form(&[("email", email), ("password", PASSWORD)])
            .send()
            .await
            .expect("login request")
    }
}

/// `Location` header of a redirect response.
#[must_use]
pub fn location(response: &reqwest::Response) -> Option<String> {
    response
        .headers()
        .get("location")
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
