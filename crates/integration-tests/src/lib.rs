//! Integration test harness for the SETO Coffee storefront.
//!
//! Each test spawns the full storefront router on an ephemeral port with
//! in-process doubles in place of `PostgreSQL` and PayPay, then drives it over
//! HTTP with a cookie-keeping `reqwest` client (one client per visitor).
//!
//! # Running Tests
//!
//! ```bash
//! cargo test -p seto-integration-tests
//! ```
//!
//! No database or provider credentials are needed: sessions use the memory
//! store, orders an in-memory store, and payments a [`ScriptedGateway`].

#![allow(clippy::missing_panics_doc)]

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::SecretString;
use serde_json::Value;
use seto_core::catalog::Product;
use seto_core::checkout::PollPolicy;
use seto_core::order::Order;
use seto_core::{CustomerId, MerchantPaymentId, OrderId, PaymentId, PaymentStatus, ProductId, Yen};
use seto_storefront::config::{PayPayConfig, PayPayEnvironment, StorefrontConfig};
use seto_storefront::db::{OrderStore, ProductStore, RepositoryError};
use seto_storefront::middleware::create_session_layer;
use seto_storefront::paypay::{
    CreateQrCodeRequest, PaymentDetails, PaymentError, PaymentGateway, QrCode, RefundDetails,
    RefundRequest,
};
use seto_storefront::routes;
use seto_storefront::state::{AppState, Services};
use sqlx::postgres::PgPoolOptions;
use tower_sessions::session::{Id, Record};
use tower_sessions::session_store;
use tower_sessions::{MemoryStore, SessionStore};

/// Poll cadence fast enough for tests.
#[must_use]
pub const fn fast_poll_policy() -> PollPolicy {
    PollPolicy {
        interval: Duration::from_millis(20),
        error_interval: Duration::from_millis(20),
        max_attempts: 200,
        deadline: Duration::from_secs(30),
    }
}

/// Configuration pointing nowhere; every external service is a double.
#[must_use]
pub fn test_config() -> StorefrontConfig {
    StorefrontConfig {
        database_url: SecretString::from("postgres://127.0.0.1:1/seto_test"),
        host: [127, 0, 0, 1].into(),
        port: 0,
        base_url: "http://localhost:3000".to_string(),
        session_secret: SecretString::from("x".repeat(32)),
        paypay: PayPayConfig {
            environment: PayPayEnvironment::Staging,
            api_base_url: Some("http://127.0.0.1:9".to_string()),
            api_key: "test-key".to_string(),
            api_secret: SecretString::from("test-secret"),
            merchant_id: "test-merchant".to_string(),
        },
        poll: fast_poll_policy(),
        sentry_dsn: None,
    }
}

// =============================================================================
// Doubles
// =============================================================================

/// A product store that is always unreachable.
pub struct DownProductStore;

#[async_trait]
impl ProductStore for DownProductStore {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        Err(RepositoryError::Unavailable("product store is down".to_string()))
    }

    async fn get(&self, _id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Err(RepositoryError::Unavailable("product store is down".to_string()))
    }
}

/// A product store holding a fixed list.
pub struct StaticProductStore(pub Vec<Product>);

#[async_trait]
impl ProductStore for StaticProductStore {
    async fn list(&self) -> Result<Vec<Product>, RepositoryError> {
        Ok(self.0.clone())
    }

    async fn get(&self, id: &ProductId) -> Result<Option<Product>, RepositoryError> {
        Ok(self.0.iter().find(|p| &p.id == id).cloned())
    }
}

/// Orders kept in memory with the same uniqueness rules as the database.
#[derive(Default)]
pub struct MemoryOrderStore {
    orders: Mutex<Vec<Order>>,
    failing_inserts: AtomicUsize,
    insert_attempts: AtomicUsize,
}

impl MemoryOrderStore {
    /// Every stored order.
    #[must_use]
    pub fn all(&self) -> Vec<Order> {
        self.orders.lock().expect("order store poisoned").clone()
    }

    /// Make the next `count` inserts fail as if the database were down.
    pub fn fail_next_inserts(&self, count: usize) {
        self.failing_inserts.store(count, Ordering::SeqCst);
    }

    /// Inserts attempted so far, failed ones included.
    #[must_use]
    pub fn insert_attempts(&self) -> usize {
        self.insert_attempts.load(Ordering::SeqCst)
    }
}

/// Consume one unit of a failure budget; `true` if the call should fail.
fn take_failure(budget: &AtomicUsize) -> bool {
    budget
        .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
        .is_ok()
}

#[async_trait]
impl OrderStore for MemoryOrderStore {
    async fn insert(&self, order: &Order) -> Result<bool, RepositoryError> {
        self.insert_attempts.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_inserts) {
            return Err(RepositoryError::Unavailable("order store is down".to_string()));
        }
        let mut orders = self.orders.lock().expect("order store poisoned");
        let duplicate = orders.iter().any(|existing| {
            existing.order_id == order.order_id
                || (order.merchant_payment_id.is_some()
                    && existing.merchant_payment_id == order.merchant_payment_id)
        });
        if duplicate {
            return Ok(false);
        }
        orders.push(order.clone());
        Ok(true)
    }

    async fn get(
        &self,
        customer_id: CustomerId,
        order_id: &OrderId,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .all()
            .into_iter()
            .find(|o| o.customer_id == customer_id && &o.order_id == order_id))
    }

    async fn list_for_customer(
        &self,
        customer_id: CustomerId,
    ) -> Result<Vec<Order>, RepositoryError> {
        let mut orders: Vec<Order> = self
            .all()
            .into_iter()
            .filter(|o| o.customer_id == customer_id)
            .collect();
        orders.sort_by(|a, b| b.order_date.cmp(&a.order_date));
        Ok(orders)
    }

    async fn get_by_merchant_payment_id(
        &self,
        merchant_payment_id: &MerchantPaymentId,
    ) -> Result<Option<Order>, RepositoryError> {
        Ok(self
            .all()
            .into_iter()
            .find(|o| o.merchant_payment_id.as_ref() == Some(merchant_payment_id)))
    }
}

/// Payment provider double.
///
/// Every intent reports the scripted status; tests flip it to simulate the
/// visitor paying or the provider canceling.
pub struct ScriptedGateway {
    status: Mutex<PaymentStatus>,
    reject_create: AtomicBool,
    create_delay: Mutex<Duration>,
    failing_polls: AtomicUsize,
    polls: AtomicUsize,
    created: Mutex<HashMap<MerchantPaymentId, Yen>>,
    canceled: Mutex<Vec<MerchantPaymentId>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self {
            status: Mutex::new(PaymentStatus::Created),
            reject_create: AtomicBool::new(false),
            create_delay: Mutex::new(Duration::ZERO),
            failing_polls: AtomicUsize::new(0),
            polls: AtomicUsize::new(0),
            created: Mutex::new(HashMap::new()),
            canceled: Mutex::new(Vec::new()),
        }
    }
}

impl ScriptedGateway {
    /// Status reported for every intent from now on.
    pub fn set_status(&self, status: PaymentStatus) {
        *self.status.lock().expect("gateway poisoned") = status;
    }

    /// Make intent creation fail with a provider error.
    pub fn reject_create(&self, reject: bool) {
        self.reject_create.store(reject, Ordering::SeqCst);
    }

    /// Delay every intent creation by `delay`.
    pub fn set_create_delay(&self, delay: Duration) {
        *self.create_delay.lock().expect("gateway poisoned") = delay;
    }

    /// Make the next `count` status requests fail with HTTP 503.
    pub fn fail_next_polls(&self, count: usize) {
        self.failing_polls.store(count, Ordering::SeqCst);
    }

    /// Status requests received so far, failed ones included.
    #[must_use]
    pub fn poll_count(&self) -> usize {
        self.polls.load(Ordering::SeqCst)
    }

    /// Number of intents created.
    #[must_use]
    pub fn created_count(&self) -> usize {
        self.created.lock().expect("gateway poisoned").len()
    }

    /// Amount of the intent created as `merchant_payment_id`.
    #[must_use]
    pub fn created_amount(&self, merchant_payment_id: &str) -> Option<Yen> {
        self.created
            .lock()
            .expect("gateway poisoned")
            .get(&MerchantPaymentId::new(merchant_payment_id))
            .copied()
    }

    /// Merchant payment ids canceled so far.
    #[must_use]
    pub fn canceled(&self) -> Vec<MerchantPaymentId> {
        self.canceled.lock().expect("gateway poisoned").clone()
    }
}

#[async_trait]
impl PaymentGateway for ScriptedGateway {
    async fn create_qr_code(&self, request: &CreateQrCodeRequest) -> Result<QrCode, PaymentError> {
        let delay = *self.create_delay.lock().expect("gateway poisoned");
        tokio::time::sleep(delay).await;
        if self.reject_create.load(Ordering::SeqCst) {
            return Err(PaymentError::Api {
                code: "INVALID_PARAMS".to_string(),
                message: "金額が不正です".to_string(),
            });
        }
        let id = request.merchant_payment_id.clone();
        self.created
            .lock()
            .expect("gateway poisoned")
            .insert(id.clone(), request.amount.amount);
        Ok(QrCode {
            code_id: Some(format!("code-{id}")),
            url: format!("https://qr.paypay.test/{id}"),
            deep_link: format!("paypay://payment?id={id}"),
            expiry_date: Some(chrono::Utc::now().timestamp() + 300),
            merchant_payment_id: id,
        })
    }

    async fn payment_details(
        &self,
        merchant_payment_id: &MerchantPaymentId,
    ) -> Result<PaymentDetails, PaymentError> {
        self.polls.fetch_add(1, Ordering::SeqCst);
        if take_failure(&self.failing_polls) {
            return Err(PaymentError::Status {
                status: 503,
                body: "service unavailable".to_string(),
            });
        }
        let amount = self
            .created
            .lock()
            .expect("gateway poisoned")
            .get(merchant_payment_id)
            .copied()
            .ok_or_else(|| PaymentError::Api {
                code: "DYNAMIC_QR_PAYMENT_NOT_FOUND".to_string(),
                message: "payment not found".to_string(),
            })?;
        let status = self.status.lock().expect("gateway poisoned").clone();
        let accepted_at =
            (status == PaymentStatus::Completed).then(|| chrono::Utc::now().timestamp());
        Ok(PaymentDetails {
            status,
            payment_id: Some(PaymentId::new(format!("pp-{merchant_payment_id}"))),
            merchant_payment_id: merchant_payment_id.clone(),
            amount: amount.into(),
            order_description: None,
            requested_at: None,
            accepted_at,
        })
    }

    async fn cancel_payment(
        &self,
        merchant_payment_id: &MerchantPaymentId,
    ) -> Result<(), PaymentError> {
        self.canceled
            .lock()
            .expect("gateway poisoned")
            .push(merchant_payment_id.clone());
        Ok(())
    }

    async fn refund_payment(&self, _request: &RefundRequest) -> Result<RefundDetails, PaymentError> {
        Err(PaymentError::MissingData)
    }
}

/// Memory session store whose saves can be switched off.
#[derive(Debug, Clone, Default)]
pub struct FlakySessionStore {
    inner: MemoryStore,
    fail_saves: Arc<AtomicBool>,
}

impl FlakySessionStore {
    /// Make every save fail until switched back.
    pub fn fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    fn check(&self) -> session_store::Result<()> {
        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(session_store::Error::Backend("session store is down".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl SessionStore for FlakySessionStore {
    async fn create(&self, record: &mut Record) -> session_store::Result<()> {
        self.check()?;
        self.inner.create(record).await
    }

    async fn save(&self, record: &Record) -> session_store::Result<()> {
        self.check()?;
        self.inner.save(record).await
    }

    async fn load(&self, session_id: &Id) -> session_store::Result<Option<Record>> {
        self.inner.load(session_id).await
    }

    async fn delete(&self, session_id: &Id) -> session_store::Result<()> {
        self.inner.delete(session_id).await
    }
}

// =============================================================================
// Test App
// =============================================================================

/// A running storefront plus handles to its doubles.
pub struct TestApp {
    pub base_url: String,
    pub gateway: Arc<ScriptedGateway>,
    pub orders: Arc<MemoryOrderStore>,
    pub sessions: FlakySessionStore,
    server: tokio::task::JoinHandle<()>,
}

impl TestApp {
    /// Spawn a storefront whose product store is down (fallback catalog).
    pub async fn spawn() -> Self {
        Self::spawn_with(Arc::new(DownProductStore), fast_poll_policy()).await
    }

    /// Spawn a storefront over `products`.
    pub async fn spawn_with_products(products: Arc<dyn ProductStore>) -> Self {
        Self::spawn_with(products, fast_poll_policy()).await
    }

    /// Spawn a storefront with the fallback catalog and a custom poll policy.
    pub async fn spawn_with_policy(policy: PollPolicy) -> Self {
        Self::spawn_with(Arc::new(DownProductStore), policy).await
    }

    async fn spawn_with(products: Arc<dyn ProductStore>, policy: PollPolicy) -> Self {
        let config = StorefrontConfig {
            poll: policy,
            ..test_config()
        };
        let gateway = Arc::new(ScriptedGateway::default());
        let orders = Arc::new(MemoryOrderStore::default());

        // Nothing listens on port 1: database calls fail fast.
        let pool = PgPoolOptions::new()
            .acquire_timeout(Duration::from_millis(500))
            .connect_lazy("postgres://127.0.0.1:1/seto_test")
            .expect("lazy pool");
        let services = Services {
            products,
            orders: Arc::clone(&orders) as Arc<dyn OrderStore>,
            gateway: Arc::clone(&gateway) as Arc<dyn PaymentGateway>,
        };
        let sessions = FlakySessionStore::default();
        let session_layer = create_session_layer(sessions.clone(), &config);
        let app = routes::app(AppState::new(config, pool, services), session_layer);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
            .await
            .expect("bind ephemeral port");
        let addr = listener.local_addr().expect("local addr");
        let server = tokio::spawn(async move {
            let _ = axum::serve(
                listener,
                app.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await;
        });

        Self {
            base_url: format!("http://{addr}"),
            gateway,
            orders,
            sessions,
            server,
        }
    }

    /// A new visitor: a client with its own cookie jar.
    #[must_use]
    pub fn visitor(&self) -> Visitor {
        Visitor {
            base_url: self.base_url.clone(),
            client: Client::builder()
                .cookie_store(true)
                .build()
                .expect("Failed to create HTTP client"),
        }
    }
}

impl Drop for TestApp {
    fn drop(&mut self) {
        self.server.abort();
    }
}

/// One browser session against a [`TestApp`].
///
/// Clones share the cookie jar, so they act as parallel tabs of one visitor.
#[derive(Clone)]
pub struct Visitor {
    base_url: String,
    client: Client,
}

impl Visitor {
    fn url(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }

    async fn read(response: reqwest::Response) -> (StatusCode, Value) {
        let status = response.status();
        let body = response.json().await.unwrap_or(Value::Null);
        (status, body)
    }

    /// `GET path`, returning the raw response.
    pub async fn get_raw(&self, path: &str) -> reqwest::Response {
        self.client.get(self.url(path)).send().await.expect("GET")
    }

    /// `GET path`, returning the status and JSON body.
    pub async fn get(&self, path: &str) -> (StatusCode, Value) {
        let response = self.client.get(self.url(path)).send().await.expect("GET");
        Self::read(response).await
    }

    /// `POST path` with a JSON body.
    pub async fn post(&self, path: &str, body: &Value) -> (StatusCode, Value) {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .expect("POST");
        Self::read(response).await
    }

    /// `POST path` with a JSON body and extra headers.
    pub async fn post_with_headers(
        &self,
        path: &str,
        body: &Value,
        headers: &[(&str, &str)],
    ) -> (StatusCode, Value) {
        let mut request = self.client.post(self.url(path)).json(body);
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        Self::read(request.send().await.expect("POST")).await
    }

    /// `DELETE path`.
    pub async fn delete(&self, path: &str) -> (StatusCode, Value) {
        let response = self
            .client
            .delete(self.url(path))
            .send()
            .await
            .expect("DELETE");
        Self::read(response).await
    }

    /// Add a product variant to the cart.
    pub async fn add_to_cart(&self, product_id: &str, grind_type: &str, quantity: u32) -> Value {
        let (status, body) = self
            .post(
                "/cart/add",
                &serde_json::json!({
                    "productId": product_id,
                    "grindType": grind_type,
                    "quantity": quantity,
                }),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "add to cart failed: {body}");
        body
    }

    /// Submit a valid shipping form.
    pub async fn submit_shipping(&self) {
        let (status, body) = self.post("/checkout/shipping", &valid_shipping()).await;
        assert_eq!(status, StatusCode::OK, "shipping failed: {body}");
    }

    /// Poll `GET /checkout/payment` until the flow reaches `state`.
    pub async fn wait_for_state(&self, state: &str) -> Value {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let (_, body) = self.get("/checkout/payment").await;
            if body["state"] == state {
                return body;
            }
            assert!(
                tokio::time::Instant::now() < deadline,
                "checkout never reached {state}; last view: {body}"
            );
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

/// Wait until `reached` holds, checking every 20ms for up to five seconds.
pub async fn wait_until(what: &str, mut reached: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
    while !reached() {
        assert!(tokio::time::Instant::now() < deadline, "timed out waiting for {what}");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

/// A shipping form that passes validation.
#[must_use]
pub fn valid_shipping() -> Value {
    serde_json::json!({
        "fullName": "瀬戸 太郎",
        "postalCode": "123-4567",
        "prefecture": "東京都",
        "city": "渋谷区",
        "address": "神南1-2-3",
        "building": "",
        "phone": "03-1234-5678",
        "email": "taro@example.com",
    })
}
