//! Application state shared across handlers.

use std::sync::Arc;
use std::time::Duration;

use moka::future::Cache;
use sqlx::PgPool;
use tokio::sync::{Mutex, OwnedMutexGuard};

use crate::catalog::Catalog;
use crate::checkout::Checkout;
use crate::config::StorefrontConfig;
use crate::db::{OrderStore, PgOrderStore, PgProductStore, ProductStore};
use crate::paypay::{PayPayClient, PaymentGateway};

/// How long a cached `Idempotency-Key` response is replayed.
const IDEMPOTENCY_TTL: Duration = Duration::from_secs(10 * 60);

/// Idle per-session locks are dropped after this long.
const SESSION_LOCK_IDLE: Duration = Duration::from_secs(30 * 60);

/// Response replayed for a repeated `Idempotency-Key`.
pub type IdempotentResponse = Arc<serde_json::Value>;

/// External services the storefront talks to.
///
/// Production wires the `PostgreSQL` stores and the PayPay client; tests
/// substitute in-memory doubles.
#[derive(Clone)]
pub struct Services {
    pub products: Arc<dyn ProductStore>,
    pub orders: Arc<dyn OrderStore>,
    pub gateway: Arc<dyn PaymentGateway>,
}

impl Services {
    /// The production services.
    #[must_use]
    pub fn production(config: &StorefrontConfig, pool: &PgPool) -> Self {
        Self {
            products: Arc::new(PgProductStore::new(pool.clone())),
            orders: Arc::new(PgOrderStore::new(pool.clone())),
            gateway: Arc::new(PayPayClient::new(&config.paypay)),
        }
    }
}

/// Application state shared across all handlers.
///
/// This struct is cheaply cloneable via `Arc` and provides access to
/// shared resources like database connections and configuration.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: StorefrontConfig,
    pool: PgPool,
    catalog: Catalog,
    orders: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    checkout: Checkout,
    idempotency: Cache<String, IdempotentResponse>,
    session_locks: Cache<String, Arc<Mutex<()>>>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// # Arguments
    ///
    /// * `config` - Storefront configuration
    /// * `pool` - `PostgreSQL` connection pool (readiness check)
    /// * `services` - Catalog, order and payment backends
    #[must_use]
    pub fn new(config: StorefrontConfig, pool: PgPool, services: Services) -> Self {
        let checkout = Checkout::new(
            Arc::clone(&services.gateway),
            Arc::clone(&services.orders),
            config.poll,
            config.payment_redirect_url(),
        );

        Self {
            inner: Arc::new(AppStateInner {
                catalog: Catalog::new(services.products),
                orders: services.orders,
                gateway: services.gateway,
                checkout,
                idempotency: Cache::builder()
                    .max_capacity(10_000)
                    .time_to_live(IDEMPOTENCY_TTL)
                    .build(),
                session_locks: Cache::builder()
                    .max_capacity(100_000)
                    .time_to_idle(SESSION_LOCK_IDLE)
                    .build(),
                config,
                pool,
            }),
        }
    }

    /// Get a reference to the storefront configuration.
    #[must_use]
    pub fn config(&self) -> &StorefrontConfig {
        &self.inner.config
    }

    /// Get a reference to the database connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Get a reference to the product catalog.
    #[must_use]
    pub fn catalog(&self) -> &Catalog {
        &self.inner.catalog
    }

    /// Get a reference to the order store.
    #[must_use]
    pub fn orders(&self) -> &dyn OrderStore {
        self.inner.orders.as_ref()
    }

    /// Get a reference to the payment provider.
    #[must_use]
    pub fn gateway(&self) -> &dyn PaymentGateway {
        self.inner.gateway.as_ref()
    }

    /// Get a reference to the checkout orchestrator.
    #[must_use]
    pub fn checkout(&self) -> &Checkout {
        &self.inner.checkout
    }

    /// Get a reference to the `Idempotency-Key` response cache.
    #[must_use]
    pub fn idempotency(&self) -> &Cache<String, IdempotentResponse> {
        &self.inner.idempotency
    }

    /// Serialize the requests of one session, keyed by its cookie value.
    pub async fn session_lock(&self, session_key: &str) -> OwnedMutexGuard<()> {
        self.inner
            .session_locks
            .get_with_by_ref(session_key, async { Arc::new(Mutex::new(())) })
            .await
            .lock_owned()
            .await
    }
}
