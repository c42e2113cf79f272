//! HTTP middleware stack for storefront.
//!
//! # Middleware Order (bottom to top in Router)
//!
//! 1. Sentry layer (capture errors)
//! 2. `TraceLayer` (request tracing)
//! 3. Request ID (add unique ID to each request)
//! 4. Session lock (one request per session at a time)
//! 5. Session layer (tower-sessions)
//! 6. Security headers
//! 7. Rate limiting on payment creation (governor)

pub mod customer;
pub mod rate_limit;
pub mod request_id;
pub mod security_headers;
pub mod session;

pub use customer::{RequireCustomer, Visitor};
pub use rate_limit::payment_rate_limiter;
pub use request_id::request_id_middleware;
pub use security_headers::security_headers_middleware;
pub use session::{create_session_layer, postgres_store, session_lock_middleware};
