//! Session middleware configuration.
//!
//! Production uses the `PostgreSQL` store from `tower-sessions-sqlx-store`;
//! tests plug in `tower_sessions::MemoryStore`.
//!
//! [`session_lock_middleware`] wraps the session layer so that the requests of
//! one session run one at a time, from loading the record to saving it back.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, header::COOKIE},
    middleware::Next,
    response::Response,
};
use sqlx::PgPool;
use tower_sessions::cookie::Cookie;
use tower_sessions::{Expiry, SessionManagerLayer, SessionStore};
use tower_sessions_sqlx_store::PostgresStore;

use crate::config::StorefrontConfig;
use crate::state::AppState;

/// Session cookie name.
pub const SESSION_COOKIE_NAME: &str = "seto_session";

/// Session expiry time in seconds (7 days).
const SESSION_EXPIRY_SECONDS: i64 = 7 * 24 * 60 * 60;

/// The `PostgreSQL` session store.
///
/// The `tower_sessions.session` table is created by the storefront migrations.
#[must_use]
pub fn postgres_store(pool: &PgPool) -> PostgresStore {
    PostgresStore::new(pool.clone())
}

/// Create the session layer over `store`.
///
/// # Arguments
///
/// * `store` - Session store
/// * `config` - Storefront configuration (cookie security follows the base URL)
#[must_use]
pub fn create_session_layer<Store: SessionStore + Clone>(
    store: Store,
    config: &StorefrontConfig,
) -> SessionManagerLayer<Store> {
    SessionManagerLayer::new(store)
        .with_name(SESSION_COOKIE_NAME)
        .with_expiry(Expiry::OnInactivity(
            tower_sessions::cookie::time::Duration::seconds(SESSION_EXPIRY_SECONDS),
        ))
        .with_secure(config.is_https())
        .with_same_site(tower_sessions::cookie::SameSite::Lax)
        .with_http_only(true)
        .with_path("/")
}

/// The session cookie value sent with the request, if any.
fn session_cookie(headers: &HeaderMap) -> Option<String> {
    headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == SESSION_COOKIE_NAME)
        .map(|cookie| cookie.value().to_owned())
}

/// Middleware that runs the requests of one session one at a time.
///
/// Must be layered outside the session layer so the lock covers the store
/// load, the handler and the store save. Requests without a session cookie
/// get a new session and pass straight through.
pub async fn session_lock_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    let Some(session_key) = session_cookie(request.headers()) else {
        return next.run(request).await;
    };

    let _guard = state.session_lock(&session_key).await;
    next.run(request).await
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    #[test]
    fn test_session_cookie_is_found_among_others() {
        let mut headers = HeaderMap::new();
        headers.append(COOKIE, HeaderValue::from_static("theme=dark"));
        headers.append(
            COOKIE,
            HeaderValue::from_static("lang=ja; seto_session=abc123; other=1"),
        );
        assert_eq!(session_cookie(&headers).as_deref(), Some("abc123"));
    }

    #[test]
    fn test_missing_session_cookie() {
        let mut headers = HeaderMap::new();
        assert_eq!(session_cookie(&headers), None);
        headers.insert(COOKIE, HeaderValue::from_static("seto_session_old=1"));
        assert_eq!(session_cookie(&headers), None);
    }
}
