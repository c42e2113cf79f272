//! Customer extractors.
//!
//! Every visitor is identified by an anonymous customer id kept in the
//! session. [`Visitor`] assigns one on first use; [`RequireCustomer`] rejects
//! requests from sessions that never got one.

use axum::{extract::FromRequestParts, http::request::Parts};
use seto_core::CustomerId;
use tower_sessions::Session;

use crate::error::{AppError, set_sentry_user};
use crate::models::session;

/// Message returned when a customer session is required.
pub const MSG_UNAUTHORIZED: &str = "認証が必要です";

fn session_from_parts(parts: &Parts) -> Result<Session, AppError> {
    parts
        .extensions
        .get::<Session>()
        .cloned()
        .ok_or_else(|| AppError::Internal("session layer missing".to_string()))
}

/// The current visitor, with a customer id assigned on demand.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(visitor: Visitor) -> impl IntoResponse {
///     format!("Hello, {}!", visitor.customer_id)
/// }
/// ```
pub struct Visitor {
    pub customer_id: CustomerId,
    pub session: Session,
}

impl<S> FromRequestParts<S> for Visitor
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from_parts(parts)?;
        let customer_id = session::ensure_customer_id(&session).await?;
        set_sentry_user(&customer_id);

        Ok(Self {
            customer_id,
            session,
        })
    }
}

/// Extractor that requires an existing customer session.
///
/// Responds `401 {"error": "認証が必要です"}` otherwise.
pub struct RequireCustomer(pub CustomerId);

impl<S> FromRequestParts<S> for RequireCustomer
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let session = session_from_parts(parts)?;
        let customer_id = session::customer_id(&session)
            .await
            .ok()
            .flatten()
            .ok_or_else(|| AppError::Unauthorized(MSG_UNAUTHORIZED.to_string()))?;
        set_sentry_user(&customer_id);

        Ok(Self(customer_id))
    }
}
