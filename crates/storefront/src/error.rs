//! Request errors and their HTTP rendering.
//!
//! Page handlers return [`Result`], which answers with a plain-text body.
//! API handlers return [`ApiResult`]: same status codes, but the body is
//! `{"error": "..."}`. Server-side failures are sent to Sentry either way;
//! clients only ever see [`AppError::public_message`].

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::db::RepositoryError;
use crate::services::auth::AuthError;
use crate::services::inventory::InventoryError;
use crate::services::stripe::StripeError;

/// Anything a storefront handler can fail with.
#[derive(Debug, Error)]
pub enum AppError {
    /// Query failed, or a row the handler needed was missing.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Registration, login or password hashing failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Inventory operation failed.
    #[error("Inventory error: {0}")]
    Inventory(#[from] InventoryError),

    /// Payment provider call failed.
    #[error("Stripe error: {0}")]
    Stripe(#[from] StripeError),

    /// Template rendering failed.
    #[error("Template error: {0}")]
    Template(#[from] askama::Error),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// No logged-in user.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// User is authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Malformed form or query input.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Any other server-side failure.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Whether this is a server-side failure worth reporting.
    fn is_server_error(&self) -> bool {
        matches!(
            self,
            Self::Database(_)
                | Self::Internal(_)
                | Self::Stripe(_)
                | Self::Template(_)
                | Self::Inventory(InventoryError::Repository(_))
                | Self::Auth(AuthError::Repository(_) | AuthError::PasswordHash)
        )
    }

    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
            Self::Database(_) | Self::Internal(_) | Self::Template(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Stripe(_) => StatusCode::BAD_GATEWAY,
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => StatusCode::UNAUTHORIZED,
                AuthError::UserAlreadyExists => StatusCode::CONFLICT,
                AuthError::WeakPassword(_)
                | AuthError::InvalidEmail(_)
                | AuthError::MissingField(_) => StatusCode::BAD_REQUEST,
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            },
            Self::Inventory(err) => match err {
                InventoryError::Validation(_) => StatusCode::BAD_REQUEST,
                InventoryError::NotFound => StatusCode::NOT_FOUND,
                InventoryError::Repository(RepositoryError::NotFound) => StatusCode::NOT_FOUND,
                InventoryError::Repository(_) => StatusCode::INTERNAL_SERVER_ERROR,
            },
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
        }
    }

    /// Message safe to show to the client.
    #[must_use]
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(_) | Self::Internal(_) | Self::Template(_) => {
                "Internal server error".to_string()
            }
            Self::Stripe(_) => "Payment service error".to_string(),
            Self::Auth(err) => match err {
                AuthError::InvalidCredentials => "Invalid credentials".to_string(),
                AuthError::UserAlreadyExists => {
                    "An account with this email already exists".to_string()
                }
                AuthError::WeakPassword(msg) => msg.clone(),
                AuthError::InvalidEmail(_) => "Invalid email address".to_string(),
                AuthError::MissingField(_) => err.to_string(),
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    "Authentication error".to_string()
                }
            },
            Self::Inventory(err) => match err {
                InventoryError::Validation(msg) => msg.clone(),
                InventoryError::NotFound | InventoryError::Repository(RepositoryError::NotFound) => {
                    "Item not found".to_string()
                }
                InventoryError::Repository(_) => "Internal server error".to_string(),
            },
            Self::NotFound(msg)
            | Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg) => msg.clone(),
        }
    }

    fn report(&self) {
        if self.is_server_error() {
            let event_id = sentry::capture_error(self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        self.report();
        (self.status(), self.public_message()).into_response()
    }
}

/// JSON flavour of [`AppError`] for API endpoints.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl ApiError {
    /// A 400 with `message` as the error text.
    #[must_use]
    pub fn bad_request(message: impl Into<String>) -> Self {
        Self(AppError::BadRequest(message.into()))
    }

    /// A 404 with `message` as the error text.
    #[must_use]
    pub fn not_found(message: impl Into<String>) -> Self {
        Self(AppError::NotFound(message.into()))
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl From<RepositoryError> for ApiError {
    fn from(err: RepositoryError) -> Self {
        Self(err.into())
    }
}

impl From<InventoryError> for ApiError {
    fn from(err: InventoryError) -> Self {
        Self(err.into())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        self.0.report();
        let body = serde_json::json!({ "error": self.0.public_message() });
        (self.0.status(), Json(body)).into_response()
    }
}

/// Page handler result.
pub type Result<T> = std::result::Result<T, AppError>;

/// API handler result.
pub type ApiResult<T> = std::result::Result<T, ApiError>;

/// Tag subsequent Sentry events with the logged-in user.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Forget the Sentry user after logout.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Record a shopper action; it is attached to the next Sentry event.
///
/// ```rust,ignore
/// add_breadcrumb("cart", "Added item", Some(&[("item_id", "3")]));
/// ```
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn status_of(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    async fn api_body(err: ApiError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_status_codes() {
        let cases: Vec<(AppError, StatusCode)> = vec![
            (AppError::NotFound("item 7".into()), StatusCode::NOT_FOUND),
            (AppError::Unauthorized("login".into()), StatusCode::UNAUTHORIZED),
            (AppError::Forbidden("admin".into()), StatusCode::FORBIDDEN),
            (AppError::BadRequest("quantity".into()), StatusCode::BAD_REQUEST),
            (RepositoryError::NotFound.into(), StatusCode::NOT_FOUND),
            (AuthError::UserAlreadyExists.into(), StatusCode::CONFLICT),
            (AuthError::InvalidCredentials.into(), StatusCode::UNAUTHORIZED),
            (
                InventoryError::Validation("price".into()).into(),
                StatusCode::BAD_REQUEST,
            ),
            (InventoryError::NotFound.into(), StatusCode::NOT_FOUND),
        ];
        for (err, expected) in cases {
            let label = err.to_string();
            assert_eq!(status_of(err), expected, "{label}");
        }
    }

    #[test]
    fn test_public_message_for_duplicate_account() {
        let err = AppError::from(AuthError::UserAlreadyExists);
        assert_eq!(
            err.public_message(),
            "An account with this email already exists"
        );
    }

    #[tokio::test]
    async fn test_api_error_passes_validation_message_through() {
        let (status, body) = api_body(
            InventoryError::Validation("Resulting quantity cannot be negative".to_string()).into(),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Resulting quantity cannot be negative");
    }

    #[tokio::test]
    async fn test_api_error_hides_internal_details() {
        let (status, body) =
            api_body(ApiError(AppError::Internal("pool exhausted".to_string()))).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error"], "Internal server error");
    }

    #[tokio::test]
    async fn test_api_error_item_not_found() {
        let (status, body) = api_body(InventoryError::NotFound.into()).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body, serde_json::json!({"error": "Item not found"}));
    }
}
