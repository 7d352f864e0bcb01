//! Authentication route handlers.
//!
//! Email/password accounts with email confirmation. Logging in moves the
//! guest cart cookie into the user's stored cart.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    Form,
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Redirect, Response},
};
use chrono::Utc;
use secrecy::ExposeSecret;
use serde::Deserialize;
use tower_sessions::Session;
use tracing::{info, instrument, warn};

use fnuc_core::Email;

use super::{MessageQuery, Page};
use crate::db::users::Confirmation;
use crate::db::{RepositoryError, UserRepository};
use crate::error::{AppError, Result, clear_sentry_user, set_sentry_user};
use crate::filters;
use crate::middleware::guest_cart::{GuestCartInput, clear_cart_cookie, with_cookie};
use crate::middleware::{OptionalAuth, RequireAuth, clear_current_user, set_current_user};
use crate::models::CurrentUser;
use crate::services::auth::Registration;
use crate::services::mail::confirmation_email;
use crate::services::{AuthError, AuthService, CartService, confirmation};
use crate::state::AppState;

// =============================================================================
// Form Types
// =============================================================================

/// Login form data.
#[derive(Debug, Deserialize)]
pub struct LoginForm {
    pub email: String,
    pub password: String,
}

/// Registration form data.
#[derive(Debug, Default, Deserialize)]
pub struct RegisterForm {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub email: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub phone: String,
}

// =============================================================================
// Templates
// =============================================================================

/// Login page template.
#[derive(Template, WebTemplate)]
#[template(path = "login.html")]
pub struct LoginTemplate {
    pub page: Page,
}

/// Register page template. Fields are echoed back after a failed attempt.
#[derive(Template, WebTemplate)]
#[template(path = "register.html")]
pub struct RegisterTemplate {
    pub page: Page,
    pub error: Option<String>,
    pub name: String,
    pub email: String,
    pub phone: String,
}

// =============================================================================
// Helpers
// =============================================================================

/// Email a fresh confirmation link. Failures are logged, not returned.
async fn send_confirmation(state: &AppState, email: &Email, name: &str) {
    let secret = state.config().session_secret.expose_secret();
    let token = match confirmation::generate(secret.as_bytes(), email, Utc::now()) {
        Ok(token) => token,
        Err(e) => {
            warn!(error = %e, "Could not issue confirmation token");
            return;
        }
    };
    let url = state.config().absolute_url(&format!("/confirm/{token}"));

    let message = match confirmation_email(email.as_str(), name, &url) {
        Ok(message) => message,
        Err(e) => {
            warn!(error = %e, "Could not render confirmation email");
            return;
        }
    };
    if let Err(e) = state.mailer().send(message).await {
        warn!(error = %e, "Could not send confirmation email");
    }
}

// =============================================================================
// Login Routes
// =============================================================================

/// Display the login page.
pub async fn login_page(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
    Query(query): Query<MessageQuery>,
) -> Result<Response> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let page = Page::load(&state, None, &guest).await?.with_notice(&query);
    Ok(LoginTemplate { page }.into_response())
}

/// Handle login form submission.
///
/// On success the session id is rotated and the guest cart cookie, if any,
/// is merged into the user's stored cart and cleared.
#[instrument(skip_all)]
pub async fn login(
    State(state): State<AppState>,
    session: Session,
    OptionalAuth(current): OptionalAuth,
    guest: GuestCartInput,
    Form(form): Form<LoginForm>,
) -> Result<Response> {
    if current.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let user = match AuthService::new(state.pool())
        .login(&form.email, &form.password)
        .await
    {
        Ok(user) => user,
        Err(AuthError::InvalidCredentials) => {
            return Ok(Redirect::to("/login?error=credentials").into_response());
        }
        Err(e) => return Err(e.into()),
    };

    let current = CurrentUser::from(&user);
    if let Err(e) = set_current_user(&session, &current).await {
        tracing::error!(error = %e, "Failed to set session");
        return Ok(Redirect::to("/login?error=session").into_response());
    }
    set_sentry_user(&user.id, Some(user.email.as_str()));
    info!(user_id = %user.id, "User logged in");

    let migrated = match CartService::new(state.pool())
        .migrate_guest_cart(user.id, &guest.cookie)
        .await
    {
        Ok(migrated) => migrated,
        Err(e) => {
            warn!(user_id = %user.id, error = %e, "Guest cart migration failed; cookie kept");
            false
        }
    };

    if migrated {
        Ok(with_cookie(
            Redirect::to("/?success=cart_synced"),
            clear_cart_cookie(),
        ))
    } else {
        Ok(Redirect::to("/").into_response())
    }
}

/// Log out and return to the login page.
#[instrument(skip_all)]
pub async fn logout(RequireAuth(user): RequireAuth, session: Session) -> Result<Redirect> {
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session flush failed: {e}")))?;
    clear_sentry_user();
    info!(user_id = %user.id, "User logged out");
    Ok(Redirect::to("/login"))
}

// =============================================================================
// Registration Routes
// =============================================================================

/// Display the registration page.
pub async fn register_page(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
) -> Result<Response> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }
    let page = Page::load(&state, None, &guest).await?;
    Ok(RegisterTemplate {
        page,
        error: None,
        name: String::new(),
        email: String::new(),
        phone: String::new(),
    }
    .into_response())
}

/// Handle registration form submission.
///
/// Input problems re-render the form with the reason; the account is created
/// unconfirmed and a confirmation link is emailed.
#[instrument(skip_all)]
pub async fn register(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
    Form(form): Form<RegisterForm>,
) -> Result<Response> {
    if user.is_some() {
        return Ok(Redirect::to("/").into_response());
    }

    let result = AuthService::new(state.pool())
        .register(Registration {
            name: &form.name,
            email: &form.email,
            password: &form.password,
            phone: &form.phone,
        })
        .await;

    let (status, message) = match result {
        Ok(user) => {
            info!(user_id = %user.id, "User registered");
            send_confirmation(&state, &user.email, &user.name).await;
            return Ok(Redirect::to("/login?success=registered").into_response());
        }
        Err(AuthError::UserAlreadyExists) => (
            StatusCode::CONFLICT,
            "An account with this email already exists.".to_owned(),
        ),
        Err(AuthError::InvalidEmail(_)) => {
            (StatusCode::BAD_REQUEST, "Invalid email address.".to_owned())
        }
        Err(e @ (AuthError::WeakPassword(_) | AuthError::MissingField(_))) => {
            (StatusCode::BAD_REQUEST, e.to_string())
        }
        Err(e) => return Err(e.into()),
    };

    let page = Page::load(&state, None, &guest).await?;
    Ok((
        status,
        RegisterTemplate {
            page,
            error: Some(message),
            name: form.name,
            email: form.email,
            phone: form.phone,
        },
    )
        .into_response())
}

// =============================================================================
// Email Confirmation Routes
// =============================================================================

/// Confirm an email address from the emailed link.
#[instrument(skip_all)]
pub async fn confirm(State(state): State<AppState>, Path(token): Path<String>) -> Result<Redirect> {
    let secret = state.config().session_secret.expose_secret();
    let email = match confirmation::verify(secret.as_bytes(), &token, Utc::now()) {
        Ok(email) => email,
        Err(e) => {
            info!(reason = %e, "Rejected confirmation token");
            return Ok(Redirect::to("/login?error=confirm_invalid"));
        }
    };

    let target = match UserRepository::new(state.pool()).confirm_email(&email).await {
        Ok(Confirmation::Confirmed) => {
            info!("Email confirmed");
            "/login?success=confirmed"
        }
        Ok(Confirmation::AlreadyConfirmed) => "/login?success=already_confirmed",
        Err(RepositoryError::NotFound) => "/login?error=confirm_invalid",
        Err(e) => return Err(e.into()),
    };
    Ok(Redirect::to(target))
}

/// Send a new confirmation link, then log out.
#[instrument(skip_all)]
pub async fn resend(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    session: Session,
) -> Result<Redirect> {
    send_confirmation(&state, &user.email, &user.name).await;
    clear_current_user(&session)
        .await
        .map_err(|e| AppError::Internal(format!("session flush failed: {e}")))?;
    clear_sentry_user();
    Ok(Redirect::to("/login?success=confirmation_sent"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Arc;

    use axum::http::header;
    use tower::ServiceExt;
    use tower_sessions::{MemoryStore, SessionManagerLayer};

    use super::*;
    use crate::routes::tests::{empty, request};
    use crate::services::mail::tests::RecordingMailer;
    use crate::state::tests::test_state;

    fn app(mailer: Arc<RecordingMailer>) -> axum::Router {
        let state = test_state(mailer);
        crate::routes::routes(&state)
            .layer(SessionManagerLayer::new(MemoryStore::default()))
            .with_state(state)
    }

    fn form_post(uri: &str, body: &'static str) -> axum::http::Request<axum::body::Body> {
        request("POST", uri)
            .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
            .body(axum::body::Body::from(body))
            .unwrap()
    }

    fn location(response: &Response) -> &str {
        response.headers()[header::LOCATION].to_str().unwrap()
    }

    #[tokio::test]
    async fn test_login_with_malformed_email_is_rejected_without_lookup() {
        let response = app(Arc::default())
            .oneshot(form_post("/login", "email=not-an-email&password=whatever"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?error=credentials");
    }

    #[tokio::test]
    async fn test_register_short_password_rerenders_form() {
        let mailer = Arc::new(RecordingMailer::default());
        let response = app(mailer.clone())
            .oneshot(form_post(
                "/register",
                "name=Ada&email=ada%40example.com&password=short&phone=0102030405",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let html = String::from_utf8(body.to_vec()).unwrap();
        assert!(html.contains("at least 8 characters"));
        assert!(html.contains("ada@example.com"));
        assert!(mailer.sent.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_register_invalid_email_rerenders_form() {
        let response = app(Arc::default())
            .oneshot(form_post(
                "/register",
                "name=Ada&email=nope&password=longenough1&phone=",
            ))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_confirm_with_forged_token_redirects() {
        let response = app(Arc::default())
            .oneshot(request("GET", "/confirm/abc.123.deadbeef").body(empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login?error=confirm_invalid");
    }

    #[tokio::test]
    async fn test_logout_requires_login() {
        let response = app(Arc::default())
            .oneshot(request("GET", "/logout").body(empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::SEE_OTHER);
        assert_eq!(location(&response), "/login");
    }

    #[tokio::test]
    async fn test_login_page_renders_notice() {
        let response = app(Arc::default())
            .oneshot(
                request("GET", "/login?success=registered")
                    .body(empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        assert!(String::from_utf8_lossy(&body).contains("Thanks for registering"));
    }
}
