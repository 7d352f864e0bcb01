//! Stripe Checkout: session creation and the return pages.

use askama::Template;
use askama_web::WebTemplate;
use axum::{
    extract::State,
    response::{IntoResponse, Redirect, Response},
};
use tracing::{error, info, instrument};

use super::Page;
use crate::db::CartRepository;
use crate::error::Result;
use crate::filters;
use crate::middleware::{GuestCartInput, OptionalAuth, RequireAuth};
use crate::state::AppState;

/// Shown after a successful payment.
#[derive(Template, WebTemplate)]
#[template(path = "payment_success.html")]
pub struct PaymentSuccessTemplate {
    pub page: Page,
}

/// Shown after a cancelled or failed payment.
#[derive(Template, WebTemplate)]
#[template(path = "payment_failure.html")]
pub struct PaymentFailureTemplate {
    pub page: Page,
}

/// Start a Stripe Checkout Session for the user's cart and redirect to it.
#[instrument(skip_all, fields(user_id = %user.id))]
pub async fn create_session(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
) -> Result<Response> {
    let Some(stripe) = state.stripe() else {
        return Ok(Redirect::to("/payment/failure?error=payments_disabled").into_response());
    };

    let lines = CartRepository::new(state.pool()).lines(user.id).await?;
    if lines.is_empty() {
        return Ok(Redirect::to("/cart").into_response());
    }

    match stripe
        .create_checkout_session(user.id, &lines, &state.config().base_url)
        .await
    {
        Ok(session) => {
            info!(session_id = %session.id, lines = lines.len(), "Checkout session created");
            Ok(Redirect::to(&session.url).into_response())
        }
        Err(e) => {
            error!(error = %e, "Failed to create checkout session");
            Ok(Redirect::to("/payment/failure").into_response())
        }
    }
}

/// Payment success page.
pub async fn success(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
) -> Result<PaymentSuccessTemplate> {
    let page = Page::load(&state, user, &guest).await?;
    Ok(PaymentSuccessTemplate { page })
}

/// Payment failure page.
pub async fn failure(
    State(state): State<AppState>,
    OptionalAuth(user): OptionalAuth,
    guest: GuestCartInput,
    axum::extract::Query(query): axum::extract::Query<super::MessageQuery>,
) -> Result<PaymentFailureTemplate> {
    let page = Page::load(&state, user, &guest).await?.with_notice(&query);
    Ok(PaymentFailureTemplate { page })
}
