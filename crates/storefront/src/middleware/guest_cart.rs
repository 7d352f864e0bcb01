//! Guest cart cookie and local-storage snapshot.
//!
//! Visitors who are not logged in keep their cart in a `cart` cookie holding
//! percent-encoded JSON. The browser mirrors it in local storage and sends
//! that copy back in the `X-Cart-LocalStorage` header (or the
//! `cart_localstorage` query parameter for plain links). Reconciliation rules
//! live in [`fnuc_core::cart`]; this module only moves bytes in and out of
//! HTTP.

use axum::{
    extract::FromRequestParts,
    http::{
        HeaderMap, HeaderValue,
        header::{COOKIE, SET_COOKIE},
        request::Parts,
    },
    response::{IntoResponse, Response},
};
use tower_sessions::cookie::{Cookie, time::Duration};

use fnuc_core::GuestCart;

/// Name of the guest cart cookie.
pub const CART_COOKIE_NAME: &str = "cart";

/// Header carrying the local-storage snapshot.
pub const LOCAL_STORAGE_HEADER: &str = "x-cart-localstorage";

/// Query parameter carrying the local-storage snapshot.
pub const LOCAL_STORAGE_PARAM: &str = "cart_localstorage";

/// Lifetime of the cart cookie, in days.
const CART_COOKIE_DAYS: i64 = 30;

/// The guest cart as sent by the browser.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuestCartInput {
    /// Contents of the `cart` cookie.
    pub cookie: GuestCart,
    /// Local-storage snapshot, empty when none was sent.
    pub local: GuestCart,
}

impl GuestCartInput {
    /// The cart to display: the cookie when non-empty, else the snapshot.
    #[must_use]
    pub fn combined(&self) -> GuestCart {
        GuestCart::combined(self.cookie.clone(), self.local.clone())
    }

    /// The cart to store after `change`: the change applies to the cookie
    /// mapping, and the snapshot is merged in afterwards.
    #[must_use]
    pub fn write_back(&self, change: impl FnOnce(&mut GuestCart)) -> GuestCart {
        let mut cart = self.cookie.clone();
        change(&mut cart);
        cart.with_local_snapshot(&self.local)
    }

    /// Read both sources from request headers and the query string.
    #[must_use]
    pub fn from_request(headers: &HeaderMap, query: Option<&str>) -> Self {
        Self {
            cookie: read_cookie(headers),
            local: read_snapshot(headers, query),
        }
    }
}

impl<S> FromRequestParts<S> for GuestCartInput
where
    S: Send + Sync,
{
    type Rejection = std::convert::Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(Self::from_request(&parts.headers, parts.uri.query()))
    }
}

fn read_cookie(headers: &HeaderMap) -> GuestCart {
    let raw = headers
        .get_all(COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(Cookie::split_parse)
        .filter_map(Result::ok)
        .find(|cookie| cookie.name() == CART_COOKIE_NAME)
        .map(|cookie| cookie.value().to_owned());

    raw.map_or_else(GuestCart::new, |value| parse_cookie_value(&value))
}

/// Percent-encoded JSON, or raw JSON from older clients.
fn parse_cookie_value(value: &str) -> GuestCart {
    match urlencoding::decode(value) {
        Ok(decoded) => GuestCart::parse_lenient(&decoded),
        Err(_) => GuestCart::parse_lenient(value),
    }
}

fn read_snapshot(headers: &HeaderMap, query: Option<&str>) -> GuestCart {
    if let Some(header) = headers
        .get(LOCAL_STORAGE_HEADER)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty())
    {
        return GuestCart::parse_lenient(header);
    }

    query
        .and_then(|q| {
            url::form_urlencoded::parse(q.as_bytes())
                .find(|(key, _)| key == LOCAL_STORAGE_PARAM)
                .map(|(_, value)| GuestCart::parse_lenient(&value))
        })
        .unwrap_or_default()
}

/// `Set-Cookie` value storing `cart`.
///
/// Returns `None` (after logging) if the header cannot be built; the caller
/// carries on without updating the cookie.
#[must_use]
pub fn cart_cookie(cart: &GuestCart) -> Option<HeaderValue> {
    let cookie = Cookie::build((CART_COOKIE_NAME, urlencoding::encode(&cart.to_json()).into_owned()))
        .path("/")
        .http_only(true)
        .max_age(Duration::days(CART_COOKIE_DAYS))
        .build();
    to_header(&cookie)
}

/// `Set-Cookie` value deleting the cart cookie.
#[must_use]
pub fn clear_cart_cookie() -> Option<HeaderValue> {
    let cookie = Cookie::build((CART_COOKIE_NAME, ""))
        .path("/")
        .http_only(true)
        .max_age(Duration::ZERO)
        .build();
    to_header(&cookie)
}

fn to_header(cookie: &Cookie<'_>) -> Option<HeaderValue> {
    match HeaderValue::from_str(&cookie.to_string()) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(error = %e, "Could not build cart cookie header");
            None
        }
    }
}

/// Attach a cart `Set-Cookie` header to any response.
pub fn with_cookie(response: impl IntoResponse, cookie: Option<HeaderValue>) -> Response {
    let mut response = response.into_response();
    if let Some(value) = cookie {
        response.headers_mut().append(SET_COOKIE, value);
    }
    response
}
