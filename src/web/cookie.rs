//! Browser-session cookie
//!
//! Every request gets a [`BrowserSessionId`] extension. A request without a
//! valid cookie gets a fresh id, and the response sets the cookie.

use crate::session::BrowserSessionId;
use axum::extract::Request;
use axum::http::{header, HeaderMap, HeaderValue};
use axum::middleware::Next;
use axum::response::Response;
use tracing::{debug, warn};

/// Cookie carrying the browser-session id
pub const SESSION_COOKIE: &str = "tgfav_session";

/// Read the browser-session id from the `Cookie` headers
#[must_use]
pub fn browser_session_from_headers(headers: &HeaderMap) -> Option<BrowserSessionId> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(name, _)| *name == SESSION_COOKIE)
        .and_then(|(_, value)| BrowserSessionId::parse(value.trim()).ok())
}

/// `Set-Cookie` value for `id`; no expiry, so it lives as long as the browser session
#[must_use]
pub fn session_cookie(id: &BrowserSessionId) -> String {
    format!("{SESSION_COOKIE}={id}; Path=/; HttpOnly; SameSite=Lax")
}

/// Middleware attaching the browser-session id to every request
pub async fn browser_session(mut request: Request, next: Next) -> Response {
    let (id, fresh) = match browser_session_from_headers(request.headers()) {
        Some(id) => (id, false),
        None => (BrowserSessionId::generate(), true),
    };
    request.extensions_mut().insert(id.clone());

    let mut response = next.run(request).await;
    if fresh {
        debug!(browser_session = %id, "Issued browser session cookie");
        match HeaderValue::from_str(&session_cookie(&id)) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(err) => warn!(error = %err, "Could not encode session cookie"),
        }
    }
    response
}
