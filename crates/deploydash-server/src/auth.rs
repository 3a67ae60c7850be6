use axum::{
    extract::{Request, State},
    http::{header, HeaderMap, StatusCode},
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use deploydash_core::config::{CookieConfig, Credential};
use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::state::AppState;

type HmacSha256 = Hmac<Sha256>;

/// Lifetime of a session whose config asks for no persistent cookie.
const BROWSER_SESSION_HOURS: i64 = 12;

/// The logged-in user, inserted into request extensions by [`require_login`].
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub username: String,
}

// ---------------------------------------------------------------------------
// Session tokens
// ---------------------------------------------------------------------------
//
// Token layout: `<base64url(username)>.<expires unix secs>.<base64url(hmac)>`
// where the HMAC-SHA256 (keyed with `cookie.key`) covers the first two parts.

fn mac(key: &str) -> HmacSha256 {
    HmacSha256::new_from_slice(key.as_bytes()).expect("infallible: HMAC accepts keys of any length")
}

fn session_length(cookie: &CookieConfig) -> Duration {
    if cookie.expiry_days == 0 {
        Duration::hours(BROWSER_SESSION_HOURS)
    } else {
        Duration::days(i64::from(cookie.expiry_days))
    }
}

/// Issue a signed session token for `username`.
pub fn issue_token(cookie: &CookieConfig, username: &str, now: DateTime<Utc>) -> String {
    let expires = (now + session_length(cookie)).timestamp();
    let payload = format!("{}.{expires}", URL_SAFE_NO_PAD.encode(username));
    let mut mac = mac(&cookie.key);
    mac.update(payload.as_bytes());
    let sig = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());
    format!("{payload}.{sig}")
}

/// Return the username a token was issued for, if its signature is valid and
/// it has not expired.
pub fn verify_token(cookie: &CookieConfig, token: &str, now: DateTime<Utc>) -> Option<String> {
    let (payload, sig) = token.rsplit_once('.')?;
    let sig = URL_SAFE_NO_PAD.decode(sig).ok()?;
    let mut mac = mac(&cookie.key);
    mac.update(payload.as_bytes());
    mac.verify_slice(&sig).ok()?;

    let (user, expires) = payload.split_once('.')?;
    let expires: i64 = expires.parse().ok()?;
    if now.timestamp() >= expires {
        return None;
    }
    let user = URL_SAFE_NO_PAD.decode(user).ok()?;
    String::from_utf8(user).ok()
}

/// `Set-Cookie` value that stores `token`.
pub fn session_cookie(cookie: &CookieConfig, token: &str) -> String {
    let mut value = format!("{}={token}; HttpOnly; SameSite=Lax; Path=/", cookie.name);
    if cookie.expiry_days > 0 {
        value.push_str(&format!(
            "; Max-Age={}",
            session_length(cookie).num_seconds()
        ));
    }
    value
}

/// `Set-Cookie` value that removes the session cookie.
pub fn clear_cookie(cookie: &CookieConfig) -> String {
    format!("{}=; HttpOnly; SameSite=Lax; Path=/; Max-Age=0", cookie.name)
}

/// Value of the cookie `name` from the request headers.
pub fn cookie_value<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|cookies| cookies.split(';'))
        .find_map(|part| {
            let (k, v) = part.trim().split_once('=')?;
            (k == name).then_some(v)
        })
}

/// Username of the valid session carried by `headers`, if any. Sessions for
/// users no longer in the config are rejected.
pub fn session_user(app: &AppState, headers: &HeaderMap) -> Option<String> {
    let token = cookie_value(headers, &app.auth.cookie.name)?;
    let username = verify_token(&app.auth.cookie, token, Utc::now())?;
    app.auth.credential(&username).map(|_| username)
}

/// Check a password against the stored bcrypt hash. CPU-heavy; call from a
/// blocking task.
pub fn verify_password(credential: &Credential, password: &str) -> bool {
    match bcrypt::verify(password, &credential.password) {
        Ok(ok) => ok,
        Err(e) => {
            tracing::warn!(error = %e, "stored password hash is not a valid bcrypt hash");
            false
        }
    }
}

// ---------------------------------------------------------------------------
// Middleware
// ---------------------------------------------------------------------------

/// Gate every wrapped route behind a valid session cookie.
///
/// Unauthenticated requests get a JSON 401 under `/api/` and a redirect to
/// the login page everywhere else.
pub async fn require_login(State(app): State<AppState>, mut req: Request, next: Next) -> Response {
    if let Some(username) = session_user(&app, req.headers()) {
        req.extensions_mut().insert(CurrentUser { username });
        return next.run(req).await;
    }

    if req.uri().path().starts_with("/api/") {
        (
            StatusCode::UNAUTHORIZED,
            axum::Json(serde_json::json!({ "error": "unauthorized" })),
        )
            .into_response()
    } else {
        Redirect::to("/login").into_response()
    }
}
