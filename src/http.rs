//! HTTP glue: reading the session token from a request and setting it back
//! as a cookie.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::{FromRef, FromRequestParts, OptionalFromRequestParts};
use axum::http::request::Parts;
use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use percent_encoding::{
    AsciiSet, NON_ALPHANUMERIC, percent_decode_str, utf8_percent_encode,
};

use crate::authed::Authed;
use crate::error::AuthError;
use crate::session::Session;

const BEARER: &str = "Bearer ";
const BASIC: &str = "Basic ";
const HTTP_DATE: &str = "%a, %d %b %Y %H:%M:%S GMT";

/// Characters left as is by `application/x-www-form-urlencoded` escaping.
const QUERY: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// Read the candidate token of a request.
///
/// The `Authorization` header wins over the cookie. Basic authentication
/// never carries a session.
pub fn extract_token(headers: &HeaderMap, cookie_name: &str) -> Option<String> {
    let authorization = headers
        .get(header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())
        .unwrap_or_default();
    if authorization.starts_with(BASIC) {
        return None;
    }

    let token = authorization
        .strip_prefix(BEARER)
        .unwrap_or(authorization)
        .trim();
    if !token.is_empty() {
        return Some(token.to_owned());
    }

    cookie_value(headers, cookie_name).filter(|value| !value.is_empty())
}

/// Value of the cookie `name`, percent-decoded.
pub fn cookie_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|header| header.to_str().ok())
        .flat_map(|header| header.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .and_then(|(_, value)| {
            percent_decode_str(value.trim_matches('"'))
                .decode_utf8()
                .ok()
                .map(|value| value.into_owned())
        })
}

/// Build a `Set-Cookie` value.
///
/// The cookie is `HttpOnly`, `SameSite=Lax` and scoped to `/`. A `max_age`
/// of zero or less expires it right away.
pub fn set_cookie(name: &str, value: &str, max_age: i64, now: i64) -> String {
    let (max_age, expires) = if max_age > 0 {
        let expires = DateTime::<Utc>::from_timestamp(now.saturating_add(max_age), 0)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        (max_age, expires)
    } else {
        (0, DateTime::<Utc>::default())
    };

    format!(
        "{name}={}; Path=/; Expires={}; Max-Age={max_age}; HttpOnly; SameSite=Lax",
        utf8_percent_encode(value, QUERY),
        expires.format(HTTP_DATE),
    )
}

impl Authed {
    /// Session of the request, `None` when it has none or an invalid one.
    pub fn session_from_headers(&self, headers: &HeaderMap) -> Option<Session> {
        let token = extract_token(headers, self.cookie_name())?;
        self.verify_token(&token).ok().map(|claims| claims.session)
    }

    /// `Set-Cookie` value carrying `token` for the token duration.
    pub fn token_cookie(&self, token: &str) -> String {
        set_cookie(
            self.cookie_name(),
            token,
            i64::try_from(self.token_duration().as_secs()).unwrap_or(i64::MAX),
            self.now(),
        )
    }

    /// `Set-Cookie` value removing the token cookie.
    pub fn expired_cookie(&self) -> String {
        set_cookie(self.cookie_name(), "", 0, self.now())
    }
}

impl<S> FromRequestParts<S> for Session
where
    Arc<Authed>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Self, Self::Rejection> {
        let authed = Arc::<Authed>::from_ref(state);
        let token = extract_token(&parts.headers, authed.cookie_name())
            .ok_or(AuthError::InvalidSession)?;

        Ok(authed.verify_token(&token)?.session)
    }
}

impl<S> OptionalFromRequestParts<S> for Session
where
    Arc<Authed>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &S,
    ) -> Result<Option<Self>, Self::Rejection> {
        let authed = Arc::<Authed>::from_ref(state);
        Ok(authed.session_from_headers(&parts.headers))
    }
}
