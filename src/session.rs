//! Session grant carried inside every token.

use serde::{Deserialize, Serialize};

use crate::codec::RegisteredClaims;

/// `sub` of tokens handed to clients for authentication.
pub const SUBJECT_AUTH_TOKEN: &str = "auth_token";

/// One authenticated principal's session.
///
/// Everything except `id` and `expired_at` is opaque to [`crate::Authed`]
/// and only carried along.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Session {
    pub os_name: String,
    pub os_arch: String,
    pub client_name: String,
    pub username: String,
    pub nickname: String,
    /// Session ID, generated on issuance when empty.
    pub id: String,
    /// User ID.
    pub uid: String,
    /// Unix timestamp in seconds.
    pub expired_at: i64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub scopes: Vec<String>,
    #[serde(skip_serializing_if = "serde_json::Map::is_empty")]
    pub extends: serde_json::Map<String, serde_json::Value>,
    #[serde(skip)]
    token: String,
}

impl Session {
    /// Create a new [`Session`] with a known ID.
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            ..Default::default()
        }
    }

    pub fn id_as_i64(&self) -> Option<i64> {
        self.id.parse().ok()
    }

    pub fn uid_as_i64(&self) -> Option<i64> {
        self.uid.parse().ok()
    }

    /// Raw token this session was read from, empty unless verified.
    pub fn token(&self) -> &str {
        &self.token
    }

    pub(crate) fn attach_token(&mut self, token: &str) {
        self.token = token.to_owned();
    }
}

/// Signed envelope, session fields and registered claims side by side in a
/// single JSON object.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    #[serde(flatten)]
    pub session: Session,
    #[serde(flatten)]
    pub registered: RegisteredClaims,
}

impl Claims {
    /// Wrap a session, `jti` mirrors its ID.
    pub fn new(session: Session) -> Self {
        let registered = RegisteredClaims {
            jti: session.id.clone(),
            ..Default::default()
        };

        Self {
            session,
            registered,
        }
    }

    /// Move the expiration of both the claims and the session.
    pub fn set_expired(&mut self, at: i64) {
        self.session.expired_at = at;
        self.registered.exp = Some(at);
    }

    pub fn jwt_id(&self) -> &str {
        &self.registered.jti
    }

    pub fn expiration(&self) -> Option<i64> {
        self.registered.exp
    }

    /// Raw token, see [`Session::token`].
    pub fn token(&self) -> &str {
        self.session.token()
    }
}
