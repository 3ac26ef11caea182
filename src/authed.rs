//! Session token manager.
//!
//! Every issued session owns three store entries:
//!
//! - `{name}/authed/token/{session id}`: the current token, kept until the
//!   token expires.
//! - `{name}/authed/refreshtoken/{refresh id}`: the token a refresh id
//!   rotates, kept for the refresh duration.
//! - `{name}/authed/linktk/{session id}`: the current refresh id of the
//!   session, kept for the refresh duration.
//!
//! The three writes are independent. A store failure in between leaves the
//! entries already written in place.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};
use zeroize::Zeroizing;

use crate::clock::{Clock, SystemClock};
use crate::codec::{
    Audience, CryptoCodec, JsonCodec, JwtCodec, ObjectCodec, RegisteredClaims,
};
use crate::config::Configuration;
use crate::error::{AuthError, Result};
use crate::id;
use crate::session::{Claims, SUBJECT_AUTH_TOKEN, Session};
use crate::store::{Cache, MemoryCache};

pub const DEFAULT_ISSUER: &str = "authed";
pub const DEFAULT_AUDIENCE: &[&str] = &["app"];
pub const DEFAULT_COOKIE_NAME: &str = "authed";
pub const DEFAULT_TOKEN_DURATION: Duration = Duration::from_secs(60 * 60 * 2); // 2 hours.
pub const DEFAULT_REFRESH_TOKEN_DURATION: Duration =
    Duration::from_secs(60 * 60 * 24 * 7); // 7 days.

/// `now` plus `duration`, saturating at `i64::MAX`.
fn expires_at(now: i64, duration: Duration) -> i64 {
    now.saturating_add(i64::try_from(duration.as_secs()).unwrap_or(i64::MAX))
}

/// What happens to a refresh id once it has been redeemed.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum RefreshPolicy {
    /// The redeemed id stays valid until its own TTL lapses.
    #[default]
    Retain,
    /// The redeemed id is deleted once the new pair is stored. A failed
    /// delete is logged and the new pair is still returned, so the old id
    /// may stay redeemable until its TTL lapses.
    Revoke,
}

/// Token handed to the client along with its refresh id.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TokenPair {
    pub token: String,
    pub refresh_token: String,
}

/// Issues, verifies, refreshes and revokes session tokens.
pub struct Authed {
    issuer: String,
    audience: Vec<String>,
    token_duration: Duration,
    refresh_token_duration: Duration,
    multi_session: bool,
    refresh_policy: RefreshPolicy,
    cookie_name: String,
    signing_key: Zeroizing<Vec<u8>>,
    crypto_codec: Box<dyn CryptoCodec>,
    object_codec: Box<dyn ObjectCodec>,
    store: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
}

impl fmt::Debug for Authed {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Authed")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("token_duration", &self.token_duration)
            .field("refresh_token_duration", &self.refresh_token_duration)
            .field("multi_session", &self.multi_session)
            .field("refresh_policy", &self.refresh_policy)
            .field("cookie_name", &self.cookie_name)
            .finish_non_exhaustive()
    }
}

/// Value is missing on [`AuthedBuilder`].
#[derive(Debug, Clone)]
pub struct Missing;

/// Value is present on [`AuthedBuilder`].
#[derive(Debug, Clone)]
pub struct Present<T>(pub T);

/// [`Authed`] builder, the signing key is mandatory.
pub struct AuthedBuilder<Key> {
    signing_key: Key,
    issuer: String,
    audience: Vec<String>,
    token_duration: Duration,
    refresh_token_duration: Duration,
    multi_session: bool,
    refresh_policy: RefreshPolicy,
    cookie_name: String,
    crypto_codec: Option<Box<dyn CryptoCodec>>,
    object_codec: Box<dyn ObjectCodec>,
    store: Arc<dyn Cache>,
    clock: Arc<dyn Clock>,
}

impl AuthedBuilder<Missing> {
    /// Create a new [`AuthedBuilder`].
    pub fn new() -> Self {
        Self {
            signing_key: Missing,
            issuer: DEFAULT_ISSUER.to_owned(),
            audience: DEFAULT_AUDIENCE.iter().map(|a| a.to_string()).collect(),
            token_duration: DEFAULT_TOKEN_DURATION,
            refresh_token_duration: DEFAULT_REFRESH_TOKEN_DURATION,
            multi_session: false,
            refresh_policy: RefreshPolicy::default(),
            cookie_name: DEFAULT_COOKIE_NAME.to_owned(),
            crypto_codec: None,
            object_codec: Box::new(JsonCodec),
            store: Arc::new(MemoryCache::new()),
            clock: Arc::new(SystemClock),
        }
    }

    /// Key every token is sealed with.
    pub fn signing_key(
        self,
        key: impl AsRef<[u8]>,
    ) -> AuthedBuilder<Present<Zeroizing<Vec<u8>>>> {
        AuthedBuilder {
            signing_key: Present(Zeroizing::new(key.as_ref().to_vec())),
            issuer: self.issuer,
            audience: self.audience,
            token_duration: self.token_duration,
            refresh_token_duration: self.refresh_token_duration,
            multi_session: self.multi_session,
            refresh_policy: self.refresh_policy,
            cookie_name: self.cookie_name,
            crypto_codec: self.crypto_codec,
            object_codec: self.object_codec,
            store: self.store,
            clock: self.clock,
        }
    }
}

impl Default for AuthedBuilder<Missing> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Key> AuthedBuilder<Key> {
    pub fn issuer(mut self, issuer: impl Into<String>) -> Self {
        self.issuer = issuer.into();
        self
    }

    pub fn audience<I, S>(mut self, audience: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.audience = audience.into_iter().map(Into::into).collect();
        self
    }

    pub fn token_duration(mut self, duration: Duration) -> Self {
        self.token_duration = duration;
        self
    }

    pub fn refresh_token_duration(mut self, duration: Duration) -> Self {
        self.refresh_token_duration = duration;
        self
    }

    /// Accept every valid token of a session instead of only the latest.
    pub fn multi_session(mut self, enabled: bool) -> Self {
        self.multi_session = enabled;
        self
    }

    pub fn refresh_policy(mut self, policy: RefreshPolicy) -> Self {
        self.refresh_policy = policy;
        self
    }

    /// Cookie name, also the prefix of every store key.
    pub fn cookie_name(mut self, name: impl Into<String>) -> Self {
        self.cookie_name = name.into();
        self
    }

    /// Replace the default HS256 [`JwtCodec`].
    pub fn crypto_codec(mut self, codec: Box<dyn CryptoCodec>) -> Self {
        self.crypto_codec = Some(codec);
        self
    }

    /// Replace the default [`JsonCodec`].
    pub fn object_codec(mut self, codec: Box<dyn ObjectCodec>) -> Self {
        self.object_codec = codec;
        self
    }

    /// Replace the default [`MemoryCache`].
    pub fn store(mut self, store: Arc<dyn Cache>) -> Self {
        self.store = store;
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }
}

impl AuthedBuilder<Present<Zeroizing<Vec<u8>>>> {
    /// Build the [`Authed`] manager.
    pub fn build(self) -> Result<Authed> {
        let Present(signing_key) = self.signing_key;
        if signing_key.is_empty() {
            return Err(AuthError::MissingSigningKey);
        }

        Ok(Authed {
            issuer: self.issuer,
            audience: self.audience,
            token_duration: self.token_duration,
            refresh_token_duration: self.refresh_token_duration,
            multi_session: self.multi_session,
            refresh_policy: self.refresh_policy,
            cookie_name: self.cookie_name,
            signing_key,
            crypto_codec: self
                .crypto_codec
                .unwrap_or_else(|| Box::new(JwtCodec::default())),
            object_codec: self.object_codec,
            store: self.store,
            clock: self.clock,
        })
    }
}

impl Authed {
    pub fn builder() -> AuthedBuilder<Missing> {
        AuthedBuilder::new()
    }

    /// Create an [`Authed`] from a [`Configuration`] file.
    ///
    /// The signing key is not part of the file.
    pub fn from_config(
        config: &Configuration,
        signing_key: impl AsRef<[u8]>,
        store: Arc<dyn Cache>,
    ) -> Result<Self> {
        Self::builder()
            .signing_key(signing_key)
            .issuer(&config.issuer)
            .audience(config.audience.iter().cloned())
            .token_duration(config.token_duration())
            .refresh_token_duration(config.refresh_token_duration())
            .multi_session(config.multi_session)
            .refresh_policy(config.refresh_policy)
            .cookie_name(&config.name)
            .crypto_codec(config.codec.build()?)
            .store(store)
            .build()
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    pub fn token_duration(&self) -> Duration {
        self.token_duration
    }

    pub fn refresh_token_duration(&self) -> Duration {
        self.refresh_token_duration
    }

    pub(crate) fn now(&self) -> i64 {
        self.clock.now()
    }

    pub fn format_token_store_key(&self, session_id: &str) -> String {
        format!("{}/authed/token/{session_id}", self.cookie_name)
    }

    pub fn format_refresh_token_store_key(&self, refresh_id: &str) -> String {
        format!("{}/authed/refreshtoken/{refresh_id}", self.cookie_name)
    }

    pub fn format_link_token_store_key(&self, session_id: &str) -> String {
        format!("{}/authed/linktk/{session_id}", self.cookie_name)
    }

    /// Wrap `session` into fresh claims.
    ///
    /// An empty session ID is generated and a zero expiry is set to now plus
    /// `duration`. A preset expiry is kept as is.
    pub fn new_claims(
        &self,
        subject: &str,
        mut session: Session,
        duration: Duration,
    ) -> Claims {
        let now = self.clock.now();
        if session.expired_at == 0 {
            session.expired_at = expires_at(now, duration);
        }
        if session.id.is_empty() {
            session.id = id::number_id();
        }

        let registered = RegisteredClaims {
            iss: self.issuer.clone(),
            sub: subject.to_owned(),
            aud: Audience(self.audience.clone()),
            exp: Some(session.expired_at),
            nbf: Some(now),
            iat: Some(now),
            jti: session.id.clone(),
        };

        Claims {
            session,
            registered,
        }
    }

    /// Issue a token and a refresh id for `session`.
    ///
    /// Any token issued before for the same session ID stops verifying
    /// unless multi-session mode is enabled.
    pub fn create_token(&self, session: Session) -> Result<TokenPair> {
        let claims =
            self.new_claims(SUBJECT_AUTH_TOKEN, session, self.token_duration);
        self.issue(&claims)
    }

    /// Seal `claims` and store the three session entries.
    fn issue(&self, claims: &Claims) -> Result<TokenPair> {
        let session_id = claims.jwt_id();
        if session_id.is_empty() {
            return Err(AuthError::InvalidPayload);
        }
        let expiration =
            claims.expiration().ok_or(AuthError::InvalidPayload)?;

        let plaintext = self.object_codec.encode(claims)?;
        let token = String::from_utf8(
            self.crypto_codec.encode(&self.signing_key, &plaintext)?,
        )?;
        let refresh_token = id::uuid();

        let ttl = expiration.saturating_sub(self.clock.now()).max(0) as u64;
        self.store.set_with_ttl(
            &self.format_token_store_key(session_id),
            &token,
            Duration::from_secs(ttl),
        )?;
        self.store.set_with_ttl(
            &self.format_refresh_token_store_key(&refresh_token),
            &token,
            self.refresh_token_duration,
        )?;
        self.store.set_with_ttl(
            &self.format_link_token_store_key(session_id),
            &refresh_token,
            self.refresh_token_duration,
        )?;

        tracing::debug!(session_id, expiration, "token issued");
        Ok(TokenPair {
            token,
            refresh_token,
        })
    }

    /// Open `token` and return its claims.
    ///
    /// The raw token is attached to the returned session.
    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        if token.is_empty() {
            return Err(AuthError::InvalidToken);
        }

        let plaintext = self
            .crypto_codec
            .decode(&self.signing_key, token.as_bytes())?;
        let mut claims = self.object_codec.decode(&plaintext)?;
        claims.session.attach_token(token);

        if claims
            .expiration()
            .is_some_and(|exp| exp <= self.clock.now())
        {
            return Err(AuthError::TokenExpired);
        }

        if self.multi_session {
            return Ok(claims);
        }

        let current = self
            .store
            .get(&self.format_token_store_key(claims.jwt_id()))?;
        if !constant_time_eq(&current, token.as_bytes()) {
            tracing::warn!(
                session_id = claims.jwt_id(),
                "token superseded by a newer one"
            );
            return Err(AuthError::InvalidToken);
        }

        Ok(claims)
    }

    /// Redeem a refresh id for a new pair, the token expiring `token_duration`
    /// from now.
    pub fn refresh_token(&self, refresh_token: &str) -> Result<TokenPair> {
        if refresh_token.is_empty() {
            return Err(AuthError::InvalidRefreshToken);
        }

        let refresh_key = self.format_refresh_token_store_key(refresh_token);
        let sealed = self.store.get(&refresh_key)?;
        let plaintext = self.crypto_codec.decode(&self.signing_key, &sealed)?;
        let mut claims = self.object_codec.decode(&plaintext)?;

        claims.set_expired(expires_at(self.clock.now(), self.token_duration));
        let pair = self.issue(&claims)?;

        if self.refresh_policy == RefreshPolicy::Revoke {
            if let Err(err) = self.store.del(&refresh_key) {
                tracing::warn!(
                    session_id = claims.jwt_id(),
                    error = %err,
                    "redeemed refresh token was not revoked"
                );
            }
        }

        tracing::debug!(session_id = claims.jwt_id(), "token refreshed");
        Ok(pair)
    }

    /// Revoke the current token and refresh id of a session.
    pub fn delete_token(&self, session_id: &str) -> Result<()> {
        let link_key = self.format_link_token_store_key(session_id);
        let refresh_token = String::from_utf8(self.store.get(&link_key)?)?;

        self.store
            .del(&self.format_refresh_token_store_key(&refresh_token))?;
        self.store.del(&self.format_token_store_key(session_id))?;
        self.store.del(&link_key)?;

        tracing::debug!(session_id, "session deleted");
        Ok(())
    }

    /// Revoke the current token of a session, its refresh id stays valid.
    pub fn delete_token_only(&self, session_id: &str) -> Result<()> {
        self.store.del(&self.format_token_store_key(session_id))?;

        tracing::debug!(session_id, "token deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::FixedClock;
    use crate::codec::{CodecError, CookieCodec};
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    use crate::store::StoreError;

    const KEY: &[u8] = b"0123456789abcdef0123456789abcdef";
    const NOW: i64 = 1_628_603_180;

    /// [`MemoryCache`] whose `fail_on`-th `set_with_ttl` call fails, as do
    /// deletes once `fail_deletes` is set.
    #[derive(Default)]
    struct FlakyCache {
        inner: MemoryCache,
        fail_on: usize,
        writes: AtomicUsize,
        fail_deletes: AtomicBool,
    }

    impl FlakyCache {
        fn failing_on(write: usize) -> Self {
            Self {
                fail_on: write,
                ..Default::default()
            }
        }

        fn backend_error() -> StoreError {
            StoreError::Backend("connection reset".into())
        }
    }

    impl Cache for FlakyCache {
        fn get(&self, key: &str) -> crate::store::Result<Vec<u8>> {
            self.inner.get(key)
        }

        fn set(&self, key: &str, value: &[u8]) -> crate::store::Result<()> {
            self.inner.set(key, value)
        }

        fn del(&self, key: &str) -> crate::store::Result<()> {
            if self.fail_deletes.load(Ordering::SeqCst) {
                return Err(Self::backend_error());
            }
            self.inner.del(key)
        }

        fn set_with_ttl(
            &self,
            key: &str,
            value: &str,
            ttl: Duration,
        ) -> crate::store::Result<()> {
            if self.writes.fetch_add(1, Ordering::SeqCst) + 1 == self.fail_on {
                return Err(Self::backend_error());
            }
            self.inner.set_with_ttl(key, value, ttl)
        }
    }

    fn flaky_authed(store: &Arc<FlakyCache>) -> Authed {
        Authed::builder()
            .signing_key(KEY)
            .store(store.clone())
            .clock(Arc::new(FixedClock::new(NOW)))
            .build()
            .unwrap()
    }

    fn authed() -> (Authed, Arc<MemoryCache>, Arc<FixedClock>) {
        let store = Arc::new(MemoryCache::new());
        let clock = Arc::new(FixedClock::new(NOW));
        let authed = Authed::builder()
            .signing_key(KEY)
            .store(store.clone())
            .clock(clock.clone())
            .build()
            .unwrap();

        (authed, store, clock)
    }

    #[test]
    fn test_create_and_verify() {
        let authed = Authed::builder().signing_key(KEY).build().unwrap();

        let pair = authed.create_token(Session::with_id("123")).unwrap();
        assert!(!pair.token.is_empty());
        assert!(!pair.refresh_token.is_empty());

        let claims = authed.verify_token(&pair.token).unwrap();
        assert_eq!(claims.token(), pair.token);
        assert_eq!(claims.session.token(), pair.token);
        assert_eq!(claims.session.id, "123");
        assert_eq!(claims.jwt_id(), "123");
        assert_eq!(claims.registered.iss, DEFAULT_ISSUER);
        assert_eq!(claims.registered.sub, SUBJECT_AUTH_TOKEN);
        assert!(claims.registered.aud.contains("app"));
    }

    #[test]
    fn test_new_claims_defaults() {
        let (authed, _, _) = authed();

        let claims = authed.new_claims(
            SUBJECT_AUTH_TOKEN,
            Session::default(),
            DEFAULT_TOKEN_DURATION,
        );
        assert!(claims.session.id_as_i64().is_some());
        assert_eq!(claims.jwt_id(), claims.session.id);
        assert_eq!(claims.session.expired_at, NOW + 7200);
        assert_eq!(claims.expiration(), Some(NOW + 7200));
        assert_eq!(claims.registered.iat, Some(NOW));
        assert_eq!(claims.registered.nbf, Some(NOW));

        let mut session = Session::with_id("123");
        session.expired_at = NOW + 60;
        let claims =
            authed.new_claims(SUBJECT_AUTH_TOKEN, session, DEFAULT_TOKEN_DURATION);
        assert_eq!(claims.expiration(), Some(NOW + 60));
    }

    #[test]
    fn test_store_entries() {
        let (authed, store, _) = authed();
        let pair = authed.create_token(Session::with_id("123")).unwrap();

        assert_eq!(
            store.get("authed/authed/token/123").unwrap(),
            pair.token.as_bytes()
        );
        assert_eq!(
            store
                .get(&format!("authed/authed/refreshtoken/{}", pair.refresh_token))
                .unwrap(),
            pair.token.as_bytes()
        );
        assert_eq!(
            store.get("authed/authed/linktk/123").unwrap(),
            pair.refresh_token.as_bytes()
        );
    }

    #[test]
    fn test_single_session() {
        let (authed, _, _) = authed();

        let first = authed.create_token(Session::with_id("123")).unwrap();
        let second = authed.refresh_token(&first.refresh_token).unwrap();
        assert_ne!(first.refresh_token, second.refresh_token);

        assert!(matches!(
            authed.verify_token(&first.token),
            Err(AuthError::InvalidToken)
        ));
        assert!(authed.verify_token(&second.token).is_ok());

        // A new login supersedes the refreshed token too.
        let third = authed.create_token(Session::with_id("123")).unwrap();
        assert!(authed.verify_token(&second.token).is_err());
        assert!(authed.verify_token(&third.token).is_ok());
    }

    #[test]
    fn test_multi_session() {
        let authed = Authed::builder()
            .signing_key(KEY)
            .multi_session(true)
            .clock(Arc::new(FixedClock::new(NOW)))
            .build()
            .unwrap();

        let first = authed.create_token(Session::with_id("123")).unwrap();
        let second = authed.refresh_token(&first.refresh_token).unwrap();

        assert!(authed.verify_token(&first.token).is_ok());
        assert!(authed.verify_token(&second.token).is_ok());
    }

    #[test]
    fn test_refresh_moves_expiry() {
        let (authed, _, clock) = authed();
        let pair = authed.create_token(Session::with_id("123")).unwrap();

        clock.advance(600);
        let pair = authed.refresh_token(&pair.refresh_token).unwrap();
        let claims = authed.verify_token(&pair.token).unwrap();

        assert_eq!(claims.expiration(), Some(NOW + 600 + 7200));
        assert_eq!(claims.session.expired_at, NOW + 600 + 7200);
        assert_eq!(claims.session.id, "123");
    }

    #[test]
    fn test_refresh_policy_retain() {
        let (authed, _, _) = authed();
        let first = authed.create_token(Session::with_id("123")).unwrap();

        authed.refresh_token(&first.refresh_token).unwrap();
        let again = authed.refresh_token(&first.refresh_token).unwrap();
        assert!(authed.verify_token(&again.token).is_ok());
    }

    #[test]
    fn test_refresh_policy_revoke() {
        let authed = Authed::builder()
            .signing_key(KEY)
            .refresh_policy(RefreshPolicy::Revoke)
            .build()
            .unwrap();
        let first = authed.create_token(Session::with_id("123")).unwrap();

        let second = authed.refresh_token(&first.refresh_token).unwrap();
        assert!(matches!(
            authed.refresh_token(&first.refresh_token),
            Err(AuthError::Store(StoreError::NotFound(_)))
        ));
        assert!(authed.refresh_token(&second.refresh_token).is_ok());
    }

    #[test]
    fn test_delete_token() {
        let (authed, store, _) = authed();
        let pair = authed.create_token(Session::with_id("123")).unwrap();

        authed.delete_token("123").unwrap();
        assert!(store.is_empty());

        assert!(matches!(
            authed.verify_token(&pair.token),
            Err(AuthError::Store(StoreError::NotFound(_)))
        ));
        assert!(authed.refresh_token(&pair.refresh_token).is_err());

        // Nothing left to delete.
        assert!(matches!(
            authed.delete_token("123"),
            Err(AuthError::Store(StoreError::NotFound(_)))
        ));
    }

    #[test]
    fn test_delete_token_only() {
        let (authed, _, _) = authed();
        let pair = authed.create_token(Session::with_id("123")).unwrap();

        authed.delete_token_only("123").unwrap();
        assert!(authed.verify_token(&pair.token).is_err());

        let pair = authed.refresh_token(&pair.refresh_token).unwrap();
        assert!(authed.verify_token(&pair.token).is_ok());
    }

    #[test]
    fn test_expired_token() {
        let (authed, _, clock) = authed();
        let pair = authed.create_token(Session::with_id("123")).unwrap();

        clock.advance(7199);
        assert!(authed.verify_token(&pair.token).is_ok());

        clock.advance(1);
        assert!(matches!(
            authed.verify_token(&pair.token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_empty_inputs() {
        let (authed, _, _) = authed();

        assert!(matches!(authed.verify_token(""), Err(AuthError::InvalidToken)));
        assert!(matches!(
            authed.refresh_token(""),
            Err(AuthError::InvalidRefreshToken)
        ));
    }

    #[test]
    fn test_wrong_signing_key() {
        let (authed, store, _) = authed();
        let other = Authed::builder()
            .signing_key("another key")
            .store(store)
            .build()
            .unwrap();

        let pair = authed.create_token(Session::with_id("123")).unwrap();
        assert!(matches!(
            other.verify_token(&pair.token),
            Err(AuthError::Codec(CodecError::InvalidSignature))
        ));
    }

    #[test]
    fn test_missing_signing_key() {
        assert!(matches!(
            Authed::builder().signing_key("").build(),
            Err(AuthError::MissingSigningKey)
        ));
    }

    #[test]
    fn test_cookie_codec() {
        let codec = CookieCodec::new("hash key", [7u8; 32]).unwrap();
        let authed = Authed::builder()
            .signing_key(KEY)
            .cookie_name("myapp")
            .crypto_codec(Box::new(codec))
            .build()
            .unwrap();

        let mut session = Session::with_id("42");
        session.roles = vec!["admin".into()];
        let pair = authed.create_token(session).unwrap();
        assert_eq!(pair.token.split('.').count(), 1);

        let claims = authed.verify_token(&pair.token).unwrap();
        assert_eq!(claims.session.roles, vec!["admin"]);
        assert_eq!(
            authed.format_token_store_key("42"),
            "myapp/authed/token/42"
        );

        let pair = authed.refresh_token(&pair.refresh_token).unwrap();
        assert!(authed.verify_token(&pair.token).is_ok());
    }

    #[test]
    fn test_from_config() {
        let mut config = Configuration::default();
        config.name = "myapp".into();
        config.multi_session = true;
        config.token_duration = 60;

        let authed =
            Authed::from_config(&config, KEY, Arc::new(MemoryCache::new()))
                .unwrap();

        assert_eq!(authed.cookie_name(), "myapp");
        assert_eq!(authed.token_duration(), Duration::from_secs(60));
        assert_eq!(
            authed.format_link_token_store_key("1"),
            "myapp/authed/linktk/1"
        );
    }

    #[test]
    fn test_past_expiry() {
        let (authed, store, _) = authed();

        let mut session = Session::with_id("123");
        session.expired_at = i64::MIN;
        let pair = authed.create_token(session).unwrap();

        // Nothing to keep for an already expired token.
        assert!(store.get("authed/authed/token/123").is_err());
        assert!(matches!(
            authed.verify_token(&pair.token),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn test_huge_durations() {
        let authed = Authed::builder()
            .signing_key(KEY)
            .token_duration(Duration::from_secs(u64::MAX))
            .refresh_token_duration(Duration::from_secs(u64::MAX))
            .clock(Arc::new(FixedClock::new(NOW)))
            .build()
            .unwrap();

        let pair = authed.create_token(Session::with_id("123")).unwrap();
        let claims = authed.verify_token(&pair.token).unwrap();
        assert_eq!(claims.expiration(), Some(i64::MAX));

        let pair = authed.refresh_token(&pair.refresh_token).unwrap();
        assert!(authed.verify_token(&pair.token).is_ok());
    }

    #[test]
    fn test_store_error_is_returned() {
        let store = Arc::new(FlakyCache::failing_on(1));
        let authed = flaky_authed(&store);

        let err = authed.create_token(Session::with_id("123")).unwrap_err();
        assert!(matches!(err, AuthError::Store(StoreError::Backend(_))));
        assert_eq!(err.to_string(), "connection reset");
        assert!(!err.is_unauthorized());
        assert!(store.inner.is_empty());
    }

    #[test]
    fn test_refresh_write_fails() {
        let store = Arc::new(FlakyCache::failing_on(2));
        let authed = flaky_authed(&store);

        assert!(matches!(
            authed.create_token(Session::with_id("123")),
            Err(AuthError::Store(StoreError::Backend(_)))
        ));

        // The token entry written first stays and still verifies.
        let token = store.inner.get("authed/authed/token/123").unwrap();
        let token = String::from_utf8(token).unwrap();
        assert_eq!(authed.verify_token(&token).unwrap().session.id, "123");
        assert_eq!(store.inner.len(), 1);
    }

    #[test]
    fn test_link_write_fails() {
        let store = Arc::new(FlakyCache::failing_on(3));
        let authed = flaky_authed(&store);

        assert!(matches!(
            authed.create_token(Session::with_id("123")),
            Err(AuthError::Store(StoreError::Backend(_)))
        ));
        assert_eq!(store.inner.len(), 2);
        assert!(store.inner.get("authed/authed/linktk/123").is_err());

        // Without its link, the session cannot be deleted and is left as is.
        assert!(matches!(
            authed.delete_token("123"),
            Err(AuthError::Store(StoreError::NotFound(_)))
        ));
        assert_eq!(store.inner.len(), 2);
        assert!(store.inner.get("authed/authed/token/123").is_ok());
    }

    #[test]
    fn test_revoke_failure_keeps_new_pair() {
        let store = Arc::new(FlakyCache::default());
        let authed = Authed::builder()
            .signing_key(KEY)
            .refresh_policy(RefreshPolicy::Revoke)
            .store(store.clone())
            .build()
            .unwrap();
        let first = authed.create_token(Session::with_id("123")).unwrap();

        store.fail_deletes.store(true, Ordering::SeqCst);
        let second = authed.refresh_token(&first.refresh_token).unwrap();
        assert!(authed.verify_token(&second.token).is_ok());

        // The redeemed id outlives the failed revocation.
        store.fail_deletes.store(false, Ordering::SeqCst);
        assert!(authed.refresh_token(&first.refresh_token).is_ok());
    }
}
