//! Byte-level codecs for session tokens.
//!
//! A [`CryptoCodec`] seals serialized claims with a caller supplied key and
//! opens them again, failing closed on any integrity problem. An
//! [`ObjectCodec`] turns [`Claims`](crate::session::Claims) into bytes and
//! back.

mod claims;
mod cookie;
mod jwt;
mod object;
mod verify;

pub use claims::{Audience, RegisteredClaims};
pub use cookie::CookieCodec;
pub use jwt::{Algorithm, Header, JwtCodec};
pub use object::{JsonCodec, ObjectCodec};
pub use verify::{KeyError, PublicKey, verify_es256, verify_rs256};

use crate::crypto::CryptoError;

pub type Result<T> = std::result::Result<T, CodecError>;

/// Errors raised while sealing or opening a token.
#[derive(thiserror::Error, Debug)]
pub enum CodecError {
    #[error("hash key is not set")]
    HashKeyNotSet,
    #[error("block key is not set")]
    BlockKeyNotSet,
    #[error("the {0} algorithm is not supported")]
    UnsupportedAlgorithm(String),

    #[error("the plaintext is not valid")]
    PlaintextInvalid,
    #[error("the plaintext is too long")]
    PlaintextTooLong,
    #[error("the ciphertext is too long")]
    CiphertextTooLong,
    #[error("the ciphertext is not valid")]
    CiphertextInvalid,
    #[error("invalid timestamp")]
    TimestampInvalid,
    #[error("expired timestamp")]
    TimestampExpired,

    #[error("jwt: payload is not a valid JSON object")]
    NotJsonObject,
    #[error("jwt: malformed token")]
    Malformed,
    #[error("jwt: invalid signature")]
    InvalidSignature,

    #[error(transparent)]
    Crypto(#[from] CryptoError),
    #[error("base64 is not valid")]
    Base64(#[from] base64::DecodeError),
    #[error("json is not valid: {0}")]
    Json(#[from] serde_json::Error),
}

impl CodecError {
    /// Whether the error comes from the codec setup rather than the input.
    ///
    /// An unsupported algorithm is counted as input: it is only reachable at
    /// request time through a token header.
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            CodecError::HashKeyNotSet
                | CodecError::BlockKeyNotSet
                | CodecError::Crypto(
                    CryptoError::KeyLength { .. }
                        | CryptoError::UnsupportedMode(_)
                        | CryptoError::MacKey(_)
                )
        )
    }
}

/// Seal and open byte payloads with a per-call key.
pub trait CryptoCodec: Send + Sync {
    /// Seal `plaintext`.
    fn encode(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>>;

    /// Open a value produced by [`CryptoCodec::encode`] with the same key.
    fn decode(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>>;
}
