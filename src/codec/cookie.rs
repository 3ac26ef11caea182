//! MAC-and-encrypt codec, suitable for cookie values.
//!
//! Sealing:
//!
//! 1. Encrypt the plaintext with AES in a stream mode, giving `iv ‖ ciphertext`.
//! 2. Base64url the blob.
//! 3. Compute `hex(HMAC-SHA256(hash_key, "key|timestamp|blob"))`.
//! 4. Base64url `"timestamp|blob|mac"`.
//!
//! The per-call key takes part in the MAC but is never written out, so a value
//! sealed for one key does not open under another.

use std::sync::Arc;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE;
use constant_time_eq::constant_time_eq;
use zeroize::Zeroizing;

use super::{CodecError, CryptoCodec, Result};
use crate::clock::{Clock, SystemClock};
use crate::crypto::{BlockCipher, StreamMode, hmac_sha256_hex};

const DEFAULT_MAX_LENGTH: usize = 4096;
const DEFAULT_MAX_AGE: i64 = 86400 * 30; // 30 days.
const SEPARATOR: u8 = b'|';

/// Cookie codec, see the module documentation.
pub struct CookieCodec {
    hash_key: Zeroizing<Vec<u8>>,
    block: BlockCipher,
    max_length: usize,
    max_age: i64,
    min_age: i64,
    clock: Arc<dyn Clock>,
}

impl std::fmt::Debug for CookieCodec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CookieCodec")
            .field("block", &self.block)
            .field("max_length", &self.max_length)
            .field("max_age", &self.max_age)
            .field("min_age", &self.min_age)
            .finish_non_exhaustive()
    }
}

impl CookieCodec {
    /// Create a new [`CookieCodec`] using counter mode.
    ///
    /// `block_key` must be 16, 24 or 32 bytes long and selects AES-128,
    /// AES-192 or AES-256.
    pub fn new(
        hash_key: impl AsRef<[u8]>,
        block_key: impl AsRef<[u8]>,
    ) -> Result<Self> {
        Self::with_mode(hash_key, block_key, StreamMode::default())
    }

    /// Create a new [`CookieCodec`] with an explicit stream mode.
    pub fn with_mode(
        hash_key: impl AsRef<[u8]>,
        block_key: impl AsRef<[u8]>,
        mode: StreamMode,
    ) -> Result<Self> {
        let (hash_key, block_key) = (hash_key.as_ref(), block_key.as_ref());
        if hash_key.is_empty() {
            return Err(CodecError::HashKeyNotSet);
        }
        if block_key.is_empty() {
            return Err(CodecError::BlockKeyNotSet);
        }

        Ok(Self {
            hash_key: Zeroizing::new(hash_key.to_vec()),
            block: BlockCipher::new(block_key, mode)?,
            max_length: DEFAULT_MAX_LENGTH,
            max_age: DEFAULT_MAX_AGE,
            min_age: 0,
            clock: Arc::new(SystemClock),
        })
    }

    /// Maximum length of a sealed value, `0` disables the check.
    pub fn max_length(mut self, length: usize) -> Self {
        self.max_length = length;
        self
    }

    /// Maximum age in seconds of a sealed value, `0` disables the check.
    pub fn max_age(mut self, seconds: i64) -> Self {
        self.max_age = seconds;
        self
    }

    /// Minimum age in seconds of a sealed value, `0` disables the check.
    pub fn min_age(mut self, seconds: i64) -> Self {
        self.min_age = seconds;
        self
    }

    /// Replace the time source used for timestamps.
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn mac(&self, key: &[u8], timestamp: &[u8], blob: &[u8]) -> Result<String> {
        let mut envelope =
            Vec::with_capacity(key.len() + timestamp.len() + blob.len() + 2);
        envelope.extend_from_slice(key);
        envelope.push(SEPARATOR);
        envelope.extend_from_slice(timestamp);
        envelope.push(SEPARATOR);
        envelope.extend_from_slice(blob);

        Ok(hmac_sha256_hex(&self.hash_key, envelope)?)
    }
}

impl CryptoCodec for CookieCodec {
    fn encode(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        if plaintext.is_empty() {
            return Err(CodecError::PlaintextInvalid);
        }

        let blob = URL_SAFE.encode(self.block.encrypt(plaintext)?);
        let timestamp = self.clock.now().to_string();
        let mac = self.mac(key, timestamp.as_bytes(), blob.as_bytes())?;

        let encoded = URL_SAFE.encode(format!("{timestamp}|{blob}|{mac}"));
        if self.max_length != 0 && encoded.len() > self.max_length {
            return Err(CodecError::PlaintextTooLong);
        }

        Ok(encoded.into_bytes())
    }

    fn decode(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        if self.max_length != 0 && ciphertext.len() > self.max_length {
            return Err(CodecError::CiphertextTooLong);
        }

        let body = URL_SAFE.decode(ciphertext)?;
        let mut parts = body.splitn(3, |b| *b == SEPARATOR);
        let (Some(timestamp), Some(blob), Some(mac)) =
            (parts.next(), parts.next(), parts.next())
        else {
            return Err(CodecError::CiphertextInvalid);
        };

        let expected = self.mac(key, timestamp, blob)?;
        if !constant_time_eq(expected.as_bytes(), mac) {
            return Err(CodecError::CiphertextInvalid);
        }

        let timestamp = std::str::from_utf8(timestamp)
            .ok()
            .and_then(|t| t.parse::<i64>().ok())
            .ok_or(CodecError::TimestampInvalid)?;
        let age = self.clock.now() - timestamp;
        if self.max_age != 0 && age > self.max_age {
            return Err(CodecError::TimestampExpired);
        }
        if self.min_age != 0 && age < self.min_age {
            return Err(CodecError::TimestampExpired);
        }

        let blob = URL_SAFE.decode(blob)?;
        Ok(self.block.decrypt(blob)?)
    }
}
