//! Cryptographic primitives: AES stream encryption and keyed hashes.

use std::fmt;
use std::str::FromStr;

use aes::cipher::{AsyncStreamCipher, KeyIvInit, StreamCipher};
use aes::{Aes128, Aes192, Aes256};
use hmac::{Hmac, Mac};
use rand::RngCore;
use rand::rngs::OsRng;
use serde::{Deserialize, Serialize};
use sha2::{Sha256, Sha384, Sha512};
use zeroize::Zeroizing;

/// AES block size, also the IV length of every stream mode.
pub const BLOCK_SIZE: usize = 16;

type Result<T> = std::result::Result<T, CryptoError>;

#[derive(thiserror::Error, Debug)]
pub enum CryptoError {
    #[error("key length is {value} while 16, 24 or 32 is expected")]
    KeyLength { value: usize },
    #[error("the {0} stream mode is not supported")]
    UnsupportedMode(String),
    #[error("decryption failed")]
    DecryptionFailed,
    #[error("invalid mac key")]
    MacKey(#[from] hmac::digest::InvalidLength),
}

/// Stream mode turning the AES block cipher into a keystream.
#[derive(
    Debug, Default, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "UPPERCASE")]
pub enum StreamMode {
    /// Counter mode, big-endian 128-bit counter.
    #[default]
    Ctr,
    /// Cipher feedback.
    Cfb,
    /// Output feedback.
    Ofb,
}

impl fmt::Display for StreamMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            StreamMode::Ctr => "CTR",
            StreamMode::Cfb => "CFB",
            StreamMode::Ofb => "OFB",
        })
    }
}

impl FromStr for StreamMode {
    type Err = CryptoError;

    fn from_str(mode: &str) -> Result<Self> {
        match mode.to_ascii_uppercase().as_str() {
            "CTR" => Ok(StreamMode::Ctr),
            "CFB" => Ok(StreamMode::Cfb),
            "OFB" => Ok(StreamMode::Ofb),
            _ => Err(CryptoError::UnsupportedMode(mode.to_owned())),
        }
    }
}

#[derive(Clone, Copy)]
enum Direction {
    Encrypt,
    Decrypt,
}

// CFB is the only mode whose decryption differs from encryption.
macro_rules! apply_keystream {
    ($cipher:ty, $mode:expr, $direction:expr, $key:expr, $iv:expr, $buf:expr) => {
        match ($mode, $direction) {
            (StreamMode::Ctr, _) => {
                ctr::Ctr128BE::<$cipher>::new_from_slices($key, $iv)
                    .map(|mut c| StreamCipher::apply_keystream(&mut c, $buf))
            },
            (StreamMode::Ofb, _) => ofb::Ofb::<$cipher>::new_from_slices($key, $iv)
                .map(|mut c| StreamCipher::apply_keystream(&mut c, $buf)),
            (StreamMode::Cfb, Direction::Encrypt) => {
                cfb_mode::Encryptor::<$cipher>::new_from_slices($key, $iv)
                    .map(|c| AsyncStreamCipher::encrypt(c, $buf))
            },
            (StreamMode::Cfb, Direction::Decrypt) => {
                cfb_mode::Decryptor::<$cipher>::new_from_slices($key, $iv)
                    .map(|c| AsyncStreamCipher::decrypt(c, $buf))
            },
        }
    };
}

/// AES (128, 192 or 256 depending on the key length) in a stream mode.
///
/// Output layout is `iv ‖ ciphertext`, the IV being drawn from the OS RNG on
/// every call.
pub struct BlockCipher {
    key: Zeroizing<Vec<u8>>,
    mode: StreamMode,
}

impl fmt::Debug for BlockCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BlockCipher")
            .field("bits", &(self.key.len() * 8))
            .field("mode", &self.mode)
            .finish()
    }
}

impl BlockCipher {
    /// Create a new [`BlockCipher`].
    pub fn new(key: impl AsRef<[u8]>, mode: StreamMode) -> Result<Self> {
        let key = key.as_ref();
        match key.len() {
            16 | 24 | 32 => Ok(Self {
                key: Zeroizing::new(key.to_vec()),
                mode,
            }),
            value => Err(CryptoError::KeyLength { value }),
        }
    }

    /// Selected stream mode.
    pub fn mode(&self) -> StreamMode {
        self.mode
    }

    /// Encrypt data returning `iv ‖ ciphertext`.
    pub fn encrypt(&self, plaintext: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let plaintext = plaintext.as_ref();
        let mut iv = [0u8; BLOCK_SIZE];
        OsRng.fill_bytes(&mut iv);

        let mut out = Vec::with_capacity(BLOCK_SIZE + plaintext.len());
        out.extend_from_slice(&iv);
        out.extend_from_slice(plaintext);
        self.apply(&iv, &mut out[BLOCK_SIZE..], Direction::Encrypt)?;

        Ok(out)
    }

    /// Decrypt `iv ‖ ciphertext`.
    pub fn decrypt(&self, data: impl AsRef<[u8]>) -> Result<Vec<u8>> {
        let data = data.as_ref();
        if data.len() <= BLOCK_SIZE {
            return Err(CryptoError::DecryptionFailed);
        }

        let (iv, cipher_text) = data.split_at(BLOCK_SIZE);
        let mut plain = cipher_text.to_vec();
        self.apply(iv, &mut plain, Direction::Decrypt)?;

        Ok(plain)
    }

    fn apply(
        &self,
        iv: &[u8],
        buf: &mut [u8],
        direction: Direction,
    ) -> Result<()> {
        let key = self.key.as_slice();
        let applied = match key.len() {
            16 => apply_keystream!(Aes128, self.mode, direction, key, iv, buf),
            24 => apply_keystream!(Aes192, self.mode, direction, key, iv, buf),
            32 => apply_keystream!(Aes256, self.mode, direction, key, iv, buf),
            value => return Err(CryptoError::KeyLength { value }),
        };

        applied.map_err(|_| CryptoError::KeyLength { value: key.len() })
    }
}

/// HMAC-SHA256 of `data`, hex encoded.
pub fn hmac_sha256_hex(
    key: impl AsRef<[u8]>,
    data: impl AsRef<[u8]>,
) -> Result<String> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_ref())?;
    mac.update(data.as_ref());
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// HMAC-SHA256 of `data`.
pub fn hmac_sha256(
    key: impl AsRef<[u8]>,
    data: impl AsRef<[u8]>,
) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha256>::new_from_slice(key.as_ref())?;
    mac.update(data.as_ref());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// HMAC-SHA384 of `data`.
pub fn hmac_sha384(
    key: impl AsRef<[u8]>,
    data: impl AsRef<[u8]>,
) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha384>::new_from_slice(key.as_ref())?;
    mac.update(data.as_ref());
    Ok(mac.finalize().into_bytes().to_vec())
}

/// HMAC-SHA512 of `data`.
pub fn hmac_sha512(
    key: impl AsRef<[u8]>,
    data: impl AsRef<[u8]>,
) -> Result<Vec<u8>> {
    let mut mac = Hmac::<Sha512>::new_from_slice(key.as_ref())?;
    mac.update(data.as_ref());
    Ok(mac.finalize().into_bytes().to_vec())
}
