//! Compact HMAC token codec, `header.payload.signature`.

use std::fmt;
use std::str::FromStr;

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use constant_time_eq::constant_time_eq;
use serde::{Deserialize, Serialize};

use super::{CodecError, CryptoCodec, Result};
use crate::crypto::{hmac_sha256, hmac_sha384, hmac_sha512};

const TOKEN_TYPE: &str = "JWT";

/// Keyed hash used to sign a compact token.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Algorithm {
    #[default]
    HS256,
    HS384,
    HS512,
}

impl Algorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            Algorithm::HS256 => "HS256",
            Algorithm::HS384 => "HS384",
            Algorithm::HS512 => "HS512",
        }
    }

    /// Sign `data` with `key`.
    pub fn sign(&self, key: &[u8], data: &[u8]) -> Result<Vec<u8>> {
        Ok(match self {
            Algorithm::HS256 => hmac_sha256(key, data)?,
            Algorithm::HS384 => hmac_sha384(key, data)?,
            Algorithm::HS512 => hmac_sha512(key, data)?,
        })
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Algorithm {
    type Err = CodecError;

    fn from_str(alg: &str) -> Result<Self> {
        match alg {
            "HS256" => Ok(Algorithm::HS256),
            "HS384" => Ok(Algorithm::HS384),
            "HS512" => Ok(Algorithm::HS512),
            _ => Err(CodecError::UnsupportedAlgorithm(alg.to_owned())),
        }
    }
}

impl Serialize for Algorithm {
    fn serialize<S: serde::Serializer>(
        &self,
        serializer: S,
    ) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Algorithm {
    fn deserialize<D: serde::Deserializer<'de>>(
        deserializer: D,
    ) -> std::result::Result<Self, D::Error> {
        let alg = String::deserialize(deserializer)?;
        alg.parse().map_err(serde::de::Error::custom)
    }
}

/// JOSE header of a compact token.
///
/// `alg` is kept as a plain string so headers of asymmetric tokens can be
/// read too.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    #[serde(default)]
    pub alg: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub cty: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub kid: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub typ: String,
}

impl Header {
    pub fn new(algorithm: Algorithm) -> Self {
        Self {
            alg: algorithm.as_str().to_owned(),
            typ: TOKEN_TYPE.to_owned(),
            ..Default::default()
        }
    }
}

/// Codec producing HMAC signed compact tokens.
///
/// The algorithm chosen at construction is used to sign. Decoding follows
/// the `alg` of the token header, so a codec opens tokens signed with any
/// supported HMAC variant.
#[derive(Clone, Debug, Default)]
pub struct JwtCodec {
    algorithm: Algorithm,
}

impl JwtCodec {
    /// Create a new [`JwtCodec`] from an algorithm name such as `HS256`.
    pub fn new(algorithm: &str) -> Result<Self> {
        Ok(Self {
            algorithm: algorithm.parse()?,
        })
    }

    pub fn with_algorithm(algorithm: Algorithm) -> Self {
        Self { algorithm }
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }
}

impl CryptoCodec for JwtCodec {
    fn encode(&self, key: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        if !is_json_object(plaintext) {
            return Err(CodecError::NotJsonObject);
        }

        let header = serde_json::to_vec(&Header::new(self.algorithm))?;
        let mut token = URL_SAFE_NO_PAD.encode(header);
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(plaintext));

        let signature = self.algorithm.sign(key, token.as_bytes())?;
        token.push('.');
        token.push_str(&URL_SAFE_NO_PAD.encode(signature));

        Ok(token.into_bytes())
    }

    fn decode(&self, key: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
        let [header, payload, signature] = split_token(ciphertext)?;

        let header: Header =
            serde_json::from_slice(&URL_SAFE_NO_PAD.decode(header)?)?;
        let algorithm: Algorithm = header.alg.parse()?;

        let signed = &ciphertext[..header_payload_len(ciphertext)];
        let expected = URL_SAFE_NO_PAD.encode(algorithm.sign(key, signed)?);
        if !constant_time_eq(expected.as_bytes(), signature) {
            return Err(CodecError::InvalidSignature);
        }

        Ok(URL_SAFE_NO_PAD.decode(payload)?)
    }
}

/// Split a compact token into its three segments.
pub(crate) fn split_token(token: &[u8]) -> Result<[&[u8]; 3]> {
    let mut segments = token.split(|b| *b == b'.');
    match (
        segments.next(),
        segments.next(),
        segments.next(),
        segments.next(),
    ) {
        (Some(header), Some(payload), Some(signature), None) => {
            Ok([header, payload, signature])
        },
        _ => Err(CodecError::Malformed),
    }
}

/// Length of the `header.payload` prefix, the signed part of a token.
pub(crate) fn header_payload_len(token: &[u8]) -> usize {
    token.iter().rposition(|b| *b == b'.').unwrap_or(token.len())
}

fn is_json_object(data: &[u8]) -> bool {
    let data = data.trim_ascii();
    data.first() == Some(&b'{') && data.last() == Some(&b'}')
}
