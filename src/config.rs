//! Configuration manager for authed.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::authed::{
    DEFAULT_AUDIENCE, DEFAULT_COOKIE_NAME, DEFAULT_ISSUER,
    DEFAULT_REFRESH_TOKEN_DURATION, DEFAULT_TOKEN_DURATION, RefreshPolicy,
};
use crate::codec::{Algorithm, CookieCodec, CryptoCodec, JwtCodec};
use crate::crypto::StreamMode;
use crate::error::Result;

const DEFAULT_CONFIG_PATH: &str = "config.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Configuration {
    /// Cookie name, also the prefix of every store key.
    pub name: String,
    /// `iss` of issued tokens.
    pub issuer: String,
    /// `aud` of issued tokens.
    pub audience: Vec<String>,
    /// Lifetime of a token, in seconds.
    pub token_duration: u64,
    /// Lifetime of a refresh token, in seconds.
    pub refresh_token_duration: u64,
    /// Accept every valid token of a session, not only the latest.
    pub multi_session: bool,
    pub refresh_policy: RefreshPolicy,
    /// How tokens are sealed.
    pub codec: Codec,
    #[serde(skip)]
    path: PathBuf,
}

impl Default for Configuration {
    fn default() -> Self {
        Self {
            name: DEFAULT_COOKIE_NAME.to_owned(),
            issuer: DEFAULT_ISSUER.to_owned(),
            audience: DEFAULT_AUDIENCE.iter().map(|a| a.to_string()).collect(),
            token_duration: DEFAULT_TOKEN_DURATION.as_secs(),
            refresh_token_duration: DEFAULT_REFRESH_TOKEN_DURATION.as_secs(),
            multi_session: false,
            refresh_policy: RefreshPolicy::default(),
            codec: Codec::default(),
            path: PathBuf::new(),
        }
    }
}

/// Token sealing configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Codec {
    /// HMAC signed compact token.
    Jwt {
        #[serde(default)]
        algorithm: Algorithm,
    },
    /// MAC-and-encrypt cookie value.
    Cookie {
        /// HMAC key, hex encoded.
        #[serde(skip_serializing)]
        hash_key: String,
        /// AES key of 16, 24 or 32 bytes, hex encoded.
        #[serde(skip_serializing)]
        block_key: String,
        #[serde(default)]
        mode: StreamMode,
        /// Seconds, `0` disables the check.
        max_age: Option<i64>,
        /// Seconds, `0` disables the check.
        min_age: Option<i64>,
        max_length: Option<usize>,
    },
}

impl Default for Codec {
    fn default() -> Self {
        Codec::Jwt {
            algorithm: Algorithm::default(),
        }
    }
}

impl Codec {
    /// Build the configured codec.
    pub fn build(&self) -> Result<Box<dyn CryptoCodec>> {
        match self {
            Codec::Jwt { algorithm } => {
                Ok(Box::new(JwtCodec::with_algorithm(*algorithm)))
            },
            Codec::Cookie {
                hash_key,
                block_key,
                mode,
                max_age,
                min_age,
                max_length,
            } => {
                let mut codec = CookieCodec::with_mode(
                    hex::decode(hash_key)?,
                    hex::decode(block_key)?,
                    *mode,
                )?;
                if let Some(max_age) = max_age {
                    codec = codec.max_age(*max_age);
                }
                if let Some(min_age) = min_age {
                    codec = codec.min_age(*min_age);
                }
                if let Some(max_length) = max_length {
                    codec = codec.max_length(*max_length);
                }

                Ok(Box::new(codec))
            },
        }
    }
}

impl Configuration {
    pub fn path(mut self, path: PathBuf) -> Self {
        self.path = path;
        self
    }

    pub fn token_duration(&self) -> Duration {
        Duration::from_secs(self.token_duration)
    }

    pub fn refresh_token_duration(&self) -> Duration {
        Duration::from_secs(self.refresh_token_duration)
    }

    /// Reads the `config.yaml` file from the specified path or the default
    /// location.
    pub fn read(self) -> Arc<Self> {
        let file_path = if self.path.is_file() {
            &self.path
        } else {
            &Path::new(DEFAULT_CONFIG_PATH).to_path_buf()
        };

        match File::open(file_path) {
            Ok(file) => match serde_yaml::from_reader(file) {
                Ok(config) => Arc::new(config),
                Err(err) => Arc::new(self.error(err)),
            },
            Err(err) => Arc::new(self.error(err)),
        }
    }

    /// Return a default configuration as fallback.
    fn error(&self, err: impl std::error::Error) -> Self {
        tracing::error!(
            error = %err,
            path = %self.path.display(),
            "cannot read configuration file"
        );
        Self::default()
    }
}
