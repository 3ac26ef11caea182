//! Authed issues, verifies, refreshes and revokes signed session tokens.
//!
//! A token is a [`session::Claims`] object serialized by an
//! [`codec::ObjectCodec`], then sealed by a [`codec::CryptoCodec`] (a compact
//! HMAC token or a MAC-and-encrypt cookie). Pointers to the current token of
//! every session live in a [`store::Cache`] so a newer token supersedes the
//! older ones.
//!
//! ```no_run
//! use authed::{Authed, Session};
//!
//! let authed = Authed::builder()
//!     .signing_key(std::env::var("AUTHED_KEY").unwrap_or_default())
//!     .build()?;
//!
//! let pair = authed.create_token(Session::with_id("42"))?;
//! let claims = authed.verify_token(&pair.token)?;
//! assert_eq!(claims.session.id, "42");
//! # Ok::<(), authed::error::AuthError>(())
//! ```

#![forbid(unsafe_code)]

pub mod authed;
pub mod clock;
pub mod codec;
pub mod config;
pub mod crypto;
pub mod error;
pub mod http;
pub mod id;
pub mod session;
pub mod store;
pub mod telemetry;

pub use crate::authed::{Authed, AuthedBuilder, RefreshPolicy, TokenPair};
pub use crate::error::{AuthError, Result};
pub use crate::session::{Claims, Session};
