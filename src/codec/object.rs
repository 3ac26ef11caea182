//! Claims serialization.

use super::Result;
use crate::session::Claims;

/// Turn [`Claims`] into bytes and back.
pub trait ObjectCodec: Send + Sync {
    fn encode(&self, claims: &Claims) -> Result<Vec<u8>>;

    fn decode(&self, bytes: &[u8]) -> Result<Claims>;
}

/// JSON object codec.
///
/// Session fields and registered claims share a single flat object.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl ObjectCodec for JsonCodec {
    fn encode(&self, claims: &Claims) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(claims)?)
    }

    fn decode(&self, bytes: &[u8]) -> Result<Claims> {
        Ok(serde_json::from_slice(bytes)?)
    }
}
