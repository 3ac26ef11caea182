//! Session and refresh identifiers.

use rand::Rng;
use uuid::Uuid;

const RANDOM_BITS: u32 = 22;

/// Generate a numeric, time-sortable session id.
///
/// Milliseconds since the Unix epoch fill the high bits, the low 22 bits are
/// random so ids minted within the same millisecond do not collide.
pub fn number_id() -> String {
    let millis = chrono::Utc::now().timestamp_millis().max(0) as u64;
    let noise = rand::thread_rng().gen_range(0..1u64 << RANDOM_BITS);

    ((millis << RANDOM_BITS) | noise).to_string()
}

/// Generate an opaque random identifier (UUID v4).
pub fn uuid() -> String {
    Uuid::new_v4().to_string()
}
