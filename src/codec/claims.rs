//! Registered JWT claims (RFC 7519, section 4.1).

use std::fmt;

use serde::de::{self, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Pieces of information asserted on every token.
///
/// Instants are Unix timestamps in seconds.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegisteredClaims {
    /// Identifies the organization that issued the token.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub iss: String,
    /// Token kind, see [`crate::session::SUBJECT_AUTH_TOKEN`].
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub sub: String,
    /// Recipients that the token is intended for.
    #[serde(default, skip_serializing_if = "Audience::is_empty")]
    pub aud: Audience,
    /// Expiration time on or after which the token must not be accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    /// Time before which the token must not be accepted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub nbf: Option<i64>,
    /// Time at which the token was issued.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    /// Unique identifier, always the session id.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub jti: String,
}

/// `aud` claim.
///
/// Serialized as a bare string when it holds exactly one value and as an
/// array otherwise; both shapes are accepted when reading.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Audience(pub Vec<String>);

impl Audience {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn contains(&self, audience: &str) -> bool {
        self.0.iter().any(|a| a == audience)
    }
}

impl From<Vec<String>> for Audience {
    fn from(audience: Vec<String>) -> Self {
        Self(audience)
    }
}

impl Serialize for Audience {
    fn serialize<S: Serializer>(
        &self,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        match self.0.as_slice() {
            [] => serializer.serialize_str(""),
            [single] => serializer.serialize_str(single),
            many => many.serialize(serializer),
        }
    }
}

impl<'de> Deserialize<'de> for Audience {
    fn deserialize<D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Self, D::Error> {
        struct AudienceVisitor;

        impl<'de> Visitor<'de> for AudienceVisitor {
            type Value = Audience;

            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("a string or an array of strings")
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<Audience, E> {
                Ok(Audience(vec![v.to_owned()]))
            }

            fn visit_unit<E: de::Error>(self) -> Result<Audience, E> {
                Ok(Audience::default())
            }

            fn visit_seq<A: SeqAccess<'de>>(
                self,
                mut seq: A,
            ) -> Result<Audience, A::Error> {
                let mut audience = Vec::new();
                while let Some(value) = seq.next_element::<String>()? {
                    audience.push(value);
                }
                Ok(Audience(audience))
            }
        }

        deserializer.deserialize_any(AudienceVisitor)
    }
}
