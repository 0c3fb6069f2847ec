use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::roles::Role;

/// JWT payload used for authentication.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    #[serde(with = "decimal_sub")]
    pub sub: i64,      // user ID, a decimal string on the wire
    pub email: String, // user email at issuance
    pub role: Role,    // user role at issuance
    pub iat: usize,    // issued at (unix timestamp)
    pub exp: usize,    // expires at (unix timestamp)
    pub iss: String,   // issuer
    pub aud: String,   // audience
    pub jti: Uuid,     // token id
}

// `sub` must be a string for jsonwebtoken's required-claim check
mod decimal_sub {
    use serde::{de, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(id: &i64, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(id)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<i64, D::Error> {
        let raw = String::deserialize(d)?;
        raw.parse().map_err(de::Error::custom)
    }
}
