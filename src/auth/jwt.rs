use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const OPERATOR_ROLE: &str = "admin";

/// Claims issued by the identity provider. `sub` is the technician's external
/// identifier (e.g. national ID number).
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: i64,
}

impl Claims {
    pub fn new(subject: impl Into<String>, role: impl Into<String>, ttl: Duration) -> Self {
        Self {
            sub: subject.into(),
            role: role.into(),
            exp: (Utc::now() + ttl).timestamp(),
        }
    }

    pub fn is_operator(&self) -> bool {
        self.role == OPERATOR_ROLE
    }
}

pub fn encode_token(claims: &Claims, secret: &str) -> Result<String, String> {
    encode(
        &Header::default(),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| format!("JWT encode failed: {e}"))
}

pub fn decode_token(token: &str, secret: &str) -> Result<Claims, String> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| format!("JWT decode failed: {e}"))
}
