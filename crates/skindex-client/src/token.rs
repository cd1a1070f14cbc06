//! 读取令牌中的声明
//!
//! 客户端不持有签名密钥，这里只解码载荷，不校验签名。

use chrono::{DateTime, TimeZone, Utc};
use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::Deserialize;

use crate::error::{ClientError, Result};

/// 客户端关心的令牌声明
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct TokenInfo {
    pub email: String,
    #[serde(rename = "userId")]
    pub user_id: i32,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: Option<String>,
    pub exp: i64,
}

impl TokenInfo {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.exp, 0).single()
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.exp <= now.timestamp()
    }

    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

pub fn decode_unverified(token: &str) -> Result<TokenInfo> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    decode::<TokenInfo>(token, &DecodingKey::from_secret(&[]), &validation)
        .map(|data| data.claims)
        .map_err(|e| ClientError::Token(e.to_string()))
}

pub fn user_id(token: &str) -> Result<i32> {
    decode_unverified(token).map(|info| info.user_id)
}

pub fn email(token: &str) -> Result<String> {
    decode_unverified(token).map(|info| info.email)
}

pub fn name(token: &str) -> Result<String> {
    decode_unverified(token).map(|info| info.name)
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn token(exp: i64) -> String {
        encode(
            &Header::default(),
            &json!({
                "sub": "doc@clinic.org",
                "email": "doc@clinic.org",
                "userId": 12,
                "name": "Dr. Grey",
                "role": "doctor",
                "iss": "http://localhost:8080",
                "aud": "http://localhost:8080",
                "exp": exp,
            }),
            &EncodingKey::from_secret(b"server-only-secret"),
        )
        .unwrap()
    }

    #[test]
    fn test_decode_without_secret() {
        let info = decode_unverified(&token(4_000_000_000)).unwrap();
        assert_eq!(info.email, "doc@clinic.org");
        assert_eq!(info.user_id, 12);
        assert_eq!(info.name, "Dr. Grey");
        assert_eq!(info.role.as_deref(), Some("doctor"));
        assert!(!info.is_expired());
    }

    #[test]
    fn test_expired_token_still_decodes() {
        let info = decode_unverified(&token(1_000)).unwrap();
        assert!(info.is_expired());
        assert_eq!(info.expires_at().unwrap().timestamp(), 1_000);
        assert_eq!(user_id(&token(1_000)).unwrap(), 12);
    }

    #[test]
    fn test_garbage_token() {
        assert!(matches!(decode_unverified("not-a-jwt"), Err(ClientError::Token(_))));
    }
}
