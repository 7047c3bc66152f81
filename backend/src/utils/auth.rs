use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::user::Role;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub role: Role,
    pub exp: i64, // expiration timestamp
    pub iat: i64, // issued at timestamp
}

impl Claims {
    pub fn new(user_id: Uuid, role: Role, expiration_hours: i64) -> Self {
        let now = Utc::now();
        let exp = (now + Duration::hours(expiration_hours)).timestamp();

        Self {
            sub: user_id.to_string(),
            role,
            exp,
            iat: now.timestamp(),
        }
    }
}

pub fn create_jwt(
    user_id: Uuid,
    role: Role,
    secret: &str,
    expiration_hours: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    let claims = Claims::new(user_id, role, expiration_hours);
    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}

pub fn decode_jwt(token: &str, secret: &str) -> Result<Claims, jsonwebtoken::errors::Error> {
    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )?;
    Ok(token_data.claims)
}

pub fn hash_password(password: &str) -> Result<String, bcrypt::BcryptError> {
    bcrypt::hash(password, bcrypt::DEFAULT_COST)
}

pub fn verify_password(password: &str, hash: &str) -> Result<bool, bcrypt::BcryptError> {
    bcrypt::verify(password, hash)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_jwt_roundtrip_keeps_role() {
        let user_id = Uuid::new_v4();
        let token = create_jwt(user_id, Role::Faculty, "secret", 1).unwrap();
        let claims = decode_jwt(&token, "secret").unwrap();

        assert_eq!(claims.sub, user_id.to_string());
        assert_eq!(claims.role, Role::Faculty);
    }

    #[test]
    fn test_jwt_wrong_secret() {
        let token = create_jwt(Uuid::new_v4(), Role::Student, "secret", 1).unwrap();
        assert!(decode_jwt(&token, "other").is_err());
    }

    #[test]
    fn test_expired_jwt_rejected() {
        let token = create_jwt(Uuid::new_v4(), Role::Student, "secret", -2).unwrap();
        assert!(decode_jwt(&token, "secret").is_err());
    }

    #[test]
    fn test_password_hash_verify() {
        let hash = bcrypt::hash("hunter22", 4).unwrap();
        assert!(verify_password("hunter22", &hash).unwrap());
        assert!(!verify_password("hunter23", &hash).unwrap());
    }
}
