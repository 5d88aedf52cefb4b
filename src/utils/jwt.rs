use crate::entities::UserRole;
use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

const ACCESS: &str = "access";
const REFRESH: &str = "refresh";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub role: UserRole,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String, // "access" or "refresh"
}

impl Claims {
    pub fn user_id(&self) -> AppResult<i64> {
        self.sub
            .parse::<i64>()
            .map_err(|_| AppError::AuthError("Invalid token subject".to_string()))
    }
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    access_token_expires_in: i64,
    refresh_token_expires_in: i64,
}

impl JwtService {
    pub fn new(secret: &str, access_expires_in: i64, refresh_expires_in: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            access_token_expires_in: access_expires_in,
            refresh_token_expires_in: refresh_expires_in,
        }
    }

    fn issue(&self, user_id: i64, role: UserRole, token_type: &str, ttl: i64) -> AppResult<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: user_id.to_string(),
            role,
            exp: (now + Duration::seconds(ttl)).timestamp(),
            iat: now.timestamp(),
            token_type: token_type.to_string(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    pub fn generate_access_token(&self, user_id: i64, role: UserRole) -> AppResult<String> {
        self.issue(user_id, role, ACCESS, self.access_token_expires_in)
    }

    pub fn generate_refresh_token(&self, user_id: i64, role: UserRole) -> AppResult<String> {
        self.issue(user_id, role, REFRESH, self.refresh_token_expires_in)
    }

    pub fn verify_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        Ok(decode::<Claims>(token, &self.decoding_key, &validation)?.claims)
    }

    pub fn verify_access_token(&self, token: &str) -> AppResult<Claims> {
        let claims = self.verify_token(token)?;

        if claims.token_type != ACCESS {
            return Err(AppError::AuthError("Invalid access token type".to_string()));
        }

        Ok(claims)
    }

    pub fn verify_refresh_token(&self, token: &str) -> AppResult<Claims> {
        let claims = self.verify_token(token)?;

        if claims.token_type != REFRESH {
            return Err(AppError::AuthError("Invalid refresh token type".to_string()));
        }

        Ok(claims)
    }

    pub fn get_access_token_expires_in(&self) -> i64 {
        self.access_token_expires_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("test-secret", 3600, 86400)
    }

    #[test]
    fn test_access_token_carries_role() {
        let jwt = service();
        let token = jwt.generate_access_token(42, UserRole::Employee).unwrap();
        let claims = jwt.verify_access_token(&token).unwrap();
        assert_eq!(claims.user_id().unwrap(), 42);
        assert_eq!(claims.role, UserRole::Employee);
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let jwt = service();
        let refresh = jwt.generate_refresh_token(7, UserRole::Customer).unwrap();
        assert!(jwt.verify_access_token(&refresh).is_err());
        assert!(jwt.verify_refresh_token(&refresh).is_ok());

        let access = jwt.generate_access_token(7, UserRole::Customer).unwrap();
        assert!(jwt.verify_refresh_token(&access).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = service()
            .generate_access_token(1, UserRole::Admin)
            .unwrap();
        let other = JwtService::new("another-secret", 3600, 86400);
        assert!(matches!(
            other.verify_access_token(&token),
            Err(AppError::JwtError(_))
        ));
    }
}
