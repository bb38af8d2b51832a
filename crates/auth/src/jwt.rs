//! Bearer token issuing and validation.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use kinnect_config::AuthConfig;
use serde::{Deserialize, Serialize};

use crate::{AuthError, AuthResult};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// User id.
    pub sub: String,
    pub email: String,
    pub exp: usize,
    pub iat: usize,
    pub iss: String,
    pub aud: String,
    pub jti: String,
}

pub struct JwtManager {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    token_duration: Duration,
}

impl JwtManager {
    pub fn new(secret: &str, issuer: String, audience: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            audience,
            token_duration: Duration::from_secs(7 * 24 * 60 * 60),
        }
    }

    pub fn from_config(config: &AuthConfig) -> Self {
        Self::new(&config.jwt_secret, config.issuer.clone(), config.audience.clone())
            .with_duration(Duration::from_secs(config.token_ttl_seconds))
    }

    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.token_duration = duration;
        self
    }

    pub fn generate_token(&self, user_id: &str, email: &str) -> AuthResult<String> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_err(|_| AuthError::TokenCreation("system clock before unix epoch".to_string()))?;
        let exp = now.saturating_add(self.token_duration);

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            exp: exp.as_secs() as usize,
            iat: now.as_secs() as usize,
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            jti: uuid::Uuid::new_v4().to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)
            .map_err(|error| AuthError::TokenCreation(error.to_string()))
    }

    pub fn validate_token(&self, token: &str) -> AuthResult<Claims> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);

        decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(|error| match error.kind() {
                ErrorKind::ExpiredSignature => AuthError::TokenExpired,
                _ => AuthError::InvalidToken(error.to_string()),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> JwtManager {
        JwtManager::new(
            "test_secret_key_that_is_long_enough_for_hs256",
            "kinnect".to_string(),
            "kinnect-app".to_string(),
        )
    }

    #[test]
    fn issued_token_validates() {
        let jwt = manager();
        let token = jwt.generate_token("user-1", "a@example.com").unwrap();
        let claims = jwt.validate_token(&token).unwrap();

        assert_eq!(claims.sub, "user-1");
        assert_eq!(claims.email, "a@example.com");
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn rejects_tokens_signed_with_another_secret() {
        let token = manager().generate_token("user-1", "a@example.com").unwrap();
        let other = JwtManager::new("another-secret", "kinnect".into(), "kinnect-app".into());

        assert!(matches!(other.validate_token(&token), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn rejects_wrong_audience() {
        let token = manager().generate_token("user-1", "a@example.com").unwrap();
        let other = JwtManager::new(
            "test_secret_key_that_is_long_enough_for_hs256",
            "kinnect".into(),
            "someone-else".into(),
        );

        assert!(other.validate_token(&token).is_err());
    }

    #[test]
    fn expired_tokens_are_reported_as_expired() {
        let jwt = manager();
        // Well outside the default validation leeway.
        let claims = Claims {
            sub: "user-1".into(),
            email: "a@example.com".into(),
            exp: 1_000,
            iat: 500,
            iss: "kinnect".into(),
            aud: "kinnect-app".into(),
            jti: "stale".into(),
        };
        let stale = encode(&Header::default(), &claims, &jwt.encoding_key).unwrap();

        assert!(matches!(jwt.validate_token(&stale), Err(AuthError::TokenExpired)));
    }

    #[test]
    fn from_config_uses_configured_ttl() {
        let config = AuthConfig {
            token_ttl_seconds: 120,
            ..AuthConfig::default()
        };
        let jwt = JwtManager::from_config(&config);
        let claims = jwt
            .validate_token(&jwt.generate_token("user-1", "a@example.com").unwrap())
            .unwrap();

        assert_eq!(claims.exp - claims.iat, 120);
    }
}
