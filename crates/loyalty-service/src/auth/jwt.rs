//! JWT Token 处理
//!
//! 提供 JWT Token 的生成和验证功能

use chrono::{Duration, Utc};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use loyalty_shared::config::AuthConfig;
use serde::{Deserialize, Serialize};

use crate::error::ApiError;

const ISSUER: &str = "loyalty-service";

/// JWT Claims（Token 载荷）
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// 登录名
    pub sub: String,
    /// 签发时间
    pub iat: i64,
    /// 过期时间
    pub exp: i64,
    /// 签发者
    pub iss: String,
}

/// JWT 管理器
#[derive(Clone)]
pub struct JwtManager {
    expires_in_secs: i64,
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
}

impl JwtManager {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            expires_in_secs: config.token_ttl_seconds,
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
        }
    }

    /// 为用户签发 Token，返回 Token 与过期时间戳
    pub fn generate_token(&self, login: &str) -> Result<(String, i64), ApiError> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.expires_in_secs);

        let claims = Claims {
            sub: login.to_string(),
            iat: now.timestamp(),
            exp: exp.timestamp(),
            iss: ISSUER.to_string(),
        };

        let token = encode(&Header::default(), &claims, &self.encoding_key)
            .map_err(|e| ApiError::Internal(format!("JWT 生成失败: {}", e)))?;

        Ok((token, exp.timestamp()))
    }

    /// 验证并解析 JWT Token
    pub fn verify_token(&self, token: &str) -> Result<Claims, ApiError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[ISSUER]);

        let token_data = decode::<Claims>(token, &self.decoding_key, &validation).map_err(
            |e| match e.kind() {
                jsonwebtoken::errors::ErrorKind::ExpiredSignature => {
                    ApiError::Unauthorized("Token 已过期".to_string())
                }
                jsonwebtoken::errors::ErrorKind::InvalidToken => {
                    ApiError::Unauthorized("无效的 Token".to_string())
                }
                _ => ApiError::Unauthorized(format!("Token 验证失败: {}", e)),
            },
        )?;

        Ok(token_data.claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_and_verify_token() {
        let manager = JwtManager::new(&AuthConfig::default());

        let (token, exp) = manager.generate_token("alice").unwrap();
        let claims = manager.verify_token(&token).unwrap();

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp, exp);
        assert_eq!(claims.iss, ISSUER);
    }

    #[test]
    fn test_token_from_another_secret_is_rejected() {
        let manager = JwtManager::new(&AuthConfig::default());
        let other = JwtManager::new(&AuthConfig {
            jwt_secret: "another-secret".to_string(),
            ..Default::default()
        });

        let (token, _) = other.generate_token("alice").unwrap();
        assert!(matches!(
            manager.verify_token(&token),
            Err(ApiError::Unauthorized(_))
        ));
        assert!(manager.verify_token("invalid.token.here").is_err());
    }

    #[test]
    fn test_expired_token_is_rejected() {
        let manager = JwtManager::new(&AuthConfig {
            token_ttl_seconds: -120,
            ..Default::default()
        });

        let (token, _) = manager.generate_token("alice").unwrap();
        assert!(manager.verify_token(&token).is_err());
    }
}
