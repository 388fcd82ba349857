use anyhow::Result;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::AppConfig;

/// Issues and validates the two token kinds the service uses: session access
/// tokens and the short-lived signature-verification tokens minted after a
/// successful identity re-check (OTP/authenticator/OAuth). The two audiences
/// are distinct so a session token can never stand in for a verification.
#[derive(Clone)]
pub struct JwtService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    issuer: String,
    audience: String,
    expiry: Duration,
    verification_audience: String,
    verification_expiry: Duration,
}

impl JwtService {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        Ok(Self {
            encoding: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.jwt_issuer.clone(),
            audience: config.jwt_audience.clone(),
            expiry: Duration::minutes(config.jwt_expiry_minutes),
            verification_audience: config.verification_token_audience.clone(),
            verification_expiry: Duration::minutes(config.verification_token_expiry_minutes),
        })
    }

    pub fn generate_token(
        &self,
        user_id: Uuid,
        username: &str,
        full_name: &str,
        role: &str,
    ) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.expiry;
        let claims = Claims {
            sub: user_id,
            username: username.to_owned(),
            name: full_name.to_owned(),
            role: role.to_owned(),
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_token(&self, token: &str) -> Result<Claims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<Claims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }

    pub fn generate_verification_token(&self, user_id: Uuid, method: &str) -> Result<String> {
        let now = Utc::now();
        let exp = now + self.verification_expiry;
        let claims = VerificationClaims {
            sub: user_id,
            method: method.to_owned(),
            iss: self.issuer.clone(),
            aud: self.verification_audience.clone(),
            iat: now.timestamp() as usize,
            exp: exp.timestamp() as usize,
        };

        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    pub fn verify_verification_token(&self, token: &str) -> Result<VerificationClaims> {
        let mut validation = Validation::default();
        validation.set_audience(&[self.verification_audience.clone()]);
        validation.set_issuer(&[self.issuer.clone()]);
        let data = decode::<VerificationClaims>(token, &self.decoding, &validation)?;
        Ok(data.claims)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub username: String,
    pub name: String,
    pub role: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationClaims {
    pub sub: Uuid,
    pub method: String,
    pub iss: String,
    pub aud: String,
    pub iat: usize,
    pub exp: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        let config = AppConfig {
            database_url: "postgres://localhost/efiling".into(),
            database_max_pool_size: 1,
            server_host: "127.0.0.1".into(),
            server_port: 0,
            jwt_secret: "test-secret".into(),
            jwt_issuer: "test-issuer".into(),
            jwt_audience: "test-audience".into(),
            jwt_expiry_minutes: 5,
            verification_token_audience: "test-verify".into(),
            verification_token_expiry_minutes: 5,
            otp_expiry_minutes: 10,
            signature_stage_expiry_minutes: 15,
            google_client_id: None,
            cors_allowed_origin: None,
            aws_endpoint_url: None,
            aws_access_key_id: None,
            aws_secret_access_key: None,
            aws_region: "us-east-1".into(),
            s3_bucket: "test".into(),
        };
        JwtService::from_config(&config).unwrap()
    }

    #[test]
    fn session_token_round_trips() {
        let jwt = service();
        let user = Uuid::new_v4();
        let token = jwt.generate_token(user, "clerk1", "A Clerk", "clerk").unwrap();
        let claims = jwt.verify_token(&token).unwrap();
        assert_eq!(claims.sub, user);
        assert_eq!(claims.role, "clerk");
    }

    #[test]
    fn verification_token_is_not_a_session_token() {
        let jwt = service();
        let user = Uuid::new_v4();
        let token = jwt.generate_verification_token(user, "otp").unwrap();
        assert!(jwt.verify_token(&token).is_err());
        let claims = jwt.verify_verification_token(&token).unwrap();
        assert_eq!(claims.method, "otp");
    }

    #[test]
    fn session_token_rejected_for_verification() {
        let jwt = service();
        let token = jwt
            .generate_token(Uuid::new_v4(), "clerk1", "A Clerk", "clerk")
            .unwrap();
        assert!(jwt.verify_verification_token(&token).is_err());
    }
}
