use std::future::{ready, Ready};

use actix_web::{dev::Payload, FromRequest, HttpMessage, HttpRequest};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use log::debug;
use serde::{Deserialize, Serialize};
use settlement_engine::db_types::Role;

use crate::{
    config::AuthConfig,
    errors::{AuthError, ServerError},
};

/// The claims carried by an access token. Tokens are issued by the platform's identity service and signed with the
/// shared HS256 secret.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct JwtClaims {
    /// The user (or service) the token was issued to.
    pub sub: String,
    pub roles: Vec<Role>,
    /// Set for merchant owners. Owner endpoints are scoped to this merchant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_id: Option<String>,
    pub exp: i64,
}

impl JwtClaims {
    pub fn has_role(&self, role: Role) -> bool {
        self.roles.contains(&role)
    }

    /// The merchant an owner token is bound to.
    pub fn merchant_id(&self) -> Result<&str, AuthError> {
        self.merchant_id.as_deref().filter(|m| !m.is_empty()).ok_or(AuthError::NoMerchantAccount)
    }
}

/// Claims are placed in the request extensions by [`crate::middleware::JwtMiddlewareFactory`]. Handlers outside the
/// `/api` scope will not find any.
impl FromRequest for JwtClaims {
    type Error = ServerError;
    type Future = Ready<Result<Self, Self::Error>>;

    fn from_request(req: &HttpRequest, _payload: &mut Payload) -> Self::Future {
        let claims = req.extensions().get::<JwtClaims>().cloned();
        ready(claims.ok_or(ServerError::AuthenticationError(AuthError::MissingToken)))
    }
}

#[derive(Clone)]
pub struct TokenValidator {
    key: DecodingKey,
    validation: Validation,
}

impl TokenValidator {
    pub fn new(config: &AuthConfig) -> Self {
        let key = DecodingKey::from_secret(config.jwt_secret.reveal().as_bytes());
        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = true;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self { key, validation }
    }

    pub fn validate(&self, token: &str) -> Result<JwtClaims, AuthError> {
        let data = decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| match e.kind() {
            ErrorKind::InvalidToken | ErrorKind::Base64(_) | ErrorKind::Json(_) | ErrorKind::Utf8(_) => {
                AuthError::PoorlyFormattedToken(e.to_string())
            },
            _ => AuthError::ValidationError(e.to_string()),
        })?;
        debug!("🔐️ Access token validated for {}", data.claims.sub);
        Ok(data.claims)
    }
}

/// Issues access tokens. The settlement server does not log anyone in itself; this exists for tooling and tests that
/// need tokens the server will accept.
pub struct TokenIssuer {
    key: EncodingKey,
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self { key: EncodingKey::from_secret(config.jwt_secret.reveal().as_bytes()) }
    }

    pub fn issue_token(
        &self,
        sub: &str,
        roles: Vec<Role>,
        merchant_id: Option<String>,
        duration: Option<Duration>,
    ) -> Result<String, AuthError> {
        let duration = duration.unwrap_or_else(|| Duration::hours(24));
        let claims = JwtClaims { sub: sub.to_string(), roles, merchant_id, exp: (Utc::now() + duration).timestamp() };
        encode(&Header::new(Algorithm::HS256), &claims, &self.key).map_err(|e| AuthError::ValidationError(e.to_string()))
    }
}
