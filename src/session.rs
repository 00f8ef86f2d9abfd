// Explicit session context passed to every authenticated call

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use serde::{Deserialize, Serialize};

use crate::error::ApiError;
use crate::models::{Role, UserProfile};

// Claims the marketplace puts in its tokens. All optional: the gateway only
// reads them and never verifies the signature, the upstream API does that.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    #[serde(default)]
    pub exp: Option<i64>,
    #[serde(default, alias = "_id")]
    pub id: Option<String>,
    #[serde(default)]
    pub role: Option<String>,
}

/// An authenticated buyer or dealer session.
#[derive(Debug, Clone)]
pub struct Session {
    token: String,
    profile: Option<UserProfile>,
    claims: Option<Claims>,
}

impl Session {
    /// Session created by a successful login.
    pub fn new(token: impl Into<String>, profile: UserProfile) -> Self {
        let token = token.into();
        let claims = decode_claims(&token);
        Self {
            token,
            profile: Some(profile),
            claims,
        }
    }

    /// Session rebuilt from a bearer token alone (profile unknown).
    pub fn from_token(token: impl Into<String>) -> Self {
        let token = token.into();
        let claims = decode_claims(&token);
        Self {
            token,
            profile: None,
            claims,
        }
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub fn profile(&self) -> Option<&UserProfile> {
        self.profile.as_ref()
    }

    pub fn claims(&self) -> Option<&Claims> {
        self.claims.as_ref()
    }

    /// Role from the login profile, else from the token claims.
    pub fn role(&self) -> Option<Role> {
        self.profile
            .as_ref()
            .and_then(|p| p.role)
            .or_else(|| {
                self.claims
                    .as_ref()
                    .and_then(|c| c.role.as_deref())
                    .and_then(|r| r.parse().ok())
            })
    }

    /// Opaque tokens and tokens without `exp` never expire locally.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.claims
            .as_ref()
            .and_then(|c| c.exp)
            .is_some_and(|exp| exp <= now.timestamp())
    }

    pub fn ensure_active(&self) -> Result<(), ApiError> {
        if self.token.trim().is_empty() {
            return Err(ApiError::Unauthorized("missing session token".into()));
        }
        if self.is_expired(Utc::now()) {
            return Err(ApiError::Unauthorized("session token expired".into()));
        }
        Ok(())
    }
}

// Reads the payload of a JWT without checking its signature or expiry.
// Returns None for anything that isn't a decodable JWT.
fn decode_claims(token: &str) -> Option<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();

    match decode::<Claims>(token, &DecodingKey::from_secret(&[]), &validation) {
        Ok(data) => Some(data.claims),
        Err(e) => {
            tracing::debug!("Session token is not a readable JWT: {}", e);
            None
        }
    }
}
