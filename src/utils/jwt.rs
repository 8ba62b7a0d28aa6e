//! HS256 bearer-token verification. Tokens are minted by the identity
//! service; this side only checks them.

use std::sync::Arc;

use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};

use crate::error::{ChatError, ChatResult};
use crate::models::identity::{Identity, TenantId};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Claims {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub role: String,
    pub company_id: String,
    #[serde(default)]
    pub permissions: Vec<String>,
    pub exp: i64,
}

impl From<Claims> for Identity {
    fn from(claims: Claims) -> Self {
        Identity {
            user_id: claims.id,
            name: claims.name,
            role: claims.role,
            tenant_id: TenantId::new(claims.company_id),
            permissions: claims.permissions,
        }
    }
}

#[derive(Clone)]
pub struct JwtVerifier {
    key: Arc<DecodingKey>,
    validation: Arc<Validation>,
    #[cfg(test)]
    secret: Arc<[u8]>,
}

impl JwtVerifier {
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        Self {
            key: Arc::new(DecodingKey::from_secret(secret.as_bytes())),
            validation: Arc::new(validation),
            #[cfg(test)]
            secret: Arc::from(secret.as_bytes()),
        }
    }

    /// Checks signature and expiry and resolves the caller's identity.
    pub fn verify(&self, token: &str) -> ChatResult<Identity> {
        let claims = decode::<Claims>(token.trim(), &self.key, &self.validation)
            .map_err(|e| {
                tracing::debug!(error = %e, "bearer token rejected");
                ChatError::Unauthorized
            })?
            .claims;

        if claims.id.is_empty() || claims.company_id.is_empty() {
            tracing::debug!("bearer token lacks user or company");
            return Err(ChatError::Unauthorized);
        }
        Ok(claims.into())
    }

    #[cfg(test)]
    pub fn sign(&self, claims: &Claims) -> String {
        use jsonwebtoken::{encode, EncodingKey, Header};

        encode(
            &Header::new(Algorithm::HS256),
            claims,
            &EncodingKey::from_secret(&self.secret),
        )
        .unwrap()
    }
}

#[cfg(test)]
pub fn claims_for(identity: &Identity, ttl: chrono::Duration) -> Claims {
    Claims {
        id: identity.user_id.clone(),
        name: identity.name.clone(),
        role: identity.role.clone(),
        company_id: identity.tenant_id.to_string(),
        permissions: identity.permissions.clone(),
        exp: (chrono::Utc::now() + ttl).timestamp(),
    }
}
