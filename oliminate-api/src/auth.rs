use axum::{extract::FromRequestParts, http::request::Parts};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use oliminate_core::{Buyer, Role};
use serde::{Deserialize, Serialize};

use crate::{error::AppError, state::AppState};

// ============================================================================
// JWT Claims
// ============================================================================

/// Claims issued by the identity provider; `role` is `user` or `organizer`
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct BuyerClaims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}

pub fn issue_token(secret: &str, buyer: &Buyer, ttl: Duration) -> Result<String, AppError> {
    let claims = BuyerClaims {
        sub: buyer.id.clone(),
        role: buyer.role.to_string(),
        exp: (Utc::now() + ttl).timestamp() as usize,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| AppError::AuthenticationError(format!("Token encoding failed: {}", e)))
}

pub fn verify_token(secret: &str, token: &str) -> Result<Buyer, AppError> {
    let token_data = decode::<BuyerClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::AuthenticationError("invalid or expired token".to_string()))?;

    let role: Role = token_data
        .claims
        .role
        .parse()
        .map_err(|_| AppError::AuthenticationError("unknown role in token".to_string()))?;

    Ok(Buyer::new(token_data.claims.sub, role))
}

// ============================================================================
// Extractor
// ============================================================================

/// The authenticated caller, resolved from the `Authorization: Bearer` header
#[derive(Debug, Clone)]
pub struct CurrentBuyer(pub Buyer);

impl FromRequestParts<AppState> for CurrentBuyer {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let token = parts
            .headers
            .get(axum::http::header::AUTHORIZATION)
            .and_then(|h| h.to_str().ok())
            .and_then(|h| h.strip_prefix("Bearer "))
            .ok_or_else(|| AppError::AuthenticationError("missing bearer token".to_string()))?;

        let buyer = verify_token(&state.auth.secret, token)?;
        tracing::debug!(buyer_id = %buyer.id, role = %buyer.role, "Authenticated request");
        Ok(CurrentBuyer(buyer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_token_round_trip() {
        let buyer = Buyer::organizer("org-7");
        let token = issue_token("secret", &buyer, Duration::minutes(5)).unwrap();
        assert_eq!(verify_token("secret", &token).unwrap(), buyer);
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let token = issue_token("secret", &Buyer::user("u-1"), Duration::minutes(5)).unwrap();
        assert!(matches!(
            verify_token("other", &token),
            Err(AppError::AuthenticationError(_))
        ));
    }

    #[test]
    fn test_expired_token_rejected() {
        let token = issue_token("secret", &Buyer::user("u-1"), Duration::hours(-2)).unwrap();
        assert!(verify_token("secret", &token).is_err());
    }
}
