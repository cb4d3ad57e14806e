use crate::error::AppResult;
use crate::models::{Claims, Session};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};

/// Sign claims with the shared secret, as the identity provider does
pub fn create_jwt(claims: &Claims, secret: &str) -> AppResult<String> {
    let token = encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )?;

    Ok(token)
}

/// Verify signature, expiry and audience of a provider-issued token
pub fn verify_jwt(token: &str, secret: &str, audience: &str) -> AppResult<Claims> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[audience]);

    let token_data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &validation,
    )?;

    Ok(token_data.claims)
}

pub fn session_from_token(token: &str, secret: &str, audience: &str) -> AppResult<Session> {
    verify_jwt(token, secret, audience).map(Session::from)
}

pub fn extract_bearer_token(auth_header: &str) -> Option<String> {
    auth_header
        .strip_prefix("Bearer ")
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
}
