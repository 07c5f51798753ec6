use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use hmac::{Hmac, Mac};
use lazy_static::lazy_static;
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

type HmacSha256 = Hmac<Sha256>;

/// Access tokens expire 30 minutes after issuance.
pub const ACCESS_TOKEN_EXPIRE_MINUTES: i64 = 30;

lazy_static! {
    static ref EMAIL_RE: regex::Regex =
        regex::Regex::new(r"^[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}$").unwrap();
}

const PASSWORD_SYMBOLS: &str = "@$!%*?&";

#[derive(Error, Debug)]
pub enum AuthError {
    #[error("password hashing failed: {0}")]
    Hashing(String),

    #[error("invalid password hash format")]
    InvalidHashFormat,

    #[error("malformed token")]
    MalformedToken,

    #[error("token signature mismatch")]
    InvalidSignature,

    #[error("token expired")]
    TokenExpired,
}

/// Claims embedded in an access token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    pub sub: String,
    pub exp: i64,
}

#[derive(Serialize, Deserialize)]
struct Header {
    alg: String,
    typ: String,
}

/// Hash a password with Argon2id and a fresh random salt.
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    let argon2 = Argon2::default();

    argon2
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Hashing(e.to_string()))
}

/// Check a plaintext password against a stored hash.
///
/// A mismatch is `Ok(false)`; only an unparseable hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed_hash = PasswordHash::new(hash).map_err(|_| AuthError::InvalidHashFormat)?;

    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed_hash)
        .is_ok())
}

/// Issue a signed access token for the given subject, expiring in
/// [`ACCESS_TOKEN_EXPIRE_MINUTES`].
pub fn create_access_token(sub: &str, secret: &str) -> Result<String, AuthError> {
    let claims = Claims {
        sub: sub.to_string(),
        exp: (Utc::now() + Duration::minutes(ACCESS_TOKEN_EXPIRE_MINUTES)).timestamp(),
    };
    sign_claims(&claims, secret)
}

fn sign_claims(claims: &Claims, secret: &str) -> Result<String, AuthError> {
    let header = Header {
        alg: "HS256".to_string(),
        typ: "JWT".to_string(),
    };
    let header_json =
        serde_json::to_vec(&header).map_err(|e| AuthError::Hashing(e.to_string()))?;
    let claims_json =
        serde_json::to_vec(claims).map_err(|e| AuthError::Hashing(e.to_string()))?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json),
        URL_SAFE_NO_PAD.encode(claims_json)
    );

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
    mac.update(signing_input.as_bytes());
    let signature = URL_SAFE_NO_PAD.encode(mac.finalize().into_bytes());

    Ok(format!("{signing_input}.{signature}"))
}

/// Verify a token's signature and expiry, returning its claims.
pub fn decode_access_token(token: &str, secret: &str) -> Result<Claims, AuthError> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(claims_b64), Some(sig_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::MalformedToken);
    };

    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| AuthError::Hashing(e.to_string()))?;
    mac.update(format!("{header_b64}.{claims_b64}").as_bytes());
    let signature = URL_SAFE_NO_PAD
        .decode(sig_b64)
        .map_err(|_| AuthError::MalformedToken)?;
    mac.verify_slice(&signature)
        .map_err(|_| AuthError::InvalidSignature)?;

    let claims_json = URL_SAFE_NO_PAD
        .decode(claims_b64)
        .map_err(|_| AuthError::MalformedToken)?;
    let claims: Claims =
        serde_json::from_slice(&claims_json).map_err(|_| AuthError::MalformedToken)?;

    if Utc::now().timestamp() >= claims.exp {
        return Err(AuthError::TokenExpired);
    }

    Ok(claims)
}

/// Minimal email format check, not full RFC validation.
pub fn email_is_valid(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

/// Password must be at least 8 characters with at least one lowercase
/// letter, one uppercase letter, one digit, and one symbol from
/// `@$!%*?&`.
pub fn password_is_complex(password: &str) -> bool {
    password.len() >= 8
        && password.chars().any(|c| c.is_ascii_lowercase())
        && password.chars().any(|c| c.is_ascii_uppercase())
        && password.chars().any(|c| c.is_ascii_digit())
        && password.chars().any(|c| PASSWORD_SYMBOLS.contains(c))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn complex_password_accepted() {
        assert!(password_is_complex("Abcdef1!"));
        assert!(password_is_complex("xYz9?longer"));
    }

    #[test]
    fn password_missing_any_class_rejected() {
        assert!(!password_is_complex("alllowercase1!"));
        assert!(!password_is_complex("ALLUPPERCASE1!"));
        assert!(!password_is_complex("NoDigits!!"));
        assert!(!password_is_complex("NoSymbol123"));
        assert!(!password_is_complex("Ab1!"));
    }

    #[test]
    fn email_format_check() {
        assert!(email_is_valid("dev@example.com"));
        assert!(email_is_valid("first.last+tag@sub.example.co"));
        assert!(!email_is_valid("not-an-email"));
        assert!(!email_is_valid("missing@tld."));
        assert!(!email_is_valid("short@tld.x"));
        assert!(!email_is_valid("@example.com"));
    }

    #[test]
    fn hash_then_verify_round_trip() {
        let hash = hash_password("Secret1!").unwrap();
        assert!(verify_password("Secret1!", &hash).unwrap());
        assert!(!verify_password("Secret2!", &hash).unwrap());
    }

    #[test]
    fn hashes_are_salted() {
        let a = hash_password("Secret1!").unwrap();
        let b = hash_password("Secret1!").unwrap();
        assert_ne!(a, b);
        assert!(verify_password("Secret1!", &a).unwrap());
        assert!(verify_password("Secret1!", &b).unwrap());
    }

    #[test]
    fn garbage_hash_is_an_error() {
        assert!(verify_password("Secret1!", "not-a-hash").is_err());
    }

    #[test]
    fn token_round_trip() {
        let token = create_access_token("dev@example.com", "secret").unwrap();
        let claims = decode_access_token(&token, "secret").unwrap();
        assert_eq!(claims.sub, "dev@example.com");
        assert!(claims.exp > Utc::now().timestamp());
    }

    #[test]
    fn expired_token_rejected() {
        let claims = Claims {
            sub: "dev@example.com".to_string(),
            exp: (Utc::now() - Duration::minutes(1)).timestamp(),
        };
        let token = sign_claims(&claims, "secret").unwrap();
        assert!(matches!(
            decode_access_token(&token, "secret"),
            Err(AuthError::TokenExpired)
        ));
    }

    #[test]
    fn tampered_token_rejected() {
        let token = create_access_token("dev@example.com", "secret").unwrap();

        // Wrong secret
        assert!(matches!(
            decode_access_token(&token, "other"),
            Err(AuthError::InvalidSignature)
        ));

        // Altered claims
        let claims = Claims {
            sub: "admin@example.com".to_string(),
            exp: (Utc::now() + Duration::minutes(30)).timestamp(),
        };
        let forged_claims = URL_SAFE_NO_PAD.encode(serde_json::to_vec(&claims).unwrap());
        let mut parts: Vec<&str> = token.split('.').collect();
        parts[1] = &forged_claims;
        let forged = parts.join(".");
        assert!(matches!(
            decode_access_token(&forged, "secret"),
            Err(AuthError::InvalidSignature)
        ));
    }

    #[test]
    fn truncated_token_rejected() {
        assert!(matches!(
            decode_access_token("only.two", "secret"),
            Err(AuthError::MalformedToken)
        ));
    }
}
