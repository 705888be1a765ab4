//! HS256 session tokens
//!
//! Tokens carry only the username and are valid for three days. Clients may
//! send them either bare in the `Authorization` header or with a `Bearer `
//! prefix.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use hmac::{Hmac, Mac};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Session token expiry in seconds (3 days)
pub const SESSION_TOKEN_EXPIRY: u64 = 3 * 24 * 60 * 60;

#[derive(Debug, Serialize, Deserialize)]
struct JwtHeader {
    alg: String,
    typ: String,
}

impl Default for JwtHeader {
    fn default() -> Self {
        Self {
            alg: "HS256".to_string(),
            typ: "JWT".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionClaims {
    /// Username
    pub sub: String,
    /// Issued at (Unix timestamp)
    pub iat: u64,
    /// Expiration (Unix timestamp)
    pub exp: u64,
}

fn sign(signing_input: &str, secret: &str) -> Result<HmacSha256, String> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|e| format!("HMAC error: {}", e))?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

fn encode_jwt<T: Serialize>(claims: &T, secret: &str) -> Result<String, String> {
    let header_json = serde_json::to_string(&JwtHeader::default()).map_err(|e| e.to_string())?;
    let payload_json = serde_json::to_string(claims).map_err(|e| e.to_string())?;

    let signing_input = format!(
        "{}.{}",
        URL_SAFE_NO_PAD.encode(header_json.as_bytes()),
        URL_SAFE_NO_PAD.encode(payload_json.as_bytes())
    );
    let signature = sign(&signing_input, secret)?.finalize().into_bytes();

    Ok(format!(
        "{}.{}",
        signing_input,
        URL_SAFE_NO_PAD.encode(signature)
    ))
}

fn decode_jwt<T: DeserializeOwned>(token: &str, secret: &str) -> Result<T, String> {
    let mut parts = token.split('.');
    let (Some(header_b64), Some(payload_b64), Some(signature_b64), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err("Invalid token format".to_string());
    };

    let signature = URL_SAFE_NO_PAD
        .decode(signature_b64)
        .map_err(|_| "Invalid signature encoding")?;
    sign(&format!("{}.{}", header_b64, payload_b64), secret)?
        .verify_slice(&signature)
        .map_err(|_| "Invalid signature")?;

    let header_bytes = URL_SAFE_NO_PAD
        .decode(header_b64)
        .map_err(|_| "Invalid header encoding")?;
    let header: JwtHeader =
        serde_json::from_slice(&header_bytes).map_err(|_| "Invalid header format")?;
    if header.alg != "HS256" {
        return Err("Unsupported algorithm".to_string());
    }

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload_b64)
        .map_err(|_| "Invalid payload encoding")?;
    serde_json::from_slice(&payload_bytes).map_err(|_| "Invalid payload format".to_string())
}

/// Issue a session token for `username`
pub fn generate_session_token(username: &str, secret: &str) -> Result<String, String> {
    let now = chrono::Utc::now().timestamp() as u64;
    let claims = SessionClaims {
        sub: username.to_string(),
        iat: now,
        exp: now + SESSION_TOKEN_EXPIRY,
    };

    encode_jwt(&claims, secret).map_err(|e| format!("Failed to generate session token: {}", e))
}

/// Check signature and expiry, returning the claims
pub fn validate_session_token(token: &str, secret: &str) -> Result<SessionClaims, String> {
    let claims: SessionClaims =
        decode_jwt(token, secret).map_err(|e| format!("Invalid session token: {}", e))?;

    let now = chrono::Utc::now().timestamp() as u64;
    if claims.exp < now {
        return Err("Session token expired".to_string());
    }

    Ok(claims)
}

/// Accept both `Bearer <token>` and a bare token
pub fn strip_bearer(header: &str) -> &str {
    let header = header.trim();
    header.strip_prefix("Bearer ").unwrap_or(header).trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    #[test]
    fn test_session_token_round_trip() {
        let token = generate_session_token("alice", TEST_SECRET).unwrap();
        let claims = validate_session_token(&token, TEST_SECRET).unwrap();

        assert_eq!(claims.sub, "alice");
        assert_eq!(claims.exp - claims.iat, SESSION_TOKEN_EXPIRY);
    }

    #[test]
    fn test_wrong_secret() {
        let token = generate_session_token("alice", TEST_SECRET).unwrap();
        assert!(validate_session_token(&token, "wrong-secret").is_err());
    }

    #[test]
    fn test_invalid_token() {
        assert!(validate_session_token("invalid-token", TEST_SECRET).is_err());
        assert!(validate_session_token("a.b.c.d", TEST_SECRET).is_err());
    }

    #[test]
    fn test_expired_token_rejected() {
        let claims = SessionClaims {
            sub: "alice".to_string(),
            iat: 1,
            exp: 2,
        };
        let token = encode_jwt(&claims, TEST_SECRET).unwrap();
        let err = validate_session_token(&token, TEST_SECRET).unwrap_err();
        assert!(err.contains("expired"));
    }

    #[test]
    fn test_tampered_payload_rejected() {
        let token = generate_session_token("alice", TEST_SECRET).unwrap();
        let parts: Vec<&str> = token.split('.').collect();
        let forged_payload = URL_SAFE_NO_PAD.encode(br#"{"sub":"mallory","iat":0,"exp":99999999999}"#);
        let forged = format!("{}.{}.{}", parts[0], forged_payload, parts[2]);

        assert!(validate_session_token(&forged, TEST_SECRET).is_err());
    }

    #[test]
    fn test_strip_bearer() {
        assert_eq!(strip_bearer("Bearer abc123"), "abc123");
        assert_eq!(strip_bearer("abc123"), "abc123");
        assert_eq!(strip_bearer("  Bearer abc123 "), "abc123");
    }
}
