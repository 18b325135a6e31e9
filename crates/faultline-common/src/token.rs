//! Signed quick-action tokens.
//!
//! Wire format: `base64url(JSON payload) + "." + base64url(HMAC-SHA256)`.
//! The payload deliberately carries no username; the real operator is
//! resolved at action time through the login flow.

use base64::engine::general_purpose::URL_SAFE;
use base64::Engine;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

/// Token有效期（24小时）
pub const TOKEN_TTL_SECS: i64 = 24 * 3600;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TokenError {
    #[error("Token格式错误")]
    Malformed,
    #[error("Token签名无效")]
    BadSignature,
    #[error("Token载荷解码失败")]
    PayloadDecode,
    #[error("Token载荷解析失败")]
    PayloadParse,
    #[error("Token已过期")]
    Expired,
}

/// 快捷操作 Token 载荷
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QuickActionToken {
    #[serde(rename = "tenantId")]
    pub tenant_id: String,
    pub fingerprint: String,
    #[serde(rename = "expireAt")]
    pub expire_at: i64,
}

fn sign(payload: &str, secret_key: &str) -> Vec<u8> {
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload.as_bytes());
    mac.finalize().into_bytes().to_vec()
}

/// Issue a token for `(tenant_id, fingerprint)` expiring `TOKEN_TTL_SECS`
/// after `now`.
pub fn generate_quick_token(
    tenant_id: &str,
    fingerprint: &str,
    secret_key: &str,
    now: i64,
) -> Result<String, TokenError> {
    let payload = QuickActionToken {
        tenant_id: tenant_id.to_string(),
        fingerprint: fingerprint.to_string(),
        expire_at: now + TOKEN_TTL_SECS,
    };
    let payload_json = serde_json::to_vec(&payload).map_err(|_| TokenError::PayloadParse)?;
    let payload_encoded = URL_SAFE.encode(payload_json);
    let signature = URL_SAFE.encode(sign(&payload_encoded, secret_key));
    Ok(format!("{payload_encoded}.{signature}"))
}

/// Verify signature and expiry, returning the payload.
/// Signature comparison is constant-time (`Mac::verify_slice`).
pub fn verify_quick_token(
    token: &str,
    secret_key: &str,
    now: i64,
) -> Result<QuickActionToken, TokenError> {
    let (payload_encoded, signature_encoded) =
        token.split_once('.').ok_or(TokenError::Malformed)?;
    if signature_encoded.contains('.') {
        return Err(TokenError::Malformed);
    }

    let signature = URL_SAFE
        .decode(signature_encoded)
        .map_err(|_| TokenError::BadSignature)?;
    let mut mac = HmacSha256::new_from_slice(secret_key.as_bytes())
        .expect("HMAC can take key of any size");
    mac.update(payload_encoded.as_bytes());
    mac.verify_slice(&signature)
        .map_err(|_| TokenError::BadSignature)?;

    let payload_json = URL_SAFE
        .decode(payload_encoded)
        .map_err(|_| TokenError::PayloadDecode)?;
    let payload: QuickActionToken =
        serde_json::from_slice(&payload_json).map_err(|_| TokenError::PayloadParse)?;

    if now > payload.expire_at {
        return Err(TokenError::Expired);
    }

    Ok(payload)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret-key";

    #[test]
    fn round_trip_before_expiry() {
        let t0 = 1_700_000_000;
        let token = generate_quick_token("T", "fp", SECRET, t0).unwrap();
        // 23h59m after issuance the token still verifies
        let payload = verify_quick_token(&token, SECRET, t0 + 23 * 3600 + 59 * 60).unwrap();
        assert_eq!(payload.tenant_id, "T");
        assert_eq!(payload.fingerprint, "fp");
        assert_eq!(payload.expire_at, t0 + TOKEN_TTL_SECS);
    }

    #[test]
    fn expires_after_ttl() {
        let t0 = 1_700_000_000;
        let token = generate_quick_token("T", "fp", SECRET, t0).unwrap();
        let err = verify_quick_token(&token, SECRET, t0 + TOKEN_TTL_SECS + 1).unwrap_err();
        assert_eq!(err, TokenError::Expired);
        assert_eq!(err.to_string(), "Token已过期");
    }

    #[test]
    fn rejects_any_tampered_byte() {
        let t0 = 1_700_000_000;
        let token = generate_quick_token("T", "fp", SECRET, t0).unwrap();
        let bytes = token.as_bytes();
        for i in 0..bytes.len() {
            let mut tampered = bytes.to_vec();
            tampered[i] = if tampered[i] == b'A' { b'B' } else { b'A' };
            let tampered = String::from_utf8(tampered).unwrap();
            if tampered == token {
                continue;
            }
            assert!(
                verify_quick_token(&tampered, SECRET, t0).is_err(),
                "tampering byte {i} went unnoticed"
            );
        }
    }

    #[test]
    fn rejects_wrong_secret_and_shape() {
        let t0 = 1_700_000_000;
        let token = generate_quick_token("T", "fp", SECRET, t0).unwrap();
        assert_eq!(
            verify_quick_token(&token, "other-secret", t0).unwrap_err(),
            TokenError::BadSignature
        );
        assert_eq!(
            verify_quick_token("not-a-token", SECRET, t0).unwrap_err(),
            TokenError::Malformed
        );
    }
}
