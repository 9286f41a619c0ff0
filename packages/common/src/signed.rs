use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

/// What a signed token is allowed to be used for.
///
/// Tokens minted for one purpose never verify under another, so a leaked
/// disk-upload token cannot be replayed as a blob reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    /// Opaque reference to a blob row (delivery endpoints).
    BlobId,
    /// Encoded variant transformation parameters.
    Variation,
    /// Read access to one key on the disk service.
    DiskRead,
    /// One-shot upload slot on the disk service.
    DiskUpload,
}

impl TokenPurpose {
    fn as_str(&self) -> &'static str {
        match self {
            Self::BlobId => "blob_id",
            Self::Variation => "variation",
            Self::DiskRead => "disk_read",
            Self::DiskUpload => "disk_upload",
        }
    }
}

/// Errors from signing or verifying tokens.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("token expired")]
    Expired,
    #[error("invalid token: {0}")]
    Invalid(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(err: jsonwebtoken::errors::Error) -> Self {
        match err.kind() {
            jsonwebtoken::errors::ErrorKind::ExpiredSignature => Self::Expired,
            _ => Self::Invalid(err.to_string()),
        }
    }
}

#[derive(Serialize, Deserialize)]
struct Claims<T> {
    #[serde(flatten)]
    data: T,
    pur: String,
    exp: u64,
}

/// Signs and verifies tamper-evident, expiring tokens (HS256).
///
/// Signed IDs are bearer references, not access control: any holder can use
/// one until it expires.
pub struct TokenSigner {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl TokenSigner {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Sign `data` for `purpose`, expiring after `expires_in`.
    pub fn sign<T: Serialize>(
        &self,
        purpose: TokenPurpose,
        data: &T,
        expires_in: Duration,
    ) -> Result<String, TokenError> {
        let exp = Utc::now().timestamp() as u64 + expires_in.as_secs();
        let claims = Claims {
            data,
            pur: purpose.as_str().to_string(),
            exp,
        };
        Ok(encode(&Header::default(), &claims, &self.encoding)?)
    }

    /// Verify a token and return its payload.
    ///
    /// Fails on bad signature, expiry, or a purpose mismatch.
    pub fn verify<T: DeserializeOwned>(
        &self,
        purpose: TokenPurpose,
        token: &str,
    ) -> Result<T, TokenError> {
        // The default validation tolerates 60 seconds of clock skew, which
        // would keep expired URLs alive past their advertised window.
        let mut validation = Validation::default();
        validation.leeway = 0;
        let data = decode::<Claims<T>>(token, &self.decoding, &validation)?;
        if data.claims.pur != purpose.as_str() {
            return Err(TokenError::Invalid(format!(
                "token purpose mismatch: expected {}, got {}",
                purpose.as_str(),
                data.claims.pur
            )));
        }
        Ok(data.claims.data)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Serialize, Deserialize, PartialEq, Debug)]
    struct Payload {
        key: String,
    }

    fn signer() -> TokenSigner {
        TokenSigner::new(b"test-secret")
    }

    #[test]
    fn sign_verify_round_trip() {
        let payload = Payload { key: "abc123".into() };
        let token = signer()
            .sign(TokenPurpose::BlobId, &payload, Duration::from_secs(60))
            .unwrap();
        let verified: Payload = signer().verify(TokenPurpose::BlobId, &token).unwrap();
        assert_eq!(verified, payload);
    }

    #[test]
    fn purpose_mismatch_rejected() {
        let payload = Payload { key: "abc123".into() };
        let token = signer()
            .sign(TokenPurpose::DiskUpload, &payload, Duration::from_secs(60))
            .unwrap();
        let result: Result<Payload, _> = signer().verify(TokenPurpose::DiskRead, &token);
        assert!(matches!(result, Err(TokenError::Invalid(_))));
    }

    #[test]
    fn tampered_token_rejected() {
        let payload = Payload { key: "abc123".into() };
        let mut token = signer()
            .sign(TokenPurpose::BlobId, &payload, Duration::from_secs(60))
            .unwrap();
        token.push('x');
        let result: Result<Payload, _> = signer().verify(TokenPurpose::BlobId, &token);
        assert!(result.is_err());
    }

    #[test]
    fn expired_token_rejected() {
        let s = signer();
        let claims = Claims {
            data: Payload { key: "abc123".into() },
            pur: TokenPurpose::BlobId.as_str().to_string(),
            exp: (Utc::now().timestamp() - 120) as u64,
        };
        let token = encode(&Header::default(), &claims, &s.encoding).unwrap();
        let result: Result<Payload, _> = s.verify(TokenPurpose::BlobId, &token);
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn expiry_has_no_grace_window() {
        let s = signer();
        let claims = Claims {
            data: Payload { key: "abc123".into() },
            pur: TokenPurpose::BlobId.as_str().to_string(),
            // Inside jsonwebtoken's default 60-second leeway, which we
            // disable.
            exp: (Utc::now().timestamp() - 5) as u64,
        };
        let token = encode(&Header::default(), &claims, &s.encoding).unwrap();
        let result: Result<Payload, _> = s.verify(TokenPurpose::BlobId, &token);
        assert!(matches!(result, Err(TokenError::Expired)));
    }

    #[test]
    fn wrong_secret_rejected() {
        let payload = Payload { key: "abc123".into() };
        let token = signer()
            .sign(TokenPurpose::BlobId, &payload, Duration::from_secs(60))
            .unwrap();
        let other = TokenSigner::new(b"other-secret");
        let result: Result<Payload, _> = other.verify(TokenPurpose::BlobId, &token);
        assert!(result.is_err());
    }
}
