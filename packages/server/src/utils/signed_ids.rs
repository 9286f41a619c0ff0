use std::time::Duration;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use blob_core::Transformation;
use common::signed::{TokenError, TokenPurpose, TokenSigner};

/// Lifetime of signed blob references handed to clients. These reference the
/// metadata row, not the bytes, so they outlive the short-lived backend URLs
/// minted per delivery request.
const SIGNED_ID_TTL: Duration = Duration::from_secs(14 * 24 * 60 * 60);

#[derive(Serialize, Deserialize)]
struct BlobIdClaims {
    bid: Uuid,
}

#[derive(Serialize, Deserialize)]
struct VariationClaims {
    tr: Transformation,
}

pub fn sign_blob_id(signer: &TokenSigner, blob_id: Uuid) -> Result<String, TokenError> {
    signer.sign(
        TokenPurpose::BlobId,
        &BlobIdClaims { bid: blob_id },
        SIGNED_ID_TTL,
    )
}

pub fn verify_blob_id(signer: &TokenSigner, token: &str) -> Result<Uuid, TokenError> {
    let claims: BlobIdClaims = signer.verify(TokenPurpose::BlobId, token)?;
    Ok(claims.bid)
}

pub fn sign_variation(
    signer: &TokenSigner,
    transformation: &Transformation,
) -> Result<String, TokenError> {
    signer.sign(
        TokenPurpose::Variation,
        &VariationClaims {
            tr: transformation.clone(),
        },
        SIGNED_ID_TTL,
    )
}

pub fn verify_variation(
    signer: &TokenSigner,
    token: &str,
) -> Result<Transformation, TokenError> {
    let claims: VariationClaims = signer.verify(TokenPurpose::Variation, token)?;
    Ok(claims.tr)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blob_id_round_trip() {
        let signer = TokenSigner::new(b"signed-id-test");
        let id = Uuid::now_v7();
        let token = sign_blob_id(&signer, id).unwrap();
        assert_eq!(verify_blob_id(&signer, &token).unwrap(), id);
    }

    #[test]
    fn variation_round_trip() {
        let signer = TokenSigner::new(b"signed-id-test");
        let transformation = Transformation {
            resize_to_limit: Some((640, 480)),
            ..Default::default()
        };
        let token = sign_variation(&signer, &transformation).unwrap();
        assert_eq!(verify_variation(&signer, &token).unwrap(), transformation);
    }

    #[test]
    fn blob_id_token_is_not_a_variation_token() {
        let signer = TokenSigner::new(b"signed-id-test");
        let token = sign_blob_id(&signer, Uuid::now_v7()).unwrap();
        assert!(verify_variation(&signer, &token).is_err());
    }
}
