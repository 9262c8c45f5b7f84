//! Key validation and ECDSA/SHA-384 verification over P-384

use crate::codec;
use crate::traits::{KeyValidator, SignatureVerifier};
use crate::types::{CurvePoint, EncodedPublicKey, EncodedSignature};
use p384::ecdsa::signature::Verifier as _;
use p384::ecdsa::{Signature, VerifyingKey};

/// Curve membership validator for client supplied P-384 keys
#[derive(Debug, Clone, Copy, Default)]
pub struct P384KeyValidator;

impl KeyValidator for P384KeyValidator {
    fn validate(&self, public_key: &EncodedPublicKey) -> bool {
        validate_public_key(public_key)
    }
}

/// ECDSA/SHA-384 verifier. Any failure, malformed input included, is `false`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EcdsaP384Verifier;

impl SignatureVerifier for EcdsaP384Verifier {
    fn verify(
        &self,
        signature: &EncodedSignature,
        message: &[u8],
        public_key: &EncodedPublicKey,
    ) -> bool {
        verify_signature(signature, message, public_key)
    }
}

/// Validate that a wire-format key is a P-384 point with 48-byte coordinates.
///
/// Both coordinates are always decoded and the curve check always runs,
/// against the generator when decoding failed, so a probing client cannot
/// tell a length failure from an off-curve failure by timing.
pub fn validate_public_key(public_key: &EncodedPublicKey) -> bool {
    let x = codec::decode_coordinate(&public_key.x);
    let y = codec::decode_coordinate(&public_key.y);

    let decoded = x.is_ok() & y.is_ok();
    let candidate = match (x, y) {
        (Ok(x), Ok(y)) => CurvePoint::new(x, y),
        (x, y) => {
            tracing::debug!(
                x_error = ?x.err(),
                y_error = ?y.err(),
                "public key coordinates failed to decode"
            );
            CurvePoint::GENERATOR
        }
    };

    let on_curve = candidate.is_on_curve();
    if decoded && !on_curve {
        tracing::debug!("public key is not a valid P-384 point");
    }

    decoded & on_curve
}

/// Verify a DER signature over `message` with ECDSA/SHA-384.
///
/// Range checks on `r` and `s` (non-zero, below the group order) are done by
/// the `p384` primitive when the DER structure is parsed.
pub fn verify_signature(
    signature: &EncodedSignature,
    message: &[u8],
    public_key: &EncodedPublicKey,
) -> bool {
    let Some(verifying_key) = reconstruct_verifying_key(public_key) else {
        return false;
    };

    let signature = match signature.to_der().map(|der| Signature::from_der(&der)) {
        Ok(Ok(signature)) => signature,
        Ok(Err(_)) => {
            tracing::debug!("signature is not a valid DER ECDSA/P-384 signature");
            return false;
        }
        Err(e) => {
            tracing::debug!(error = %e, "signature is not valid base64");
            return false;
        }
    };

    verifying_key.verify(message, &signature).is_ok()
}

/// Rebuild a verifying key from the coordinate wire format
pub fn reconstruct_verifying_key(public_key: &EncodedPublicKey) -> Option<VerifyingKey> {
    let point = match codec::decode_public_key(public_key) {
        Ok(point) => point,
        Err(e) => {
            tracing::debug!(error = %e, "public key coordinates failed to decode");
            return None;
        }
    };

    match point.to_public_key() {
        Some(public_key) => Some(VerifyingKey::from(public_key)),
        None => {
            tracing::debug!("public key is not a valid P-384 point");
            None
        }
    }
}
