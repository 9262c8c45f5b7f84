//! Server key issuance for the co-signing role

use crate::codec;
use crate::traits::{ExportError, ImportError, KeyGenerationError, SigningError};
use crate::types::{CurvePoint, EncodedPublicKey, EncodedSignature, COORDINATE_LEN};
use p384::ecdsa::signature::Signer as _;
use p384::ecdsa::{Signature, SigningKey};
use p384::pkcs8::{DecodePrivateKey, EncodePrivateKey, EncodePublicKey, LineEnding};
use p384::{FieldBytes, SecretKey};
use rand::rngs::OsRng;
use rand::{CryptoRng, RngCore};
use std::fmt;
use zeroize::Zeroizing;

/// Draws allowed before a generator that never yields a scalar in `[1, n-1]` is
/// treated as broken. An honest source fails a single draw with probability ~2^-190.
const MAX_SCALAR_DRAWS: usize = 8;

/// Owned P-384 private scalar and its public point.
///
/// Not `Clone`. The scalar is zeroized on drop and leaves the process only
/// through [`export_interchange`].
pub struct Keypair {
    secret_key: SecretKey,
    public_point: CurvePoint,
}

impl Keypair {
    fn from_secret_key(secret_key: SecretKey) -> Self {
        let public_point = CurvePoint::from_public_key(&secret_key.public_key());
        Self {
            secret_key,
            public_point,
        }
    }

    /// Load a keypair previously written by [`export_interchange`]
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, ImportError> {
        let secret_key =
            SecretKey::from_pkcs8_pem(pem).map_err(|_| ImportError::InvalidPrivateKey)?;
        Ok(Self::from_secret_key(secret_key))
    }

    pub fn public_point(&self) -> &CurvePoint {
        &self.public_point
    }

    /// Public half in the client coordinate format
    pub fn public_key(&self) -> EncodedPublicKey {
        codec::encode(&self.public_point)
    }

    /// ECDSA/SHA-384 signature over `message`, DER encoded.
    ///
    /// Nonces are derived per RFC 6979, so signing the same message twice
    /// yields the same signature.
    pub fn sign(&self, message: &[u8]) -> Result<EncodedSignature, SigningError> {
        let signing_key = SigningKey::from(&self.secret_key);
        let signature: Signature = signing_key.try_sign(message).map_err(|_| SigningError)?;
        Ok(EncodedSignature::from_der(signature.to_der().as_bytes()))
    }
}

impl fmt::Debug for Keypair {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Keypair")
            .field("public_point", &self.public_point)
            .finish_non_exhaustive()
    }
}

/// Generate a fresh P-384 keypair from the operating system CSPRNG
pub fn issue_keypair() -> Result<(Keypair, EncodedPublicKey), KeyGenerationError> {
    issue_keypair_with(&mut OsRng)
}

/// Generate a keypair from `rng`.
///
/// The scalar is drawn uniformly from `[1, n-1]` by rejection sampling.
/// A failing source is reported, never replaced.
pub fn issue_keypair_with<R: RngCore + CryptoRng>(
    rng: &mut R,
) -> Result<(Keypair, EncodedPublicKey), KeyGenerationError> {
    for _ in 0..MAX_SCALAR_DRAWS {
        let mut candidate = Zeroizing::new([0u8; COORDINATE_LEN]);
        rng.try_fill_bytes(&mut candidate[..]).map_err(|e| {
            tracing::error!(error = %e, "entropy source failure during key generation");
            KeyGenerationError::EntropyFailure
        })?;

        if let Ok(secret_key) = SecretKey::from_bytes(FieldBytes::from_slice(&candidate[..])) {
            let keypair = Keypair::from_secret_key(secret_key);
            let public_key = keypair.public_key();
            tracing::debug!(x = %public_key.x, "issued server keypair");
            return Ok((keypair, public_key));
        }
    }

    tracing::error!(
        draws = MAX_SCALAR_DRAWS,
        "entropy source never produced a valid P-384 scalar"
    );
    Err(KeyGenerationError::EntropyFailure)
}

/// PKCS#8 (`PRIVATE KEY`, unencrypted) and SubjectPublicKeyInfo (`PUBLIC KEY`) PEM text.
///
/// Confidentiality at rest is the caller's concern.
pub fn export_interchange(
    keypair: &Keypair,
) -> Result<(Zeroizing<String>, String), ExportError> {
    let private_pem = keypair
        .secret_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| ExportError::PrivateKey(e.to_string()))?;
    let public_pem = keypair
        .secret_key
        .public_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| ExportError::PublicKey(e.to_string()))?;

    Ok((private_pem, public_pem))
}
