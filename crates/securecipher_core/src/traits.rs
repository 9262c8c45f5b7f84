//! Core traits and error types for SecureCipher

use crate::types::{EncodedPublicKey, EncodedSignature};
use thiserror::Error;

/// Error types for coordinate and signature decoding
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Invalid base64 encoding")]
    InvalidEncoding,
    #[error("Invalid coordinate length")]
    InvalidLength,
}

/// Raised only when the operating system entropy source fails
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyGenerationError {
    #[error("Entropy source failure")]
    EntropyFailure,
}

/// Error types for interchange (PEM) export
#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to encode private key: {0}")]
    PrivateKey(String),
    #[error("Failed to encode public key: {0}")]
    PublicKey(String),
}

/// Error types for loading a stored server key
#[derive(Error, Debug)]
pub enum ImportError {
    #[error("Invalid PKCS#8 private key")]
    InvalidPrivateKey,
}

#[derive(Error, Debug)]
#[error("Signing failed")]
pub struct SigningError;

/// Error types for building a transaction payload
#[derive(Error, Debug, PartialEq, Eq)]
pub enum PayloadError {
    #[error("Invalid amount: {0}")]
    InvalidAmount(String),
    #[error("Invalid recipient account")]
    InvalidRecipient,
    #[error("Invalid reference")]
    InvalidReference,
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Predicate over client supplied public keys.
///
/// Implementations never fail: malformed input is simply not a valid key.
pub trait KeyValidator {
    /// Returns `true` only for a well-formed, on-curve key
    fn validate(&self, public_key: &EncodedPublicKey) -> bool;
}

/// Trait for signature verification
pub trait SignatureVerifier {
    /// Verify `signature` over `message`; any decoding or reconstruction failure is `false`
    fn verify(
        &self,
        signature: &EncodedSignature,
        message: &[u8],
        public_key: &EncodedPublicKey,
    ) -> bool;
}
