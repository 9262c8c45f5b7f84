//! Core types for SecureCipher

use crate::traits::{DecodeError, PayloadError, SignatureVerifier};
use base64::engine::general_purpose::STANDARD as B64;
use base64::Engine as _;
use hex_literal::hex;
use p384::elliptic_curve::sec1::{Coordinates, FromEncodedPoint, ToEncodedPoint};
use p384::{EncodedPoint, FieldBytes, PublicKey};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha384};
use std::fmt;
use std::str::FromStr;

/// Coordinate field size for P-384 in bytes
pub const COORDINATE_LEN: usize = 48;

/// Curve tag carried in the public key wire format
pub const CURVE_NAME: &str = "P-384";

/// Key type tag carried in the public key wire format
pub const KEY_TYPE: &str = "EC";

/// Largest number of integer digits an amount may carry (15 digits, 2 of them fractional)
pub const MAX_AMOUNT_WHOLE_DIGITS: usize = 13;

/// Maximum recipient account length
pub const MAX_RECIPIENT_LEN: usize = 50;

/// Maximum client reference length
pub const MAX_REFERENCE_LEN: usize = 64;

/// Candidate P-384 point as two big-endian coordinates.
///
/// A `CurvePoint` is only a candidate: it is valid iff it lies on the curve,
/// see [`CurvePoint::to_public_key`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CurvePoint {
    x: [u8; COORDINATE_LEN],
    y: [u8; COORDINATE_LEN],
}

impl CurvePoint {
    /// The P-384 base point
    pub const GENERATOR: CurvePoint = CurvePoint {
        x: hex!(
            "aa87ca22be8b05378eb1c71ef320ad746e1d3b628ba79b98"
            "59f741e082542a385502f25dbf55296c3a545e3872760ab7"
        ),
        y: hex!(
            "3617de4a96262c6f5d9e98bf9292dc29f8f41dbd289a147c"
            "e9da3113b5f0b8c00a60b1ce1d7e819d7a431d7c90ea0e5f"
        ),
    };

    pub const fn new(x: [u8; COORDINATE_LEN], y: [u8; COORDINATE_LEN]) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> &[u8; COORDINATE_LEN] {
        &self.x
    }

    pub fn y(&self) -> &[u8; COORDINATE_LEN] {
        &self.y
    }

    /// Reconstruct the public key.
    ///
    /// Returns `None` unless both coordinates are canonical field elements
    /// (in `[0, p-1]`) and the point satisfies the curve equation.
    pub fn to_public_key(&self) -> Option<PublicKey> {
        let encoded = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(&self.x),
            FieldBytes::from_slice(&self.y),
            false,
        );
        PublicKey::from_encoded_point(&encoded).into()
    }

    pub fn is_on_curve(&self) -> bool {
        self.to_public_key().is_some()
    }

    pub fn from_public_key(public_key: &PublicKey) -> Self {
        let encoded = public_key.to_encoded_point(false);
        match encoded.coordinates() {
            Coordinates::Uncompressed { x, y } => {
                let mut point = Self::new([0u8; COORDINATE_LEN], [0u8; COORDINATE_LEN]);
                point.x.copy_from_slice(x);
                point.y.copy_from_slice(y);
                point
            }
            // A PublicKey is never the identity and we asked for the uncompressed form
            _ => unreachable!("public key did not encode as an uncompressed point"),
        }
    }
}

impl From<&PublicKey> for CurvePoint {
    fn from(public_key: &PublicKey) -> Self {
        Self::from_public_key(public_key)
    }
}

fn default_crv() -> String {
    CURVE_NAME.to_string()
}

fn default_kty() -> String {
    KEY_TYPE.to_string()
}

/// Public key wire format: `{"x": .., "y": .., "crv": "P-384", "kty": "EC"}`.
///
/// `crv` and `kty` are informational only. The curve is enforced by the
/// coordinate length and the curve membership check.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EncodedPublicKey {
    pub x: String,
    pub y: String,
    #[serde(default = "default_crv")]
    pub crv: String,
    #[serde(default = "default_kty")]
    pub kty: String,
}

impl EncodedPublicKey {
    pub fn new(x: impl Into<String>, y: impl Into<String>) -> Self {
        Self {
            x: x.into(),
            y: y.into(),
            crv: default_crv(),
            kty: default_kty(),
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// DER-encoded ECDSA signature carried as padded standard base64
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct EncodedSignature(String);

impl EncodedSignature {
    pub fn new(encoded: impl Into<String>) -> Self {
        Self(encoded.into())
    }

    pub fn from_der(der: &[u8]) -> Self {
        Self(B64.encode(der))
    }

    pub fn to_der(&self) -> Result<Vec<u8>, DecodeError> {
        B64.decode(self.0.as_bytes())
            .map_err(|_| DecodeError::InvalidEncoding)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EncodedSignature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Transaction amount in minor units (two decimal places)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Amount(u64);

impl Amount {
    pub fn from_minor_units(minor: u64) -> Result<Self, PayloadError> {
        if minor == 0 {
            return Err(PayloadError::InvalidAmount("amount must be positive".to_string()));
        }
        if minor / 100 >= 10u64.pow(MAX_AMOUNT_WHOLE_DIGITS as u32) {
            return Err(PayloadError::InvalidAmount("too many digits".to_string()));
        }
        Ok(Self(minor))
    }

    pub fn minor_units(&self) -> u64 {
        self.0
    }
}

impl FromStr for Amount {
    type Err = PayloadError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || PayloadError::InvalidAmount(s.to_string());
        let (whole, fraction) = match s.split_once('.') {
            Some((_, "")) => return Err(invalid()),
            Some((whole, fraction)) => (whole, fraction),
            None => (s, ""),
        };

        if whole.is_empty()
            || whole.len() > MAX_AMOUNT_WHOLE_DIGITS
            || fraction.len() > 2
            || !whole.bytes().all(|b| b.is_ascii_digit())
            || !fraction.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(invalid());
        }

        let whole: u64 = whole.parse().map_err(|_| invalid())?;
        let cents: u64 = match fraction.len() {
            0 => 0,
            1 => fraction.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => fraction.parse().map_err(|_| invalid())?,
        };

        Self::from_minor_units(whole * 100 + cents)
    }
}

impl TryFrom<String> for Amount {
    type Error = PayloadError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Amount> for String {
    fn from(amount: Amount) -> Self {
        amount.to_string()
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
    }
}

/// Material transaction fields, in the order they are signed.
///
/// Field declaration order is lexicographic so that the compact JSON
/// serialization is the canonical form both parties sign.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionFields {
    pub amount: Amount,
    pub recipient_account: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reference: Option<String>,
}

impl TransactionFields {
    pub fn new(amount: Amount, recipient_account: impl Into<String>) -> Self {
        Self {
            amount,
            recipient_account: recipient_account.into(),
            reference: None,
        }
    }

    pub fn with_reference(mut self, reference: impl Into<String>) -> Self {
        self.reference = Some(reference.into());
        self
    }

    pub fn validate(&self) -> Result<(), PayloadError> {
        if self.recipient_account.is_empty()
            || self.recipient_account.chars().count() > MAX_RECIPIENT_LEN
            || self.recipient_account.chars().any(char::is_control)
        {
            return Err(PayloadError::InvalidRecipient);
        }
        if let Some(reference) = &self.reference {
            if reference.is_empty()
                || reference.chars().count() > MAX_REFERENCE_LEN
                || reference.chars().any(char::is_control)
            {
                return Err(PayloadError::InvalidReference);
            }
        }
        Ok(())
    }

    /// Compact JSON, keys sorted, no whitespace
    pub fn canonical_bytes(&self) -> Result<Vec<u8>, PayloadError> {
        self.validate()?;
        serde_json::to_vec(self).map_err(|e| PayloadError::Serialization(e.to_string()))
    }
}

/// The exact byte sequence both parties sign
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TransactionPayload(#[serde(with = "base64_bytes")] Vec<u8>);

impl TransactionPayload {
    pub fn from_fields(fields: &TransactionFields) -> Result<Self, PayloadError> {
        fields.canonical_bytes().map(Self)
    }

    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Lowercase hex SHA-384 of the payload
    pub fn digest_hex(&self) -> String {
        hex::encode(Sha384::digest(&self.0))
    }
}

impl AsRef<[u8]> for TransactionPayload {
    fn as_ref(&self) -> &[u8] {
        &self.0
    }
}

/// Transaction bound to the client and server signatures over the same payload.
///
/// Only [`crate::TransactionAuthorizer`] creates these; there are no setters.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoSignedTransaction {
    q_p: EncodedPublicKey,
    sig_p: EncodedSignature,
    q_s: EncodedPublicKey,
    sig_s: EncodedSignature,
    payload: TransactionPayload,
}

impl CoSignedTransaction {
    pub(crate) fn new(
        q_p: EncodedPublicKey,
        sig_p: EncodedSignature,
        q_s: EncodedPublicKey,
        sig_s: EncodedSignature,
        payload: TransactionPayload,
    ) -> Self {
        Self {
            q_p,
            sig_p,
            q_s,
            sig_s,
            payload,
        }
    }

    /// Record identifier: hex SHA-384 of the signed payload
    pub fn id(&self) -> String {
        self.payload.digest_hex()
    }

    pub fn client_key(&self) -> &EncodedPublicKey {
        &self.q_p
    }

    pub fn client_signature(&self) -> &EncodedSignature {
        &self.sig_p
    }

    pub fn server_key(&self) -> &EncodedPublicKey {
        &self.q_s
    }

    pub fn server_signature(&self) -> &EncodedSignature {
        &self.sig_s
    }

    pub fn payload(&self) -> &TransactionPayload {
        &self.payload
    }

    /// Re-check both signatures, e.g. after loading a persisted record
    pub fn verify_signatures<V: SignatureVerifier>(&self, verifier: &V) -> bool {
        let client_ok = verifier.verify(&self.sig_p, self.payload.as_bytes(), &self.q_p);
        let server_ok = verifier.verify(&self.sig_s, self.payload.as_bytes(), &self.q_s);
        client_ok & server_ok
    }
}

mod base64_bytes {
    use base64::engine::general_purpose::STANDARD as B64;
    use base64::Engine as _;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&B64.encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        B64.decode(encoded.as_bytes())
            .map_err(serde::de::Error::custom)
    }
}
