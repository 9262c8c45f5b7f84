//! Conversion between base64url coordinate strings and P-384 curve points
//!
//! Browser key APIs export `x` and `y` as base64url without padding. Padding
//! is restored here with the proper modulo-4 rule before decoding, so both
//! padded and unpadded input is accepted.

use crate::traits::DecodeError;
use crate::types::{CurvePoint, EncodedPublicKey, COORDINATE_LEN};
use base64::engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD};
use base64::Engine as _;
use std::borrow::Cow;

/// Decode both coordinates into a candidate point.
///
/// Curve membership is not checked here, see [`crate::P384KeyValidator`].
pub fn decode(x_encoded: &str, y_encoded: &str) -> Result<CurvePoint, DecodeError> {
    let x = decode_coordinate(x_encoded)?;
    let y = decode_coordinate(y_encoded)?;
    Ok(CurvePoint::new(x, y))
}

/// Decode the coordinates of a wire-format public key
pub fn decode_public_key(public_key: &EncodedPublicKey) -> Result<CurvePoint, DecodeError> {
    decode(&public_key.x, &public_key.y)
}

/// Fixed-width, unpadded base64url encoding of both coordinates
pub fn encode(point: &CurvePoint) -> EncodedPublicKey {
    EncodedPublicKey::new(
        URL_SAFE_NO_PAD.encode(point.x()),
        URL_SAFE_NO_PAD.encode(point.y()),
    )
}

/// Decode one base64url coordinate and enforce the 48-byte field size
pub fn decode_coordinate(encoded: &str) -> Result<[u8; COORDINATE_LEN], DecodeError> {
    let padded = pad_base64url(encoded)?;
    let bytes = URL_SAFE
        .decode(padded.as_bytes())
        .map_err(|_| DecodeError::InvalidEncoding)?;

    bytes
        .as_slice()
        .try_into()
        .map_err(|_| DecodeError::InvalidLength)
}

/// Append the `=` characters an unpadded base64url string is missing.
///
/// Input that already carries padding is returned unchanged. A length of
/// 1 mod 4 can never be valid base64.
pub fn pad_base64url(encoded: &str) -> Result<Cow<'_, str>, DecodeError> {
    if encoded.ends_with('=') {
        return Ok(Cow::Borrowed(encoded));
    }
    match encoded.len() % 4 {
        0 => Ok(Cow::Borrowed(encoded)),
        1 => Err(DecodeError::InvalidEncoding),
        rem => {
            let mut padded = String::with_capacity(encoded.len() + 4 - rem);
            padded.push_str(encoded);
            padded.extend(std::iter::repeat('=').take(4 - rem));
            Ok(Cow::Owned(padded))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // base64url of the P-384 generator coordinates, as a browser would export them
    const GENERATOR_X: &str = "qofKIr6LBTeOscce8yCtdG4dO2KLp5uYWfdB4IJUKjhVAvJdv1UpbDpUXjhydgq3";
    const GENERATOR_Y: &str = "NhfeSpYmLG9dnpi_kpLcKfj0Hb0omhR86doxE7XwuMAKYLHOHX6BnXpDHXyQ6g5f";

    #[test]
    fn test_encode_generator() {
        let encoded = encode(&CurvePoint::GENERATOR);
        assert_eq!(encoded.x, GENERATOR_X);
        assert_eq!(encoded.y, GENERATOR_Y);
        assert_eq!(encoded.crv, "P-384");
        assert_eq!(encoded.kty, "EC");
        assert!(!encoded.x.contains('='));
    }

    #[test]
    fn test_decode_generator() {
        let point = decode(GENERATOR_X, GENERATOR_Y).expect("generator should decode");
        assert_eq!(point, CurvePoint::GENERATOR);
    }

    #[test]
    fn test_padding_rules() {
        assert_eq!(pad_base64url("").unwrap(), "");
        assert_eq!(pad_base64url("QUJD").unwrap(), "QUJD");
        assert_eq!(pad_base64url("QUI").unwrap(), "QUI=");
        assert_eq!(pad_base64url("QQ").unwrap(), "QQ==");
        assert_eq!(pad_base64url("QQ==").unwrap(), "QQ==");
        assert_eq!(pad_base64url("QUJDR"), Err(DecodeError::InvalidEncoding));
    }

    #[test]
    fn test_decode_rejects_malformed_base64() {
        let bad = format!("{}*", &GENERATOR_X[..63]);
        assert_eq!(decode(&bad, GENERATOR_Y), Err(DecodeError::InvalidEncoding));
        assert_eq!(decode(GENERATOR_X, "a"), Err(DecodeError::InvalidEncoding));
        // standard alphabet characters are not base64url
        let std_alphabet = GENERATOR_Y.replace('_', "/");
        assert_eq!(decode(GENERATOR_X, &std_alphabet), Err(DecodeError::InvalidEncoding));
    }

    #[test]
    fn test_decode_rejects_wrong_length() {
        let short = URL_SAFE_NO_PAD.encode([7u8; 47]);
        let long = URL_SAFE_NO_PAD.encode([7u8; 49]);
        assert_eq!(decode(&short, GENERATOR_Y), Err(DecodeError::InvalidLength));
        assert_eq!(decode(GENERATOR_X, &long), Err(DecodeError::InvalidLength));
        assert_eq!(decode("", GENERATOR_Y), Err(DecodeError::InvalidLength));
    }

    #[test]
    fn test_decode_accepts_padded_input() {
        // 49 bytes needs padding; the length check must still fire after decoding
        let padded = URL_SAFE.encode([1u8; 49]);
        assert!(padded.ends_with('='));
        assert_eq!(decode_coordinate(&padded), Err(DecodeError::InvalidLength));
    }

    #[test]
    fn test_decode_does_not_check_curve() {
        let x = URL_SAFE_NO_PAD.encode([0u8; 48]);
        let point = decode(&x, &x).expect("length is fine");
        assert!(!point.is_on_curve());
    }
}
