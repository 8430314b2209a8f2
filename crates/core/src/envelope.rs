//! SECURE_DATA envelope.
//!
//! # Wire Format (version 2, big-endian)
//!
//! ```text
//! +---------+----------------+--------+-------------------+----------+----------------+
//! | ver (1) | sm2_key_len (4)| iv (1) | sm2_wrapped_key L | iv V     | sm4_ciphertext |
//! +---------+----------------+--------+-------------------+----------+----------------+
//! ```
//!
//! The whole envelope is Base64-encoded for emission. Readers reject any
//! version other than 2, any declared length running past the buffer, and
//! any IV length no SM4 mode produces.

use crate::config::Sm4Mode;
use crate::crypto::{self, Sm2PrivateKey};
use crate::errors::EnvelopeError;

pub const ENVELOPE_VERSION: u8 = 2;

/// Header bytes before the variable-length fields.
const HEADER_LEN: usize = 6;

/// Parsed envelope fields.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Envelope {
    pub wrapped_key: Vec<u8>,
    pub iv: Vec<u8>,
    pub ciphertext: Vec<u8>,
}

/// Pack the three fields into the version-2 byte layout.
pub fn pack(wrapped_key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Vec<u8> {
    let mut out = Vec::with_capacity(HEADER_LEN + wrapped_key.len() + iv.len() + ciphertext.len());
    out.push(ENVELOPE_VERSION);
    out.extend_from_slice(&(wrapped_key.len() as u32).to_be_bytes());
    out.push(iv.len() as u8);
    out.extend_from_slice(wrapped_key);
    out.extend_from_slice(iv);
    out.extend_from_slice(ciphertext);
    out
}

/// Pack and Base64-encode for emission.
pub fn pack_base64(wrapped_key: &[u8], iv: &[u8], ciphertext: &[u8]) -> String {
    crypto::base64_encode(&pack(wrapped_key, iv, ciphertext))
}

/// Parse and validate the version-2 layout.
pub fn parse(bytes: &[u8]) -> Result<Envelope, EnvelopeError> {
    if bytes.is_empty() {
        return Err(EnvelopeError::Empty);
    }
    if bytes[0] != ENVELOPE_VERSION {
        return Err(EnvelopeError::UnsupportedVersion(bytes[0]));
    }
    if bytes.len() < HEADER_LEN {
        return Err(EnvelopeError::Truncated {
            needed: HEADER_LEN,
            actual: bytes.len(),
        });
    }
    let key_len = u32::from_be_bytes([bytes[1], bytes[2], bytes[3], bytes[4]]) as usize;
    let iv_len = bytes[5];
    if !matches!(iv_len, 0 | 12 | 16) {
        return Err(EnvelopeError::InvalidIvLength(iv_len));
    }

    let needed = HEADER_LEN + key_len + iv_len as usize;
    if bytes.len() < needed {
        return Err(EnvelopeError::Truncated {
            needed,
            actual: bytes.len(),
        });
    }

    let key_end = HEADER_LEN + key_len;
    let iv_end = key_end + iv_len as usize;
    Ok(Envelope {
        wrapped_key: bytes[HEADER_LEN..key_end].to_vec(),
        iv: bytes[key_end..iv_end].to_vec(),
        ciphertext: bytes[iv_end..].to_vec(),
    })
}

/// Base64-decode then parse.
pub fn parse_base64(secure_data: &str) -> Result<Envelope, EnvelopeError> {
    if secure_data.trim().is_empty() {
        return Err(EnvelopeError::Empty);
    }
    let bytes = crypto::base64_decode(secure_data).map_err(|e| match e {
        crate::errors::CryptoError::Base64(e) => EnvelopeError::Base64(e),
        other => EnvelopeError::Crypto(other),
    })?;
    parse(&bytes)
}

/// Offline recovery: unwrap the SM4 key with the SM2 private key, then
/// decrypt the payload. The mode's IV length must agree with the
/// envelope's.
pub fn open(
    secure_data: &str,
    private_key: &Sm2PrivateKey,
    mode: Sm4Mode,
) -> Result<Vec<u8>, EnvelopeError> {
    let envelope = parse_base64(secure_data)?;
    if envelope.iv.len() != mode.iv_len() {
        return Err(EnvelopeError::InvalidIvLength(envelope.iv.len() as u8));
    }

    let raw_key = private_key.decrypt(&envelope.wrapped_key)?;
    let sm4_key: crypto::Sm4Key = raw_key.as_slice().try_into().map_err(|_| {
        EnvelopeError::Crypto(crate::errors::CryptoError::KeyDecode(format!(
            "unwrapped key has {} bytes, expected 16",
            raw_key.len()
        )))
    })?;

    Ok(crypto::sm4_decrypt(mode, &sm4_key, &envelope.iv, &envelope.ciphertext)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pack_parse_roundtrip() {
        let wrapped = vec![0xAA; 97];
        let iv = vec![0x1B; 12];
        let ciphertext = vec![0x2C; 33];
        let packed = pack(&wrapped, &iv, &ciphertext);

        assert_eq!(packed[0], 2);
        assert_eq!(u32::from_be_bytes([packed[1], packed[2], packed[3], packed[4]]), 97);
        assert_eq!(packed[5], 12);

        let parsed = parse(&packed).unwrap();
        assert_eq!(parsed.wrapped_key, wrapped);
        assert_eq!(parsed.iv, iv);
        assert_eq!(parsed.ciphertext, ciphertext);
    }

    #[test]
    fn test_empty_iv_for_ecb() {
        let packed = pack(&[1, 2, 3], &[], &[9, 9]);
        let parsed = parse(&packed).unwrap();
        assert!(parsed.iv.is_empty());
        assert_eq!(parsed.ciphertext, vec![9, 9]);
    }

    #[test]
    fn test_reject_empty() {
        assert!(matches!(parse(&[]), Err(EnvelopeError::Empty)));
        assert!(matches!(parse_base64("  "), Err(EnvelopeError::Empty)));
    }

    #[test]
    fn test_reject_wrong_version() {
        let mut packed = pack(&[1], &[], &[2]);
        packed[0] = 1;
        assert!(matches!(parse(&packed), Err(EnvelopeError::UnsupportedVersion(1))));
    }

    #[test]
    fn test_reject_truncated() {
        let packed = pack(&[0u8; 50], &[0u8; 16], &[1, 2, 3]);
        let err = parse(&packed[..HEADER_LEN + 10]).unwrap_err();
        assert!(matches!(err, EnvelopeError::Truncated { .. }));
    }

    #[test]
    fn test_reject_odd_iv_length() {
        let mut packed = pack(&[1], &[0u8; 12], &[2]);
        packed[5] = 7;
        assert!(matches!(parse(&packed), Err(EnvelopeError::InvalidIvLength(7))));
    }

    #[test]
    fn test_reject_declared_length_past_end() {
        let mut packed = pack(&[1, 2, 3], &[0u8; 12], &[4]);
        packed[4] = 200; // claim a 200-byte wrapped key
        assert!(matches!(parse(&packed), Err(EnvelopeError::Truncated { .. })));
    }

    #[test]
    fn test_base64_roundtrip() {
        let b64 = pack_base64(&[7; 10], &[8; 16], &[9; 5]);
        let parsed = parse_base64(&b64).unwrap();
        assert_eq!(parsed.wrapped_key, vec![7; 10]);
    }

    #[test]
    fn test_open_roundtrip() {
        use crate::config::{Sm2Transformation, Sm4Mode};
        use crate::crypto::{generate_key_pair, sm4_encrypt, sm4_generate_iv, sm4_generate_key, Sm2PublicKey};

        let material = generate_key_pair().unwrap();
        let public =
            Sm2PublicKey::from_base64_spki(&material.public_key, Sm2Transformation::C1C3C2)
                .unwrap();
        let private = Sm2PrivateKey::from_base64_pkcs8(
            &material.private_key,
            Sm2Transformation::C1C3C2,
        )
        .unwrap();

        let sm4_key = sm4_generate_key();
        let wrapped = public.encrypt(&sm4_key).unwrap();
        let iv = sm4_generate_iv(Sm4Mode::Gcm);
        let payload = br#"{"password":"p@ssw0rd"}"#;
        let ciphertext = sm4_encrypt(Sm4Mode::Gcm, &sm4_key, &iv, payload).unwrap();

        let secure_data = pack_base64(&wrapped, &iv, &ciphertext);
        let recovered = open(&secure_data, &private, Sm4Mode::Gcm).unwrap();
        assert_eq!(recovered.as_slice(), payload.as_slice());

        // Mode disagreement is rejected before any decryption.
        assert!(matches!(
            open(&secure_data, &private, Sm4Mode::Cbc),
            Err(EnvelopeError::InvalidIvLength(12))
        ));
    }
}
