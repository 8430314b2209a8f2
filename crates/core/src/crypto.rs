//! SM2/SM4 primitives facade.
//!
//! Thin wrapper over the RustCrypto SM-series crates: SM2 public-key
//! encryption for key wrapping, SM4 in the six configured modes for the
//! payload, SHA-256 for the public-key fingerprint, and the standard
//! Base64 alphabet at the edges. Key encodings follow the deployment
//! contract: X.509 SPKI for public keys, PKCS#8 for private keys, both
//! Base64.

use crate::config::{Sm2Transformation, Sm4Mode};
use crate::errors::{CryptoError, CryptoResult};
use aes_gcm::aead::Aead;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use cipher::block_padding::Pkcs7;
use cipher::{AsyncStreamCipher, BlockDecryptMut, BlockEncryptMut, KeyInit, KeyIvInit, StreamCipher};
use rand::Rng;
use sha2::{Digest, Sha256};
use sm2::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use sm2::pke::{DecryptingKey, EncryptingKey, Mode};
use sm4::Sm4;

/// 128-bit SM4 key.
pub type Sm4Key = [u8; 16];

/// GCM appends a 128-bit authentication tag to the ciphertext.
type Sm4Gcm = aes_gcm::AesGcm<Sm4, cipher::consts::U12>;

type Sm4EcbEnc = ecb::Encryptor<Sm4>;
type Sm4EcbDec = ecb::Decryptor<Sm4>;
type Sm4CbcEnc = cbc::Encryptor<Sm4>;
type Sm4CbcDec = cbc::Decryptor<Sm4>;
type Sm4Ctr = ctr::Ctr128BE<Sm4>;
type Sm4CfbEnc = cfb_mode::Encryptor<Sm4>;
type Sm4CfbDec = cfb_mode::Decryptor<Sm4>;
type Sm4Ofb = ofb::Ofb<Sm4>;

fn pke_mode(transformation: Sm2Transformation) -> Mode {
    match transformation {
        Sm2Transformation::C1C3C2 => Mode::C1C3C2,
        Sm2Transformation::C1C2C3 => Mode::C1C2C3,
    }
}

/// SM2 public key with its configured ciphertext ordering.
#[derive(Clone)]
pub struct Sm2PublicKey {
    key: sm2::PublicKey,
    mode: Mode,
}

impl Sm2PublicKey {
    /// Decode a Base64 X.509 (SPKI DER) public key.
    pub fn from_base64_spki(b64: &str, transformation: Sm2Transformation) -> CryptoResult<Self> {
        let der = BASE64.decode(b64.trim())?;
        let key = sm2::PublicKey::from_public_key_der(&der)
            .map_err(|e| CryptoError::KeyDecode(e.to_string()))?;
        Ok(Self {
            key,
            mode: pke_mode(transformation),
        })
    }

    pub fn encrypt(&self, plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
        EncryptingKey::new_with_mode(self.key, self.mode)
            .encrypt(&mut rand::rng(), plaintext)
            .map_err(|e| CryptoError::Sm2(e.to_string()))
    }
}

/// SM2 private key with its configured ciphertext ordering.
pub struct Sm2PrivateKey {
    key: sm2::SecretKey,
    mode: Mode,
}

impl Sm2PrivateKey {
    /// Decode a Base64 PKCS#8 DER private key.
    pub fn from_base64_pkcs8(b64: &str, transformation: Sm2Transformation) -> CryptoResult<Self> {
        let der = BASE64.decode(b64.trim())?;
        let key = sm2::SecretKey::from_pkcs8_der(&der)
            .map_err(|e| CryptoError::KeyDecode(e.to_string()))?;
        Ok(Self {
            key,
            mode: pke_mode(transformation),
        })
    }

    pub fn decrypt(&self, ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
        DecryptingKey::new_with_mode(self.key.clone().into(), self.mode)
            .decrypt(ciphertext)
            .map_err(|e| CryptoError::Sm2(e.to_string()))
    }
}

/// Freshly generated SM2 key pair in transport encodings.
pub struct KeyPairMaterial {
    /// Base64 X.509 SPKI.
    pub public_key: String,
    /// Base64 PKCS#8.
    pub private_key: String,
    /// Base64 SHA-256[..20] of the SPKI DER.
    pub fingerprint: String,
}

/// Generate an SM2 key pair on sm2p256v1.
pub fn generate_key_pair() -> CryptoResult<KeyPairMaterial> {
    let secret = sm2::SecretKey::random(&mut rand::rng());
    let public_der = secret
        .public_key()
        .to_public_key_der()
        .map_err(|e| CryptoError::KeyDecode(e.to_string()))?;
    let private_der = secret
        .to_pkcs8_der()
        .map_err(|e| CryptoError::KeyDecode(e.to_string()))?;
    Ok(KeyPairMaterial {
        public_key: BASE64.encode(public_der.as_bytes()),
        private_key: BASE64.encode(private_der.as_bytes()),
        fingerprint: fingerprint(public_der.as_bytes()),
    })
}

/// Base64 of the first 20 bytes of SHA-256 over the raw key encoding.
pub fn fingerprint(spki_der: &[u8]) -> String {
    let digest = Sha256::digest(spki_der);
    BASE64.encode(&digest[..20])
}

/// Fingerprint of a Base64 X.509 public key; `None` for blank input.
pub fn fingerprint_of_base64(public_key_b64: &str) -> CryptoResult<Option<String>> {
    let trimmed = public_key_b64.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    let raw = BASE64.decode(trimmed)?;
    Ok(Some(fingerprint(&raw)))
}

/// Fresh random 128-bit SM4 key.
pub fn sm4_generate_key() -> Sm4Key {
    let mut key = [0u8; 16];
    rand::rng().fill_bytes(&mut key);
    key
}

/// Fresh random IV sized for the mode (empty for ECB).
pub fn sm4_generate_iv(mode: Sm4Mode) -> Vec<u8> {
    let mut iv = vec![0u8; mode.iv_len()];
    rand::rng().fill_bytes(&mut iv);
    iv
}

fn check_iv(mode: Sm4Mode, iv: &[u8]) -> CryptoResult<()> {
    if iv.len() != mode.iv_len() {
        return Err(CryptoError::Sm4(format!(
            "mode {:?} expects a {}-byte IV, got {}",
            mode,
            mode.iv_len(),
            iv.len()
        )));
    }
    Ok(())
}

/// SM4-encrypt under the given mode. CBC/ECB use PKCS#7 padding; GCM
/// appends its 16-byte tag.
pub fn sm4_encrypt(mode: Sm4Mode, key: &Sm4Key, iv: &[u8], plaintext: &[u8]) -> CryptoResult<Vec<u8>> {
    check_iv(mode, iv)?;
    match mode {
        Sm4Mode::Ecb => Ok(Sm4EcbEnc::new(key.into()).encrypt_padded_vec_mut::<Pkcs7>(plaintext)),
        Sm4Mode::Cbc => {
            let cipher = Sm4CbcEnc::new_from_slices(key, iv)
                .map_err(|e| CryptoError::Sm4(e.to_string()))?;
            Ok(cipher.encrypt_padded_vec_mut::<Pkcs7>(plaintext))
        }
        Sm4Mode::Ctr => {
            let mut cipher = Sm4Ctr::new_from_slices(key, iv)
                .map_err(|e| CryptoError::Sm4(e.to_string()))?;
            let mut buf = plaintext.to_vec();
            cipher.apply_keystream(&mut buf);
            Ok(buf)
        }
        Sm4Mode::Cfb => {
            let cipher = Sm4CfbEnc::new_from_slices(key, iv)
                .map_err(|e| CryptoError::Sm4(e.to_string()))?;
            let mut buf = plaintext.to_vec();
            cipher.encrypt(&mut buf);
            Ok(buf)
        }
        Sm4Mode::Ofb => {
            let mut cipher = Sm4Ofb::new_from_slices(key, iv)
                .map_err(|e| CryptoError::Sm4(e.to_string()))?;
            let mut buf = plaintext.to_vec();
            cipher.apply_keystream(&mut buf);
            Ok(buf)
        }
        Sm4Mode::Gcm => {
            let cipher =
                Sm4Gcm::new_from_slice(key).map_err(|e| CryptoError::Sm4(e.to_string()))?;
            let nonce = aes_gcm::Nonce::from_slice(iv);
            cipher
                .encrypt(nonce, plaintext)
                .map_err(|e| CryptoError::Sm4(e.to_string()))
        }
    }
}

/// SM4-decrypt under the given mode; GCM verifies the trailing tag.
pub fn sm4_decrypt(mode: Sm4Mode, key: &Sm4Key, iv: &[u8], ciphertext: &[u8]) -> CryptoResult<Vec<u8>> {
    check_iv(mode, iv)?;
    match mode {
        Sm4Mode::Ecb => Sm4EcbDec::new(key.into())
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|e| CryptoError::Sm4(e.to_string())),
        Sm4Mode::Cbc => {
            let cipher = Sm4CbcDec::new_from_slices(key, iv)
                .map_err(|e| CryptoError::Sm4(e.to_string()))?;
            cipher
                .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
                .map_err(|e| CryptoError::Sm4(e.to_string()))
        }
        Sm4Mode::Ctr => {
            let mut cipher = Sm4Ctr::new_from_slices(key, iv)
                .map_err(|e| CryptoError::Sm4(e.to_string()))?;
            let mut buf = ciphertext.to_vec();
            cipher.apply_keystream(&mut buf);
            Ok(buf)
        }
        Sm4Mode::Cfb => {
            let cipher = Sm4CfbDec::new_from_slices(key, iv)
                .map_err(|e| CryptoError::Sm4(e.to_string()))?;
            let mut buf = ciphertext.to_vec();
            cipher.decrypt(&mut buf);
            Ok(buf)
        }
        Sm4Mode::Ofb => {
            let mut cipher = Sm4Ofb::new_from_slices(key, iv)
                .map_err(|e| CryptoError::Sm4(e.to_string()))?;
            let mut buf = ciphertext.to_vec();
            cipher.apply_keystream(&mut buf);
            Ok(buf)
        }
        Sm4Mode::Gcm => {
            let cipher =
                Sm4Gcm::new_from_slice(key).map_err(|e| CryptoError::Sm4(e.to_string()))?;
            let nonce = aes_gcm::Nonce::from_slice(iv);
            cipher
                .decrypt(nonce, ciphertext)
                .map_err(|e| CryptoError::Sm4(e.to_string()))
        }
    }
}

/// Base64 with the standard alphabet.
pub fn base64_encode(data: &[u8]) -> String {
    BASE64.encode(data)
}

pub fn base64_decode(data: &str) -> CryptoResult<Vec<u8>> {
    Ok(BASE64.decode(data.trim())?)
}

#[cfg(test)]
mod tests {
    use super::*;

    const KEY: Sm4Key = [
        0x01, 0x23, 0x45, 0x67, 0x89, 0xab, 0xcd, 0xef, 0xfe, 0xdc, 0xba, 0x98, 0x76, 0x54,
        0x32, 0x10,
    ];

    #[test]
    fn test_sm4_roundtrip_all_modes() {
        let plaintext = b"the quick brown fox jumps over the lazy dog";
        for mode in [
            Sm4Mode::Ecb,
            Sm4Mode::Cbc,
            Sm4Mode::Ctr,
            Sm4Mode::Cfb,
            Sm4Mode::Ofb,
            Sm4Mode::Gcm,
        ] {
            let iv = sm4_generate_iv(mode);
            assert_eq!(iv.len(), mode.iv_len());
            let ciphertext = sm4_encrypt(mode, &KEY, &iv, plaintext).unwrap();
            assert_ne!(ciphertext.as_slice(), plaintext.as_slice());
            let decrypted = sm4_decrypt(mode, &KEY, &iv, &ciphertext).unwrap();
            assert_eq!(decrypted.as_slice(), plaintext.as_slice(), "mode {mode:?}");
        }
    }

    #[test]
    fn test_gcm_appends_tag() {
        let iv = sm4_generate_iv(Sm4Mode::Gcm);
        let ciphertext = sm4_encrypt(Sm4Mode::Gcm, &KEY, &iv, b"payload").unwrap();
        assert_eq!(ciphertext.len(), b"payload".len() + 16);
    }

    #[test]
    fn test_gcm_tamper_detected() {
        let iv = sm4_generate_iv(Sm4Mode::Gcm);
        let mut ciphertext = sm4_encrypt(Sm4Mode::Gcm, &KEY, &iv, b"payload").unwrap();
        ciphertext[0] ^= 0x01;
        assert!(sm4_decrypt(Sm4Mode::Gcm, &KEY, &iv, &ciphertext).is_err());
    }

    #[test]
    fn test_bad_iv_length_rejected() {
        let err = sm4_encrypt(Sm4Mode::Gcm, &KEY, &[0u8; 16], b"x").unwrap_err();
        assert!(matches!(err, CryptoError::Sm4(_)));
    }

    #[test]
    fn test_sm2_wrap_roundtrip() {
        let material = generate_key_pair().unwrap();
        let public =
            Sm2PublicKey::from_base64_spki(&material.public_key, Sm2Transformation::C1C3C2)
                .unwrap();
        let private =
            Sm2PrivateKey::from_base64_pkcs8(&material.private_key, Sm2Transformation::C1C3C2)
                .unwrap();

        let sm4_key = sm4_generate_key();
        let wrapped = public.encrypt(&sm4_key).unwrap();
        assert_ne!(wrapped.as_slice(), sm4_key.as_slice());
        let unwrapped = private.decrypt(&wrapped).unwrap();
        assert_eq!(unwrapped.as_slice(), sm4_key.as_slice());
    }

    #[test]
    fn test_fingerprint_stable_and_short() {
        let material = generate_key_pair().unwrap();
        let fp1 = fingerprint_of_base64(&material.public_key).unwrap().unwrap();
        let fp2 = fingerprint_of_base64(&material.public_key).unwrap().unwrap();
        assert_eq!(fp1, fp2);
        assert_eq!(fp1, material.fingerprint);
        // 20 bytes -> 28 Base64 chars.
        assert_eq!(fp1.len(), 28);
        assert!(fingerprint_of_base64("  ").unwrap().is_none());
    }

    #[test]
    fn test_invalid_key_material() {
        assert!(Sm2PublicKey::from_base64_spki("not base64!!", Sm2Transformation::C1C3C2).is_err());
        let bogus = base64_encode(b"not a key");
        assert!(Sm2PublicKey::from_base64_spki(&bogus, Sm2Transformation::C1C3C2).is_err());
        assert!(Sm2PrivateKey::from_base64_pkcs8(&bogus, Sm2Transformation::C1C3C2).is_err());
    }
}
