//! Error types for the secure logging core.

use thiserror::Error;

/// Result type for cryptographic operations.
pub type CryptoResult<T> = Result<T, CryptoError>;

/// Errors raised while building the configuration snapshot.
///
/// These are the only errors that may surface during initialization; the
/// logging hot path never raises (see [`CryptoError`]).
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The SM2 public key property is missing or blank.
    #[error("missing required property: {0}")]
    MissingProperty(&'static str),

    /// A property value failed to parse as its expected type.
    #[error("invalid value for {key}: {value:?}")]
    InvalidProperty { key: &'static str, value: String },

    /// The configured public key is not valid Base64 X.509.
    #[error("invalid SM2 public key: {0}")]
    InvalidPublicKey(String),

    /// Unsupported SM2 curve name (only sm2p256v1 is compiled in).
    #[error("unsupported SM2 curve: {0}")]
    UnsupportedCurve(String),

    /// Unrecognized SM2 or SM4 cipher transformation.
    #[error("unsupported cipher transformation: {0}")]
    UnsupportedTransformation(String),

    /// Cache capacity must be positive.
    #[error("illegal cache size: {0}")]
    InvalidCacheSize(i64),

    /// Failed to read the properties file.
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

/// Errors from the SM2/SM4 provider for a specific record.
///
/// Never surfaced to the logging caller: the envelope builder maps any of
/// these to "no envelope" and the record processor emits the masked message
/// alone.
#[derive(Debug, Error)]
pub enum CryptoError {
    /// SM2 encryption or decryption failure.
    #[error("SM2 error: {0}")]
    Sm2(String),

    /// SM4 cipher failure (bad key/IV length, padding, tag mismatch).
    #[error("SM4 error: {0}")]
    Sm4(String),

    /// Key material could not be decoded.
    #[error("key decode error: {0}")]
    KeyDecode(String),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Errors from the offline envelope decoder.
///
/// Surfaced only by the auditor tooling; the hot path never parses
/// envelopes.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    /// The ciphertext input is empty.
    #[error("empty ciphertext")]
    Empty,

    /// Unknown envelope version byte.
    #[error("unsupported envelope version: {0}")]
    UnsupportedVersion(u8),

    /// Declared lengths run past the end of the buffer.
    #[error("truncated envelope: need {needed} bytes, have {actual}")]
    Truncated { needed: usize, actual: usize },

    /// IV length is inconsistent with any supported SM4 mode.
    #[error("invalid IV length: {0}")]
    InvalidIvLength(u8),

    /// Base64 decoding error.
    #[error("base64 decode error: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Decryption of the envelope contents failed.
    #[error(transparent)]
    Crypto(#[from] CryptoError),
}
