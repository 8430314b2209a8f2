//! Record processor: the per-log-record pipeline.
//!
//! Runs the masking engine, serializes any collected originals, obtains a
//! cached SM4 key (session track when the context carries a trace id,
//! system track otherwise), encrypts, and packs the SECURE_DATA envelope.
//! Crypto trouble never reaches the caller: the record degrades to the
//! masked message without an envelope.

use crate::collector::Collector;
use crate::config::SecureLogConfig;
use crate::context::Context;
use crate::crypto::{self, Sm2PublicKey};
use crate::envelope;
use crate::errors::{ConfigError, CryptoResult};
use crate::keycache::{system_window_id, KeyCache};
use crate::masking::MaskingEngine;
use tracing::warn;

/// Result of processing one log message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessOutcome {
    /// The message with sensitive leaves redacted.
    pub masked: String,
    /// Base64 SECURE_DATA envelope; absent when nothing was collected or
    /// the crypto path failed.
    pub secure_data: Option<String>,
    /// Public-key fingerprint accompanying the envelope.
    pub fingerprint: Option<String>,
}

impl ProcessOutcome {
    fn masked_only(masked: String) -> Self {
        Self {
            masked,
            secure_data: None,
            fingerprint: None,
        }
    }
}

/// One instance per configured pipeline; safe to share across threads.
pub struct RecordProcessor {
    engine: MaskingEngine,
    public_key: Sm2PublicKey,
    fingerprint: String,
    session_cache: KeyCache,
    system_cache: KeyCache,
}

impl RecordProcessor {
    /// Decode the configured public key and build the pipeline. This is
    /// the one place initialization errors surface.
    pub fn new(config: SecureLogConfig) -> Result<Self, ConfigError> {
        let public_key =
            Sm2PublicKey::from_base64_spki(&config.public_key, config.sm2_transformation)
                .map_err(|e| ConfigError::InvalidPublicKey(e.to_string()))?;
        let fingerprint = crypto::fingerprint_of_base64(&config.public_key)
            .map_err(|e| ConfigError::InvalidPublicKey(e.to_string()))?
            .ok_or(ConfigError::MissingProperty(crate::config::PROP_PUBLIC_KEY))?;

        let session_cache = KeyCache::new(config.session_cache_size, config.session_cache_buffer);
        let system_cache = KeyCache::new(config.system_cache_size, config.system_cache_buffer);

        Ok(Self {
            engine: MaskingEngine::new(config),
            public_key,
            fingerprint,
            session_cache,
            system_cache,
        })
    }

    pub fn config(&self) -> &SecureLogConfig {
        self.engine.config()
    }

    /// Session-track cache (trace-id keyed). Exposed for administration.
    pub fn session_cache(&self) -> &KeyCache {
        &self.session_cache
    }

    /// System-track cache (time-window keyed). Exposed for administration.
    pub fn system_cache(&self) -> &KeyCache {
        &self.system_cache
    }

    /// Mask one message and, when originals were collected, build its
    /// SECURE_DATA envelope. Reads the trace id from `ctx` using the
    /// configured key list.
    pub fn process(&self, message: &str, ctx: &Context) -> ProcessOutcome {
        if message.is_empty() {
            return ProcessOutcome::masked_only(message.to_string());
        }

        let (masked, collector) = self.engine.mask(message);
        if collector.is_empty() {
            return ProcessOutcome::masked_only(masked);
        }

        let trace_id = ctx.first_non_empty(&self.config().trace_id_keys);
        match self.build_envelope(&collector, trace_id) {
            Ok(secure_data) => ProcessOutcome {
                masked,
                secure_data: Some(secure_data),
                fingerprint: Some(self.fingerprint.clone()),
            },
            Err(err) => {
                warn!(error = %err, "secure-data envelope failed; emitting masked message only");
                ProcessOutcome::masked_only(masked)
            }
        }
    }

    /// Remove this pipeline's output fields from a context after emission.
    pub fn clear_context(&self, ctx: &mut Context) {
        ctx.remove(&self.config().secure_data_key);
        ctx.remove(&self.config().fingerprint_key);
    }

    fn build_envelope(&self, collector: &Collector, trace_id: Option<&str>) -> CryptoResult<String> {
        let key_info = match trace_id {
            Some(id) if !id.trim().is_empty() => {
                self.session_cache.get_or_create(id, &self.public_key)?
            }
            _ => {
                let window = system_window_id(self.config().system_id_interval_minutes);
                self.system_cache.get_or_create(&window, &self.public_key)?
            }
        };

        let mode = self.config().sm4_mode;
        let iv = crypto::sm4_generate_iv(mode);
        let payload = collector.to_json();
        let ciphertext = crypto::sm4_encrypt(mode, &key_info.sm4_key, &iv, payload.as_bytes())?;
        Ok(envelope::pack_base64(&key_info.wrapped_key, &iv, &ciphertext))
    }
}
