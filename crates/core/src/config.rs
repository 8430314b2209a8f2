//! Configuration snapshot for the secure logging pipeline.
//!
//! A flat string property bag (`securelog-ecc.properties` in the working
//! directory, overlaid with programmatic overrides) is parsed once into an
//! immutable [`SecureLogConfig`]. Every tunable consumed by the masking
//! rules, key caches and crypto facade lives here; nothing re-reads
//! properties after the snapshot is built.

use crate::errors::ConfigError;
use serde::Serialize;
use std::collections::{BTreeMap, HashSet};
use std::path::Path;

/// Default properties file looked up in the working directory.
pub const DEFAULT_PROPERTIES_FILE: &str = "securelog-ecc.properties";

// Property keys.
pub const PROP_PUBLIC_KEY: &str = "ecc.public.key";
pub const PROP_PROVIDER: &str = "ecc.crypto.provider";
pub const PROP_SM2_CURVE: &str = "ecc.sm2.curve.name";
pub const PROP_SM2_TRANSFORMATION: &str = "ecc.sm2.cipher.transformation";
pub const PROP_SM4_TRANSFORMATION: &str = "ecc.sm4.cipher.transformation";
pub const PROP_SESSION_CACHE_SIZE: &str = "ecc.session.key.cache.size";
pub const PROP_SESSION_CACHE_BUFFER: &str = "ecc.session.key.cache.buffer.percentage";
pub const PROP_SYSTEM_CACHE_SIZE: &str = "ecc.system.key.cache.size";
pub const PROP_SYSTEM_CACHE_BUFFER: &str = "ecc.system.key.cache.buffer.percentage";
pub const PROP_SYSTEM_ID_INTERVAL: &str = "ecc.system.id.change.interval.minutes";
pub const PROP_SECURE_DATA_KEY: &str = "mdc.secure.data.key";
pub const PROP_FINGERPRINT_KEY: &str = "mdc.pub.key.fingerprint.key";
pub const PROP_TRACE_ID_KEYS: &str = "mdc.trace.id.keys";
pub const PROP_SENSITIVE_KEYS: &str = "ecc.masking.sensitive.keys";
pub const PROP_TOKENLIKE_KEYS: &str = "ecc.masking.tokenlike.keys";
pub const PROP_QUERYSTRING_ENABLED: &str = "ecc.masking.querystring.enabled";
pub const PROP_FALLBACK_ENABLED: &str = "ecc.masking.fallback.enabled";
pub const PROP_ADDRESS_REQUIRE_REGION: &str = "ecc.masking.address.require.region";
pub const PROP_ADDRESS_REQUIRE_DETAIL: &str = "ecc.masking.address.require.detail";
pub const PROP_ADDRESS_REGION_KEYWORDS: &str = "ecc.masking.address.region.keywords";
pub const PROP_ADDRESS_DETAIL_KEYWORDS: &str = "ecc.masking.address.detail.keywords";
pub const PROP_ADDRESS_EXCLUDE_KEYWORDS: &str = "ecc.masking.address.exclude.keywords";
pub const PROP_HIGH_ENTROPY_ENABLED: &str = "ecc.masking.high.entropy.enabled";
pub const PROP_HIGH_ENTROPY_MIXED: &str = "ecc.masking.high.entropy.require.upper.lower.digit";
pub const PROP_TOKEN_KEEP_PREFIX: &str = "ecc.masking.token.keep.prefix";
pub const PROP_TOKEN_KEEP_SUFFIX: &str = "ecc.masking.token.keep.suffix";
pub const PROP_MAX_VALUE_LENGTH: &str = "ecc.masking.max.value.length";
pub const PROP_HIGH_ENTROPY_MIN_LENGTH: &str = "ecc.masking.high.entropy.min.length";
pub const PROP_HIGH_ENTROPY_THRESHOLD: &str = "ecc.masking.high.entropy.threshold";

const DEFAULT_SENSITIVE_KEYS: &str = "password,pwd,pass,token,access_token,clientSecret,\
secret,apiKey,idcard,cardNumber,jbrCardNumber,mobile,phone,tel,email,address";

const DEFAULT_TOKENLIKE_KEYS: &str =
    "token,access_token,clientSecret,secret,apiKey,key,auth,credential";

const DEFAULT_TRACE_ID_KEYS: &str =
    "trace_id,traceId,requestId,correlationId,X-Trace-Code,X-Trace-Id";

/// SM2 ciphertext component ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sm2Transformation {
    /// Current GB/T ordering (the `SM2` transformation name).
    C1C3C2,
    /// Legacy ordering, accepted for compatibility.
    C1C2C3,
}

/// SM4 block cipher mode, parsed from the transformation string.
///
/// The mode also fixes the IV policy: 12 random bytes for GCM, 16 for the
/// block and stream modes, none for ECB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sm4Mode {
    Ecb,
    Cbc,
    Ctr,
    Cfb,
    Ofb,
    Gcm,
}

impl Sm4Mode {
    /// IV length in bytes required by this mode.
    pub fn iv_len(&self) -> usize {
        match self {
            Sm4Mode::Gcm => 12,
            Sm4Mode::Ecb => 0,
            _ => 16,
        }
    }
}

/// Immutable parsed view of all tunables.
#[derive(Debug, Clone, Serialize)]
pub struct SecureLogConfig {
    /// Base64 X.509 SM2 public key.
    pub public_key: String,
    /// Declared provider name. Accepted for config compatibility; the
    /// provider is compiled in.
    pub provider: String,
    /// SM2 curve name (only sm2p256v1 is compiled in).
    pub sm2_curve: String,
    pub sm2_transformation: Sm2Transformation,
    pub sm4_mode: Sm4Mode,

    pub session_cache_size: usize,
    pub session_cache_buffer: f64,
    pub system_cache_size: usize,
    pub system_cache_buffer: f64,
    pub system_id_interval_minutes: u64,

    /// Context field name the adapter writes the envelope under.
    pub secure_data_key: String,
    /// Context field name for the public-key fingerprint.
    pub fingerprint_key: String,
    /// Ordered trace-id lookup keys.
    pub trace_id_keys: Vec<String>,

    /// Strong-sensitive key set, lowercased with underscore-stripped aliases.
    pub sensitive_keys: HashSet<String>,
    /// Token-like key set, normalized the same way.
    pub tokenlike_keys: HashSet<String>,

    pub querystring_enabled: bool,
    pub fallback_enabled: bool,
    pub address_require_region: bool,
    pub address_require_detail: bool,
    pub address_region_keywords: Vec<String>,
    pub address_detail_keywords: Vec<String>,
    pub address_exclude_keywords: Vec<String>,
    pub high_entropy_enabled: bool,
    pub high_entropy_require_mixed: bool,
    pub token_keep_prefix: usize,
    pub token_keep_suffix: usize,
    pub max_value_length: usize,
    pub high_entropy_min_length: usize,
    pub high_entropy_threshold: f64,
}

impl SecureLogConfig {
    /// Membership test against the sensitive-key set (input is normalized).
    pub fn is_sensitive_key(&self, key: &str) -> bool {
        self.sensitive_keys.contains(normalize_key(key).as_str())
    }

    /// Membership test against the token-like key set.
    pub fn is_tokenlike_key(&self, key: &str) -> bool {
        self.tokenlike_keys.contains(normalize_key(key).as_str())
    }
}

/// Builder merging property sources in resolution order: embedded defaults,
/// then the properties file, then programmatic overrides.
#[derive(Debug, Default)]
pub struct ConfigBuilder {
    properties: BTreeMap<String, String>,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Merge the working-directory properties file if present.
    pub fn load_default_file(self) -> Result<Self, ConfigError> {
        if Path::new(DEFAULT_PROPERTIES_FILE).is_file() {
            self.load_file(DEFAULT_PROPERTIES_FILE)
        } else {
            Ok(self)
        }
    }

    /// Merge a properties file. Later sources win over earlier ones.
    pub fn load_file(mut self, path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let parsed = parse_properties(&text);
        tracing::debug!(path = %path.display(), entries = parsed.len(), "loaded properties file");
        self.properties.extend(parsed);
        Ok(self)
    }

    /// Set a single property, overriding any file-provided value.
    pub fn set(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.properties.insert(key.into(), value.into());
        self
    }

    fn get(&self, key: &str) -> Option<&str> {
        self.properties.get(key).map(String::as_str).filter(|v| !v.trim().is_empty())
    }

    fn get_or(&self, key: &str, default: &str) -> String {
        self.get(key).unwrap_or(default).trim().to_string()
    }

    /// Parse the accumulated properties into an immutable snapshot.
    pub fn build(self) -> Result<SecureLogConfig, ConfigError> {
        let public_key = self
            .get(PROP_PUBLIC_KEY)
            .map(str::to_string)
            .ok_or(ConfigError::MissingProperty(PROP_PUBLIC_KEY))?;

        let sm2_curve = self.get_or(PROP_SM2_CURVE, "sm2p256v1");
        if !sm2_curve.eq_ignore_ascii_case("sm2p256v1") {
            return Err(ConfigError::UnsupportedCurve(sm2_curve));
        }

        let sm2_transformation = parse_sm2_transformation(&self.get_or(PROP_SM2_TRANSFORMATION, "SM2"))?;
        let sm4_mode = parse_sm4_transformation(&self.get_or(PROP_SM4_TRANSFORMATION, "SM4/GCM/NoPadding"))?;

        let config = SecureLogConfig {
            public_key,
            provider: self.get_or(PROP_PROVIDER, ""),
            sm2_curve,
            sm2_transformation,
            sm4_mode,
            session_cache_size: self.parse_capacity(PROP_SESSION_CACHE_SIZE, 30_000)?,
            session_cache_buffer: self.parse_ratio(PROP_SESSION_CACHE_BUFFER, 0.05)?,
            system_cache_size: self.parse_capacity(PROP_SYSTEM_CACHE_SIZE, 1_000)?,
            system_cache_buffer: self.parse_ratio(PROP_SYSTEM_CACHE_BUFFER, 0.10)?,
            system_id_interval_minutes: self
                .parse_usize(PROP_SYSTEM_ID_INTERVAL, 15)?
                .max(1) as u64,
            secure_data_key: self.get_or(PROP_SECURE_DATA_KEY, "SECURE_DATA"),
            fingerprint_key: self.get_or(PROP_FINGERPRINT_KEY, "PUB_KEY_FINGERPRINT"),
            trace_id_keys: split_list(&self.get_or(PROP_TRACE_ID_KEYS, DEFAULT_TRACE_ID_KEYS)),
            sensitive_keys: normalize_key_set(&self.get_or(PROP_SENSITIVE_KEYS, DEFAULT_SENSITIVE_KEYS)),
            tokenlike_keys: normalize_key_set(&self.get_or(PROP_TOKENLIKE_KEYS, DEFAULT_TOKENLIKE_KEYS)),
            querystring_enabled: self.parse_bool(PROP_QUERYSTRING_ENABLED, true)?,
            fallback_enabled: self.parse_bool(PROP_FALLBACK_ENABLED, true)?,
            address_require_region: self.parse_bool(PROP_ADDRESS_REQUIRE_REGION, true)?,
            address_require_detail: self.parse_bool(PROP_ADDRESS_REQUIRE_DETAIL, true)?,
            address_region_keywords: split_list(&self.get_or(PROP_ADDRESS_REGION_KEYWORDS, "省,市,区,县")),
            address_detail_keywords: split_list(&self.get_or(
                PROP_ADDRESS_DETAIL_KEYWORDS,
                "街,路,道,巷,镇,乡,号,院,楼,室",
            )),
            address_exclude_keywords: split_list(&self.get_or(PROP_ADDRESS_EXCLUDE_KEYWORDS, "")),
            high_entropy_enabled: self.parse_bool(PROP_HIGH_ENTROPY_ENABLED, true)?,
            high_entropy_require_mixed: self.parse_bool(PROP_HIGH_ENTROPY_MIXED, true)?,
            token_keep_prefix: self.parse_usize(PROP_TOKEN_KEEP_PREFIX, 4)?,
            token_keep_suffix: self.parse_usize(PROP_TOKEN_KEEP_SUFFIX, 4)?,
            max_value_length: self.parse_usize(PROP_MAX_VALUE_LENGTH, 50)?,
            high_entropy_min_length: self.parse_usize(PROP_HIGH_ENTROPY_MIN_LENGTH, 20)?,
            high_entropy_threshold: self.parse_f64(PROP_HIGH_ENTROPY_THRESHOLD, 3.5)?,
        };

        if !config.provider.is_empty() {
            tracing::debug!(provider = %config.provider, "provider property accepted (compiled-in primitives are used)");
        }

        Ok(config)
    }

    fn parse_bool(&self, key: &'static str, default: bool) -> Result<bool, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => match v.trim().to_ascii_lowercase().as_str() {
                "true" => Ok(true),
                "false" => Ok(false),
                _ => Err(ConfigError::InvalidProperty { key, value: v.to_string() }),
            },
        }
    }

    fn parse_usize(&self, key: &'static str, default: usize) -> Result<usize, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidProperty {
                key,
                value: v.to_string(),
            }),
        }
    }

    fn parse_capacity(&self, key: &'static str, default: usize) -> Result<usize, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => {
                let n: i64 = v.trim().parse().map_err(|_| ConfigError::InvalidProperty {
                    key,
                    value: v.to_string(),
                })?;
                if n <= 0 {
                    return Err(ConfigError::InvalidCacheSize(n));
                }
                Ok(n as usize)
            }
        }
    }

    fn parse_f64(&self, key: &'static str, default: f64) -> Result<f64, ConfigError> {
        match self.get(key) {
            None => Ok(default),
            Some(v) => v.trim().parse().map_err(|_| ConfigError::InvalidProperty {
                key,
                value: v.to_string(),
            }),
        }
    }

    /// Ratio properties are clamped to [0, 1].
    fn parse_ratio(&self, key: &'static str, default: f64) -> Result<f64, ConfigError> {
        Ok(self.parse_f64(key, default)?.clamp(0.0, 1.0))
    }
}

fn parse_sm2_transformation(value: &str) -> Result<Sm2Transformation, ConfigError> {
    match value.trim().to_ascii_uppercase().as_str() {
        "SM2" | "SM2/C1C3C2" => Ok(Sm2Transformation::C1C3C2),
        "SM2/C1C2C3" => Ok(Sm2Transformation::C1C2C3),
        _ => Err(ConfigError::UnsupportedTransformation(value.to_string())),
    }
}

fn parse_sm4_transformation(value: &str) -> Result<Sm4Mode, ConfigError> {
    let upper = value.trim().to_ascii_uppercase();
    let mode = upper.split('/').nth(1).unwrap_or(upper.as_str());
    match mode {
        "ECB" => Ok(Sm4Mode::Ecb),
        "CBC" => Ok(Sm4Mode::Cbc),
        "CTR" => Ok(Sm4Mode::Ctr),
        "CFB" => Ok(Sm4Mode::Cfb),
        "OFB" => Ok(Sm4Mode::Ofb),
        "GCM" => Ok(Sm4Mode::Gcm),
        _ => Err(ConfigError::UnsupportedTransformation(value.to_string())),
    }
}

/// Lowercase and strip whitespace from a key for set membership.
pub fn normalize_key(key: &str) -> String {
    key.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Build a normalized key set with underscore-stripped aliases
/// (`access_token` also registers `accesstoken`).
fn normalize_key_set(csv: &str) -> HashSet<String> {
    let mut set = HashSet::new();
    for entry in csv.split(',') {
        let normalized = normalize_key(entry);
        if normalized.is_empty() {
            continue;
        }
        if normalized.contains('_') {
            set.insert(normalized.replace('_', ""));
        }
        set.insert(normalized);
    }
    set
}

fn split_list(csv: &str) -> Vec<String> {
    csv.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Parse flat `key=value` properties. `#` and `!` start comment lines.
fn parse_properties(text: &str) -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with('!') {
            continue;
        }
        if let Some(eq) = line.find('=') {
            let key = line[..eq].trim();
            let value = line[eq + 1..].trim();
            if !key.is_empty() {
                map.insert(key.to_string(), value.to_string());
            }
        }
    }
    map
}
