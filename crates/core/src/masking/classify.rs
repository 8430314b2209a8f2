//! Shared leaf classifier used by the JSON, query-string and key/value
//! maskers.
//!
//! Order per leaf: strong-sensitive key (redacted by key family), token-like
//! key gated by the entropy check, then value-shape recognizers. The shape
//! maskers own anything beyond that (nested query strings, embedded JSON).

use crate::config::SecureLogConfig;
use crate::rules::{is_empty_like, is_redacted, RuleSet};

/// What the classifier decided for one leaf.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Classification {
    /// Value rewritten; the caller collects the original.
    Masked(String),
    /// A sensitive key claimed the value but left it unchanged
    /// (address family failing the strict gate, or a no-op redaction).
    Consumed,
    /// No rule matched; the caller may try further shapes.
    Unmatched,
}

pub struct Classifier<'a> {
    pub config: &'a SecureLogConfig,
    pub rules: &'a RuleSet,
}

impl<'a> Classifier<'a> {
    pub fn new(config: &'a SecureLogConfig, rules: &'a RuleSet) -> Self {
        Self { config, rules }
    }

    /// Classify a leaf with its surrounding key.
    pub fn classify(&self, key: &str, value: &str) -> Classification {
        if is_empty_like(value) {
            return Classification::Unmatched;
        }
        if is_redacted(value) {
            return Classification::Consumed;
        }

        if self.config.is_sensitive_key(key) {
            return match self.family_mask(key, value) {
                Some(masked) if masked != value => Classification::Masked(masked),
                _ => Classification::Consumed,
            };
        }

        if self.config.is_tokenlike_key(key) && self.rules.is_high_entropy_token(value) {
            let masked = self.rules.mask_token(value);
            return if masked != value {
                Classification::Masked(masked)
            } else {
                Classification::Consumed
            };
        }

        self.classify_shape(value)
    }

    /// Value-shape recognizers in priority order; first match wins.
    pub fn classify_shape(&self, value: &str) -> Classification {
        if is_empty_like(value) {
            return Classification::Unmatched;
        }
        if is_redacted(value) {
            return Classification::Consumed;
        }
        let masked = if self.rules.is_id_card(value) {
            RuleSet::mask_id_card(value)
        } else if self.rules.is_mobile(value) {
            RuleSet::mask_phone(value)
        } else if self.rules.is_email(value) {
            RuleSet::mask_email(value)
        } else if self.rules.is_strict_address(value) {
            RuleSet::mask_address(value)
        } else {
            return Classification::Unmatched;
        };
        if masked != value {
            Classification::Masked(masked)
        } else {
            Classification::Consumed
        }
    }

    /// Key-family redaction for strong-sensitive keys. `None` means the
    /// family leaves the value untouched (non-strict address).
    pub fn family_mask(&self, key: &str, value: &str) -> Option<String> {
        let k = family_key(key);
        if k.contains("password") || k == "pwd" || k == "pass" {
            Some(RuleSet::mask_password())
        } else if k.contains("token")
            || k.contains("secret")
            || k.contains("apikey")
            || k.contains("clientsecret")
            || k == "key"
        {
            Some(self.rules.mask_token(value))
        } else if k.contains("idcard") || k.contains("cardnumber") {
            Some(RuleSet::mask_id_card(value))
        } else if k.contains("mobile") || k.contains("phone") || k.contains("tel") {
            Some(RuleSet::mask_phone(value))
        } else if k.contains("email") {
            Some(RuleSet::mask_email(value))
        } else if k.contains("address") {
            if self.rules.is_strict_address(value) {
                Some(RuleSet::mask_address(value))
            } else {
                None
            }
        } else {
            Some("***".to_string())
        }
    }
}

/// Key form used for family matching: lowercased, whitespace and
/// underscores stripped, so `access_token` and `accessToken` land on the
/// same family.
fn family_key(key: &str) -> String {
    crate::config::normalize_key(key).replace('_', "")
}
