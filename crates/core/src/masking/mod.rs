//! Structured masking engine.
//!
//! One message comes in, the first shape masker that claims it wins:
//! JSON is tried first because any later heuristic would corrupt its
//! structure, the SQL parameter masker is specific enough to precede the
//! generic scanners, and the plain-text fallback is the safety net.

mod classify;
mod fallback;
mod json;
mod keyvalue;
mod query;
mod sql;

pub use classify::{Classification, Classifier};

use crate::collector::Collector;
use crate::config::SecureLogConfig;
use crate::rules::RuleSet;

pub struct MaskingEngine {
    config: SecureLogConfig,
    rules: RuleSet,
    keyvalue: keyvalue::KeyValueMasker,
}

impl MaskingEngine {
    pub fn new(config: SecureLogConfig) -> Self {
        let rules = RuleSet::new(&config);
        Self {
            config,
            rules,
            keyvalue: keyvalue::KeyValueMasker::new(),
        }
    }

    pub fn config(&self) -> &SecureLogConfig {
        &self.config
    }

    /// Mask one message, returning the rewritten text and the collected
    /// originals. Malformed input never fails; a shape misdetection falls
    /// through to the next shape.
    pub fn mask(&self, message: &str) -> (String, Collector) {
        let mut collector = Collector::new();
        let classifier = Classifier::new(&self.config, &self.rules);

        if json::looks_like_json(message) {
            if let Some(masked) = json::mask_json(message, &classifier, &mut collector) {
                return (masked, collector);
            }
        }

        if let Some(masked) = sql::mask_sql_parameters(message, &classifier, &mut collector) {
            return (masked, collector);
        }

        if self.config.querystring_enabled {
            if let Some(masked) = query::mask_url(message, &classifier, &mut collector) {
                return (masked, collector);
            }
            if query::looks_like_query(message) {
                let masked = query::mask_query_string(message, &classifier, &mut collector, None)
                    .unwrap_or_else(|| message.to_string());
                return (masked, collector);
            }
        }

        if let Some(masked) = self.keyvalue.mask(message, &classifier, &mut collector) {
            return (masked, collector);
        }

        if self.config.fallback_enabled {
            let masked = fallback::mask_fallback(message, &self.rules, &mut collector);
            return (masked, collector);
        }

        (message.to_string(), collector)
    }
}
