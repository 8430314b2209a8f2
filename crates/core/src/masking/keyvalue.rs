//! Key/value pair masker for semi-structured log text.
//!
//! Scans for `key: value` / `key=value` pairs (ASCII or full-width
//! separator, quoted or bareword values) and rewrites the value region when
//! the key hits the sensitive set. Redaction follows the key-family map;
//! value shapes are not consulted here.

use crate::collector::Collector;
use crate::masking::classify::Classifier;
use crate::rules::{is_empty_like, is_redacted};
use regex::Regex;

pub struct KeyValueMasker {
    re: Regex,
}

impl Default for KeyValueMasker {
    fn default() -> Self {
        Self::new()
    }
}

impl KeyValueMasker {
    pub fn new() -> Self {
        // word [:=：] ("..." | '...' | bareword)
        let re = Regex::new(
            r#"\b([A-Za-z_][A-Za-z0-9_]{0,63})\s*[:=：]\s*("(?:[^"\\]|\\.)*"|'(?:[^'\\]|\\.)*'|[^\s,;&"'=]+)"#,
        )
        .expect("builtin pattern should compile");
        Self { re }
    }

    /// Returns `Some` only when at least one pair was rewritten.
    pub fn mask(
        &self,
        message: &str,
        classifier: &Classifier,
        collector: &mut Collector,
    ) -> Option<String> {
        // (value content span, masked)
        let mut replacements: Vec<(usize, usize, String)> = Vec::new();

        for caps in self.re.captures_iter(message) {
            let key = caps.get(1).expect("group 1 always participates").as_str();
            if !classifier.config.is_sensitive_key(key) && !is_implicit_sensitive(key) {
                continue;
            }

            let raw = caps.get(2).expect("group 2 always participates");
            let (content_start, content_end) = content_span(raw.as_str(), raw.start(), raw.end());
            let content = &message[content_start..content_end];
            if is_empty_like(content) || is_redacted(content) {
                continue;
            }

            let Some(masked) = classifier.family_mask(key, content) else {
                continue;
            };
            if masked == content {
                continue;
            }

            collector.insert(key, content);
            replacements.push((content_start, content_end, masked));
        }

        if replacements.is_empty() {
            return None;
        }

        let mut out = message.to_string();
        for (start, end, masked) in replacements.iter().rev() {
            out.replace_range(*start..*end, masked.as_str());
        }
        Some(out)
    }
}

/// `password`/`pwd`/`pass` are masked even when the configured sensitive
/// set was overridden without them.
fn is_implicit_sensitive(key: &str) -> bool {
    let k = key.to_ascii_lowercase();
    k == "password" || k == "pwd" || k == "pass"
}

/// Span of the value content, quotes excluded when present.
fn content_span(raw: &str, start: usize, end: usize) -> (usize, usize) {
    let quoted = raw.len() >= 2
        && ((raw.starts_with('"') && raw.ends_with('"'))
            || (raw.starts_with('\'') && raw.ends_with('\'')));
    if quoted {
        (start + 1, end - 1)
    } else {
        (start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigBuilder, SecureLogConfig, PROP_PUBLIC_KEY};
    use crate::rules::RuleSet;

    fn config() -> SecureLogConfig {
        ConfigBuilder::new().set(PROP_PUBLIC_KEY, "QUJD").build().unwrap()
    }

    fn mask(input: &str) -> (Option<String>, Vec<(String, String)>) {
        let config = config();
        let rules = RuleSet::new(&config);
        let classifier = Classifier::new(&config, &rules);
        let masker = KeyValueMasker::new();
        let mut collector = Collector::new();
        let out = masker.mask(input, &classifier, &mut collector);
        let entries = collector
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        (out, entries)
    }

    #[test]
    fn test_bareword_value() {
        let (out, entries) = mask("login failed, password=hunter42 from 10.0.0.1");
        assert_eq!(out.unwrap(), "login failed, password=*** from 10.0.0.1");
        assert_eq!(entries, vec![("password".to_string(), "hunter42".to_string())]);
    }

    #[test]
    fn test_quoted_value_keeps_quotes() {
        let (out, entries) = mask(r#"pwd: "p@ss w0rd" accepted"#);
        assert_eq!(out.unwrap(), r#"pwd: "***" accepted"#);
        assert_eq!(entries[0].1, "p@ss w0rd");
    }

    #[test]
    fn test_single_quoted_value() {
        let (out, _) = mask("secret='abcDEF1234567890XYZ'");
        assert_eq!(out.unwrap(), "secret='abcD***0XYZ'");
    }

    #[test]
    fn test_fullwidth_separator() {
        let (out, entries) = mask("mobile：13800138000");
        assert_eq!(out.unwrap(), "mobile：138****8000");
        assert_eq!(entries[0].0, "mobile");
    }

    #[test]
    fn test_non_sensitive_key_untouched() {
        let (out, _) = mask("user=alice region=cn");
        assert!(out.is_none());
    }

    #[test]
    fn test_multiple_pairs() {
        let (out, entries) = mask("password=aa pwd=bb token=abcDEF1234567890XYZ");
        assert_eq!(out.unwrap(), "password=*** pwd=*** token=abcD***0XYZ");
        assert_eq!(entries.len(), 3);
    }

    #[test]
    fn test_empty_like_value_untouched() {
        let (out, _) = mask("password=null count=0");
        assert!(out.is_none());
    }
}
