//! URL and query-string masker.
//!
//! Operates on the raw text, never through a decode/re-encode cycle, so the
//! surrounding message keeps its exact formatting. A pair's value is run
//! through the shared leaf classifier; fragments without `=` that follow a
//! sensitive key are absorbed as continuations of that value.

use crate::collector::Collector;
use crate::masking::classify::{Classification, Classifier};

/// Query-string shape test: an `=` past position 0, and either an `&` or
/// no object-ish markers at all.
pub fn looks_like_query(text: &str) -> bool {
    match text.find('=') {
        Some(i) if i >= 1 => {}
        _ => return false,
    }
    text.contains('&') || (!text.contains('{') && !text.contains(':'))
}

/// Mask a bare query string. Returns `Some` only when something changed.
///
/// Collected keys are `<prefix>.<name>` when a prefix is given, `<name>`
/// otherwise.
pub fn mask_query_string(
    input: &str,
    classifier: &Classifier,
    collector: &mut Collector,
    prefix: Option<&str>,
) -> Option<String> {
    let fragments: Vec<&str> = input.split('&').collect();
    let mut out: Vec<String> = Vec::with_capacity(fragments.len());
    let mut changed = false;

    let mut i = 0;
    while i < fragments.len() {
        let fragment = fragments[i];
        let eq = fragment.find('=');
        let Some(eq) = eq.filter(|&e| e > 0) else {
            // No key: kept verbatim (continuations are consumed below).
            out.push(fragment.to_string());
            i += 1;
            continue;
        };

        let key = &fragment[..eq];
        let value = &fragment[eq + 1..];

        // A sensitive key absorbs following keyless fragments as part of
        // its value (the original value itself contained `&`).
        let sensitive_context = classifier.config.is_sensitive_key(key);
        let mut end = i + 1;
        if sensitive_context {
            while end < fragments.len() && !fragments[end].find('=').is_some_and(|e| e > 0) {
                end += 1;
            }
        }
        let continuations = &fragments[i + 1..end];

        match classifier.classify(key, value) {
            Classification::Masked(masked) => {
                let mut original = value.to_string();
                for cont in continuations {
                    original.push('&');
                    original.push_str(cont);
                }
                collector.insert(&qualified(prefix, key), original);
                out.push(format!("{key}={masked}"));
                for _ in continuations {
                    out.push("***".to_string());
                }
                changed = true;
            }
            _ => {
                out.push(fragment.to_string());
                for cont in continuations {
                    out.push(cont.to_string());
                }
            }
        }
        i = end;
    }

    let result = out.join("&");
    (changed && result != input).then_some(result)
}

/// URL-embedded variant: mask the query run after `?`, up to the first
/// whitespace or `#`, and splice it back. Collected keys get the `query`
/// prefix. Returns `Some` only when something changed.
pub fn mask_url(
    message: &str,
    classifier: &Classifier,
    collector: &mut Collector,
) -> Option<String> {
    let qpos = message.find('?')?;
    let tail = &message[qpos + 1..];
    let end = tail
        .find(|c: char| c.is_whitespace() || c == '#')
        .unwrap_or(tail.len());
    let run = &tail[..end];
    if run.is_empty() || !looks_like_query(run) {
        return None;
    }

    let masked_run = mask_query_string(run, classifier, collector, Some("query"))?;

    let mut out = String::with_capacity(message.len() + masked_run.len() - run.len());
    out.push_str(&message[..qpos + 1]);
    out.push_str(&masked_run);
    out.push_str(&tail[end..]);
    Some(out)
}

fn qualified(prefix: Option<&str>, key: &str) -> String {
    match prefix {
        Some(p) if !p.is_empty() => format!("{p}.{key}"),
        _ => key.to_string(),
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

    fn mask(input: &str, prefix: Option<&str>) -> (Option<String>, Vec<(String, String)>) {
        let config = config();
        let rules = RuleSet::new(&config);
        let classifier = Classifier::new(&config, &rules);
        let mut collector = Collector::new();
        let out = mask_query_string(input, &classifier, &mut collector, prefix);
        let entries = collector
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        (out, entries)
    }

    #[test]
    fn test_looks_like_query() {
        assert!(looks_like_query("a=1&b=2"));
        assert!(looks_like_query("password=123456"));
        assert!(!looks_like_query("=broken"));
        assert!(!looks_like_query("no pairs here"));
        // Colon suggests structured text, needs `&` to qualify.
        assert!(!looks_like_query("time: 12:30 x=1"));
        assert!(looks_like_query("time: 12:30 x=1&y=2"));
    }

    #[test]
    fn test_basic_pairs() {
        let (out, entries) = mask("password=123456&token=abcDEF1234567890XYZ&type=1", None);
        assert_eq!(out.unwrap(), "password=***&token=abcD***0XYZ&type=1");
        assert_eq!(
            entries,
            vec![
                ("password".to_string(), "123456".to_string()),
                ("token".to_string(), "abcDEF1234567890XYZ".to_string()),
            ]
        );
    }

    #[test]
    fn test_unchanged_returns_none() {
        let (out, entries) = mask("a=1&b=2", None);
        assert!(out.is_none());
        assert!(entries.is_empty());
    }

    #[test]
    fn test_prefix_qualifies_keys() {
        let (_, entries) = mask("idcard=11010119900101001X&lang=zh", Some("query"));
        assert_eq!(entries[0].0, "query.idcard");
    }

    #[test]
    fn test_continuation_absorbed_for_sensitive_key() {
        let (out, entries) = mask("password=a&b1&c2&type=1", None);
        assert_eq!(out.unwrap(), "password=***&***&***&type=1");
        assert_eq!(entries, vec![("password".to_string(), "a&b1&c2".to_string())]);
    }

    #[test]
    fn test_keyless_fragment_without_context_kept() {
        let (out, _) = mask("orphan&mobile=13800138000", None);
        assert_eq!(out.unwrap(), "orphan&mobile=138****8000");
    }

    #[test]
    fn test_value_shape_on_plain_key() {
        let (out, entries) = mask("contact=13800138000&x=1", None);
        assert_eq!(out.unwrap(), "contact=138****8000&x=1");
        assert_eq!(entries[0].0, "contact");
    }

    #[test]
    fn test_mask_url_scenario() {
        let config = config();
        let rules = RuleSet::new(&config);
        let classifier = Classifier::new(&config, &rules);
        let mut collector = Collector::new();
        let out = mask_url(
            "GET /v1/users?idcard=11010119900101001X&lang=zh HTTP/1.1",
            &classifier,
            &mut collector,
        );
        assert_eq!(
            out.unwrap(),
            "GET /v1/users?idcard=110101********001X&lang=zh HTTP/1.1"
        );
        let entries: Vec<_> = collector.iter().collect();
        assert_eq!(entries, vec![("query.idcard", "11010119900101001X")]);
    }

    #[test]
    fn test_mask_url_fragment_terminator() {
        let config = config();
        let rules = RuleSet::new(&config);
        let classifier = Classifier::new(&config, &rules);
        let mut collector = Collector::new();
        let out = mask_url("/cb?token=abcDEF1234567890XYZ#frag", &classifier, &mut collector);
        assert_eq!(out.unwrap(), "/cb?token=abcD***0XYZ#frag");
    }

    #[test]
    fn test_mask_url_no_query() {
        let config = config();
        let rules = RuleSet::new(&config);
        let classifier = Classifier::new(&config, &rules);
        let mut collector = Collector::new();
        assert!(mask_url("GET /v1/users HTTP/1.1", &classifier, &mut collector).is_none());
    }
}
