//! Plain-text fallback masker.
//!
//! Last resort for messages no structured masker claimed: scan the whole
//! text for id-card, mobile, email and strict-address literals and rewrite
//! each match in place. No entropy scanning here; without a key context it
//! is far too noisy.

use crate::collector::Collector;
use crate::rules::RuleSet;

#[derive(Clone, Copy)]
enum Kind {
    IdCard,
    Mobile,
    Email,
    Address,
}

impl Kind {
    fn label(&self) -> &'static str {
        match self {
            Kind::IdCard => "idcard",
            Kind::Mobile => "mobile",
            Kind::Email => "email",
            Kind::Address => "address",
        }
    }

    fn format(&self, original: &str) -> String {
        match self {
            Kind::IdCard => RuleSet::mask_id_card(original),
            Kind::Mobile => RuleSet::mask_phone(original),
            Kind::Email => RuleSet::mask_email(original),
            Kind::Address => RuleSet::mask_address(original),
        }
    }
}

/// Scan and rewrite recognizer matches across the whole message.
pub fn mask_fallback(message: &str, rules: &RuleSet, collector: &mut Collector) -> String {
    // Spans are gathered per recognizer in priority order; later scans drop
    // anything overlapping an accepted span.
    let mut accepted: Vec<(usize, usize, Kind)> = Vec::new();

    let scans: [(Kind, Vec<(usize, usize)>); 4] = [
        (Kind::IdCard, rules.scan_id_cards(message)),
        (Kind::Mobile, rules.scan_mobiles(message)),
        (Kind::Email, rules.scan_emails(message)),
        (Kind::Address, rules.scan_addresses(message)),
    ];
    for (kind, spans) in scans {
        for (start, end) in spans {
            let overlaps = accepted
                .iter()
                .any(|&(s, e, _)| start < e && s < end);
            if !overlaps {
                accepted.push((start, end, kind));
            }
        }
    }

    if accepted.is_empty() {
        return message.to_string();
    }

    // Collect in document order, then splice in descending-offset order.
    accepted.sort_by_key(|&(start, _, _)| start);
    for &(start, end, kind) in &accepted {
        collector.insert(kind.label(), &message[start..end]);
    }

    let mut out = message.to_string();
    for &(start, end, kind) in accepted.iter().rev() {
        let masked = kind.format(&message[start..end]);
        out.replace_range(start..end, &masked);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ConfigBuilder, SecureLogConfig, PROP_PUBLIC_KEY};

    fn config() -> SecureLogConfig {
        ConfigBuilder::new().set(PROP_PUBLIC_KEY, "QUJD").build().unwrap()
    }

    fn mask(input: &str) -> (String, Vec<(String, String)>) {
        let config = config();
        let rules = RuleSet::new(&config);
        let mut collector = Collector::new();
        let out = mask_fallback(input, &rules, &mut collector);
        let entries = collector
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        (out, entries)
    }

    #[test]
    fn test_address_sentence() {
        let (out, entries) = mask("用户地址：北京市海淀区中关村大街1号院");
        assert_eq!(out, "用户地址：北京***号院");
        assert_eq!(
            entries,
            vec![("address".to_string(), "北京市海淀区中关村大街1号院".to_string())]
        );
    }

    #[test]
    fn test_address_without_region_untouched() {
        let (out, entries) = mask("用户地址：中关村大街1号院");
        assert_eq!(out, "用户地址：中关村大街1号院");
        assert!(entries.is_empty());
    }

    #[test]
    fn test_multiple_kinds_in_one_message() {
        let (out, entries) = mask("call 13800138000 or mail test@x.com");
        assert_eq!(out, "call 138****8000 or mail t***t@x.com");
        assert_eq!(
            entries,
            vec![
                ("mobile".to_string(), "13800138000".to_string()),
                ("email".to_string(), "test@x.com".to_string()),
            ]
        );
    }

    #[test]
    fn test_id_card_in_text() {
        let (out, entries) = mask("applicant 11010119900101001X approved");
        assert_eq!(out, "applicant 110101********001X approved");
        assert_eq!(entries[0].0, "idcard");
    }

    #[test]
    fn test_plain_text_untouched() {
        let (out, entries) = mask("User-Agent: Mozilla/5.0");
        assert_eq!(out, "User-Agent: Mozilla/5.0");
        assert!(entries.is_empty());
    }

    #[test]
    fn test_duplicate_kinds_suffixed() {
        let (_, entries) = mask("from 13800138000 to 13900139000");
        let keys: Vec<_> = entries.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(keys, vec!["mobile", "mobile1"]);
    }
}
