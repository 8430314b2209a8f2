//! Streaming JSON walker.
//!
//! Walks the token stream directly (no DOM, no regex) so byte offsets stay
//! exact for in-place replacement and path reconstruction survives escapes
//! and nesting. String leaves are classified with their surrounding key;
//! rewritten leaves are queued as byte-range replacements over the original
//! quoted token and applied in descending start-offset order.

use crate::collector::{push_json_string, Collector};
use crate::masking::classify::{Classification, Classifier};
use crate::masking::query;
use crate::rules::is_empty_like;

/// Maximum depth of embedded-JSON recursion for string leaf values.
const MAX_EMBEDDED_DEPTH: usize = 2;

/// True when the trimmed text begins and ends with matching JSON brackets.
pub fn looks_like_json(text: &str) -> bool {
    let trimmed = text.trim();
    (trimmed.starts_with('{') && trimmed.ends_with('}'))
        || (trimmed.starts_with('[') && trimmed.ends_with(']'))
}

/// Walk `input` as JSON, masking sensitive string leaves.
///
/// Returns `None` when the input does not parse as JSON (the engine then
/// falls through to the other shape maskers). `Some` is returned even when
/// nothing was rewritten.
pub fn mask_json(input: &str, classifier: &Classifier, collector: &mut Collector) -> Option<String> {
    mask_json_at_depth(input, classifier, collector, 0)
}

fn mask_json_at_depth(
    input: &str,
    classifier: &Classifier,
    collector: &mut Collector,
    depth: usize,
) -> Option<String> {
    let mut walker = Walker {
        src: input,
        bytes: input.as_bytes(),
        pos: 0,
        path: Vec::new(),
        replacements: Vec::new(),
        classifier,
        collector,
        depth,
    };

    walker.skip_ws();
    walker.parse_value()?;
    walker.skip_ws();
    if walker.pos != walker.bytes.len() {
        return None; // trailing garbage: not a JSON document
    }

    let mut out = input.to_string();
    // Descending start offsets keep earlier spans valid while splicing.
    walker.replacements.sort_by(|a, b| b.0.cmp(&a.0));
    for (start, end, replacement) in walker.replacements {
        out.replace_range(start..end, &replacement);
    }
    Some(out)
}

/// One component of the leaf path: `a.b[2].c`.
enum PathSeg {
    Field(String),
    Index(usize),
}

struct Walker<'a, 'c> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    path: Vec<PathSeg>,
    /// Byte range of the quoted token (quotes included) and its raw
    /// replacement, also quoted.
    replacements: Vec<(usize, usize, String)>,
    classifier: &'a Classifier<'a>,
    collector: &'c mut Collector,
    depth: usize,
}

impl Walker<'_, '_> {
    fn skip_ws(&mut self) {
        while let Some(&b) = self.bytes.get(self.pos) {
            if b == b' ' || b == b'\t' || b == b'\n' || b == b'\r' {
                self.pos += 1;
            } else {
                break;
            }
        }
    }

    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn expect(&mut self, byte: u8) -> Option<()> {
        if self.peek() == Some(byte) {
            self.pos += 1;
            Some(())
        } else {
            None
        }
    }

    fn parse_value(&mut self) -> Option<()> {
        self.skip_ws();
        match self.peek()? {
            b'{' => self.parse_object(),
            b'[' => self.parse_array(),
            b'"' => {
                let (start, end, value) = self.parse_string()?;
                self.classify_leaf(start, end, &value);
                Some(())
            }
            _ => self.parse_scalar(),
        }
    }

    fn parse_object(&mut self) -> Option<()> {
        self.expect(b'{')?;
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
            return Some(());
        }
        loop {
            self.skip_ws();
            let (_, _, key) = self.parse_string()?;
            self.skip_ws();
            self.expect(b':')?;
            self.path.push(PathSeg::Field(key));
            let parsed = self.parse_value();
            self.path.pop();
            parsed?;
            self.skip_ws();
            match self.peek()? {
                b',' => self.pos += 1,
                b'}' => {
                    self.pos += 1;
                    return Some(());
                }
                _ => return None,
            }
        }
    }

    fn parse_array(&mut self) -> Option<()> {
        self.expect(b'[')?;
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
            return Some(());
        }
        let mut index = 0usize;
        loop {
            self.path.push(PathSeg::Index(index));
            let parsed = self.parse_value();
            self.path.pop();
            parsed?;
            index += 1;
            self.skip_ws();
            match self.peek()? {
                b',' => self.pos += 1,
                b']' => {
                    self.pos += 1;
                    return Some(());
                }
                _ => return None,
            }
        }
    }

    /// Numbers, `true`, `false`, `null`. Never rewritten; only skipped.
    fn parse_scalar(&mut self) -> Option<()> {
        let start = self.pos;
        while let Some(b) = self.peek() {
            match b {
                b',' | b'}' | b']' | b' ' | b'\t' | b'\n' | b'\r' => break,
                _ => self.pos += 1,
            }
        }
        if self.pos == start {
            return None;
        }
        let token = &self.src[start..self.pos];
        let valid = matches!(token, "true" | "false" | "null")
            || token.parse::<f64>().is_ok();
        valid.then_some(())
    }

    /// Parse a quoted string honoring backslash escapes. Returns the byte
    /// range including both quotes and the unescaped value.
    fn parse_string(&mut self) -> Option<(usize, usize, String)> {
        let start = self.pos;
        self.expect(b'"')?;
        let mut value = String::new();
        loop {
            let rest = &self.src[self.pos..];
            let c = rest.chars().next()?;
            match c {
                '"' => {
                    self.pos += 1;
                    return Some((start, self.pos, value));
                }
                '\\' => {
                    self.pos += 1;
                    let esc = self.src[self.pos..].chars().next()?;
                    self.pos += esc.len_utf8();
                    match esc {
                        '"' => value.push('"'),
                        '\\' => value.push('\\'),
                        '/' => value.push('/'),
                        'b' => value.push('\u{0008}'),
                        'f' => value.push('\u{000C}'),
                        'n' => value.push('\n'),
                        'r' => value.push('\r'),
                        't' => value.push('\t'),
                        'u' => value.push(self.parse_unicode_escape()?),
                        _ => return None,
                    }
                }
                c => {
                    self.pos += c.len_utf8();
                    value.push(c);
                }
            }
        }
    }

    /// `\uXXXX`, combining surrogate pairs when both halves are present.
    fn parse_unicode_escape(&mut self) -> Option<char> {
        let high = self.parse_hex4()?;
        if (0xD800..0xDC00).contains(&high) {
            // High surrogate: require a following \uXXXX low surrogate.
            if self.bytes.get(self.pos) == Some(&b'\\') && self.bytes.get(self.pos + 1) == Some(&b'u')
            {
                self.pos += 2;
                let low = self.parse_hex4()?;
                if (0xDC00..0xE000).contains(&low) {
                    let combined = 0x10000 + ((high - 0xD800) << 10) + (low - 0xDC00);
                    return char::from_u32(combined);
                }
                return None;
            }
            return None;
        }
        if (0xDC00..0xE000).contains(&high) {
            return None; // lone low surrogate
        }
        char::from_u32(high)
    }

    fn parse_hex4(&mut self) -> Option<u32> {
        let hex = self.src.get(self.pos..self.pos + 4)?;
        let code = u32::from_str_radix(hex, 16).ok()?;
        self.pos += 4;
        Some(code)
    }

    /// Leaf classification per the engine contract: sensitive key, token
    /// entropy, value shapes, then nested query string, then embedded JSON.
    fn classify_leaf(&mut self, start: usize, end: usize, value: &str) {
        if is_empty_like(value) {
            return;
        }
        let key = self.current_key().unwrap_or_default();
        let path = self.path_string();

        match self.classifier.classify(&key, value) {
            Classification::Masked(masked) => {
                self.collector.insert(&path, value);
                self.push_replacement(start, end, &masked);
                return;
            }
            Classification::Consumed => return,
            Classification::Unmatched => {}
        }

        if self.classifier.config.querystring_enabled && query::looks_like_query(value) {
            if let Some(masked) =
                query::mask_query_string(value, self.classifier, self.collector, Some(&path))
            {
                self.push_replacement(start, end, &masked);
                return;
            }
        }

        if self.depth + 1 < MAX_EMBEDDED_DEPTH && looks_like_json(value) {
            if let Some(masked) =
                mask_json_at_depth(value, self.classifier, self.collector, self.depth + 1)
            {
                if masked != value {
                    self.push_replacement(start, end, &masked);
                }
            }
        }
    }

    fn push_replacement(&mut self, start: usize, end: usize, masked: &str) {
        let mut literal = String::with_capacity(masked.len() + 2);
        push_json_string(&mut literal, masked);
        self.replacements.push((start, end, literal));
    }

    /// Nearest enclosing field name; array indices do not change the key.
    fn current_key(&self) -> Option<String> {
        self.path.iter().rev().find_map(|seg| match seg {
            PathSeg::Field(name) => Some(name.clone()),
            PathSeg::Index(_) => None,
        })
    }

    fn path_string(&self) -> String {
        let mut out = String::new();
        for seg in &self.path {
            match seg {
                PathSeg::Field(name) => {
                    if !out.is_empty() {
                        out.push('.');
                    }
                    out.push_str(name);
                }
                PathSeg::Index(i) => {
                    out.push('[');
                    out.push_str(&i.to_string());
                    out.push(']');
                }
            }
        }
        out
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
        let mut collector = Collector::new();
        let out = mask_json(input, &classifier, &mut collector);
        let entries = collector
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        (out, entries)
    }

    #[test]
    fn test_simple_object() {
        let (out, entries) = mask(r#"{"user":"alice","password":"p@ssw0rd","mobile":"13800138000"}"#);
        assert_eq!(
            out.unwrap(),
            r#"{"user":"alice","password":"***","mobile":"138****8000"}"#
        );
        assert_eq!(
            entries,
            vec![
                ("password".to_string(), "p@ssw0rd".to_string()),
                ("mobile".to_string(), "13800138000".to_string()),
            ]
        );
    }

    #[test]
    fn test_nested_paths() {
        let (out, entries) = mask(r#"{"a":{"b":[{"phone":"13800138000"},{"phone":"13900139000"}]}}"#);
        assert_eq!(
            out.unwrap(),
            r#"{"a":{"b":[{"phone":"138****8000"},{"phone":"139****9000"}]}}"#
        );
        assert_eq!(entries[0].0, "a.b[0].phone");
        assert_eq!(entries[1].0, "a.b[1].phone");
    }

    #[test]
    fn test_structure_preserved_with_escapes() {
        let input = r#"{"note":"a\"b","password":"x\ny"}"#;
        let (out, entries) = mask(input);
        let out = out.unwrap();
        assert_eq!(out, r#"{"note":"a\"b","password":"***"}"#);
        assert_eq!(entries, vec![("password".to_string(), "x\ny".to_string())]);
    }

    #[test]
    fn test_value_shape_in_unnamed_field() {
        let (out, entries) = mask(r#"{"remark":"11010119900101001X"}"#);
        assert_eq!(out.unwrap(), r#"{"remark":"110101********001X"}"#);
        assert_eq!(entries[0].0, "remark");
    }

    #[test]
    fn test_array_of_strings_uses_enclosing_key() {
        let (out, entries) = mask(r#"{"phones":["13800138000","not-a-phone"]}"#);
        assert_eq!(out.unwrap(), r#"{"phones":["138****8000","not-a-phone"]}"#);
        assert_eq!(entries[0].0, "phones[0]");
    }

    #[test]
    fn test_non_json_returns_none() {
        assert!(mask("not json at all").0.is_none());
        assert!(mask(r#"{"broken": }"#).0.is_none());
        assert!(mask(r#"{"a":1} trailing"#).0.is_none());
    }

    #[test]
    fn test_numbers_and_literals_untouched() {
        let input = r#"{"count":42,"ratio":-1.5e3,"ok":true,"missing":null}"#;
        let (out, entries) = mask(input);
        assert_eq!(out.unwrap(), input);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_empty_like_values_skipped() {
        let input = r#"{"password":"","mobile":"null","email":"  "}"#;
        let (out, entries) = mask(input);
        assert_eq!(out.unwrap(), input);
        assert!(entries.is_empty());
    }

    #[test]
    fn test_embedded_json_value() {
        let input = r#"{"payload":"{\"password\":\"secret1\"}"}"#;
        let (out, entries) = mask(input);
        assert_eq!(out.unwrap(), r#"{"payload":"{\"password\":\"***\"}"}"#);
        assert_eq!(entries, vec![("password".to_string(), "secret1".to_string())]);
    }

    #[test]
    fn test_embedded_query_string_value() {
        let input = r#"{"body":"password=123456&type=1"}"#;
        let (out, entries) = mask(input);
        assert_eq!(out.unwrap(), r#"{"body":"password=***&type=1"}"#);
        assert_eq!(entries, vec![("body.password".to_string(), "123456".to_string())]);
    }

    #[test]
    fn test_unicode_escape_roundtrip() {
        let input = r#"{"name":"张三","password":"abc"}"#;
        let (out, entries) = mask(input);
        assert_eq!(out.unwrap(), r#"{"name":"张三","password":"***"}"#);
        assert_eq!(entries, vec![("password".to_string(), "abc".to_string())]);
    }

    #[test]
    fn test_masked_output_reparses() {
        let input = r#"{"a":[{"idcard":"11010119900101001X"}],"b":{"email":"test@x.com"}}"#;
        let (out, _) = mask(input);
        let out = out.unwrap();
        let original: serde_json::Value = serde_json::from_str(input).unwrap();
        let masked: serde_json::Value = serde_json::from_str(&out).unwrap();
        // Same structure: keys and array lengths survive.
        assert_eq!(
            original.as_object().unwrap().keys().collect::<Vec<_>>(),
            masked.as_object().unwrap().keys().collect::<Vec<_>>()
        );
        assert_eq!(
            original["a"].as_array().unwrap().len(),
            masked["a"].as_array().unwrap().len()
        );
    }
}
