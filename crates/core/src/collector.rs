//! Per-record accumulator for original sensitive values.
//!
//! The masking engine inserts `(path, original)` pairs as it rewrites
//! leaves; the envelope builder serializes the accumulated pairs to a
//! compact JSON object. Insertion order is preserved so the audit output
//! reads in document order.

/// Insertion-ordered map of path-qualified keys to original values.
///
/// Keys are normalized at insertion (lowercased, whitespace stripped).
/// Duplicate keys get numeric suffixes: the first occurrence keeps the
/// base name, later ones become `key1`, `key2`, and so on.
#[derive(Debug, Default)]
pub struct Collector {
    entries: Vec<(String, String)>,
}

impl Collector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an original value under a path-qualified key.
    pub fn insert(&mut self, path_key: &str, original: impl Into<String>) {
        let base = crate::config::normalize_key(path_key);
        let base = if base.is_empty() { "value".to_string() } else { base };

        let mut key = base.clone();
        let mut suffix = 0usize;
        while self.entries.iter().any(|(k, _)| *k == key) {
            suffix += 1;
            key = format!("{base}{suffix}");
        }
        self.entries.push((key, original.into()));
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Iterate entries in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Serialize to a compact JSON object, `{"k1":"v1",...}`, in insertion
    /// order. This is the exact payload the envelope encrypts.
    pub fn to_json(&self) -> String {
        let mut out = String::with_capacity(self.entries.len() * 24 + 2);
        out.push('{');
        for (i, (key, value)) in self.entries.iter().enumerate() {
            if i > 0 {
                out.push(',');
            }
            push_json_string(&mut out, key);
            out.push(':');
            push_json_string(&mut out, value);
        }
        out.push('}');
        out
    }
}

/// Append a JSON string literal, escaping backslash, quote and controls.
pub(crate) fn push_json_string(out: &mut String, s: &str) {
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\u{0008}' => out.push_str("\\b"),
            '\u{000C}' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if (c as u32) < 0x20 => {
                out.push_str(&format!("\\u{:04x}", c as u32));
            }
            c => out.push(c),
        }
    }
    out.push('"');
}
