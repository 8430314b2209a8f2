//! Ambient per-record context (mapped diagnostic context stand-in).
//!
//! The logging adapter owns a context per thread or task and passes it to
//! [`crate::processor::RecordProcessor::process`] explicitly; the core never
//! reads globals. Trace ids are read from it, and the adapter writes the
//! processor's outputs back into it for the emitting layout to pick up.

use std::collections::HashMap;

/// A flat string key-value store scoped to one log record's thread/task.
#[derive(Debug, Clone, Default)]
pub struct Context {
    values: HashMap<String, String>,
}

impl Context {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn put(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// First non-empty value among `keys`, in declared order.
    pub fn first_non_empty(&self, keys: &[String]) -> Option<&str> {
        keys.iter()
            .filter_map(|k| self.get(k))
            .find(|v| !v.trim().is_empty())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for Context {
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self {
            values: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_first_non_empty_respects_order() {
        let ctx: Context = [("traceId", "abc"), ("trace_id", "  ")].into_iter().collect();
        let keys = vec!["trace_id".to_string(), "traceId".to_string()];
        assert_eq!(ctx.first_non_empty(&keys), Some("abc"));
    }

    #[test]
    fn test_first_non_empty_none() {
        let ctx = Context::new();
        let keys = vec!["trace_id".to_string()];
        assert_eq!(ctx.first_non_empty(&keys), None);
    }

    #[test]
    fn test_put_remove() {
        let mut ctx = Context::new();
        ctx.put("SECURE_DATA", "payload");
        assert_eq!(ctx.get("SECURE_DATA"), Some("payload"));
        assert_eq!(ctx.remove("SECURE_DATA"), Some("payload".to_string()));
        assert!(ctx.get("SECURE_DATA").is_none());
    }
}
