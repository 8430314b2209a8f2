//! SQL parameter-log masker.
//!
//! Targets the classic mapper log line: `... Parameters: v1(Type1),
//! v2(Type2), ...`. Only `String`-typed parameters are rewritten; the tail
//! is tokenized on commas with parenthesis nesting honored so commas inside
//! type names do not split entries.

use crate::collector::Collector;
use crate::masking::classify::{Classification, Classifier};
use crate::rules::is_empty_like;

const MARKER: &str = "Parameters:";

/// Mask String-typed parameters after the `Parameters:` marker. Returns
/// `Some` only when something changed.
pub fn mask_sql_parameters(
    message: &str,
    classifier: &Classifier,
    collector: &mut Collector,
) -> Option<String> {
    let marker_pos = find_marker(message)?;
    let tail_start = marker_pos + MARKER.len();
    let tail = &message[tail_start..];

    // (absolute value span, masked value, original)
    let mut replacements: Vec<(usize, usize, String, String)> = Vec::new();

    for (index, (entry_start, entry_end)) in split_entries(tail).into_iter().enumerate() {
        let entry = &tail[entry_start..entry_end];
        let Some((value_start, value_end, type_name)) = parse_entry(entry) else {
            continue;
        };
        if !type_name.eq_ignore_ascii_case("String") {
            continue;
        }
        let value = &entry[value_start..value_end];
        if is_empty_like(value) {
            continue;
        }

        let masked = match classifier.classify_shape(value) {
            Classification::Masked(masked) => masked,
            Classification::Consumed => continue,
            Classification::Unmatched => "***".to_string(),
        };
        if masked == value {
            continue;
        }

        let abs_start = tail_start + entry_start + value_start;
        let abs_end = tail_start + entry_start + value_end;
        replacements.push((abs_start, abs_end, masked, value.to_string()));
        collector.insert(&format!("sqlparameters[{index}]"), value);
    }

    if replacements.is_empty() {
        return None;
    }

    let mut out = message.to_string();
    for (start, end, masked, _) in replacements.iter().rev() {
        out.replace_range(*start..*end, masked);
    }
    Some(out)
}

/// Case-insensitive search for the `Parameters:` marker.
fn find_marker(message: &str) -> Option<usize> {
    let needle = MARKER.as_bytes();
    message
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle))
}

/// Comma-split the tail into entry byte ranges, honoring parenthesis depth.
fn split_entries(tail: &str) -> Vec<(usize, usize)> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut start = 0usize;
    for (i, b) in tail.bytes().enumerate() {
        match b {
            b'(' => depth += 1,
            b')' => depth = depth.saturating_sub(1),
            b',' if depth == 0 => {
                entries.push((start, i));
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push((start, tail.len()));
    entries
}

/// Split an entry into its value span and trailing `(TypeName)`.
///
/// The type is the final balanced parenthesis group at the end of the
/// entry; the value is everything before it, trimmed.
fn parse_entry(entry: &str) -> Option<(usize, usize, &str)> {
    let trimmed_end = entry.trim_end();
    if !trimmed_end.ends_with(')') {
        return None;
    }
    let close = trimmed_end.len() - 1;
    let bytes = trimmed_end.as_bytes();
    let mut depth = 0usize;
    let mut open = None;
    for i in (0..close + 1).rev() {
        match bytes[i] {
            b')' => depth += 1,
            b'(' => {
                depth -= 1;
                if depth == 0 {
                    open = Some(i);
                    break;
                }
            }
            _ => {}
        }
    }
    let open = open?;
    let type_name = entry[open + 1..close].trim();

    let value_region = &entry[..open];
    let value_start = value_region.len() - value_region.trim_start().len();
    let value_end = value_region.trim_end().len();
    if value_start > value_end {
        return None;
    }
    Some((value_start, value_end, type_name))
}
