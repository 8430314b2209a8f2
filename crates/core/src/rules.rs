//! Masking rule primitives: value-shape recognizers and redaction
//! formatters.
//!
//! Recognizers are deterministic predicates over a single string. The
//! anchored variants are used for whole values (JSON leaves, query
//! parameters); the scan variants locate candidates inside free text and
//! pair with manual boundary checks, since the regex engine has no
//! lookaround.

use crate::config::SecureLogConfig;
use regex::Regex;

const ID_CARD_CORE: &str =
    r"[1-9]\d{5}(?:18|19|20)\d{2}(?:0[1-9]|1[0-2])(?:0[1-9]|[12]\d|3[01])\d{3}[0-9Xx]";
const MOBILE_CORE: &str = r"(?:\+86|86-)?1\d{10}";
const EMAIL_CORE: &str = r"(?i)[A-Za-z0-9._%+-]{1,64}@[A-Za-z0-9.-]{1,255}\.[A-Za-z]{2,}";

/// Compiled recognizers plus the tunables they consult.
pub struct RuleSet {
    id_card_full: Regex,
    id_card_scan: Regex,
    mobile_full: Regex,
    mobile_scan: Regex,
    email_full: Regex,
    email_scan: Regex,
    uuid_full: Regex,
    hex_block_full: Regex,
    user_agent_scan: Regex,
    address_candidate_scan: Regex,

    max_value_length: usize,
    token_keep_prefix: usize,
    token_keep_suffix: usize,
    high_entropy_enabled: bool,
    high_entropy_require_mixed: bool,
    high_entropy_min_length: usize,
    high_entropy_threshold: f64,
    address_require_region: bool,
    address_require_detail: bool,
    address_region_keywords: Vec<String>,
    address_detail_keywords: Vec<String>,
    address_exclude_keywords: Vec<String>,
}

impl RuleSet {
    /// Compile the recognizers for a configuration snapshot.
    pub fn new(config: &SecureLogConfig) -> Self {
        let full = |core: &str| {
            Regex::new(&format!("^(?:{core})$")).expect("builtin pattern should compile")
        };
        let scan = |core: &str| Regex::new(core).expect("builtin pattern should compile");

        Self {
            id_card_full: full(ID_CARD_CORE),
            id_card_scan: scan(ID_CARD_CORE),
            mobile_full: full(MOBILE_CORE),
            mobile_scan: scan(MOBILE_CORE),
            email_full: full(EMAIL_CORE),
            email_scan: scan(EMAIL_CORE),
            uuid_full: full(r"[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}"),
            hex_block_full: full(r"[0-9a-fA-F]{32}|[0-9a-fA-F]{40}|[0-9a-fA-F]{64}"),
            user_agent_scan: scan(r"[A-Za-z][A-Za-z0-9._-]*/\d+\.\d+(?:\.\d+)*"),
            address_candidate_scan: scan(r"[\p{Han}][\p{Han}0-9A-Za-z\-#号楼室栋单元层街路巷弄]{4,}"),

            max_value_length: config.max_value_length,
            token_keep_prefix: config.token_keep_prefix,
            token_keep_suffix: config.token_keep_suffix,
            high_entropy_enabled: config.high_entropy_enabled,
            high_entropy_require_mixed: config.high_entropy_require_mixed,
            high_entropy_min_length: config.high_entropy_min_length,
            high_entropy_threshold: config.high_entropy_threshold,
            address_require_region: config.address_require_region,
            address_require_detail: config.address_require_detail,
            address_region_keywords: config.address_region_keywords.clone(),
            address_detail_keywords: config.address_detail_keywords.clone(),
            address_exclude_keywords: config.address_exclude_keywords.clone(),
        }
    }

    fn in_bounds(&self, value: &str) -> bool {
        !is_empty_like(value) && value.chars().count() <= self.max_value_length
    }

    /// 18-digit Chinese resident id, full match.
    pub fn is_id_card(&self, value: &str) -> bool {
        self.in_bounds(value) && self.id_card_full.is_match(value)
    }

    /// Mainland mobile number with optional country prefix, full match.
    pub fn is_mobile(&self, value: &str) -> bool {
        self.in_bounds(value) && self.mobile_full.is_match(value)
    }

    /// RFC-lite email, full match.
    pub fn is_email(&self, value: &str) -> bool {
        self.in_bounds(value) && self.email_full.is_match(value)
    }

    /// Two-stage keyword gate: at least one region keyword and one detail
    /// keyword (each gate can be disabled), and no exclude keyword.
    pub fn is_strict_address(&self, value: &str) -> bool {
        if !self.in_bounds(value) {
            return false;
        }
        if self.address_require_region
            && !self.address_region_keywords.iter().any(|k| value.contains(k.as_str()))
        {
            return false;
        }
        if self.address_require_detail
            && !self.address_detail_keywords.iter().any(|k| value.contains(k.as_str()))
        {
            return false;
        }
        !self.address_exclude_keywords.iter().any(|k| value.contains(k.as_str()))
    }

    /// Entropy-gated secret detector. Only meaningful when the surrounding
    /// key is token-like; the caller is responsible for that gate.
    pub fn is_high_entropy_token(&self, value: &str) -> bool {
        if !self.high_entropy_enabled || is_empty_like(value) {
            return false;
        }
        let len = value.chars().count();
        if len < self.high_entropy_min_length || len > self.max_value_length {
            return false;
        }
        // Structured identifiers and URLs score high on entropy but are not
        // secrets.
        let lower = value.to_ascii_lowercase();
        if lower.contains("://") || lower.starts_with("data:image") || lower.contains("base64") {
            return false;
        }
        if self.uuid_full.is_match(value) || self.hex_block_full.is_match(value) {
            return false;
        }
        if self.user_agent_scan.is_match(value) {
            return false;
        }
        if self.high_entropy_require_mixed {
            let has_upper = value.chars().any(|c| c.is_ascii_uppercase());
            let has_lower = value.chars().any(|c| c.is_ascii_lowercase());
            let has_digit = value.chars().any(|c| c.is_ascii_digit());
            if !(has_upper && has_lower && has_digit) {
                return false;
            }
        }
        shannon_entropy(value.as_bytes()) >= self.high_entropy_threshold
    }

    /// Candidate byte ranges for free-text scanning, boundary-checked.
    pub fn scan_id_cards(&self, text: &str) -> Vec<(usize, usize)> {
        scan_bounded(&self.id_card_scan, text, Boundary::NonAlphanumeric)
    }

    pub fn scan_mobiles(&self, text: &str) -> Vec<(usize, usize)> {
        scan_bounded(&self.mobile_scan, text, Boundary::NonDigit)
    }

    pub fn scan_emails(&self, text: &str) -> Vec<(usize, usize)> {
        scan_bounded(&self.email_scan, text, Boundary::NonWord)
    }

    /// Address candidates: CJK runs that pass the strict two-stage gate.
    pub fn scan_addresses(&self, text: &str) -> Vec<(usize, usize)> {
        self.address_candidate_scan
            .find_iter(text)
            .filter(|m| self.is_strict_address(m.as_str()))
            .map(|m| (m.start(), m.end()))
            .collect()
    }

    // Formatters.

    /// First 6 + eight stars + last 4; `***` when shorter than 10.
    pub fn mask_id_card(value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        if chars.len() < 10 {
            return "***".to_string();
        }
        let mut out: String = chars[..6].iter().collect();
        out.push_str("********");
        out.extend(&chars[chars.len() - 4..]);
        out
    }

    /// Digit-shape mask: 3+****+4 for mobile-like, 2+***+2 otherwise.
    pub fn mask_phone(value: &str) -> String {
        let digits: Vec<char> = value.chars().filter(|c| c.is_ascii_digit()).collect();
        if digits.len() < 7 {
            return "***".to_string();
        }
        let keep = |prefix: usize, mask: &str, suffix: usize| {
            let mut out: String = digits[..prefix].iter().collect();
            out.push_str(mask);
            out.extend(&digits[digits.len() - suffix..]);
            out
        };
        if digits.len() >= 11 && digits[0] == '1' {
            keep(3, "****", 4)
        } else if digits.len() >= 10 && digits[0] == '0' {
            keep(3, "****", 4)
        } else {
            keep(2, "***", 2)
        }
    }

    /// First and last character of the local part survive.
    pub fn mask_email(value: &str) -> String {
        let Some(at) = value.find('@') else {
            return "***".to_string();
        };
        let (local, domain) = value.split_at(at);
        let chars: Vec<char> = local.chars().collect();
        if chars.len() < 2 {
            return "***".to_string();
        }
        format!("{}***{}{}", chars[0], chars[chars.len() - 1], domain)
    }

    /// First 2 + `***` + last 2; `***` when 4 characters or fewer.
    pub fn mask_address(value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        if chars.len() <= 4 {
            return "***".to_string();
        }
        let mut out: String = chars[..2].iter().collect();
        out.push_str("***");
        out.extend(&chars[chars.len() - 2..]);
        out
    }

    pub fn mask_password() -> String {
        "***".to_string()
    }

    /// Keep the configured prefix/suffix when the value is long enough.
    pub fn mask_token(&self, value: &str) -> String {
        let chars: Vec<char> = value.chars().collect();
        if chars.len() <= self.token_keep_prefix + self.token_keep_suffix {
            return "***".to_string();
        }
        let mut out: String = chars[..self.token_keep_prefix].iter().collect();
        out.push_str("***");
        out.extend(&chars[chars.len() - self.token_keep_suffix..]);
        out
    }
}

/// Null, empty, whitespace-only, or the literal `null` (case-insensitive).
pub fn is_empty_like(value: &str) -> bool {
    let trimmed = value.trim();
    trimmed.is_empty() || trimmed.eq_ignore_ascii_case("null")
}

/// True for values carrying the redaction marker. Every formatter embeds a
/// `***` run, so re-masking an already-masked message must neither rewrite
/// nor collect such values.
pub fn is_redacted(value: &str) -> bool {
    value.contains("***")
}

/// Shannon entropy in bits over the byte distribution.
pub fn shannon_entropy(bytes: &[u8]) -> f64 {
    if bytes.is_empty() {
        return 0.0;
    }
    let mut counts = [0usize; 256];
    for &b in bytes {
        counts[b as usize] += 1;
    }
    let len = bytes.len() as f64;
    counts
        .iter()
        .filter(|&&c| c > 0)
        .map(|&c| {
            let p = c as f64 / len;
            -p * p.log2()
        })
        .sum()
}

enum Boundary {
    NonAlphanumeric,
    NonDigit,
    NonWord,
}

impl Boundary {
    fn clean(&self, c: Option<char>) -> bool {
        match (self, c) {
            (_, None) => true,
            // A touching star means the surrounding text is already masked.
            (_, Some('*')) => false,
            (Boundary::NonAlphanumeric, Some(c)) => !c.is_ascii_alphanumeric(),
            (Boundary::NonDigit, Some(c)) => !c.is_ascii_digit(),
            (Boundary::NonWord, Some(c)) => !(c.is_ascii_alphanumeric() || c == '_'),
        }
    }
}

/// Regex candidates filtered by the character on each side of the match.
fn scan_bounded(re: &Regex, text: &str, boundary: Boundary) -> Vec<(usize, usize)> {
    re.find_iter(text)
        .filter(|m| {
            let before = text[..m.start()].chars().next_back();
            let after = text[m.end()..].chars().next();
            boundary.clean(before) && boundary.clean(after)
        })
        .map(|m| (m.start(), m.end()))
        .collect()
}
