use serde::{Deserialize, Serialize};

pub const MAX_NOTE_LEN: usize = 500;
pub const MAX_EMAIL_LEN: usize = 254;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    pub fn new(field: &str, message: &str) -> Self {
        Self {
            field: field.to_string(),
            message: message.to_string(),
        }
    }
}

/// Wallet address: `0x` followed by 16 or 40 hex characters
/// (Flow account addresses and EVM addresses respectively).
pub fn is_valid_address(address: &str) -> bool {
    let Some(hex_part) = address.strip_prefix("0x") else {
        return false;
    };
    (hex_part.len() == 16 || hex_part.len() == 40)
        && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Transaction hash: 64 hex characters, optional `0x` prefix.
pub fn is_valid_tx_hash(hash: &str) -> bool {
    let hex_part = hash.strip_prefix("0x").unwrap_or(hash);
    hex_part.len() == 64 && hex_part.chars().all(|c| c.is_ascii_hexdigit())
}

/// Amounts must be positive and carry at most 8 decimal places.
pub fn is_valid_amount(amount: f64) -> bool {
    if !amount.is_finite() || amount <= 0.0 {
        return false;
    }
    let scaled = amount * 1e8;
    (scaled - scaled.round()).abs() < 1e-6
}

/// Basic shape check, not full RFC 5322.
pub fn is_valid_email(email: &str) -> bool {
    if email.is_empty() || email.len() > MAX_EMAIL_LEN {
        return false;
    }
    let Some((local, domain)) = email.split_once('@') else {
        return false;
    };
    !local.is_empty()
        && !domain.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !email.chars().any(char::is_whitespace)
}

pub fn is_valid_url(url: &str) -> bool {
    (url.starts_with("https://") || url.starts_with("http://")) && url.len() > 8
}

/// Strips anything between angle brackets and caps the length.
/// Free-text fields are echoed back to browsers, so no markup survives.
pub fn sanitize_text(input: &str, max_len: usize) -> String {
    let mut out = String::with_capacity(input.len());
    let mut in_tag = false;

    for c in input.chars() {
        match c {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(c),
            _ => {}
        }
    }

    let trimmed = out.trim();
    trimmed.chars().take(max_len).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_flow_and_evm_addresses() {
        assert!(is_valid_address("0x1234567890abcdef"));
        assert!(is_valid_address("0x1234567890abcdef1234567890abcdef12345678"));
    }

    #[test]
    fn rejects_malformed_addresses() {
        assert!(!is_valid_address("1234567890abcdef"));
        assert!(!is_valid_address("0x1234"));
        assert!(!is_valid_address("0x1234567890abcdeg"));
        assert!(!is_valid_address("0x1234567890abcdef1234567890abcdef1234567890"));
    }

    #[test]
    fn validates_tx_hashes() {
        let hash = "a".repeat(64);
        assert!(is_valid_tx_hash(&hash));
        assert!(is_valid_tx_hash(&format!("0x{}", hash)));
        assert!(!is_valid_tx_hash(&"a".repeat(63)));
        assert!(!is_valid_tx_hash(&"z".repeat(64)));
    }

    #[test]
    fn validates_amounts() {
        assert!(is_valid_amount(10.0));
        assert!(is_valid_amount(0.00000001));
        assert!(!is_valid_amount(0.0));
        assert!(!is_valid_amount(-5.0));
        assert!(!is_valid_amount(0.000000001));
        assert!(!is_valid_amount(f64::NAN));
        assert!(!is_valid_amount(f64::INFINITY));
    }

    #[test]
    fn validates_emails() {
        assert!(is_valid_email("merchant@example.com"));
        assert!(!is_valid_email("no-at-sign"));
        assert!(!is_valid_email("a@b"));
        assert!(!is_valid_email("spaced out@example.com"));
    }

    #[test]
    fn strips_html_from_text() {
        assert_eq!(
            sanitize_text("thanks <script>alert(1)</script>for lunch", MAX_NOTE_LEN),
            "thanks alert(1)for lunch"
        );
        assert_eq!(sanitize_text("  plain note  ", MAX_NOTE_LEN), "plain note");
    }

    #[test]
    fn caps_text_length() {
        let long = "x".repeat(600);
        assert_eq!(sanitize_text(&long, MAX_NOTE_LEN).len(), MAX_NOTE_LEN);
    }

    #[test]
    fn urls_must_be_http() {
        assert!(is_valid_url("https://example.com/hook"));
        assert!(is_valid_url("http://example.com/hook"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("javascript:alert(1)"));
    }
}
