//! Input format checks.

use once_cell::sync::Lazy;
use regex::Regex;

static EMAIL: Lazy<Regex> = Lazy::new(|| compile(r"^[^\s@]+@[^\s@]+\.[^\s@]+$"));

static PHONE: Lazy<Regex> = Lazy::new(|| {
    compile(r"^\+?[0-9]{1,4}?[-.\s]?\(?[0-9]{1,3}?\)?[-.\s]?[0-9]{1,4}[-.\s]?[0-9]{1,4}[-.\s]?[0-9]{1,9}$")
});

static USER_NAME: Lazy<Regex> = Lazy::new(|| compile(r"^[A-Za-z0-9_]{4,16}$"));

#[allow(clippy::expect_used)]
fn compile(pattern: &str) -> Regex {
    Regex::new(pattern).expect("static pattern is valid")
}

/// `local@domain.tld` with no whitespace and a single `@`.
#[must_use]
pub fn is_email(input: &str) -> bool {
    EMAIL.is_match(input)
}

/// Loose international phone number: optional `+`, country and area code,
/// digit groups separated by `-`, `.` or whitespace.
#[must_use]
pub fn is_phone_number(input: &str) -> bool {
    PHONE.is_match(input)
}

/// 4 to 16 ASCII letters, digits or underscores.
#[must_use]
pub fn is_user_name(input: &str) -> bool {
    USER_NAME.is_match(input)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_email() {
        assert!(is_email("ana@example.com"));
        assert!(is_email("a.b+c@sub.example.io"));
        assert!(!is_email("ana@example"));
        assert!(!is_email("ana example@x.com"));
        assert!(!is_email("@example.com"));
        assert!(!is_email("a@@example.com"));
    }

    #[test]
    fn test_phone_number() {
        assert!(is_phone_number("+84 912 345 678"));
        assert!(is_phone_number("1 (555) 123-4567"));
        assert!(is_phone_number("0912345678"));
        assert!(!is_phone_number("phone"));
        assert!(!is_phone_number("12-ab-34"));
    }

    #[test]
    fn test_user_name() {
        assert!(is_user_name("ana_01"));
        assert!(is_user_name("abcd"));
        assert!(is_user_name("a234567890123456"));
        assert!(!is_user_name("abc"));
        assert!(!is_user_name("a2345678901234567"));
        assert!(!is_user_name("ana-01"));
        assert!(!is_user_name("ánh_01"));
    }
}
