//! Pure input validators — stateless predicates over raw strings.
//!
//! Used inline by forms (field-keyed message maps, never errors thrown
//! across a boundary) and by the reminder store's schedule invariants.

use std::collections::BTreeMap;
use std::sync::LazyLock;

use chrono::{Local, NaiveDate};
use regex::Regex;

/// Minimum password length. Length is the only rule.
pub const MIN_PASSWORD_LEN: usize = 8;

static EMAIL_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)^[a-z0-9._%+-]+@[a-z0-9](?:[a-z0-9-]*[a-z0-9])?(?:\.[a-z0-9](?:[a-z0-9-]*[a-z0-9])?)*\.[a-z]{2,}$").unwrap()
});

static TIME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([01][0-9]|2[0-3]):[0-5][0-9]$").unwrap());

/// Email format: `local@domain` with a TLD of at least two letters.
/// Leading/trailing whitespace is trimmed before matching.
pub fn is_valid_email(raw: &str) -> bool {
    EMAIL_RE.is_match(raw.trim())
}

/// Password rule: length >= 8. No character-class requirement.
pub fn is_valid_password(raw: &str) -> bool {
    raw.chars().count() >= MIN_PASSWORD_LEN
}

/// Phone: at least 9 digits, or `+` followed by 9–15 digits for
/// international format. Separators (spaces, dashes, dots, parens) are
/// stripped before checking.
pub fn is_valid_phone(raw: &str) -> bool {
    let compact: String = raw
        .trim()
        .chars()
        .filter(|c| !matches!(c, ' ' | '-' | '.' | '(' | ')'))
        .collect();

    match compact.strip_prefix('+') {
        Some(rest) => {
            (9..=15).contains(&rest.len()) && rest.chars().all(|c| c.is_ascii_digit())
        }
        None => compact.len() >= 9 && compact.chars().all(|c| c.is_ascii_digit()),
    }
}

/// `HH:MM` 24-hour wall-clock entry: hour 00–23, minute 00–59,
/// both zero-padded to two digits.
pub fn is_valid_time_hhmm(raw: &str) -> bool {
    TIME_RE.is_match(raw)
}

/// Parse a `yyyy-MM-dd` calendar date. Unparseable input is `None`,
/// never an error.
fn parse_date(raw: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").ok()
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// The date is today or later. Time-of-day plays no part.
pub fn is_today_or_future(raw: &str) -> bool {
    date_is_today_or_future(raw, today())
}

/// The date is strictly after today.
pub fn is_strictly_future(raw: &str) -> bool {
    date_is_strictly_future(raw, today())
}

fn date_is_today_or_future(raw: &str, today: NaiveDate) -> bool {
    parse_date(raw).map(|d| d >= today).unwrap_or(false)
}

fn date_is_strictly_future(raw: &str, today: NaiveDate) -> bool {
    parse_date(raw).map(|d| d > today).unwrap_or(false)
}

/// Validate sign-in/sign-up credentials. Returns a field-keyed message
/// map for inline display; an empty map means valid.
pub fn validate_credentials(email: &str, password: &str) -> BTreeMap<&'static str, String> {
    let mut errors = BTreeMap::new();
    if !is_valid_email(email) {
        errors.insert("email", "Enter a valid email address".to_string());
    }
    if !is_valid_password(password) {
        errors.insert(
            "password",
            format!("Password must be at least {MIN_PASSWORD_LEN} characters"),
        );
    }
    errors
}

#[cfg(test)]
mod tests {
    use super::*;

    // ── Email ──

    #[test]
    fn email_accepts_plain_address() {
        assert!(is_valid_email("user@example.com"));
    }

    #[test]
    fn email_rejects_missing_tld() {
        assert!(!is_valid_email("user@example"));
    }

    #[test]
    fn email_trims_whitespace() {
        assert!(is_valid_email("  user@example.com  "));
    }

    #[test]
    fn email_rejects_empty() {
        assert!(!is_valid_email(""));
    }

    #[test]
    fn email_is_case_insensitive() {
        assert!(is_valid_email("User@Example.COM"));
    }

    #[test]
    fn email_rejects_one_letter_tld() {
        assert!(!is_valid_email("user@example.c"));
    }

    // ── Password ──

    #[test]
    fn password_length_seven_invalid() {
        assert!(!is_valid_password("1234567"));
    }

    #[test]
    fn password_length_eight_valid() {
        assert!(is_valid_password("12345678"));
    }

    /// Documents the permissiveness: length is the only rule, so eight
    /// spaces pass.
    #[test]
    fn password_all_spaces_valid() {
        assert!(is_valid_password("        "));
    }

    // ── Phone ──

    #[test]
    fn phone_nine_digits_valid() {
        assert!(is_valid_phone("612345678"));
    }

    #[test]
    fn phone_eight_digits_invalid() {
        assert!(!is_valid_phone("61234567"));
    }

    #[test]
    fn phone_international_valid() {
        assert!(is_valid_phone("+34612345678"));
    }

    #[test]
    fn phone_international_over_fifteen_digits_invalid() {
        assert!(!is_valid_phone("+1234567890123456"));
    }

    #[test]
    fn phone_separators_are_stripped() {
        assert!(is_valid_phone("+34 612-345-678"));
    }

    #[test]
    fn phone_letters_invalid() {
        assert!(!is_valid_phone("61234567a"));
    }

    // ── HH:MM ──

    #[test]
    fn time_accepts_valid_grid() {
        for t in ["00:00", "08:00", "12:30", "20:00", "23:59"] {
            assert!(is_valid_time_hhmm(t), "{t} should be valid");
        }
    }

    #[test]
    fn time_rejects_out_of_range_and_malformed() {
        for t in ["24:00", "12:60", "8:00", "08:0", "0800", "ab:cd", "", "08:00 "] {
            assert!(!is_valid_time_hhmm(t), "{t} should be invalid");
        }
    }

    // ── Dates ──

    fn d(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    #[test]
    fn date_today_counts_as_today_or_future() {
        let today = d("2026-03-10");
        assert!(date_is_today_or_future("2026-03-10", today));
        assert!(date_is_today_or_future("2026-03-11", today));
        assert!(!date_is_today_or_future("2026-03-09", today));
    }

    #[test]
    fn date_today_is_not_strictly_future() {
        let today = d("2026-03-10");
        assert!(!date_is_strictly_future("2026-03-10", today));
        assert!(date_is_strictly_future("2026-03-11", today));
    }

    #[test]
    fn unparseable_date_is_invalid_not_an_error() {
        let today = d("2026-03-10");
        assert!(!date_is_today_or_future("10/03/2026", today));
        assert!(!date_is_today_or_future("not a date", today));
        assert!(!date_is_strictly_future("", today));
    }

    // ── Credentials map ──

    #[test]
    fn valid_credentials_empty_map() {
        assert!(validate_credentials("user@example.com", "12345678").is_empty());
    }

    #[test]
    fn invalid_fields_keyed_individually() {
        let errors = validate_credentials("user@example", "short");
        assert_eq!(errors.len(), 2);
        assert!(errors.contains_key("email"));
        assert!(errors.contains_key("password"));
    }
}
