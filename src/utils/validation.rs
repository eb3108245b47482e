// src/utils/validation.rs

use std::sync::LazyLock;

use chrono::{Datelike, NaiveDate, Utc};
use regex::Regex;
use url::Url;
use validator::ValidationError;

static UPPERCASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[A-Z]").unwrap());
static LOWERCASE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z]").unwrap());
static DIGIT: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[0-9]").unwrap());
static SPECIAL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^A-Za-z0-9]").unwrap());

/// Password policy: at least 8 characters with an uppercase letter, a lowercase letter, a digit
/// and a special character.
pub fn validate_password_strength(password: &str) -> Result<(), ValidationError> {
    let rules: [(&LazyLock<Regex>, &'static str, &'static str); 4] = [
        (&UPPERCASE, "password_uppercase", "Password must contain at least one uppercase letter"),
        (&LOWERCASE, "password_lowercase", "Password must contain at least one lowercase letter"),
        (&DIGIT, "password_digit", "Password must contain at least one number"),
        (&SPECIAL, "password_special", "Password must contain at least one special character"),
    ];

    if password.chars().count() < 8 {
        return Err(ValidationError::new("password_too_short")
            .with_message("Password must be at least 8 characters".into()));
    }
    if password.len() > 128 {
        return Err(ValidationError::new("password_too_long"));
    }

    for (pattern, code, message) in rules {
        if !pattern.is_match(password) {
            return Err(ValidationError::new(code).with_message(message.into()));
        }
    }
    Ok(())
}

/// Checks a South African ID number (`YYMMDDSSSCAZ`, 13 digits).
///
/// The birth date must exist and not lie in the future; the citizenship digit must be 0 or 1.
pub fn validate_sa_id(id: &str) -> Result<(), ValidationError> {
    if is_valid_sa_id(id, Utc::now().date_naive()) {
        Ok(())
    } else {
        Err(ValidationError::new("invalid_id_number").with_message(
            "Please enter a valid South African ID number (13 digits in YYMMDDSSSCAZ format)"
                .into(),
        ))
    }
}

pub fn is_valid_sa_id(id: &str, today: NaiveDate) -> bool {
    if id.len() != 13 || !id.bytes().all(|b| b.is_ascii_digit()) {
        return false;
    }

    let two_digits = |from: usize| id[from..from + 2].parse::<u32>().ok();
    let (Some(yy), Some(month), Some(day)) = (two_digits(0), two_digits(2), two_digits(4)) else {
        return false;
    };

    let current_yy = (today.year() % 100) as u32;
    let full_year = if yy > current_yy { 1900 + yy } else { 2000 + yy };

    let Some(birth_date) = NaiveDate::from_ymd_opt(full_year as i32, month, day) else {
        return false;
    };
    if birth_date > today {
        return false;
    }

    matches!(id.as_bytes()[10], b'0' | b'1')
}

/// Profile images are referenced by absolute http(s) URL.
pub fn validate_profile_image(value: &str) -> Result<(), ValidationError> {
    if value.len() > 2048 {
        return Err(ValidationError::new("profile_image_too_long"));
    }
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "http" | "https") => Ok(()),
        _ => Err(ValidationError::new("invalid_profile_image_url")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn sa_id_accepts_real_dates() {
        let today = day(2026, 10, 18);
        assert!(is_valid_sa_id("9202204720082", today));
        assert!(is_valid_sa_id("0501015800186", today));
    }

    #[test]
    fn sa_id_rejects_bad_shapes() {
        let today = day(2026, 10, 18);
        assert!(!is_valid_sa_id("920220472008", today));
        assert!(!is_valid_sa_id("92022047200A2", today));
        assert!(!is_valid_sa_id("", today));
    }

    #[test]
    fn sa_id_rejects_impossible_or_future_dates() {
        let today = day(2026, 10, 18);
        // 30 February
        assert!(!is_valid_sa_id("9202304720082", today));
        // 13th month
        assert!(!is_valid_sa_id("9213014720082", today));
        // 2026-12-01 is after "today"
        assert!(!is_valid_sa_id("2612014720082", today));
    }

    #[test]
    fn sa_id_rejects_bad_citizenship_digit() {
        let today = day(2026, 10, 18);
        assert!(!is_valid_sa_id("9202204720282", today));
    }

    #[test]
    fn password_policy() {
        assert!(validate_password_strength("Secur3!pass").is_ok());
        assert!(validate_password_strength("Sh0rt!").is_err());
        assert!(validate_password_strength("nouppercase1!").is_err());
        assert!(validate_password_strength("NOLOWERCASE1!").is_err());
        assert!(validate_password_strength("NoDigits!!").is_err());
        assert!(validate_password_strength("NoSpecial123").is_err());
    }

    #[test]
    fn profile_image_requires_http_url() {
        assert!(validate_profile_image("https://cdn.example.com/me.png").is_ok());
        assert!(validate_profile_image("javascript:alert(1)").is_err());
        assert!(validate_profile_image("not a url").is_err());
    }
}
