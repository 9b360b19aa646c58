// libs/patient-cell/src/services/normalize.rs
use crate::models::PatientError;

/// Canonicalize a Russian phone number to `+7XXXXXXXXXX`.
///
/// Accepted shapes after stripping non-digits: a 10-digit national number,
/// or an 11-digit number led by 8 or 7. Everything else is rejected.
pub fn normalize_phone(raw: &str) -> Result<String, PatientError> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();

    let national = match digits.len() {
        10 => digits.as_str(),
        11 if digits.starts_with('8') || digits.starts_with('7') => &digits[1..],
        _ => {
            return Err(PatientError::ValidationError(format!(
                "Invalid phone number: {}",
                raw
            )))
        }
    };

    Ok(format!("+7{}", national))
}

/// Name parts are stored lower-cased and trimmed.
pub fn normalize_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn eleven_digits_led_by_eight() {
        assert_eq!(normalize_phone("89991234567").unwrap(), "+79991234567");
    }

    #[test]
    fn ten_digit_national_number() {
        assert_eq!(normalize_phone("9991234567").unwrap(), "+79991234567");
    }

    #[test]
    fn formatted_international_input() {
        assert_eq!(normalize_phone("+7 (999) 123-45-67").unwrap(), "+79991234567");
        assert_eq!(normalize_phone("8 999 123 45 67").unwrap(), "+79991234567");
    }

    #[test]
    fn junk_is_rejected() {
        assert_matches!(normalize_phone("123"), Err(PatientError::ValidationError(_)));
        assert_matches!(normalize_phone(""), Err(PatientError::ValidationError(_)));
        assert_matches!(normalize_phone("19991234567"), Err(PatientError::ValidationError(_)));
        assert_matches!(normalize_phone("899912345678"), Err(PatientError::ValidationError(_)));
    }

    #[test]
    fn names_are_trimmed_and_lowercased() {
        assert_eq!(normalize_name("  Иван  "), "иван");
        assert_eq!(normalize_name("ПЕТРОВ"), "петров");
    }
}
