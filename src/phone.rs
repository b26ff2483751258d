//! Kenyan mobile number normalization.
//!
//! All phone numbers are stored and sent upstream in the canonical
//! `254XXXXXXXXX` form regardless of how the customer typed them.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Country prefix for Kenya.
const COUNTRY_CODE: &str = "254";

/// Upper bound on digits in any sane phone input (E.164 maximum).
const MAX_DIGITS: usize = 15;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PhoneError {
    #[error("phone number is empty")]
    Empty,
    #[error("phone number has too many digits ({0})")]
    TooLong(usize),
    #[error("unrecognized phone number format")]
    UnrecognizedShape,
    #[error("subscriber prefix {0} is not a known Kenyan carrier prefix")]
    UnknownPrefix(String),
}

/// Kenyan mobile network operators, keyed by subscriber prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NetworkProvider {
    Safaricom,
    Airtel,
    Telkom,
}

impl NetworkProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Safaricom => "Safaricom",
            Self::Airtel => "Airtel",
            Self::Telkom => "Telkom",
        }
    }
}

/// A phone number in canonical `254XXXXXXXXX` form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct CanonicalPhone(String);

// Deserialization goes through `parse` so a deserialized value holds the
// same invariant as a constructed one.
impl<'de> Deserialize<'de> for CanonicalPhone {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Self::parse(&s).map_err(serde::de::Error::custom)
    }
}

impl CanonicalPhone {
    /// Strict parse: accepts only the canonical 12-digit form. Callers with
    /// raw user input go through [`validate`] instead.
    pub fn parse(s: &str) -> Result<Self, PhoneError> {
        if s.len() == 12
            && s.starts_with(COUNTRY_CODE)
            && s.chars().all(|c| c.is_ascii_digit())
        {
            let subscriber = &s[3..];
            match network_provider(subscriber) {
                Some(_) => Ok(Self(s.to_string())),
                None => Err(PhoneError::UnknownPrefix(subscriber[..3].to_string())),
            }
        } else {
            Err(PhoneError::UnrecognizedShape)
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The 9-digit subscriber number without the country prefix.
    pub fn subscriber(&self) -> &str {
        &self.0[3..]
    }

    /// Local display form, grouped `0XXX XXX XXX`.
    pub fn display(&self) -> String {
        let s = self.subscriber();
        format!("0{} {} {}", &s[..3], &s[3..6], &s[6..])
    }

    pub fn provider(&self) -> NetworkProvider {
        // Invariant: construction verified the prefix.
        network_provider(self.subscriber()).unwrap_or(NetworkProvider::Safaricom)
    }
}

impl fmt::Display for CanonicalPhone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Outcome of validating raw user input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidatedPhone {
    pub canonical: CanonicalPhone,
    pub display: String,
    pub provider: NetworkProvider,
}

/// Validates arbitrary user input and normalizes it to canonical form.
///
/// Accepts three shapes after stripping punctuation and spacing:
/// local `07XXXXXXXX`/`01XXXXXXXX`, bare 9-digit `7XXXXXXXX`/`1XXXXXXXX`,
/// and international `2547XXXXXXXX`/`2541XXXXXXXX`.
pub fn validate(input: &str) -> Result<ValidatedPhone, PhoneError> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();

    if digits.is_empty() {
        return Err(PhoneError::Empty);
    }
    if digits.len() > MAX_DIGITS {
        return Err(PhoneError::TooLong(digits.len()));
    }

    let subscriber = match digits.len() {
        10 if digits.starts_with('0') => digits[1..].to_string(),
        9 => digits.clone(),
        12 if digits.starts_with(COUNTRY_CODE) => digits[3..].to_string(),
        _ => return Err(PhoneError::UnrecognizedShape),
    };

    // A subscriber number is always 9 digits starting with 7 or 1.
    if subscriber.len() != 9 || !(subscriber.starts_with('7') || subscriber.starts_with('1')) {
        return Err(PhoneError::UnrecognizedShape);
    }

    let provider = network_provider(&subscriber)
        .ok_or_else(|| PhoneError::UnknownPrefix(subscriber[..3].to_string()))?;

    let canonical = CanonicalPhone(format!("{}{}", COUNTRY_CODE, subscriber));
    let display = canonical.display();

    Ok(ValidatedPhone {
        canonical,
        display,
        provider,
    })
}

/// Maps a 9-digit subscriber number to its carrier, or `None` when the
/// 3-digit prefix is unassigned. Pure lookup, no side effects.
pub fn network_provider(subscriber: &str) -> Option<NetworkProvider> {
    let prefix: u32 = subscriber.get(..3)?.parse().ok()?;

    match prefix {
        700..=729 | 740..=743 | 745..=746 | 748 | 757..=759 | 768..=769 | 790..=799
        | 110..=115 => Some(NetworkProvider::Safaricom),
        730..=739 | 750..=756 | 762 | 785..=789 | 100..=106 => Some(NetworkProvider::Airtel),
        770..=779 | 747 => Some(NetworkProvider::Telkom),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_format_normalizes() {
        let result = validate("0712345678").unwrap();
        assert_eq!(result.canonical.as_str(), "254712345678");
        assert_eq!(result.provider, NetworkProvider::Safaricom);
    }

    #[test]
    fn test_bare_subscriber_format() {
        let result = validate("712345678").unwrap();
        assert_eq!(result.canonical.as_str(), "254712345678");
    }

    #[test]
    fn test_international_format() {
        let result = validate("254733123456").unwrap();
        assert_eq!(result.canonical.as_str(), "254733123456");
        assert_eq!(result.provider, NetworkProvider::Airtel);
    }

    #[test]
    fn test_punctuation_and_spacing_stripped() {
        let result = validate("+254 712-345 678").unwrap();
        assert_eq!(result.canonical.as_str(), "254712345678");

        let result = validate("(0712) 345.678").unwrap();
        assert_eq!(result.canonical.as_str(), "254712345678");
    }

    #[test]
    fn test_display_grouping() {
        let result = validate("254712345678").unwrap();
        assert_eq!(result.display, "0712 345 678");
        assert!(!result.display.contains("  "));
        assert_eq!(result.display, result.display.trim());
    }

    #[test]
    fn test_empty_input_rejected() {
        assert_eq!(validate(""), Err(PhoneError::Empty));
        assert_eq!(validate("abc-def"), Err(PhoneError::Empty));
    }

    #[test]
    fn test_too_long_rejected() {
        assert_eq!(
            validate("1234567890123456"),
            Err(PhoneError::TooLong(16))
        );
    }

    #[test]
    fn test_wrong_length_rejected() {
        assert_eq!(validate("07123"), Err(PhoneError::UnrecognizedShape));
        assert_eq!(validate("07123456789"), Err(PhoneError::UnrecognizedShape));
    }

    #[test]
    fn test_deserialize_rejects_non_canonical() {
        assert!(serde_json::from_str::<CanonicalPhone>("\"0712345678\"").is_err());
        assert!(serde_json::from_str::<CanonicalPhone>("\"123\"").is_err());
        assert!(serde_json::from_str::<CanonicalPhone>("\"254000000000\"").is_err());
    }

    #[test]
    fn test_serde_round_trip_keeps_canonical_form() {
        let phone = CanonicalPhone::parse("254712345678").unwrap();
        let json = serde_json::to_string(&phone).unwrap();
        assert_eq!(json, "\"254712345678\"");
        let back: CanonicalPhone = serde_json::from_str(&json).unwrap();
        assert_eq!(back, phone);
        assert_eq!(back.display(), "0712 345 678");
    }

    #[test]
    fn test_wrong_country_code_rejected() {
        assert_eq!(validate("255712345678"), Err(PhoneError::UnrecognizedShape));
    }

    #[test]
    fn test_unknown_prefix_rejected() {
        // 744 is unassigned.
        assert_eq!(
            validate("0744123456"),
            Err(PhoneError::UnknownPrefix("744".to_string()))
        );
    }

    #[test]
    fn test_subscriber_not_mobile_rejected() {
        // Landline-style 20x prefix is not a mobile subscriber number.
        assert_eq!(validate("0201234567"), Err(PhoneError::UnrecognizedShape));
    }

    #[test]
    fn test_canonical_parse_strict() {
        assert!(CanonicalPhone::parse("254712345678").is_ok());
        assert_eq!(
            CanonicalPhone::parse("0712345678"),
            Err(PhoneError::UnrecognizedShape)
        );
        assert_eq!(
            CanonicalPhone::parse("712345678"),
            Err(PhoneError::UnrecognizedShape)
        );
    }

    #[test]
    fn test_provider_lookup() {
        assert_eq!(network_provider("712345678"), Some(NetworkProvider::Safaricom));
        assert_eq!(network_provider("110123456"), Some(NetworkProvider::Safaricom));
        assert_eq!(network_provider("733123456"), Some(NetworkProvider::Airtel));
        assert_eq!(network_provider("770123456"), Some(NetworkProvider::Telkom));
        assert_eq!(network_provider("744123456"), None);
    }
}
