//! Checking a password against a policy.

use crate::policy::{PasswordPolicy, PolicyStyle};
use crate::pool::CharacterClass;
use passvault_common::{Error, Result};

/// Check `password` against `policy`.
///
/// Hex-only policies only require every character to be a hex digit.
/// Otherwise characters are counted per class and the first unmet
/// minimum (lowercase, uppercase, digit, symbol) is reported. With an
/// explicit symbol set, a symbol outside the set is rejected as well.
///
/// # Errors
/// - `InvalidInput` carrying a message suitable for the user
pub fn validate(password: &str, policy: &PasswordPolicy) -> Result<()> {
    if let PolicyStyle::HexOnly = policy.style {
        if password.chars().all(|c| c.is_ascii_hexdigit()) {
            return Ok(());
        }
        return Err(Error::InvalidInput(
            "Password must contain only hexadecimal digits.".to_string(),
        ));
    }

    let symbols = policy.symbol_set();
    let mut counts = [0usize; 4];

    for c in password.chars() {
        match CharacterClass::of(c, symbols) {
            Some(class) => counts[slot(class)] += 1,
            None if symbols.is_some() && !c.is_alphanumeric() => {
                return Err(Error::InvalidInput(format!(
                    "Password contains the symbol '{}', which this policy does not allow.",
                    c
                )));
            }
            None => {}
        }
    }

    for class in CharacterClass::VALIDATION_ORDER {
        let required = policy.minimum(class);
        if counts[slot(class)] < required {
            return Err(Error::InvalidInput(format!(
                "Password must include at least {}.",
                class.describe(required)
            )));
        }
    }

    Ok(())
}

fn slot(class: CharacterClass) -> usize {
    match class {
        CharacterClass::Lowercase => 0,
        CharacterClass::Uppercase => 1,
        CharacterClass::Digit => 2,
        CharacterClass::Symbol => 3,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CharacterClasses;

    fn message(result: Result<()>) -> String {
        result.unwrap_err().message()
    }

    #[test]
    fn test_digit_minimum() {
        let policy = PasswordPolicy::new(
            "Pin",
            10,
            PolicyStyle::Standard(CharacterClasses::digits_only()),
        )
        .with_min_digits(10);

        assert!(validate("0123456789", &policy).is_ok());
        assert_eq!(
            message(validate("abcdefghij", &policy)),
            "Password must include at least 10 digits."
        );
    }

    #[test]
    fn test_first_unmet_minimum_is_reported() {
        let policy = PasswordPolicy::new("Web", 12, PolicyStyle::default())
            .with_min_lowercase(1)
            .with_min_uppercase(2)
            .with_min_symbols(1);

        assert_eq!(
            message(validate("ALLCAPS!", &policy)),
            "Password must include at least 1 lowercase letter."
        );
        assert_eq!(
            message(validate("mostlylower!A", &policy)),
            "Password must include at least 2 uppercase letters."
        );
        assert_eq!(
            message(validate("NoSymbolsHere", &policy)),
            "Password must include at least 1 symbol."
        );
        assert!(validate("GoodEnough!", &policy).is_ok());
    }

    #[test]
    fn test_default_symbols_are_non_alphanumeric() {
        let policy = PasswordPolicy::new("Sym", 8, PolicyStyle::default()).with_min_symbols(2);
        assert!(validate("a b~", &policy).is_ok());
    }

    #[test]
    fn test_explicit_symbol_set() {
        let policy = PasswordPolicy::new("Strict", 8, PolicyStyle::default())
            .with_symbols("!@")
            .with_min_symbols(1);

        assert!(validate("secret!", &policy).is_ok());
        assert_eq!(
            message(validate("secret#", &policy)),
            "Password contains the symbol '#', which this policy does not allow."
        );
        assert_eq!(
            message(validate("secret", &policy)),
            "Password must include at least 1 symbol."
        );
    }

    #[test]
    fn test_hex_only_skips_class_checks() {
        let policy = PasswordPolicy::new("Hex", 8, PolicyStyle::HexOnly).with_min_symbols(3);
        assert!(validate("DEADbeef", &policy).is_ok());
        assert!(validate("deadbeeg", &policy).is_err());
    }
}
