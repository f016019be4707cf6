//! The named password policy model.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::pool::{CharacterClass, CharacterPool};
use passvault_common::{Error, Result};

/// Which character classes a policy draws from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CharacterClasses {
    pub lowercase: bool,
    pub uppercase: bool,
    pub digits: bool,
    pub symbols: bool,
    /// Avoid characters that are easily confused with each other.
    pub easy_vision: bool,
}

impl CharacterClasses {
    /// Every class enabled, easy-vision off.
    pub fn all() -> Self {
        Self {
            lowercase: true,
            uppercase: true,
            digits: true,
            symbols: true,
            easy_vision: false,
        }
    }

    /// Letters and digits only.
    pub fn alphanumeric() -> Self {
        Self {
            symbols: false,
            ..Self::all()
        }
    }

    /// Digits only.
    pub fn digits_only() -> Self {
        Self {
            digits: true,
            ..Self::default()
        }
    }

    /// Whether `class` is enabled.
    pub fn enables(&self, class: CharacterClass) -> bool {
        match class {
            CharacterClass::Lowercase => self.lowercase,
            CharacterClass::Uppercase => self.uppercase,
            CharacterClass::Digit => self.digits,
            CharacterClass::Symbol => self.symbols,
        }
    }

    /// Whether any class is enabled.
    pub fn any(&self) -> bool {
        self.lowercase || self.uppercase || self.digits || self.symbols
    }
}

/// How passwords for a policy are built.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PolicyStyle {
    /// Random characters from the enabled classes.
    Standard(CharacterClasses),
    /// Lowercase hexadecimal digits only; minimum counts are ignored.
    HexOnly,
    /// Alternating syllables. Validation treats it like `Standard`;
    /// generation is not supported.
    Pronounceable(CharacterClasses),
}

impl PolicyStyle {
    /// Enabled classes, or `None` for hex-only.
    pub fn classes(&self) -> Option<&CharacterClasses> {
        match self {
            PolicyStyle::Standard(classes) | PolicyStyle::Pronounceable(classes) => Some(classes),
            PolicyStyle::HexOnly => None,
        }
    }
}

impl Default for PolicyStyle {
    fn default() -> Self {
        PolicyStyle::Standard(CharacterClasses::all())
    }
}

/// A reusable, named password-construction ruleset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PasswordPolicy {
    /// Stable identifier; older vaults reference the default policy by it.
    pub id: Uuid,
    /// Unique name, compared case-insensitively.
    pub name: String,
    /// Total generated password length.
    pub length: usize,
    pub min_lowercase: usize,
    pub min_uppercase: usize,
    pub min_digits: usize,
    pub min_symbols: usize,
    pub style: PolicyStyle,
    /// Explicit symbol set replacing the built-in one.
    pub symbols: Option<String>,
}

impl PasswordPolicy {
    /// Create a policy with no minimum counts.
    pub fn new(name: impl Into<String>, length: usize, style: PolicyStyle) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            length,
            min_lowercase: 0,
            min_uppercase: 0,
            min_digits: 0,
            min_symbols: 0,
            style,
            symbols: None,
        }
    }

    pub fn with_min_lowercase(mut self, count: usize) -> Self {
        self.min_lowercase = count;
        self
    }

    pub fn with_min_uppercase(mut self, count: usize) -> Self {
        self.min_uppercase = count;
        self
    }

    pub fn with_min_digits(mut self, count: usize) -> Self {
        self.min_digits = count;
        self
    }

    pub fn with_min_symbols(mut self, count: usize) -> Self {
        self.min_symbols = count;
        self
    }

    pub fn with_symbols(mut self, symbols: impl Into<String>) -> Self {
        self.symbols = Some(symbols.into());
        self
    }

    /// Case-insensitive name comparison.
    pub fn is_named(&self, name: &str) -> bool {
        self.name.trim().to_lowercase() == name.trim().to_lowercase()
    }

    /// Minimum count required for `class`.
    pub fn minimum(&self, class: CharacterClass) -> usize {
        match class {
            CharacterClass::Lowercase => self.min_lowercase,
            CharacterClass::Uppercase => self.min_uppercase,
            CharacterClass::Digit => self.min_digits,
            CharacterClass::Symbol => self.min_symbols,
        }
    }

    /// Sum of all minimum counts.
    pub fn minimum_total(&self) -> usize {
        self.min_lowercase + self.min_uppercase + self.min_digits + self.min_symbols
    }

    /// The explicit symbol set, if one is configured and non-empty.
    pub fn symbol_set(&self) -> Option<&str> {
        self.symbols.as_deref().filter(|s| !s.is_empty())
    }

    /// Pool for one class under this policy's easy-vision and symbol settings.
    pub fn pool(&self, class: CharacterClass) -> CharacterPool {
        let easy_vision = self.style.classes().map(|c| c.easy_vision).unwrap_or(false);
        CharacterPool::for_class(class, easy_vision, self.symbol_set())
    }

    /// Check the policy is internally consistent.
    ///
    /// # Errors
    /// - `InvalidInput` for an empty name, a minimum on a disabled class,
    ///   minimums that add up to more than the length, no enabled class
    ///   for a non-empty length, or an explicit symbol set containing
    ///   letters or digits.
    pub fn check(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(Error::InvalidInput("Policy name cannot be empty.".to_string()));
        }

        if let Some(set) = self.symbol_set() {
            if set.chars().any(char::is_alphanumeric) {
                return Err(Error::InvalidInput(
                    "Symbol set may only contain symbols.".to_string(),
                ));
            }
        }

        let Some(classes) = self.style.classes() else {
            return Ok(());
        };

        for class in CharacterClass::VALIDATION_ORDER {
            if self.minimum(class) > 0 && !classes.enables(class) {
                return Err(Error::InvalidInput(format!(
                    "Policy requires at least {} but that class is disabled.",
                    class.describe(self.minimum(class))
                )));
            }
        }

        if self.minimum_total() > self.length {
            return Err(Error::InvalidInput(format!(
                "Minimum character counts ({}) exceed the password length ({}).",
                self.minimum_total(),
                self.length
            )));
        }

        if self.length > 0 && !classes.any() {
            return Err(Error::InvalidInput(
                "Policy must enable at least one character class.".to_string(),
            ));
        }

        Ok(())
    }
}
