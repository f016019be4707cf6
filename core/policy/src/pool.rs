//! Character classes and the pools generated passwords draw from.

use rand::Rng;

/// Lowercase letters.
pub const LOWERCASE: &str = "abcdefghijklmnopqrstuvwxyz";
/// Uppercase letters.
pub const UPPERCASE: &str = "ABCDEFGHIJKLMNOPQRSTUVWXYZ";
/// Decimal digits.
pub const DIGITS: &str = "0123456789";
/// Default symbol set.
pub const SYMBOLS: &str = "+-=_@#$%^&;:,.<>/~\\[](){}?!|*";

/// Lowercase letters without look-alikes (no `l`).
pub const EASY_LOWERCASE: &str = "abcdefghijkmnopqrstuvwxyz";
/// Uppercase letters without look-alikes (no `I`, `O`, `S`, `Z`).
pub const EASY_UPPERCASE: &str = "ABCDEFGHJKLMNPQRTUVWXY";
/// Digits without look-alikes (no `0`, `1`, `2`, `5`).
pub const EASY_DIGITS: &str = "346789";
/// Symbols that are hard to confuse with each other.
pub const EASY_SYMBOLS: &str = "+-=_@#$%^&<>/~\\?*";

/// Lowercase hexadecimal digits.
pub const HEX_DIGITS: &str = "0123456789abcdef";

/// One class of characters a policy can require.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CharacterClass {
    Lowercase,
    Uppercase,
    Digit,
    Symbol,
}

impl CharacterClass {
    /// Classes in the order the generator fills required slots.
    pub const GENERATION_ORDER: [CharacterClass; 4] = [
        CharacterClass::Uppercase,
        CharacterClass::Lowercase,
        CharacterClass::Digit,
        CharacterClass::Symbol,
    ];

    /// Classes in the order the validator reports unmet minimums.
    pub const VALIDATION_ORDER: [CharacterClass; 4] = [
        CharacterClass::Lowercase,
        CharacterClass::Uppercase,
        CharacterClass::Digit,
        CharacterClass::Symbol,
    ];

    /// Human-readable noun for `count` characters of this class.
    pub fn describe(self, count: usize) -> String {
        let noun = match self {
            CharacterClass::Lowercase => "lowercase letter",
            CharacterClass::Uppercase => "uppercase letter",
            CharacterClass::Digit => "digit",
            CharacterClass::Symbol => "symbol",
        };
        if count == 1 {
            format!("{} {}", count, noun)
        } else {
            format!("{} {}s", count, noun)
        }
    }

    /// Classify a character.
    ///
    /// With an explicit symbol set, only members of that set are symbols;
    /// otherwise anything that is not alphanumeric is. Returns `None` for
    /// characters outside every class (e.g. non-ASCII digits, or
    /// punctuation outside an explicit set).
    pub fn of(c: char, symbols: Option<&str>) -> Option<Self> {
        if c.is_ascii_digit() {
            Some(CharacterClass::Digit)
        } else if c.is_lowercase() {
            Some(CharacterClass::Lowercase)
        } else if c.is_uppercase() {
            Some(CharacterClass::Uppercase)
        } else {
            match symbols {
                Some(set) if set.contains(c) => Some(CharacterClass::Symbol),
                Some(_) => None,
                None if !c.is_alphanumeric() => Some(CharacterClass::Symbol),
                None => None,
            }
        }
    }
}

/// A set of characters to draw from uniformly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CharacterPool {
    chars: Vec<char>,
}

impl CharacterPool {
    /// Build a pool from the characters of `source`, dropping duplicates.
    pub fn from_chars(source: &str) -> Self {
        let mut chars: Vec<char> = Vec::with_capacity(source.len());
        for c in source.chars() {
            if !chars.contains(&c) {
                chars.push(c);
            }
        }
        Self { chars }
    }

    /// The pool for one class.
    ///
    /// `symbols` overrides the built-in symbol set when the policy
    /// carries an explicit one; easy-vision does not filter an explicit
    /// set.
    pub fn for_class(class: CharacterClass, easy_vision: bool, symbols: Option<&str>) -> Self {
        let source = match (class, easy_vision) {
            (CharacterClass::Lowercase, false) => LOWERCASE,
            (CharacterClass::Lowercase, true) => EASY_LOWERCASE,
            (CharacterClass::Uppercase, false) => UPPERCASE,
            (CharacterClass::Uppercase, true) => EASY_UPPERCASE,
            (CharacterClass::Digit, false) => DIGITS,
            (CharacterClass::Digit, true) => EASY_DIGITS,
            (CharacterClass::Symbol, easy) => match symbols {
                Some(set) => set,
                None if easy => EASY_SYMBOLS,
                None => SYMBOLS,
            },
        };
        Self::from_chars(source)
    }

    /// The hexadecimal pool.
    pub fn hex() -> Self {
        Self::from_chars(HEX_DIGITS)
    }

    /// Merge several pools.
    pub fn union<'a>(pools: impl IntoIterator<Item = &'a CharacterPool>) -> Self {
        let mut merged = Self::default();
        for pool in pools {
            for &c in &pool.chars {
                if !merged.chars.contains(&c) {
                    merged.chars.push(c);
                }
            }
        }
        merged
    }

    /// Draw one character.
    ///
    /// Returns `None` for an empty pool.
    pub fn pick<R: Rng + ?Sized>(&self, rng: &mut R) -> Option<char> {
        if self.chars.is_empty() {
            return None;
        }
        Some(self.chars[rng.gen_range(0..self.chars.len())])
    }

    /// Whether `c` is in the pool.
    pub fn contains(&self, c: char) -> bool {
        self.chars.contains(&c)
    }

    /// Number of distinct characters.
    pub fn len(&self) -> usize {
        self.chars.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }
}
