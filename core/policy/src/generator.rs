//! Building passwords that satisfy a policy.

use rand::Rng;
use tracing::debug;

use crate::policy::{PasswordPolicy, PolicyStyle};
use crate::pool::{CharacterClass, CharacterPool};
use passvault_common::{Error, Result};

/// Generate a password for `policy` using the thread-local CSPRNG.
pub fn generate(policy: &PasswordPolicy) -> Result<String> {
    generate_with(policy, &mut rand::thread_rng())
}

/// Generate a password for `policy` with the given random source.
///
/// The result is always exactly `policy.length` characters. For standard
/// policies the required minimum of each enabled class is placed first
/// (uppercase, lowercase, digit, symbol), the rest is drawn from the
/// union of enabled pools, and the buffer is then scrambled with
/// `3 × length` random swaps.
///
/// # Errors
/// - `Unsupported` for pronounceable policies
/// - `InvalidInput` if the policy fails [`PasswordPolicy::check`]
pub fn generate_with<R: Rng + ?Sized>(policy: &PasswordPolicy, rng: &mut R) -> Result<String> {
    let classes = match &policy.style {
        PolicyStyle::HexOnly => return Ok(fill(&CharacterPool::hex(), policy.length, rng)),
        PolicyStyle::Pronounceable(_) => {
            return Err(Error::Unsupported(
                "Pronounceable password generation is not available.".to_string(),
            ));
        }
        PolicyStyle::Standard(classes) => *classes,
    };

    policy.check()?;

    let mut password: Vec<char> = Vec::with_capacity(policy.length);
    let mut enabled_pools = Vec::new();

    for class in CharacterClass::GENERATION_ORDER {
        if !classes.enables(class) {
            continue;
        }
        let pool = policy.pool(class);
        for _ in 0..policy.minimum(class) {
            password.extend(pool.pick(rng));
        }
        enabled_pools.push(pool);
    }

    let remaining = policy.length.saturating_sub(password.len());
    let combined = CharacterPool::union(enabled_pools.iter());
    for _ in 0..remaining {
        password.extend(combined.pick(rng));
    }

    if password.len() != policy.length {
        return Err(Error::InvalidInput(
            "Policy character pools are empty.".to_string(),
        ));
    }

    scramble(&mut password, rng);
    debug!(policy = %policy.name, length = policy.length, "Generated password");

    Ok(password.into_iter().collect())
}

fn fill<R: Rng + ?Sized>(pool: &CharacterPool, length: usize, rng: &mut R) -> String {
    (0..length).filter_map(|_| pool.pick(rng)).collect()
}

fn scramble<R: Rng + ?Sized>(chars: &mut [char], rng: &mut R) {
    let len = chars.len();
    if len < 2 {
        return;
    }
    for _ in 0..len * 3 {
        let a = rng.gen_range(0..len);
        let b = rng.gen_range(0..len);
        chars.swap(a, b);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::policy::CharacterClasses;
    use crate::validator::validate;
    use proptest::prelude::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_all_digit_policy() {
        let policy = PasswordPolicy::new(
            "Pin",
            10,
            PolicyStyle::Standard(CharacterClasses::digits_only()),
        )
        .with_min_digits(10);

        let password = generate(&policy).unwrap();
        assert_eq!(password.len(), 10);
        assert!(password.chars().all(|c| c.is_ascii_digit()));
    }

    #[test]
    fn test_hex_only() {
        let policy = PasswordPolicy::new("Key", 32, PolicyStyle::HexOnly);
        let password = generate(&policy).unwrap();
        assert_eq!(password.len(), 32);
        assert!(password.chars().all(|c| "0123456789abcdef".contains(c)));
    }

    #[test]
    fn test_pronounceable_is_unsupported() {
        let policy = PasswordPolicy::new(
            "Say",
            12,
            PolicyStyle::Pronounceable(CharacterClasses::alphanumeric()),
        );
        assert!(matches!(generate(&policy), Err(Error::Unsupported(_))));
    }

    #[test]
    fn test_inconsistent_policy_rejected() {
        let policy = PasswordPolicy::new("Bad", 3, PolicyStyle::default()).with_min_digits(4);
        assert!(matches!(generate(&policy), Err(Error::InvalidInput(_))));
    }

    #[test]
    fn test_zero_length() {
        let policy = PasswordPolicy::new("Nothing", 0, PolicyStyle::default());
        assert_eq!(generate(&policy).unwrap(), "");
    }

    #[test]
    fn test_easy_vision_avoids_lookalikes() {
        let classes = CharacterClasses {
            easy_vision: true,
            ..CharacterClasses::alphanumeric()
        };
        let policy = PasswordPolicy::new("Readable", 200, PolicyStyle::Standard(classes));
        let password = generate_with(&policy, &mut StdRng::seed_from_u64(7)).unwrap();
        assert!(!password.contains(&['l', 'I', 'O', '0', '1'][..]));
    }

    #[test]
    fn test_explicit_symbol_set_used() {
        let policy = PasswordPolicy::new("Limited", 40, PolicyStyle::default())
            .with_symbols("!?")
            .with_min_symbols(5);
        let password = generate(&policy).unwrap();
        assert!(password.chars().filter(|c| *c == '!' || *c == '?').count() >= 5);
        assert!(validate(&password, &policy).is_ok());
    }

    #[test]
    fn test_required_classes_not_always_leading() {
        // Uppercase slots are filled first; scrambling should move them.
        let policy = PasswordPolicy::new(
            "Mixed",
            16,
            PolicyStyle::Standard(CharacterClasses {
                uppercase: true,
                digits: true,
                ..CharacterClasses::default()
            }),
        )
        .with_min_uppercase(8)
        .with_min_digits(8);

        let mut rng = StdRng::seed_from_u64(42);
        let leading_upper = (0..50)
            .map(|_| generate_with(&policy, &mut rng).unwrap())
            .filter(|p| p.chars().take(8).all(|c| c.is_ascii_uppercase()))
            .count();
        assert!(leading_upper < 50);
    }

    fn standard_policy() -> impl Strategy<Value = PasswordPolicy> {
        (
            any::<[bool; 4]>(),
            any::<bool>(),
            12usize..48,
            proptest::collection::vec(0usize..=3, 4),
        )
            .prop_filter_map("no class enabled", |(flags, easy_vision, length, mins)| {
                let classes = CharacterClasses {
                    lowercase: flags[0],
                    uppercase: flags[1],
                    digits: flags[2],
                    symbols: flags[3],
                    easy_vision,
                };
                if !classes.any() {
                    return None;
                }
                let pick = |enabled: bool, n: usize| if enabled { n } else { 0 };
                Some(
                    PasswordPolicy::new("Generated", length, PolicyStyle::Standard(classes))
                        .with_min_lowercase(pick(flags[0], mins[0]))
                        .with_min_uppercase(pick(flags[1], mins[1]))
                        .with_min_digits(pick(flags[2], mins[2]))
                        .with_min_symbols(pick(flags[3], mins[3])),
                )
            })
    }

    proptest! {
        #[test]
        fn prop_generated_password_has_policy_length(policy in standard_policy()) {
            let password = generate(&policy).unwrap();
            prop_assert_eq!(password.chars().count(), policy.length);
        }

        #[test]
        fn prop_generated_password_validates(policy in standard_policy()) {
            let password = generate(&policy).unwrap();
            prop_assert!(validate(&password, &policy).is_ok());
        }
    }
}
