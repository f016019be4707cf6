//! Password policies for passvault.
//!
//! This module provides:
//! - Character pools for each character class, with easy-vision variants
//! - The named `PasswordPolicy` model and its consistency checks
//! - A validator that checks a password against a policy
//! - A generator that builds a password satisfying a policy
//!
//! Everything here is a pure function over a policy snapshot; storing and
//! resolving named policies is the vault session's job.

pub mod generator;
pub mod policy;
pub mod pool;
pub mod validator;

pub use generator::{generate, generate_with};
pub use policy::{CharacterClasses, PasswordPolicy, PolicyStyle};
pub use pool::{CharacterClass, CharacterPool};
pub use validator::validate;
