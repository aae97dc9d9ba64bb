//! Test data fixtures
//!
//! Generates account data in the formats the application accepts: unique
//! emails and usernames, ten-digit phone numbers, names from a small fixed
//! pool. Seed the generator for reproducible runs.

use std::collections::HashSet;

use rand::rngs::StdRng;
use rand::seq::IndexedRandom;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

/// Password used for generated accounts
pub const DEFAULT_PASSWORD: &str = "Test@1234";

/// Date of birth used for generated accounts (ISO 8601)
pub const DEFAULT_DATE_OF_BIRTH: &str = "1995-08-15";

/// Street address used for generated accounts
pub const DEFAULT_ADDRESS: &str = "123 Random Street";

const FIRST_NAMES: [&str; 3] = ["Alice", "Bob", "Charlie"];
const LAST_NAMES: [&str; 3] = ["Smith", "Johnson", "Brown"];

/// Give up on uniqueness after this many collisions in a row
const MAX_UNIQUE_ATTEMPTS: usize = 64;

/// Everything the signup flow types into the two registration forms
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignupData {
    /// Account email
    pub email: String,
    /// Account password (also typed into the confirmation field)
    pub password: String,
    /// Username
    pub username: String,
    /// First name
    pub first_name: String,
    /// Last name
    pub last_name: String,
    /// Ten-digit phone number
    pub phone_number: String,
    /// Street address
    pub address: String,
    /// LinkedIn profile URL
    pub linkedin_link: String,
    /// Date of birth, `YYYY-MM-DD`
    pub date_of_birth: String,
}

/// Random fixture generator
#[derive(Debug)]
pub struct FixtureGenerator {
    rng: StdRng,
    issued: HashSet<String>,
}

impl FixtureGenerator {
    /// Generator seeded from the OS
    #[must_use]
    pub fn new() -> Self {
        Self::from_rng(StdRng::from_os_rng())
    }

    /// Deterministic generator
    #[must_use]
    pub fn seeded(seed: u64) -> Self {
        Self::from_rng(StdRng::seed_from_u64(seed))
    }

    fn from_rng(rng: StdRng) -> Self {
        Self {
            rng,
            issued: HashSet::new(),
        }
    }

    /// `len` random lowercase ASCII letters
    pub fn lowercase(&mut self, len: usize) -> String {
        (0..len)
            .map(|_| char::from(self.rng.random_range(b'a'..=b'z')))
            .collect()
    }

    /// Keep drawing from `make` until it yields something not issued before
    fn unique(&mut self, mut make: impl FnMut(&mut Self) -> String) -> String {
        let mut candidate = make(self);
        for _ in 0..MAX_UNIQUE_ATTEMPTS {
            if !self.issued.contains(&candidate) {
                break;
            }
            candidate = make(self);
        }
        self.issued.insert(candidate.clone());
        candidate
    }

    /// Unique email such as `qwerty_123@example.com`
    pub fn email(&mut self) -> String {
        self.unique(|g| {
            let local = g.lowercase(6);
            let n: u16 = g.rng.random_range(100..=999);
            format!("{local}_{n}@example.com")
        })
    }

    /// Unique six-letter username
    pub fn username(&mut self) -> String {
        self.unique(|g| g.lowercase(6))
    }

    /// Ten digits starting with 9
    pub fn phone_number(&mut self) -> String {
        let mut phone = String::with_capacity(10);
        phone.push('9');
        for _ in 0..9 {
            phone.push(char::from(b'0' + self.rng.random_range(0..10u8)));
        }
        phone
    }

    /// First name from the fixed pool
    pub fn first_name(&mut self) -> String {
        FIRST_NAMES.choose(&mut self.rng).copied().unwrap_or("Alice").to_string()
    }

    /// Last name from the fixed pool
    pub fn last_name(&mut self) -> String {
        LAST_NAMES.choose(&mut self.rng).copied().unwrap_or("Smith").to_string()
    }

    /// A complete, fresh account
    pub fn signup_data(&mut self) -> SignupData {
        let username = self.username();
        SignupData {
            email: self.email(),
            password: DEFAULT_PASSWORD.to_string(),
            first_name: self.first_name(),
            last_name: self.last_name(),
            phone_number: self.phone_number(),
            address: DEFAULT_ADDRESS.to_string(),
            linkedin_link: format!("https://linkedin.com/in/{username}"),
            date_of_birth: DEFAULT_DATE_OF_BIRTH.to_string(),
            username,
        }
    }
}

impl Default for FixtureGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use regex::Regex;

    mod generator_tests {
        use super::*;

        #[test]
        fn test_seeded_is_reproducible() {
            let a = FixtureGenerator::seeded(7).signup_data();
            let b = FixtureGenerator::seeded(7).signup_data();
            assert_eq!(a, b);
        }

        #[test]
        fn test_signup_data_fixed_fields() {
            let data = FixtureGenerator::seeded(1).signup_data();
            assert_eq!(data.password, "Test@1234");
            assert_eq!(data.date_of_birth, "1995-08-15");
            assert_eq!(data.address, "123 Random Street");
            assert_eq!(
                data.linkedin_link,
                format!("https://linkedin.com/in/{}", data.username)
            );
            assert!(FIRST_NAMES.contains(&data.first_name.as_str()));
            assert!(LAST_NAMES.contains(&data.last_name.as_str()));
        }

        #[test]
        fn test_emails_are_unique() {
            let mut generator = FixtureGenerator::seeded(42);
            let emails: HashSet<String> = (0..500).map(|_| generator.email()).collect();
            assert_eq!(emails.len(), 500);
        }
    }

    mod property_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_email_format(seed in any::<u64>()) {
                let email_re = Regex::new(r"^[a-z]{6}_[1-9][0-9]{2}@example\.com$").unwrap();
                let email = FixtureGenerator::seeded(seed).email();
                prop_assert!(email_re.is_match(&email), "bad email {}", email);
            }

            #[test]
            fn prop_phone_format(seed in any::<u64>()) {
                let phone = FixtureGenerator::seeded(seed).phone_number();
                prop_assert_eq!(phone.len(), 10);
                prop_assert!(phone.starts_with('9'));
                prop_assert!(phone.chars().all(|c| c.is_ascii_digit()));
            }

            #[test]
            fn prop_username_format(seed in any::<u64>()) {
                let username = FixtureGenerator::seeded(seed).username();
                prop_assert_eq!(username.len(), 6);
                prop_assert!(username.chars().all(|c| c.is_ascii_lowercase()));
            }
        }
    }
}
