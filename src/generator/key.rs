//! Random key generation
//!
//! Keys are decimal strings of integers drawn uniformly from
//! `[0, max_key_value)`. A small key space makes writes, reads and removes
//! collide on the same objects, which is what a stress run wants.
//!
//! # Example
//!
//! ```
//! use bomber::generator::KeyGenerator;
//!
//! let mut keys = KeyGenerator::new(1000).unwrap();
//! let key: u64 = keys.random_key().parse().unwrap();
//! assert!(key < 1000);
//! ```

use crate::error::Error;
use rand::Rng;
use rand::SeedableRng;
use rand_xoshiro::Xoshiro256PlusPlus;

/// Uniform key generator over a bounded integer key space
pub struct KeyGenerator {
    max_key_value: u64,
    rng: Xoshiro256PlusPlus,
}

impl KeyGenerator {
    /// Create a key generator with random seed
    ///
    /// Fails with a configuration error if `max_key_value` is zero or negative.
    pub fn new(max_key_value: i64) -> Result<Self, Error> {
        Ok(Self {
            max_key_value: validate_bound(max_key_value)?,
            rng: Xoshiro256PlusPlus::from_entropy(),
        })
    }

    /// Create a key generator with a specific seed
    ///
    /// Useful for reproducible runs and tests.
    pub fn with_seed(max_key_value: i64, seed: u64) -> Result<Self, Error> {
        Ok(Self {
            max_key_value: validate_bound(max_key_value)?,
            rng: Xoshiro256PlusPlus::seed_from_u64(seed),
        })
    }

    #[inline]
    pub fn random_key(&mut self) -> String {
        self.rng.gen_range(0..self.max_key_value).to_string()
    }

    pub fn max_key_value(&self) -> u64 {
        self.max_key_value
    }
}

fn validate_bound(max_key_value: i64) -> Result<u64, Error> {
    if max_key_value <= 0 {
        return Err(Error::config(format!(
            "max_key_value must be positive, got {}",
            max_key_value
        )));
    }
    Ok(max_key_value as u64)
}
