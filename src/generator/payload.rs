//! Random payload generation
//!
//! Payload lengths are drawn uniformly from `[1, max_data_size]` with a fast
//! PRNG; the payload bytes themselves always come from the OS entropy source
//! so the backend never sees compressible or deduplicable data.

use crate::error::Error;
use rand::rngs::OsRng;
use rand::{Rng, RngCore, SeedableRng};
use rand_xoshiro::Xoshiro256PlusPlus;

/// Bounded-size random payload generator
pub struct PayloadGenerator {
    max_data_size: usize,
    sizes: Xoshiro256PlusPlus,
    entropy: Box<dyn RngCore + Send>,
}

impl PayloadGenerator {
    /// Create a payload generator backed by the OS entropy source
    pub fn new(max_data_size: usize) -> Result<Self, Error> {
        Self::with_entropy(max_data_size, Box::new(OsRng), Xoshiro256PlusPlus::from_entropy())
    }

    /// Create a payload generator whose sizes follow a fixed seed
    pub fn with_seed(max_data_size: usize, seed: u64) -> Result<Self, Error> {
        Self::with_entropy(max_data_size, Box::new(OsRng), Xoshiro256PlusPlus::seed_from_u64(seed))
    }

    /// Create a payload generator with a custom byte source
    pub fn with_entropy(
        max_data_size: usize,
        entropy: Box<dyn RngCore + Send>,
        sizes: Xoshiro256PlusPlus,
    ) -> Result<Self, Error> {
        if max_data_size == 0 {
            return Err(Error::config("max_data_size must be positive, got 0"));
        }
        Ok(Self {
            max_data_size,
            sizes,
            entropy,
        })
    }

    /// Generate a payload of random length filled with entropy
    ///
    /// # Errors
    ///
    /// Returns `EntropySourceUnavailable` if the byte source cannot fill the
    /// buffer completely.
    pub fn random_payload(&mut self) -> Result<Vec<u8>, Error> {
        let len = self.sizes.gen_range(1..=self.max_data_size);
        let mut data = vec![0u8; len];
        self.entropy
            .try_fill_bytes(&mut data)
            .map_err(Error::EntropySourceUnavailable)?;
        Ok(data)
    }

    pub fn max_data_size(&self) -> usize {
        self.max_data_size
    }
}
