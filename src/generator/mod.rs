//! Random key and payload generation
//!
//! Every worker owns its own generators, so no RNG state is shared between
//! threads.
//!
//! - **KeyGenerator**: integer-as-string keys in `[0, max_key_value)`
//! - **PayloadGenerator**: entropy-filled buffers of `[1, max_data_size]` bytes

pub mod key;
pub mod payload;

pub use key::KeyGenerator;
pub use payload::PayloadGenerator;

use crate::error::Error;

/// Per-worker pair of key and payload generators
pub struct RandomGenerator {
    keys: KeyGenerator,
    payloads: PayloadGenerator,
}

impl RandomGenerator {
    pub fn new(keys: KeyGenerator, payloads: PayloadGenerator) -> Self {
        Self { keys, payloads }
    }

    /// Build generators for the given bounds, seeded when `seed` is set
    pub fn from_bounds(max_key_value: i64, max_data_size: usize, seed: Option<u64>) -> Result<Self, Error> {
        let (keys, payloads) = match seed {
            Some(seed) => (
                KeyGenerator::with_seed(max_key_value, seed)?,
                PayloadGenerator::with_seed(max_data_size, seed.rotate_left(32))?,
            ),
            None => (KeyGenerator::new(max_key_value)?, PayloadGenerator::new(max_data_size)?),
        };
        Ok(Self::new(keys, payloads))
    }

    #[inline]
    pub fn random_key(&mut self) -> String {
        self.keys.random_key()
    }

    #[inline]
    pub fn random_payload(&mut self) -> Result<Vec<u8>, Error> {
        self.payloads.random_payload()
    }
}
