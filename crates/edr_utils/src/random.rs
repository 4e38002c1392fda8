use edr_primitives::{keccak256, B256};

/// A pseudorandom hash generator which allows overriding of the next generated
/// hash.
///
/// Every generated hash is the keccak hash of the previous one, so two
/// generators created with the same seed produce the same sequence.
#[derive(Clone, Debug)]
pub struct RandomHashGenerator {
    /// The next hash that will be returned
    next_value: B256,
}

impl RandomHashGenerator {
    /// Constructs a [`RandomHashGenerator`] with the specified seed.
    pub fn with_seed(seed: impl AsRef<[u8]>) -> Self {
        Self {
            next_value: keccak256(seed),
        }
    }

    /// Returns the next hash to be generated, without advancing the
    /// generator.
    pub fn peek(&self) -> B256 {
        self.next_value
    }

    /// Returns the next hash and advances the generator.
    pub fn next_value(&mut self) -> B256 {
        let value = self.next_value;
        self.next_value = keccak256(value);
        value
    }

    /// Overrides the next hash to be generated.
    pub fn set_next(&mut self, next_value: B256) {
        self.next_value = next_value;
    }
}
