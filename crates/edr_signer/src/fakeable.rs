use edr_primitives::{Address, Signature, B256, U256};

use crate::{recover_address, SignatureError};

/// A signature with a known caller address, which can either be a real ECDSA
/// signature or a fake signature used for impersonated accounts.
///
/// The only requirements on a fake signature are that, when it is encoded as
/// part of a transaction, it produces the same hash for the same transaction
/// from a sender, and different hashes for different senders. We achieve this
/// by setting the `r` and `s` values to the sender's address, which also helps
/// to recognize fake signatures in debug logs.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct FakeableSignature {
    signature: Signature,
    address: Address,
    is_fake: bool,
}

impl FakeableSignature {
    /// Constructs an instance with a signature that has a recoverable address,
    /// as well as that address.
    ///
    /// # Safety
    ///
    /// The caller must ensure that the address matches the signature's
    /// recoverable address.
    pub const unsafe fn with_address_unchecked(signature: Signature, address: Address) -> Self {
        Self {
            signature,
            address,
            is_fake: false,
        }
    }

    /// Constructs an instance with a fake signature based on the caller's
    /// address.
    pub fn fake(address: Address) -> Self {
        let value = U256::from_be_slice(address.as_slice());

        Self {
            signature: Signature::new(value, value, true),
            address,
            is_fake: true,
        }
    }

    /// Constructs an instance by recovering the signer of the provided hash.
    pub fn recover(signature: Signature, hash: &B256) -> Result<Self, SignatureError> {
        let address = recover_address(&signature, hash)?;

        Ok(Self {
            signature,
            address,
            is_fake: false,
        })
    }

    /// Whether the signature is from an impersonated account.
    pub fn is_fake(&self) -> bool {
        self.is_fake
    }

    /// Returns the Ethereum address of the transaction's caller.
    pub fn caller(&self) -> &Address {
        &self.address
    }

    /// Returns the underlying signature.
    pub fn signature(&self) -> &Signature {
        &self.signature
    }
}

#[cfg(test)]
mod tests {
    use edr_primitives::address;

    use super::*;

    #[test]
    fn fake_signatures_differ_per_sender() {
        let first = FakeableSignature::fake(address!("0x0000000000000000000000000000000000000001"));
        let second = FakeableSignature::fake(address!("0x0000000000000000000000000000000000000002"));

        assert!(first.is_fake());
        assert_eq!(first.signature().r(), U256::from(1));
        assert_eq!(first.signature().s(), U256::from(1));
        assert_ne!(first.signature(), second.signature());
    }
}
