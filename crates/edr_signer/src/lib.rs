// Part of this code was adapted from ethers-rs and is distributed under their
// licenss:
// - https://github.com/gakonst/ethers-rs/blob/cba6f071aedafb766e82e4c2f469ed5e4638337d/LICENSE-APACHE
// - https://github.com/gakonst/ethers-rs/blob/cba6f071aedafb766e82e4c2f469ed5e4638337d/LICENSE-MIT
// For the original context see: https://github.com/gakonst/ethers-rs/blob/cba6f071aedafb766e82e4c2f469ed5e4638337d/ethers-core/src/types/signature.rs

//! Ethereum signature types

mod fakeable;

use edr_primitives::{keccak256, Address, Signature, B256, U256};
pub use k256::SecretKey;
use k256::{
    ecdsa::{RecoveryId, SigningKey, VerifyingKey},
    elliptic_curve::sec1::ToEncodedPoint,
    FieldBytes, PublicKey,
};

pub use self::fakeable::FakeableSignature;

/// An error involving a signature.
#[derive(Debug, thiserror::Error)]
pub enum SignatureError {
    /// Invalid secret key.
    #[error("Expected 32 byte secret key")]
    InvalidSecretKeyLength,
    /// When parsing a secret key from string to hex
    #[error("Invalid hex")]
    InvalidSecretKeyHex,
    /// ECDSA error
    #[error(transparent)]
    ECDSAError(#[from] k256::ecdsa::Error),
    /// Elliptic curve error
    #[error(transparent)]
    EllipticCurveError(#[from] k256::elliptic_curve::Error),
}

/// Converts a [`PublicKey`] to an [`Address`].
pub fn public_key_to_address(public_key: PublicKey) -> Address {
    let public_key = public_key.to_encoded_point(/* compress = */ false);
    // First byte is header value
    let hash = keccak256(public_key.as_bytes().get(1..).unwrap_or_default());
    // Only take the lower 160 bits of the hash
    Address::from_word(hash)
}

/// Converts a secret key to the address of its account.
pub fn secret_key_to_address(secret_key: &SecretKey) -> Address {
    public_key_to_address(secret_key.public_key())
}

/// It's dangerous to represent secret keys as native string types, because the
/// native string types have debug, display and serialization implementations
/// that can result in the secrets accidentally leaking to logs. It's marked as
/// deprecated, because it should be only created in exactly one place in the
/// production code.
#[deprecated]
pub struct DangerousSecretKeyStr<'a>(pub &'a str);

// It's marked as deprecated to be thoughtful abouts its usage.
#[allow(deprecated)]
/// Converts a hex string to a secret key.
pub fn secret_key_from_str(
    secret_key: DangerousSecretKeyStr<'_>,
) -> Result<SecretKey, SignatureError> {
    #[allow(deprecated)]
    let str_key = secret_key.0;
    let secret_key = hex::decode(str_key.strip_prefix("0x").unwrap_or(str_key))
        // Hex error can leak character, so use opaque one.
        .map_err(|_err| SignatureError::InvalidSecretKeyHex)?;
    let secret_key = FieldBytes::from_exact_iter(secret_key)
        .ok_or(SignatureError::InvalidSecretKeyLength)?;
    SecretKey::from_bytes(&secret_key).map_err(SignatureError::EllipticCurveError)
}

/// Signs a 32-byte message hash, producing a recoverable signature.
pub fn sign_hash(secret_key: &SecretKey, hash: &B256) -> Result<Signature, SignatureError> {
    let signing_key = SigningKey::from(secret_key);
    let (signature, recovery_id) = signing_key.sign_prehash_recoverable(hash.as_slice())?;

    let (r, s) = signature.split_bytes();
    Ok(Signature::new(
        U256::from_be_slice(&r),
        U256::from_be_slice(&s),
        recovery_id.is_y_odd(),
    ))
}

/// Recovers the address of the account that signed the provided message hash.
pub fn recover_address(signature: &Signature, hash: &B256) -> Result<Address, SignatureError> {
    let ecdsa = k256::ecdsa::Signature::from_scalars(
        FieldBytes::from(signature.r().to_be_bytes::<32>()),
        FieldBytes::from(signature.s().to_be_bytes::<32>()),
    )?;
    let recovery_id = RecoveryId::new(signature.v(), false);

    let verifying_key = VerifyingKey::recover_from_prehash(hash.as_slice(), &ecdsa, recovery_id)?;
    Ok(public_key_to_address(PublicKey::from(&verifying_key)))
}

#[cfg(test)]
mod tests {
    use edr_primitives::address;

    use super::*;

    // This is test code, it's ok to use `DangerousSecretKeyStr`
    #[allow(deprecated)]
    fn default_secret_key() -> anyhow::Result<SecretKey> {
        Ok(secret_key_from_str(DangerousSecretKeyStr(
            "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80",
        ))?)
    }

    #[test]
    fn secret_key_to_address_matches_known_account() -> anyhow::Result<()> {
        let secret_key = default_secret_key()?;

        assert_eq!(
            secret_key_to_address(&secret_key),
            address!("0xf39fd6e51aad88f6f4ce6ab8827279cfffb92266")
        );

        Ok(())
    }

    #[test]
    fn sign_then_recover() -> anyhow::Result<()> {
        let secret_key = default_secret_key()?;
        let hash = keccak256(b"edr");

        let signature = sign_hash(&secret_key, &hash)?;
        assert_eq!(
            recover_address(&signature, &hash)?,
            secret_key_to_address(&secret_key)
        );

        Ok(())
    }

    #[test]
    #[allow(deprecated)]
    fn invalid_secret_keys() {
        assert!(matches!(
            secret_key_from_str(DangerousSecretKeyStr("0xzz")),
            Err(SignatureError::InvalidSecretKeyHex)
        ));
        assert!(matches!(
            secret_key_from_str(DangerousSecretKeyStr("0x1234")),
            Err(SignatureError::InvalidSecretKeyLength)
        ));
    }
}
