use edr_primitives::Address;
#[allow(deprecated)]
// This is test code, it's ok to use `DangerousSecretKeyStr`
use edr_signer::DangerousSecretKeyStr;
pub use edr_signer::{SecretKey, SignatureError};

/// The first of the well-known development accounts.
pub const DEFAULT_SECRET_KEY: &str =
    "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

/// The second of the well-known development accounts.
pub const SECOND_SECRET_KEY: &str =
    "0x59c6995e998f97a5a0044966f0945389dc9e86dae88c7a8412f4603b6b78690d";

/// Converts a hex string to a secret key.
pub fn secret_key_from_str(secret_key: &str) -> Result<SecretKey, SignatureError> {
    // This is test code, it's ok to use `DangerousSecretKeyStr`
    #[allow(deprecated)]
    edr_signer::secret_key_from_str(DangerousSecretKeyStr(secret_key))
}

/// Converts a secret key in a hex string format to an address.
///
/// Note that this function is in `edr_test_utils` to restrict opportunities for
/// misuse. In production code there should be only one place where secret keys
/// are parsed from string to avoid potential leakage into logs and error
/// messages.
///
/// # Examples
///
/// ```
/// use edr_test_utils::secret_key::secret_key_to_address;
///
/// let secret_key = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";
///
/// let address = secret_key_to_address(secret_key).unwrap();
/// ```
pub fn secret_key_to_address(secret_key: &str) -> Result<Address, SignatureError> {
    let secret_key = secret_key_from_str(secret_key)?;
    Ok(edr_signer::secret_key_to_address(&secret_key))
}
