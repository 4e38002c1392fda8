use edr_primitives::{Address, HashMap};
use edr_signer::secret_key_to_address;
use edr_state_api::{account::AccountInfo, StateError, StateView};
use indexmap::IndexMap;

use crate::config::{AccountOverride, ProviderConfig};

/// Maps the owned accounts of the configuration to their addresses.
pub(super) fn local_accounts(config: &ProviderConfig) -> IndexMap<Address, k256::SecretKey> {
    config
        .owned_accounts
        .iter()
        .map(|secret_key| (secret_key_to_address(secret_key), secret_key.clone()))
        .collect()
}

/// Constructs the genesis accounts of a local chain. Storage is applied
/// separately by [`apply_storage_overrides`].
pub(super) fn genesis_accounts(
    overrides: &HashMap<Address, AccountOverride>,
) -> HashMap<Address, AccountInfo> {
    overrides
        .iter()
        .map(|(address, account_override)| {
            let mut account = AccountInfo::default();
            apply_account_override(&mut account, account_override);

            (*address, account)
        })
        .collect()
}

/// Applies the overrides on top of the accounts that already exist in the
/// state, e.g. the remote accounts in fork mode.
pub(super) fn apply_account_overrides(
    state: &mut dyn StateView,
    overrides: &HashMap<Address, AccountOverride>,
) -> Result<(), StateError> {
    for (address, account_override) in overrides {
        let mut account = state.account(*address)?;
        // Existing code is kept unless overridden
        account.code = None;
        apply_account_override(&mut account, account_override);

        state.put_account(*address, account)?;
    }

    apply_storage_overrides(state, overrides)
}

/// Writes the storage slots of the overrides, replacing any existing storage
/// of the overridden accounts.
pub(super) fn apply_storage_overrides(
    state: &mut dyn StateView,
    overrides: &HashMap<Address, AccountOverride>,
) -> Result<(), StateError> {
    for (address, account_override) in overrides {
        let Some(storage) = &account_override.storage else {
            continue;
        };

        state.clear_contract_storage(*address)?;
        for (index, value) in storage {
            state.put_contract_storage(*address, *index, *value)?;
        }
    }

    Ok(())
}

fn apply_account_override(account: &mut AccountInfo, account_override: &AccountOverride) {
    if let Some(balance) = account_override.balance {
        account.balance = balance;
    }

    if let Some(nonce) = account_override.nonce {
        account.nonce = nonce;
    }

    if let Some(code) = &account_override.code {
        *account = AccountInfo::with_code(account.balance, account.nonce, code.clone());
    }
}

#[cfg(test)]
mod tests {
    use edr_primitives::{Bytes, KECCAK_EMPTY, U256};
    use edr_state_local::LocalState;

    use super::*;

    #[test]
    fn genesis_accounts_from_overrides() {
        let address = Address::repeat_byte(0x11);
        let code = Bytes::from_static(&[0x60, 0x00]);

        let mut overrides = HashMap::default();
        overrides.insert(
            address,
            AccountOverride {
                balance: Some(U256::from(100)),
                nonce: Some(3),
                code: Some(code.clone()),
                storage: None,
            },
        );

        let accounts = genesis_accounts(&overrides);
        let account = &accounts[&address];
        assert_eq!(account.balance, U256::from(100));
        assert_eq!(account.nonce, 3);
        assert_eq!(account.code, Some(code));
        assert_ne!(account.code_hash, KECCAK_EMPTY);
    }

    #[test]
    fn overrides_keep_unspecified_fields() -> anyhow::Result<()> {
        let address = Address::repeat_byte(0x22);

        let mut accounts = HashMap::default();
        accounts.insert(
            address,
            AccountInfo {
                balance: U256::from(5),
                nonce: 7,
                ..AccountInfo::default()
            },
        );
        let mut state = LocalState::with_accounts(accounts)?;

        let mut overrides = HashMap::default();
        overrides.insert(
            address,
            AccountOverride {
                balance: Some(U256::from(9)),
                storage: Some([(U256::from(1), U256::from(2))].into_iter().collect()),
                ..AccountOverride::default()
            },
        );

        apply_account_overrides(&mut state, &overrides)?;

        let account = state.account(address)?;
        assert_eq!(account.balance, U256::from(9));
        assert_eq!(account.nonce, 7);
        assert_eq!(state.contract_storage(address, U256::from(1))?, U256::from(2));

        Ok(())
    }
}
