use edr_chain_config::Hardfork;
use edr_transaction::{AccessListItem, TxKind};

/// Base cost of every transaction.
pub const TRANSACTION_GAS: u64 = 21_000;
/// Additional base cost of a contract creation, since Homestead.
pub const CREATE_GAS: u64 = 32_000;
/// Cost per zero byte of call data.
pub const ZERO_BYTE_GAS: u64 = 4;
/// Cost per non-zero byte of call data, since Istanbul (EIP-2028).
pub const NON_ZERO_BYTE_GAS: u64 = 16;
/// Cost per non-zero byte of call data, before Istanbul.
pub const NON_ZERO_BYTE_GAS_FRONTIER: u64 = 68;
/// Cost per address in the access list (EIP-2930).
pub const ACCESS_LIST_ADDRESS_GAS: u64 = 2_400;
/// Cost per storage key in the access list (EIP-2930).
pub const ACCESS_LIST_STORAGE_KEY_GAS: u64 = 1_900;
/// Cost per 32-byte word of init code (EIP-3860).
pub const INITCODE_WORD_GAS: u64 = 2;
/// Cost per byte of deployed code.
pub const CODE_DEPOSIT_GAS: u64 = 200;

/// Calculates the gas that a transaction costs before executing any code.
pub fn intrinsic_gas(
    hardfork: Hardfork,
    kind: TxKind,
    input: &[u8],
    access_list: &[AccessListItem],
) -> u64 {
    let zero_bytes = input.iter().filter(|byte| **byte == 0).count() as u64;
    let non_zero_bytes = input.len() as u64 - zero_bytes;

    let non_zero_byte_gas = if hardfork >= Hardfork::Istanbul {
        NON_ZERO_BYTE_GAS
    } else {
        NON_ZERO_BYTE_GAS_FRONTIER
    };

    let mut gas = TRANSACTION_GAS + zero_bytes * ZERO_BYTE_GAS + non_zero_bytes * non_zero_byte_gas;

    if kind.is_create() {
        if hardfork >= Hardfork::Homestead {
            gas += CREATE_GAS;
        }

        if hardfork >= Hardfork::Shanghai {
            gas += (input.len() as u64).div_ceil(32) * INITCODE_WORD_GAS;
        }
    }

    if hardfork >= Hardfork::Berlin {
        let storage_keys: usize = access_list.iter().map(|item| item.storage_keys.len()).sum();

        gas += access_list.len() as u64 * ACCESS_LIST_ADDRESS_GAS
            + storage_keys as u64 * ACCESS_LIST_STORAGE_KEY_GAS;
    }

    gas
}

/// The maximum fraction of used gas that is refunded, as a divisor.
pub fn max_refund_quotient(hardfork: Hardfork) -> u64 {
    if hardfork >= Hardfork::London {
        5
    } else {
        2
    }
}

#[cfg(test)]
mod tests {
    use edr_primitives::{Address, B256};

    use super::*;

    #[test]
    fn value_transfer() {
        let kind = TxKind::Call(Address::ZERO);
        assert_eq!(intrinsic_gas(Hardfork::Cancun, kind, &[], &[]), 21_000);
    }

    #[test]
    fn call_data_pricing_changes_in_istanbul() {
        let kind = TxKind::Call(Address::ZERO);
        let input = [0u8, 1, 2];

        assert_eq!(intrinsic_gas(Hardfork::Istanbul, kind, &input, &[]), 21_000 + 4 + 32);
        assert_eq!(
            intrinsic_gas(Hardfork::Petersburg, kind, &input, &[]),
            21_000 + 4 + 136
        );
    }

    #[test]
    fn contract_creation() {
        let input = vec![1u8; 33];

        assert_eq!(
            intrinsic_gas(Hardfork::Shanghai, TxKind::Create, &input, &[]),
            21_000 + 32_000 + 33 * 16 + 2 * 2
        );
        assert_eq!(
            intrinsic_gas(Hardfork::Frontier, TxKind::Create, &[], &[]),
            21_000
        );
    }

    #[test]
    fn access_list() {
        let access_list = vec![AccessListItem {
            address: Address::ZERO,
            storage_keys: vec![B256::ZERO, B256::repeat_byte(1)],
        }];
        let kind = TxKind::Call(Address::ZERO);

        assert_eq!(
            intrinsic_gas(Hardfork::Berlin, kind, &[], &access_list),
            21_000 + 2_400 + 2 * 1_900
        );
    }
}
