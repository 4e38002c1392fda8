//! Ethereum account types

use alloy_rlp::{RlpDecodable, RlpEncodable};
use edr_primitives::{code_hash, Bytes, HashMap, B256, KECCAK_EMPTY, KECCAK_NULL_RLP, U256};

/// Account information as seen by the execution layer.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountInfo {
    /// Balance of the account.
    pub balance: U256,
    /// Nonce of the account.
    pub nonce: u64,
    /// Hash of the account's code.
    pub code_hash: B256,
    /// The account's code, if loaded.
    ///
    /// When writing an account, `None` leaves any existing code untouched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<Bytes>,
}

impl AccountInfo {
    /// Constructs an account with the provided code.
    pub fn with_code(balance: U256, nonce: u64, code: Bytes) -> Self {
        Self {
            balance,
            nonce,
            code_hash: code_hash(&code),
            code: Some(code),
        }
    }

    /// Whether the account is empty according to EIP-161.
    pub fn is_empty(&self) -> bool {
        self.balance == U256::ZERO && self.nonce == 0 && self.code_hash == KECCAK_EMPTY
    }
}

impl Default for AccountInfo {
    fn default() -> Self {
        Self {
            balance: U256::ZERO,
            nonce: 0,
            code_hash: KECCAK_EMPTY,
            code: None,
        }
    }
}

/// Basic account type, as stored in the state trie.
#[derive(Clone, Debug, PartialEq, Eq, RlpDecodable, RlpEncodable)]
pub struct BasicAccount {
    /// Nonce of the account.
    pub nonce: u64,
    /// Balance of the account.
    pub balance: U256,
    /// Storage root of the account.
    pub storage_root: B256,
    /// Code hash of the account.
    pub code_hash: B256,
}

impl Default for BasicAccount {
    fn default() -> Self {
        BasicAccount {
            balance: U256::ZERO,
            nonce: 0,
            code_hash: KECCAK_EMPTY,
            storage_root: KECCAK_NULL_RLP,
        }
    }
}

impl From<(&AccountInfo, B256)> for BasicAccount {
    fn from((account_info, storage_root): (&AccountInfo, B256)) -> Self {
        Self {
            nonce: account_info.nonce,
            balance: account_info.balance,
            storage_root,
            code_hash: account_info.code_hash,
        }
    }
}

/// What happened to an account during execution.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum AccountStatus {
    /// The account was accessed or modified.
    #[default]
    Touched,
    /// The account was created; any prior storage is discarded.
    Created,
    /// The account self-destructed.
    SelfDestructed,
}

/// The post-execution state of an account.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Account {
    /// Account information after execution.
    pub info: AccountInfo,
    /// Storage slots that were written.
    pub storage: HashMap<U256, U256>,
    /// Status of the account.
    pub status: AccountStatus,
}

impl From<AccountInfo> for Account {
    fn from(info: AccountInfo) -> Self {
        Self {
            info,
            storage: HashMap::default(),
            status: AccountStatus::Touched,
        }
    }
}
