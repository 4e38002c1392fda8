//! Chain configuration: hardforks, their activation histories and per-chain
//! parameters.

/// Configurations of well-known chains.
pub mod chains;
mod hardfork;

use edr_eip1559::BaseFeeParams;

pub use self::hardfork::{Hardfork, UnknownHardforkName};

/// Fork condition for a hardfork.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ForkCondition {
    /// Activation based on block number.
    Block(u64),
    /// Activation based on UNIX timestamp.
    Timestamp(u64),
}

/// A type representing the activation of a hardfork.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HardforkActivation {
    /// The condition for the hardfork activation.
    pub condition: ForkCondition,
    /// The hardfork to be activated.
    pub hardfork: Hardfork,
}

/// The activation history of a chain's hardforks, ordered by activation.
#[derive(Clone, Debug, Default, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(transparent)]
pub struct HardforkActivations {
    hardforks: Vec<HardforkActivation>,
}

impl HardforkActivations {
    /// Constructs a new instance with the provided hardforks.
    pub fn new(hardforks: Vec<HardforkActivation>) -> Self {
        Self { hardforks }
    }

    /// Whether no hardforks activations are present.
    pub fn is_empty(&self) -> bool {
        self.hardforks.is_empty()
    }

    /// Returns the hardfork that is active at the provided block number and
    /// timestamp, if any.
    pub fn hardfork_at_block(&self, block_number: u64, timestamp: u64) -> Option<Hardfork> {
        self.hardforks
            .iter()
            .rev()
            .find(|HardforkActivation { condition, .. }| match condition {
                ForkCondition::Block(activation) => block_number >= *activation,
                ForkCondition::Timestamp(activation) => timestamp >= *activation,
            })
            .map(|activation| activation.hardfork)
    }

    /// The lowest block number at which a block-based activation occurs.
    fn first_block_activation(&self) -> Option<u64> {
        self.hardforks
            .iter()
            .filter_map(|activation| match activation.condition {
                ForkCondition::Block(block_number) => Some(block_number),
                ForkCondition::Timestamp(_) => None,
            })
            .min()
    }
}

impl From<&[HardforkActivation]> for HardforkActivations {
    fn from(hardforks: &[HardforkActivation]) -> Self {
        Self {
            hardforks: hardforks.to_vec(),
        }
    }
}

/// Type that stores the configuration for a chain.
#[derive(Clone, Debug, serde::Deserialize, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainConfig {
    /// Chain name
    pub name: String,
    /// Hardfork activations for the chain
    pub hardfork_activations: HardforkActivations,
    /// EIP-1559 parameters of the chain
    #[serde(default = "BaseFeeParams::ethereum")]
    pub base_fee_params: BaseFeeParams,
}

/// Error that occurs when no hardfork can be determined for a historical
/// block.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum HardforkResolutionError {
    /// The chain has no activation history.
    #[error(
        "No known hardfork for execution on historical block {block_number} (relative to fork block number {fork_block_number}) in chain with id {chain_id}. The node was not configured with a hardfork activation history."
    )]
    MissingActivationHistory {
        /// The chain ID
        chain_id: u64,
        /// The requested block number
        block_number: u64,
        /// The fork block number
        fork_block_number: u64,
    },
    /// The requested block precedes the first activation.
    #[error(
        "Could not find a hardfork to run for block {block_number}, as it precedes the first hardfork activation (block {first_activation}) in the history of chain with id {chain_id}."
    )]
    BlockPrecedesActivations {
        /// The chain ID
        chain_id: u64,
        /// The requested block number
        block_number: u64,
        /// The block of the first activation
        first_activation: u64,
    },
    /// None of the activations applies to the requested block.
    #[error(
        "Could not find a hardfork to run for block {block_number} with timestamp {timestamp}, after having looked for one in the hardfork activation history of chain with id {chain_id}."
    )]
    NoMatchingActivation {
        /// The chain ID
        chain_id: u64,
        /// The requested block number
        block_number: u64,
        /// The requested block's timestamp
        timestamp: u64,
    },
}

/// Arguments for [`resolve_hardfork`].
#[derive(Clone, Copy, Debug)]
pub struct ResolveHardforkArgs<'a> {
    /// The chain's activation history, if configured
    pub activations: Option<&'a HardforkActivations>,
    /// The chain ID
    pub chain_id: u64,
    /// The block to resolve the hardfork for
    pub block_number: u64,
    /// The timestamp of the block
    pub timestamp: u64,
    /// The block number the node is forked from
    pub fork_block_number: u64,
}

/// Determines the hardfork of a historical block from the chain's activation
/// history.
pub fn resolve_hardfork(args: ResolveHardforkArgs<'_>) -> Result<Hardfork, HardforkResolutionError> {
    let ResolveHardforkArgs {
        activations,
        chain_id,
        block_number,
        timestamp,
        fork_block_number,
    } = args;

    let activations = activations
        .filter(|activations| !activations.is_empty())
        .ok_or(HardforkResolutionError::MissingActivationHistory {
            chain_id,
            block_number,
            fork_block_number,
        })?;

    if let Some(hardfork) = activations.hardfork_at_block(block_number, timestamp) {
        return Ok(hardfork);
    }

    match activations.first_block_activation() {
        Some(first_activation) if block_number < first_activation => {
            Err(HardforkResolutionError::BlockPrecedesActivations {
                chain_id,
                block_number,
                first_activation,
            })
        }
        _ => Err(HardforkResolutionError::NoMatchingActivation {
            chain_id,
            block_number,
            timestamp,
        }),
    }
}
