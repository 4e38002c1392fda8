use std::sync::Arc;

use edr_block_miner::LocalBlock;
use edr_eth::{block::Block, transaction::Transaction, BlockSpec};
use edr_primitives::{Bloom, Bytes, B256, B64, KECCAK_NULL_RLP, KECCAK_RLP_EMPTY_ARRAY, U256, U64};

use crate::{
    blockchain::ChainBlock,
    data::{BlockDataForTransaction, ProviderData, TransactionAndBlock},
    requests::{eth::transactions::transaction_to_rpc, validation::validate_post_merge_block_tags},
    time::TimeSinceEpoch,
    ProviderError,
};

/// A transaction of a block, either its hash or the full object.
#[derive(Clone, Debug, PartialEq, Eq, serde::Deserialize, serde::Serialize)]
#[serde(untagged)]
pub enum HashOrTransaction {
    Hash(B256),
    Transaction(Transaction),
}

pub fn handle_block_number_request<TimerT: TimeSinceEpoch>(
    data: &ProviderData<TimerT>,
) -> Result<U64, ProviderError> {
    Ok(U64::from(data.last_block_number()))
}

pub fn handle_get_block_by_number_request<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    block_spec: BlockSpec,
    transaction_detail_flag: bool,
) -> Result<Option<Block<HashOrTransaction>>, ProviderError> {
    validate_post_merge_block_tags(data.hardfork(), &block_spec)?;

    match data.block_by_block_spec(&block_spec) {
        Ok(Some(ChainBlock::Local(block))) => Ok(Some(local_block_to_rpc_output(
            &block,
            false,
            transaction_detail_flag,
        ))),
        Ok(Some(ChainBlock::Remote(block))) => {
            // Remote transactions are only reported by hash
            Ok(Some(Block {
                hash: Some(block.hash),
                parent_hash: block.parent_hash,
                sha3_uncles: KECCAK_RLP_EMPTY_ARRAY,
                state_root: block.state_root,
                transactions_root: KECCAK_NULL_RLP,
                receipts_root: KECCAK_NULL_RLP,
                number: Some(block.number),
                gas_used: block.gas_used,
                gas_limit: block.gas_limit,
                extra_data: Bytes::new(),
                logs_bloom: Bloom::ZERO,
                timestamp: block.timestamp,
                difficulty: U256::ZERO,
                uncles: Vec::new(),
                transactions: block
                    .transactions
                    .iter()
                    .copied()
                    .map(HashOrTransaction::Hash)
                    .collect(),
                mix_hash: B256::ZERO,
                nonce: B64::ZERO,
                base_fee_per_gas: block.base_fee_per_gas,
                miner: block.miner,
                withdrawals_root: None,
                parent_beacon_block_root: None,
            }))
        }
        // Pending block
        Ok(None) => {
            let (block, _state) = data.mine_pending_block()?;
            Ok(Some(local_block_to_rpc_output(
                &Arc::new(block),
                true,
                transaction_detail_flag,
            )))
        }
        Err(ProviderError::InvalidBlockNumberOrHash { .. }) => Ok(None),
        Err(error) => Err(error),
    }
}

fn local_block_to_rpc_output(
    block: &Arc<LocalBlock>,
    pending: bool,
    transaction_detail_flag: bool,
) -> Block<HashOrTransaction> {
    let header = &block.header;

    let transactions = block
        .transactions
        .iter()
        .enumerate()
        .map(|(index, executed)| {
            if transaction_detail_flag {
                let block_data = (!pending).then(|| BlockDataForTransaction {
                    block: block.clone(),
                    transaction_index: index as u64,
                });

                HashOrTransaction::Transaction(transaction_to_rpc(&TransactionAndBlock {
                    transaction: executed.transaction.clone(),
                    block_data,
                }))
            } else {
                HashOrTransaction::Hash(*executed.transaction.hash())
            }
        })
        .collect();

    Block {
        hash: (!pending).then_some(block.hash),
        parent_hash: header.parent_hash,
        sha3_uncles: header.ommers_hash,
        state_root: header.state_root,
        transactions_root: header.transactions_root,
        receipts_root: header.receipts_root,
        number: (!pending).then_some(header.number),
        gas_used: header.gas_used,
        gas_limit: header.gas_limit,
        extra_data: header.extra_data.clone(),
        logs_bloom: header.logs_bloom,
        timestamp: header.timestamp,
        difficulty: header.difficulty,
        uncles: Vec::new(),
        transactions,
        mix_hash: header.mix_hash,
        nonce: header.nonce,
        base_fee_per_gas: header.base_fee_per_gas,
        miner: header.beneficiary,
        withdrawals_root: header.withdrawals_root,
        parent_beacon_block_root: header.parent_beacon_block_root,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::ProviderTestFixture;

    #[test]
    fn pending_block_has_no_hash_or_number() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;
        fixture.provider_data.set_auto_mining(false);

        let transaction = fixture.signed_dummy_transaction(0)?;
        let transaction_hash = *transaction.hash();
        fixture.provider_data.send_transaction(transaction)?;

        let block = handle_get_block_by_number_request(
            &mut fixture.provider_data,
            BlockSpec::pending(),
            false,
        )?
        .expect("pending block exists");

        assert_eq!(block.hash, None);
        assert_eq!(block.number, None);
        assert_eq!(
            block.transactions,
            vec![HashOrTransaction::Hash(transaction_hash)]
        );

        Ok(())
    }

    #[test]
    fn full_transactions_of_mined_block() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let transaction = fixture.signed_dummy_transaction(0)?;
        let transaction_hash = *transaction.hash();
        fixture.provider_data.send_transaction(transaction)?;

        let block = handle_get_block_by_number_request(
            &mut fixture.provider_data,
            BlockSpec::latest(),
            true,
        )?
        .expect("latest block exists");

        assert_eq!(block.number, Some(1));
        assert_eq!(block.hash, Some(fixture.provider_data.last_block().hash));

        let [HashOrTransaction::Transaction(transaction)] = block.transactions.as_slice() else {
            panic!("expected a single full transaction");
        };
        assert_eq!(transaction.hash, transaction_hash);
        assert_eq!(transaction.block_number, Some(1));

        Ok(())
    }

    #[test]
    fn future_block_is_null() -> anyhow::Result<()> {
        let mut fixture = ProviderTestFixture::new_local()?;

        let block = handle_get_block_by_number_request(
            &mut fixture.provider_data,
            BlockSpec::Number(100),
            false,
        )?;
        assert!(block.is_none());

        let block_number = handle_block_number_request(&fixture.provider_data)?;
        assert_eq!(block_number, U64::ZERO);

        Ok(())
    }
}
