use edr_primitives::B256;

use crate::{data::ProviderData, time::TimeSinceEpoch, ProviderError};

/// Removes a pending transaction. Returns `false` for unknown transactions
/// and fails for mined ones.
pub fn handle_drop_transaction<TimerT: TimeSinceEpoch>(
    data: &mut ProviderData<TimerT>,
    transaction_hash: B256,
) -> Result<bool, ProviderError> {
    data.remove_pending_transaction(&transaction_hash)
}
