use edr_primitives::Address;

use crate::{data::ProviderData, time::TimeSinceEpoch, ProviderError};

pub fn handle_accounts_request<TimerT: TimeSinceEpoch>(
    data: &ProviderData<TimerT>,
) -> Result<Vec<Address>, ProviderError> {
    Ok(data.accounts().copied().collect())
}
