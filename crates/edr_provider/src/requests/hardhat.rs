mod accounts;
mod config;
mod log;
mod miner;
pub mod rpc_types;
mod state;
mod transactions;

pub use self::{accounts::*, config::*, log::*, miner::*, state::*, transactions::*};
