mod accounts;
mod blocks;
mod call;
mod config;
mod evm;
mod gas;
mod mine;
mod state;
mod transactions;

pub use self::{
    accounts::*, blocks::*, call::*, config::*, evm::*, gas::*, mine::*, state::*,
    transactions::*,
};
