mod config;

pub use self::config::{ResetForkConfig, ResetProviderConfig};
