pub mod env;
pub mod secret_key;
