mod fork;
mod mining;
mod provider;
