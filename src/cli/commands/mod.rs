//! Subcommand implementations

mod config;
mod push;

pub use config::execute as config;
pub use push::execute as push;
