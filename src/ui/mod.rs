//! UI module for consistent CLI output
//!
//! Uses `cliclack` for status lines and `indicatif` for upload
//! progress, with automatic fallback to plain output in CI and other
//! non-interactive environments.

mod context;
mod output;
mod progress;

pub use context::UiContext;
pub use output::{intro, key_value, outro_error, outro_success};
pub use progress::PushProgress;
