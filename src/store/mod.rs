//! Local store: layout and the prepared-artifact cache
//!
//! The store assumes a single writer per image identity; concurrent
//! pushes of the same image may race on the cached documents. Writes
//! are atomic, so readers see either the old or the new artifact,
//! never a partial one.

pub mod cache;
pub mod layout;

pub use layout::StoreLayout;
