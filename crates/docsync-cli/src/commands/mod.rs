//! Command implementations for the docsync CLI
//!
//! Each command lives in its own submodule.

mod clear;
mod parse;
mod sync;

pub use clear::run as clear_cache;
pub use parse::execute as parse_reference;
pub use sync::{SyncOptions, execute as sync_pages};
