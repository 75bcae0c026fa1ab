//! Shared helpers for the docsync CLI

pub mod cli_args;
pub mod logging;
