//! Source URL inspection

use std::io;

use anyhow::{Context, Result};
use docsync_core::RepositoryRef;

use crate::output::{OutputFormat, write_reference};

/// Parse `url` and print its components.
pub fn execute(url: &str, format: OutputFormat) -> Result<()> {
    let reference =
        RepositoryRef::parse(url).with_context(|| format!("Cannot use '{url}' as a source URL"))?;
    write_reference(io::stdout().lock(), &reference, format)
}
