//! Cache clearing command implementation

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::Result;
use colored::Colorize;
use docsync_core::FsCacheStore;

/// Abstraction over the cache operations needed by the clear command.
pub trait ClearStorage {
    fn location(&self) -> PathBuf;
    fn entry_count(&self) -> Result<usize>;
    fn clear_cache(&self) -> Result<()>;
}

impl ClearStorage for FsCacheStore {
    fn location(&self) -> PathBuf {
        self.root().to_path_buf()
    }

    fn entry_count(&self) -> Result<usize> {
        Ok(self.slot_count()?)
    }

    fn clear_cache(&self) -> Result<()> {
        self.clear().map_err(anyhow::Error::from)
    }
}

/// High-level outcome produced by [`execute_clear`]. Useful for assertions in tests.
#[derive(Debug, PartialEq, Eq)]
pub enum ClearOutcome {
    /// Nothing was cached.
    AlreadyEmpty,
    /// User cancelled the clear operation.
    Cancelled,
    /// Cache cleared with the number of slots removed.
    Cleared { cleared: usize },
}

/// Core clear implementation with injectable dependencies to enable deterministic tests.
///
/// # Errors
///
/// Returns an error if counting slots, confirmation, or cache deletion fails.
pub fn execute_clear<S, W, C>(
    storage: &S,
    mut writer: W,
    force: bool,
    mut confirm: C,
) -> Result<ClearOutcome>
where
    S: ClearStorage,
    W: Write,
    C: FnMut(&Path) -> Result<bool>,
{
    let slots = storage.entry_count()?;
    let location = storage.location();

    if slots == 0 {
        writeln!(writer, "{} Cache is already empty", "ℹ".blue())?;
        return Ok(ClearOutcome::AlreadyEmpty);
    }

    writeln!(
        writer,
        "{} This will permanently delete {} cached entr{} under {}",
        "⚠".yellow(),
        slots,
        if slots == 1 { "y" } else { "ies" },
        location.display()
    )?;

    if !force && !confirm(&location)? {
        writeln!(writer, "{} Cancelled", "✗".red())?;
        return Ok(ClearOutcome::Cancelled);
    }

    storage.clear_cache()?;

    writeln!(writer, "{} Cache cleared successfully", "✓".green())?;
    writeln!(writer, "The next sync reports every page as added.")?;

    Ok(ClearOutcome::Cleared { cleared: slots })
}

/// Clears the configured cache root using terminal IO.
///
/// # Errors
///
/// Returns an error if cache access, user confirmation, or deletion fails.
pub fn run(cache_dir: &Path, force: bool) -> Result<()> {
    let storage = FsCacheStore::new(cache_dir);
    let stdout = io::stdout();
    let mut stdout_lock = stdout.lock();
    let mut input = String::new();

    execute_clear(&storage, &mut stdout_lock, force, |_location| {
        let prompt_stdout = io::stdout();
        let mut prompt_lock = prompt_stdout.lock();
        write!(prompt_lock, "Are you sure you want to continue? [y/N] ")?;
        prompt_lock.flush()?;

        input.clear();
        io::stdin().read_line(&mut input)?;

        Ok(matches!(
            input.trim().to_ascii_lowercase().as_str(),
            "y" | "yes"
        ))
    })?;

    Ok(())
}
