// File: ./src/logging.rs
// Logger setup for the shells embedding this core (CLI importer, desktop
// app, test harnesses). The library itself only emits through the `log`
// facade.
use anyhow::{Context, Result};
use simplelog::{ColorChoice, Config, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::path::Path;

pub use simplelog::LevelFilter;

/// Log to the terminal. Call once, early.
pub fn init_term_logging(level: LevelFilter) -> Result<()> {
    TermLogger::init(
        level,
        Config::default(),
        TerminalMode::Mixed,
        ColorChoice::Auto,
    )
    .context("Failed to initialize terminal logger")
}

/// Log to a file, for headless import runs.
pub fn init_file_logging(level: LevelFilter, path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("Failed to create log file '{}'", path.display()))?;
    WriteLogger::init(level, Config::default(), file)
        .context("Failed to initialize file logger")
}
