pub mod control;
pub mod daemon;
pub mod extract;
pub mod lists;
pub mod status;

use std::path::PathBuf;

use anyhow::{Context, Result};

pub(crate) fn home() -> Result<PathBuf> {
    rotator_core::paths::home().context("could not determine home directory")
}
