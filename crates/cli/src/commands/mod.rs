//! Command implementations.

mod info;
mod run;
mod validate;

pub use info::run_info;
pub use run::run_adapter;
pub use validate::run_validate;

use anyhow::{Context, Result};
use contracts::ListenerConfig;
use std::path::Path;

use crate::error::CliError;

/// Load a configuration file, reporting a missing file distinctly
fn load_config(path: &Path) -> Result<ListenerConfig> {
    if !path.exists() {
        return Err(CliError::config_not_found(path).into());
    }
    config_loader::ConfigLoader::load_from_path(path)
        .with_context(|| format!("Failed to load config from {}", path.display()))
}
