//! Handler functions for `prairie config {path,show}`.

use prairie_core::{Error, Result};

use crate::cli::ConfigAction;
use crate::config::PrairieConfig;

/// Handle a config subcommand.
///
/// Receives the raw `--config` path so that `path` works before a config
/// file exists.
pub fn handle_config_command(config_path: Option<&str>, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Path => cmd_config_path(config_path),
        ConfigAction::Show => {
            let config = PrairieConfig::load(config_path)?;
            print!("{}", config.to_toml_string()?);
            Ok(())
        }
    }
}

fn cmd_config_path(config_path: Option<&str>) -> Result<()> {
    match PrairieConfig::resolve_config_path(config_path) {
        Some(path) => {
            println!("{}", path.display());
            if !path.exists() {
                eprintln!("(file does not exist; built-in defaults apply)");
            }
            Ok(())
        }
        None => Err(Error::config(
            "Could not determine config directory for this platform",
        )),
    }
}
