//! CLI Config Command

use std::path::Path;

use anyhow::{bail, Result};
use plugcache_config::{apply_all_defaults, load_and_prepare, write_config, PlugCacheConfig};

use crate::terminal_output::note_success;
use crate::ConfigAction;

pub async fn run(action: ConfigAction, path: &Path) -> Result<()> {
    match action {
        ConfigAction::Show => show(&load_and_prepare(path).await?),
        ConfigAction::Init { force } => init(path, force).await,
    }
}

pub fn show(config: &PlugCacheConfig) -> Result<()> {
    print!("{}", serde_yaml::to_string(config)?);
    Ok(())
}

/// Write a config file populated with defaults.
pub async fn init(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        bail!("{} already exists; pass --force to overwrite", path.display());
    }
    write_config(&apply_all_defaults(PlugCacheConfig::default()), path).await?;
    note_success(&format!("wrote {}", path.display()));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use plugcache_config::load_config;

    #[tokio::test]
    async fn init_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.yaml");

        init(&path, false).await.unwrap();
        assert_eq!(load_config(&path).await.unwrap().log_level(), "info");
        assert!(init(&path, false).await.is_err());
        init(&path, true).await.unwrap();
    }
}
