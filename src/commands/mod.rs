pub mod build;
pub mod check;
pub mod config;
pub mod deps;
pub mod plan;
pub mod resolve;
pub mod route;

use anyhow::{bail, Result};
use indicatif::{ProgressBar, ProgressStyle};
use modbuild::{Descriptor, DESCRIPTOR_NAME};
use std::collections::BTreeMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Load `modbuild.toml` from the current directory
pub fn load_project() -> Result<(PathBuf, Descriptor)> {
    let root = env::current_dir()?;
    if !Descriptor::exists(&root) {
        bail!(
            "{} not found in {}\n\nRun modbuild from the directory that holds the build descriptor.",
            DESCRIPTOR_NAME,
            root.display()
        );
    }
    let descriptor = Descriptor::load(&root)
        .map_err(|e| anyhow::anyhow!("Failed to load {}: {}", DESCRIPTOR_NAME, e))?;
    Ok((root, descriptor))
}

/// Parse `--set name=bool` arguments
pub fn parse_overrides(values: &[String]) -> Result<BTreeMap<String, bool>> {
    let mut overrides = BTreeMap::new();
    for value in values {
        let Some((name, flag)) = value.split_once('=') else {
            bail!("Invalid --set '{}': expected NAME=true or NAME=false", value);
        };
        let flag = flag
            .trim()
            .parse::<bool>()
            .map_err(|_| anyhow::anyhow!("Invalid --set '{}': value must be true or false", value))?;
        overrides.insert(name.trim().to_string(), flag);
    }
    Ok(overrides)
}

pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_chars("⠋⠙⠹⠸⠼⠴⠦⠧⠇⠏"),
    );
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(80));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_overrides() {
        let overrides =
            parse_overrides(&["testThaumcraft=true".to_string(), "testNEI = false".to_string()])
                .unwrap();
        assert_eq!(overrides["testThaumcraft"], true);
        assert_eq!(overrides["testNEI"], false);

        assert!(parse_overrides(&["testThaumcraft".to_string()]).is_err());
        assert!(parse_overrides(&["testThaumcraft=yes".to_string()]).is_err());
    }
}
