use anyhow::Result;
use modbuild::build::pins_from;
use modbuild::{BuildContext, BuildOptions, Config, Lockfile, LOCKFILE_NAME};

use super::{load_project, parse_overrides};

/// Prints manifests on stdout so they can be piped to an uploader
pub fn run(overrides: Vec<String>, artifact: Option<String>) -> Result<()> {
    let (root, descriptor) = load_project()?;
    let config = Config::load()?;
    let lockfile = Lockfile::load_from(root.join(LOCKFILE_NAME))?;

    let options = BuildOptions {
        overrides: parse_overrides(&overrides)?,
        jobs: config.resolver.jobs,
        pins: pins_from(lockfile.as_ref()),
        ..Default::default()
    };
    let ctx = BuildContext::from_config(&root, descriptor, &config, options)?;

    let primary = ctx.primary_artifact(artifact.map(|a| root.join(a)));
    let resolution = ctx.resolve()?;
    let manifests = ctx.plan(&resolution, &primary)?;

    let manifests: Vec<_> = manifests.into_values().collect();
    println!("{}", serde_json::to_string_pretty(&manifests)?);

    Ok(())
}
