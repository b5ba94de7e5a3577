use anyhow::{bail, Result};
use modbuild::build::pins_from;
use modbuild::{BuildContext, BuildOptions, Config, Lockfile, LOCKFILE_NAME};

use super::{load_project, parse_overrides, spinner};

pub fn run(overrides: Vec<String>, jobs: Option<usize>, frozen: bool) -> Result<()> {
    let (root, descriptor) = load_project()?;
    let config = Config::load()?;
    let lockfile_path = root.join(LOCKFILE_NAME);
    let lockfile = Lockfile::load_from(&lockfile_path)?;

    if frozen && lockfile.is_none() {
        bail!("--frozen requires an existing {}", LOCKFILE_NAME);
    }

    let options = BuildOptions {
        overrides: parse_overrides(&overrides)?,
        jobs: jobs.unwrap_or(config.resolver.jobs),
        // Without --frozen the lockfile is rewritten, so only a frozen run enforces it
        pins: if frozen {
            pins_from(lockfile.as_ref())
        } else {
            Default::default()
        },
        ..Default::default()
    };
    let ctx = BuildContext::from_config(&root, descriptor, &config, options)?;

    let progress = spinner("Resolving dependencies...");
    let resolution = match ctx.resolve() {
        Ok(resolution) => resolution,
        Err(e) => {
            progress.finish_with_message("✗ Resolution failed");
            return Err(e.into());
        }
    };
    progress.finish_with_message(format!(
        "✓ Resolved {} dependencies",
        resolution.resolved.len()
    ));
    println!();

    for artifact in &resolution.resolved {
        println!(
            "  {} [{}] from {}",
            artifact.coordinate(),
            artifact.spec.scope,
            artifact.repository
        );
    }
    println!();

    let unchanged = lockfile
        .as_ref()
        .is_some_and(|l| l.matches(&resolution.resolved));

    if unchanged {
        println!("✓ {} is up to date", LOCKFILE_NAME);
    } else if frozen {
        bail!(
            "{} is out of date for this dependency set\n\nRun `modbuild resolve` without --frozen to update it.",
            LOCKFILE_NAME
        );
    } else {
        Lockfile::from_resolved(&resolution.resolved).save_to(&lockfile_path)?;
        println!("✓ Wrote {}", LOCKFILE_NAME);
    }

    Ok(())
}
