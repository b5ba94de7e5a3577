use anyhow::Result;
use modbuild::build::pins_from;
use modbuild::{BuildContext, BuildOptions, Config, Lockfile, LOCKFILE_NAME};
use std::path::Path;

use super::{load_project, parse_overrides, spinner};

pub fn run(
    overrides: Vec<String>,
    artifact: Option<String>,
    out: Option<String>,
    jobs: Option<usize>,
) -> Result<()> {
    let (root, descriptor) = load_project()?;
    let config = Config::load()?;
    let lockfile = Lockfile::load_from(root.join(LOCKFILE_NAME))?;

    println!(
        "Building {} {}...",
        descriptor.mod_info.id, descriptor.mod_info.version
    );
    println!();

    let options = BuildOptions {
        overrides: parse_overrides(&overrides)?,
        jobs: jobs.unwrap_or(config.resolver.jobs),
        pins: pins_from(lockfile.as_ref()),
        ..Default::default()
    };
    let ctx = BuildContext::from_config(&root, descriptor, &config, options)?;

    let primary = ctx.primary_artifact(artifact.map(|a| root.join(a)));
    if !primary.path.is_file() {
        println!(
            "  ⚠  Primary artifact {} does not exist yet",
            primary.path.display()
        );
        println!("     Manifests will point at it; compile before uploading.");
        println!();
    }

    let progress = spinner("Resolving and staging...");
    let output = match ctx.run(&primary) {
        Ok(output) => output,
        Err(e) => {
            progress.finish_with_message("✗ Build failed");
            return Err(e.into());
        }
    };
    progress.finish_with_message(format!(
        "✓ Resolved {} dependencies, staged {} files",
        output.resolution.resolved.len(),
        output.staging.len()
    ));

    let (staging_dir, manifest_dir) = match out {
        Some(out) => {
            let out = root.join(out);
            (out.join("staging"), out.join("publish"))
        }
        None => (
            root.join(&config.output.staging_dir),
            root.join(&config.output.manifest_dir),
        ),
    };

    let summary = output.commit(&staging_dir, &manifest_dir)?;

    println!();
    println!("  ✓ Staging tree: {}", staging_dir.display());
    for path in &summary.manifest_files {
        println!("  ✓ Manifest:     {}", display_relative(&root, path));
    }
    println!();
    println!("✓ Build complete");

    Ok(())
}

fn display_relative(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .display()
        .to_string()
}
