use anyhow::{Context, Result};
use modbuild::Coordinate;

use super::load_project;

pub fn run(coordinate: String) -> Result<()> {
    let (_root, descriptor) = load_project()?;
    let coordinate: Coordinate = coordinate
        .parse()
        .with_context(|| format!("Invalid coordinate '{}'", coordinate))?;

    let registry = descriptor.registry()?;
    let repository = registry.route(&coordinate)?;

    println!("{}", coordinate);
    println!("  Repository: {}", repository.id);
    match &repository.exclusivity_filter {
        Some(prefixes) => println!(
            "  Claimed by: {}",
            prefixes.iter().cloned().collect::<Vec<_>>().join(", ")
        ),
        None => println!("  Claimed by: (catch-all)"),
    }
    println!("  Location:   {}", repository.artifact_location(&coordinate)?);

    Ok(())
}
