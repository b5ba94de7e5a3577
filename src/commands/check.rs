use anyhow::Result;
use modbuild::RepositoryLayout;

use super::load_project;

pub fn run() -> Result<()> {
    let (_root, descriptor) = load_project()?;
    let info = &descriptor.mod_info;

    println!("Checking {} {} ({})...", info.id, info.version, info.group);
    println!();

    let registry = descriptor.registry()?;
    println!("  ✓ {} repositories", registry.len());
    for repo in registry.iter() {
        let layout = match &repo.layout {
            RepositoryLayout::Maven => "maven".to_string(),
            RepositoryLayout::Ivy { pattern } => format!("ivy {}", pattern),
        };
        match &repo.exclusivity_filter {
            Some(prefixes) => println!(
                "      {} ({}) exclusive: {}",
                repo.id,
                layout,
                prefixes.iter().cloned().collect::<Vec<_>>().join(", ")
            ),
            None => println!("      {} ({}) catch-all", repo.id, layout),
        }
    }

    let base = descriptor.base_dependencies()?;
    println!("  ✓ {} unconditional dependencies", base.len());

    let matrix = descriptor.feature_matrix()?;
    println!(
        "  ✓ {} feature toggles, {} conditional groups",
        matrix.toggles().len(),
        matrix.groups().len()
    );

    // Routing is checked for every coordinate either branch could pull in
    let mut unroutable = Vec::new();
    let toggle_specs = matrix
        .toggles()
        .iter()
        .flat_map(|t| t.on_true.iter().chain(t.on_false.iter().flatten()));
    let group_specs = matrix
        .groups()
        .iter()
        .flat_map(|g| g.on_true.iter().chain(g.on_false.iter().flatten()));
    let every_spec = base.iter().chain(toggle_specs).chain(group_specs);
    for spec in every_spec {
        if registry.route(&spec.coordinate).is_err() {
            unroutable.push(spec.coordinate.to_string());
        }
    }
    if !unroutable.is_empty() {
        unroutable.sort();
        unroutable.dedup();
        println!("  ✗ {} coordinates cannot be routed:", unroutable.len());
        for coordinate in &unroutable {
            println!("      {}", coordinate);
        }
        println!();
        anyhow::bail!("No repository can serve '{}'", unroutable[0]);
    }
    println!("  ✓ every declared coordinate is routable");

    let targets = descriptor.publish_targets()?;
    println!("  ✓ {} publish targets", targets.len());

    let rules = descriptor.injection_rules()?;
    println!("  ✓ {} injection rules", rules.len());

    println!();
    println!("✓ {} is valid", modbuild::DESCRIPTOR_NAME);

    Ok(())
}
