use anyhow::Result;
use modbuild::build::select_dependencies;
use modbuild::{Branch, Scope};

use super::{load_project, parse_overrides};

pub fn run(overrides: Vec<String>, scope: Option<String>) -> Result<()> {
    let (_root, descriptor) = load_project()?;
    let overrides = parse_overrides(&overrides)?;
    let scope: Option<Scope> = scope.map(|s| s.parse()).transpose()?;

    let (selections, active) = select_dependencies(&descriptor, &overrides)?;

    println!("Feature toggles:");
    println!();
    for selection in selections {
        let state = if selection.enabled { "on " } else { "off" };
        let branch = match selection.branch {
            Branch::OnTrue => "on_true".to_string(),
            Branch::OnFalse => "on_false".to_string(),
            Branch::Nothing => "nothing".to_string(),
        };
        let marker = if overrides.contains_key(&selection.label) {
            " (overridden)"
        } else {
            ""
        };
        println!("  [{}] {} → {}{}", state, selection.label, branch, marker);
        for spec in &selection.specs {
            println!("        {} ({})", spec.coordinate, spec.scope);
        }
    }
    println!();

    let active: Vec<_> = active
        .into_iter()
        .filter(|spec| scope.map_or(true, |s| spec.scope == s))
        .collect();

    println!("Active dependencies ({}):", active.len());
    println!();
    for spec in &active {
        let deobf = if spec.transform == modbuild::Transform::Deobfuscate {
            " deobf"
        } else {
            ""
        };
        println!("  {} [{}{}]", spec.coordinate, spec.scope, deobf);
    }
    println!();

    Ok(())
}
