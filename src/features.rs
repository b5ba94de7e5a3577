//! Feature matrix: boolean toggles selecting dependency variants
//!
//! Each [`FeatureToggle`] gates one integration. When enabled its `on_true`
//! branch is active, otherwise its `on_false` branch (if any). A toggle without
//! an `on_false` branch contributes nothing when disabled: this is how optional
//! test integrations that have no compile-only stub are expressed.
//!
//! [`ConditionalGroup`]s cover dependencies shared by several integrations (a
//! library needed when *any* of a set of toggles is on). Groups read toggles but
//! never change them, so toggles stay independent of each other.
//!
//! # Examples
//!
//! ```
//! use modbuild::{DependencySpec, FeatureMatrix, FeatureToggle, Scope};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let thaumcraft = "curse:thaumcraft-223628:2227552".parse()?;
//! let toggle = FeatureToggle::new("testThaumcraft", false)
//!     .on_true(vec![DependencySpec::new(thaumcraft, Scope::DevOnlyNonPublishable)])
//!     .on_false(vec![DependencySpec::new(
//!         "curse:thaumcraft-223628:2227552".parse()?,
//!         Scope::CompileOnly,
//!     )]);
//!
//! let matrix = FeatureMatrix::new(vec![toggle], vec![])?;
//! let active = matrix.active_dependencies();
//! assert_eq!(active.len(), 1);
//! assert_eq!(active[0].scope, Scope::CompileOnly);
//! # Ok(())
//! # }
//! ```

use crate::{DependencySpec, Error, Result};
use std::collections::{BTreeMap, HashSet};
use tracing::debug;

/// A named boolean gating one integration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureToggle {
    pub name: String,
    pub enabled: bool,
    pub on_true: Vec<DependencySpec>,
    /// `None` means a disabled toggle contributes nothing
    pub on_false: Option<Vec<DependencySpec>>,
}

impl FeatureToggle {
    pub fn new(name: impl Into<String>, enabled: bool) -> Self {
        Self {
            name: name.into(),
            enabled,
            on_true: Vec::new(),
            on_false: None,
        }
    }

    pub fn on_true(mut self, specs: Vec<DependencySpec>) -> Self {
        self.on_true = specs;
        self
    }

    pub fn on_false(mut self, specs: Vec<DependencySpec>) -> Self {
        self.on_false = Some(specs);
        self
    }

    /// The branch this toggle contributes for its current state
    pub fn selected(&self) -> &[DependencySpec] {
        if self.enabled {
            &self.on_true
        } else {
            self.on_false.as_deref().unwrap_or(&[])
        }
    }

    pub fn branch(&self) -> Branch {
        branch_for(self.enabled, &self.on_true, self.on_false.as_deref())
    }
}

/// Dependencies active when any of several toggles is enabled
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionalGroup {
    pub when_any: Vec<String>,
    pub on_true: Vec<DependencySpec>,
    pub on_false: Option<Vec<DependencySpec>>,
}

impl ConditionalGroup {
    pub fn new<I, S>(when_any: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            when_any: when_any.into_iter().map(Into::into).collect(),
            on_true: Vec::new(),
            on_false: None,
        }
    }

    pub fn on_true(mut self, specs: Vec<DependencySpec>) -> Self {
        self.on_true = specs;
        self
    }

    pub fn on_false(mut self, specs: Vec<DependencySpec>) -> Self {
        self.on_false = Some(specs);
        self
    }

    pub fn label(&self) -> String {
        self.when_any.join(" || ")
    }
}

/// Which branch of a toggle or group is in effect
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Branch {
    OnTrue,
    OnFalse,
    /// The selected branch is absent or empty
    Nothing,
}

fn branch_for(enabled: bool, on_true: &[DependencySpec], on_false: Option<&[DependencySpec]>) -> Branch {
    match (enabled, on_false) {
        (true, _) if !on_true.is_empty() => Branch::OnTrue,
        (false, Some(specs)) if !specs.is_empty() => Branch::OnFalse,
        _ => Branch::Nothing,
    }
}

/// How one toggle or group was decided, for reporting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Selection {
    pub label: String,
    pub enabled: bool,
    pub branch: Branch,
    pub specs: Vec<DependencySpec>,
}

/// The full set of toggles and groups of a descriptor
#[derive(Debug, Clone, Default)]
pub struct FeatureMatrix {
    toggles: Vec<FeatureToggle>,
    groups: Vec<ConditionalGroup>,
}

impl FeatureMatrix {
    /// Validate and build a matrix
    ///
    /// Toggle names must be unique and groups may only reference declared toggles.
    pub fn new(toggles: Vec<FeatureToggle>, groups: Vec<ConditionalGroup>) -> Result<Self> {
        let mut names = HashSet::new();
        for toggle in &toggles {
            if toggle.name.trim().is_empty() {
                return Err(Error::config("Feature toggle with an empty name"));
            }
            if !names.insert(toggle.name.as_str()) {
                return Err(Error::config(format!(
                    "Feature toggle '{}' is declared more than once",
                    toggle.name
                )));
            }
        }

        for group in &groups {
            if group.when_any.is_empty() {
                return Err(Error::config("Conditional group without any `when_any` toggle"));
            }
            if let Some(unknown) = group.when_any.iter().find(|n| !names.contains(n.as_str())) {
                return Err(Error::config(format!(
                    "Conditional group '{}' references unknown toggle '{}'",
                    group.label(),
                    unknown
                )));
            }
        }

        Ok(Self { toggles, groups })
    }

    pub fn toggles(&self) -> &[FeatureToggle] {
        &self.toggles
    }

    pub fn groups(&self) -> &[ConditionalGroup] {
        &self.groups
    }

    pub fn is_enabled(&self, name: &str) -> Option<bool> {
        self.toggles.iter().find(|t| t.name == name).map(|t| t.enabled)
    }

    /// Set toggles for this build only (e.g. from `--set name=true`)
    pub fn with_overrides(mut self, overrides: &BTreeMap<String, bool>) -> Result<Self> {
        for (name, value) in overrides {
            let toggle = self
                .toggles
                .iter_mut()
                .find(|t| &t.name == name)
                .ok_or_else(|| Error::config(format!("Unknown feature toggle '{}'", name)))?;
            debug!(toggle = %name, enabled = value, "override");
            toggle.enabled = *value;
        }
        Ok(self)
    }

    fn group_enabled(&self, group: &ConditionalGroup) -> bool {
        group
            .when_any
            .iter()
            .any(|name| self.is_enabled(name).unwrap_or(false))
    }

    /// Per toggle and group, which branch is active
    pub fn selections(&self) -> Vec<Selection> {
        let toggles = self.toggles.iter().map(|toggle| Selection {
            label: toggle.name.clone(),
            enabled: toggle.enabled,
            branch: toggle.branch(),
            specs: toggle.selected().to_vec(),
        });

        let groups = self.groups.iter().map(|group| {
            let enabled = self.group_enabled(group);
            let specs = if enabled {
                group.on_true.clone()
            } else {
                group.on_false.clone().unwrap_or_default()
            };
            Selection {
                label: group.label(),
                enabled,
                branch: branch_for(enabled, &group.on_true, group.on_false.as_deref()),
                specs,
            }
        });

        toggles.chain(groups).collect()
    }

    /// Dependencies contributed by the current toggle states
    ///
    /// Ordered by declaration; identical specs contributed twice appear once.
    pub fn active_dependencies(&self) -> Vec<DependencySpec> {
        let mut seen = HashSet::new();
        let mut active = Vec::new();
        for selection in self.selections() {
            if selection.branch == Branch::Nothing {
                debug!(toggle = %selection.label, enabled = selection.enabled, "contributes nothing");
            }
            for spec in selection.specs {
                if seen.insert(spec.clone()) {
                    active.push(spec);
                }
            }
        }
        active
    }
}
