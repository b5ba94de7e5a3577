//! Build descriptor handling for `modbuild.toml`
//!
//! The descriptor is parsed once per build. Its raw TOML tables map onto the
//! `*Decl` structs below; the accessor methods turn them into validated domain
//! types ([`RepositoryRegistry`], [`FeatureMatrix`], [`PublishTarget`],
//! [`InjectionRule`]), interpolating `${name}` variables from `[versions]`.
//!
//! # Examples
//!
//! ```no_run
//! use modbuild::Descriptor;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptor = Descriptor::load(".")?;
//! let registry = descriptor.registry()?;
//! println!("{} repositories", registry.len());
//! # Ok(())
//! # }
//! ```

use crate::features::{ConditionalGroup, FeatureMatrix, FeatureToggle};
use crate::inject::{substitute_tokens, ArtifactSelector, InjectionRule, SourceSelector, TokenValue};
use crate::publish::{validate_targets, Channel, MavenRepoTarget, PublishTarget};
use crate::{DependencySpec, Error, Repository, RepositoryRegistry, Result, Scope};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// The descriptor filename
pub const DESCRIPTOR_NAME: &str = "modbuild.toml";

/// Parsed `modbuild.toml`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Descriptor {
    #[serde(rename = "mod")]
    pub mod_info: ModInfo,

    /// Shared version variables, referenced as `${name}`
    #[serde(default)]
    pub versions: BTreeMap<String, String>,

    #[serde(default, rename = "repository")]
    pub repositories: Vec<RepositoryDecl>,

    /// Unconditional dependencies
    #[serde(default, rename = "dependency")]
    pub dependencies: Vec<DependencyDecl>,

    #[serde(default, rename = "toggle")]
    pub toggles: Vec<ToggleDecl>,

    #[serde(default, rename = "group")]
    pub groups: Vec<GroupDecl>,

    #[serde(default, rename = "publish")]
    pub publish: Vec<PublishDecl>,

    #[serde(default, rename = "inject")]
    pub inject: Vec<InjectDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModInfo {
    pub id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub version: String,
    pub group: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryDecl {
    pub id: String,
    pub url: String,
    /// `maven` (default) or `ivy`
    #[serde(skip_serializing_if = "Option::is_none")]
    pub layout: Option<String>,
    /// Artifact pattern, ivy layout only
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    /// Namespace prefixes served only by this repository
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exclusive: Option<Vec<String>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DependencyDecl {
    pub coordinate: String,
    pub scope: Scope,
    #[serde(default)]
    pub deobf: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub companion: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToggleDecl {
    pub name: String,
    pub enabled: bool,
    #[serde(default)]
    pub on_true: Vec<DependencyDecl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_false: Option<Vec<DependencyDecl>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupDecl {
    pub when_any: Vec<String>,
    #[serde(default)]
    pub on_true: Vec<DependencyDecl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_false: Option<Vec<DependencyDecl>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishDecl {
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    #[serde(default)]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repository: Option<MavenRepoTarget>,
}

/// One `[[inject]]` table; exactly one of `resolved`, `from`, `dir`, `expand`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct InjectDecl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved: Option<SelectorDecl>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub from: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rename: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expand: Option<String>,
    #[serde(default)]
    pub into: String,
    #[serde(default)]
    pub tokens: BTreeMap<String, TokenDecl>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectorDecl {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name_contains: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TokenDecl {
    Literal(String),
    VersionOf { version_of: String },
}

impl Descriptor {
    /// Load `modbuild.toml` from the given directory
    pub fn load<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let path = dir.as_ref().join(DESCRIPTOR_NAME);

        if !path.exists() {
            return Err(Error::config(format!(
                "{} not found in {}",
                DESCRIPTOR_NAME,
                dir.as_ref().display()
            )));
        }

        let content = fs::read_to_string(&path)?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self> {
        let descriptor: Descriptor = toml::from_str(content)?;
        if descriptor.mod_info.id.trim().is_empty() {
            return Err(Error::config("[mod] id must not be empty"));
        }
        Ok(descriptor)
    }

    pub fn exists<P: AsRef<Path>>(dir: P) -> bool {
        dir.as_ref().join(DESCRIPTOR_NAME).exists()
    }

    /// Build-wide token bindings: `[versions]` plus `mod_id`, `mod_name`,
    /// `mod_version` and `mod_group`
    pub fn bindings(&self) -> BTreeMap<String, String> {
        let mut bindings = self.versions.clone();
        bindings.insert("mod_id".to_string(), self.mod_info.id.clone());
        bindings.insert(
            "mod_name".to_string(),
            self.mod_info
                .name
                .clone()
                .unwrap_or_else(|| self.mod_info.id.clone()),
        );
        bindings.insert("mod_version".to_string(), self.mod_info.version.clone());
        bindings.insert("mod_group".to_string(), self.mod_info.group.clone());
        bindings
    }

    fn interpolate(&self, text: &str, location: &str) -> Result<String> {
        substitute_tokens(text, &self.versions, location)
    }

    /// Register every declared repository, in declaration order
    pub fn registry(&self) -> Result<RepositoryRegistry> {
        let mut registry = RepositoryRegistry::new();
        for decl in &self.repositories {
            let repo = match decl.layout.as_deref().unwrap_or("maven") {
                "maven" => {
                    if decl.pattern.is_some() {
                        return Err(Error::config(format!(
                            "Repository '{}': `pattern` requires layout = \"ivy\"",
                            decl.id
                        )));
                    }
                    Repository::maven(decl.id.clone(), &decl.url)?
                }
                "ivy" => {
                    let pattern = decl.pattern.as_deref().ok_or_else(|| {
                        Error::config(format!(
                            "Repository '{}': ivy layout requires a `pattern`",
                            decl.id
                        ))
                    })?;
                    Repository::ivy(decl.id.clone(), &decl.url, pattern)?
                }
                other => {
                    return Err(Error::config(format!(
                        "Repository '{}': unknown layout '{}' (expected maven or ivy)",
                        decl.id, other
                    )))
                }
            };
            let repo = match &decl.exclusive {
                Some(prefixes) => repo.exclusive(prefixes.iter().cloned()),
                None => repo,
            };
            registry.register(repo)?;
        }
        Ok(registry)
    }

    fn dependency(&self, decl: &DependencyDecl, location: &str) -> Result<DependencySpec> {
        let coordinate = self.interpolate(&decl.coordinate, location)?;
        let coordinate = coordinate
            .parse()
            .map_err(|e| Error::config(format!("{}: {}", location, e)))?;
        let mut spec = DependencySpec::new(coordinate, decl.scope);
        if decl.deobf {
            spec = spec.deobfuscated();
        }
        if let Some(companion) = &decl.companion {
            spec = spec.with_companion(companion.clone());
        }
        Ok(spec)
    }

    fn dependency_list(&self, decls: &[DependencyDecl], location: &str) -> Result<Vec<DependencySpec>> {
        decls
            .iter()
            .map(|decl| self.dependency(decl, location))
            .collect()
    }

    /// Unconditional dependencies
    pub fn base_dependencies(&self) -> Result<Vec<DependencySpec>> {
        self.dependency_list(&self.dependencies, "[[dependency]]")
    }

    pub fn feature_matrix(&self) -> Result<FeatureMatrix> {
        let mut toggles = Vec::with_capacity(self.toggles.len());
        for decl in &self.toggles {
            let location = format!("toggle '{}'", decl.name);
            let mut toggle = FeatureToggle::new(decl.name.clone(), decl.enabled)
                .on_true(self.dependency_list(&decl.on_true, &location)?);
            if let Some(on_false) = &decl.on_false {
                toggle = toggle.on_false(self.dependency_list(on_false, &location)?);
            }
            toggles.push(toggle);
        }

        let mut groups = Vec::with_capacity(self.groups.len());
        for decl in &self.groups {
            let location = format!("group '{}'", decl.when_any.join(" || "));
            let mut group = ConditionalGroup::new(decl.when_any.iter().cloned())
                .on_true(self.dependency_list(&decl.on_true, &location)?);
            if let Some(on_false) = &decl.on_false {
                group = group.on_false(self.dependency_list(on_false, &location)?);
            }
            groups.push(group);
        }

        FeatureMatrix::new(toggles, groups)
    }

    pub fn publish_targets(&self) -> Result<Vec<PublishTarget>> {
        let targets: Vec<PublishTarget> = self
            .publish
            .iter()
            .map(|decl| PublishTarget {
                channel: decl.channel,
                project_id: decl.project_id.clone(),
                required_companions: decl.required.iter().cloned().collect(),
                repository: decl.repository.clone(),
            })
            .collect();
        validate_targets(&targets)?;
        Ok(targets)
    }

    pub fn injection_rules(&self) -> Result<Vec<InjectionRule>> {
        self.inject
            .iter()
            .enumerate()
            .map(|(index, decl)| self.injection_rule(index, decl))
            .collect()
    }

    fn injection_rule(&self, index: usize, decl: &InjectDecl) -> Result<InjectionRule> {
        let location = format!("[[inject]] #{}", index + 1);
        let sources = [
            decl.resolved.is_some(),
            decl.from.is_some(),
            decl.dir.is_some(),
            decl.expand.is_some(),
        ];
        if sources.iter().filter(|set| **set).count() != 1 {
            return Err(Error::config(format!(
                "{}: set exactly one of `resolved`, `from`, `dir` or `expand`",
                location
            )));
        }
        if decl.rename.is_some() && decl.from.is_none() {
            return Err(Error::config(format!(
                "{}: `rename` only applies to `from`",
                location
            )));
        }

        let source = if let Some(selector) = &decl.resolved {
            let selector = match (&selector.name_contains, &selector.key) {
                (Some(text), None) => ArtifactSelector::NameContains(text.clone()),
                (None, Some(key)) => ArtifactSelector::Key(key.clone()),
                _ => {
                    return Err(Error::config(format!(
                        "{}: `resolved` needs exactly one of `name_contains` or `key`",
                        location
                    )))
                }
            };
            SourceSelector::Resolved(selector)
        } else if let Some(path) = &decl.from {
            SourceSelector::Path {
                path: path.clone(),
                rename: decl.rename.clone(),
            }
        } else if let Some(path) = &decl.dir {
            SourceSelector::Directory(path.clone())
        } else if let Some(glob) = &decl.expand {
            SourceSelector::Staged(glob.clone())
        } else {
            return Err(Error::config(format!("{}: no source set", location)));
        };

        let mut rule = InjectionRule::new(source).into_dir(decl.into.clone());
        for (name, token) in &decl.tokens {
            let value = match token {
                TokenDecl::Literal(text) => TokenValue::Literal(self.interpolate(text, &location)?),
                TokenDecl::VersionOf { version_of } => TokenValue::VersionOf(version_of.clone()),
            };
            rule = rule.with_token(name.clone(), value);
        }
        Ok(rule)
    }

    /// Validate every section without resolving anything
    pub fn validate(&self) -> Result<()> {
        self.registry()?;
        self.base_dependencies()?;
        self.feature_matrix()?;
        self.publish_targets()?;
        self.injection_rules()?;
        Ok(())
    }
}
