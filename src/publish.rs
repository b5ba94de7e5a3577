//! Publish planning
//!
//! Computes, per publish channel, the manifest an external uploader needs: the
//! channel's project id, the primary build output and the companion projects
//! the upload must declare. Planning never performs I/O; writing or uploading
//! the manifests is left to the caller.

use crate::{Error, ResolvedArtifact, Result, Scope};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// External distribution channel
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Maven,
    CurseForge,
    Modrinth,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Channel::Maven => "maven",
            Channel::CurseForge => "curseforge",
            Channel::Modrinth => "modrinth",
        }
    }

    /// Mod-hosting sites identify the upload by project id
    pub fn requires_project_id(self) -> bool {
        matches!(self, Channel::CurseForge | Channel::Modrinth)
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "maven" => Ok(Channel::Maven),
            "curseforge" => Ok(Channel::CurseForge),
            "modrinth" => Ok(Channel::Modrinth),
            other => Err(Error::config(format!(
                "Unknown publish channel '{}' (expected maven, curseforge or modrinth)",
                other
            ))),
        }
    }
}

/// Maven repository a publication is uploaded to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MavenRepoTarget {
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishTarget {
    pub channel: Channel,
    pub project_id: Option<String>,
    /// Companion project ids the upload must declare
    pub required_companions: BTreeSet<String>,
    pub repository: Option<MavenRepoTarget>,
}

impl PublishTarget {
    pub fn new(channel: Channel) -> Self {
        Self {
            channel,
            project_id: None,
            required_companions: BTreeSet::new(),
            repository: None,
        }
    }

    pub fn with_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.project_id = Some(project_id.into());
        self
    }

    pub fn require(mut self, companion: impl Into<String>) -> Self {
        self.required_companions.insert(companion.into());
        self
    }

    pub fn with_repository(mut self, name: impl Into<String>, url: impl Into<String>) -> Self {
        self.repository = Some(MavenRepoTarget {
            name: name.into(),
            url: url.into(),
        });
        self
    }
}

/// Check a list of targets for duplicate channels and missing project ids
pub fn validate_targets(targets: &[PublishTarget]) -> Result<()> {
    let mut seen = BTreeSet::new();
    for target in targets {
        if !seen.insert(target.channel) {
            return Err(Error::config(format!(
                "Publish channel '{}' is declared more than once",
                target.channel
            )));
        }
        if target.channel.requires_project_id()
            && target.project_id.as_deref().map_or(true, str::is_empty)
        {
            return Err(Error::config(format!(
                "Publish channel '{}' requires a project_id",
                target.channel
            )));
        }
        if target.repository.is_some() && target.channel != Channel::Maven {
            return Err(Error::config(format!(
                "Only the maven channel takes a repository (found on '{}')",
                target.channel
            )));
        }
    }
    Ok(())
}

/// The build output being published
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrimaryArtifact {
    pub group: String,
    pub artifact_id: String,
    pub version: String,
    pub path: PathBuf,
}

/// A companion project and the resolved artifacts that provide it
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompanionEntry {
    pub id: String,
    pub provided_by: Vec<String>,
}

/// Everything an uploader needs for one channel
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublishManifest {
    pub channel: Channel,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub primary: PrimaryArtifact,
    pub companions: Vec<CompanionEntry>,
    /// Coordinates declared as dependencies of the Maven publication
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub dependencies: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub repository: Option<MavenRepoTarget>,
}

impl PublishManifest {
    /// File name used when the manifest is written out
    pub fn file_name(&self) -> String {
        format!("{}.json", self.channel)
    }
}

/// Compute the manifest of every target
///
/// Fails with [`Error::MissingCompanion`] when a required companion is not
/// advertised by any publishable resolved artifact.
pub fn plan(
    resolved: &[ResolvedArtifact],
    targets: &[PublishTarget],
    primary: &PrimaryArtifact,
) -> Result<BTreeMap<Channel, PublishManifest>> {
    validate_targets(targets)?;

    // companion id -> providing coordinates
    let mut providers: BTreeMap<&str, BTreeSet<String>> = BTreeMap::new();
    for artifact in resolved {
        if !artifact.spec.scope.is_publishable() {
            continue;
        }
        if let Some(companion) = artifact.spec.companion.as_deref() {
            providers
                .entry(companion)
                .or_default()
                .insert(artifact.coordinate().to_string());
        }
    }

    let mut manifests = BTreeMap::new();
    for target in targets {
        let mut companions = Vec::with_capacity(target.required_companions.len());
        for id in &target.required_companions {
            let provided_by = providers.get(id.as_str()).ok_or_else(|| Error::MissingCompanion {
                channel: target.channel.to_string(),
                companion: id.clone(),
            })?;
            companions.push(CompanionEntry {
                id: id.clone(),
                provided_by: provided_by.iter().cloned().collect(),
            });
        }

        let dependencies = if target.channel == Channel::Maven {
            let mut seen = BTreeSet::new();
            resolved
                .iter()
                .filter(|a| a.spec.scope == Scope::ApiSplit)
                .map(|a| a.coordinate().to_string())
                .filter(|c| seen.insert(c.clone()))
                .collect()
        } else {
            Vec::new()
        };

        manifests.insert(
            target.channel,
            PublishManifest {
                channel: target.channel,
                project_id: target.project_id.clone(),
                primary: primary.clone(),
                companions,
                dependencies,
                repository: target.repository.clone(),
            },
        );
    }

    Ok(manifests)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DependencySpec;

    fn artifact(coordinate: &str, scope: Scope, companion: Option<&str>) -> ResolvedArtifact {
        let mut spec = DependencySpec::new(coordinate.parse().unwrap(), scope);
        if let Some(companion) = companion {
            spec = spec.with_companion(companion);
        }
        ResolvedArtifact {
            spec,
            repository: "mega".to_string(),
            path: PathBuf::from("/cache/a.jar"),
            checksum: "abc".to_string(),
        }
    }

    fn primary() -> PrimaryArtifact {
        PrimaryArtifact {
            group: "com.ventooth".to_string(),
            artifact_id: "swansong".to_string(),
            version: "1.0.0".to_string(),
            path: PathBuf::from("build/libs/swansong-1.0.0.jar"),
        }
    }

    #[test]
    fn test_missing_companion_fails() {
        let resolved = vec![artifact("org.joml:joml:1.10.8", Scope::CompileOnly, None)];
        let targets = vec![PublishTarget::new(Channel::CurseForge)
            .with_project_id("1349982")
            .require("fplib")];

        let err = plan(&resolved, &targets, &primary()).unwrap_err();
        match err {
            Error::MissingCompanion { channel, companion } => {
                assert_eq!(channel, "curseforge");
                assert_eq!(companion, "fplib");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_companion_matched_by_publishable_artifact() {
        let resolved = vec![artifact(
            "com.falsepattern:falsepatternlib-mc1.7.10:1.9.0:dev",
            Scope::ApiSplit,
            Some("fplib"),
        )];
        let targets = vec![
            PublishTarget::new(Channel::CurseForge)
                .with_project_id("1349982")
                .require("fplib"),
            PublishTarget::new(Channel::Modrinth)
                .with_project_id("swansong")
                .require("fplib"),
        ];

        let manifests = plan(&resolved, &targets, &primary()).unwrap();
        assert_eq!(manifests.len(), 2);

        let curse = &manifests[&Channel::CurseForge];
        assert_eq!(curse.project_id.as_deref(), Some("1349982"));
        assert_eq!(curse.companions.len(), 1);
        assert_eq!(
            curse.companions[0].provided_by,
            vec!["com.falsepattern:falsepatternlib-mc1.7.10:1.9.0:dev".to_string()]
        );
        assert!(curse.dependencies.is_empty());
    }

    #[test]
    fn test_non_publishable_scope_cannot_satisfy_companion() {
        let resolved = vec![artifact(
            "com.falsepattern:falsepatternlib-mc1.7.10:1.9.0:dev",
            Scope::DevOnlyNonPublishable,
            Some("fplib"),
        )];
        let targets = vec![PublishTarget::new(Channel::Modrinth)
            .with_project_id("swansong")
            .require("fplib")];

        assert!(matches!(
            plan(&resolved, &targets, &primary()),
            Err(Error::MissingCompanion { .. })
        ));
    }

    #[test]
    fn test_maven_manifest_lists_api_dependencies() {
        let resolved = vec![
            artifact("com.falsepattern:falsepatternlib-mc1.7.10:1.9.0:dev", Scope::ApiSplit, None),
            artifact("org.joml:joml:1.10.8", Scope::CompileOnly, None),
        ];
        let targets = vec![PublishTarget::new(Channel::Maven)
            .with_repository("mavenpattern", "https://mvn.falsepattern.com/releases/")];

        let manifests = plan(&resolved, &targets, &primary()).unwrap();
        let maven = &manifests[&Channel::Maven];
        assert_eq!(
            maven.dependencies,
            vec!["com.falsepattern:falsepatternlib-mc1.7.10:1.9.0:dev".to_string()]
        );
        assert_eq!(maven.repository.as_ref().unwrap().name, "mavenpattern");
        assert_eq!(maven.file_name(), "maven.json");
    }

    #[test]
    fn test_maven_dependencies_listed_once() {
        let resolved = vec![
            artifact("com.falsepattern:falsepatternlib-mc1.7.10:1.9.0:dev", Scope::ApiSplit, None),
            artifact("org.joml:joml:1.10.8", Scope::ApiSplit, None),
            artifact("com.falsepattern:falsepatternlib-mc1.7.10:1.9.0:dev", Scope::ApiSplit, None),
        ];
        let targets = vec![PublishTarget::new(Channel::Maven)];

        let manifests = plan(&resolved, &targets, &primary()).unwrap();
        assert_eq!(
            manifests[&Channel::Maven].dependencies,
            vec![
                "com.falsepattern:falsepatternlib-mc1.7.10:1.9.0:dev".to_string(),
                "org.joml:joml:1.10.8".to_string(),
            ]
        );
    }

    #[test]
    fn test_validate_targets() {
        let duplicate = vec![
            PublishTarget::new(Channel::Modrinth).with_project_id("a"),
            PublishTarget::new(Channel::Modrinth).with_project_id("b"),
        ];
        assert!(matches!(validate_targets(&duplicate), Err(Error::Config(_))));

        let no_project = vec![PublishTarget::new(Channel::CurseForge)];
        assert!(matches!(validate_targets(&no_project), Err(Error::Config(_))));

        let maven_only = vec![PublishTarget::new(Channel::Maven)];
        assert!(validate_targets(&maven_only).is_ok());
    }

    #[test]
    fn test_manifest_json_shape() {
        let targets = vec![PublishTarget::new(Channel::CurseForge).with_project_id("1349982")];
        let manifests = plan(&[], &targets, &primary()).unwrap();
        let json = serde_json::to_value(&manifests[&Channel::CurseForge]).unwrap();

        assert_eq!(json["channel"], "curseforge");
        assert_eq!(json["project_id"], "1349982");
        assert_eq!(json["primary"]["artifact_id"], "swansong");
        assert!(json.get("repository").is_none());
    }

    #[test]
    fn test_channel_from_str() {
        assert_eq!("CurseForge".parse::<Channel>().unwrap(), Channel::CurseForge);
        assert!("hangar".parse::<Channel>().is_err());
    }
}
