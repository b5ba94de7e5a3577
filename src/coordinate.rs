//! Artifact coordinates
//!
//! A [`Coordinate`] names exactly one fetchable artifact. Coordinates are written
//! in descriptors in one of four text forms:
//!
//! - `group:name:version[:classifier]` - a plain Maven coordinate
//! - `curse:slug-projectid:fileid` - a CurseForge file served through a curse maven
//! - `modrinth:slug:version` - a Modrinth version served through the Modrinth maven
//! - `ivy:group:name:version[:classifier]` - an artifact from an Ivy-layout repository
//!
//! # Examples
//!
//! ```
//! use modbuild::{Coordinate, SourceKind};
//!
//! let nei: Coordinate = "codechicken:notenoughitems-mc1.7.10:2.4.2-mega:dev".parse().unwrap();
//! assert_eq!(nei.namespace, "codechicken");
//! assert_eq!(nei.classifier.as_deref(), Some("dev"));
//!
//! let thaumcraft: Coordinate = "curse:thaumcraft-223628:2227552".parse().unwrap();
//! assert_eq!(thaumcraft.source_kind, SourceKind::CurseForgeId);
//! assert_eq!(thaumcraft.to_string(), "curse.maven:thaumcraft-223628:2227552");
//! ```

use crate::{Error, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Namespace used by curse maven mirrors
pub const CURSE_NAMESPACE: &str = "curse.maven";

/// Namespace used by the Modrinth maven
pub const MODRINTH_NAMESPACE: &str = "maven.modrinth";

/// Where a coordinate originally comes from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SourceKind {
    Direct,
    CurseForgeId,
    ModrinthId,
    Ivy,
}

/// Unique identifier of one resolvable artifact
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Coordinate {
    pub namespace: String,
    pub name: String,
    pub version: String,
    pub classifier: Option<String>,
    pub source_kind: SourceKind,
}

impl Coordinate {
    pub fn new(
        namespace: impl Into<String>,
        name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
            version: version.into(),
            classifier: None,
            source_kind: SourceKind::Direct,
        }
    }

    pub fn with_classifier(mut self, classifier: impl Into<String>) -> Self {
        self.classifier = Some(classifier.into());
        self
    }

    pub fn with_source_kind(mut self, kind: SourceKind) -> Self {
        self.source_kind = kind;
        self
    }

    /// `namespace:name`, the version-independent identity of a dependency
    pub fn key(&self) -> String {
        format!("{}:{}", self.namespace, self.name)
    }

    /// File name the artifact is conventionally stored under
    pub fn file_name(&self) -> String {
        match &self.classifier {
            Some(classifier) => format!("{}-{}-{}.jar", self.name, self.version, classifier),
            None => format!("{}-{}.jar", self.name, self.version),
        }
    }

    /// Namespace split on dots and joined with `/` (Maven `groupId` path)
    pub fn namespace_path(&self) -> String {
        self.namespace.replace('.', "/")
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.namespace, self.name, self.version)?;
        if let Some(classifier) = &self.classifier {
            write!(f, ":{}", classifier)?;
        }
        Ok(())
    }
}

impl FromStr for Coordinate {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let s = s.trim();
        let (prefix, rest) = match s.split_once(':') {
            Some((p @ ("curse" | "modrinth" | "ivy"), rest)) => (Some(p), rest),
            _ => (None, s),
        };

        let parts: Vec<&str> = rest.split(':').collect();
        if parts.iter().any(|p| p.trim().is_empty()) {
            return Err(Error::config(format!(
                "Invalid coordinate '{}': empty segment",
                s
            )));
        }

        match prefix {
            Some("curse") => match parts.as_slice() {
                [slug, file_id] => {
                    // slug is `name-projectid`; the project id must be numeric
                    let project_id = slug.rsplit('-').next().unwrap_or_default();
                    if project_id.is_empty() || !project_id.chars().all(|c| c.is_ascii_digit()) {
                        return Err(Error::config(format!(
                            "Invalid CurseForge coordinate '{}': expected curse:<slug>-<projectId>:<fileId>",
                            s
                        )));
                    }
                    Ok(Coordinate::new(CURSE_NAMESPACE, *slug, *file_id)
                        .with_source_kind(SourceKind::CurseForgeId))
                }
                _ => Err(Error::config(format!(
                    "Invalid CurseForge coordinate '{}': expected curse:<slug>-<projectId>:<fileId>",
                    s
                ))),
            },
            Some("modrinth") => match parts.as_slice() {
                [slug, version] => Ok(Coordinate::new(MODRINTH_NAMESPACE, *slug, *version)
                    .with_source_kind(SourceKind::ModrinthId)),
                _ => Err(Error::config(format!(
                    "Invalid Modrinth coordinate '{}': expected modrinth:<slug>:<version>",
                    s
                ))),
            },
            Some(_) => parse_maven(s, &parts).map(|c| c.with_source_kind(SourceKind::Ivy)),
            None => {
                let coordinate = parse_maven(s, &parts)?;
                let kind = match coordinate.namespace.as_str() {
                    CURSE_NAMESPACE => SourceKind::CurseForgeId,
                    MODRINTH_NAMESPACE => SourceKind::ModrinthId,
                    _ => SourceKind::Direct,
                };
                Ok(coordinate.with_source_kind(kind))
            }
        }
    }
}

fn parse_maven(original: &str, parts: &[&str]) -> Result<Coordinate> {
    match parts {
        [group, name, version] => Ok(Coordinate::new(*group, *name, *version)),
        [group, name, version, classifier] => {
            Ok(Coordinate::new(*group, *name, *version).with_classifier(*classifier))
        }
        _ => Err(Error::config(format!(
            "Invalid coordinate '{}': expected <group>:<name>:<version>[:<classifier>]",
            original
        ))),
    }
}

// Coordinates travel through descriptors and lockfiles as their canonical string.
impl Serialize for Coordinate {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        let text = match self.source_kind {
            SourceKind::Ivy => format!("ivy:{}", self),
            _ => self.to_string(),
        };
        serializer.serialize_str(&text)
    }
}

impl<'de> Deserialize<'de> for Coordinate {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let text = String::deserialize(deserializer)?;
        text.parse().map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_plain_coordinate() {
        let c: Coordinate = "com.falsepattern:falsepatternlib-mc1.7.10:1.9.0"
            .parse()
            .unwrap();
        assert_eq!(c.namespace, "com.falsepattern");
        assert_eq!(c.name, "falsepatternlib-mc1.7.10");
        assert_eq!(c.version, "1.9.0");
        assert_eq!(c.classifier, None);
        assert_eq!(c.source_kind, SourceKind::Direct);
    }

    #[test]
    fn test_parse_classifier() {
        let c: Coordinate = "com.github.GTNewHorizons:OpenComputers:1.11.16-GTNH:dev"
            .parse()
            .unwrap();
        assert_eq!(c.classifier.as_deref(), Some("dev"));
        assert_eq!(c.file_name(), "OpenComputers-1.11.16-GTNH-dev.jar");
    }

    #[test]
    fn test_curse_maven_namespace_is_curseforge() {
        let c: Coordinate = "curse.maven:openmodslib-228815:2386729".parse().unwrap();
        assert_eq!(c.source_kind, SourceKind::CurseForgeId);
    }

    #[test]
    fn test_curse_shorthand() {
        let c: Coordinate = "curse:biomes-o-plenty-220318:2499612".parse().unwrap();
        assert_eq!(c.namespace, CURSE_NAMESPACE);
        assert_eq!(c.name, "biomes-o-plenty-220318");
        assert_eq!(c.version, "2499612");
        assert_eq!(c.source_kind, SourceKind::CurseForgeId);
    }

    #[test]
    fn test_curse_shorthand_requires_project_id() {
        let result: Result<Coordinate> = "curse:biomes-o-plenty:2499612".parse();
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_modrinth_shorthand() {
        let c: Coordinate = "modrinth:ntmspace:X5412_H261".parse().unwrap();
        assert_eq!(c.namespace, MODRINTH_NAMESPACE);
        assert_eq!(c.version, "X5412_H261");
        assert_eq!(c.source_kind, SourceKind::ModrinthId);
    }

    #[test]
    fn test_ivy_prefix() {
        let c: Coordinate = "ivy:jss2a98aj.NotFine:notfine:0.2.7:dev".parse().unwrap();
        assert_eq!(c.source_kind, SourceKind::Ivy);
        assert_eq!(c.namespace, "jss2a98aj.NotFine");
        assert_eq!(c.classifier.as_deref(), Some("dev"));
    }

    #[test]
    fn test_rejects_malformed() {
        for bad in ["", "a:b", "a::c", "a:b:c:d:e", "modrinth:only"] {
            let result: Result<Coordinate> = bad.parse();
            assert!(result.is_err(), "expected '{}' to be rejected", bad);
        }
    }

    #[test]
    fn test_key_ignores_version() {
        let a: Coordinate = "org.joml:joml:1.10.8".parse().unwrap();
        let b: Coordinate = "org.joml:joml:1.10.5".parse().unwrap();
        assert_eq!(a.key(), b.key());
        assert_ne!(a, b);
    }

    #[test]
    fn test_serde_uses_canonical_text() {
        #[derive(Serialize, Deserialize)]
        struct Wrapper {
            c: Coordinate,
        }

        let original: Coordinate = "ivy:mirror.micdoodle:GalacticraftCore:1.7-3.0.12.504"
            .parse()
            .unwrap();
        let text = toml::to_string(&Wrapper { c: original.clone() }).unwrap();
        assert!(text.contains("ivy:mirror.micdoodle:GalacticraftCore:1.7-3.0.12.504"));

        let back: Wrapper = toml::from_str(&text).unwrap();
        assert_eq!(back.c, original);
    }
}
