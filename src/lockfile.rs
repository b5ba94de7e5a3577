//! Lockfile generation and parsing for reproducible builds
//!
//! `modbuild.lock` records, for every resolved dependency, the repository that
//! served it and the SHA256 of the file the build used. A later build loads the
//! lockfile and hands its entries to the [`Resolver`](crate::Resolver) as pins:
//! a dependency served from a different repository, or with different bytes,
//! fails the build instead of silently changing the output.
//!
//! Lockfiles use TOML format and should be committed to version control.
//!
//! # Examples
//!
//! ```no_run
//! use modbuild::Lockfile;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! if let Some(lockfile) = Lockfile::load()? {
//!     println!("{} pinned artifacts", lockfile.artifact_count());
//! }
//! # Ok(())
//! # }
//! ```

use crate::{Error, ResolvedArtifact, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

/// The lockfile filename
pub const LOCKFILE_NAME: &str = "modbuild.lock";

/// Represents the entire lockfile structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Lockfile {
    #[serde(rename = "metadata")]
    pub metadata: LockfileMetadata,

    /// Lock key (`coordinate` or `coordinate+deobf`) to pinned artifact
    #[serde(rename = "artifact", default)]
    pub artifacts: BTreeMap<String, LockedArtifact>,
}

/// Metadata about the lockfile generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockfileMetadata {
    /// Version of modbuild that generated this lockfile
    pub modbuild_version: String,

    /// Timestamp when the lockfile was generated (RFC 3339)
    pub generated_at: String,
}

/// A pinned artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LockedArtifact {
    /// Id of the repository that served the artifact
    pub repository: String,

    /// SHA256 of the file used by the build (after remapping, if any)
    pub checksum: String,
}

impl Lockfile {
    pub fn new() -> Self {
        Self {
            metadata: LockfileMetadata {
                modbuild_version: env!("CARGO_PKG_VERSION").to_string(),
                generated_at: chrono::Utc::now().to_rfc3339(),
            },
            artifacts: BTreeMap::new(),
        }
    }

    /// Build a lockfile pinning every artifact of a resolution
    pub fn from_resolved(resolved: &[ResolvedArtifact]) -> Self {
        let mut lockfile = Self::new();
        for artifact in resolved {
            lockfile.pin(artifact);
        }
        lockfile
    }

    /// Load lockfile from the current directory
    pub fn load() -> Result<Option<Self>> {
        Self::load_from(LOCKFILE_NAME)
    }

    /// Load lockfile from a specific path
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Option<Self>> {
        let path = path.as_ref();

        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)?;
        let lockfile: Lockfile = toml::from_str(&contents)
            .map_err(|e| Error::Other(format!("Failed to parse lockfile: {}", e)))?;

        Ok(Some(lockfile))
    }

    /// Save lockfile to the current directory
    pub fn save(&self) -> Result<()> {
        self.save_to(LOCKFILE_NAME)
    }

    /// Save lockfile to a specific path
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let toml_string = toml::to_string_pretty(self)
            .map_err(|e| Error::Other(format!("Failed to serialize lockfile: {}", e)))?;

        fs::write(path.as_ref(), toml_string)?;
        Ok(())
    }

    /// Add or update the pin for a resolved artifact
    pub fn pin(&mut self, artifact: &ResolvedArtifact) {
        self.artifacts.insert(
            artifact.spec.lock_key(),
            LockedArtifact {
                repository: artifact.repository.clone(),
                checksum: artifact.checksum.clone(),
            },
        );
        self.metadata.generated_at = chrono::Utc::now().to_rfc3339();
    }

    pub fn get_artifact(&self, lock_key: &str) -> Option<&LockedArtifact> {
        self.artifacts.get(lock_key)
    }

    pub fn artifact_count(&self) -> usize {
        self.artifacts.len()
    }

    /// Whether this lockfile pins exactly the given resolution
    ///
    /// Specs sharing a lock key (one coordinate in several scopes) count once.
    pub fn matches(&self, resolved: &[ResolvedArtifact]) -> bool {
        let pins: BTreeMap<String, LockedArtifact> = resolved
            .iter()
            .map(|a| {
                (
                    a.spec.lock_key(),
                    LockedArtifact {
                        repository: a.repository.clone(),
                        checksum: a.checksum.clone(),
                    },
                )
            })
            .collect();
        pins == self.artifacts
    }
}

impl Default for Lockfile {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{DependencySpec, Scope};
    use std::path::PathBuf;
    use tempfile::TempDir;

    fn artifact(coordinate: &str, deobf: bool) -> ResolvedArtifact {
        let mut spec = DependencySpec::new(coordinate.parse().unwrap(), Scope::CompileOnly);
        if deobf {
            spec = spec.deobfuscated();
        }
        ResolvedArtifact {
            spec,
            repository: "cursemaven".to_string(),
            path: PathBuf::from("/cache/x.jar"),
            checksum: "abc123".to_string(),
        }
    }

    #[test]
    fn test_lockfile_new() {
        let lockfile = Lockfile::new();
        assert_eq!(lockfile.artifact_count(), 0);
        assert_eq!(lockfile.metadata.modbuild_version, env!("CARGO_PKG_VERSION"));
    }

    #[test]
    fn test_from_resolved_uses_lock_keys() {
        let resolved = vec![
            artifact("curse:thaumcraft-223628:2227552", true),
            artifact("org.joml:joml:1.10.8", false),
        ];
        let lockfile = Lockfile::from_resolved(&resolved);

        assert_eq!(lockfile.artifact_count(), 2);
        let pinned = lockfile
            .get_artifact("curse:thaumcraft-223628:2227552+deobf")
            .unwrap();
        assert_eq!(pinned.repository, "cursemaven");
        assert!(lockfile.matches(&resolved));
        assert!(!lockfile.matches(&resolved[..1]));
    }

    #[test]
    fn test_same_coordinate_in_two_scopes_matches_its_own_lockfile() {
        let compile = artifact("org.joml:joml:1.10.8", false);
        let mut dev = compile.clone();
        dev.spec.scope = Scope::DevOnlyNonPublishable;
        let resolved = vec![compile, dev];

        let lockfile = Lockfile::from_resolved(&resolved);
        assert_eq!(lockfile.artifact_count(), 1);
        assert!(lockfile.matches(&resolved));

        let mut changed = resolved.clone();
        changed[1].checksum = "def456".to_string();
        assert!(!lockfile.matches(&changed));
    }

    #[test]
    fn test_lockfile_save_and_load() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCKFILE_NAME);

        let lockfile = Lockfile::from_resolved(&[artifact("org.joml:joml:1.10.8", false)]);
        lockfile.save_to(&path).unwrap();

        let contents = fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[artifact.\"org.joml:joml:1.10.8\"]"));

        let loaded = Lockfile::load_from(&path).unwrap().unwrap();
        assert_eq!(loaded.artifacts, lockfile.artifacts);
    }

    #[test]
    fn test_load_missing_lockfile() {
        let temp = TempDir::new().unwrap();
        assert!(Lockfile::load_from(temp.path().join("nope.lock"))
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_load_corrupt_lockfile() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join(LOCKFILE_NAME);
        fs::write(&path, "not = [valid").unwrap();
        assert!(Lockfile::load_from(&path).is_err());
    }
}
