//! Repository registry with exclusivity filters
//!
//! Repositories are consulted in registration order. A repository may declare an
//! exclusivity filter: a set of namespace prefixes it is the *only* trusted source
//! for. Filters are a trust boundary, so two repositories may never claim
//! overlapping namespaces; [`RepositoryRegistry::register`] rejects the second one.
//!
//! # Examples
//!
//! ```
//! use modbuild::{Coordinate, Repository, RepositoryRegistry};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = RepositoryRegistry::new();
//! registry.register(Repository::maven("venmaven", "https://mvn.ventooth.com/releases")?
//!     .exclusive(["com.ventooth"]))?;
//! registry.register(Repository::maven("central", "https://repo1.maven.org/maven2")?)?;
//!
//! let api: Coordinate = "com.ventooth:venterceptor-service-api:2.0.0-rc4".parse()?;
//! assert_eq!(registry.route(&api)?.id, "venmaven");
//!
//! let joml: Coordinate = "org.joml:joml:1.10.8".parse()?;
//! assert_eq!(registry.route(&joml)?.id, "central");
//! # Ok(())
//! # }
//! ```

use crate::{Coordinate, Error, Result};
use std::collections::BTreeSet;
use tracing::debug;
use url::Url;

/// How artifact paths are laid out below a repository's base URL
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryLayout {
    /// `{group path}/{name}/{version}/{name}-{version}[-{classifier}].jar`
    Maven,
    /// Gradle/Ivy style pattern, e.g. `[orgPath]/[artifact]-[revision].[ext]`
    Ivy { pattern: String },
}

/// A source of artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Repository {
    pub id: String,
    pub location: Url,
    pub layout: RepositoryLayout,
    /// Namespace prefixes this repository exclusively serves; `None` is a catch-all
    pub exclusivity_filter: Option<BTreeSet<String>>,
}

impl Repository {
    pub fn new(id: impl Into<String>, location: &str, layout: RepositoryLayout) -> Result<Self> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(Error::config("Repository id must not be empty"));
        }

        // Url::join treats the last segment as a file unless it ends with '/'
        let mut base = location.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let location = Url::parse(&base).map_err(|e| {
            Error::config(format!("Repository '{}' has invalid url '{}': {}", id, location, e))
        })?;

        Ok(Self {
            id,
            location,
            layout,
            exclusivity_filter: None,
        })
    }

    pub fn maven(id: impl Into<String>, location: &str) -> Result<Self> {
        Self::new(id, location, RepositoryLayout::Maven)
    }

    pub fn ivy(id: impl Into<String>, location: &str, pattern: impl Into<String>) -> Result<Self> {
        Self::new(
            id,
            location,
            RepositoryLayout::Ivy {
                pattern: pattern.into(),
            },
        )
    }

    /// Restrict this repository to the given namespace prefixes
    pub fn exclusive<I, S>(mut self, prefixes: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.exclusivity_filter = Some(prefixes.into_iter().map(Into::into).collect());
        self
    }

    pub fn is_catch_all(&self) -> bool {
        self.exclusivity_filter.is_none()
    }

    /// Whether this repository's filter claims the namespace
    pub fn claims(&self, namespace: &str) -> bool {
        match &self.exclusivity_filter {
            Some(prefixes) => prefixes.iter().any(|p| prefix_matches(p, namespace)),
            None => false,
        }
    }

    /// Full location of an artifact inside this repository
    pub fn artifact_location(&self, coordinate: &Coordinate) -> Result<Url> {
        let relative = match &self.layout {
            RepositoryLayout::Maven => format!(
                "{}/{}/{}/{}",
                coordinate.namespace_path(),
                coordinate.name,
                coordinate.version,
                coordinate.file_name()
            ),
            RepositoryLayout::Ivy { pattern } => expand_ivy_pattern(pattern, coordinate),
        };

        Ok(self.location.join(&relative)?)
    }
}

/// Dotted-segment prefix match: `com.ventooth` matches `com.ventooth` and
/// `com.ventooth.lib`, but not `com.ventoothx`.
pub fn prefix_matches(prefix: &str, namespace: &str) -> bool {
    namespace == prefix
        || (namespace.starts_with(prefix) && namespace[prefix.len()..].starts_with('.'))
}

fn prefixes_overlap(a: &str, b: &str) -> bool {
    prefix_matches(a, b) || prefix_matches(b, a)
}

/// Expand an Ivy artifact pattern for a coordinate
///
/// Parenthesised groups are optional: they are dropped when any token inside
/// them has no value (e.g. `(-[classifier])` for unclassified artifacts).
pub fn expand_ivy_pattern(pattern: &str, coordinate: &Coordinate) -> String {
    let value_of = |token: &str| -> Option<String> {
        match token {
            "orgPath" => Some(coordinate.namespace_path()),
            "organisation" | "organization" => Some(coordinate.namespace.clone()),
            "module" | "artifact" => Some(coordinate.name.clone()),
            "revision" => Some(coordinate.version.clone()),
            "classifier" => coordinate.classifier.clone(),
            "ext" => Some("jar".to_string()),
            "type" => Some("jar".to_string()),
            _ => None,
        }
    };

    // Returns None when a token in the segment has no value
    let expand_segment = |segment: &str| -> Option<String> {
        let mut out = String::new();
        let mut rest = segment;
        while let Some(start) = rest.find('[') {
            out.push_str(&rest[..start]);
            let after = &rest[start + 1..];
            match after.find(']') {
                Some(end) => {
                    out.push_str(&value_of(&after[..end])?);
                    rest = &after[end + 1..];
                }
                None => {
                    out.push_str(&rest[start..]);
                    rest = "";
                }
            }
        }
        out.push_str(rest);
        Some(out)
    };

    let mut result = String::new();
    let mut rest = pattern;
    while let Some(open) = rest.find('(') {
        result.push_str(&expand_segment(&rest[..open]).unwrap_or_default());
        let after = &rest[open + 1..];
        match after.find(')') {
            Some(close) => {
                if let Some(expanded) = expand_segment(&after[..close]) {
                    result.push_str(&expanded);
                }
                rest = &after[close + 1..];
            }
            None => {
                rest = &rest[open..];
                break;
            }
        }
    }
    result.push_str(&expand_segment(rest).unwrap_or_default());
    result
}

/// Ordered set of repositories
#[derive(Debug, Clone, Default)]
pub struct RepositoryRegistry {
    repositories: Vec<Repository>,
}

impl RepositoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a repository, rejecting ambiguous exclusivity
    pub fn register(&mut self, repo: Repository) -> Result<()> {
        if self.repositories.iter().any(|r| r.id == repo.id) {
            return Err(Error::config(format!(
                "Repository '{}' is declared more than once",
                repo.id
            )));
        }

        if let Some(filter) = &repo.exclusivity_filter {
            if filter.is_empty() || filter.iter().any(|p| p.trim().is_empty()) {
                return Err(Error::config(format!(
                    "Repository '{}' declares an empty exclusivity filter; \
                     omit `exclusive` to make it a catch-all",
                    repo.id
                )));
            }

            for existing in &self.repositories {
                let Some(existing_filter) = &existing.exclusivity_filter else {
                    continue;
                };
                for new_prefix in filter {
                    if let Some(clash) = existing_filter
                        .iter()
                        .find(|p| prefixes_overlap(p, new_prefix))
                    {
                        return Err(Error::config(format!(
                            "Ambiguous repository routing: '{}' claims '{}' but '{}' already claims '{}'\n\n\
                             Each namespace may only be served by one exclusive repository.",
                            repo.id, new_prefix, existing.id, clash
                        )));
                    }
                }
            }
        }

        debug!(repository = %repo.id, location = %repo.location, "registered repository");
        self.repositories.push(repo);
        Ok(())
    }

    /// Pick the repository that serves a coordinate
    pub fn route(&self, coordinate: &Coordinate) -> Result<&Repository> {
        if let Some(repo) = self
            .repositories
            .iter()
            .find(|r| r.claims(&coordinate.namespace))
        {
            return Ok(repo);
        }

        self.repositories
            .iter()
            .find(|r| r.is_catch_all())
            .ok_or_else(|| Error::UnroutableCoordinate {
                coordinate: coordinate.to_string(),
            })
    }

    pub fn get(&self, id: &str) -> Option<&Repository> {
        self.repositories.iter().find(|r| r.id == id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Repository> {
        self.repositories.iter()
    }

    pub fn len(&self) -> usize {
        self.repositories.len()
    }

    pub fn is_empty(&self) -> bool {
        self.repositories.is_empty()
    }
}
