//! Resource staging and token substitution
//!
//! After resolution, [`InjectionRule`]s copy selected files into an in-memory
//! [`StagingTree`] and expand `${token}` markers in descriptor files. Rules apply
//! in declaration order and a later rule overwrites an earlier one at the same
//! destination. Nothing touches the disk until [`StagingTree::commit`].

use crate::{Error, ResolvedArtifact, Result};
use regex::Regex;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::OnceLock;
use tracing::debug;
use walkdir::WalkDir;

/// `${name}` markers; names may contain letters, digits, `_`, `-` and `.`
fn token_regex() -> &'static Regex {
    static TOKEN: OnceLock<Regex> = OnceLock::new();
    TOKEN.get_or_init(|| Regex::new(r"\$\{([A-Za-z0-9_.\-]+)\}").expect("token pattern is valid"))
}

/// Replace every `${token}` in `text` with its bound value
///
/// Fails with [`Error::UnresolvedToken`] on the first marker without a binding.
pub fn substitute_tokens(
    text: &str,
    bindings: &BTreeMap<String, String>,
    location: &str,
) -> Result<String> {
    let regex = token_regex();
    if let Some(missing) = regex
        .captures_iter(text)
        .map(|c| c[1].to_string())
        .find(|name| !bindings.contains_key(name))
    {
        return Err(Error::UnresolvedToken {
            token: missing,
            location: location.to_string(),
        });
    }

    Ok(regex
        .replace_all(text, |caps: &regex::Captures| bindings[&caps[1]].clone())
        .into_owned())
}

/// Value bound to a token
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TokenValue {
    Literal(String),
    /// Resolved version of the dependency with this `namespace:name` key
    VersionOf(String),
}

/// Picks resolved artifacts
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactSelector {
    /// File name contains the text
    NameContains(String),
    /// Coordinate key `namespace:name`
    Key(String),
}

impl ArtifactSelector {
    pub fn matches(&self, artifact: &ResolvedArtifact) -> bool {
        match self {
            ArtifactSelector::NameContains(text) => artifact.file_name().contains(text.as_str()),
            ArtifactSelector::Key(key) => &artifact.coordinate().key() == key,
        }
    }
}

/// What a rule takes its input from
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceSelector {
    /// Resolved dependency files
    Resolved(ArtifactSelector),
    /// A single project file, optionally renamed
    Path { path: PathBuf, rename: Option<String> },
    /// Every file below a project directory
    Directory(PathBuf),
    /// Already staged files matching a glob; their tokens are expanded in place
    Staged(String),
}

/// One resource injection declaration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InjectionRule {
    pub source: SourceSelector,
    /// Destination directory template inside the package (empty = root)
    pub destination: String,
    pub tokens: BTreeMap<String, TokenValue>,
}

impl InjectionRule {
    pub fn new(source: SourceSelector) -> Self {
        Self {
            source,
            destination: String::new(),
            tokens: BTreeMap::new(),
        }
    }

    pub fn into_dir(mut self, destination: impl Into<String>) -> Self {
        self.destination = destination.into();
        self
    }

    pub fn with_token(mut self, name: impl Into<String>, value: TokenValue) -> Self {
        self.tokens.insert(name.into(), value);
        self
    }

    fn describe(&self) -> String {
        match &self.source {
            SourceSelector::Resolved(ArtifactSelector::NameContains(t)) => {
                format!("inject rule for resolved '*{}*'", t)
            }
            SourceSelector::Resolved(ArtifactSelector::Key(k)) => {
                format!("inject rule for resolved '{}'", k)
            }
            SourceSelector::Path { path, .. } => format!("inject rule for '{}'", path.display()),
            SourceSelector::Directory(path) => format!("inject rule for '{}/'", path.display()),
            SourceSelector::Staged(glob) => format!("expand rule for '{}'", glob),
        }
    }
}

/// In-memory package tree keyed by `/`-separated relative paths
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StagingTree {
    files: BTreeMap<String, Vec<u8>>,
}

impl StagingTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace a file
    pub fn insert(&mut self, path: &str, content: Vec<u8>) -> Result<()> {
        let path = normalize_relative(path)?;
        if self.files.insert(path.clone(), content).is_some() {
            debug!(path = %path, "overwriting staged file");
        }
        Ok(())
    }

    pub fn get(&self, path: &str) -> Option<&[u8]> {
        self.files.get(path).map(Vec::as_slice)
    }

    pub fn get_str(&self, path: &str) -> Option<&str> {
        self.get(path).and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.files.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write the staged files below `dir`, returning how many were written
    pub fn commit<P: AsRef<Path>>(&self, dir: P) -> Result<usize> {
        let dir = dir.as_ref();
        for (path, content) in &self.files {
            let target = dir.join(path);
            if let Some(parent) = target.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(&target, content)?;
        }
        Ok(self.files.len())
    }
}

fn normalize_relative(path: &str) -> Result<String> {
    let mut parts = Vec::new();
    for component in Path::new(path).components() {
        match component {
            Component::Normal(part) => parts.push(part.to_string_lossy().to_string()),
            Component::CurDir => {}
            _ => {
                return Err(Error::config(format!(
                    "Staging path '{}' must be relative and stay inside the package",
                    path
                )))
            }
        }
    }
    if parts.is_empty() {
        return Err(Error::config("Empty staging path"));
    }
    Ok(parts.join("/"))
}

fn glob_regex(glob: &str) -> Result<Regex> {
    let mut pattern = String::from("^");
    let mut chars = glob.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            '*' if chars.peek() == Some(&'*') => {
                chars.next();
                // `**/` also matches zero directories
                if chars.peek() == Some(&'/') {
                    chars.next();
                    pattern.push_str("(?:.*/)?");
                } else {
                    pattern.push_str(".*");
                }
            }
            '*' => pattern.push_str("[^/]*"),
            '?' => pattern.push_str("[^/]"),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|e| Error::config(format!("Invalid pattern '{}': {}", glob, e)))
}

/// Applies injection rules for one build
pub struct Injector {
    root: PathBuf,
    bindings: BTreeMap<String, String>,
}

impl Injector {
    /// `root` anchors project-relative sources; `bindings` are build-wide tokens
    pub fn new(root: impl Into<PathBuf>, bindings: BTreeMap<String, String>) -> Self {
        Self {
            root: root.into(),
            bindings,
        }
    }

    fn rule_bindings(
        &self,
        rule: &InjectionRule,
        resolved: &[ResolvedArtifact],
    ) -> Result<BTreeMap<String, String>> {
        let mut bindings = self.bindings.clone();
        for (name, value) in &rule.tokens {
            let bound = match value {
                TokenValue::Literal(text) => text.clone(),
                TokenValue::VersionOf(key) => resolved
                    .iter()
                    .find(|a| &a.coordinate().key() == key)
                    .map(|a| a.version().to_string())
                    .ok_or_else(|| Error::UnresolvedToken {
                        token: name.clone(),
                        location: format!("{} (no resolved dependency '{}')", rule.describe(), key),
                    })?,
            };
            bindings.insert(name.clone(), bound);
        }
        Ok(bindings)
    }

    /// Apply `rules` in order to `staging`
    pub fn inject(
        &self,
        rules: &[InjectionRule],
        resolved: &[ResolvedArtifact],
        staging: &mut StagingTree,
    ) -> Result<()> {
        for rule in rules {
            let bindings = self.rule_bindings(rule, resolved)?;
            let destination = substitute_tokens(&rule.destination, &bindings, &rule.describe())?;
            let join = |name: &str| -> String {
                let dir = destination.trim_end_matches('/');
                if dir.is_empty() {
                    name.to_string()
                } else {
                    format!("{}/{}", dir, name)
                }
            };

            match &rule.source {
                SourceSelector::Resolved(selector) => {
                    let matched: Vec<&ResolvedArtifact> =
                        resolved.iter().filter(|a| selector.matches(a)).collect();
                    if matched.is_empty() {
                        return Err(Error::config(format!(
                            "{} matched no resolved dependency",
                            rule.describe()
                        )));
                    }
                    for artifact in matched {
                        let content = fs::read(&artifact.path)?;
                        staging.insert(&join(&artifact.coordinate().file_name()), content)?;
                    }
                }
                SourceSelector::Path { path, rename } => {
                    let source = self.root.join(path);
                    let name = match rename {
                        Some(name) => name.clone(),
                        None => source
                            .file_name()
                            .map(|n| n.to_string_lossy().to_string())
                            .ok_or_else(|| {
                                Error::config(format!("{} has no file name", rule.describe()))
                            })?,
                    };
                    staging.insert(&join(&name), fs::read(&source)?)?;
                }
                SourceSelector::Directory(path) => {
                    let source = self.root.join(path);
                    if !source.is_dir() {
                        return Err(Error::config(format!(
                            "{}: '{}' is not a directory",
                            rule.describe(),
                            source.display()
                        )));
                    }
                    for entry in WalkDir::new(&source).sort_by_file_name() {
                        let entry = entry.map_err(|e| Error::Other(e.to_string()))?;
                        if !entry.file_type().is_file() {
                            continue;
                        }
                        let relative = entry
                            .path()
                            .strip_prefix(&source)
                            .map_err(|e| Error::Other(e.to_string()))?;
                        let relative = relative
                            .components()
                            .map(|c| c.as_os_str().to_string_lossy())
                            .collect::<Vec<_>>()
                            .join("/");
                        staging.insert(&join(&relative), fs::read(entry.path())?)?;
                    }
                }
                SourceSelector::Staged(glob) => {
                    let pattern = glob_regex(glob)?;
                    let targets: Vec<String> = staging
                        .paths()
                        .filter(|p| pattern.is_match(p))
                        .map(String::from)
                        .collect();
                    if targets.is_empty() {
                        return Err(Error::config(format!(
                            "{} matched no staged file",
                            rule.describe()
                        )));
                    }
                    for path in targets {
                        let text = staging.get_str(&path).ok_or_else(|| {
                            Error::config(format!("Cannot expand tokens in binary file '{}'", path))
                        })?;
                        let expanded = substitute_tokens(text, &bindings, &path)?;
                        staging.insert(&path, expanded.into_bytes())?;
                    }
                }
            }
        }
        Ok(())
    }
}
