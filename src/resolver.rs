//! Dependency resolution
//!
//! Given a [`DependencySpec`], the [`Resolver`] routes its coordinate through the
//! [`RepositoryRegistry`], asks the [`ArtifactFetcher`] for the file and, for specs
//! marked [`Transform::Deobfuscate`], passes it through the [`ArtifactTransformer`].
//!
//! Scopes do not change how an artifact is resolved. They only tell later stages
//! (staging, publishing) how a resolved artifact may be used.
//!
//! # Examples
//!
//! ```no_run
//! use modbuild::{DependencySpec, Repository, RepositoryRegistry, Resolver, Scope};
//! use modbuild::fetch::RepositoryFetcher;
//! use modbuild::transform::DisabledTransformer;
//! use std::time::Duration;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut registry = RepositoryRegistry::new();
//! registry.register(Repository::maven("central", "https://repo1.maven.org/maven2")?)?;
//!
//! let fetcher = RepositoryFetcher::new("/tmp/modbuild-cache".into(), Duration::from_secs(30))?;
//! let resolver = Resolver::new(registry, Box::new(fetcher), Box::new(DisabledTransformer));
//!
//! let spec = DependencySpec::new("org.joml:joml:1.10.8".parse()?, Scope::CompileOnly);
//! let artifact = resolver.resolve(&spec)?;
//! println!("{} -> {}", artifact.coordinate(), artifact.path.display());
//! # Ok(())
//! # }
//! ```

use crate::build::CancelToken;
use crate::fetch::{sha256_file, ArtifactFetcher};
use crate::lockfile::LockedArtifact;
use crate::transform::ArtifactTransformer;
use crate::{Coordinate, Error, Repository, RepositoryRegistry, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread;
use tracing::{debug, info};

/// Build phases a dependency participates in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Scope {
    /// Compile classpath only, never shipped
    CompileOnly,
    /// Development runtime only, never compiled against or published
    RuntimeOnlyNonPublishable,
    /// Compile classpath and development runtime, never published
    DevOnlyNonPublishable,
    /// Part of the published API: compiled, run and declared to consumers
    ApiSplit,
    /// Test fixtures pulled in only when a feature toggle asks for them
    TestFixtureConditional,
}

impl Scope {
    pub fn on_compile_classpath(self) -> bool {
        !matches!(self, Scope::RuntimeOnlyNonPublishable)
    }

    pub fn on_dev_runtime(self) -> bool {
        !matches!(self, Scope::CompileOnly)
    }

    /// Declared to consumers of the published artifact
    pub fn is_published(self) -> bool {
        matches!(self, Scope::ApiSplit)
    }

    /// May be referenced by publish metadata at all
    pub fn is_publishable(self) -> bool {
        !matches!(
            self,
            Scope::RuntimeOnlyNonPublishable | Scope::DevOnlyNonPublishable
        )
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Scope::CompileOnly => "compile-only",
            Scope::RuntimeOnlyNonPublishable => "runtime-only-non-publishable",
            Scope::DevOnlyNonPublishable => "dev-only-non-publishable",
            Scope::ApiSplit => "api-split",
            Scope::TestFixtureConditional => "test-fixture-conditional",
        }
    }
}

impl fmt::Display for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Scope {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "compile-only" => Ok(Scope::CompileOnly),
            "runtime-only-non-publishable" => Ok(Scope::RuntimeOnlyNonPublishable),
            "dev-only-non-publishable" => Ok(Scope::DevOnlyNonPublishable),
            "api-split" => Ok(Scope::ApiSplit),
            "test-fixture-conditional" => Ok(Scope::TestFixtureConditional),
            other => Err(Error::config(format!("Unknown scope '{}'", other))),
        }
    }
}

/// Post-fetch processing an artifact needs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Transform {
    #[default]
    None,
    Deobfuscate,
}

/// A declared dependency: what to fetch and how it is used
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DependencySpec {
    pub coordinate: Coordinate,
    pub scope: Scope,
    pub transform: Transform,
    /// Publish-channel project slug this artifact provides (e.g. `fplib`)
    pub companion: Option<String>,
}

impl DependencySpec {
    pub fn new(coordinate: Coordinate, scope: Scope) -> Self {
        Self {
            coordinate,
            scope,
            transform: Transform::None,
            companion: None,
        }
    }

    pub fn deobfuscated(mut self) -> Self {
        self.transform = Transform::Deobfuscate;
        self
    }

    pub fn with_companion(mut self, companion: impl Into<String>) -> Self {
        self.companion = Some(companion.into());
        self
    }

    /// Key under which the lockfile pins this spec
    pub fn lock_key(&self) -> String {
        match self.transform {
            Transform::None => self.coordinate.to_string(),
            Transform::Deobfuscate => format!("{}+deobf", self.coordinate),
        }
    }
}

/// A dependency after fetch (and transform)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedArtifact {
    pub spec: DependencySpec,
    /// Id of the repository that served it
    pub repository: String,
    pub path: PathBuf,
    /// SHA256 of the file at `path`
    pub checksum: String,
}

impl ResolvedArtifact {
    pub fn coordinate(&self) -> &Coordinate {
        &self.spec.coordinate
    }

    pub fn version(&self) -> &str {
        &self.spec.coordinate.version
    }

    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| self.spec.coordinate.file_name())
    }
}

#[derive(Debug, Clone)]
struct ResolvedFile {
    repository: String,
    path: PathBuf,
    checksum: String,
}

/// Resolution engine for one build
///
/// Owns the coordinate-to-file mapping for the lifetime of the build, so the
/// same coordinate always yields the same file within one build.
pub struct Resolver {
    registry: RepositoryRegistry,
    fetcher: Box<dyn ArtifactFetcher>,
    transformer: Box<dyn ArtifactTransformer>,
    pins: BTreeMap<String, LockedArtifact>,
    cancel: CancelToken,
    jobs: usize,
    resolved: Mutex<HashMap<(Coordinate, Transform), ResolvedFile>>,
}

impl Resolver {
    pub fn new(
        registry: RepositoryRegistry,
        fetcher: Box<dyn ArtifactFetcher>,
        transformer: Box<dyn ArtifactTransformer>,
    ) -> Self {
        Self {
            registry,
            fetcher,
            transformer,
            pins: BTreeMap::new(),
            cancel: CancelToken::new(),
            jobs: 1,
            resolved: Mutex::new(HashMap::new()),
        }
    }

    /// Verify every resolved artifact against these lockfile entries
    pub fn with_pins(mut self, pins: BTreeMap<String, LockedArtifact>) -> Self {
        self.pins = pins;
        self
    }

    pub fn with_cancel_token(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Number of worker threads used by [`Resolver::resolve_all`]
    pub fn with_jobs(mut self, jobs: usize) -> Self {
        self.jobs = jobs.max(1);
        self
    }

    pub fn registry(&self) -> &RepositoryRegistry {
        &self.registry
    }

    /// Resolve a single dependency
    pub fn resolve(&self, spec: &DependencySpec) -> Result<ResolvedArtifact> {
        let repository = self.registry.route(&spec.coordinate)?;
        self.resolve_routed(spec, repository)
    }

    /// Resolve a set of dependencies
    ///
    /// Every coordinate is routed before anything is fetched, so a routing
    /// error aborts the build without network access. Results keep the order
    /// of `specs`.
    pub fn resolve_all(&self, specs: &[DependencySpec]) -> Result<Vec<ResolvedArtifact>> {
        let routes = specs
            .iter()
            .map(|spec| self.registry.route(&spec.coordinate))
            .collect::<Result<Vec<_>>>()?;

        if self.jobs <= 1 || specs.len() <= 1 {
            return specs
                .iter()
                .zip(routes)
                .map(|(spec, repository)| self.resolve_routed(spec, repository))
                .collect();
        }

        // One worker item per (coordinate, transform); later specs sharing it
        // read the memo instead of fetching the same file concurrently
        let mut seen = HashSet::new();
        let leaders: Vec<usize> = specs
            .iter()
            .enumerate()
            .filter(|(_, spec)| seen.insert((spec.coordinate.clone(), spec.transform)))
            .map(|(index, _)| index)
            .collect();

        let next = AtomicUsize::new(0);
        let failed = AtomicBool::new(false);
        let slots: Vec<Mutex<Option<Result<ResolvedArtifact>>>> =
            specs.iter().map(|_| Mutex::new(None)).collect();

        thread::scope(|scope| {
            for _ in 0..self.jobs.min(leaders.len()) {
                scope.spawn(|| loop {
                    if failed.load(Ordering::Relaxed) {
                        break;
                    }
                    let Some(&index) = leaders.get(next.fetch_add(1, Ordering::Relaxed)) else {
                        break;
                    };
                    let result = self.resolve_routed(&specs[index], routes[index]);
                    if result.is_err() {
                        failed.store(true, Ordering::Relaxed);
                    }
                    if let Ok(mut slot) = slots[index].lock() {
                        *slot = Some(result);
                    }
                });
            }
        });

        let mut slots: Vec<Option<Result<ResolvedArtifact>>> = slots
            .into_iter()
            .map(|slot| slot.into_inner().ok().flatten())
            .collect();

        // Report the first failure in declaration order
        if let Some(index) = slots.iter().position(|slot| matches!(slot, Some(Err(_)))) {
            if let Some(Some(Err(e))) = slots.get_mut(index).map(Option::take) {
                return Err(e);
            }
        }

        let mut artifacts = Vec::with_capacity(specs.len());
        for (index, slot) in slots.into_iter().enumerate() {
            let artifact = match slot {
                Some(result) => result?,
                None => self.resolve_routed(&specs[index], routes[index])?,
            };
            artifacts.push(artifact);
        }
        Ok(artifacts)
    }

    fn resolve_routed(
        &self,
        spec: &DependencySpec,
        repository: &Repository,
    ) -> Result<ResolvedArtifact> {
        let memo_key = (spec.coordinate.clone(), spec.transform);
        if let Some(file) = self.memo_get(&memo_key) {
            debug!(coordinate = %spec.coordinate, "already resolved in this build");
            return Ok(self.artifact(spec, file));
        }

        if self.cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        debug!(coordinate = %spec.coordinate, repository = %repository.id, "routing");
        let fetched = self.fetcher.fetch(&spec.coordinate, repository)?;

        let path = match spec.transform {
            Transform::None => fetched,
            Transform::Deobfuscate => self.transformer.transform(&spec.coordinate, &fetched)?,
        };

        let checksum = sha256_file(&path)?;
        self.check_pin(spec, &repository.id, &checksum)?;

        info!(coordinate = %spec.coordinate, repository = %repository.id, "resolved");

        let file = ResolvedFile {
            repository: repository.id.clone(),
            path,
            checksum,
        };

        // A concurrent worker may have finished the same coordinate first;
        // keep whichever landed first so every caller sees one file.
        let file = match self.resolved.lock() {
            Ok(mut resolved) => resolved.entry(memo_key).or_insert(file).clone(),
            Err(_) => file,
        };

        Ok(self.artifact(spec, file))
    }

    fn memo_get(&self, key: &(Coordinate, Transform)) -> Option<ResolvedFile> {
        self.resolved.lock().ok()?.get(key).cloned()
    }

    fn artifact(&self, spec: &DependencySpec, file: ResolvedFile) -> ResolvedArtifact {
        ResolvedArtifact {
            spec: spec.clone(),
            repository: file.repository,
            path: file.path,
            checksum: file.checksum,
        }
    }

    fn check_pin(&self, spec: &DependencySpec, repository: &str, checksum: &str) -> Result<()> {
        let Some(pin) = self.pins.get(&spec.lock_key()) else {
            return Ok(());
        };

        if pin.repository != repository {
            return Err(Error::config(format!(
                "'{}' is now served by repository '{}' but modbuild.lock pins '{}'\n\n\
                 Hint: repository routing changed. Run `modbuild resolve` to re-pin it.",
                spec.coordinate, repository, pin.repository
            )));
        }

        if !pin.checksum.eq_ignore_ascii_case(checksum) {
            return Err(Error::ChecksumMismatch {
                coordinate: spec.coordinate.to_string(),
                expected: pin.checksum.clone(),
                actual: checksum.to_string(),
            });
        }

        Ok(())
    }
}
