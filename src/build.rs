//! Build pipeline
//!
//! One build runs four strictly ordered stages, each consuming the complete
//! output of the previous one:
//!
//! 1. feature matrix: pick the active dependency set
//! 2. resolution: route every coordinate, then fetch and remap
//! 3. injection: stage files and expand tokens in memory
//! 4. publish planning: compute per-channel manifests
//!
//! All state lives in a [`BuildContext`] created for the invocation. Nothing is
//! written to disk until [`BuildOutput::commit`], so a failed or cancelled build
//! leaves no partial output behind.

use crate::config::Config;
use crate::descriptor::Descriptor;
use crate::fetch::{ArtifactFetcher, RepositoryFetcher};
use crate::features::Selection;
use crate::inject::{Injector, StagingTree};
use crate::lockfile::{LockedArtifact, Lockfile};
use crate::publish::{self, Channel, PrimaryArtifact, PublishManifest};
use crate::transform::{ArtifactTransformer, CommandTransformer, DisabledTransformer};
use crate::{DependencySpec, Error, ResolvedArtifact, Resolver, Result};
use std::collections::{BTreeMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{debug, info};

/// Shared flag that aborts a build between and within stages
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(Error::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Per-invocation knobs
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Toggle values replacing the descriptor's for this build
    pub overrides: BTreeMap<String, bool>,
    pub jobs: usize,
    /// Lockfile pins every resolved artifact must match
    pub pins: BTreeMap<String, LockedArtifact>,
    pub cancel: CancelToken,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            overrides: BTreeMap::new(),
            jobs: 1,
            pins: BTreeMap::new(),
            cancel: CancelToken::new(),
        }
    }
}

/// Active dependency set and the resolved artifacts for it
#[derive(Debug, Clone)]
pub struct Resolution {
    pub selections: Vec<Selection>,
    pub active: Vec<DependencySpec>,
    pub resolved: Vec<ResolvedArtifact>,
}

/// Everything a full build produced, still in memory
#[derive(Debug, Clone)]
pub struct BuildOutput {
    pub resolution: Resolution,
    pub staging: StagingTree,
    pub manifests: BTreeMap<Channel, PublishManifest>,
}

/// What [`BuildOutput::commit`] wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommitSummary {
    pub staged_files: usize,
    pub manifest_files: Vec<PathBuf>,
}

impl BuildOutput {
    /// Write the staging tree and one `<channel>.json` per manifest
    pub fn commit(&self, staging_dir: &Path, manifest_dir: &Path) -> Result<CommitSummary> {
        let staged_files = self.staging.commit(staging_dir)?;

        let mut manifest_files = Vec::with_capacity(self.manifests.len());
        if !self.manifests.is_empty() {
            fs::create_dir_all(manifest_dir)?;
        }
        for manifest in self.manifests.values() {
            let path = manifest_dir.join(manifest.file_name());
            fs::write(&path, serde_json::to_string_pretty(manifest)?)?;
            manifest_files.push(path);
        }

        info!(staged_files, manifests = manifest_files.len(), "build output committed");
        Ok(CommitSummary {
            staged_files,
            manifest_files,
        })
    }
}

/// Build-scoped state passed between stages
pub struct BuildContext {
    root: PathBuf,
    descriptor: Descriptor,
    resolver: Resolver,
    overrides: BTreeMap<String, bool>,
    cancel: CancelToken,
}

impl BuildContext {
    pub fn new(
        root: impl Into<PathBuf>,
        descriptor: Descriptor,
        fetcher: Box<dyn ArtifactFetcher>,
        transformer: Box<dyn ArtifactTransformer>,
        options: BuildOptions,
    ) -> Result<Self> {
        let registry = descriptor.registry()?;
        let resolver = Resolver::new(registry, fetcher, transformer)
            .with_pins(options.pins)
            .with_jobs(options.jobs)
            .with_cancel_token(options.cancel.clone());

        Ok(Self {
            root: root.into(),
            descriptor,
            resolver,
            overrides: options.overrides,
            cancel: options.cancel,
        })
    }

    /// Wire the collaborators described by the user configuration
    pub fn from_config(
        root: impl Into<PathBuf>,
        descriptor: Descriptor,
        config: &Config,
        options: BuildOptions,
    ) -> Result<Self> {
        let cache_dir = config.cache_dir()?;
        let fetcher = RepositoryFetcher::new(cache_dir.join("artifacts"), config.fetch_timeout())?;

        let transformer: Box<dyn ArtifactTransformer> = if config.transform.command.is_empty() {
            Box::new(DisabledTransformer)
        } else {
            Box::new(CommandTransformer::new(
                config.transform.command.clone(),
                cache_dir.join("deobf"),
                config.transform_timeout(),
            )?)
        };

        Self::new(root, descriptor, Box::new(fetcher), transformer, options)
    }

    pub fn descriptor(&self) -> &Descriptor {
        &self.descriptor
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Stage 1: base dependencies followed by the feature matrix selection
    pub fn select(&self) -> Result<(Vec<Selection>, Vec<DependencySpec>)> {
        select_dependencies(&self.descriptor, &self.overrides)
    }

    /// Stages 1 and 2
    pub fn resolve(&self) -> Result<Resolution> {
        let (selections, active) = self.select()?;
        self.cancel.check()?;

        info!(dependencies = active.len(), "resolving");
        let resolved = self.resolver.resolve_all(&active)?;

        Ok(Resolution {
            selections,
            active,
            resolved,
        })
    }

    /// The build output the publish manifests point at
    pub fn primary_artifact(&self, path: Option<PathBuf>) -> PrimaryArtifact {
        let info = &self.descriptor.mod_info;
        let path = path.unwrap_or_else(|| {
            self.root
                .join("build")
                .join("libs")
                .join(format!("{}-{}.jar", info.id, info.version))
        });
        PrimaryArtifact {
            group: info.group.clone(),
            artifact_id: info.id.clone(),
            version: info.version.clone(),
            path,
        }
    }

    /// Stage 4 on an existing resolution
    pub fn plan(
        &self,
        resolution: &Resolution,
        primary: &PrimaryArtifact,
    ) -> Result<BTreeMap<Channel, PublishManifest>> {
        let targets = self.descriptor.publish_targets()?;
        publish::plan(&resolution.resolved, &targets, primary)
    }

    /// Run every stage; the result is committed separately
    pub fn run(&self, primary: &PrimaryArtifact) -> Result<BuildOutput> {
        let resolution = self.resolve()?;
        self.cancel.check()?;

        let rules = self.descriptor.injection_rules()?;
        let mut staging = StagingTree::new();
        Injector::new(&self.root, self.descriptor.bindings()).inject(
            &rules,
            &resolution.resolved,
            &mut staging,
        )?;
        debug!(files = staging.len(), "staging tree ready");
        self.cancel.check()?;

        let manifests = self.plan(&resolution, primary)?;

        Ok(BuildOutput {
            resolution,
            staging,
            manifests,
        })
    }
}

/// Toggle selections and the deduplicated active set, base dependencies first
pub fn select_dependencies(
    descriptor: &Descriptor,
    overrides: &BTreeMap<String, bool>,
) -> Result<(Vec<Selection>, Vec<DependencySpec>)> {
    let matrix = descriptor.feature_matrix()?.with_overrides(overrides)?;
    let selections = matrix.selections();

    let mut seen = HashSet::new();
    let active: Vec<DependencySpec> = descriptor
        .base_dependencies()?
        .into_iter()
        .chain(matrix.active_dependencies())
        .filter(|spec| seen.insert(spec.clone()))
        .collect();

    debug!(active = active.len(), "feature matrix evaluated");
    Ok((selections, active))
}

/// Pins from a lockfile, or none
pub fn pins_from(lockfile: Option<&Lockfile>) -> BTreeMap<String, LockedArtifact> {
    lockfile.map(|l| l.artifacts.clone()).unwrap_or_default()
}
