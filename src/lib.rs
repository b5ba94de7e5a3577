//! modbuild - declarative build policy for game mods
//!
//! modbuild reads a `modbuild.toml` descriptor and turns it into a reproducible
//! build plan:
//!
//! - Repository routing with exclusive namespace filters, validated at registration
//! - Feature toggles that switch integrations between dev-runtime and compile-only
//! - Artifact resolution through pluggable fetch and remap collaborators
//! - TOML lockfiles with SHA256 checksums for reproducible builds
//! - Resource staging with `${token}` expansion
//! - Per-channel publish manifests (Maven, CurseForge, Modrinth)
//!
//! # Examples
//!
//! ```no_run
//! use modbuild::{BuildContext, BuildOptions, Config, Descriptor};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let descriptor = Descriptor::load(".")?;
//! let config = Config::load()?;
//! let ctx = BuildContext::from_config(".", descriptor, &config, BuildOptions::default())?;
//!
//! let primary = ctx.primary_artifact(None);
//! let output = ctx.run(&primary)?;
//! println!("Resolved {} artifacts", output.resolution.resolved.len());
//! # Ok(())
//! # }
//! ```
//!
//! # Modules
//!
//! - [`coordinate`] - Artifact coordinates and their text forms
//! - [`repository`] - Repository registry and exclusivity routing
//! - [`fetch`] - Fetch collaborators (file and HTTP)
//! - [`transform`] - Bytecode remapping collaborator
//! - [`resolver`] - Resolve dependency specs to local files
//! - [`features`] - Feature toggles and the active dependency set
//! - [`inject`] - Resource staging and token substitution
//! - [`publish`] - Publish manifests per channel
//! - [`descriptor`] - Parse `modbuild.toml`
//! - [`lockfile`] - Manage `modbuild.lock`
//! - [`build`] - The build pipeline
//! - [`config`] - User configuration
//! - [`error`] - Error types and result handling

pub mod build;
pub mod config;
pub mod coordinate;
pub mod descriptor;
pub mod error;
pub mod features;
pub mod fetch;
pub mod inject;
pub mod lockfile;
pub mod publish;
pub mod repository;
pub mod resolver;
pub mod transform;

pub use build::{BuildContext, BuildOptions, BuildOutput, CancelToken, Resolution};
pub use config::Config;
pub use coordinate::{Coordinate, SourceKind};
pub use descriptor::{Descriptor, DESCRIPTOR_NAME};
pub use error::{Error, FetchCause, Result};
pub use features::{Branch, ConditionalGroup, FeatureMatrix, FeatureToggle, Selection};
pub use inject::{InjectionRule, Injector, StagingTree};
pub use lockfile::{LockedArtifact, Lockfile, LOCKFILE_NAME};
pub use publish::{Channel, PrimaryArtifact, PublishManifest, PublishTarget};
pub use repository::{Repository, RepositoryLayout, RepositoryRegistry};
pub use resolver::{DependencySpec, ResolvedArtifact, Resolver, Scope, Transform};
