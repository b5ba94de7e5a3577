//! Artifact fetching
//!
//! The resolver never talks to the network itself: it asks an [`ArtifactFetcher`]
//! for a local file holding a coordinate from a routed repository. Two fetchers
//! are provided:
//!
//! - [`FileFetcher`] for `file://` repositories (local mirrors, tests)
//! - [`HttpFetcher`] for `http(s)://` repositories, with a download cache
//!
//! [`RepositoryFetcher`] picks between them based on the repository URL scheme.

use crate::{Coordinate, Error, FetchCause, Repository, Result};
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{debug, info};

/// External fetch/cache collaborator
pub trait ArtifactFetcher: Send + Sync {
    /// Produce a local file for `coordinate` as served by `repository`
    fn fetch(&self, coordinate: &Coordinate, repository: &Repository) -> Result<PathBuf>;
}

fn not_found(coordinate: &Coordinate, repository: &Repository, cause: FetchCause) -> Error {
    Error::ArtifactNotFound {
        coordinate: coordinate.to_string(),
        repository: repository.id.clone(),
        cause,
    }
}

/// Serves artifacts straight from `file://` repositories
#[derive(Debug, Clone, Default)]
pub struct FileFetcher;

impl FileFetcher {
    pub fn new() -> Self {
        Self
    }
}

impl ArtifactFetcher for FileFetcher {
    fn fetch(&self, coordinate: &Coordinate, repository: &Repository) -> Result<PathBuf> {
        let url = repository.artifact_location(coordinate)?;
        let path = url.to_file_path().map_err(|_| {
            Error::config(format!(
                "Repository '{}' is not a local file repository: {}",
                repository.id, repository.location
            ))
        })?;

        if !path.is_file() {
            return Err(not_found(coordinate, repository, FetchCause::Missing));
        }

        debug!(coordinate = %coordinate, path = %path.display(), "using local artifact");
        Ok(path)
    }
}

/// Downloads artifacts over HTTP into a cache directory
///
/// Cached files are reused without a request; integrity of reused files is
/// checked against the lockfile by the resolver.
pub struct HttpFetcher {
    client: reqwest::blocking::Client,
    cache_dir: PathBuf,
}

impl HttpFetcher {
    /// Create a fetcher whose every request is bounded by `timeout`
    pub fn new(cache_dir: PathBuf, timeout: Duration) -> Result<Self> {
        fs::create_dir_all(&cache_dir)?;

        let client = reqwest::blocking::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("modbuild/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self { client, cache_dir })
    }

    /// Where a coordinate from a repository is cached
    pub fn cache_path(&self, coordinate: &Coordinate, repository: &Repository) -> PathBuf {
        let mut path = self.cache_dir.join(&repository.id);
        for segment in coordinate.namespace.split('.') {
            path.push(segment);
        }
        path.join(&coordinate.name)
            .join(&coordinate.version)
            .join(coordinate.file_name())
    }
}

impl ArtifactFetcher for HttpFetcher {
    fn fetch(&self, coordinate: &Coordinate, repository: &Repository) -> Result<PathBuf> {
        let cached_path = self.cache_path(coordinate, repository);
        if cached_path.is_file() {
            debug!(coordinate = %coordinate, "using cached artifact");
            return Ok(cached_path);
        }

        let url = repository.artifact_location(coordinate)?;
        info!(coordinate = %coordinate, repository = %repository.id, %url, "downloading");

        let response = self.client.get(url.clone()).send().map_err(|e| {
            let cause = if e.is_timeout() {
                FetchCause::Timeout
            } else if e.is_connect() {
                FetchCause::Transport(format!("cannot connect to {}", repository.location))
            } else {
                FetchCause::Transport(e.to_string())
            };
            not_found(coordinate, repository, cause)
        })?;

        let status = response.status();
        if status == reqwest::StatusCode::NOT_FOUND {
            return Err(not_found(coordinate, repository, FetchCause::Missing));
        }
        if !status.is_success() {
            return Err(not_found(
                coordinate,
                repository,
                FetchCause::Transport(format!("HTTP {} from {}", status.as_u16(), url)),
            ));
        }

        let bytes = response.bytes().map_err(|e| {
            let cause = if e.is_timeout() {
                FetchCause::Timeout
            } else {
                FetchCause::Transport(format!("failed to read response: {}", e))
            };
            not_found(coordinate, repository, cause)
        })?;

        // Write beside the final path and rename, so an aborted build never
        // leaves a truncated file that a later build would trust.
        if let Some(parent) = cached_path.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = cached_path.with_extension(format!("jar.{}.part", std::process::id()));
        fs::write(&partial, &bytes)?;
        fs::rename(&partial, &cached_path)?;

        Ok(cached_path)
    }
}

/// Dispatches to the file or HTTP fetcher by repository URL scheme
pub struct RepositoryFetcher {
    file: FileFetcher,
    http: HttpFetcher,
}

impl RepositoryFetcher {
    pub fn new(cache_dir: PathBuf, timeout: Duration) -> Result<Self> {
        Ok(Self {
            file: FileFetcher::new(),
            http: HttpFetcher::new(cache_dir, timeout)?,
        })
    }
}

impl ArtifactFetcher for RepositoryFetcher {
    fn fetch(&self, coordinate: &Coordinate, repository: &Repository) -> Result<PathBuf> {
        match repository.location.scheme() {
            "file" => self.file.fetch(coordinate, repository),
            "http" | "https" => self.http.fetch(coordinate, repository),
            other => Err(Error::config(format!(
                "Repository '{}' uses unsupported scheme '{}'",
                repository.id, other
            ))),
        }
    }
}

/// SHA256 of a file as lowercase hex
pub fn sha256_file<P: AsRef<Path>>(path: P) -> Result<String> {
    let mut file = File::open(path.as_ref())?;
    let mut hasher = Sha256::new();
    let mut buffer = vec![0; 8192];

    loop {
        let bytes_read = file.read(&mut buffer)?;
        if bytes_read == 0 {
            break;
        }
        hasher.update(&buffer[..bytes_read]);
    }

    Ok(format!("{:x}", hasher.finalize()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;
    use url::Url;

    fn file_repo(dir: &Path) -> Repository {
        let url = Url::from_directory_path(dir).unwrap();
        Repository::maven("local", url.as_str()).unwrap()
    }

    #[test]
    fn test_file_fetcher_finds_artifact() {
        let temp = TempDir::new().unwrap();
        let coordinate: Coordinate = "org.joml:joml:1.10.8".parse().unwrap();
        let artifact_dir = temp.path().join("org/joml/joml/1.10.8");
        fs::create_dir_all(&artifact_dir).unwrap();
        fs::write(artifact_dir.join("joml-1.10.8.jar"), b"jar").unwrap();

        let path = FileFetcher::new()
            .fetch(&coordinate, &file_repo(temp.path()))
            .unwrap();
        assert_eq!(fs::read(path).unwrap(), b"jar");
    }

    #[test]
    fn test_file_fetcher_missing_artifact() {
        let temp = TempDir::new().unwrap();
        let coordinate: Coordinate = "org.joml:joml:1.10.8".parse().unwrap();

        let err = FileFetcher::new()
            .fetch(&coordinate, &file_repo(temp.path()))
            .unwrap_err();
        match err {
            Error::ArtifactNotFound {
                repository, cause, ..
            } => {
                assert_eq!(repository, "local");
                assert_eq!(cause, FetchCause::Missing);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_http_cache_path_layout() {
        let temp = TempDir::new().unwrap();
        let fetcher = HttpFetcher::new(temp.path().to_path_buf(), Duration::from_secs(5)).unwrap();
        let repo = Repository::maven("mega", "https://mvn.example/mega").unwrap();
        let coordinate: Coordinate = "codechicken:notenoughitems-mc1.7.10:2.4.2-mega:dev"
            .parse()
            .unwrap();

        let path = fetcher.cache_path(&coordinate, &repo);
        assert!(path.starts_with(temp.path().join("mega").join("codechicken")));
        assert!(path.ends_with("notenoughitems-mc1.7.10-2.4.2-mega-dev.jar"));
    }

    #[test]
    fn test_sha256_file() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("a.jar");
        fs::write(&path, b"hello").unwrap();
        assert_eq!(
            sha256_file(&path).unwrap(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
    }
}
