//! HTTP fetcher tests against a local mock repository.

use modbuild::fetch::{ArtifactFetcher, HttpFetcher, RepositoryFetcher};
use modbuild::{Coordinate, Error, FetchCause, Repository};
use std::fs;
use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;

fn joml() -> Coordinate {
    "org.joml:joml:1.10.8".parse().unwrap()
}

#[test]
fn test_download_is_cached() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/releases/org/joml/joml/1.10.8/joml-1.10.8.jar")
        .with_status(200)
        .with_body("jar-bytes")
        .expect(1)
        .create();

    let cache = TempDir::new().unwrap();
    let fetcher = HttpFetcher::new(cache.path().to_path_buf(), Duration::from_secs(5)).unwrap();
    let repo = Repository::maven("central", &format!("{}/releases", server.url())).unwrap();

    let first = fetcher.fetch(&joml(), &repo).unwrap();
    let second = fetcher.fetch(&joml(), &repo).unwrap();

    assert_eq!(first, second);
    assert_eq!(fs::read(&first).unwrap(), b"jar-bytes");
    assert!(first.starts_with(cache.path().join("central")));
    mock.assert();
}

#[test]
fn test_missing_artifact_reports_repository() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/org/joml/joml/1.10.8/joml-1.10.8.jar")
        .with_status(404)
        .create();

    let cache = TempDir::new().unwrap();
    let fetcher = HttpFetcher::new(cache.path().to_path_buf(), Duration::from_secs(5)).unwrap();
    let repo = Repository::maven("mega", &server.url()).unwrap();

    match fetcher.fetch(&joml(), &repo).unwrap_err() {
        Error::ArtifactNotFound {
            coordinate,
            repository,
            cause,
        } => {
            assert_eq!(coordinate, "org.joml:joml:1.10.8");
            assert_eq!(repository, "mega");
            assert_eq!(cause, FetchCause::Missing);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_server_error_is_transport_failure() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/org/joml/joml/1.10.8/joml-1.10.8.jar")
        .with_status(503)
        .create();

    let cache = TempDir::new().unwrap();
    let fetcher = HttpFetcher::new(cache.path().to_path_buf(), Duration::from_secs(5)).unwrap();
    let repo = Repository::maven("mega", &server.url()).unwrap();

    let err = fetcher.fetch(&joml(), &repo).unwrap_err();
    assert!(matches!(
        err,
        Error::ArtifactNotFound {
            cause: FetchCause::Transport(_),
            ..
        }
    ));
    // Nothing half-written is left for a later build to trust
    assert!(!fetcher.cache_path(&joml(), &repo).exists());
}

#[test]
fn test_ivy_repository_over_http() {
    let mut server = mockito::Server::new();
    let mock = server
        .mock("GET", "/mirror/mirror/micdoodle/galacticraft-3.0.12.jar")
        .with_status(200)
        .with_body("gc")
        .create();

    let cache = TempDir::new().unwrap();
    let fetcher =
        RepositoryFetcher::new(cache.path().to_path_buf(), Duration::from_secs(5)).unwrap();
    let repo = Repository::ivy(
        "mavenpattern_mirror",
        &format!("{}/mirror/", server.url()),
        "[orgPath]/[artifact]-[revision](-[classifier]).[ext]",
    )
    .unwrap()
    .exclusive(["mirror.micdoodle"]);

    let coordinate: Coordinate = "ivy:mirror.micdoodle:galacticraft:3.0.12".parse().unwrap();
    let path = fetcher.fetch(&coordinate, &repo).unwrap();
    assert_eq!(fs::read(path).unwrap(), b"gc");
    mock.assert();
}

#[test]
fn test_unsupported_scheme_is_config_error() {
    let cache = TempDir::new().unwrap();
    let fetcher =
        RepositoryFetcher::new(cache.path().to_path_buf(), Duration::from_secs(5)).unwrap();
    let repo = Repository::maven("ftp", "ftp://example.com/repo").unwrap();

    assert!(matches!(
        fetcher.fetch(&joml(), &repo),
        Err(Error::Config(_))
    ));
}

#[test]
fn test_slow_repository_is_bounded_by_timeout() {
    let mut server = mockito::Server::new();
    let _mock = server
        .mock("GET", "/org/joml/joml/1.10.8/joml-1.10.8.jar")
        .with_status(200)
        .with_chunked_body(|w| {
            std::thread::sleep(Duration::from_secs(3));
            w.write_all(b"late")
        })
        .create();

    let cache = TempDir::new().unwrap();
    let fetcher =
        HttpFetcher::new(cache.path().to_path_buf(), Duration::from_millis(300)).unwrap();
    let repo = Repository::maven("slow", &server.url()).unwrap();

    let started = std::time::Instant::now();
    let err = fetcher.fetch(&joml(), &repo).unwrap_err();
    assert!(started.elapsed() < Duration::from_secs(3));
    match err {
        Error::ArtifactNotFound {
            repository, cause, ..
        } => {
            assert_eq!(repository, "slow");
            assert_ne!(cause, FetchCause::Missing);
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!fetcher.cache_path(&joml(), &repo).exists());
}
