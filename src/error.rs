use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Why a fetch produced no artifact
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchCause {
    /// The repository answered but does not host the artifact
    Missing,
    /// The collaborator did not answer within the configured timeout
    Timeout,
    /// Any other transport failure (connection refused, HTTP 5xx, ...)
    Transport(String),
}

impl fmt::Display for FetchCause {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchCause::Missing => write!(f, "not found"),
            FetchCause::Timeout => write!(f, "timed out"),
            FetchCause::Transport(msg) => write!(f, "{}", msg),
        }
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialize error: {0}")]
    TomlDe(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),

    #[error("Invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Invalid build descriptor: {0}")]
    Config(String),

    #[error("No repository can serve '{coordinate}'\n\n\
             Hint: every namespace must match an exclusive repository or fall through\n\
             to a catch-all repository (one declared without `exclusive`).\n\n\
             Add a repository for this namespace to modbuild.toml.")]
    UnroutableCoordinate { coordinate: String },

    #[error("Artifact '{coordinate}' not available from repository '{repository}': {cause}")]
    ArtifactNotFound {
        coordinate: String,
        repository: String,
        cause: FetchCause,
    },

    #[error("Failed to transform '{coordinate}': {reason}\n\n\
             Hint: deobfuscated dependencies are never used untransformed.\n\
             Check the [transform] command in your modbuild config.")]
    Transform { coordinate: String, reason: String },

    #[error("Publish target '{channel}' requires companion '{companion}', \
             but no resolved dependency provides it\n\n\
             Hint: declare `companion = \"{companion}\"` on the dependency that ships it,\n\
             or remove it from the target's `required` list.")]
    MissingCompanion { channel: String, companion: String },

    #[error("Unresolved token '${{{token}}}' in {location}")]
    UnresolvedToken { token: String, location: String },

    #[error("Checksum mismatch for '{coordinate}'\nExpected: {expected}\nComputed: {actual}\n\n\
             Hint: the artifact changed since modbuild.lock was written.\n\
             Run `modbuild resolve` without --frozen to re-pin it.")]
    ChecksumMismatch {
        coordinate: String,
        expected: String,
        actual: String,
    },

    #[error("Build cancelled")]
    Cancelled,

    #[error("{0}")]
    Other(String),
}

impl Error {
    pub(crate) fn config(msg: impl Into<String>) -> Self {
        Error::Config(msg.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unresolved_token_message_keeps_marker() {
        let err = Error::UnresolvedToken {
            token: "venterceptor_version".to_string(),
            location: "META-INF/deps.json".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Unresolved token '${venterceptor_version}' in META-INF/deps.json"
        );
    }

    #[test]
    fn test_artifact_not_found_reports_cause() {
        let err = Error::ArtifactNotFound {
            coordinate: "com.example:lib:1.0".to_string(),
            repository: "central".to_string(),
            cause: FetchCause::Timeout,
        };
        let msg = err.to_string();
        assert!(msg.contains("com.example:lib:1.0"));
        assert!(msg.contains("central"));
        assert!(msg.contains("timed out"));
    }
}
