//! Bytecode remapping collaborator
//!
//! Some dependencies ship obfuscated names and must be remapped before they can be
//! compiled against. The remapper itself is an external program; this module only
//! defines the seam ([`ArtifactTransformer`]) and a command-line adapter.

use crate::{Coordinate, Error, Result};
use std::fs;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

/// External bytecode-remapping collaborator
pub trait ArtifactTransformer: Send + Sync {
    /// Transform `input` and return the path of the transformed file
    fn transform(&self, coordinate: &Coordinate, input: &Path) -> Result<PathBuf>;
}

fn transform_error(coordinate: &Coordinate, reason: impl Into<String>) -> Error {
    Error::Transform {
        coordinate: coordinate.to_string(),
        reason: reason.into(),
    }
}

/// Used when no remapper is configured: every request fails
#[derive(Debug, Clone, Default)]
pub struct DisabledTransformer;

impl ArtifactTransformer for DisabledTransformer {
    fn transform(&self, coordinate: &Coordinate, _input: &Path) -> Result<PathBuf> {
        Err(transform_error(
            coordinate,
            "no transform command configured (set transform.command)",
        ))
    }
}

/// Runs an external remapper, e.g. `["java", "-jar", "remap.jar", "{input}", "{output}"]`
#[derive(Debug, Clone)]
pub struct CommandTransformer {
    command: Vec<String>,
    output_dir: PathBuf,
    timeout: Duration,
}

impl CommandTransformer {
    pub fn new(command: Vec<String>, output_dir: PathBuf, timeout: Duration) -> Result<Self> {
        if command.is_empty() {
            return Err(Error::config("transform.command must not be empty"));
        }
        if !command.iter().any(|arg| arg.contains("{output}")) {
            return Err(Error::config(
                "transform.command must contain an {output} placeholder",
            ));
        }
        Ok(Self {
            command,
            output_dir,
            timeout,
        })
    }

    /// Where the transformed form of a coordinate is written
    pub fn output_path(&self, coordinate: &Coordinate) -> PathBuf {
        let stem = coordinate.file_name();
        let stem = stem.trim_end_matches(".jar");
        self.output_dir
            .join(&coordinate.namespace)
            .join(format!("{}-deobf.jar", stem))
    }
}

impl ArtifactTransformer for CommandTransformer {
    fn transform(&self, coordinate: &Coordinate, input: &Path) -> Result<PathBuf> {
        let output = self.output_path(coordinate);
        if output.is_file() {
            debug!(coordinate = %coordinate, "using previously transformed artifact");
            return Ok(output);
        }
        if let Some(parent) = output.parent() {
            fs::create_dir_all(parent)?;
        }

        let args: Vec<String> = self
            .command
            .iter()
            .map(|arg| {
                arg.replace("{input}", &input.to_string_lossy())
                    .replace("{output}", &output.to_string_lossy())
            })
            .collect();

        info!(coordinate = %coordinate, program = %args[0], "remapping");

        let mut child = Command::new(&args[0])
            .args(&args[1..])
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| transform_error(coordinate, format!("failed to run '{}': {}", args[0], e)))?;

        // The pipe is drained while polling; a full pipe would stall the remapper
        let stderr_reader = child.stderr.take().map(|mut pipe| {
            thread::spawn(move || {
                let mut buffer = Vec::new();
                let _ = pipe.read_to_end(&mut buffer);
                buffer
            })
        });
        let collect_stderr = |reader: Option<thread::JoinHandle<Vec<u8>>>| -> String {
            reader
                .and_then(|handle| handle.join().ok())
                .map(|bytes| String::from_utf8_lossy(&bytes).into_owned())
                .unwrap_or_default()
        };

        let started = Instant::now();
        let status = loop {
            if let Some(status) = child.try_wait()? {
                break status;
            }
            if started.elapsed() >= self.timeout {
                let _ = child.kill();
                let _ = child.wait();
                // A surviving grandchild may still hold the pipe; leave the reader detached
                drop(stderr_reader);
                let _ = fs::remove_file(&output);
                return Err(transform_error(
                    coordinate,
                    format!("remapper timed out after {}s", self.timeout.as_secs()),
                ));
            }
            thread::sleep(Duration::from_millis(50));
        };
        let stderr = collect_stderr(stderr_reader);

        if !status.success() {
            let _ = fs::remove_file(&output);
            return Err(transform_error(
                coordinate,
                format!("remapper exited with {}: {}", status, stderr.trim()),
            ));
        }

        if !output.is_file() {
            return Err(transform_error(
                coordinate,
                format!("remapper did not produce {}", output.display()),
            ));
        }

        Ok(output)
    }
}
