//! Compiled contract artifacts: ABI and creation bytecode.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use alloy_json_abi::JsonAbi;
use alloy_primitives::Bytes;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

/// A compiled contract.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Artifact {
    pub name: String,
    pub abi: JsonAbi,
    pub bytecode: Bytes,
}

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("No artifact found for contract `{0}`")]
    NotFound(String),

    #[error("Several artifacts found for contract `{name}`: {}", display_paths(.paths))]
    Ambiguous { name: String, paths: Vec<PathBuf> },

    #[error("Failed to read artifact `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid artifact `{}`: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Invalid ABI for `{name}`: {reason}")]
    Abi { name: String, reason: String },

    #[error("Invalid artifact search pattern: {0}")]
    Pattern(#[from] glob::PatternError),
}

fn display_paths(paths: &[PathBuf]) -> String {
    paths
        .iter()
        .map(|p| p.display().to_string())
        .collect::<Vec<_>>()
        .join(", ")
}

/// Source of contract artifacts, looked up by contract name.
pub trait ArtifactStore: Send + Sync {
    fn artifact(&self, name: &str) -> Result<Arc<Artifact>, ArtifactError>;
}

/// Hardhat artifact file layout, only the fields needed for deployment.
#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct HardhatArtifact {
    contract_name: String,
    abi: JsonAbi,
    bytecode: Bytes,
}

/// Artifacts compiled by Hardhat under a directory, eg. `artifacts/`.
///
/// `<name>` resolves to the single `<dir>/**/<name>.json` file. Debug
/// companions (`*.dbg.json`) are ignored. Loaded artifacts are cached.
#[derive(Debug)]
pub struct ArtifactDir {
    root: PathBuf,
    cache: Mutex<BTreeMap<String, Arc<Artifact>>>,
}

impl ArtifactDir {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            cache: Mutex::new(BTreeMap::new()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn find(&self, name: &str) -> Result<PathBuf, ArtifactError> {
        let root = glob::Pattern::escape(&self.root.to_string_lossy());
        let pattern = format!("{root}/**/{name}.json");

        let mut paths: Vec<PathBuf> = glob::glob(&pattern)?
            .filter_map(Result::ok)
            .filter(|p| {
                !p.file_name()
                    .and_then(|f| f.to_str())
                    .is_some_and(|f| f.ends_with(".dbg.json"))
            })
            .collect();

        match paths.len() {
            0 => Err(ArtifactError::NotFound(name.to_owned())),
            1 => Ok(paths.remove(0)),
            _ => Err(ArtifactError::Ambiguous {
                name: name.to_owned(),
                paths,
            }),
        }
    }

    fn load(&self, name: &str) -> Result<Artifact, ArtifactError> {
        let path = self.find(name)?;

        let bytes = fs::read(&path).map_err(|source| ArtifactError::Io {
            path: path.clone(),
            source,
        })?;

        let artifact: HardhatArtifact =
            serde_json::from_slice(&bytes).map_err(|source| ArtifactError::Parse {
                path: path.clone(),
                source,
            })?;

        debug!(name, path = %path.display(), "Loaded artifact");

        Ok(Artifact {
            name: artifact.contract_name,
            abi: artifact.abi,
            bytecode: artifact.bytecode,
        })
    }
}

impl ArtifactStore for ArtifactDir {
    fn artifact(&self, name: &str) -> Result<Arc<Artifact>, ArtifactError> {
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);

        if let Some(artifact) = cache.get(name) {
            return Ok(Arc::clone(artifact));
        }

        let artifact = Arc::new(self.load(name)?);
        cache.insert(name.to_owned(), Arc::clone(&artifact));

        Ok(artifact)
    }
}

/// Artifacts built in memory from human-readable ABI signatures, eg.
/// `constructor(address hubAddress)` or `function setReleaseEpoch(uint256)`.
#[derive(Clone, Debug, Default)]
pub struct StaticArtifacts {
    artifacts: BTreeMap<String, Arc<Artifact>>,
}

impl StaticArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds an artifact with the given signatures and an empty bytecode.
    pub fn insert<'a>(
        &mut self,
        name: &str,
        signatures: impl IntoIterator<Item = &'a str>,
    ) -> Result<(), ArtifactError> {
        let abi = JsonAbi::parse(signatures).map_err(|e| ArtifactError::Abi {
            name: name.to_owned(),
            reason: e.to_string(),
        })?;

        let artifact = Artifact {
            name: name.to_owned(),
            abi,
            bytecode: Bytes::new(),
        };

        self.artifacts.insert(name.to_owned(), Arc::new(artifact));
        Ok(())
    }

    pub fn with<'a>(
        mut self,
        name: &str,
        signatures: impl IntoIterator<Item = &'a str>,
    ) -> Result<Self, ArtifactError> {
        self.insert(name, signatures)?;
        Ok(self)
    }
}

impl ArtifactStore for StaticArtifacts {
    fn artifact(&self, name: &str) -> Result<Arc<Artifact>, ArtifactError> {
        self.artifacts
            .get(name)
            .cloned()
            .ok_or_else(|| ArtifactError::NotFound(name.to_owned()))
    }
}
