use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use advisory_lock::{AdvisoryFileLock, FileLockError, FileLockMode};
use dkg_deploy_core_types::{LogicalName, B256};
use tempfile::NamedTempFile;
use tracing::{debug, info};

use crate::entry::{LedgerEntry, LedgerFile};
use crate::LedgerError;

/// Per-network record of what is deployed where.
///
/// A file-backed Ledger lives at `<dir>/<network>_contracts.json` and holds an
/// exclusive advisory lock on `<dir>/<network>_contracts.json.lock` for as long
/// as it is open. Changes are kept in memory until [`Ledger::flush`].
#[derive(Debug)]
pub struct Ledger {
    network: String,
    backing: Backing,
    contracts: BTreeMap<LogicalName, LedgerEntry>,
    dirty: bool,
}

#[derive(Debug)]
enum Backing {
    File {
        path: PathBuf,
        // Held for the lifetime of the ledger, released on drop
        _lock: File,
    },
    Memory,
}

impl Ledger {
    /// Opens the Ledger of `network` in `dir`, creating the directory if needed.
    ///
    /// Fails with [`LedgerError::Locked`] if another process holds the Ledger.
    pub fn open(dir: impl AsRef<Path>, network: &str) -> Result<Self, LedgerError> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| LedgerError::io(dir, e))?;

        let path = dir.join(format!("{network}_contracts.json"));
        let lock_path = dir.join(format!("{network}_contracts.json.lock"));

        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&lock_path)
            .map_err(|e| LedgerError::io(&lock_path, e))?;

        AdvisoryFileLock::try_lock(&lock, FileLockMode::Exclusive)
            .map_err(|e| match e {
                FileLockError::AlreadyLocked => LedgerError::Locked { path: path.clone() },
                FileLockError::Io(e) => LedgerError::io(&lock_path, e),
            })?;

        let contracts = match fs::read(&path) {
            Ok(bytes) if bytes.iter().all(u8::is_ascii_whitespace) => BTreeMap::new(),
            Ok(bytes) => {
                let file: LedgerFile = serde_json::from_slice(&bytes)
                    .map_err(|source| LedgerError::Parse {
                        path: path.clone(),
                        source,
                    })?;

                file.contracts
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(LedgerError::io(&path, e)),
        };

        debug!(path = %path.display(), entries = contracts.len(), "Opened ledger");

        Ok(Self {
            network: network.to_owned(),
            backing: Backing::File { path, _lock: lock },
            contracts,
            dirty: false,
        })
    }

    /// A Ledger that is never persisted.
    pub fn in_memory(network: &str) -> Self {
        Self {
            network: network.to_owned(),
            backing: Backing::Memory,
            contracts: BTreeMap::new(),
            dirty: false,
        }
    }

    pub fn network(&self) -> &str {
        &self.network
    }

    /// Path of the Ledger file, `None` for in-memory ledgers.
    pub fn path(&self) -> Option<&Path> {
        match &self.backing {
            Backing::File { path, .. } => Some(path),
            Backing::Memory => None,
        }
    }

    pub fn get(&self, name: &LogicalName) -> Option<&LedgerEntry> {
        self.contracts.get(name)
    }

    pub fn contains(&self, name: &LogicalName) -> bool {
        self.contracts.contains_key(name)
    }

    pub fn len(&self) -> usize {
        self.contracts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.contracts.is_empty()
    }

    /// Entries ordered by logical name.
    pub fn iter(&self) -> impl Iterator<Item = (&LogicalName, &LedgerEntry)> {
        self.contracts.iter()
    }

    /// Whether there are changes not yet flushed.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Records a new deployment of `name`, replacing any previous entry.
    pub fn record(&mut self, name: LogicalName, entry: LedgerEntry) {
        debug!(%name, address = %entry.evm_address, block = entry.block_number, "Recording deployment");

        self.contracts.insert(name, entry);
        self.dirty = true;
    }

    /// Moves the entry of `name` to `<name>Deprecated`, returning the moved entry.
    ///
    /// An entry already recorded under the deprecated name is overwritten.
    pub fn supersede(
        &mut self,
        name: &LogicalName,
    ) -> Result<Option<(LogicalName, LedgerEntry)>, LedgerError> {
        let deprecated = name.deprecated()?;

        let Some(entry) = self.contracts.remove(name) else {
            return Ok(None);
        };

        info!(%name, %deprecated, address = %entry.evm_address, "Superseding ledger entry");

        self.contracts.insert(deprecated.clone(), entry.clone());
        self.dirty = true;

        Ok(Some((deprecated, entry)))
    }

    /// Records the digest of the parameter batch last applied to `name`.
    pub fn set_parameters_digest(
        &mut self,
        name: &LogicalName,
        digest: B256,
    ) -> Result<(), LedgerError> {
        let entry = self
            .contracts
            .get_mut(name)
            .ok_or_else(|| LedgerError::UnknownModule(name.clone()))?;

        if entry.parameters_digest != Some(digest) {
            entry.parameters_digest = Some(digest);
            self.dirty = true;
        }

        Ok(())
    }

    /// Marks whether the forward calls of `name` still have to go through.
    pub fn set_forwards_pending(
        &mut self,
        name: &LogicalName,
        pending: bool,
    ) -> Result<(), LedgerError> {
        let entry = self
            .contracts
            .get_mut(name)
            .ok_or_else(|| LedgerError::UnknownModule(name.clone()))?;

        if entry.forwards_pending != pending {
            entry.forwards_pending = pending;
            self.dirty = true;
        }

        Ok(())
    }

    /// Writes pending changes to disk.
    ///
    /// The file is replaced atomically, so a crash never leaves a truncated Ledger.
    /// Does nothing for in-memory ledgers or when nothing changed.
    pub fn flush(&mut self) -> Result<(), LedgerError> {
        if !self.dirty {
            return Ok(());
        }

        let Backing::File { path, .. } = &self.backing else {
            self.dirty = false;
            return Ok(());
        };

        let file = LedgerFile {
            contracts: self.contracts.clone(),
        };

        let mut json = serde_json::to_vec_pretty(&file).map_err(|source| LedgerError::Parse {
            path: path.clone(),
            source,
        })?;
        json.push(b'\n');

        let dir = path.parent().unwrap_or_else(|| Path::new("."));

        let mut tmp = NamedTempFile::new_in(dir).map_err(|e| LedgerError::io(dir, e))?;
        tmp.write_all(&json).map_err(|e| LedgerError::io(tmp.path(), e))?;
        tmp.as_file().sync_all().map_err(|e| LedgerError::io(tmp.path(), e))?;
        tmp.persist(path).map_err(|e| LedgerError::io(path, e.error))?;

        debug!(path = %path.display(), entries = self.contracts.len(), "Flushed ledger");

        self.dirty = false;
        Ok(())
    }
}
