//! Deployment Ledger: the persisted per-network mapping from logical module
//! name to its on-chain address, version and deployment metadata.
//!
//! The Ledger is read before every deployment decision and written after
//! every successful one.
//!
//! # Format on disk
//!
//! ```json
//! {
//!   "contracts": {
//!     "Hub": { "evmAddress": "0x…", "version": "1.0.0", "blockNumber": 1 }
//!   }
//! }
//! ```

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::panic))]

use std::io;
use std::path::{Path, PathBuf};

use dkg_deploy_core_types::{LogicalName, NameError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

mod entry;
mod ledger;

pub use entry::LedgerEntry;
pub use ledger::Ledger;

/// When the orchestrator writes the Ledger back to disk.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FlushMode {
    /// After every completed module and seeding batch.
    #[default]
    PerModule,
    /// Once, at the end of the run (and on failure).
    EndOfRun,
}

#[derive(Debug, Error)]
pub enum LedgerError {
    #[error("Ledger `{}` is already in use by another run", .path.display())]
    Locked { path: PathBuf },

    #[error("I/O error on `{}`: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Invalid ledger file `{}`: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Module `{0}` is not recorded in the ledger")]
    UnknownModule(LogicalName),

    #[error(transparent)]
    Name(#[from] NameError),
}

impl LedgerError {
    pub(crate) fn io(path: impl AsRef<Path>, source: io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_owned(),
            source,
        }
    }
}
