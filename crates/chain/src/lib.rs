//! Access to the chains the orchestrator deploys to.
//!
//! [`Chain`] is the only way the orchestrator touches a chain: one transaction
//! at a time, each awaited until its receipt is available.
//!
//! - [`evm::EvmChain`] talks JSON-RPC to a node through an `alloy` provider
//!   signing with a local private key.
//! - [`memory::MemoryChain`] is a deterministic in-process chain executing the
//!   registry models and ABI-driven module stubs, used in tests.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::panic))]

use alloy_primitives::{Address, Bytes, B256};
use async_trait::async_trait;
use thiserror::Error;

pub mod artifact;
pub mod companion;
pub mod evm;
pub mod memory;

pub use artifact::{Artifact, ArtifactDir, ArtifactError, ArtifactStore, StaticArtifacts};
pub use companion::{convert_address, Funder, ManualFunder};

/// A contract creation that made it on chain.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Deployment {
    pub address: Address,
    pub block_number: u64,
    pub tx_hash: B256,
}

/// Receipt of a successful transaction.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct Receipt {
    pub tx_hash: B256,
    pub block_number: u64,
    pub gas_used: u64,
}

#[derive(Debug, Error)]
pub enum ChainError {
    /// The transaction or call reverted.
    #[error("Execution reverted: {reason}")]
    Reverted { reason: String },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Invalid signer: {0}")]
    Signer(String),

    #[error("Deployment of `{contract}` returned no contract address")]
    NoContractAddress { contract: String },

    #[error("Timed out waiting for receipt of {tx_hash}")]
    Timeout { tx_hash: B256 },
}

impl ChainError {
    pub fn reverted(reason: impl Into<String>) -> Self {
        Self::Reverted {
            reason: reason.into(),
        }
    }

    pub fn is_revert(&self) -> bool {
        matches!(self, Self::Reverted { .. })
    }
}

/// A chain the orchestrator can deploy to, call into and read from.
///
/// Every method that submits a transaction only returns once the transaction
/// has been included (and confirmed, if the backend is configured to wait
/// for confirmations).
#[async_trait]
pub trait Chain: Send + Sync {
    /// Account signing every transaction.
    fn deployer(&self) -> Address;

    async fn block_number(&self) -> Result<u64, ChainError>;

    /// Deploys `artifact` with the ABI-encoded `constructor_args` appended to its bytecode.
    async fn deploy(
        &self,
        artifact: &Artifact,
        constructor_args: Bytes,
    ) -> Result<Deployment, ChainError>;

    /// Sends a transaction calling `to` with `data`.
    async fn send(&self, to: Address, data: Bytes) -> Result<Receipt, ChainError>;

    /// Executes a read-only call against the latest state.
    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError>;
}
