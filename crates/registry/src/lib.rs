//! The on-chain address registry ("Hub") and its owner proxy ("Hub Controller").
//!
//! [`abi`] holds the Solidity interfaces used to talk to the deployed contracts.
//! [`Hub`] and [`HubController`] implement the same semantics in Rust, with the
//! caller passed explicitly to every mutation; they back the in-memory chain
//! used to exercise the orchestrator.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::panic))]

use alloy_primitives::Address;
use thiserror::Error;

pub mod abi;

mod controller;
mod hub;

pub use controller::{ControllerAction, HubController};
pub use hub::{Hub, HubEvent};

/// Reasons a registry call reverts.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum RegistryError {
    #[error("Ownable: caller {sender} is not the owner {owner}")]
    NotOwner { sender: Address, owner: Address },

    #[error("Address cannot be zero")]
    ZeroAddress,

    #[error("Unknown function selector 0x{}", alloy_primitives::hex::encode(.0))]
    UnknownSelector([u8; 4]),
}

impl RegistryError {
    pub(crate) fn unknown_selector(data: &[u8]) -> Self {
        let mut selector = [0u8; 4];
        let len = data.len().min(4);
        selector[..len].copy_from_slice(&data[..len]);
        Self::UnknownSelector(selector)
    }
}
