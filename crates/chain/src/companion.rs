//! Companion (Substrate-based) chain utilities.
//!
//! Modules deployed on an EVM parachain have an equivalent account on the
//! Substrate side which must hold funds before the contract can be used from
//! there. The account is derived from the EVM address and SS58-encoded.

use alloy_primitives::Address;
use async_trait::async_trait;
use blake2::digest::consts::U32;
use blake2::{Blake2b, Blake2b512, Digest};
use tracing::warn;

use crate::ChainError;

type Blake2b256 = Blake2b<U32>;

const EVM_ACCOUNT_PREFIX: &[u8] = b"evm:";
const SS58_CHECKSUM_PREFIX: &[u8] = b"SS58PRE";

/// Substrate account id of an EVM address: `blake2b-256("evm:" ++ address)`.
pub fn account_id(evm: Address) -> [u8; 32] {
    let mut hasher = Blake2b256::new();
    hasher.update(EVM_ACCOUNT_PREFIX);
    hasher.update(evm.as_slice());
    hasher.finalize().into()
}

/// SS58-encoded companion account of an EVM address for the network `ss58_prefix`.
pub fn convert_address(evm: Address, ss58_prefix: u16) -> String {
    ss58_encode(&account_id(evm), ss58_prefix)
}

fn ss58_encode(account: &[u8; 32], prefix: u16) -> String {
    let mut body = Vec::with_capacity(2 + 32 + 2);

    match prefix {
        0..=63 => body.push(prefix as u8),
        _ => {
            let ident = prefix & 0b0011_1111_1111_1111;
            let first = (((ident & 0b0000_0000_1111_1100) >> 2) as u8) | 0b0100_0000;
            let second = ((ident >> 8) as u8) | (((ident & 0b0000_0000_0000_0011) as u8) << 6);
            body.extend([first, second]);
        }
    }

    body.extend_from_slice(account);

    let mut hasher = Blake2b512::new();
    hasher.update(SS58_CHECKSUM_PREFIX);
    hasher.update(&body);
    let checksum = hasher.finalize();

    body.extend_from_slice(&checksum[..2]);
    bs58::encode(body).into_string()
}

/// Transfers funds to companion-chain accounts.
#[async_trait]
pub trait Funder: Send + Sync {
    async fn fund(&self, secondary: &str, amount: u128) -> Result<(), ChainError>;
}

/// Leaves funding to the operator, logging every transfer that is due.
#[derive(Copy, Clone, Debug, Default)]
pub struct ManualFunder;

#[async_trait]
impl Funder for ManualFunder {
    async fn fund(&self, secondary: &str, amount: u128) -> Result<(), ChainError> {
        warn!(account = %secondary, %amount, "Companion account must be funded manually");
        Ok(())
    }
}
