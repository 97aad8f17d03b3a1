//! EVM JSON-RPC backend.

use std::fmt;
use std::time::Duration;

use alloy::network::{EthereumWallet, TransactionBuilder};
use alloy::providers::{DynProvider, PendingTransactionError, Provider, ProviderBuilder};
use alloy::rpc::types::{TransactionReceipt, TransactionRequest};
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use alloy::transports::{RpcError, TransportErrorKind};
use alloy_primitives::{Address, Bytes};
use async_trait::async_trait;
use tracing::debug;

use crate::{Artifact, Chain, ChainError, Deployment, Receipt};

/// A chain reached over HTTP JSON-RPC, signing with a local private key.
#[derive(Clone)]
pub struct EvmChain {
    provider: DynProvider,
    deployer: Address,
    confirmations: u64,
    receipt_timeout: Option<Duration>,
}

impl EvmChain {
    /// Connects to `rpc_url`, signing transactions with `private_key` (hex, with or without `0x`).
    pub fn connect(rpc_url: &str, private_key: &str) -> Result<Self, ChainError> {
        let signer: PrivateKeySigner = private_key
            .trim()
            .parse()
            .map_err(|e| ChainError::Signer(format!("{e}")))?;

        let url: Url = rpc_url
            .parse()
            .map_err(|e| ChainError::Transport(format!("invalid RPC URL `{rpc_url}`: {e}")))?;

        let deployer = signer.address();

        let provider = ProviderBuilder::new()
            .wallet(EthereumWallet::from(signer))
            .connect_http(url)
            .erased();

        Ok(Self {
            provider,
            deployer,
            confirmations: 1,
            receipt_timeout: None,
        })
    }

    /// Number of confirmations to wait for before a transaction counts as done.
    pub fn with_confirmations(mut self, confirmations: u64) -> Self {
        self.confirmations = confirmations.max(1);
        self
    }

    pub fn with_receipt_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.receipt_timeout = timeout;
        self
    }

    async fn submit(&self, tx: TransactionRequest) -> Result<TransactionReceipt, ChainError> {
        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(rpc_error)?;

        let tx_hash = *pending.tx_hash();
        debug!(%tx_hash, "Transaction submitted, waiting for receipt");

        let receipt = pending
            .with_required_confirmations(self.confirmations)
            .with_timeout(self.receipt_timeout)
            .get_receipt()
            .await
            .map_err(|e| match e {
                PendingTransactionError::TxWatcher(_) => {
                    ChainError::Timeout { tx_hash }
                }
                e => ChainError::Transport(e.to_string()),
            })?;

        if !receipt.status() {
            return Err(ChainError::reverted(format!(
                "transaction {tx_hash} failed in block {}",
                receipt.block_number.unwrap_or_default()
            )));
        }

        Ok(receipt)
    }
}

impl fmt::Debug for EvmChain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EvmChain")
            .field("deployer", &self.deployer)
            .field("confirmations", &self.confirmations)
            .field("receipt_timeout", &self.receipt_timeout)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl Chain for EvmChain {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        self.provider.get_block_number().await.map_err(rpc_error)
    }

    async fn deploy(
        &self,
        artifact: &Artifact,
        constructor_args: Bytes,
    ) -> Result<Deployment, ChainError> {
        let code: Bytes = [artifact.bytecode.as_ref(), constructor_args.as_ref()]
            .concat()
            .into();

        let tx = TransactionRequest::default()
            .with_from(self.deployer)
            .with_deploy_code(code);

        let receipt = self.submit(tx).await?;

        let address = receipt
            .contract_address
            .ok_or_else(|| ChainError::NoContractAddress {
                contract: artifact.name.clone(),
            })?;

        Ok(Deployment {
            address,
            block_number: receipt.block_number.unwrap_or_default(),
            tx_hash: receipt.transaction_hash,
        })
    }

    async fn send(&self, to: Address, data: Bytes) -> Result<Receipt, ChainError> {
        let tx = TransactionRequest::default()
            .with_from(self.deployer)
            .with_to(to)
            .with_input(data);

        let receipt = self.submit(tx).await?;

        Ok(Receipt {
            tx_hash: receipt.transaction_hash,
            block_number: receipt.block_number.unwrap_or_default(),
            gas_used: receipt.gas_used,
        })
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let tx = TransactionRequest::default()
            .with_from(self.deployer)
            .with_to(to)
            .with_input(data);

        self.provider.call(tx).await.map_err(rpc_error)
    }
}

/// Error responses from the node are reverts (either of the call itself or
/// of the gas estimation of a transaction), everything else is transport.
fn rpc_error(e: RpcError<TransportErrorKind>) -> ChainError {
    match e {
        RpcError::ErrorResp(payload) => {
            let reason = payload
                .as_revert_data()
                .and_then(|data| alloy_sol_types::decode_revert_reason(&data))
                .unwrap_or_else(|| payload.message.to_string());

            ChainError::Reverted { reason }
        }
        e => ChainError::Transport(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // First development account of Hardhat and Anvil
    const DEV_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn deployer_is_derived_from_key() {
        let chain = EvmChain::connect("http://127.0.0.1:8545", DEV_KEY).unwrap();
        assert_eq!(
            chain.deployer(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266".parse::<Address>().unwrap()
        );
    }

    #[test]
    fn invalid_connection_parameters() {
        assert!(matches!(
            EvmChain::connect("http://127.0.0.1:8545", "0x1234"),
            Err(ChainError::Signer(_))
        ));
        assert!(matches!(
            EvmChain::connect("not a url", DEV_KEY),
            Err(ChainError::Transport(_))
        ));
    }
}
