use std::collections::BTreeMap;

use alloy_primitives::{Address, B256};
use alloy_sol_types::{SolInterface, SolValue};
use tracing::trace;

use crate::abi::IHub::{self, IHubCalls};
use crate::RegistryError;

/// Event emitted by the [`Hub`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HubEvent {
    NewContract { name: B256, address: Address },
    NewAssetStorage { name: B256, address: Address },
    OwnershipTransferred { previous: Address, new: Address },
}

/// Address registry mapping logical names to the addresses of the modules
/// currently backing them.
///
/// General modules and asset-storage modules live in separate namespaces.
/// Every mutation is gated on the caller being the current owner.
#[derive(Clone, Debug)]
pub struct Hub {
    owner: Address,
    contracts: BTreeMap<B256, Address>,
    asset_storages: BTreeMap<B256, Address>,
    events: Vec<HubEvent>,
}

impl Hub {
    /// A Hub owned by its deployer.
    pub fn new(owner: Address) -> Self {
        Self {
            owner,
            contracts: BTreeMap::new(),
            asset_storages: BTreeMap::new(),
            events: Vec::new(),
        }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn events(&self) -> &[HubEvent] {
        &self.events
    }

    fn only_owner(&self, sender: Address) -> Result<(), RegistryError> {
        if sender != self.owner {
            return Err(RegistryError::NotOwner {
                sender,
                owner: self.owner,
            });
        }

        Ok(())
    }

    pub fn set_contract_address(
        &mut self,
        sender: Address,
        name: B256,
        address: Address,
    ) -> Result<(), RegistryError> {
        self.only_owner(sender)?;

        if address.is_zero() {
            return Err(RegistryError::ZeroAddress);
        }

        self.contracts.insert(name, address);
        self.events.push(HubEvent::NewContract { name, address });

        Ok(())
    }

    pub fn set_asset_storage_contract_address(
        &mut self,
        sender: Address,
        name: B256,
        address: Address,
    ) -> Result<(), RegistryError> {
        self.only_owner(sender)?;

        if address.is_zero() {
            return Err(RegistryError::ZeroAddress);
        }

        self.asset_storages.insert(name, address);
        self.events.push(HubEvent::NewAssetStorage { name, address });

        Ok(())
    }

    /// Resolves a general module, the zero address if unbound.
    pub fn get_contract_address(&self, name: &B256) -> Address {
        self.contracts.get(name).copied().unwrap_or_default()
    }

    /// Resolves an asset-storage module, the zero address if unbound.
    pub fn get_asset_storage_address(&self, name: &B256) -> Address {
        self.asset_storages.get(name).copied().unwrap_or_default()
    }

    pub fn is_contract(&self, name: &B256) -> bool {
        self.contracts.contains_key(name)
    }

    pub fn is_asset_storage(&self, name: &B256) -> bool {
        self.asset_storages.contains_key(name)
    }

    /// One-step ownership transfer, there is no acceptance by the new owner.
    pub fn transfer_ownership(
        &mut self,
        sender: Address,
        new_owner: Address,
    ) -> Result<(), RegistryError> {
        self.only_owner(sender)?;

        if new_owner.is_zero() {
            return Err(RegistryError::ZeroAddress);
        }

        let previous = core::mem::replace(&mut self.owner, new_owner);
        self.events.push(HubEvent::OwnershipTransferred {
            previous,
            new: new_owner,
        });

        Ok(())
    }

    /// Executes an ABI-encoded call to the Hub, returning the ABI-encoded result.
    pub fn dispatch(&mut self, sender: Address, data: &[u8]) -> Result<Vec<u8>, RegistryError> {
        let call = IHubCalls::abi_decode(data).map_err(|_| RegistryError::unknown_selector(data))?;

        trace!(?call, %sender, "Hub call");

        let output = match call {
            IHubCalls::setContractAddress(c) => {
                self.set_contract_address(sender, c.contractName, c.newContractAddress)?;
                Vec::new()
            }
            IHubCalls::setAssetStorageContractAddress(c) => {
                self.set_asset_storage_contract_address(
                    sender,
                    c.contractName,
                    c.newContractAddress,
                )?;
                Vec::new()
            }
            IHubCalls::getContractAddress(c) => {
                self.get_contract_address(&c.contractName).abi_encode()
            }
            IHubCalls::getAssetStorageAddress(c) => {
                self.get_asset_storage_address(&c.contractName).abi_encode()
            }
            IHubCalls::isContract(c) => self.is_contract(&c.contractName).abi_encode(),
            IHubCalls::isAssetStorage(c) => self.is_asset_storage(&c.contractName).abi_encode(),
            IHubCalls::owner(_) => self.owner.abi_encode(),
            IHubCalls::transferOwnership(c) => {
                self.transfer_ownership(sender, c.newOwner)?;
                Vec::new()
            }
        };

        Ok(output)
    }
}

impl IHub::IHubCalls {
    /// Whether the call mutates the registry.
    pub fn is_mutation(&self) -> bool {
        matches!(
            self,
            Self::setContractAddress(_)
                | Self::setAssetStorageContractAddress(_)
                | Self::transferOwnership(_)
        )
    }
}
