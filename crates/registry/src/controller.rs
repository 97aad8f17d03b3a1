use alloy_primitives::{Address, Bytes};
use alloy_sol_types::{SolInterface, SolValue};

use crate::abi::IHubController::IHubControllerCalls;
use crate::RegistryError;

/// What the Hub Controller does with an incoming call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ControllerAction {
    /// Execute `data` against `target` with the controller as the caller,
    /// the result of that call is the result of `forwardCall`.
    Forward { target: Address, data: Bytes },
    /// The call completed with the given ABI-encoded output.
    Done(Vec<u8>),
}

/// Owner proxy that the Hub is handed over to once the system is live.
///
/// Configuration calls into the Hub and into modules are then issued
/// through [`HubController::forward_call`], so they all originate from a
/// single governed identity.
#[derive(Clone, Debug)]
pub struct HubController {
    owner: Address,
    hub: Address,
}

impl HubController {
    pub fn new(owner: Address, hub: Address) -> Self {
        Self { owner, hub }
    }

    pub fn owner(&self) -> Address {
        self.owner
    }

    pub fn hub(&self) -> Address {
        self.hub
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

    /// Authorizes forwarding `data` to `target`.
    pub fn forward_call(
        &self,
        sender: Address,
        target: Address,
        data: Bytes,
    ) -> Result<ControllerAction, RegistryError> {
        self.only_owner(sender)?;

        if target.is_zero() {
            return Err(RegistryError::ZeroAddress);
        }

        Ok(ControllerAction::Forward { target, data })
    }

    pub fn transfer_ownership(
        &mut self,
        sender: Address,
        new_owner: Address,
    ) -> Result<(), RegistryError> {
        self.only_owner(sender)?;

        if new_owner.is_zero() {
            return Err(RegistryError::ZeroAddress);
        }

        self.owner = new_owner;
        Ok(())
    }

    /// Decodes and executes an ABI-encoded call to the controller.
    pub fn dispatch(
        &mut self,
        sender: Address,
        data: &[u8],
    ) -> Result<ControllerAction, RegistryError> {
        let call = IHubControllerCalls::abi_decode(data)
            .map_err(|_| RegistryError::unknown_selector(data))?;

        match call {
            IHubControllerCalls::forwardCall(c) => self.forward_call(sender, c.target, c.data),
            IHubControllerCalls::owner(_) => Ok(ControllerAction::Done(self.owner.abi_encode())),
            IHubControllerCalls::transferOwnership(c) => {
                self.transfer_ownership(sender, c.newOwner)?;
                Ok(ControllerAction::Done(Vec::new()))
            }
        }
    }
}
