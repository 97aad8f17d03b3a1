//! Deterministic in-process chain.
//!
//! Contracts are executed by Rust models instead of EVM bytecode:
//! - artifacts named `Hub` and `HubController` run [`Hub`] and [`HubController`];
//! - any other artifact runs a [`Module`] stub driven by its ABI: setters
//!   (`setX(k.., v)`) store `v` under `(X, k..)`, views (`getX(k..)` or `x(k..)`)
//!   read it back, `initialize()` is counted, and every non-view call is gated
//!   on the caller being the owner of the Hub the module was constructed with.
//!
//! Every transaction is mined in its own block. A reverted transaction leaves
//! no trace: state changes are rolled back and neither the nonce nor the
//! block number move.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use alloy_dyn_abi::{DynSolValue, JsonAbiExt};
use alloy_json_abi::{Function, JsonAbi, StateMutability};
use alloy_primitives::{keccak256, Address, Bytes, B256};
use alloy_sol_types::SolValue;
use async_trait::async_trait;
use dkg_deploy_registry::{ControllerAction, Hub, HubController};
use tracing::trace;

use crate::{Artifact, Chain, ChainError, Deployment, Receipt};

const HUB_CONTRACT: &str = "Hub";
const HUB_CONTROLLER_CONTRACT: &str = "HubController";
const HUB_ADDRESS_INPUT: &str = "hubAddress";
const MAX_CALL_DEPTH: usize = 8;
const GAS_PER_TX: u64 = 21_000;

/// A transaction mined by the [`MemoryChain`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Transaction {
    pub from: Address,
    /// `None` for contract creations.
    pub to: Option<Address>,
    pub data: Bytes,
    pub block_number: u64,
}

/// A non-view call executed by a [`Module`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecordedCall {
    pub sender: Address,
    pub signature: String,
    pub data: Bytes,
}

/// ABI-driven stand-in for an arbitrary module contract.
#[derive(Clone, Debug)]
pub struct Module {
    name: String,
    abi: Arc<JsonAbi>,
    creator: Address,
    hub: Option<Address>,
    storage: BTreeMap<(String, Vec<u8>), Vec<u8>>,
    initialized: u32,
    calls: Vec<RecordedCall>,
}

impl Module {
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Hub address passed to the constructor, if any.
    pub fn hub(&self) -> Option<Address> {
        self.hub
    }

    /// Number of successful `initialize()` calls.
    pub fn initialized(&self) -> u32 {
        self.initialized
    }

    pub fn calls(&self) -> &[RecordedCall] {
        &self.calls
    }

    fn execute(
        &mut self,
        sender: Address,
        hub_owner: Option<Address>,
        data: &[u8],
    ) -> Result<Vec<u8>, String> {
        let function = self.function(data)?;

        let args = function
            .abi_decode_input(&data[4..])
            .map_err(|e| format!("invalid arguments to {}: {e}", function.name))?;

        if matches!(
            function.state_mutability,
            StateMutability::View | StateMutability::Pure
        ) {
            return Ok(self.read(&function, &args));
        }

        let owner = hub_owner.unwrap_or(self.creator);
        if sender != owner {
            return Err(format!(
                "{}: Fn can only be used by hub owner ({sender} is not {owner})",
                self.name
            ));
        }

        self.calls.push(RecordedCall {
            sender,
            signature: function.signature(),
            data: Bytes::copy_from_slice(data),
        });

        if function.name == "initialize" {
            self.initialized += 1;
            return Ok(Vec::new());
        }

        if let Some(field) = function.name.strip_prefix("set") {
            if let Some((value, keys)) = args.split_last() {
                let key = (field.to_owned(), encode_keys(keys));
                let value = DynSolValue::Tuple(vec![value.clone()]).abi_encode_params();
                self.storage.insert(key, value);
            }
        }

        Ok(Vec::new())
    }

    fn function(&self, data: &[u8]) -> Result<Function, String> {
        let selector = data
            .get(..4)
            .ok_or_else(|| format!("{}: missing function selector", self.name))?;

        self.abi
            .functions()
            .find(|f| f.selector().as_slice() == selector)
            .cloned()
            .ok_or_else(|| {
                format!(
                    "{}: function selector 0x{} was not recognized",
                    self.name,
                    alloy_primitives::hex::encode(selector)
                )
            })
    }

    fn read(&self, function: &Function, args: &[DynSolValue]) -> Vec<u8> {
        let field = match function.name.strip_prefix("get") {
            Some(field) if !field.is_empty() => field.to_owned(),
            _ => capitalize(&function.name),
        };

        self.storage
            .get(&(field, encode_keys(args)))
            .cloned()
            .unwrap_or_else(|| vec![0; 32 * function.outputs.len()])
    }
}

fn encode_keys(keys: &[DynSolValue]) -> Vec<u8> {
    DynSolValue::Tuple(keys.to_vec()).abi_encode_params()
}

fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Clone, Debug)]
enum Contract {
    Hub(Hub),
    Controller(HubController),
    Module(Module),
}

enum Outcome {
    Done(Vec<u8>),
    Forward { target: Address, data: Bytes },
}

#[derive(Clone, Debug, Default)]
struct World {
    block: u64,
    nonces: BTreeMap<Address, u64>,
    contracts: BTreeMap<Address, Contract>,
}

impl World {
    fn nonce(&self, account: &Address) -> u64 {
        self.nonces.get(account).copied().unwrap_or_default()
    }

    fn mine(&mut self, from: Address) -> (u64, B256) {
        let nonce = self.nonce(&from);
        self.nonces.insert(from, nonce + 1);
        self.block += 1;

        let tx_hash = keccak256([from.as_slice(), &nonce.to_be_bytes()].concat());
        (self.block, tx_hash)
    }

    fn hub_owner(&self, hub: Option<Address>) -> Option<Address> {
        match hub.and_then(|hub| self.contracts.get(&hub)) {
            Some(Contract::Hub(hub)) => Some(hub.owner()),
            _ => None,
        }
    }

    fn execute(
        &mut self,
        sender: Address,
        to: Address,
        data: &[u8],
        depth: usize,
    ) -> Result<Vec<u8>, String> {
        if depth > MAX_CALL_DEPTH {
            return Err("call depth exceeded".to_owned());
        }

        let Some(mut contract) = self.contracts.remove(&to) else {
            return Err(format!("call to non-contract account {to}"));
        };

        let outcome = match &mut contract {
            Contract::Hub(hub) => hub
                .dispatch(sender, data)
                .map(Outcome::Done)
                .map_err(|e| e.to_string()),

            Contract::Controller(controller) => controller
                .dispatch(sender, data)
                .map(|action| match action {
                    ControllerAction::Done(output) => Outcome::Done(output),
                    ControllerAction::Forward { target, data } => {
                        Outcome::Forward { target, data }
                    }
                })
                .map_err(|e| e.to_string()),

            Contract::Module(module) => {
                let owner = self.hub_owner(module.hub);
                module.execute(sender, owner, data).map(Outcome::Done)
            }
        };

        self.contracts.insert(to, contract);

        match outcome? {
            Outcome::Done(output) => Ok(output),
            Outcome::Forward { target, data } => {
                trace!(controller = %to, %target, "Forwarding call");
                let output = self.execute(to, target, &data, depth + 1)?;
                Ok(Bytes::from(output).abi_encode())
            }
        }
    }
}

#[derive(Debug, Default)]
struct Failures {
    deployments: BTreeSet<String>,
    calls: BTreeSet<(Address, [u8; 4])>,
}

#[derive(Debug, Default)]
struct Inner {
    world: World,
    transactions: Vec<Transaction>,
    failures: Failures,
}

/// Deterministic in-process [`Chain`], see the [module documentation](self).
#[derive(Debug)]
pub struct MemoryChain {
    deployer: Address,
    inner: Mutex<Inner>,
}

impl MemoryChain {
    pub fn new(deployer: Address) -> Self {
        Self {
            deployer,
            inner: Mutex::new(Inner::default()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Every mined transaction, in order.
    pub fn transactions(&self) -> Vec<Transaction> {
        self.lock().transactions.clone()
    }

    pub fn transaction_count(&self) -> usize {
        self.lock().transactions.len()
    }

    /// Makes every deployment of the contract `name` revert.
    pub fn fail_deployments_of(&self, name: &str) {
        self.lock().failures.deployments.insert(name.to_owned());
    }

    /// Makes every transaction to `to` calling `selector` revert.
    pub fn fail_calls(&self, to: Address, selector: [u8; 4]) {
        self.lock().failures.calls.insert((to, selector));
    }

    pub fn clear_failures(&self) {
        self.lock().failures = Failures::default();
    }

    /// Executes a transaction from an arbitrary account, eg. a governance multisig.
    pub fn send_from(&self, from: Address, to: Address, data: Bytes) -> Result<Receipt, ChainError> {
        let mut inner = self.lock();

        let failing = data
            .get(..4)
            .and_then(|s| <[u8; 4]>::try_from(s).ok())
            .is_some_and(|selector| inner.failures.calls.contains(&(to, selector)));

        if failing {
            return Err(ChainError::reverted(format!("injected failure calling {to}")));
        }

        let mut world = inner.world.clone();
        world
            .execute(from, to, &data, 0)
            .map_err(ChainError::reverted)?;

        let (block_number, tx_hash) = world.mine(from);
        inner.world = world;
        inner.transactions.push(Transaction {
            from,
            to: Some(to),
            data,
            block_number,
        });

        Ok(Receipt {
            tx_hash,
            block_number,
            gas_used: GAS_PER_TX,
        })
    }

    pub fn hub(&self, address: Address) -> Option<Hub> {
        match self.lock().world.contracts.get(&address) {
            Some(Contract::Hub(hub)) => Some(hub.clone()),
            _ => None,
        }
    }

    pub fn controller(&self, address: Address) -> Option<HubController> {
        match self.lock().world.contracts.get(&address) {
            Some(Contract::Controller(controller)) => Some(controller.clone()),
            _ => None,
        }
    }

    pub fn module(&self, address: Address) -> Option<Module> {
        match self.lock().world.contracts.get(&address) {
            Some(Contract::Module(module)) => Some(module.clone()),
            _ => None,
        }
    }

    /// Whether a contract lives at `address`.
    pub fn is_contract(&self, address: Address) -> bool {
        self.lock().world.contracts.contains_key(&address)
    }

    fn instantiate(&self, artifact: &Artifact, args: &[u8]) -> Result<Contract, String> {
        let hub = constructor_hub(artifact, args)?;

        let contract = match artifact.name.as_str() {
            HUB_CONTRACT => Contract::Hub(Hub::new(self.deployer)),
            HUB_CONTROLLER_CONTRACT => Contract::Controller(HubController::new(
                self.deployer,
                hub.unwrap_or_default(),
            )),
            _ => Contract::Module(Module {
                name: artifact.name.clone(),
                abi: Arc::new(artifact.abi.clone()),
                creator: self.deployer,
                hub,
                storage: BTreeMap::new(),
                initialized: 0,
                calls: Vec::new(),
            }),
        };

        Ok(contract)
    }
}

/// Decodes the constructor arguments, returning the `hubAddress` argument if any.
fn constructor_hub(artifact: &Artifact, args: &[u8]) -> Result<Option<Address>, String> {
    let Some(constructor) = &artifact.abi.constructor else {
        if args.is_empty() {
            return Ok(None);
        }

        return Err(format!("{} takes no constructor arguments", artifact.name));
    };

    let values = constructor
        .abi_decode_input(args)
        .map_err(|e| format!("invalid constructor arguments for {}: {e}", artifact.name))?;

    let hub = constructor
        .inputs
        .iter()
        .zip(&values)
        .find(|(input, _)| input.name == HUB_ADDRESS_INPUT)
        .and_then(|(_, value)| value.as_address());

    Ok(hub)
}

#[async_trait]
impl Chain for MemoryChain {
    fn deployer(&self) -> Address {
        self.deployer
    }

    async fn block_number(&self) -> Result<u64, ChainError> {
        Ok(self.lock().world.block)
    }

    async fn deploy(
        &self,
        artifact: &Artifact,
        constructor_args: Bytes,
    ) -> Result<Deployment, ChainError> {
        if self.lock().failures.deployments.contains(&artifact.name) {
            return Err(ChainError::reverted(format!(
                "injected failure deploying {}",
                artifact.name
            )));
        }

        let contract = self
            .instantiate(artifact, &constructor_args)
            .map_err(ChainError::reverted)?;

        let mut inner = self.lock();

        let address = self.deployer.create(inner.world.nonce(&self.deployer));
        let (block_number, tx_hash) = inner.world.mine(self.deployer);
        inner.world.contracts.insert(address, contract);

        let code = [artifact.bytecode.as_ref(), constructor_args.as_ref()].concat();
        inner.transactions.push(Transaction {
            from: self.deployer,
            to: None,
            data: code.into(),
            block_number,
        });

        trace!(name = %artifact.name, %address, block_number, "Contract deployed");

        Ok(Deployment {
            address,
            block_number,
            tx_hash,
        })
    }

    async fn send(&self, to: Address, data: Bytes) -> Result<Receipt, ChainError> {
        self.send_from(self.deployer, to, data)
    }

    async fn call(&self, to: Address, data: Bytes) -> Result<Bytes, ChainError> {
        let mut world = self.lock().world.clone();

        world
            .execute(self.deployer, to, &data, 0)
            .map(Bytes::from)
            .map_err(ChainError::reverted)
    }
}
