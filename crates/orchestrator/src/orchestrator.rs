use core::fmt;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::SystemTime;

use alloy_json_abi::Function;
use alloy_primitives::{Address, Bytes};
use alloy_sol_types::SolCall;
use dkg_deploy_chain::{
    convert_address, Artifact, ArtifactError, ArtifactStore, Chain, Funder, ManualFunder,
};
use dkg_deploy_config::ParameterTable;
use dkg_deploy_core_state_machine::Decision;
use dkg_deploy_core_types::{
    ArgValue, Band, Capability, ForwardCall, LogicalName, ModuleDescriptor, ModuleTable,
    RegistrationPolicy, StepId, DEPRECATED_SUFFIX,
};
use dkg_deploy_ledger::{FlushMode, Ledger, LedgerEntry};
use dkg_deploy_registry::abi::{IHub, IInitializable};
use tracing::{debug, error, info, warn};

use crate::call_style::{self, decode_address, owner_of, CallStyle};
use crate::encoding::{
    decode_output, encode_call, encode_constructor, expected_output, parse_function, Addresses,
};
use crate::error::OrchestratorError;
use crate::plan::{Network, Plan, PlannedStep, Selection};
use crate::report::{RunReport, StepReport};
use crate::seeding::{SeedBatch, SeedQueue};

/// A Hub binding that differs from the address recorded in the Ledger.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Mismatch {
    pub name: LogicalName,
    pub recorded: Address,
    /// Zero when the name is not bound at all.
    pub registered: Address,
}

/// Drives the module table onto one network.
///
/// A run goes through:
/// 1. planning: steps are ordered by the dependency graph and decided
///    against the Ledger;
/// 2. preflight: artifacts, constructor and forward-call arguments and
///    parameter batches are checked, and the call style is detected, all
///    before the first transaction;
/// 3. the module phase, step by step, writing the Ledger after each one;
/// 4. re-initialization of modules whose dependencies were rebound;
/// 5. parameter seeding;
/// 6. Hub ownership hand-over, on networks granting it.
pub struct Orchestrator {
    chain: Arc<dyn Chain>,
    artifacts: Arc<dyn ArtifactStore>,
    funder: Arc<dyn Funder>,
    table: ModuleTable,
    parameters: ParameterTable,
    network: Network,
    flush: FlushMode,
}

impl Orchestrator {
    pub fn new(
        chain: Arc<dyn Chain>,
        artifacts: Arc<dyn ArtifactStore>,
        table: ModuleTable,
        network: Network,
    ) -> Self {
        Self {
            chain,
            artifacts,
            funder: Arc::new(ManualFunder),
            table,
            parameters: ParameterTable::default(),
            network,
            flush: FlushMode::default(),
        }
    }

    pub fn with_parameters(mut self, parameters: ParameterTable) -> Self {
        self.parameters = parameters;
        self
    }

    pub fn with_funder(mut self, funder: Arc<dyn Funder>) -> Self {
        self.funder = funder;
        self
    }

    pub fn with_flush_mode(mut self, flush: FlushMode) -> Self {
        self.flush = flush;
        self
    }

    pub fn table(&self) -> &ModuleTable {
        &self.table
    }

    pub fn network(&self) -> &Network {
        &self.network
    }

    /// Ordered per-step decisions, from the Ledger alone.
    pub fn plan(&self, ledger: &Ledger, selection: &Selection) -> Result<Plan, OrchestratorError> {
        Plan::build(&self.table, ledger, &self.network, selection)
    }

    /// Runs the selected steps.
    ///
    /// On failure the Ledger is flushed with every module completed before
    /// the failing one, so that the next run resumes from there.
    pub async fn run(
        &self,
        ledger: &mut Ledger,
        selection: &Selection,
    ) -> Result<RunReport, OrchestratorError> {
        let plan = self.plan(ledger, selection)?;
        let prepared = self.preflight(ledger, &plan)?;
        let style = CallStyle::detect(self.chain.as_ref(), ledger).await?;

        info!(
            network = %self.network.name,
            steps = plan.steps.len(),
            deployments = plan.deployments().count(),
            ?style,
            "Starting run"
        );

        let (result, report) = {
            let mut run = Run {
                orchestrator: self,
                ledger: &mut *ledger,
                style,
                queue: SeedQueue::new(),
                rebound: BTreeSet::new(),
                deployed: BTreeSet::new(),
                report: RunReport::default(),
            };

            let result = run.execute(&plan, &prepared).await;
            (result, run.report)
        };

        match result {
            Ok(()) => {
                ledger.flush()?;
                info!(transactions = report.transactions, "Run complete");
                Ok(report)
            }
            Err(e) => {
                error!(error = %e, "Run failed");

                if let Err(flush) = ledger.flush() {
                    error!(error = %flush, "Failed to flush the ledger");
                }

                Err(e)
            }
        }
    }

    /// Compares every Ledger entry bound in the Hub with the Hub's own binding.
    pub async fn check(&self, ledger: &Ledger) -> Result<Vec<Mismatch>, OrchestratorError> {
        let hub_name = LogicalName::hub();
        let hub = ledger
            .get(&hub_name)
            .map(|entry| entry.evm_address)
            .ok_or(OrchestratorError::NotDeployed(hub_name))?;

        let mut mismatches = Vec::new();

        for (name, entry) in ledger.iter() {
            let contract_name = name.to_bytes32();

            let (data, call) = match self.registration_of(name) {
                Some(RegistrationPolicy::RegisterInHub) => (
                    IHub::getContractAddressCall { contractName: contract_name }.abi_encode(),
                    "getContractAddress(bytes32)",
                ),
                Some(RegistrationPolicy::RegisterAsAssetStorage) => (
                    IHub::getAssetStorageAddressCall { contractName: contract_name }.abi_encode(),
                    "getAssetStorageAddress(bytes32)",
                ),
                Some(RegistrationPolicy::DoNotRegister) | None => continue,
            };

            let output = self
                .chain
                .call(hub, data.into())
                .await
                .map_err(OrchestratorError::chain(name))?;

            let registered = decode_address(&output, call)?;

            if registered == entry.evm_address {
                debug!(%name, address = %registered, "Hub binding matches the ledger");
            } else {
                warn!(%name, recorded = %entry.evm_address, %registered, "Hub binding differs from the ledger");

                mismatches.push(Mismatch {
                    name: name.clone(),
                    recorded: entry.evm_address,
                    registered,
                });
            }
        }

        Ok(mismatches)
    }

    /// Where `name` is bound, per the table. Deprecated names follow their module.
    fn registration_of(&self, name: &LogicalName) -> Option<RegistrationPolicy> {
        let last = |name: &LogicalName| {
            self.table
                .steps_for(name)
                .last()
                .map(|(_, step)| step.registration)
        };

        last(name).or_else(|| {
            let base = name.as_str().strip_suffix(DEPRECATED_SUFFIX)?;
            last(&LogicalName::new(base).ok()?)
        })
    }

    /// Everything that can be checked without touching the chain.
    fn preflight(&self, ledger: &Ledger, plan: &Plan) -> Result<Prepared, OrchestratorError> {
        let companion = Capability::new(Capability::COMPANION_ACCOUNTS);
        if self.network.capabilities.grants(&companion) && self.network.companion.is_none() {
            return Err(OrchestratorError::MissingCompanion {
                network: self.network.name.clone(),
            });
        }

        let mut prepared = Prepared::default();

        // Contract each module ends up deployed from in this run
        let mut implementations: BTreeMap<&LogicalName, &str> = BTreeMap::new();

        for planned in &plan.steps {
            let Some(step) = self.table.get(planned.id) else {
                continue;
            };

            let name = &step.logical_name;

            if planned.decision().deploys() {
                let artifact = self.artifacts.artifact(&step.implementation_name)?;

                encode_constructor(step, &artifact, Addresses::Placeholder)
                    .map_err(|reason| OrchestratorError::arguments(name, reason))?;

                prepared.artifacts.insert(planned.id, artifact);
                implementations.insert(name, &step.implementation_name);
            }

            let forwards = step
                .forward_calls
                .iter()
                .map(PreparedForward::new)
                .collect::<Result<Vec<_>, _>>()
                .map_err(|reason| OrchestratorError::arguments(name, reason))?;

            if !forwards.is_empty() {
                prepared.forwards.insert(planned.id, forwards);
            }
        }

        for planned in &plan.steps {
            let name = &planned.name;

            if prepared.batches.contains_key(name) {
                continue;
            }

            let parameters =
                self.parameters
                    .parameters(&self.network.environment, name, &self.network.name);

            if parameters.is_empty() {
                continue;
            }

            let implementation = implementations
                .get(name)
                .map(|implementation| implementation.to_string())
                .or_else(|| ledger.get(name).and_then(|entry| entry.implementation.clone()))
                .unwrap_or_else(|| name.as_str().to_owned());

            let artifact = self.artifacts.artifact(&implementation)?;
            let batch = SeedBatch::build(name, &artifact.abi, &parameters)?;

            if !batch.is_empty() {
                prepared.batches.insert(name.clone(), batch);
            }
        }

        Ok(prepared)
    }
}

impl fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Orchestrator")
            .field("deployer", &self.chain.deployer())
            .field("network", &self.network)
            .field("steps", &self.table.len())
            .field("flush", &self.flush)
            .finish_non_exhaustive()
    }
}

struct PreparedCheck {
    function: Function,
    args: Vec<ArgValue>,
    expected: ArgValue,
}

struct PreparedForward {
    target: LogicalName,
    function: Function,
    args: Vec<ArgValue>,
    check: Option<PreparedCheck>,
}

impl PreparedForward {
    fn new(call: &ForwardCall) -> Result<Self, String> {
        let function = parse_function(&call.signature)?;
        encode_call(&function, &call.args, Addresses::Placeholder)?;

        let check = match &call.verify {
            Some(verify) => {
                let function = parse_function(&verify.signature)?;
                encode_call(&function, &verify.args, Addresses::Placeholder)?;
                expected_output(&function, &verify.expected, Addresses::Placeholder)?;

                Some(PreparedCheck {
                    function,
                    args: verify.args.clone(),
                    expected: verify.expected.clone(),
                })
            }
            None => None,
        };

        Ok(Self {
            target: call.target.clone(),
            function,
            args: call.args.clone(),
            check,
        })
    }
}

/// Outcome of the preflight, by step.
#[derive(Default)]
struct Prepared {
    artifacts: BTreeMap<StepId, Arc<Artifact>>,
    forwards: BTreeMap<StepId, Vec<PreparedForward>>,
    batches: BTreeMap<LogicalName, SeedBatch>,
}

struct Run<'a> {
    orchestrator: &'a Orchestrator,
    ledger: &'a mut Ledger,
    style: CallStyle,
    queue: SeedQueue,
    /// Names bound to a new address in this run.
    rebound: BTreeSet<LogicalName>,
    /// Names deployed in this run.
    deployed: BTreeSet<LogicalName>,
    report: RunReport,
}

impl Run<'_> {
    async fn execute(&mut self, plan: &Plan, prepared: &Prepared) -> Result<(), OrchestratorError> {
        let orchestrator = self.orchestrator;

        for planned in &plan.steps {
            let Some(step) = orchestrator.table.get(planned.id) else {
                continue;
            };

            self.step(step, planned, prepared).await?;
            self.checkpoint()?;
        }

        self.reinitialize_dependents().await?;
        self.checkpoint()?;

        self.seed().await?;
        self.hand_over().await
    }

    #[tracing::instrument(name = "step", skip_all, fields(step = %planned.name))]
    async fn step(
        &mut self,
        step: &ModuleDescriptor,
        planned: &PlannedStep,
        prepared: &Prepared,
    ) -> Result<(), OrchestratorError> {
        let name = &step.logical_name;
        let decision = planned.decision();

        if let Decision::Skip(reason) = decision {
            info!(%reason, "Skipping {}", step.implementation_name);
        } else {
            let artifact = prepared
                .artifacts
                .get(&planned.id)
                .ok_or_else(|| ArtifactError::NotFound(step.implementation_name.clone()))?;

            self.deploy(step, decision, artifact).await?;
        }

        // Only the step the recorded deployment came from owns its pending calls
        let band = Band::of(step.version.as_ref());
        let pending = self
            .ledger
            .get(name)
            .is_some_and(|e| e.forwards_pending && Band::of(e.version.as_ref()) == band);

        for forward in prepared.forwards.get(&planned.id).into_iter().flatten() {
            self.forward(name, forward, pending).await?;
        }

        if pending {
            self.ledger.set_forwards_pending(name, false)?;
        }

        if let Some(batch) = prepared.batches.get(name) {
            let applied = self.ledger.get(name).and_then(|e| e.parameters_digest);

            if decision.deploys() || applied != Some(batch.digest) {
                debug!(calls = batch.calls.len(), "Parameter batch queued");
                self.queue.enqueue(batch.clone());
            }
        }

        self.report.steps.push(StepReport {
            name: name.clone(),
            version: step.version,
            decision,
            address: self.ledger.get(name).map(|e| e.evm_address),
        });

        Ok(())
    }

    async fn deploy(
        &mut self,
        step: &ModuleDescriptor,
        decision: Decision,
        artifact: &Artifact,
    ) -> Result<(), OrchestratorError> {
        let chain = self.orchestrator.chain.as_ref();
        let name = &step.logical_name;

        let args = encode_constructor(step, artifact, self.addresses())
            .map_err(|reason| OrchestratorError::arguments(name, reason))?;

        let deployment = chain
            .deploy(artifact, args)
            .await
            .map_err(OrchestratorError::chain(name))?;

        self.report.transactions += 1;

        info!(
            contract = %artifact.name,
            address = %deployment.address,
            block = deployment.block_number,
            tx = %deployment.tx_hash,
            %decision,
            "Deployed"
        );

        if decision == Decision::Replace {
            if let Some(previous) = self.ledger.get(name).map(|e| e.evm_address) {
                let deprecated = name.deprecated()?;
                self.register(name, &deprecated, step.registration, previous)
                    .await?;
            }
        }

        self.register(name, name, step.registration, deployment.address)
            .await?;

        if step.initialize {
            self.initialize(name, deployment.address).await?;
        }

        let secondary = self.companion(name, deployment.address).await?;

        if decision == Decision::Replace {
            self.ledger.supersede(name)?;
        }

        let mut entry = LedgerEntry::new(deployment.address, deployment.block_number)
            .with_version(step.version)
            .with_secondary_address(secondary)
            .with_deployed_at(SystemTime::now())
            .with_forwards_pending(step.forward_calls.iter().any(|call| call.verify.is_none()));

        if step.implementation_name != name.as_str() {
            entry = entry.with_implementation(step.implementation_name.clone());
        }

        self.ledger.record(name.clone(), entry);

        if decision.rebinds() {
            self.rebound.insert(name.clone());
        }

        self.deployed.insert(name.clone());

        Ok(())
    }

    /// Binds `key` to `address` in the Hub namespace given by `registration`.
    async fn register(
        &mut self,
        step: &LogicalName,
        key: &LogicalName,
        registration: RegistrationPolicy,
        address: Address,
    ) -> Result<(), OrchestratorError> {
        let contract_name = key.to_bytes32();

        let data = match registration {
            RegistrationPolicy::RegisterInHub => IHub::setContractAddressCall {
                contractName: contract_name,
                newContractAddress: address,
            }
            .abi_encode(),
            RegistrationPolicy::RegisterAsAssetStorage => IHub::setAssetStorageContractAddressCall {
                contractName: contract_name,
                newContractAddress: address,
            }
            .abi_encode(),
            RegistrationPolicy::DoNotRegister => return Ok(()),
        };

        let hub = self.hub_address()?;
        self.send_gated(step, hub, data.into()).await?;

        info!(name = %key, %address, ?registration, "Bound in Hub");
        Ok(())
    }

    async fn initialize(&mut self, step: &LogicalName, address: Address) -> Result<(), OrchestratorError> {
        let data = IInitializable::initializeCall {}.abi_encode();
        self.send_gated(step, address, data.into()).await?;

        info!(module = %step, %address, "Initialized");
        Ok(())
    }

    /// Derives, and funds, the companion account of a new deployment.
    async fn companion(
        &mut self,
        step: &LogicalName,
        address: Address,
    ) -> Result<Option<String>, OrchestratorError> {
        let Some(companion) = self.orchestrator.network.companion else {
            return Ok(None);
        };

        let secondary = convert_address(address, companion.ss58_prefix);
        debug!(%secondary, "Companion account derived");

        if companion.funding_amount > 0 {
            self.orchestrator
                .funder
                .fund(&secondary, companion.funding_amount)
                .await
                .map_err(OrchestratorError::chain(step))?;
        }

        Ok(Some(secondary))
    }

    /// Issues a forward call of `step`. A call with a view check is issued
    /// whenever the check fails, one without only while the step's forward
    /// calls are `pending` in the Ledger.
    async fn forward(
        &mut self,
        step: &LogicalName,
        forward: &PreparedForward,
        pending: bool,
    ) -> Result<(), OrchestratorError> {
        let target = self
            .ledger
            .get(&forward.target)
            .map(|e| e.evm_address)
            .ok_or_else(|| OrchestratorError::NotDeployed(forward.target.clone()))?;

        let data = encode_call(&forward.function, &forward.args, self.addresses())
            .map_err(|reason| OrchestratorError::arguments(step, reason))?;

        let needed = match &forward.check {
            Some(check) => !self.verify(step, target, check).await?,
            None => pending,
        };

        let signature = forward.function.signature();

        if !needed {
            debug!(target = %forward.target, call = %signature, "Forward call already in effect");
            return Ok(());
        }

        self.send_gated(step, target, data).await?;
        self.report.forward_calls += 1;

        info!(target = %forward.target, call = %signature, "Forward call issued");
        Ok(())
    }

    /// Whether the view call of `check` returns the expected value.
    async fn verify(
        &self,
        step: &LogicalName,
        target: Address,
        check: &PreparedCheck,
    ) -> Result<bool, OrchestratorError> {
        let addresses = self.addresses();

        let data = encode_call(&check.function, &check.args, addresses)
            .map_err(|reason| OrchestratorError::arguments(step, reason))?;

        let expected = expected_output(&check.function, &check.expected, addresses)
            .map_err(|reason| OrchestratorError::arguments(step, reason))?;

        let output = self
            .orchestrator
            .chain
            .call(target, data)
            .await
            .map_err(OrchestratorError::chain(step))?;

        let values =
            decode_output(&check.function, &output).map_err(|reason| OrchestratorError::Decode {
                call: check.function.signature(),
                reason,
            })?;

        Ok(values.first() == Some(&expected))
    }

    /// Re-initializes recorded modules, not deployed in this run, that depend
    /// on a name rebound in this run.
    async fn reinitialize_dependents(&mut self) -> Result<(), OrchestratorError> {
        if self.rebound.is_empty() {
            return Ok(());
        }

        let table = &self.orchestrator.table;
        let mut seen = BTreeSet::new();

        for (_, step) in table.iter() {
            let name = &step.logical_name;

            if !seen.insert(name) || self.deployed.contains(name) {
                continue;
            }

            let Some(entry) = self.ledger.get(name) else {
                continue;
            };

            let address = entry.evm_address;
            let band = Band::of(entry.version.as_ref());

            // The step the recorded deployment came from
            let installed = table
                .steps_for(name)
                .map(|(_, s)| s)
                .filter(|s| Band::of(s.version.as_ref()) == band)
                .last()
                .unwrap_or(step);

            if !installed.initialize {
                continue;
            }

            let Some(dependency) = installed
                .effective_dependencies()
                .into_iter()
                .find(|dependency| self.rebound.contains(dependency))
            else {
                continue;
            };

            info!(module = %name, %dependency, "Dependency was rebound, re-initializing");

            self.initialize(name, address).await?;
            self.report.reinitialized.push(name.clone());
        }

        Ok(())
    }

    async fn seed(&mut self) -> Result<(), OrchestratorError> {
        let batches: Vec<SeedBatch> = self.queue.drain().collect();

        for batch in batches {
            let module = &batch.module;

            let address = self
                .ledger
                .get(module)
                .map(|e| e.evm_address)
                .ok_or_else(|| OrchestratorError::NotDeployed(module.clone()))?;

            for call in &batch.calls {
                self.send_gated(module, address, call.data.clone()).await?;
                info!(%module, variable = %call.variable, setter = %call.setter, "Parameter set");
            }

            self.ledger.set_parameters_digest(module, batch.digest)?;
            self.report.seeded.push(module.clone());
            self.checkpoint()?;
        }

        Ok(())
    }

    /// Hands the Hub over to the Hub Controller on networks granting it.
    async fn hand_over(&mut self) -> Result<(), OrchestratorError> {
        let orchestrator = self.orchestrator;
        let capability = Capability::new(Capability::TRANSFER_HUB_OWNERSHIP);

        if !orchestrator.network.capabilities.grants(&capability) || self.style != CallStyle::Direct
        {
            return Ok(());
        }

        let hub_name = LogicalName::hub();
        let address_of = |name: &LogicalName| self.ledger.get(name).map(|e| e.evm_address);

        let (Some(hub), Some(controller)) = (
            address_of(&hub_name),
            address_of(&LogicalName::hub_controller()),
        ) else {
            warn!("No Hub Controller recorded, the Hub stays with the deployer");
            return Ok(());
        };

        let chain = orchestrator.chain.as_ref();

        if owner_of(chain, hub, &hub_name).await? != chain.deployer() {
            return Ok(());
        }

        let data = IHub::transferOwnershipCall {
            newOwner: controller,
        }
        .abi_encode();

        chain
            .send(hub, data.into())
            .await
            .map_err(OrchestratorError::chain(&hub_name))?;

        self.report.transactions += 1;
        self.report.ownership_transferred = true;
        self.style = CallStyle::Forwarded { controller };

        info!(%hub, %controller, "Hub ownership transferred to the Hub Controller");
        Ok(())
    }

    async fn send_gated(
        &mut self,
        step: &LogicalName,
        target: Address,
        data: Bytes,
    ) -> Result<(), OrchestratorError> {
        call_style::send_gated(self.orchestrator.chain.as_ref(), self.style, target, data)
            .await
            .map_err(OrchestratorError::chain(step))?;

        self.report.transactions += 1;
        Ok(())
    }

    fn hub_address(&self) -> Result<Address, OrchestratorError> {
        self.ledger
            .get(&LogicalName::hub())
            .map(|e| e.evm_address)
            .ok_or_else(|| OrchestratorError::NotDeployed(LogicalName::hub()))
    }

    fn addresses(&self) -> Addresses<'_> {
        Addresses::Ledger {
            ledger: &*self.ledger,
            deployer: self.orchestrator.chain.deployer(),
        }
    }

    fn checkpoint(&mut self) -> Result<(), OrchestratorError> {
        if self.orchestrator.flush == FlushMode::PerModule {
            self.ledger.flush()?;
        }

        Ok(())
    }
}
