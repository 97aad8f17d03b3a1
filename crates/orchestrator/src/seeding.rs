//! Parameter Seeding: setter calls initializing module parameters after deployment.
//!
//! A module's parameters form one [`SeedBatch`]. Batches are queued while
//! the modules are processed and applied once every module is in place, so
//! setters may refer to any module of the run.

use alloy_dyn_abi::{JsonAbiExt, Specifier};
use alloy_json_abi::JsonAbi;
use alloy_primitives::{Bytes, Keccak256, B256};
use dkg_deploy_config::Parameters;
use dkg_deploy_core_types::LogicalName;
use serde_json::Value;

use crate::error::SeedingError;

/// One setter call of a [`SeedBatch`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedCall {
    pub variable: String,
    /// Signature of the setter, eg. `setReleaseEpoch(uint256)`.
    pub setter: String,
    pub data: Bytes,
}

/// Setter calls for all parameters of one module, in the order the table lists them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SeedBatch {
    pub module: LogicalName,
    pub calls: Vec<SeedCall>,
    /// Digest over every encoded call, recorded in the Ledger once applied.
    pub digest: B256,
}

impl SeedBatch {
    /// Encodes `set<Variable>(value)` for every parameter, using the module ABI.
    pub fn build(
        module: &LogicalName,
        abi: &JsonAbi,
        parameters: &Parameters,
    ) -> Result<Self, SeedingError> {
        let calls = parameters
            .iter()
            .map(|(variable, value)| encode_setter(module, abi, variable, value))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            module: module.clone(),
            digest: digest(&calls),
            calls,
        })
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

fn encode_setter(
    module: &LogicalName,
    abi: &JsonAbi,
    variable: &str,
    value: &Value,
) -> Result<SeedCall, SeedingError> {
    let setter = setter_name(variable);

    let function = abi
        .function(&setter)
        .and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == 1))
        .ok_or_else(|| SeedingError::UnknownSetter {
            module: module.clone(),
            variable: variable.to_owned(),
            setter: setter.clone(),
        })?;

    let invalid = |reason: String| SeedingError::InvalidValue {
        module: module.clone(),
        variable: variable.to_owned(),
        reason,
    };

    let literal = literal(value).map_err(invalid)?;

    let value = function.inputs[0]
        .resolve()
        .and_then(|ty| ty.coerce_str(&literal))
        .map_err(|e| invalid(e.to_string()))?;

    let data = function
        .abi_encode_input(&[value])
        .map_err(|e| invalid(e.to_string()))?;

    Ok(SeedCall {
        variable: variable.to_owned(),
        setter: function.signature(),
        data: data.into(),
    })
}

/// `epochLength` is set by `setEpochLength`.
fn setter_name(variable: &str) -> String {
    let mut chars = variable.chars();
    match chars.next() {
        Some(first) => format!("set{}{}", first.to_uppercase(), chars.as_str()),
        None => "set".to_owned(),
    }
}

/// Textual form of a parameter value, as understood by ABI type coercion.
fn literal(value: &Value) -> Result<String, String> {
    match value {
        Value::String(s) => Ok(s.clone()),
        Value::Number(n) => Ok(n.to_string()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Array(items) => {
            let items = items.iter().map(literal).collect::<Result<Vec<_>, _>>()?;
            Ok(format!("[{}]", items.join(", ")))
        }
        Value::Null | Value::Object(_) => Err(format!("unsupported value `{value}`")),
    }
}

fn digest(calls: &[SeedCall]) -> B256 {
    let mut hasher = Keccak256::new();

    for call in calls {
        hasher.update((call.data.len() as u64).to_be_bytes());
        hasher.update(&call.data);
    }

    hasher.finalize()
}

/// Batches waiting to be applied, in enqueue order.
///
/// Enqueueing a batch for a module already queued replaces the queued batch
/// in place.
#[derive(Clone, Debug, Default)]
pub struct SeedQueue {
    batches: Vec<SeedBatch>,
}

impl SeedQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, batch: SeedBatch) {
        match self.batches.iter_mut().find(|b| b.module == batch.module) {
            Some(queued) => *queued = batch,
            None => self.batches.push(batch),
        }
    }

    pub fn len(&self) -> usize {
        self.batches.len()
    }

    pub fn is_empty(&self) -> bool {
        self.batches.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &SeedBatch> {
        self.batches.iter()
    }

    /// Removes every batch from the queue, in enqueue order.
    pub fn drain(&mut self) -> impl Iterator<Item = SeedBatch> {
        std::mem::take(&mut self.batches).into_iter()
    }
}
