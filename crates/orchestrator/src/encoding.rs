//! Coercion of module table arguments against contract ABIs.

use alloy_dyn_abi::{DynSolType, DynSolValue, FunctionExt, JsonAbiExt, Specifier};
use alloy_json_abi::{Function, Param};
use alloy_primitives::{Address, Bytes};
use dkg_deploy_chain::Artifact;
use dkg_deploy_core_types::{ArgValue, ConstructorPolicy, LogicalName, ModuleDescriptor};
use dkg_deploy_ledger::Ledger;

/// Where `@Name` and `$deployer` arguments get their addresses from.
#[derive(Copy, Clone)]
pub(crate) enum Addresses<'a> {
    /// Addresses recorded in the Ledger, this run's deployments included.
    Ledger { ledger: &'a Ledger, deployer: Address },
    /// The zero address for every reference, to type-check before deploying.
    Placeholder,
}

impl Addresses<'_> {
    fn resolve(&self, value: &ArgValue) -> Result<Address, String> {
        match (self, value) {
            (Self::Placeholder, _) => Ok(Address::ZERO),
            (Self::Ledger { deployer, .. }, ArgValue::Deployer) => Ok(*deployer),
            (Self::Ledger { ledger, .. }, ArgValue::Module(name)) => ledger
                .get(name)
                .map(|entry| entry.evm_address)
                .ok_or_else(|| format!("`{name}` is not deployed")),
            (Self::Ledger { .. }, ArgValue::Literal(literal)) => {
                Err(format!("`{literal}` is not an address reference"))
            }
        }
    }
}

fn coerce(ty: &DynSolType, value: &ArgValue, addresses: Addresses<'_>) -> Result<DynSolValue, String> {
    match value {
        ArgValue::Literal(literal) => ty
            .coerce_str(literal)
            .map_err(|e| format!("`{literal}` is not a valid {}: {e}", ty.sol_type_name())),

        ArgValue::Module(_) | ArgValue::Deployer => {
            if *ty != DynSolType::Address {
                return Err(format!(
                    "`{value}` is an address, expected {}",
                    ty.sol_type_name()
                ));
            }

            addresses.resolve(value).map(DynSolValue::Address)
        }
    }
}

fn coerce_all(
    params: &[Param],
    args: &[ArgValue],
    addresses: Addresses<'_>,
) -> Result<Vec<DynSolValue>, String> {
    if params.len() != args.len() {
        return Err(format!(
            "expected {} argument(s), got {}",
            params.len(),
            args.len()
        ));
    }

    params
        .iter()
        .zip(args)
        .map(|(param, arg)| {
            let ty = param.resolve().map_err(|e| e.to_string())?;
            coerce(&ty, arg, addresses)
        })
        .collect()
}

/// Arguments the constructor of `step` is called with.
pub(crate) fn constructor_args(step: &ModuleDescriptor) -> Vec<ArgValue> {
    match &step.constructor {
        ConstructorPolicy::PassHubAddress => vec![ArgValue::Module(LogicalName::hub())],
        ConstructorPolicy::PassExplicitArgs(args) => args.clone(),
        ConstructorPolicy::PassNothing => Vec::new(),
    }
}

/// ABI-encoded constructor arguments of `step`, to be appended to the bytecode of `artifact`.
pub(crate) fn encode_constructor(
    step: &ModuleDescriptor,
    artifact: &Artifact,
    addresses: Addresses<'_>,
) -> Result<Bytes, String> {
    let inputs = artifact
        .abi
        .constructor
        .as_ref()
        .map(|constructor| constructor.inputs.as_slice())
        .unwrap_or_default();

    let values = coerce_all(inputs, &constructor_args(step), addresses)?;
    Ok(DynSolValue::Tuple(values).abi_encode_params().into())
}

/// Parses a human-readable signature, with or without the `function` keyword,
/// eg. `setContractAddress(uint8,address)` or `owner() returns (address)`.
pub(crate) fn parse_function(signature: &str) -> Result<Function, String> {
    let signature = signature.trim();

    let result = if signature.starts_with("function ") {
        Function::parse(signature)
    } else {
        Function::parse(&format!("function {signature}"))
    };

    result.map_err(|e| format!("invalid signature `{signature}`: {e}"))
}

pub(crate) fn encode_call(
    function: &Function,
    args: &[ArgValue],
    addresses: Addresses<'_>,
) -> Result<Bytes, String> {
    let values = coerce_all(&function.inputs, args, addresses)?;

    function
        .abi_encode_input(&values)
        .map(Bytes::from)
        .map_err(|e| e.to_string())
}

/// The single value a view function is expected to return.
pub(crate) fn expected_output(
    function: &Function,
    expected: &ArgValue,
    addresses: Addresses<'_>,
) -> Result<DynSolValue, String> {
    let [output] = function.outputs.as_slice() else {
        return Err(format!(
            "`{}` must return exactly one value",
            function.signature()
        ));
    };

    let ty = output.resolve().map_err(|e| e.to_string())?;
    coerce(&ty, expected, addresses)
}

pub(crate) fn decode_output(function: &Function, data: &[u8]) -> Result<Vec<DynSolValue>, String> {
    function.abi_decode_output(data).map_err(|e| e.to_string())
}
