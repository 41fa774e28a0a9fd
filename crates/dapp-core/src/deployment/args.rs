//! Constructor argument expansion and encoding.

use super::DeployError;
use alloy_dyn_abi::{DynSolType, DynSolValue, JsonAbiExt, Specifier};
use alloy_json_abi::{Function, JsonAbi, Param};
use dapp_types::{Address, Bytes};
use std::collections::HashMap;

const DEPLOYER_PLACEHOLDER: &str = "{deployer}";

/// Replaces `{deployer}` and `{ContractName}` placeholders with addresses.
pub fn expand_args(
	contract: &str,
	args: &[String],
	deployer: Address,
	deployed: &HashMap<String, Address>,
) -> Result<Vec<String>, DeployError> {
	args.iter()
		.map(|arg| {
			let trimmed = arg.trim();
			if trimmed == DEPLOYER_PLACEHOLDER {
				return Ok(deployer.to_string());
			}
			match trimmed
				.strip_prefix('{')
				.and_then(|rest| rest.strip_suffix('}'))
			{
				Some(name) => deployed
					.get(name)
					.map(|address| address.to_string())
					.ok_or_else(|| DeployError::UnresolvedPlaceholder {
						contract: contract.to_string(),
						placeholder: trimmed.to_string(),
					}),
				None => Ok(arg.clone()),
			}
		})
		.collect()
}

/// ABI-encodes constructor arguments against the artifact's constructor.
///
/// Returns empty bytes for a contract without a constructor and no arguments.
pub fn encode_constructor_args(
	contract: &str,
	abi: &JsonAbi,
	args: &[String],
) -> Result<Bytes, DeployError> {
	let Some(constructor) = abi.constructor() else {
		if args.is_empty() {
			return Ok(Bytes::new());
		}
		return Err(DeployError::InvalidArguments {
			contract: contract.to_string(),
			reason: format!("no constructor but {} arguments given", args.len()),
		});
	};

	if constructor.inputs.len() != args.len() {
		return Err(DeployError::InvalidArguments {
			contract: contract.to_string(),
			reason: format!(
				"constructor takes {} arguments, {} given",
				constructor.inputs.len(),
				args.len()
			),
		});
	}

	let values = coerce_args(contract, &constructor.inputs, args)?;
	let encoded = constructor
		.abi_encode_input(&values)
		.map_err(|e| DeployError::InvalidArguments {
			contract: contract.to_string(),
			reason: e.to_string(),
		})?;
	Ok(Bytes::from(encoded))
}

/// The overload of `function` taking `arity` arguments.
pub fn find_function<'a>(
	contract: &str,
	abi: &'a JsonAbi,
	function: &str,
	arity: usize,
) -> Result<&'a Function, DeployError> {
	abi.function(function)
		.and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == arity))
		.ok_or_else(|| DeployError::InvalidArguments {
			contract: contract.to_string(),
			reason: format!("no function {} taking {} arguments", function, arity),
		})
}

/// ABI-encodes a call to `function`, selector included.
pub fn encode_call(
	contract: &str,
	abi: &JsonAbi,
	function: &str,
	args: &[String],
) -> Result<Bytes, DeployError> {
	let function = find_function(contract, abi, function, args.len())?;
	let values = coerce_args(contract, &function.inputs, args)?;
	let encoded = function
		.abi_encode_input(&values)
		.map_err(|e| DeployError::InvalidArguments {
			contract: contract.to_string(),
			reason: e.to_string(),
		})?;
	Ok(Bytes::from(encoded))
}

fn coerce_args(
	contract: &str,
	inputs: &[Param],
	args: &[String],
) -> Result<Vec<DynSolValue>, DeployError> {
	inputs
		.iter()
		.zip(args)
		.map(|(param, arg)| {
			let ty: DynSolType = param.resolve().map_err(|e| DeployError::InvalidArguments {
				contract: contract.to_string(),
				reason: format!("unsupported parameter type {}: {}", param.ty, e),
			})?;
			ty.coerce_str(arg).map_err(|e| DeployError::InvalidArguments {
				contract: contract.to_string(),
				reason: format!("{} is not a valid {}: {}", arg, param.ty, e),
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use dapp_types::U256;

	fn abi() -> JsonAbi {
		JsonAbi::parse(["constructor(address owner, uint256 supply, string name)"]).unwrap()
	}

	#[test]
	fn test_placeholders_expand() {
		let deployer = Address::repeat_byte(0xde);
		let deployed = HashMap::from([("DatetimeLib".to_string(), Address::repeat_byte(0x11))]);
		let args = vec![
			"{deployer}".to_string(),
			"{DatetimeLib}".to_string(),
			"42".to_string(),
		];

		let expanded = expand_args("UniCharts", &args, deployer, &deployed).unwrap();

		assert_eq!(expanded[0], deployer.to_string());
		assert_eq!(expanded[1], Address::repeat_byte(0x11).to_string());
		assert_eq!(expanded[2], "42");
	}

	#[test]
	fn test_unknown_placeholder() {
		let result = expand_args(
			"UniCharts",
			&["{Missing}".to_string()],
			Address::ZERO,
			&HashMap::new(),
		);
		assert!(matches!(
			result,
			Err(DeployError::UnresolvedPlaceholder { .. })
		));
	}

	#[test]
	fn test_encode_against_constructor() {
		let owner = Address::repeat_byte(0xaa);
		let args = vec![owner.to_string(), "1000".to_string(), "Charts".to_string()];

		let encoded = encode_constructor_args("Token", &abi(), &args).unwrap();

		let expected = DynSolValue::Tuple(vec![
			DynSolValue::Address(owner),
			DynSolValue::Uint(U256::from(1000u64), 256),
			DynSolValue::String("Charts".into()),
		])
		.abi_encode_params();
		assert_eq!(encoded.to_vec(), expected);
	}

	#[test]
	fn test_argument_mismatch() {
		assert!(matches!(
			encode_constructor_args("Token", &abi(), &["1".to_string()]),
			Err(DeployError::InvalidArguments { .. })
		));
		assert!(matches!(
			encode_constructor_args("Lib", &JsonAbi::default(), &["1".to_string()]),
			Err(DeployError::InvalidArguments { .. })
		));
		assert!(encode_constructor_args("Lib", &JsonAbi::default(), &[])
			.unwrap()
			.is_empty());
	}

	#[test]
	fn test_encode_post_deploy_call() {
		let abi = JsonAbi::parse(["function pause(bool paused)", "function pause()"]).unwrap();

		let encoded = encode_call("NFcharT", &abi, "pause", &["false".to_string()]).unwrap();

		let function = find_function("NFcharT", &abi, "pause", 1).unwrap();
		assert_eq!(&encoded[..4], function.selector().as_slice());
		assert_eq!(encoded.len(), 4 + 32);
		assert_eq!(encode_call("NFcharT", &abi, "pause", &[]).unwrap().len(), 4);
		assert!(matches!(
			encode_call("NFcharT", &abi, "unpause", &[]),
			Err(DeployError::InvalidArguments { .. })
		));
	}
}
