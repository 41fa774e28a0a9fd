//! Typed contract handles.

use crate::RegistryError;
use alloy_dyn_abi::{DynSolValue, FunctionExt, JsonAbiExt};
use alloy_json_abi::{Function, JsonAbi};
use dapp_delivery::DeliveryService;
use dapp_types::{Address, Bytes, Transaction, U256};
use dapp_wallet::SessionSigner;
use std::fmt;
use std::sync::Arc;

/// What a handle is bound to, fixed when it is resolved.
#[derive(Clone)]
pub enum Binding {
	/// Reads only, over a plain RPC connection.
	ReadOnly(Arc<DeliveryService>),
	/// Reads and writes through a session signer.
	Signer(Arc<dyn SessionSigner>),
}

impl fmt::Debug for Binding {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::ReadOnly(_) => f.write_str("ReadOnly"),
			Self::Signer(signer) => write!(f, "Signer({})", signer.address()),
		}
	}
}

/// A contract call waiting to be dispatched by the signer it was built for.
#[derive(Clone)]
pub struct PendingCall {
	pub contract_name: String,
	pub function: String,
	pub tx: Transaction,
	pub signer: Arc<dyn SessionSigner>,
}

impl fmt::Debug for PendingCall {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("PendingCall")
			.field("contract_name", &self.contract_name)
			.field("function", &self.function)
			.field("tx", &self.tx)
			.finish()
	}
}

/// A deployed contract resolved on one chain.
#[derive(Clone)]
pub struct ContractHandle {
	name: String,
	address: Address,
	chain_id: u64,
	abi: Arc<JsonAbi>,
	binding: Binding,
	/// Connection used for reads when bound to a signer.
	reader: Option<Arc<DeliveryService>>,
}

impl fmt::Debug for ContractHandle {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.debug_struct("ContractHandle")
			.field("name", &self.name)
			.field("address", &self.address)
			.field("chain_id", &self.chain_id)
			.field("binding", &self.binding)
			.finish()
	}
}

impl ContractHandle {
	pub(crate) fn new(
		name: &str,
		address: Address,
		chain_id: u64,
		abi: JsonAbi,
		binding: Binding,
		reader: Option<Arc<DeliveryService>>,
	) -> Self {
		let reader = match &binding {
			Binding::ReadOnly(delivery) => Some(delivery.clone()),
			Binding::Signer(_) => reader,
		};
		Self {
			name: name.to_string(),
			address,
			chain_id,
			abi: Arc::new(abi),
			binding,
			reader,
		}
	}

	pub fn name(&self) -> &str {
		&self.name
	}

	pub fn address(&self) -> Address {
		self.address
	}

	pub fn chain_id(&self) -> u64 {
		self.chain_id
	}

	pub fn abi(&self) -> &JsonAbi {
		&self.abi
	}

	pub fn is_read_only(&self) -> bool {
		matches!(self.binding, Binding::ReadOnly(_))
	}

	/// Overload of `function` whose arity matches `args`.
	fn function(&self, function: &str, args: &[DynSolValue]) -> Result<&Function, RegistryError> {
		self.abi
			.function(function)
			.and_then(|overloads| overloads.iter().find(|f| f.inputs.len() == args.len()))
			.ok_or_else(|| RegistryError::UnknownFunction {
				contract: self.name.clone(),
				function: function.to_string(),
			})
	}

	/// Selector plus ABI-encoded arguments.
	pub fn encode_call(&self, function: &str, args: &[DynSolValue]) -> Result<Bytes, RegistryError> {
		let data = self
			.function(function, args)?
			.abi_encode_input(args)
			.map_err(|e| RegistryError::Encoding(format!("{}.{}: {}", self.name, function, e)))?;
		Ok(Bytes::from(data))
	}

	/// Executes a read-only call and decodes its outputs.
	pub async fn call(
		&self,
		function: &str,
		args: &[DynSolValue],
	) -> Result<Vec<DynSolValue>, RegistryError> {
		let reader = self
			.reader
			.as_ref()
			.ok_or_else(|| RegistryError::NoReader(self.name.clone()))?;
		let data = self.encode_call(function, args)?;
		let tx = Transaction::call(self.address, data, U256::ZERO, self.chain_id);

		let output = reader
			.call(tx)
			.await
			.map_err(|e| RegistryError::Call(e.to_string()))?;

		self.function(function, args)?
			.abi_decode_output(&output, true)
			.map_err(|e| RegistryError::Encoding(format!("{}.{}: {}", self.name, function, e)))
	}

	/// Builds a state-changing call for the bound signer.
	pub fn prepare(
		&self,
		function: &str,
		args: &[DynSolValue],
		value: U256,
	) -> Result<PendingCall, RegistryError> {
		let Binding::Signer(signer) = &self.binding else {
			return Err(RegistryError::ReadOnlyHandle(self.name.clone()));
		};
		let data = self.encode_call(function, args)?;

		Ok(PendingCall {
			contract_name: self.name.clone(),
			function: function.to_string(),
			tx: Transaction::call(self.address, data, value, self.chain_id),
			signer: signer.clone(),
		})
	}
}
