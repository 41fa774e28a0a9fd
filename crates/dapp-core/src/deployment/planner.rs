//! Dependency ordering for contract specs.

use super::DeployError;
use dapp_types::ContractSpec;
use std::collections::{HashMap, HashSet};

/// Orders `specs` so every contract follows its dependencies.
///
/// Among contracts whose dependencies are met, the earliest in input order goes
/// first. A dependency outside the batch must already be deployed, i.e. be in
/// `already_deployed`. Fails without side effects on duplicates, unknown
/// dependencies and cycles.
pub fn plan(
	specs: &[ContractSpec],
	already_deployed: &HashSet<String>,
) -> Result<Vec<ContractSpec>, DeployError> {
	let mut names = HashSet::new();
	for spec in specs {
		if !names.insert(spec.name.as_str()) {
			return Err(DeployError::DuplicateContract(spec.name.clone()));
		}
	}

	for spec in specs {
		if let Some(missing) = spec
			.dependencies
			.iter()
			.find(|dep| !names.contains(dep.as_str()) && !already_deployed.contains(*dep))
		{
			return Err(DeployError::UnknownDependency {
				contract: spec.name.clone(),
				dependency: missing.clone(),
			});
		}
	}

	let mut remaining: Vec<&ContractSpec> = specs.iter().collect();
	let mut placed: HashSet<&str> = HashSet::new();
	let mut ordered = Vec::with_capacity(specs.len());

	while !remaining.is_empty() {
		let ready = remaining.iter().position(|spec| {
			spec.dependencies.iter().all(|dep| {
				placed.contains(dep.as_str())
					|| (!names.contains(dep.as_str()) && already_deployed.contains(dep))
			})
		});

		let Some(index) = ready else {
			return Err(DeployError::DependencyCycle(cycle_members(&remaining)));
		};

		let spec = remaining.remove(index);
		placed.insert(spec.name.as_str());
		ordered.push(spec.clone());
	}

	Ok(ordered)
}

/// Unplaced specs that lie on a cycle, sorted. Specs that only depend on a
/// cycle are left out.
fn cycle_members(remaining: &[&ContractSpec]) -> Vec<String> {
	let unplaced: HashSet<&str> = remaining.iter().map(|spec| spec.name.as_str()).collect();
	let edges: HashMap<&str, Vec<&str>> = remaining
		.iter()
		.map(|spec| {
			let deps = spec
				.dependencies
				.iter()
				.map(String::as_str)
				.filter(|dep| unplaced.contains(dep))
				.collect();
			(spec.name.as_str(), deps)
		})
		.collect();

	let mut members: Vec<String> = remaining
		.iter()
		.filter(|spec| reaches(&edges, &spec.name, &spec.name))
		.map(|spec| spec.name.clone())
		.collect();
	members.sort();
	members
}

fn reaches(edges: &HashMap<&str, Vec<&str>>, from: &str, target: &str) -> bool {
	let mut stack: Vec<&str> = edges.get(from).cloned().unwrap_or_default();
	let mut seen = HashSet::new();
	while let Some(node) = stack.pop() {
		if node == target {
			return true;
		}
		if seen.insert(node) {
			if let Some(next) = edges.get(node) {
				stack.extend(next.iter().copied());
			}
		}
	}
	false
}
