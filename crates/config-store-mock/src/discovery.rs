//! API groups served by the mock config store.

use std::collections::BTreeMap;

/// Pre-configured discovery data, keyed by `group/version`.
#[derive(Clone)]
pub struct MockDiscovery {
	pub group_resources: BTreeMap<String, Vec<MockApiResource>>,
}

impl Default for MockDiscovery {
	fn default() -> Self {
		Self {
			group_resources: BTreeMap::from([
				(
					"networking.istio.io/v1alpha3".to_string(),
					vec![
						MockApiResource::namespaced("gateways", "Gateway"),
						MockApiResource::namespaced("virtualservices", "VirtualService"),
						MockApiResource::namespaced("destinationrules", "DestinationRule"),
						MockApiResource::namespaced("serviceentries", "ServiceEntry"),
						MockApiResource::namespaced("sidecars", "Sidecar"),
						MockApiResource::namespaced("envoyfilters", "EnvoyFilter"),
					],
				),
				(
					"config.istio.io/v1alpha2".to_string(),
					vec![
						MockApiResource::namespaced("httpapispecs", "HTTPAPISpec"),
						MockApiResource::namespaced("httpapispecbindings", "HTTPAPISpecBinding"),
						MockApiResource::namespaced("quotaspecs", "QuotaSpec"),
						MockApiResource::namespaced("quotaspecbindings", "QuotaSpecBinding"),
						MockApiResource::namespaced("rules", "rule"),
					],
				),
				(
					"authentication.istio.io/v1alpha1".to_string(),
					vec![
						MockApiResource::namespaced("policies", "Policy"),
						MockApiResource::cluster_scoped("meshpolicies", "MeshPolicy"),
					],
				),
				(
					"rbac.istio.io/v1alpha1".to_string(),
					vec![
						MockApiResource::namespaced("serviceroles", "ServiceRole"),
						MockApiResource::namespaced("servicerolebindings", "ServiceRoleBinding"),
						MockApiResource::namespaced("rbacconfigs", "RbacConfig"),
					],
				),
			]),
		}
	}
}

impl MockDiscovery {
	/// Drop every resource of the given kinds, as if the server predates them.
	pub fn without_kinds(mut self, kinds: &[String]) -> Self {
		for resources in self.group_resources.values_mut() {
			resources.retain(|r| !kinds.contains(&r.kind));
		}
		self
	}

	pub fn by_plural(&self, group_version: &str, plural: &str) -> Option<&MockApiResource> {
		self.group_resources
			.get(group_version)?
			.iter()
			.find(|r| r.name == plural)
	}

	pub fn by_kind(&self, group_version: &str, kind: &str) -> Option<&MockApiResource> {
		self.group_resources
			.get(group_version)?
			.iter()
			.find(|r| r.kind == kind)
	}
}

/// A mock API resource definition.
#[derive(Clone, Debug)]
pub struct MockApiResource {
	pub name: String,
	pub kind: String,
	pub namespaced: bool,
	pub verbs: Vec<String>,
}

impl MockApiResource {
	fn new(name: &str, kind: &str, namespaced: bool) -> Self {
		Self {
			name: name.to_string(),
			kind: kind.to_string(),
			namespaced,
			verbs: ["create", "delete", "get", "list", "patch", "update", "watch"]
				.into_iter()
				.map(String::from)
				.collect(),
		}
	}

	pub fn namespaced(name: &str, kind: &str) -> Self {
		Self::new(name, kind, true)
	}

	pub fn cluster_scoped(name: &str, kind: &str) -> Self {
		Self::new(name, kind, false)
	}
}
