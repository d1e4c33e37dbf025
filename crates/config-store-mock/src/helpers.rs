//! Helper functions for the mock config store.

use serde_json::{json, Value};

/// Components of a custom resource API path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourcePath {
	pub group_version: String,
	pub namespace: Option<String>,
	pub plural: String,
	pub name: Option<String>,
}

/// Parse `/apis/<group>/<version>/[namespaces/<ns>/]<plural>[/<name>]`.
///
/// Examples:
/// - `/apis/networking.istio.io/v1alpha3/namespaces/default/gateways/gw`
/// - `/apis/networking.istio.io/v1alpha3/gateways` (all namespaces)
pub fn parse_resource_path(path: &str) -> Option<ResourcePath> {
	let segments: Vec<&str> = path
		.trim_start_matches('/')
		.trim_end_matches('/')
		.split('/')
		.collect();

	let ["apis", group, version, rest @ ..] = segments.as_slice() else {
		return None;
	};
	let (namespace, rest) = match rest {
		["namespaces", ns, rest @ ..] if !rest.is_empty() => (Some(ns.to_string()), rest),
		_ => (None, rest),
	};
	let (plural, name) = match rest {
		[plural] => (plural, None),
		[plural, name] => (plural, Some(name.to_string())),
		_ => return None,
	};

	Some(ResourcePath {
		group_version: format!("{group}/{version}"),
		namespace,
		plural: plural.to_string(),
		name,
	})
}

/// A `Status` failure body, as returned by the API server.
pub fn status_failure(code: u16, reason: &str, message: &str) -> Value {
	json!({
		"kind": "Status",
		"apiVersion": "v1",
		"metadata": {},
		"status": "Failure",
		"message": message,
		"reason": reason,
		"code": code
	})
}
