//! Registry of known configuration kinds.
//!
//! Every kind the tool understands is described by a single [`Schema`] entry:
//! its names, API group/version, the order in which it is printed, whether a
//! failure to list it should be reported, and its short-output columns.

use kube::core::GroupVersionKind;
use thiserror::Error;

/// Columns used for kinds without a dedicated short formatter.
pub const GENERIC_COLUMNS: &[&str] = &["NAME", "KIND", "NAMESPACE", "AGE"];

/// Group/version used for documents that do not name one and whose kind is
/// not registered.
pub const LEGACY_API_VERSION: &str = "config.istio.io/v1alpha2";

/// Errors produced while resolving a user supplied type name.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
	#[error("{given:?} not recognized. Please use non-hyphenated resource name {suggested:?}")]
	InvalidTypeName { given: String, suggested: String },

	#[error("configuration type {given} not found, the types are {}", known.join(", "))]
	UnknownType { given: String, known: Vec<String> },
}

/// Static description of one configuration kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Schema {
	pub kind: &'static str,
	pub plural: &'static str,
	pub group: &'static str,
	pub version: &'static str,
	/// Higher values are printed first by the short renderer.
	pub priority: i32,
	/// Listing failures for this kind are reported instead of ignored.
	pub must_list: bool,
	/// Short-output headings; `None` selects [`GENERIC_COLUMNS`].
	pub columns: Option<&'static [&'static str]>,
}

impl Schema {
	const fn networking(
		kind: &'static str,
		plural: &'static str,
		priority: i32,
		must_list: bool,
		columns: Option<&'static [&'static str]>,
	) -> Self {
		Self {
			kind,
			plural,
			group: "networking.istio.io",
			version: "v1alpha3",
			priority,
			must_list,
			columns,
		}
	}

	const fn listed(
		kind: &'static str,
		plural: &'static str,
		group: &'static str,
		version: &'static str,
	) -> Self {
		Self {
			kind,
			plural,
			group,
			version,
			priority: 0,
			must_list: true,
			columns: None,
		}
	}

	/// `group/version`, or just `version` for the core group.
	pub fn api_version(&self) -> String {
		if self.group.is_empty() {
			self.version.to_string()
		} else {
			format!("{}/{}", self.group, self.version)
		}
	}

	pub fn gvk(&self) -> GroupVersionKind {
		GroupVersionKind::gvk(self.group, self.version, self.kind)
	}

	/// Short-output heading line, tab separated.
	pub fn heading(&self) -> String {
		self.columns.unwrap_or(GENERIC_COLUMNS).join("\t")
	}

	fn matches(&self, type_name: &str) -> bool {
		type_name.eq_ignore_ascii_case(self.kind) || type_name.eq_ignore_ascii_case(self.plural)
	}
}

static BUILTIN: &[Schema] = &[
	Schema::networking(
		"Gateway",
		"gateways",
		10,
		true,
		Some(&["GATEWAY NAME", "HOSTS", "NAMESPACE", "AGE"]),
	),
	Schema::networking(
		"VirtualService",
		"virtualservices",
		5,
		true,
		Some(&[
			"VIRTUAL-SERVICE NAME",
			"GATEWAYS",
			"HOSTS",
			"#HTTP",
			"#TCP",
			"NAMESPACE",
			"AGE",
		]),
	),
	Schema::networking(
		"DestinationRule",
		"destinationrules",
		3,
		true,
		Some(&["DESTINATION-RULE NAME", "HOST", "SUBSETS", "NAMESPACE", "AGE"]),
	),
	Schema::networking(
		"ServiceEntry",
		"serviceentries",
		1,
		true,
		Some(&["SERVICE-ENTRY NAME", "HOSTS", "PORTS", "NAMESPACE", "AGE"]),
	),
	Schema::networking("Sidecar", "sidecars", 0, false, None),
	Schema::networking("EnvoyFilter", "envoyfilters", 0, false, None),
	Schema::listed("HTTPAPISpec", "httpapispecs", "config.istio.io", "v1alpha2"),
	Schema::listed(
		"HTTPAPISpecBinding",
		"httpapispecbindings",
		"config.istio.io",
		"v1alpha2",
	),
	Schema::listed("QuotaSpec", "quotaspecs", "config.istio.io", "v1alpha2"),
	Schema::listed(
		"QuotaSpecBinding",
		"quotaspecbindings",
		"config.istio.io",
		"v1alpha2",
	),
	Schema::listed("Policy", "policies", "authentication.istio.io", "v1alpha1"),
	Schema::listed("ServiceRole", "serviceroles", "rbac.istio.io", "v1alpha1"),
	Schema::listed(
		"ServiceRoleBinding",
		"servicerolebindings",
		"rbac.istio.io",
		"v1alpha1",
	),
	Schema::listed("RbacConfig", "rbacconfigs", "rbac.istio.io", "v1alpha1"),
];

/// An ordered set of schemas, usually [`Schemas::builtin`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Schemas {
	all: Vec<Schema>,
}

impl Schemas {
	pub fn new(all: Vec<Schema>) -> Self {
		Self { all }
	}

	/// The kinds compiled into the binary.
	pub fn builtin() -> Self {
		Self::new(BUILTIN.to_vec())
	}

	pub fn all(&self) -> &[Schema] {
		&self.all
	}

	/// Kind names in registry order, as offered to the user.
	pub fn kinds(&self) -> Vec<String> {
		self.all.iter().map(|s| s.kind.to_string()).collect()
	}

	/// Resolve a user typed name (singular or plural, any case) to its schema.
	pub fn resolve(&self, type_name: &str) -> Result<&Schema, ResolveError> {
		if type_name.contains('-') {
			return Err(ResolveError::InvalidTypeName {
				given: type_name.to_string(),
				suggested: type_name.replace('-', ""),
			});
		}

		self.all
			.iter()
			.find(|s| s.matches(type_name))
			.ok_or_else(|| ResolveError::UnknownType {
				given: type_name.to_string(),
				known: self.kinds(),
			})
	}

	pub fn find_by_kind(&self, kind: &str) -> Option<&Schema> {
		self.all.iter().find(|s| s.kind == kind)
	}

	pub fn find_by_gvk(&self, group: &str, version: &str, kind: &str) -> Option<&Schema> {
		self.all
			.iter()
			.find(|s| s.kind == kind && s.group == group && s.version == version)
	}

	/// Sort weight of a kind; unregistered kinds weigh zero.
	pub fn priority(&self, kind: &str) -> i32 {
		self.find_by_kind(kind).map_or(0, |s| s.priority)
	}
}

impl Default for Schemas {
	fn default() -> Self {
		Self::builtin()
	}
}

/// Split an `apiVersion` string into group and version.
pub fn split_api_version(api_version: &str) -> (&str, &str) {
	match api_version.split_once('/') {
		Some((group, version)) => (group, version),
		None => ("", api_version),
	}
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use rstest::rstest;

	use super::*;

	#[rstest]
	#[case("virtualservice")]
	#[case("VirtualService")]
	#[case("VIRTUALSERVICES")]
	#[case("virtualservices")]
	fn test_resolve_singular_and_plural_any_case(#[case] name: &str) {
		let schemas = Schemas::builtin();
		let schema = schemas.resolve(name).unwrap();
		assert_eq!(schema.kind, "VirtualService");
	}

	#[test]
	fn test_every_builtin_kind_resolves_from_both_forms() {
		let schemas = Schemas::builtin();
		for schema in schemas.all() {
			let by_kind = schemas.resolve(&schema.kind.to_lowercase()).unwrap();
			let by_plural = schemas.resolve(&schema.plural.to_uppercase()).unwrap();
			assert_eq!(by_kind, by_plural);
			assert_eq!(by_kind, schema);
		}
	}

	#[rstest]
	#[case("virtual-service", "virtualservice")]
	#[case("no-such-thing", "nosuchthing")]
	#[case("-", "")]
	fn test_resolve_rejects_hyphens(#[case] name: &str, #[case] suggested: &str) {
		let err = Schemas::builtin().resolve(name).unwrap_err();
		assert_matches!(
			&err,
			ResolveError::InvalidTypeName { suggested: s, .. } if s == suggested
		);
		assert!(err.to_string().contains(&format!("{suggested:?}")));
	}

	#[test]
	fn test_resolve_unknown_lists_known_types() {
		let err = Schemas::builtin().resolve("pods").unwrap_err();
		let message = err.to_string();
		assert!(message.starts_with("configuration type pods not found, the types are "));
		for kind in Schemas::builtin().kinds() {
			assert!(message.contains(&kind), "{kind} missing from {message}");
		}
	}

	#[test]
	fn test_priority_table_order() {
		let schemas = Schemas::builtin();
		assert!(schemas.priority("Gateway") > schemas.priority("VirtualService"));
		assert!(schemas.priority("VirtualService") > schemas.priority("DestinationRule"));
		assert!(schemas.priority("DestinationRule") > schemas.priority("ServiceEntry"));
		assert_eq!(schemas.priority("SomethingElse"), 0);
	}

	#[test]
	fn test_must_list_flags() {
		let schemas = Schemas::builtin();
		assert!(schemas.find_by_kind("Gateway").unwrap().must_list);
		assert!(schemas.find_by_kind("RbacConfig").unwrap().must_list);
		assert!(!schemas.find_by_kind("Sidecar").unwrap().must_list);
	}

	#[test]
	fn test_headings() {
		let schemas = Schemas::builtin();
		assert_eq!(
			schemas.find_by_kind("Gateway").unwrap().heading(),
			"GATEWAY NAME\tHOSTS\tNAMESPACE\tAGE"
		);
		assert_eq!(
			schemas.find_by_kind("Policy").unwrap().heading(),
			"NAME\tKIND\tNAMESPACE\tAGE"
		);
	}

	#[test]
	fn test_split_api_version() {
		assert_eq!(
			split_api_version("networking.istio.io/v1alpha3"),
			("networking.istio.io", "v1alpha3")
		);
		assert_eq!(split_api_version("v1"), ("", "v1"));
	}
}
