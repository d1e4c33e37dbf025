//! HTTP mock of the configuration API served by a Kubernetes API server.
//!
//! Objects live in memory and carry real revision semantics: every write bumps
//! a server-wide counter, creates collide on existing names and replaces check
//! the submitted `resourceVersion`.

use std::{
	collections::BTreeMap,
	sync::{Arc, Mutex},
};

use bon::Builder;
use kube::config::{
	AuthInfo, Cluster, Context, Kubeconfig, NamedAuthInfo, NamedCluster, NamedContext,
};
use serde_json::{json, Value};
use tracing::{debug, trace};
use wiremock::{
	matchers::{method, path, path_regex},
	Mock, MockServer, Request, ResponseTemplate,
};

use super::{
	discovery::MockDiscovery,
	helpers::{parse_resource_path, status_failure, ResourcePath},
};

pub const DEFAULT_CREATION_TIMESTAMP: &str = "2024-01-01T00:00:00Z";

#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct ObjectKey {
	group_version: String,
	plural: String,
	namespace: Option<String>,
	name: String,
}

#[derive(Default)]
struct State {
	objects: BTreeMap<ObjectKey, Value>,
	revision: u64,
}

impl State {
	fn next_revision(&mut self) -> String {
		self.revision += 1;
		self.revision.to_string()
	}
}

type SharedState = Arc<Mutex<State>>;

/// A mock configuration API exposed over HTTP.
#[derive(Builder)]
pub struct ConfigStoreMock {
	/// Objects present when the server starts, as full manifests.
	#[builder(default)]
	resources: Vec<Value>,
	/// Kinds the server does not serve, neither in discovery nor over REST.
	#[builder(default)]
	unavailable_kinds: Vec<String>,
	/// `creationTimestamp` stamped on created objects.
	#[builder(into, default = DEFAULT_CREATION_TIMESTAMP.to_string())]
	creation_timestamp: String,
}

/// A running mock server instance.
pub struct RunningConfigStoreMock {
	server: MockServer,
	state: SharedState,
}

impl ConfigStoreMock {
	/// Start the mock server with all configured resources.
	pub async fn start(self) -> RunningConfigStoreMock {
		let server = MockServer::start().await;
		let discovery = MockDiscovery::default().without_kinds(&self.unavailable_kinds);

		debug!(uri = %server.uri(), "Started mock config store");

		let mut state = State::default();
		for mut manifest in self.resources {
			let Some(key) = key_for_manifest(&manifest, &discovery) else {
				trace!(?manifest, "Skipping manifest of unserved kind");
				continue;
			};
			let revision = state.next_revision();
			stamp(&mut manifest, &key, &revision, &self.creation_timestamp);
			state.objects.insert(key, manifest);
		}
		let state = Arc::new(Mutex::new(state));

		mount_version(&server).await;
		mount_discovery(&server, &discovery).await;
		mount_resources(&server, &state, discovery, self.creation_timestamp).await;

		RunningConfigStoreMock { server, state }
	}
}

impl RunningConfigStoreMock {
	/// Get the server's URI (e.g., "http://127.0.0.1:12345").
	pub fn uri(&self) -> String {
		self.server.uri()
	}

	/// Create a Kubeconfig pointing to this mock server.
	pub fn kubeconfig(&self) -> Kubeconfig {
		self.kubeconfig_with_context("mock-context")
	}

	/// Create a Kubeconfig pointing to this mock server with a custom context name.
	pub fn kubeconfig_with_context(&self, context_name: &str) -> Kubeconfig {
		let cluster_name = "mock-cluster";
		let user_name = "mock-user";

		Kubeconfig {
			clusters: vec![NamedCluster {
				name: cluster_name.to_string(),
				cluster: Some(Cluster {
					server: Some(self.uri()),
					insecure_skip_tls_verify: Some(true),
					..Default::default()
				}),
			}],
			contexts: vec![NamedContext {
				name: context_name.to_string(),
				context: Some(Context {
					cluster: cluster_name.to_string(),
					user: Some(user_name.to_string()),
					namespace: Some("default".to_string()),
					..Default::default()
				}),
			}],
			auth_infos: vec![NamedAuthInfo {
				name: user_name.to_string(),
				auth_info: Some(AuthInfo::default()),
			}],
			current_context: Some(context_name.to_string()),
			..Default::default()
		}
	}

	/// Every stored object, ordered by group, resource, namespace and name.
	pub fn objects(&self) -> Vec<Value> {
		self.state.lock().unwrap().objects.values().cloned().collect()
	}

	/// Look up a stored object by kind, namespace and name.
	pub fn object(&self, kind: &str, namespace: &str, name: &str) -> Option<Value> {
		self.objects().into_iter().find(|o| {
			o["kind"] == kind
				&& o["metadata"]["name"] == name
				&& o["metadata"]["namespace"].as_str().unwrap_or_default() == namespace
		})
	}
}

fn key_for_manifest(manifest: &Value, discovery: &MockDiscovery) -> Option<ObjectKey> {
	let api_version = manifest.get("apiVersion")?.as_str()?;
	let kind = manifest.get("kind")?.as_str()?;
	let metadata = manifest.get("metadata")?;
	let resource = discovery.by_kind(api_version, kind)?;

	Some(ObjectKey {
		group_version: api_version.to_string(),
		plural: resource.name.clone(),
		namespace: resource.namespaced.then(|| {
			metadata
				.get("namespace")
				.and_then(Value::as_str)
				.unwrap_or("default")
				.to_string()
		}),
		name: metadata.get("name")?.as_str()?.to_string(),
	})
}

/// Fill in the server-managed metadata fields.
fn stamp(manifest: &mut Value, key: &ObjectKey, revision: &str, creation_timestamp: &str) {
	let Some(metadata) = manifest
		.as_object_mut()
		.map(|doc| doc.entry("metadata").or_insert_with(|| json!({})))
		.and_then(Value::as_object_mut)
	else {
		return;
	};
	metadata.insert("resourceVersion".into(), json!(revision));
	metadata
		.entry("creationTimestamp")
		.or_insert_with(|| json!(creation_timestamp));
	match &key.namespace {
		Some(ns) => metadata.insert("namespace".into(), json!(ns)),
		None => metadata.remove("namespace"),
	};
}

async fn mount_version(server: &MockServer) {
	Mock::given(method("GET"))
		.and(path("/version"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"major": "1",
			"minor": "31",
			"gitVersion": "v1.31.0",
			"gitCommit": "fake",
			"gitTreeState": "clean",
			"buildDate": "2024-01-01T00:00:00Z",
			"goVersion": "go1.22.0",
			"compiler": "gc",
			"platform": "linux/amd64"
		})))
		.mount(server)
		.await;
}

async fn mount_discovery(server: &MockServer, discovery: &MockDiscovery) {
	let groups: Vec<_> = discovery
		.group_resources
		.keys()
		.map(|gv| {
			let (group, version) = gv.split_once('/').unwrap_or(("", gv));
			json!({
				"name": group,
				"versions": [{"groupVersion": gv, "version": version}],
				"preferredVersion": {"groupVersion": gv, "version": version}
			})
		})
		.collect();

	Mock::given(method("GET"))
		.and(path("/apis"))
		.respond_with(ResponseTemplate::new(200).set_body_json(json!({
			"kind": "APIGroupList",
			"apiVersion": "v1",
			"groups": groups
		})))
		.mount(server)
		.await;

	for (gv, rs) in &discovery.group_resources {
		let resources: Vec<_> = rs
			.iter()
			.map(|r| {
				json!({
					"name": r.name,
					"singularName": r.kind.to_lowercase(),
					"namespaced": r.namespaced,
					"kind": r.kind,
					"verbs": r.verbs,
				})
			})
			.collect();

		Mock::given(method("GET"))
			.and(path(format!("/apis/{gv}")))
			.respond_with(ResponseTemplate::new(200).set_body_json(json!({
				"kind": "APIResourceList",
				"apiVersion": "v1",
				"groupVersion": gv,
				"resources": resources
			})))
			.mount(server)
			.await;
	}
}

/// Everything under `/apis` that is not discovery goes through one responder,
/// which dispatches on the HTTP method.
async fn mount_resources(
	server: &MockServer,
	state: &SharedState,
	discovery: MockDiscovery,
	creation_timestamp: String,
) {
	let state = Arc::clone(state);

	Mock::given(path_regex(r"^/apis/.+"))
		.respond_with(move |req: &Request| {
			let Some(target) = parse_resource_path(req.url.path()) else {
				return not_found(req.url.path());
			};
			let Some(resource) = discovery.by_plural(&target.group_version, &target.plural) else {
				return not_found(req.url.path());
			};
			let namespace = if resource.namespaced {
				target.namespace.clone()
			} else {
				None
			};
			let kind = resource.kind.clone();
			let mut state = state.lock().unwrap();

			trace!(method = %req.method, path = %req.url.path(), "Handling request");
			match (req.method.as_str(), &target.name) {
				("GET", Some(name)) => {
					let key = object_key(&target, namespace, name);
					match state.objects.get(&key) {
						Some(object) => ResponseTemplate::new(200).set_body_json(object),
						None => not_found(&format!("{kind} {name:?}")),
					}
				}
				("GET", None) => {
					let items: Vec<&Value> = state
						.objects
						.iter()
						.filter(|(k, _)| {
							k.group_version == target.group_version
								&& k.plural == target.plural
								&& (namespace.is_none() || k.namespace == namespace)
						})
						.map(|(_, v)| v)
						.collect();
					ResponseTemplate::new(200).set_body_json(json!({
						"apiVersion": target.group_version,
						"kind": format!("{kind}List"),
						"metadata": {"resourceVersion": state.revision.to_string()},
						"items": items,
					}))
				}
				("POST", None) => {
					let Ok(mut body) = serde_json::from_slice::<Value>(&req.body) else {
						return bad_request("malformed request body");
					};
					let Some(name) = body["metadata"]["name"].as_str().map(str::to_string) else {
						return bad_request("metadata.name is required");
					};
					let key = object_key(&target, namespace, &name);
					if state.objects.contains_key(&key) {
						return ResponseTemplate::new(409).set_body_json(status_failure(
							409,
							"AlreadyExists",
							&format!("{} {name:?} already exists", target.plural),
						));
					}
					let revision = state.next_revision();
					stamp(&mut body, &key, &revision, &creation_timestamp);
					state.objects.insert(key, body.clone());
					ResponseTemplate::new(201).set_body_json(body)
				}
				("PUT", Some(name)) => {
					let Ok(mut body) = serde_json::from_slice::<Value>(&req.body) else {
						return bad_request("malformed request body");
					};
					let key = object_key(&target, namespace, name);
					let Some(existing) = state.objects.get(&key) else {
						return not_found(&format!("{kind} {name:?}"));
					};
					let submitted = body["metadata"]["resourceVersion"].as_str().unwrap_or("");
					if !submitted.is_empty()
						&& Some(submitted) != existing["metadata"]["resourceVersion"].as_str()
					{
						return ResponseTemplate::new(409).set_body_json(status_failure(
							409,
							"Conflict",
							&format!(
								"Operation cannot be fulfilled on {} {name:?}: the object has been modified",
								target.plural
							),
						));
					}
					let created = existing["metadata"]["creationTimestamp"].clone();
					let revision = state.next_revision();
					if let Some(metadata) = body["metadata"].as_object_mut() {
						metadata.insert("creationTimestamp".into(), created);
					}
					stamp(&mut body, &key, &revision, &creation_timestamp);
					state.objects.insert(key, body.clone());
					ResponseTemplate::new(200).set_body_json(body)
				}
				("DELETE", Some(name)) => {
					let key = object_key(&target, namespace, name);
					match state.objects.remove(&key) {
						Some(object) => ResponseTemplate::new(200).set_body_json(object),
						None => not_found(&format!("{kind} {name:?}")),
					}
				}
				_ => ResponseTemplate::new(405).set_body_json(status_failure(
					405,
					"MethodNotAllowed",
					"the server does not allow this method on the requested resource",
				)),
			}
		})
		.mount(server)
		.await;
}

fn object_key(target: &ResourcePath, namespace: Option<String>, name: &str) -> ObjectKey {
	ObjectKey {
		group_version: target.group_version.clone(),
		plural: target.plural.clone(),
		namespace,
		name: name.to_string(),
	}
}

fn not_found(what: &str) -> ResponseTemplate {
	ResponseTemplate::new(404).set_body_json(status_failure(
		404,
		"NotFound",
		&format!("{what} not found"),
	))
}

fn bad_request(message: &str) -> ResponseTemplate {
	ResponseTemplate::new(400).set_body_json(status_failure(400, "BadRequest", message))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_key_for_manifest_defaults_namespace() {
		let discovery = MockDiscovery::default();
		let key = key_for_manifest(
			&json!({
				"apiVersion": "networking.istio.io/v1alpha3",
				"kind": "Gateway",
				"metadata": {"name": "gw"},
			}),
			&discovery,
		)
		.unwrap();
		assert_eq!(key.plural, "gateways");
		assert_eq!(key.namespace.as_deref(), Some("default"));
	}

	#[test]
	fn test_key_for_cluster_scoped_manifest() {
		let discovery = MockDiscovery::default();
		let key = key_for_manifest(
			&json!({
				"apiVersion": "authentication.istio.io/v1alpha1",
				"kind": "MeshPolicy",
				"metadata": {"name": "default", "namespace": "ignored"},
			}),
			&discovery,
		)
		.unwrap();
		assert_eq!(key.namespace, None);
	}

	#[test]
	fn test_stamp_keeps_creation_timestamp() {
		let key = ObjectKey {
			group_version: "networking.istio.io/v1alpha3".into(),
			plural: "gateways".into(),
			namespace: Some("prod".into()),
			name: "gw".into(),
		};
		let mut manifest = json!({
			"metadata": {"name": "gw", "creationTimestamp": "2023-05-01T00:00:00Z"},
		});
		stamp(&mut manifest, &key, "4", DEFAULT_CREATION_TIMESTAMP);
		assert_eq!(manifest["metadata"]["resourceVersion"], "4");
		assert_eq!(manifest["metadata"]["namespace"], "prod");
		assert_eq!(manifest["metadata"]["creationTimestamp"], "2023-05-01T00:00:00Z");
	}

	#[tokio::test]
	async fn test_start_stamps_seeded_objects() {
		let server = ConfigStoreMock::builder()
			.resources(vec![json!({
				"apiVersion": "rbac.istio.io/v1alpha1",
				"kind": "RbacConfig",
				"metadata": {"name": "default", "namespace": "istio-system"},
				"spec": {"mode": "OFF"},
			})])
			.build()
			.start()
			.await;

		let object = server.object("RbacConfig", "istio-system", "default").unwrap();
		assert_eq!(object["metadata"]["resourceVersion"], "1");
		assert_eq!(object["metadata"]["creationTimestamp"], DEFAULT_CREATION_TIMESTAMP);
	}
}
