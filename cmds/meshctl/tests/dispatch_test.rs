//! End-to-end tests of the dispatch engine against a mock configuration API
//! server.

use chrono::{TimeZone, Utc};
use config_store_mock::{ConfigStoreMock, RunningConfigStoreMock};
use indoc::indoc;
use meshctl::{
	dispatch::{self, Request},
	input::parse_inputs,
	render::OutputFormat,
	store::{kubernetes::KubeStore, ConfigStore},
};
use serde_json::json;

const BOOKINFO: &str = indoc! {"
	apiVersion: networking.istio.io/v1alpha3
	kind: Gateway
	metadata:
	  name: bookinfo-gateway
	spec:
	  servers:
	  - hosts:
	    - bookinfo.example.com
	---
	apiVersion: networking.istio.io/v1alpha3
	kind: VirtualService
	metadata:
	  name: bookinfo
	spec:
	  hosts:
	  - bookinfo.example.com
	  gateways:
	  - bookinfo-gateway
	  http:
	  - route:
	    - destination:
	        host: productpage
"};

async fn connect(server: &RunningConfigStoreMock) -> KubeStore {
	KubeStore::from_kubeconfig(server.kubeconfig(), None)
		.await
		.expect("failed to connect to mock server")
}

fn request(store: &KubeStore) -> Request {
	Request {
		default_namespace: store.default_namespace().to_string(),
		..Request::default()
	}
}

#[tokio::test]
async fn test_create_then_replace() {
	let server = ConfigStoreMock::builder().build().start().await;
	let store = connect(&server).await;
	let objects = parse_inputs(BOOKINFO, store.schemas()).unwrap();

	let mut out = Vec::new();
	let report = dispatch::create(&store, objects.clone(), &request(&store), &mut out)
		.await
		.unwrap();
	assert!(report.is_success());
	assert_eq!(
		String::from_utf8(out).unwrap(),
		indoc! {"
			Created config Gateway/default/bookinfo-gateway at revision 1
			Created config VirtualService/default/bookinfo at revision 2
		"}
	);

	let mut out = Vec::new();
	let report = dispatch::replace(&store, objects, &request(&store), &mut out)
		.await
		.unwrap();
	assert!(report.is_success());
	assert_eq!(
		String::from_utf8(out).unwrap(),
		indoc! {"
			Updated config Gateway/default/bookinfo-gateway to revision 3
			Updated config VirtualService/default/bookinfo to revision 4
		"}
	);
}

#[tokio::test]
async fn test_create_twice_aggregates_failures() {
	let server = ConfigStoreMock::builder().build().start().await;
	let store = connect(&server).await;
	let objects = parse_inputs(BOOKINFO, store.schemas()).unwrap();

	dispatch::create(&store, objects.clone(), &request(&store), Vec::new())
		.await
		.unwrap();
	let mut out = Vec::new();
	let report = dispatch::create(&store, objects, &request(&store), &mut out)
		.await
		.unwrap();

	assert!(out.is_empty());
	let err = report.into_result().unwrap_err();
	assert_eq!(err.len(), 2);
	let message = err.to_string();
	assert!(message.starts_with("2 errors occurred:\n"), "{message}");
	assert!(message.contains("Gateway/default/bookinfo-gateway already exists"), "{message}");
}

#[tokio::test]
async fn test_get_renders_short_table() {
	let server = ConfigStoreMock::builder()
		.resources(vec![json!({
			"apiVersion": "networking.istio.io/v1alpha3",
			"kind": "DestinationRule",
			"metadata": {"name": "reviews", "namespace": "default"},
			"spec": {"host": "reviews", "subsets": [{"name": "v1"}, {"name": "v2"}]},
		})])
		.build()
		.start()
		.await;
	let store = connect(&server).await;
	let now = Utc.with_ymd_and_hms(2024, 1, 3, 0, 0, 0).unwrap();

	let mut out = Vec::new();
	let report = dispatch::get(
		&store,
		Some("destinationrules"),
		None,
		&request(&store),
		now,
		&mut out,
	)
	.await
	.unwrap();
	assert!(report.is_success());

	let table = String::from_utf8(out).unwrap();
	let lines: Vec<_> = table.lines().collect();
	assert_eq!(lines.len(), 2, "{table}");
	assert!(lines[0].starts_with("DESTINATION-RULE NAME"), "{table}");
	let cells: Vec<_> = lines[1].split_whitespace().collect();
	assert_eq!(cells, ["reviews", "reviews", "v1,v2", "default", "2d"]);
}

#[tokio::test]
async fn test_get_all_reports_missing_required_kinds() {
	let server = ConfigStoreMock::builder()
		.unavailable_kinds(vec![
			"EnvoyFilter".to_string(),
			"RbacConfig".to_string(),
		])
		.build()
		.start()
		.await;
	let store = connect(&server).await;

	let mut out = Vec::new();
	let report = dispatch::get(
		&store,
		Some("all"),
		None,
		&request(&store),
		Utc::now(),
		&mut out,
	)
	.await
	.unwrap();

	let failures: Vec<_> = report.failures().map(|e| e.key.as_str()).collect();
	assert_eq!(failures.len(), 1, "{failures:?}");
	assert!(failures[0].starts_with("RbacConfig"), "{failures:?}");
	assert_eq!(String::from_utf8(out).unwrap(), "No resources found.\n");
}

#[tokio::test]
async fn test_get_by_name_as_yaml() {
	let server = ConfigStoreMock::builder()
		.resources(vec![json!({
			"apiVersion": "rbac.istio.io/v1alpha1",
			"kind": "ServiceRole",
			"metadata": {"name": "viewer", "namespace": "prod"},
			"spec": {"rules": [{"services": ["*"], "methods": ["GET"]}]},
		})])
		.build()
		.start()
		.await;
	let store = connect(&server).await;
	let request = Request {
		namespace: Some("prod".to_string()),
		output: OutputFormat::Yaml,
		..request(&store)
	};

	let mut out = Vec::new();
	dispatch::get(
		&store,
		Some("servicerole"),
		Some("viewer"),
		&request,
		Utc::now(),
		&mut out,
	)
	.await
	.unwrap();

	let yaml = String::from_utf8(out).unwrap();
	assert!(yaml.contains("kind: ServiceRole\n"), "{yaml}");
	assert!(yaml.contains("name: viewer\n"), "{yaml}");
	assert!(yaml.contains("namespace: prod\n"), "{yaml}");
	assert!(yaml.ends_with("---\n"), "{yaml}");
}

#[tokio::test]
async fn test_delete_named_reports_missing() {
	let server = ConfigStoreMock::builder()
		.resources(vec![json!({
			"apiVersion": "networking.istio.io/v1alpha3",
			"kind": "ServiceEntry",
			"metadata": {"name": "external", "namespace": "default"},
			"spec": {"hosts": ["api.example.com"], "ports": [{"number": 443, "protocol": "TLS"}]},
		})])
		.build()
		.start()
		.await;
	let store = connect(&server).await;

	let mut out = Vec::new();
	let report = dispatch::delete_named(
		&store,
		"serviceentry",
		&["external".to_string(), "missing".to_string()],
		&request(&store),
		&mut out,
	)
	.await
	.unwrap();

	assert_eq!(
		String::from_utf8(out).unwrap(),
		"Deleted config: serviceentry external\n"
	);
	assert_eq!(report.failures().count(), 1);
	assert!(server.objects().is_empty());
}

#[tokio::test]
async fn test_get_renders_around_undecodable_object() {
	let virtual_service = |name: &str, spec: serde_json::Value| {
		json!({
			"apiVersion": "networking.istio.io/v1alpha3",
			"kind": "VirtualService",
			"metadata": {"name": name, "namespace": "default"},
			"spec": spec,
		})
	};
	let server = ConfigStoreMock::builder()
		.resources(vec![
			virtual_service("broken", json!({"gateways": "mesh"})),
			virtual_service("good", json!({"hosts": ["a"]})),
			virtual_service("nullish", json!({"hosts": ["b"], "tcp": null})),
		])
		.build()
		.start()
		.await;
	let store = connect(&server).await;

	let mut out = Vec::new();
	let report = dispatch::get(
		&store,
		Some("virtualservices"),
		None,
		&request(&store),
		Utc::now(),
		&mut out,
	)
	.await
	.unwrap();
	assert!(report.is_success());

	let table = String::from_utf8(out).unwrap();
	let names: Vec<_> = table
		.lines()
		.skip(1)
		.filter_map(|line| line.split_whitespace().next())
		.collect();
	assert_eq!(names, ["good", "nullish"], "{table}");
}
