//! Configuration objects and their typed payloads.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use kube::core::GroupVersionKind;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};
use thiserror::Error;

use crate::schema::{split_api_version, Schema, Schemas};

/// Errors converting between store documents and [`ConfigObject`]s.
#[derive(Debug, Error)]
pub enum ConversionError {
	#[error("document is not an object")]
	NotAnObject,

	#[error("document is missing {0}")]
	MissingField(&'static str),

	#[error("invalid creationTimestamp {value:?}")]
	InvalidTimestamp {
		value: String,
		#[source]
		source: chrono::ParseError,
	},

	#[error("decoding metadata")]
	Metadata(#[source] serde_json::Error),

	#[error("decoding {kind} spec")]
	Spec {
		kind: String,
		#[source]
		source: serde_json::Error,
	},
}

/// Identity and bookkeeping fields of a configuration object.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ConfigMeta {
	pub kind: String,
	pub group: String,
	pub version: String,
	pub name: String,
	pub namespace: String,
	/// Revision token; empty until the object exists in the store.
	pub resource_version: String,
	/// `None` is the zero timestamp.
	pub creation_timestamp: Option<DateTime<Utc>>,
	pub labels: BTreeMap<String, String>,
	pub annotations: BTreeMap<String, String>,
}

impl ConfigMeta {
	pub fn new(schema: &Schema, name: impl Into<String>, namespace: impl Into<String>) -> Self {
		Self {
			kind: schema.kind.to_string(),
			group: schema.group.to_string(),
			version: schema.version.to_string(),
			name: name.into(),
			namespace: namespace.into(),
			..Self::default()
		}
	}

	/// `Kind/namespace/name`, used in every user facing message.
	pub fn key(&self) -> String {
		format!("{}/{}/{}", self.kind, self.namespace, self.name)
	}

	pub fn gvk(&self) -> GroupVersionKind {
		GroupVersionKind::gvk(&self.group, &self.version, &self.kind)
	}

	pub fn api_version(&self) -> String {
		if self.group.is_empty() {
			self.version.clone()
		} else {
			format!("{}/{}", self.group, self.version)
		}
	}

	/// `kind.group.version`, shown by the generic short formatter.
	pub fn qualified_kind(&self) -> String {
		format!("{}.{}.{}", self.kind, self.group, self.version)
	}
}

/// An explicit `null` (an empty YAML key) reads as the field's default.
fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
	D: Deserializer<'de>,
	T: Default + Deserialize<'de>,
{
	Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewaySpec {
	#[serde(
		default,
		deserialize_with = "null_as_default",
		skip_serializing_if = "Vec::is_empty"
	)]
	pub servers: Vec<GatewayServer>,
	#[serde(flatten)]
	pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayServer {
	#[serde(
		default,
		deserialize_with = "null_as_default",
		skip_serializing_if = "Vec::is_empty"
	)]
	pub hosts: Vec<String>,
	#[serde(flatten)]
	pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VirtualServiceSpec {
	#[serde(
		default,
		deserialize_with = "null_as_default",
		skip_serializing_if = "Vec::is_empty"
	)]
	pub hosts: Vec<String>,
	#[serde(
		default,
		deserialize_with = "null_as_default",
		skip_serializing_if = "Vec::is_empty"
	)]
	pub gateways: Vec<String>,
	#[serde(
		default,
		deserialize_with = "null_as_default",
		skip_serializing_if = "Vec::is_empty"
	)]
	pub http: Vec<Value>,
	#[serde(
		default,
		deserialize_with = "null_as_default",
		skip_serializing_if = "Vec::is_empty"
	)]
	pub tcp: Vec<Value>,
	#[serde(flatten)]
	pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DestinationRuleSpec {
	#[serde(
		default,
		deserialize_with = "null_as_default",
		skip_serializing_if = "String::is_empty"
	)]
	pub host: String,
	#[serde(
		default,
		deserialize_with = "null_as_default",
		skip_serializing_if = "Vec::is_empty"
	)]
	pub subsets: Vec<Subset>,
	#[serde(flatten)]
	pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Subset {
	#[serde(default, deserialize_with = "null_as_default")]
	pub name: String,
	#[serde(flatten)]
	pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceEntrySpec {
	#[serde(
		default,
		deserialize_with = "null_as_default",
		skip_serializing_if = "Vec::is_empty"
	)]
	pub hosts: Vec<String>,
	#[serde(
		default,
		deserialize_with = "null_as_default",
		skip_serializing_if = "Vec::is_empty"
	)]
	pub ports: Vec<ServicePort>,
	#[serde(flatten)]
	pub rest: Map<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServicePort {
	#[serde(default, deserialize_with = "null_as_default")]
	pub number: u32,
	#[serde(default, deserialize_with = "null_as_default")]
	pub protocol: String,
	#[serde(flatten)]
	pub rest: Map<String, Value>,
}

/// Payload of a configuration object.
///
/// Kinds with a dedicated short formatter get a typed variant; everything
/// else is carried verbatim.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSpec {
	Gateway(GatewaySpec),
	VirtualService(VirtualServiceSpec),
	DestinationRule(DestinationRuleSpec),
	ServiceEntry(ServiceEntrySpec),
	Other(Value),
}

const NETWORKING_GROUP: &str = "networking.istio.io";

impl ConfigSpec {
	/// Decode the `spec` field of a document of the given kind.
	pub fn decode(group: &str, kind: &str, spec: Value) -> Result<Self, serde_json::Error> {
		if group != NETWORKING_GROUP {
			return Ok(Self::Other(spec));
		}
		let spec = if spec.is_null() {
			Value::Object(Map::new())
		} else {
			spec
		};
		Ok(match kind {
			"Gateway" => Self::Gateway(serde_json::from_value(spec)?),
			"VirtualService" => Self::VirtualService(serde_json::from_value(spec)?),
			"DestinationRule" => Self::DestinationRule(serde_json::from_value(spec)?),
			"ServiceEntry" => Self::ServiceEntry(serde_json::from_value(spec)?),
			_ => Self::Other(spec),
		})
	}

	pub fn to_value(&self) -> Result<Value, serde_json::Error> {
		match self {
			Self::Gateway(spec) => serde_json::to_value(spec),
			Self::VirtualService(spec) => serde_json::to_value(spec),
			Self::DestinationRule(spec) => serde_json::to_value(spec),
			Self::ServiceEntry(spec) => serde_json::to_value(spec),
			Self::Other(spec) => Ok(spec.clone()),
		}
	}
}

/// A single configuration object, either parsed from input or fetched.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigObject {
	pub meta: ConfigMeta,
	pub spec: ConfigSpec,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireMeta {
	#[serde(default)]
	name: Option<String>,
	#[serde(default)]
	namespace: Option<String>,
	#[serde(default)]
	resource_version: Option<String>,
	#[serde(default)]
	creation_timestamp: Option<String>,
	#[serde(default)]
	labels: Option<BTreeMap<String, String>>,
	#[serde(default)]
	annotations: Option<BTreeMap<String, String>>,
}

impl ConfigObject {
	/// Build an object from a store document.
	///
	/// `default_api_version` is used when the document carries no
	/// `apiVersion`; a registered kind always falls back to its schema.
	pub fn from_wire(
		value: Value,
		schemas: &Schemas,
		default_api_version: &str,
	) -> Result<Self, ConversionError> {
		let Value::Object(mut doc) = value else {
			return Err(ConversionError::NotAnObject);
		};

		let kind = doc
			.get("kind")
			.and_then(Value::as_str)
			.filter(|k| !k.is_empty())
			.ok_or(ConversionError::MissingField("kind"))?
			.to_string();

		let api_version = match doc.get("apiVersion").and_then(Value::as_str) {
			Some(v) if !v.is_empty() => v.to_string(),
			_ => schemas
				.find_by_kind(&kind)
				.map_or_else(|| default_api_version.to_string(), Schema::api_version),
		};
		let (group, version) = split_api_version(&api_version);

		let meta: WireMeta = match doc.remove("metadata") {
			Some(m) => serde_json::from_value(m).map_err(ConversionError::Metadata)?,
			None => WireMeta::default(),
		};
		let name = meta
			.name
			.filter(|n| !n.is_empty())
			.ok_or(ConversionError::MissingField("metadata.name"))?;

		let creation_timestamp = match meta.creation_timestamp {
			Some(ts) if !ts.is_empty() => Some(
				DateTime::parse_from_rfc3339(&ts)
					.map_err(|source| ConversionError::InvalidTimestamp {
						value: ts.clone(),
						source,
					})?
					.with_timezone(&Utc),
			),
			_ => None,
		};

		let spec = doc.remove("spec").unwrap_or(Value::Null);
		let spec = ConfigSpec::decode(group, &kind, spec).map_err(|source| {
			ConversionError::Spec {
				kind: kind.clone(),
				source,
			}
		})?;

		Ok(Self {
			meta: ConfigMeta {
				group: group.to_string(),
				version: version.to_string(),
				kind,
				name,
				namespace: meta.namespace.unwrap_or_default(),
				resource_version: meta.resource_version.unwrap_or_default(),
				creation_timestamp,
				labels: meta.labels.unwrap_or_default(),
				annotations: meta.annotations.unwrap_or_default(),
			},
			spec,
		})
	}

	/// Convert into the store's document representation.
	pub fn to_wire(&self) -> Result<Value, ConversionError> {
		let meta = &self.meta;
		let mut metadata = Map::new();
		metadata.insert("name".into(), Value::String(meta.name.clone()));
		if !meta.namespace.is_empty() {
			metadata.insert("namespace".into(), Value::String(meta.namespace.clone()));
		}
		if !meta.resource_version.is_empty() {
			metadata.insert(
				"resourceVersion".into(),
				Value::String(meta.resource_version.clone()),
			);
		}
		if let Some(ts) = meta.creation_timestamp {
			metadata.insert(
				"creationTimestamp".into(),
				Value::String(ts.to_rfc3339_opts(SecondsFormat::Secs, true)),
			);
		}
		if !meta.labels.is_empty() {
			metadata.insert("labels".into(), serde_json::json!(meta.labels));
		}
		if !meta.annotations.is_empty() {
			metadata.insert("annotations".into(), serde_json::json!(meta.annotations));
		}

		let spec = self
			.spec
			.to_value()
			.map_err(|source| ConversionError::Spec {
				kind: meta.kind.clone(),
				source,
			})?;

		Ok(serde_json::json!({
			"apiVersion": meta.api_version(),
			"kind": meta.kind,
			"metadata": metadata,
			"spec": spec,
		}))
	}
}
