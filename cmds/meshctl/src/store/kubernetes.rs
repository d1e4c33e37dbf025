//! Config store backed by a Kubernetes API server.
//!
//! Every configuration kind is a custom resource, so all traffic goes through
//! `Api<DynamicObject>`. Registered kinds map straight to their API resource;
//! anything else is looked up through the discovery API.

use std::{path::Path, time::Duration};

use kube::{
	api::{Api, DeleteParams, DynamicObject, ListParams, PostParams},
	config::{KubeConfigOptions, Kubeconfig, KubeconfigError},
	core::GroupVersionKind,
	discovery::{oneshot::pinned_kind, ApiResource, Scope},
	Client, Config,
};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, error, instrument};

use super::{ConfigStore, StoreError};
use crate::{model::ConfigObject, schema::Schemas};

/// Read timeout applied to every API request.
const DEFAULT_API_TIMEOUT: Duration = Duration::from_secs(30);

/// Errors that can occur when connecting to the API server.
#[derive(Debug, Error)]
pub enum ConnectionError {
	#[error("loading kubeconfig")]
	Kubeconfig(#[from] KubeconfigError),

	#[error("building Kubernetes client")]
	Kube(#[from] kube::Error),
}

/// [`ConfigStore`] implementation talking to a Kubernetes API server.
#[derive(Clone)]
pub struct KubeStore {
	client: Client,
	schemas: Schemas,
}

impl std::fmt::Debug for KubeStore {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		f.debug_struct("KubeStore")
			.field("default_namespace", &self.client.default_namespace())
			.finish_non_exhaustive()
	}
}

/// Resolved API endpoint for one kind.
struct Endpoint {
	resource: ApiResource,
	namespaced: bool,
}

impl KubeStore {
	/// Connect using the kubeconfig files listed in `path` (separated like
	/// `PATH`), or the default lookup (`KUBECONFIG`, then `~/.kube/config`)
	/// when `path` is `None`.
	#[instrument(skip_all)]
	pub async fn connect(
		path: Option<&Path>,
		context: Option<&str>,
	) -> Result<Self, ConnectionError> {
		let kubeconfig = match path {
			Some(path) => {
				let mut merged: Option<Kubeconfig> = None;
				for file in std::env::split_paths(path).filter(|p| !p.as_os_str().is_empty()) {
					let next = Kubeconfig::read_from(&file)?;
					merged = Some(match merged {
						Some(acc) => acc.merge(next)?,
						None => next,
					});
				}
				merged.unwrap_or_default()
			}
			None => Kubeconfig::read()?,
		};
		Self::from_kubeconfig(kubeconfig, context).await
	}

	/// Connect using an already loaded kubeconfig.
	#[instrument(skip_all, fields(context = ?context))]
	pub async fn from_kubeconfig(
		kubeconfig: Kubeconfig,
		context: Option<&str>,
	) -> Result<Self, ConnectionError> {
		let mut config = Config::from_custom_kubeconfig(
			kubeconfig,
			&KubeConfigOptions {
				context: context.map(str::to_string),
				..Default::default()
			},
		)
		.await?;
		config.read_timeout = Some(DEFAULT_API_TIMEOUT);

		let client = Client::try_from(config)?;
		debug!(default_namespace = %client.default_namespace(), "connected");

		Ok(Self {
			client,
			schemas: Schemas::builtin(),
		})
	}

	/// Namespace of the selected kubeconfig context.
	pub fn default_namespace(&self) -> &str {
		self.client.default_namespace()
	}

	async fn endpoint(&self, gvk: &GroupVersionKind) -> Result<Endpoint, StoreError> {
		if let Some(schema) = self.schemas.find_by_gvk(&gvk.group, &gvk.version, &gvk.kind) {
			return Ok(Endpoint {
				resource: ApiResource::from_gvk_with_plural(gvk, schema.plural),
				namespaced: true,
			});
		}

		debug!(api_version = %gvk.api_version(), kind = %gvk.kind, "discovering resource");
		let (resource, capabilities) = pinned_kind(&self.client, gvk).await.map_err(|source| {
			match source {
				kube::Error::Api(ref err) if err.code == 404 => StoreError::UnknownResource {
					api_version: gvk.api_version(),
					kind: gvk.kind.clone(),
				},
				source => StoreError::Discovery {
					api_version: gvk.api_version(),
					kind: gvk.kind.clone(),
					source,
				},
			}
		})?;

		Ok(Endpoint {
			resource,
			namespaced: matches!(capabilities.scope, Scope::Namespaced),
		})
	}

	fn api(&self, endpoint: &Endpoint, namespace: Option<&str>) -> Api<DynamicObject> {
		match namespace.filter(|_| endpoint.namespaced) {
			Some(ns) => Api::namespaced_with(self.client.clone(), ns, &endpoint.resource),
			None => Api::all_with(self.client.clone(), &endpoint.resource),
		}
	}

	fn decode(
		&self,
		object: DynamicObject,
		gvk: &GroupVersionKind,
	) -> Result<ConfigObject, StoreError> {
		let mut value = serde_json::to_value(&object).map_err(StoreError::Encode)?;
		// List items are not guaranteed to carry their type.
		if let Value::Object(ref mut doc) = value {
			doc.entry("kind").or_insert_with(|| Value::String(gvk.kind.clone()));
			doc.entry("apiVersion")
				.or_insert_with(|| Value::String(gvk.api_version()));
		}
		Ok(ConfigObject::from_wire(value, &self.schemas, &gvk.api_version())?)
	}
}

fn encode(object: &ConfigObject) -> Result<DynamicObject, StoreError> {
	serde_json::from_value(object.to_wire()?).map_err(StoreError::Encode)
}

/// Translate API status codes with a dedicated meaning.
fn classify(err: kube::Error, object: &ConfigObject) -> StoreError {
	match err {
		kube::Error::Api(ref status) if status.code == 404 => StoreError::NotFound {
			key: object.meta.key(),
		},
		kube::Error::Api(ref status) if status.code == 409 => {
			if object.meta.resource_version.is_empty() {
				StoreError::AlreadyExists {
					key: object.meta.key(),
				}
			} else {
				StoreError::Conflict {
					key: object.meta.key(),
					revision: object.meta.resource_version.clone(),
				}
			}
		}
		err => StoreError::Api(err),
	}
}

impl ConfigStore for KubeStore {
	fn schemas(&self) -> &Schemas {
		&self.schemas
	}

	#[instrument(skip_all, fields(key = %object.meta.key()))]
	async fn create(&self, object: &ConfigObject) -> Result<String, StoreError> {
		let endpoint = self.endpoint(&object.meta.gvk()).await?;
		let api = self.api(&endpoint, Some(&object.meta.namespace));

		let created = api
			.create(&PostParams::default(), &encode(object)?)
			.await
			.map_err(|e| classify(e, object))?;
		Ok(created.metadata.resource_version.unwrap_or_default())
	}

	#[instrument(skip_all, fields(key = %object.meta.key()))]
	async fn update(&self, object: &ConfigObject) -> Result<String, StoreError> {
		let endpoint = self.endpoint(&object.meta.gvk()).await?;
		let api = self.api(&endpoint, Some(&object.meta.namespace));

		let updated = api
			.replace(&object.meta.name, &PostParams::default(), &encode(object)?)
			.await
			.map_err(|e| classify(e, object))?;
		Ok(updated.metadata.resource_version.unwrap_or_default())
	}

	#[instrument(skip(self, gvk), fields(kind = %gvk.kind))]
	async fn get(
		&self,
		gvk: &GroupVersionKind,
		name: &str,
		namespace: &str,
	) -> Result<Option<ConfigObject>, StoreError> {
		let endpoint = self.endpoint(gvk).await?;
		let api = self.api(&endpoint, Some(namespace));

		api.get_opt(name)
			.await?
			.map(|object| self.decode(object, gvk))
			.transpose()
	}

	#[instrument(skip(self, gvk), fields(kind = %gvk.kind))]
	async fn list(
		&self,
		gvk: &GroupVersionKind,
		namespace: Option<&str>,
	) -> Result<Vec<ConfigObject>, StoreError> {
		let endpoint = self.endpoint(gvk).await?;
		let api = self.api(&endpoint, namespace);

		let list = api.list(&ListParams::default()).await?;
		debug!(count = list.items.len(), "listed");
		Ok(list
			.items
			.into_iter()
			.filter_map(|object| {
				let name = object.metadata.name.clone().unwrap_or_default();
				match self.decode(object, gvk) {
					Ok(object) => Some(object),
					Err(err) => {
						error!(kind = %gvk.kind, %name, error = %err, "skipping object");
						None
					}
				}
			})
			.collect())
	}

	#[instrument(skip(self, gvk), fields(kind = %gvk.kind))]
	async fn delete(
		&self,
		gvk: &GroupVersionKind,
		name: &str,
		namespace: &str,
	) -> Result<(), StoreError> {
		let endpoint = self.endpoint(gvk).await?;
		let api = self.api(&endpoint, Some(namespace));

		match api.delete(name, &DeleteParams::default()).await {
			Ok(_) => Ok(()),
			Err(kube::Error::Api(ref status)) if status.code == 404 => Err(StoreError::NotFound {
				key: format!("{}/{}/{}", gvk.kind, namespace, name),
			}),
			Err(e) => Err(e.into()),
		}
	}
}
