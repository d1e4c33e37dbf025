//! Config-store client interface.
//!
//! The dispatch engine talks to the store exclusively through
//! [`ConfigStore`]; [`kubernetes::KubeStore`] is the production binding.

pub mod kubernetes;

use kube::core::GroupVersionKind;
use thiserror::Error;

use crate::{
	model::{ConfigObject, ConversionError},
	schema::Schemas,
};

/// Errors returned by a config store.
#[derive(Debug, Error)]
pub enum StoreError {
	#[error("{key} not found")]
	NotFound { key: String },

	#[error("{key} already exists")]
	AlreadyExists { key: String },

	#[error("{key} has been modified since revision {revision:?}")]
	Conflict { key: String, revision: String },

	#[error("unknown resource type: {api_version}/{kind}")]
	UnknownResource { api_version: String, kind: String },

	#[error("discovering {api_version}/{kind}")]
	Discovery {
		api_version: String,
		kind: String,
		#[source]
		source: kube::Error,
	},

	#[error("encoding request body")]
	Encode(#[source] serde_json::Error),

	#[error("converting stored document")]
	Conversion(#[from] ConversionError),

	#[error("API request failed")]
	Api(#[from] kube::Error),
}

/// Create/read/update/delete access to configuration objects.
///
/// Calls are issued one at a time; implementations own any retry or timeout
/// policy.
#[allow(async_fn_in_trait)]
pub trait ConfigStore {
	/// Kinds this store serves.
	fn schemas(&self) -> &Schemas;

	/// Create `object`, returning the new revision token.
	async fn create(&self, object: &ConfigObject) -> Result<String, StoreError>;

	/// Replace `object`, returning the new revision token. A non-empty
	/// `resource_version` enables the optimistic concurrency check.
	async fn update(&self, object: &ConfigObject) -> Result<String, StoreError>;

	/// Fetch one object; `Ok(None)` when it does not exist.
	async fn get(
		&self,
		gvk: &GroupVersionKind,
		name: &str,
		namespace: &str,
	) -> Result<Option<ConfigObject>, StoreError>;

	/// List objects of a kind in `namespace`, or in every namespace for `None`.
	/// Stored objects that cannot be converted are logged and left out.
	async fn list(
		&self,
		gvk: &GroupVersionKind,
		namespace: Option<&str>,
	) -> Result<Vec<ConfigObject>, StoreError>;

	async fn delete(
		&self,
		gvk: &GroupVersionKind,
		name: &str,
		namespace: &str,
	) -> Result<(), StoreError>;
}
