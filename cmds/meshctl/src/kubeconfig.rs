//! Editing kubeconfig files for `context-create`.

use std::{
	fs, io,
	path::{Path, PathBuf},
};

use kube::config::{Cluster, Context, Kubeconfig, KubeconfigError, NamedCluster, NamedContext};
use serde_yaml_with_quirks as serde_yaml;
use thiserror::Error;
use tracing::{debug, instrument};
use url::Url;

/// Context name used when none is given.
pub const DEFAULT_CONTEXT: &str = "istio";

#[derive(Debug, Error)]
pub enum ContextError {
	#[error("specify the API server URL")]
	MissingServer,

	#[error("invalid API server URL {url:?}")]
	InvalidUrl {
		url: String,
		#[source]
		source: url::ParseError,
	},

	#[error("API server URL {0:?} is not a hierarchical URL")]
	NotHierarchical(String),

	#[error("no kubeconfig location: set --kubeconfig, KUBECONFIG or HOME")]
	NoLocation,

	#[error("reading kubeconfig {}", path.display())]
	Read {
		path: PathBuf,
		#[source]
		source: KubeconfigError,
	},

	#[error("encoding kubeconfig")]
	Encode(#[source] serde_yaml::Error),

	#[error("writing kubeconfig {}", path.display())]
	Write {
		path: PathBuf,
		#[source]
		source: io::Error,
	},
}

/// Kubeconfig file to edit: the first entry of the explicit path list, else
/// of `KUBECONFIG`, else `~/.kube/config`.
pub fn default_path(explicit: Option<&Path>) -> Result<PathBuf, ContextError> {
	let listed = explicit
		.map(|path| path.as_os_str().to_os_string())
		.or_else(|| std::env::var_os("KUBECONFIG"));
	if let Some(paths) = listed {
		if let Some(first) = std::env::split_paths(&paths).find(|p| !p.as_os_str().is_empty()) {
			return Ok(first);
		}
	}
	std::env::var_os("HOME")
		.map(|home| PathBuf::from(home).join(".kube").join("config"))
		.ok_or(ContextError::NoLocation)
}

/// Point `context_name` at a cluster of the same name serving `server`, and
/// make it the current context.
///
/// Returns whether a different, non-empty context was active before.
pub fn upsert_context(config: &mut Kubeconfig, context_name: &str, server: &str) -> bool {
	match config.clusters.iter_mut().find(|c| c.name == context_name) {
		Some(named) => {
			named.cluster.get_or_insert_with(Cluster::default).server = Some(server.to_string());
		}
		None => config.clusters.push(NamedCluster {
			name: context_name.to_string(),
			cluster: Some(Cluster {
				server: Some(server.to_string()),
				..Default::default()
			}),
		}),
	}

	match config.contexts.iter_mut().find(|c| c.name == context_name) {
		Some(named) => {
			named.context.get_or_insert_with(Context::default).cluster = context_name.to_string();
		}
		None => config.contexts.push(NamedContext {
			name: context_name.to_string(),
			context: Some(Context {
				cluster: context_name.to_string(),
				..Default::default()
			}),
		}),
	}

	let switched = matches!(
		config.current_context.as_deref(),
		Some(current) if !current.is_empty() && current != context_name
	);
	config.current_context = Some(context_name.to_string());
	switched
}

fn validate_server(api_server: &str) -> Result<(), ContextError> {
	if api_server.is_empty() {
		return Err(ContextError::MissingServer);
	}
	let url = Url::parse(api_server).map_err(|source| ContextError::InvalidUrl {
		url: api_server.to_string(),
		source,
	})?;
	if url.cannot_be_a_base() {
		return Err(ContextError::NotHierarchical(api_server.to_string()));
	}
	Ok(())
}

fn load(path: &Path) -> Result<Kubeconfig, ContextError> {
	if !path.exists() {
		debug!(path = %path.display(), "starting from an empty kubeconfig");
		return Ok(Kubeconfig {
			api_version: Some("v1".to_string()),
			kind: Some("Config".to_string()),
			..Default::default()
		});
	}
	Kubeconfig::read_from(path).map_err(|source| ContextError::Read {
		path: path.to_path_buf(),
		source,
	})
}

fn store(path: &Path, config: &Kubeconfig) -> Result<(), ContextError> {
	let encoded = serde_yaml::to_string(config).map_err(ContextError::Encode)?;
	let encoded = encoded.strip_prefix("---\n").unwrap_or(&encoded);

	let write_err = |source| ContextError::Write {
		path: path.to_path_buf(),
		source,
	};
	if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
		fs::create_dir_all(parent).map_err(write_err)?;
	}
	fs::write(path, encoded).map_err(write_err)
}

/// Create or update `context_name` in the kubeconfig at `path`, pointing it
/// at `api_server`. Returns whether the current context changed.
#[instrument(skip(path), fields(path = %path.display()))]
pub fn create_context(
	path: &Path,
	context_name: &str,
	api_server: &str,
) -> Result<bool, ContextError> {
	validate_server(api_server)?;

	let mut config = load(path)?;
	let switched = upsert_context(&mut config, context_name, api_server);
	store(path, &config)?;

	debug!(switched, "kubeconfig updated");
	Ok(switched)
}
