pub mod context;
pub mod create;
pub mod delete;
pub mod get;
pub mod replace;

pub mod util;

use std::path::PathBuf;

use anyhow::{Context as _, Result};
use clap::Args;
use tracing::Level;

use crate::{
	config::MeshctlConfig,
	dispatch::Request,
	input::InputSource,
	render::OutputFormat,
	store::kubernetes::KubeStore,
};

/// Flags accepted by every subcommand.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalArgs {
	/// Kubernetes configuration file
	#[arg(long, env = "KUBECONFIG", global = true)]
	pub kubeconfig: Option<PathBuf>,

	/// Kubernetes configuration context
	#[arg(long, global = true)]
	pub context: Option<String>,

	/// Config namespace
	#[arg(short = 'n', long, global = true)]
	pub namespace: Option<String>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(long, global = true)]
	pub log_level: Option<Level>,
}

/// Command-line flags merged over `.meshctl.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Settings {
	pub kubeconfig: Option<PathBuf>,
	pub context: Option<String>,
	pub namespace: Option<String>,
	pub default_namespace: Option<String>,
	pub output: Option<OutputFormat>,
}

impl Settings {
	/// Flags win over file values.
	pub fn resolve(global: &GlobalArgs, file: MeshctlConfig) -> Self {
		Self {
			kubeconfig: global.kubeconfig.clone(),
			context: global.context.clone().or(file.context),
			namespace: global.namespace.clone().filter(|ns| !ns.is_empty()),
			default_namespace: file.default_namespace,
			output: file.output,
		}
	}

	/// Build the per-invocation request; the context namespace is the
	/// fallback default.
	pub fn request(&self, context_namespace: &str) -> Request {
		Request {
			namespace: self.namespace.clone(),
			default_namespace: self
				.default_namespace
				.clone()
				.unwrap_or_else(|| context_namespace.to_string()),
			all_namespaces: false,
			output: self.output.unwrap_or_default(),
		}
	}

	pub async fn connect(&self) -> Result<KubeStore> {
		KubeStore::connect(self.kubeconfig.as_deref(), self.context.as_deref())
			.await
			.context("connecting to the config store")
	}
}

/// `-f` value, standard input when absent.
pub(crate) fn input_source(file: Option<&str>) -> InputSource {
	file.map_or(InputSource::Stdin, InputSource::from_arg)
}

pub(crate) fn runtime() -> Result<tokio::runtime::Runtime> {
	tokio::runtime::Builder::new_multi_thread()
		.enable_all()
		.build()
		.context("creating tokio runtime")
}
