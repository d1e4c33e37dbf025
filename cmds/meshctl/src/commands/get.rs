//! Get command handler.

use std::io::Write;

use anyhow::Result;
use chrono::Utc;
use clap::Args;
use tracing::instrument;

use super::{runtime, util::warn_deprecated, Settings};
use crate::{dispatch, render::OutputFormat, schema::Schemas};

#[derive(Args, Debug)]
pub struct GetArgs {
	/// Configuration type (singular or plural), or `all`
	pub type_name: Option<String>,

	/// Name of a single object to retrieve
	pub name: Option<String>,

	/// Output format
	#[arg(short = 'o', long, value_enum)]
	pub output: Option<OutputFormat>,

	/// If present, list the requested object(s) across all namespaces. Namespace in current context is ignored even if specified with --namespace.
	#[arg(long)]
	pub all_namespaces: bool,
}

/// Run the get command.
pub fn run<W: Write>(args: GetArgs, settings: &Settings, writer: W) -> Result<()> {
	warn_deprecated("get", "kubectl get");
	dispatch::check_query(
		&Schemas::builtin(),
		args.type_name.as_deref(),
		args.name.as_deref(),
		args.all_namespaces,
	)?;
	runtime()?.block_on(run_async(args, settings, writer))
}

#[instrument(skip_all, fields(type_name = ?args.type_name))]
async fn run_async<W: Write>(args: GetArgs, settings: &Settings, writer: W) -> Result<()> {
	let store = settings.connect().await?;
	let mut request = settings.request(store.default_namespace());
	request.all_namespaces = args.all_namespaces;
	if let Some(output) = args.output {
		request.output = output;
	}

	dispatch::get(
		&store,
		args.type_name.as_deref(),
		args.name.as_deref(),
		&request,
		Utc::now(),
		writer,
	)
	.await?
	.into_result()?;
	Ok(())
}

#[cfg(test)]
mod tests {
	use assert_matches::assert_matches;
	use tempfile::TempDir;

	use super::*;
	use crate::dispatch::DispatchError;

	fn unreachable_store(temp: &TempDir) -> Settings {
		Settings {
			kubeconfig: Some(temp.path().join("missing-config")),
			..Settings::default()
		}
	}

	fn args(type_name: Option<&str>, name: Option<&str>, all_namespaces: bool) -> GetArgs {
		GetArgs {
			type_name: type_name.map(str::to_string),
			name: name.map(str::to_string),
			output: None,
			all_namespaces,
		}
	}

	#[test]
	fn test_invalid_query_fails_before_connecting() {
		let temp = TempDir::new().unwrap();
		let mut out = Vec::new();
		let err = run(
			args(Some("gateway"), Some("gw"), true),
			&unreachable_store(&temp),
			&mut out,
		)
		.unwrap_err();
		assert_matches!(err.downcast_ref::<DispatchError>(), Some(DispatchError::InvalidQuery));
		assert!(out.is_empty());
	}

	#[test]
	fn test_missing_type_fails_before_connecting() {
		let temp = TempDir::new().unwrap();
		let err = run(args(None, None, false), &unreachable_store(&temp), Vec::new()).unwrap_err();
		assert_matches!(
			err.downcast_ref::<DispatchError>(),
			Some(DispatchError::MissingType { .. })
		);
	}

	#[test]
	fn test_valid_query_needs_the_store() {
		let temp = TempDir::new().unwrap();
		let err = run(
			args(Some("gateway"), None, true),
			&unreachable_store(&temp),
			Vec::new(),
		)
		.unwrap_err();
		assert!(err.downcast_ref::<DispatchError>().is_none(), "{err:#}");
		assert!(err.to_string().contains("connecting to the config store"), "{err:#}");
	}
}
