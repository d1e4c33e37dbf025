//! Context-create command handler.

use std::io::Write;

use anyhow::{Context as _, Result};
use clap::Args;

use super::{util::warn_deprecated, Settings};
use crate::kubeconfig::{create_context, default_path, DEFAULT_CONTEXT};

#[derive(Args, Debug)]
pub struct ContextCreateArgs {
	/// URL for the API server
	#[arg(long)]
	pub api_server: Option<String>,
}

/// Run the context-create command.
///
/// The context name comes from the global `--context` flag, `istio` by
/// default.
pub fn run<W: Write>(args: ContextCreateArgs, settings: &Settings, mut writer: W) -> Result<()> {
	warn_deprecated(
		"context-create",
		"kubectl config set-cluster / set-context / use-context",
	);

	let context_name = settings.context.as_deref().unwrap_or(DEFAULT_CONTEXT);
	let path = default_path(settings.kubeconfig.as_deref())?;
	let switched = create_context(
		&path,
		context_name,
		args.api_server.as_deref().unwrap_or_default(),
	)
	.with_context(|| format!("creating context {context_name:?}"))?;

	if switched {
		writeln!(writer, "kubeconfig context switched to {context_name:?}")?;
	}
	writeln!(writer, "Context created")?;
	Ok(())
}
