//! Replace command handler.

use std::io::Write;

use anyhow::Result;
use clap::Args;
use tracing::instrument;

use super::{input_source, runtime, util::warn_deprecated, Settings};
use crate::{dispatch, input::read_inputs, store::ConfigStore};

#[derive(Args, Debug)]
pub struct ReplaceArgs {
	/// Input file with the content of the configuration objects (if not set, command reads from the standard input)
	#[arg(short = 'f', long = "file")]
	pub file: Option<String>,
}

/// Run the replace command.
pub fn run<W: Write>(args: ReplaceArgs, settings: &Settings, writer: W) -> Result<()> {
	warn_deprecated("replace", "kubectl apply");
	runtime()?.block_on(run_async(args, settings, writer))
}

#[instrument(skip_all)]
async fn run_async<W: Write>(args: ReplaceArgs, settings: &Settings, writer: W) -> Result<()> {
	let store = settings.connect().await?;
	let objects = read_inputs(&input_source(args.file.as_deref()), store.schemas())?;
	let request = settings.request(store.default_namespace());

	dispatch::replace(&store, objects, &request, writer)
		.await?
		.into_result()?;
	Ok(())
}
