//! Delete command handler.

use std::io::Write;

use anyhow::{bail, Result};
use clap::Args;
use tracing::instrument;

use super::{input_source, runtime, util::warn_deprecated, Settings};
use crate::{dispatch, input::read_inputs, store::ConfigStore};

#[derive(Args, Debug)]
pub struct DeleteArgs {
	/// Configuration type followed by one or more names
	#[arg(value_name = "TYPE NAME")]
	pub args: Vec<String>,

	/// Input file with the content of the configuration objects to delete
	#[arg(short = 'f', long = "file")]
	pub file: Option<String>,
}

/// What to delete, as selected by the arguments.
#[derive(Debug, PartialEq, Eq)]
enum Target<'a> {
	File(&'a str),
	Named { type_name: &'a str, names: &'a [String] },
}

fn target(args: &DeleteArgs) -> Result<Target<'_>> {
	match (&args.file, args.args.as_slice()) {
		(Some(_), [_, ..]) => bail!("delete takes no arguments when the file option is used"),
		(Some(file), []) => Ok(Target::File(file.as_str())),
		(None, [type_name, names @ ..]) if !names.is_empty() => Ok(Target::Named {
			type_name: type_name.as_str(),
			names,
		}),
		(None, _) => bail!("provide configuration type and name or -f option"),
	}
}

/// Run the delete command.
pub fn run<W: Write>(args: DeleteArgs, settings: &Settings, writer: W) -> Result<()> {
	warn_deprecated("delete", "kubectl delete");
	target(&args)?;
	runtime()?.block_on(run_async(args, settings, writer))
}

#[instrument(skip_all)]
async fn run_async<W: Write>(args: DeleteArgs, settings: &Settings, writer: W) -> Result<()> {
	let store = settings.connect().await?;
	let request = settings.request(store.default_namespace());

	let report = match target(&args)? {
		Target::File(file) => {
			let objects = read_inputs(&input_source(Some(file)), store.schemas())?;
			dispatch::delete_objects(&store, objects, &request, writer).await?
		}
		Target::Named { type_name, names } => {
			dispatch::delete_named(&store, type_name, names, &request, writer).await?
		}
	};
	report.into_result()?;
	Ok(())
}
