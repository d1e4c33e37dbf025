use anyhow::Result;
use clap::{Parser, Subcommand};
use meshctl::{
	commands::{self, util::BrokenPipeGuard, GlobalArgs, Settings},
	config::MeshctlConfig,
	telemetry,
};

#[derive(Parser)]
#[command(name = "meshctl")]
#[command(about = "Service mesh configuration CLI", long_about = None)]
#[command(version)]
struct Cli {
	#[command(flatten)]
	global: GlobalArgs,

	#[command(subcommand)]
	command: Commands,
}

#[derive(Subcommand)]
enum Commands {
	/// Create policies and rules
	Create(commands::create::CreateArgs),

	/// Replace existing policies and rules
	Replace(commands::replace::ReplaceArgs),

	/// Retrieve policies and rules
	Get(commands::get::GetArgs),

	/// Delete policies or rules
	Delete(commands::delete::DeleteArgs),

	/// Create a kubeconfig file suitable for use with meshctl in a non-Kubernetes environment
	ContextCreate(commands::context::ContextCreateArgs),
}

fn main() -> Result<()> {
	let cli = Cli::parse();

	let _telemetry = telemetry::init(cli.global.log_level)?;
	let settings = Settings::resolve(&cli.global, MeshctlConfig::discover()?);

	let stdout = BrokenPipeGuard::new(std::io::stdout());

	match cli.command {
		Commands::Create(args) => commands::create::run(args, &settings, stdout),
		Commands::Replace(args) => commands::replace::run(args, &settings, stdout),
		Commands::Get(args) => commands::get::run(args, &settings, stdout),
		Commands::Delete(args) => commands::delete::run(args, &settings, stdout),
		Commands::ContextCreate(args) => commands::context::run(args, &settings, stdout),
	}
}

#[cfg(test)]
mod tests {
	use clap::CommandFactory;
	use meshctl::render::OutputFormat;

	use super::*;

	#[test]
	fn test_cli_is_consistent() {
		Cli::command().debug_assert();
	}

	#[test]
	fn test_global_flags_after_subcommand() {
		let cli = Cli::try_parse_from([
			"meshctl",
			"get",
			"virtualservices",
			"-n",
			"bookinfo",
			"-o",
			"yaml",
			"--context",
			"staging",
		])
		.unwrap();
		assert_eq!(cli.global.namespace.as_deref(), Some("bookinfo"));
		assert_eq!(cli.global.context.as_deref(), Some("staging"));
		let Commands::Get(args) = cli.command else {
			panic!("expected get");
		};
		assert_eq!(args.type_name.as_deref(), Some("virtualservices"));
		assert_eq!(args.output, Some(OutputFormat::Yaml));
	}

	#[test]
	fn test_delete_collects_names() {
		let cli = Cli::try_parse_from(["meshctl", "delete", "gateway", "a", "b"]).unwrap();
		let Commands::Delete(args) = cli.command else {
			panic!("expected delete");
		};
		assert_eq!(args.args, vec!["gateway", "a", "b"]);
		assert_eq!(args.file, None);
	}

	#[test]
	fn test_context_create_flags() {
		let cli = Cli::try_parse_from([
			"meshctl",
			"context-create",
			"--api-server",
			"http://127.0.0.1:8080",
		])
		.unwrap();
		let Commands::ContextCreate(args) = cli.command else {
			panic!("expected context-create");
		};
		assert_eq!(args.api_server.as_deref(), Some("http://127.0.0.1:8080"));
	}

	#[test]
	fn test_unknown_output_rejected() {
		assert!(Cli::try_parse_from(["meshctl", "get", "all", "-o", "table"]).is_err());
	}
}
