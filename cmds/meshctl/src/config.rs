//! Configuration file support for meshctl
//!
//! Supports `.meshctl.yaml` files placed anywhere in the directory hierarchy.
//! meshctl searches from the working directory upward to the filesystem root;
//! values found there are defaults that command-line flags override.

use std::{
	fs,
	path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::render::OutputFormat;

/// The name of the config file meshctl looks for
pub const CONFIG_FILE_NAME: &str = ".meshctl.yaml";

/// Root configuration structure for .meshctl.yaml
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MeshctlConfig {
	/// Namespace used when neither `--namespace` nor the object names one
	#[serde(default)]
	pub default_namespace: Option<String>,

	/// Kubeconfig context to connect with
	#[serde(default)]
	pub context: Option<String>,

	/// Default output format for `get`
	#[serde(default)]
	pub output: Option<OutputFormat>,
}

impl MeshctlConfig {
	/// Load config by searching from the given directory upward
	pub fn load_from_directory(start_dir: &Path) -> Result<Option<Self>> {
		match find_config_file(start_dir) {
			Some(config_path) => Ok(Some(Self::load_from_file(&config_path)?)),
			None => Ok(None),
		}
	}

	/// Load config from a specific file path
	pub fn load_from_file(path: &Path) -> Result<Self> {
		let content = fs::read_to_string(path)
			.with_context(|| format!("failed to read config file: {}", path.display()))?;
		if content.trim().is_empty() {
			return Ok(Self::default());
		}
		let config: MeshctlConfig = serde_yaml_with_quirks::from_str(&content)
			.with_context(|| format!("failed to parse config file: {}", path.display()))?;
		Ok(config)
	}

	/// Load the config that applies to the current working directory, if any
	pub fn discover() -> Result<Self> {
		let cwd = std::env::current_dir().context("determining working directory")?;
		Ok(Self::load_from_directory(&cwd)?.unwrap_or_default())
	}
}

/// Search for a config file starting from `start_dir` and walking up to the filesystem root
pub fn find_config_file(start_dir: &Path) -> Option<PathBuf> {
	let start = start_dir
		.canonicalize()
		.unwrap_or_else(|_| start_dir.to_path_buf());

	start
		.ancestors()
		.map(|dir| dir.join(CONFIG_FILE_NAME))
		.find(|candidate| candidate.is_file())
}

#[cfg(test)]
mod tests {
	use tempfile::TempDir;

	use super::*;

	#[test]
	fn test_find_config_in_current_dir() {
		let temp = TempDir::new().unwrap();
		let config_path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(&config_path, "defaultNamespace: bookinfo\n").unwrap();

		let found = find_config_file(temp.path());
		// Compare file names only to avoid canonicalization issues on macOS
		assert_eq!(found.unwrap().file_name(), config_path.file_name());
	}

	#[test]
	fn test_find_config_in_parent_dir() {
		let temp = TempDir::new().unwrap();
		fs::write(temp.path().join(CONFIG_FILE_NAME), "context: staging\n").unwrap();
		let subdir = temp.path().join("a").join("b");
		fs::create_dir_all(&subdir).unwrap();

		let config = MeshctlConfig::load_from_directory(&subdir).unwrap().unwrap();
		assert_eq!(config.context.as_deref(), Some("staging"));
	}

	#[test]
	fn test_load_all_fields() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(
			&path,
			"defaultNamespace: bookinfo\ncontext: istio\noutput: yaml\n",
		)
		.unwrap();

		let config = MeshctlConfig::load_from_file(&path).unwrap();
		assert_eq!(
			config,
			MeshctlConfig {
				default_namespace: Some("bookinfo".into()),
				context: Some("istio".into()),
				output: Some(OutputFormat::Yaml),
			}
		);
	}

	#[test]
	fn test_load_empty_file() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(&path, "").unwrap();
		assert_eq!(MeshctlConfig::load_from_file(&path).unwrap(), MeshctlConfig::default());
	}

	#[test]
	fn test_load_rejects_unknown_output() {
		let temp = TempDir::new().unwrap();
		let path = temp.path().join(CONFIG_FILE_NAME);
		fs::write(&path, "output: table\n").unwrap();
		let err = MeshctlConfig::load_from_file(&path).unwrap_err();
		assert!(err.to_string().contains("failed to parse config file"));
	}
}
