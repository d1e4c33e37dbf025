//! Reading configuration documents from files or standard input.

use std::{
	fmt,
	io::{self, Read},
	path::PathBuf,
};

use serde::Deserialize;
use serde_yaml_with_quirks as serde_yaml;
use thiserror::Error;
use tracing::{debug, instrument};

use crate::{
	model::{ConfigObject, ConversionError},
	schema::{Schemas, LEGACY_API_VERSION},
};

#[derive(Debug, Error)]
pub enum InputError {
	#[error("reading {source_name}")]
	Read {
		source_name: String,
		#[source]
		source: io::Error,
	},

	#[error("parsing document {index}")]
	Yaml {
		index: usize,
		#[source]
		source: serde_yaml::Error,
	},

	#[error("document {index} is invalid")]
	Document {
		index: usize,
		#[source]
		source: ConversionError,
	},
}

/// Where configuration documents are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InputSource {
	Stdin,
	File(PathBuf),
}

impl InputSource {
	/// `-` selects standard input, anything else is a path.
	pub fn from_arg(arg: &str) -> Self {
		if arg == "-" {
			Self::Stdin
		} else {
			Self::File(PathBuf::from(arg))
		}
	}
}

impl fmt::Display for InputSource {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Stdin => write!(f, "standard input"),
			Self::File(path) => write!(f, "{}", path.display()),
		}
	}
}

/// Read and parse every document from `source`.
#[instrument(skip_all, fields(source = %source))]
pub fn read_inputs(
	source: &InputSource,
	schemas: &Schemas,
) -> Result<Vec<ConfigObject>, InputError> {
	let read_err = |source_err| InputError::Read {
		source_name: source.to_string(),
		source: source_err,
	};

	let content = match source {
		InputSource::Stdin => {
			let mut buf = String::new();
			io::stdin().read_to_string(&mut buf).map_err(read_err)?;
			buf
		}
		InputSource::File(path) => std::fs::read_to_string(path).map_err(read_err)?,
	};

	parse_inputs(&content, schemas)
}

/// Parse a multi-document YAML (or JSON) stream into configuration objects.
///
/// Empty documents are skipped. Document indices in errors count from zero
/// and include skipped documents.
pub fn parse_inputs(content: &str, schemas: &Schemas) -> Result<Vec<ConfigObject>, InputError> {
	let mut objects = Vec::new();

	for (index, document) in serde_yaml::Deserializer::from_str(content).enumerate() {
		let value = serde_json::Value::deserialize(document)
			.map_err(|source| InputError::Yaml { index, source })?;
		if value.is_null() {
			continue;
		}

		let object = ConfigObject::from_wire(value, schemas, LEGACY_API_VERSION)
			.map_err(|source| InputError::Document { index, source })?;
		debug!(key = %object.meta.key(), "parsed document");
		objects.push(object);
	}

	Ok(objects)
}
