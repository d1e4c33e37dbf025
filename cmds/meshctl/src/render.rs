//! Output rendering for `get`.
//!
//! Short output groups objects by kind, highest priority first, one aligned
//! table per kind. YAML output emits each object as a store document
//! terminated by `---`.

use std::{
	collections::BTreeSet,
	fmt,
	io::{self, Write},
};

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use serde_yaml_with_quirks as serde_yaml;
use tabwriter::TabWriter;
use thiserror::Error;
use tracing::error;

use crate::{
	error::chain,
	model::{
		ConfigObject, ConfigSpec, ConversionError, DestinationRuleSpec, GatewaySpec,
		ServiceEntrySpec, VirtualServiceSpec,
	},
	schema::{Schemas, GENERIC_COLUMNS},
};

/// Minimum cell width of the short output table.
const MIN_WIDTH: usize = 10;
/// Padding added to every cell of the short output table.
const PADDING: usize = 3;

#[derive(Debug, Error)]
pub enum RenderError {
	#[error("unknown kind {kind:?} for {name}")]
	UnknownKind { kind: String, name: String },

	#[error("could not decode {name}")]
	Conversion {
		name: String,
		#[source]
		source: ConversionError,
	},

	#[error("could not convert {name} to YAML")]
	Yaml {
		name: String,
		#[source]
		source: serde_yaml::Error,
	},

	#[error("writing output")]
	Io(#[from] io::Error),
}

/// Output format of `get`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
	/// Aligned tables, one per kind.
	#[default]
	Short,

	/// Store documents separated by `---`.
	Yaml,
}

impl fmt::Display for OutputFormat {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			OutputFormat::Short => write!(f, "short"),
			OutputFormat::Yaml => write!(f, "yaml"),
		}
	}
}

/// Render `objects` in the given format.
pub fn render<W: Write>(
	format: OutputFormat,
	objects: &[ConfigObject],
	schemas: &Schemas,
	now: DateTime<Utc>,
	out: W,
) -> Result<(), RenderError> {
	match format {
		OutputFormat::Short => render_short(objects, schemas, now, out),
		OutputFormat::Yaml => render_yaml(objects, schemas, out),
	}
}

/// Human readable age of an object, in the largest whole unit.
pub fn render_age(created: Option<DateTime<Utc>>, now: DateTime<Utc>) -> String {
	let Some(created) = created else {
		return "<unknown>".to_string();
	};

	let elapsed = now.signed_duration_since(created);
	let seconds = elapsed.num_seconds();
	if seconds < -2 {
		return "<invalid>".to_string();
	} else if seconds < 0 {
		return "0s".to_string();
	} else if seconds < 60 {
		return format!("{seconds}s");
	}

	let minutes = elapsed.num_minutes();
	if minutes < 60 {
		return format!("{minutes}m");
	}

	let hours = elapsed.num_hours();
	if hours < 24 {
		format!("{hours}h")
	} else if hours < 365 * 24 {
		format!("{}d", hours / 24)
	} else {
		format!("{}y", hours / 24 / 365)
	}
}

/// Write the tabular short form.
///
/// Objects are stably sorted by descending kind priority, so objects of equal
/// weight keep their input order. A blank line separates consecutive kinds.
pub fn render_short<W: Write>(
	objects: &[ConfigObject],
	schemas: &Schemas,
	now: DateTime<Utc>,
	out: W,
) -> Result<(), RenderError> {
	let mut sorted: Vec<&ConfigObject> = objects.iter().collect();
	sorted.sort_by_key(|object| std::cmp::Reverse(schemas.priority(&object.meta.kind)));

	let mut tw = TabWriter::new(out).minwidth(MIN_WIDTH).padding(PADDING);
	let mut previous: Option<&str> = None;
	for object in sorted {
		let kind = object.meta.kind.as_str();
		if previous != Some(kind) {
			if previous.is_some() {
				writeln!(tw)?;
			}
			let heading = schemas
				.find_by_kind(kind)
				.map_or_else(|| GENERIC_COLUMNS.join("\t"), |schema| schema.heading());
			writeln!(tw, "{heading}")?;
			previous = Some(kind);
		}
		write_row(&mut tw, object, now)?;
	}
	tw.flush()?;
	Ok(())
}

fn write_row<W: Write>(w: &mut W, object: &ConfigObject, now: DateTime<Utc>) -> io::Result<()> {
	let meta = &object.meta;
	let age = render_age(meta.creation_timestamp, now);
	match &object.spec {
		ConfigSpec::Gateway(GatewaySpec { servers, .. }) => {
			let hosts: BTreeSet<&str> = servers
				.iter()
				.flat_map(|server| server.hosts.iter().map(String::as_str))
				.collect();
			let hosts = hosts.into_iter().collect::<Vec<_>>().join(",");
			writeln!(w, "{}\t{}\t{}\t{}", meta.name, hosts, meta.namespace, age)
		}
		ConfigSpec::VirtualService(VirtualServiceSpec {
			hosts,
			gateways,
			http,
			tcp,
			..
		}) => writeln!(
			w,
			"{}\t{}\t{}\t{:5}\t{:4}\t{}\t{}",
			meta.name,
			gateways.join(","),
			hosts.join(","),
			http.len(),
			tcp.len(),
			meta.namespace,
			age
		),
		ConfigSpec::DestinationRule(DestinationRuleSpec { host, subsets, .. }) => {
			let subsets = subsets
				.iter()
				.map(|subset| subset.name.as_str())
				.collect::<Vec<_>>()
				.join(",");
			writeln!(w, "{}\t{}\t{}\t{}\t{}", meta.name, host, subsets, meta.namespace, age)
		}
		ConfigSpec::ServiceEntry(ServiceEntrySpec { hosts, ports, .. }) => {
			let ports = ports
				.iter()
				.map(|port| format!("{}/{}", port.protocol, port.number))
				.collect::<Vec<_>>()
				.join(",");
			writeln!(
				w,
				"{}\t{}\t{}\t{}\t{}",
				meta.name,
				hosts.join(","),
				ports,
				meta.namespace,
				age
			)
		}
		ConfigSpec::Other(_) => writeln!(
			w,
			"{}\t{}\t{}\t{}",
			meta.name,
			meta.qualified_kind(),
			meta.namespace,
			age
		),
	}
}

/// Write every object as a YAML document followed by `---`.
///
/// Objects whose kind is not registered, or that fail to convert, are logged
/// and skipped.
pub fn render_yaml<W: Write>(
	objects: &[ConfigObject],
	schemas: &Schemas,
	mut out: W,
) -> Result<(), RenderError> {
	for object in objects {
		match yaml_document(object, schemas) {
			Ok(document) => {
				out.write_all(document.as_bytes())?;
				writeln!(out, "---")?;
			}
			Err(err) => error!(key = %object.meta.key(), "{}", chain(&err)),
		}
	}
	out.flush()?;
	Ok(())
}

fn yaml_document(object: &ConfigObject, schemas: &Schemas) -> Result<String, RenderError> {
	let meta = &object.meta;
	if schemas
		.find_by_gvk(&meta.group, &meta.version, &meta.kind)
		.is_none()
	{
		return Err(RenderError::UnknownKind {
			kind: meta.kind.clone(),
			name: meta.name.clone(),
		});
	}

	let wire = object.to_wire().map_err(|source| RenderError::Conversion {
		name: meta.name.clone(),
		source,
	})?;
	let document = serde_yaml::to_string(&wire).map_err(|source| RenderError::Yaml {
		name: meta.name.clone(),
		source,
	})?;

	let mut document = match document.strip_prefix("---\n") {
		Some(body) => body.to_string(),
		None => document,
	};
	if !document.ends_with('\n') {
		document.push('\n');
	}
	Ok(document)
}
