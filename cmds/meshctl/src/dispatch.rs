//! Batch dispatch of configuration objects to a [`ConfigStore`].
//!
//! Every operation issues its store calls strictly in input order, one at a
//! time. A failing object is recorded in the [`BatchReport`] and the batch moves
//! on; success lines are written as soon as each object completes.

use std::{
	fmt,
	io::{self, Write},
};

use chrono::{DateTime, Utc};
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::{
	error::AggregateError,
	model::ConfigObject,
	render::{render, OutputFormat, RenderError},
	schema::{ResolveError, Schema, Schemas},
	store::{ConfigStore, StoreError},
};

/// Errors that abort an operation before or outside per-object processing.
#[derive(Debug, Error)]
pub enum DispatchError {
	#[error("nothing to {verb}")]
	NothingToProcess { verb: &'static str },

	#[error("a resource cannot be retrieved by name across all namespaces")]
	InvalidQuery,

	#[error("specify the type of resource to get. Types are {}", known.join(", "))]
	MissingType { known: Vec<String> },

	#[error(transparent)]
	Resolve(#[from] ResolveError),

	#[error(transparent)]
	Render(#[from] RenderError),

	#[error("writing output")]
	Io(#[from] io::Error),
}

/// Store operation attempted for an object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
	Create,
	Update,
	Delete,
	Get,
	List,
}

impl fmt::Display for Operation {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Operation::Create => write!(f, "create"),
			Operation::Update => write!(f, "update"),
			Operation::Delete => write!(f, "delete"),
			Operation::Get => write!(f, "get"),
			Operation::List => write!(f, "list"),
		}
	}
}

/// Failure of a single object within a batch.
#[derive(Debug, Error)]
pub enum ObjectError {
	#[error(
		"the namespace from the provided object {object:?} does not match the namespace \
		 {requested:?}. You must pass '--namespace={object}' to perform this operation"
	)]
	NamespaceMismatch { object: String, requested: String },

	#[error("cannot {operation} {key}")]
	StoreOperationFailed {
		operation: Operation,
		key: String,
		#[source]
		source: StoreError,
	},
}

/// Outcome of one object: the new revision token, or why it failed.
#[derive(Debug)]
pub struct BatchEntry {
	pub key: String,
	pub outcome: Result<String, ObjectError>,
}

/// Ordered outcomes of a batch operation.
#[derive(Debug, Default)]
pub struct BatchReport {
	entries: Vec<BatchEntry>,
	/// First failure writing a progress line; later lines are not attempted.
	output_error: Option<io::Error>,
}

impl BatchReport {
	/// Write one progress line. A write failure never stops the batch: it
	/// is kept and reported by [`BatchReport::into_result`].
	fn announce<W: Write>(&mut self, out: &mut W, line: fmt::Arguments<'_>) {
		if self.output_error.is_some() {
			return;
		}
		if let Err(err) = out.write_fmt(line) {
			warn!(error = %err, "could not write progress line");
			self.output_error = Some(err);
		}
	}

	pub fn output_error(&self) -> Option<&io::Error> {
		self.output_error.as_ref()
	}

	fn record(&mut self, key: String, outcome: Result<String, ObjectError>) {
		if let Err(ref err) = outcome {
			debug!(%key, error = %err, "batch entry failed");
		}
		self.entries.push(BatchEntry { key, outcome });
	}

	pub fn entries(&self) -> &[BatchEntry] {
		&self.entries
	}

	pub fn failures(&self) -> impl Iterator<Item = &BatchEntry> {
		self.entries.iter().filter(|entry| entry.outcome.is_err())
	}

	pub fn succeeded(&self) -> impl Iterator<Item = &BatchEntry> {
		self.entries.iter().filter(|entry| entry.outcome.is_ok())
	}

	pub fn is_success(&self) -> bool {
		self.output_error.is_none() && self.entries.iter().all(|entry| entry.outcome.is_ok())
	}

	/// `Err` naming every failed entry, in order, then any output failure.
	pub fn into_result(self) -> Result<(), AggregateError> {
		let mut causes: Vec<Box<dyn std::error::Error + Send + Sync>> = self
			.entries
			.into_iter()
			.filter_map(|entry| entry.outcome.err())
			.map(|err| Box::new(err) as Box<dyn std::error::Error + Send + Sync>)
			.collect();
		if let Some(err) = self.output_error {
			causes.push(Box::new(DispatchError::Io(err)));
		}
		if causes.is_empty() {
			Ok(())
		} else {
			Err(AggregateError::new(causes))
		}
	}
}

/// Per-invocation settings, passed explicitly into every operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
	/// `--namespace`, when given.
	pub namespace: Option<String>,
	/// Namespace of the selected context.
	pub default_namespace: String,
	pub all_namespaces: bool,
	pub output: OutputFormat,
}

impl Default for Request {
	fn default() -> Self {
		Self {
			namespace: None,
			default_namespace: "default".to_string(),
			all_namespaces: false,
			output: OutputFormat::default(),
		}
	}
}

impl Request {
	/// Namespace addressed by name based operations.
	pub fn target_namespace(&self) -> &str {
		self.namespace
			.as_deref()
			.filter(|ns| !ns.is_empty())
			.unwrap_or(&self.default_namespace)
	}

	/// Namespace an input object is written to: the override, then the
	/// object's own, then the default. An object naming a different
	/// namespace than the override is rejected.
	pub fn resolve_namespace(&self, object_namespace: &str) -> Result<String, ObjectError> {
		let requested = self.namespace.as_deref().unwrap_or_default();
		if !object_namespace.is_empty() && !requested.is_empty() && object_namespace != requested {
			return Err(ObjectError::NamespaceMismatch {
				object: object_namespace.to_string(),
				requested: requested.to_string(),
			});
		}
		Ok(if !requested.is_empty() {
			requested.to_string()
		} else if !object_namespace.is_empty() {
			object_namespace.to_string()
		} else {
			self.default_namespace.clone()
		})
	}

	/// Apply namespace resolution to `object`, returning its final key.
	fn place(&self, object: &mut ConfigObject) -> Result<String, (String, ObjectError)> {
		match self.resolve_namespace(&object.meta.namespace) {
			Ok(namespace) => {
				object.meta.namespace = namespace;
				Ok(object.meta.key())
			}
			Err(err) => Err((object.meta.key(), err)),
		}
	}
}

fn store_failure(operation: Operation, key: &str, source: StoreError) -> ObjectError {
	ObjectError::StoreOperationFailed {
		operation,
		key: key.to_string(),
		source,
	}
}

/// Create every object.
#[instrument(skip_all, fields(count = objects.len()))]
pub async fn create<S: ConfigStore, W: Write>(
	store: &S,
	objects: Vec<ConfigObject>,
	request: &Request,
	mut out: W,
) -> Result<BatchReport, DispatchError> {
	if objects.is_empty() {
		return Err(DispatchError::NothingToProcess { verb: "create" });
	}

	let mut report = BatchReport::default();
	for mut object in objects {
		let key = match request.place(&mut object) {
			Ok(key) => key,
			Err((key, err)) => {
				report.record(key, Err(err));
				continue;
			}
		};

		debug!(%key, "creating");
		match store.create(&object).await {
			Ok(revision) => {
				report.announce(
					&mut out,
					format_args!("Created config {key} at revision {revision}\n"),
				);
				report.record(key, Ok(revision));
			}
			Err(source) => {
				let err = store_failure(Operation::Create, &key, source);
				report.record(key, Err(err));
			}
		}
	}
	Ok(report)
}

/// Replace every object, filling in missing revision tokens from the store.
#[instrument(skip_all, fields(count = objects.len()))]
pub async fn replace<S: ConfigStore, W: Write>(
	store: &S,
	objects: Vec<ConfigObject>,
	request: &Request,
	mut out: W,
) -> Result<BatchReport, DispatchError> {
	if objects.is_empty() {
		return Err(DispatchError::NothingToProcess { verb: "replace" });
	}

	let mut report = BatchReport::default();
	for mut object in objects {
		let key = match request.place(&mut object) {
			Ok(key) => key,
			Err((key, err)) => {
				report.record(key, Err(err));
				continue;
			}
		};

		if object.meta.resource_version.is_empty() {
			let meta = &object.meta;
			let current = store.get(&meta.gvk(), &meta.name, &meta.namespace).await;
			match current {
				Ok(Some(current)) => object.meta.resource_version = current.meta.resource_version,
				Ok(None) => debug!(%key, "no stored revision"),
				Err(err) => warn!(%key, error = %err, "could not fetch current revision"),
			}
		}

		debug!(%key, revision = %object.meta.resource_version, "updating");
		match store.update(&object).await {
			Ok(revision) => {
				report.announce(
					&mut out,
					format_args!("Updated config {key} to revision {revision}\n"),
				);
				report.record(key, Ok(revision));
			}
			Err(source) => {
				let err = store_failure(Operation::Update, &key, source);
				report.record(key, Err(err));
			}
		}
	}
	Ok(report)
}

/// Delete every object by its full identity.
#[instrument(skip_all, fields(count = objects.len()))]
pub async fn delete_objects<S: ConfigStore, W: Write>(
	store: &S,
	objects: Vec<ConfigObject>,
	request: &Request,
	mut out: W,
) -> Result<BatchReport, DispatchError> {
	if objects.is_empty() {
		return Err(DispatchError::NothingToProcess { verb: "delete" });
	}

	let mut report = BatchReport::default();
	for mut object in objects {
		let key = match request.place(&mut object) {
			Ok(key) => key,
			Err((key, err)) => {
				report.record(key, Err(err));
				continue;
			}
		};

		let meta = &object.meta;
		debug!(%key, "deleting");
		match store.delete(&meta.gvk(), &meta.name, &meta.namespace).await {
			Ok(()) => {
				report.announce(&mut out, format_args!("Deleted config: {key}\n"));
				report.record(key, Ok(String::new()));
			}
			Err(source) => {
				let err = store_failure(Operation::Delete, &key, source);
				report.record(key, Err(err));
			}
		}
	}
	Ok(report)
}

/// Delete objects of one type by name.
#[instrument(skip(store, request, out))]
pub async fn delete_named<S: ConfigStore, W: Write>(
	store: &S,
	type_name: &str,
	names: &[String],
	request: &Request,
	mut out: W,
) -> Result<BatchReport, DispatchError> {
	let schema = *store.schemas().resolve(type_name)?;
	if names.is_empty() {
		return Err(DispatchError::NothingToProcess { verb: "delete" });
	}

	let namespace = request.target_namespace();
	let gvk = schema.gvk();
	let mut report = BatchReport::default();
	for name in names {
		let key = format!("{}/{}/{}", schema.kind, namespace, name);
		debug!(%key, "deleting");
		match store.delete(&gvk, name, namespace).await {
			Ok(()) => {
				report.announce(&mut out, format_args!("Deleted config: {type_name} {name}\n"));
				report.record(key, Ok(String::new()));
			}
			Err(source) => {
				let err = store_failure(Operation::Delete, &key, source);
				report.record(key, Err(err));
			}
		}
	}
	Ok(report)
}

/// Validate the arguments of a `get` before anything talks to the store,
/// returning the requested type name.
pub fn check_query<'a>(
	schemas: &Schemas,
	type_name: Option<&'a str>,
	name: Option<&str>,
	all_namespaces: bool,
) -> Result<&'a str, DispatchError> {
	let type_name = type_name.ok_or_else(|| DispatchError::MissingType {
		known: schemas.kinds(),
	})?;
	if all_namespaces && name.is_some() {
		return Err(DispatchError::InvalidQuery);
	}
	Ok(type_name)
}

/// Fetch objects of one type (or `all`) and render them.
///
/// Listing failures of kinds marked `must_list` are reported; other kinds
/// are treated as having no objects.
#[instrument(skip(store, request, now, out))]
pub async fn get<S: ConfigStore, W: Write>(
	store: &S,
	type_name: Option<&str>,
	name: Option<&str>,
	request: &Request,
	now: DateTime<Utc>,
	mut out: W,
) -> Result<BatchReport, DispatchError> {
	let schemas = store.schemas();
	let type_name = check_query(schemas, type_name, name, request.all_namespaces)?;

	let targets: Vec<Schema> = if name.is_none() && type_name.eq_ignore_ascii_case("all") {
		schemas.all().to_vec()
	} else {
		vec![*schemas.resolve(type_name)?]
	};
	let namespace = (!request.all_namespaces).then(|| request.target_namespace());

	let mut report = BatchReport::default();
	let mut objects = Vec::new();
	match name {
		Some(name) => {
			let schema = &targets[0];
			let key = format!("{}/{}/{}", schema.kind, namespace.unwrap_or_default(), name);
			match store
				.get(&schema.gvk(), name, namespace.unwrap_or_default())
				.await
			{
				Ok(Some(object)) => {
					report.record(key, Ok(object.meta.resource_version.clone()));
					objects.push(object);
				}
				Ok(None) => debug!(%key, "not found"),
				Err(source) => {
					let err = store_failure(Operation::Get, &key, source);
					report.record(key, Err(err));
				}
			}
		}
		None => {
			for schema in &targets {
				match store.list(&schema.gvk(), namespace).await {
					Ok(listed) => {
						debug!(kind = schema.kind, count = listed.len(), "listed");
						for object in listed {
							let revision = object.meta.resource_version.clone();
							report.record(object.meta.key(), Ok(revision));
							objects.push(object);
						}
					}
					Err(source) if schema.must_list => {
						let key = schema.kind.to_string();
						let err = store_failure(Operation::List, &key, source);
						report.record(key, Err(err));
					}
					Err(err) => {
						debug!(kind = schema.kind, error = %err, "ignoring listing failure");
					}
				}
			}
		}
	}

	if objects.is_empty() {
		writeln!(out, "No resources found.")?;
		return Ok(report);
	}

	render(request.output, &objects, schemas, now, &mut out)?;
	Ok(report)
}
