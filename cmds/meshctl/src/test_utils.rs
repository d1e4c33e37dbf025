//! Common test utilities.

use std::{
	collections::{BTreeMap, HashSet},
	io::{self, ErrorKind, Write},
	sync::{
		atomic::{AtomicU64, Ordering},
		Mutex,
	},
};

use kube::core::GroupVersionKind;

use crate::{
	model::ConfigObject,
	schema::Schemas,
	store::{ConfigStore, StoreError},
};

/// A writer that simulates a broken pipe (SIGPIPE scenario).
pub struct BrokenPipeWriter;

impl Write for BrokenPipeWriter {
	fn write(&mut self, _buf: &[u8]) -> io::Result<usize> {
		Err(io::Error::new(ErrorKind::BrokenPipe, "broken pipe"))
	}

	fn flush(&mut self) -> io::Result<()> {
		Err(io::Error::new(ErrorKind::BrokenPipe, "broken pipe"))
	}
}

/// A store call, as recorded by [`MemoryStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
	Create(String),
	Update { key: String, revision: String },
	Get(String),
	List { kind: String, namespace: Option<String> },
	Delete(String),
}

/// An in-memory [`ConfigStore`] that records every call.
///
/// Revisions are assigned from a single counter starting at 1. Every
/// operation on a kind registered with [`MemoryStore::with_unavailable_kind`]
/// fails with [`StoreError::UnknownResource`].
pub struct MemoryStore {
	schemas: Schemas,
	objects: Mutex<BTreeMap<String, ConfigObject>>,
	calls: Mutex<Vec<Call>>,
	unavailable: HashSet<String>,
	revision: AtomicU64,
}

fn key(gvk: &GroupVersionKind, name: &str, namespace: &str) -> String {
	format!("{}/{}/{}", gvk.kind, namespace, name)
}

impl MemoryStore {
	pub fn new() -> Self {
		Self {
			schemas: Schemas::builtin(),
			objects: Mutex::new(BTreeMap::new()),
			calls: Mutex::new(Vec::new()),
			unavailable: HashSet::new(),
			revision: AtomicU64::new(1),
		}
	}

	/// Seed an object without recording a call.
	pub fn with_object(self, mut object: ConfigObject) -> Self {
		object.meta.resource_version = self.next_revision();
		self.objects
			.lock()
			.unwrap()
			.insert(object.meta.key(), object);
		self
	}

	pub fn with_unavailable_kind(mut self, kind: &str) -> Self {
		self.unavailable.insert(kind.to_string());
		self
	}

	pub fn calls(&self) -> Vec<Call> {
		self.calls.lock().unwrap().clone()
	}

	pub fn objects(&self) -> BTreeMap<String, ConfigObject> {
		self.objects.lock().unwrap().clone()
	}

	fn next_revision(&self) -> String {
		self.revision.fetch_add(1, Ordering::SeqCst).to_string()
	}

	fn record(&self, call: Call) {
		self.calls.lock().unwrap().push(call);
	}

	fn check_available(&self, gvk: &GroupVersionKind) -> Result<(), StoreError> {
		if self.unavailable.contains(&gvk.kind) {
			return Err(StoreError::UnknownResource {
				api_version: gvk.api_version(),
				kind: gvk.kind.clone(),
			});
		}
		Ok(())
	}
}

impl Default for MemoryStore {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigStore for MemoryStore {
	fn schemas(&self) -> &Schemas {
		&self.schemas
	}

	async fn create(&self, object: &ConfigObject) -> Result<String, StoreError> {
		let key = object.meta.key();
		self.record(Call::Create(key.clone()));
		self.check_available(&object.meta.gvk())?;

		let mut objects = self.objects.lock().unwrap();
		if objects.contains_key(&key) {
			return Err(StoreError::AlreadyExists { key });
		}
		let mut stored = object.clone();
		stored.meta.resource_version = self.next_revision();
		let revision = stored.meta.resource_version.clone();
		objects.insert(key, stored);
		Ok(revision)
	}

	async fn update(&self, object: &ConfigObject) -> Result<String, StoreError> {
		let key = object.meta.key();
		self.record(Call::Update {
			key: key.clone(),
			revision: object.meta.resource_version.clone(),
		});
		self.check_available(&object.meta.gvk())?;

		let mut objects = self.objects.lock().unwrap();
		let Some(current) = objects.get(&key) else {
			return Err(StoreError::NotFound { key });
		};
		if !object.meta.resource_version.is_empty()
			&& object.meta.resource_version != current.meta.resource_version
		{
			return Err(StoreError::Conflict {
				key,
				revision: object.meta.resource_version.clone(),
			});
		}
		let mut stored = object.clone();
		stored.meta.resource_version = self.next_revision();
		let revision = stored.meta.resource_version.clone();
		objects.insert(key, stored);
		Ok(revision)
	}

	async fn get(
		&self,
		gvk: &GroupVersionKind,
		name: &str,
		namespace: &str,
	) -> Result<Option<ConfigObject>, StoreError> {
		let key = key(gvk, name, namespace);
		self.record(Call::Get(key.clone()));
		self.check_available(gvk)?;
		Ok(self.objects.lock().unwrap().get(&key).cloned())
	}

	async fn list(
		&self,
		gvk: &GroupVersionKind,
		namespace: Option<&str>,
	) -> Result<Vec<ConfigObject>, StoreError> {
		self.record(Call::List {
			kind: gvk.kind.clone(),
			namespace: namespace.map(str::to_string),
		});
		self.check_available(gvk)?;
		Ok(self
			.objects
			.lock()
			.unwrap()
			.values()
			.filter(|o| o.meta.kind == gvk.kind)
			.filter(|o| namespace.map_or(true, |ns| o.meta.namespace == ns))
			.cloned()
			.collect())
	}

	async fn delete(
		&self,
		gvk: &GroupVersionKind,
		name: &str,
		namespace: &str,
	) -> Result<(), StoreError> {
		let key = key(gvk, name, namespace);
		self.record(Call::Delete(key.clone()));
		self.check_available(gvk)?;
		match self.objects.lock().unwrap().remove(&key) {
			Some(_) => Ok(()),
			None => Err(StoreError::NotFound { key }),
		}
	}
}
