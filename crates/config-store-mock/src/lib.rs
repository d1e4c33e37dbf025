//! Mock configuration API server for testing.
//!
//! Serves the mesh configuration groups over HTTP so that kubeconfig-based
//! clients can run full create/replace/get/delete round trips.

pub mod discovery;
mod helpers;
pub mod http;

pub use discovery::{MockApiResource, MockDiscovery};
pub use http::{ConfigStoreMock, RunningConfigStoreMock, DEFAULT_CREATION_TIMESTAMP};
