pub mod commands;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod input;
pub mod kubeconfig;
pub mod model;
pub mod render;
pub mod schema;
pub mod store;
pub mod telemetry;
#[cfg(test)]
pub mod test_utils;
