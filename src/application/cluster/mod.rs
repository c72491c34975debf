//! Cluster reconciliation: resolve the product's machine and admin, observe
//! the live cluster, and converge it to the desired spec.

mod context;
mod controller;
pub mod publish;
pub mod status;

pub use context::ControllerContext;
pub use controller::{ClusterController, DEFAULT_CLUSTER_READY, DEFAULT_STATUS_CONCURRENCY};
