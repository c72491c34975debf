//! Application layer: the reconcilers and the pieces they are built from.
//!
//! - [`retry`] polls with a fixed interval against a deadline.
//! - [`desktop`] reads and writes the desktop engine's settings document.
//! - [`machine`] keeps the engine VM reachable and big enough.
//! - [`admin`] creates and deletes clusters, one implementation per product.
//! - [`cluster`] decides what to do to a cluster and drives the above.
//! - [`registry`] reconciles the local registry container.

pub mod admin;
pub mod cluster;
pub mod desktop;
pub mod machine;
pub mod registry;
pub mod retry;

pub use cluster::{ClusterController, ControllerContext};
pub use registry::{RegistryController, RegistryDefaults};
