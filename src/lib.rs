//! devcluster - declarative local Kubernetes clusters and registries.
//!
//! A developer declares the cluster they want (product, name, minimum CPUs,
//! Kubernetes version, an attached registry) and the controllers converge
//! the workstation to it: creating, leaving alone, or recreating resources
//! across several backends.
//!
//! # Architecture
//!
//! The crate follows a hexagonal layout:
//!
//! - [`domain`] - Backend-agnostic types: clusters, registries, products,
//!   the engine settings document
//! - [`port`] - Traits at every external seam (container engine, CLIs,
//!   kubeconfig, Kubernetes API, settings channel, OS capabilities)
//! - [`adapter`] - Real port implementations and the CLI front-end
//! - [`application`] - The reconcilers: cluster and registry controllers,
//!   per-product admins, machines, the settings client
//! - [`infrastructure`] - Configuration loading and runtime wiring
//!
//! # Products
//!
//! - `docker-desktop` - the desktop engine's built-in Kubernetes
//! - `kind`, `k3d`, `minikube` - driven through their CLIs
//!
//! # Example
//!
//! ```no_run
//! use devcluster::domain::{Cluster, Product};
//! use devcluster::infrastructure::{bootstrap, config::Config};
//!
//! # async fn run() -> devcluster::error::Result<()> {
//! let app = bootstrap::build(&Config::default())?;
//! let desired = Cluster::new(Product::Kind).with_registry("kind-registry");
//! let cluster = app.clusters.apply(&desired).await?;
//! println!("{} is running {:?}", cluster.name, cluster.status.kubernetes_version);
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod port;

#[cfg(any(test, feature = "testkit"))]
pub mod testkit;
