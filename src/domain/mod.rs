//! Backend-agnostic types: clusters, registries, products and the engine
//! settings document.

pub mod cluster;
pub mod engine;
pub mod product;
pub mod registry;
pub mod selector;
pub mod settings;
pub mod version;

pub use cluster::{Cluster, ClusterStatus, LocalRegistryHosting};
pub use engine::EngineHost;
pub use product::{Product, MINIKUBE_PROVIDER};
pub use registry::{ContainerState, Registry, RegistryStatus};
pub use selector::FieldSelector;
pub use settings::SettingsNode;
pub use version::ToolVersion;
