//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe the infrastructure the reconcilers drive: the
//! container engine, external CLI tools, kubeconfig and the Kubernetes API,
//! the desktop settings channel, OS capabilities and port forwarding.

pub mod command;
pub mod container;
pub mod forwarder;
pub mod kube;
pub mod platform;
pub mod settings;

pub use command::{CommandOutput, CommandRunner, Invocation};
pub use container::{ContainerInfo, ContainerRuntime, ContainerSpec, PortBinding, PortMapping};
pub use forwarder::PortForwarder;
pub use kube::{ClusterInspector, ContextStore, KubeContext};
pub use platform::{Os, Platform};
pub use settings::{SettingsChannel, SettingsTransport};
