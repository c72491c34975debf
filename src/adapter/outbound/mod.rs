//! Outbound adapters (driven side).

pub mod desktop_socket;
pub mod docker;
pub mod forwarder;
pub mod kube;
pub mod kubeconfig;
pub mod platform;
pub mod process;

pub use desktop_socket::DesktopSocket;
pub use docker::DockerRuntime;
pub use forwarder::SocatForwarder;
pub use kube::KubeInspector;
pub use kubeconfig::KubeconfigFile;
pub use process::ProcessRunner;
