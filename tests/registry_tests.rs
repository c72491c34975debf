mod support;

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use devcluster::application::{RegistryController, RegistryDefaults};
use devcluster::domain::{ContainerState, FieldSelector, Registry};
use devcluster::error::Result;
use devcluster::port::outbound::PortForwarder;
use devcluster::testkit::runtime::FakeRuntime;

use support::REGISTRY_IMAGE;

fn controller(runtime: &Arc<FakeRuntime>) -> RegistryController {
    RegistryController::new(runtime.clone(), RegistryDefaults::default())
}

#[derive(Default)]
struct RecordingForwarder {
    forwarded: Mutex<Vec<(u16, String)>>,
}

#[async_trait]
impl PortForwarder for RecordingForwarder {
    async fn forward(&self, port: u16, remote_host: &str) -> Result<()> {
        self.forwarded.lock().push((port, remote_host.to_string()));
        Ok(())
    }
}

#[tokio::test]
async fn new_registry_gets_a_free_port() {
    let runtime = Arc::new(FakeRuntime::new());

    let registry = controller(&runtime).apply(&Registry::named("ctlptl-registry")).await.unwrap();

    assert_ne!(registry.status.host_port, 0);
    assert_eq!(registry.status.container_port, 5000);
    assert_eq!(registry.status.state, ContainerState::Running);
    assert_eq!(runtime.mutations(), ["create ctlptl-registry", "start ctr-1"]);
}

#[tokio::test]
async fn running_registry_on_the_right_port_is_left_alone() {
    let runtime = Arc::new(FakeRuntime::new());
    runtime.add_container("kind-registry", REGISTRY_IMAGE, Some(5001), ContainerState::Running);

    let registry = controller(&runtime)
        .apply(&Registry::named("kind-registry").with_port(5001))
        .await
        .unwrap();

    assert_eq!(registry.status.host_port, 5001);
    assert!(runtime.mutations().is_empty());
}

#[tokio::test]
async fn port_change_replaces_the_container() {
    let runtime = Arc::new(FakeRuntime::new());
    runtime.add_container("kind-registry", REGISTRY_IMAGE, Some(5001), ContainerState::Running);

    let registry = controller(&runtime)
        .apply(&Registry::named("kind-registry").with_port(5002))
        .await
        .unwrap();

    assert_eq!(registry.status.host_port, 5002);
    assert_eq!(
        runtime.mutations(),
        ["remove ctr-1", "create kind-registry", "start ctr-2"]
    );
}

#[tokio::test]
async fn exited_registry_is_recreated_on_its_old_port() {
    let runtime = Arc::new(FakeRuntime::new());
    runtime.add_container("kind-registry", REGISTRY_IMAGE, Some(5003), ContainerState::Exited);

    let registry = controller(&runtime).apply(&Registry::named("kind-registry")).await.unwrap();

    assert_eq!(registry.status.host_port, 5003);
    assert_eq!(registry.status.state, ContainerState::Running);
    assert_eq!(
        runtime.mutations(),
        ["remove ctr-1", "create kind-registry", "start ctr-2"]
    );
}

#[tokio::test]
async fn list_only_sees_registry_images() {
    let runtime = Arc::new(FakeRuntime::new());
    runtime.add_container("kind-registry", REGISTRY_IMAGE, Some(5001), ContainerState::Running);
    runtime.add_container("mirror", "docker.io/library/registry:2", Some(5002), ContainerState::Exited);
    runtime.add_container("web", "nginx:latest", None, ContainerState::Running);

    let all = controller(&runtime).list(&FieldSelector::everything()).await.unwrap();
    let running = controller(&runtime)
        .list(&FieldSelector::parse("state=running").unwrap())
        .await
        .unwrap();

    assert_eq!(all.iter().map(|r| r.name.as_str()).collect::<Vec<_>>(), ["kind-registry", "mirror"]);
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].name, "kind-registry");
}

#[tokio::test]
async fn get_and_delete_of_missing_registry_are_not_found() {
    let runtime = Arc::new(FakeRuntime::new());
    let registries = controller(&runtime);

    assert!(registries.get("nope").await.unwrap_err().is_not_found());
    assert!(registries.delete("nope").await.unwrap_err().is_not_found());
}

#[tokio::test]
async fn delete_removes_the_container() {
    let runtime = Arc::new(FakeRuntime::new());
    runtime.add_container("kind-registry", REGISTRY_IMAGE, Some(5001), ContainerState::Running);

    controller(&runtime).delete("kind-registry").await.unwrap();

    assert!(runtime.container("kind-registry").is_none());
}

#[tokio::test]
async fn remote_engine_forwards_the_registry_port() {
    let runtime = Arc::new(FakeRuntime::new().with_host("ssh://dev@build-box"));
    let forwarder = Arc::new(RecordingForwarder::default());
    let registries = controller(&runtime).with_forwarder(forwarder.clone());

    let registry = registries.apply(&Registry::named("kind-registry").with_port(5001)).await.unwrap();

    assert_eq!(registry.status.listen_address, "0.0.0.0");
    assert_eq!(*forwarder.forwarded.lock(), [(5001, "build-box".to_string())]);
}

#[tokio::test]
async fn loopback_registry_on_remote_engine_is_rebound() {
    let runtime = Arc::new(FakeRuntime::new().with_host("ssh://dev@build-box"));
    runtime.add_container("kind-registry", REGISTRY_IMAGE, Some(5001), ContainerState::Running);
    let forwarder = Arc::new(RecordingForwarder::default());
    let registries = controller(&runtime).with_forwarder(forwarder.clone());

    let registry = registries.apply(&Registry::named("kind-registry")).await.unwrap();

    assert_eq!(registry.status.host_port, 5001);
    assert_eq!(registry.status.listen_address, "0.0.0.0");
    assert_eq!(
        runtime.mutations(),
        ["remove ctr-1", "create kind-registry", "start ctr-2"]
    );
    assert_eq!(*forwarder.forwarded.lock(), [(5001, "build-box".to_string())]);
}

#[tokio::test]
async fn explicit_listen_address_wins_on_remote_engine() {
    let runtime = Arc::new(FakeRuntime::new().with_host("tcp://10.0.0.7:2376"));
    let mut desired = Registry::named("kind-registry");
    desired.listen_address = Some("10.0.0.7".to_string());

    let registry = controller(&runtime).apply(&desired).await.unwrap();

    assert_eq!(registry.status.listen_address, "10.0.0.7");
}

#[tokio::test]
async fn local_engine_binds_loopback_by_default() {
    let runtime = Arc::new(FakeRuntime::new());

    let registry = controller(&runtime).apply(&Registry::named("kind-registry")).await.unwrap();

    assert_eq!(registry.status.listen_address, "127.0.0.1");
}

#[tokio::test]
async fn local_engine_never_forwards() {
    let runtime = Arc::new(FakeRuntime::new());
    let forwarder = Arc::new(RecordingForwarder::default());
    let registries = controller(&runtime).with_forwarder(forwarder.clone());

    registries.apply(&Registry::named("kind-registry")).await.unwrap();

    assert!(forwarder.forwarded.lock().is_empty());
}

#[tokio::test]
async fn remote_engine_without_forwarder_still_applies() {
    let runtime = Arc::new(FakeRuntime::new().with_host("tcp://10.0.0.7:2376"));

    let registry = controller(&runtime).apply(&Registry::named("kind-registry")).await.unwrap();

    assert_eq!(registry.status.state, ContainerState::Running);
}
