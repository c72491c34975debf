mod support;

use devcluster::domain::{Cluster, FieldSelector, Product};
use devcluster::error::Error;
use devcluster::port::outbound::kube::{CLUSTER_CONFIG_CONFIGMAP, LOCAL_REGISTRY_HOSTING_CONFIGMAP, LOCAL_REGISTRY_HOSTING_KEY};
use devcluster::testkit::fixture::{self, Harness};
use devcluster::testkit::platform::FakePlatform;
use devcluster::testkit::runtime::FakeRuntime;
use serde_json::json;
use std::time::Duration;

use support::{kind, lifecycle_calls, stdin_of};

#[tokio::test]
async fn kind_apply_creates_default_cluster() {
    let h = Harness::new();

    let cluster = h.clusters.apply(&kind()).await.unwrap();

    assert_eq!(cluster.name, "kind-kind");
    assert_eq!(cluster.product, Product::Kind);
    assert!(cluster.is_running());
    assert!(cluster.status.current);
    assert_eq!(h.world.current_context().as_deref(), Some("kind-kind"));
    assert_eq!(h.world.calls("kind", &["create", "cluster", "--name", "kind"]).len(), 1);
}

#[tokio::test]
async fn second_identical_apply_changes_nothing() {
    let h = Harness::new();
    let desired = kind().with_config(json!({"nodes": [{"role": "control-plane"}]}));

    h.clusters.apply(&desired).await.unwrap();
    h.clusters.apply(&desired).await.unwrap();

    assert_eq!(lifecycle_calls(&h, "kind"), ["create"]);
    assert!(h.runtime.mutations().is_empty());
}

#[tokio::test]
async fn config_change_deletes_then_recreates() {
    let h = Harness::new();
    let one_node = json!({"nodes": [{"role": "control-plane"}]});
    let two_nodes = json!({"nodes": [{"role": "control-plane"}, {"role": "worker"}]});

    h.clusters.apply(&kind().with_config(one_node)).await.unwrap();
    let cluster = h.clusters.apply(&kind().with_config(two_nodes.clone())).await.unwrap();

    assert_eq!(lifecycle_calls(&h, "kind"), ["create", "delete", "create"]);
    assert_eq!(cluster.config, Some(two_nodes));
    assert!(h.world.config_map("kind-kind", CLUSTER_CONFIG_CONFIGMAP).is_some());
}

#[tokio::test]
async fn kubernetes_minor_change_recreates() {
    let h = Harness::new();
    h.world.add_cluster("kind-kind", "https://127.0.0.1:39001", "v1.28.7");

    h.clusters
        .apply(&kind().with_kubernetes_version("v1.29.2"))
        .await
        .unwrap();

    assert_eq!(lifecycle_calls(&h, "kind"), ["delete", "create"]);
    let create = &h.world.calls("kind", &["create", "cluster"])[0];
    assert!(create.flag_value("--image").unwrap().starts_with("kindest/node:v1.29"));
}

#[tokio::test]
async fn patch_release_difference_is_tolerated() {
    let h = Harness::new();
    h.world.add_cluster("kind-kind", "https://127.0.0.1:39001", "v1.29.8");

    h.clusters
        .apply(&kind().with_kubernetes_version("v1.29.2"))
        .await
        .unwrap();

    assert!(lifecycle_calls(&h, "kind").is_empty());
}

#[tokio::test]
async fn stopped_kind_cluster_is_deleted_then_recreated() {
    let h = Harness::new();
    h.world.add_stopped_cluster("kind-kind", "https://127.0.0.1:39001");

    let cluster = h.clusters.apply(&kind()).await.unwrap();

    assert!(cluster.is_running());
    assert_eq!(lifecycle_calls(&h, "kind"), ["delete", "create"]);
    assert_eq!(h.world.current_context().as_deref(), Some("kind-kind"));
}

#[tokio::test]
async fn stopped_k3d_cluster_is_deleted_then_recreated() {
    let h = Harness::new();
    h.world.add_stopped_cluster("k3d-dev", "https://0.0.0.0:39002");

    let cluster = h
        .clusters
        .apply(&Cluster::new(Product::K3d).with_name("k3d-dev"))
        .await
        .unwrap();

    assert!(cluster.is_running());
    assert_eq!(lifecycle_calls(&h, "k3d"), ["delete", "create"]);
}

#[tokio::test]
async fn orphan_kind_context_is_cleared_before_create() {
    let h = Harness::new();
    h.world.add_orphan_context("kind-kind", "https://127.0.0.1:39001");

    let cluster = h.clusters.apply(&kind()).await.unwrap();

    assert!(cluster.is_running());
    assert_eq!(lifecycle_calls(&h, "kind"), ["delete", "create"]);
}

#[tokio::test]
async fn stopped_minikube_profile_is_restarted_in_place() {
    let h = Harness::new();
    h.minikube_profile("minikube", 4);
    h.world.add_stopped_cluster("minikube", "https://192.168.49.2:8443");

    let cluster = h.clusters.apply(&Cluster::new(Product::Minikube)).await.unwrap();

    assert!(cluster.is_running());
    assert_eq!(lifecycle_calls(&h, "minikube"), ["create"]);
}

#[tokio::test]
async fn cpu_increase_resizes_engine_without_recreating() {
    let h = Harness::desktop(FakePlatform::desktop());
    h.world.add_cluster("kind-kind", "https://127.0.0.1:39001", "v1.29.2");

    h.clusters.apply(&kind().with_min_cpus(4)).await.unwrap();

    assert!(lifecycle_calls(&h, "kind").is_empty());
    assert_eq!(h.settings.submit_count(), 1);
    assert_eq!(h.settings.last_submitted().unwrap()["cpus"], json!(4));
    assert_eq!(h.settings.last_submitted().unwrap()["kubernetesEnabled"], json!(false));
}

#[tokio::test]
async fn sufficient_engine_settings_are_not_rewritten() {
    let mut settings = fixture::desktop_settings();
    settings["cpus"]["value"] = json!(6);
    let h = Harness::build(FakePlatform::desktop(), FakeRuntime::new().with_cpus(2), settings);
    h.world.add_cluster("kind-kind", "https://127.0.0.1:39001", "v1.29.2");

    h.clusters.apply(&kind().with_min_cpus(4)).await.unwrap();

    assert_eq!(h.settings.fetch_count(), 1);
    assert_eq!(h.settings.submit_count(), 0);
    assert!(h.clock.sleeps().is_empty());
}

#[tokio::test]
async fn cpu_increase_on_fixed_platform_fails_before_any_mutation() {
    let h = Harness::desktop(FakePlatform::desktop().without_resize());

    let err = h
        .clusters
        .apply(&kind().with_registry("kind-registry").with_min_cpus(4))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert!(err.to_string().contains("cannot automatically set minimum CPU"), "{err}");
    assert!(h.world.invocations().is_empty());
    assert!(h.runtime.mutations().is_empty());
    assert_eq!(h.settings.submit_count(), 0);
}

#[tokio::test]
async fn minikube_profile_short_on_cpus_fails_on_plain_daemon() {
    let h = Harness::new();
    h.minikube_profile("minikube", 2);

    let err = h
        .clusters
        .apply(&Cluster::new(Product::Minikube).with_min_cpus(4))
        .await
        .unwrap_err();

    assert!(err.to_string().contains("cannot automatically set minimum CPU"), "{err}");
    assert!(lifecycle_calls(&h, "minikube").is_empty());
}

#[tokio::test]
async fn registry_is_created_before_the_cluster_and_attached_after() {
    let h = Harness::new();

    let cluster = h.clusters.apply(&kind().with_registry("kind-registry")).await.unwrap();

    let registry = h.registries.get("kind-registry").await.unwrap();
    let port = registry.status.host_port;
    assert_ne!(port, 0);
    assert!(registry.is_on_network("kind"));
    assert_eq!(
        h.runtime.mutations(),
        ["create kind-registry", "start ctr-1", "connect kind kind-registry"]
    );

    let create = &h.world.calls("kind", &["create", "cluster"])[0];
    assert!(stdin_of(create).contains("containerdConfigPatches"));

    let mirror = &h.world.calls("docker", &["exec", "-i", "kind-control-plane"])[0];
    assert!(mirror.args.last().unwrap().contains(&format!("certs.d/localhost:{port}")));
    assert_eq!(stdin_of(mirror), "[host.\"http://kind-registry:5000\"]\n");

    let hosting = h
        .world
        .config_map("kind-kind", LOCAL_REGISTRY_HOSTING_CONFIGMAP)
        .unwrap();
    assert!(hosting[LOCAL_REGISTRY_HOSTING_KEY].contains(&format!("localhost:{port}")));
    assert_eq!(cluster.registry.as_deref(), Some("kind-registry"));
}

#[tokio::test]
async fn failed_create_leaves_registry_in_place() {
    let h = Harness::new();
    h.world.fail_command("kind", &["create", "cluster"]);

    let err = h.clusters.apply(&kind().with_registry("kind-registry")).await.unwrap_err();

    assert!(matches!(err, Error::ExternalTool { .. }));
    assert!(h.runtime.container("kind-registry").is_some());
    assert!(!h.world.has_cluster("kind-kind"));
}

#[tokio::test]
async fn attached_registry_is_not_reattached() {
    let h = Harness::new();
    let desired = kind().with_registry("kind-registry");

    h.clusters.apply(&desired).await.unwrap();
    h.clusters.apply(&desired).await.unwrap();

    assert_eq!(h.world.calls("docker", &["exec"]).len(), 1);
    assert_eq!(lifecycle_calls(&h, "kind"), ["create"]);
}

#[tokio::test]
async fn k3d_cluster_uses_the_registry_in_network_address() {
    let h = Harness::new();

    let cluster = h
        .clusters
        .apply(&Cluster::new(Product::K3d).with_registry("k3d-registry"))
        .await
        .unwrap();

    assert_eq!(cluster.name, "k3d-k3s-default");
    let config = h.world.config_files().pop().unwrap();
    assert!(config.contains("k3d-registry:5000"), "{config}");
    assert!(config.contains("kind: Simple"), "{config}");
}

#[tokio::test]
async fn minikube_start_passes_kubernetes_version() {
    let h = Harness::new();
    h.minikube_profile("minikube", 4);

    let cluster = h
        .clusters
        .apply(&Cluster::new(Product::Minikube).with_kubernetes_version("v1.30.0"))
        .await
        .unwrap();

    assert_eq!(cluster.name, "minikube");
    assert_eq!(cluster.status.cpus, 4);
    let start = &h.world.calls("minikube", &["start", "-p", "minikube"])[0];
    assert!(start.args.iter().any(|a| a == "--kubernetes-version=v1.30.0"));
}

#[tokio::test]
async fn docker_desktop_on_fresh_workstation_waits_for_its_context() {
    let h = Harness::desktop(FakePlatform::desktop());

    let cluster = h
        .clusters
        .apply(&Cluster::new(Product::DockerDesktop))
        .await
        .unwrap();

    assert_eq!(cluster.name, "docker-desktop");
    assert!(cluster.is_running());
    assert_eq!(h.world.current_context().as_deref(), Some("docker-desktop"));
    assert_eq!(h.settings.document()["kubernetesEnabled"], json!(true));
    assert_eq!(h.clock.elapsed(), Duration::from_secs(2));
}

#[tokio::test]
async fn docker_desktop_registry_is_published_once_kubernetes_is_up() {
    let h = Harness::desktop(FakePlatform::desktop());

    h.clusters
        .apply(&Cluster::new(Product::DockerDesktop).with_registry("ctlptl-registry"))
        .await
        .unwrap();

    let port = h.registries.get("ctlptl-registry").await.unwrap().status.host_port;
    let hosting = h
        .world
        .config_map("docker-desktop", LOCAL_REGISTRY_HOSTING_CONFIGMAP)
        .unwrap();
    assert!(hosting[LOCAL_REGISTRY_HOSTING_KEY].contains(&format!("localhost:{port}")));
}

#[tokio::test]
async fn docker_desktop_that_never_starts_times_out_before_switching_context() {
    let h = Harness::desktop(FakePlatform::desktop());
    h.world.set_desktop_boot_checks(None);

    let err = h
        .clusters
        .apply(&Cluster::new(Product::DockerDesktop))
        .await
        .unwrap_err();

    assert!(matches!(err, Error::Timeout(_)), "{err:?}");
    assert_eq!(
        err.to_string(),
        "timed out after 3m waiting for cluster docker-desktop to become ready"
    );
    assert_eq!(h.clock.elapsed(), Duration::from_secs(180));
    assert_eq!(h.world.current_context(), None);
}

#[tokio::test]
async fn docker_desktop_enables_kubernetes_in_settings() {
    let h = Harness::desktop(FakePlatform::desktop());
    h.world.add_stopped_cluster("docker-desktop", "https://kubernetes.docker.internal:6443");

    let cluster = h
        .clusters
        .apply(&Cluster::new(Product::DockerDesktop))
        .await
        .unwrap();

    assert_eq!(cluster.name, "docker-desktop");
    assert!(cluster.is_running());
    assert_eq!(h.settings.document()["kubernetesEnabled"], json!(true));
    assert_eq!(h.settings.reset_count(), 0);
}

#[tokio::test]
async fn missing_backend_tool_is_reported_with_install_help() {
    let h = Harness::new();
    h.world.uninstall("kind");

    let err = h.clusters.apply(&kind()).await.unwrap_err();

    let Error::NotInstalled { tool, help } = &err else {
        panic!("expected NotInstalled, got {err:?}");
    };
    assert_eq!(*tool, "kind");
    assert!(help.contains("https://"));
}

#[tokio::test]
async fn name_must_match_product_convention() {
    let h = Harness::new();

    let err = h.clusters.apply(&kind().with_name("dev")).await.unwrap_err();

    assert!(matches!(err, Error::Validation(_)));
    assert!(h.world.invocations().is_empty());
}

#[tokio::test]
async fn in_container_kubeconfig_points_at_control_plane() {
    let h = Harness::build(FakePlatform::plain_daemon().in_container(), FakeRuntime::new(), fixture::desktop_settings());

    h.clusters.apply(&kind()).await.unwrap();

    let context = h.world.context("kind-kind").unwrap();
    assert_eq!(context.server.as_deref(), Some("https://kind-control-plane:6443"));
}

#[tokio::test]
async fn list_filters_by_product_and_delete_forgets_context() {
    let h = Harness::new();
    h.world.add_cluster("kind-kind", "https://127.0.0.1:39001", "v1.29.2");
    h.world.add_cluster("k3d-dev", "https://0.0.0.0:39002", "v1.29.2");
    h.world.add_stopped_cluster("minikube", "https://192.168.49.2:8443");

    let kinds = h.clusters.list(&FieldSelector::parse("product=kind").unwrap()).await.unwrap();
    let all = h.clusters.list(&FieldSelector::everything()).await.unwrap();
    assert_eq!(kinds.len(), 1);
    assert_eq!(
        all.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
        ["k3d-dev", "kind-kind", "minikube"]
    );

    h.clusters.delete("k3d-dev").await.unwrap();

    assert!(h.world.context("k3d-dev").is_none());
    assert!(h.clusters.get("k3d-dev").await.unwrap_err().is_not_found());
}
