use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};

use devcluster::application::desktop::SettingsClient;
use devcluster::application::machine::{DesktopMachine, Machine};
use devcluster::domain::{Cluster, Product};
use devcluster::error::Error;
use devcluster::testkit::clock::FakeClock;
use devcluster::testkit::fixture;
use devcluster::testkit::platform::FakePlatform;
use devcluster::testkit::runtime::FakeRuntime;
use devcluster::testkit::settings::FakeSettings;
use devcluster::testkit::world::FakeWorld;

struct Rig {
    machine: DesktopMachine,
    runtime: Arc<FakeRuntime>,
    world: FakeWorld,
    settings: Arc<FakeSettings>,
    clock: Arc<FakeClock>,
}

fn rig(platform: FakePlatform, document: Value) -> Rig {
    let runtime = Arc::new(FakeRuntime::new().with_cpus(2));
    let world = FakeWorld::new();
    let settings = Arc::new(FakeSettings::new(document));
    let clock = Arc::new(FakeClock::new());
    let machine = DesktopMachine::new(
        runtime.clone(),
        world.runner(),
        Arc::new(platform),
        Some(SettingsClient::new(settings.clone())),
        clock.clone(),
        fixture::timing(),
    );
    Rig {
        machine,
        runtime,
        world,
        settings,
        clock,
    }
}

fn observed(product: Product, cpus: u32) -> Cluster {
    let mut cluster = Cluster::new(product);
    cluster.status.cpus = cpus;
    cluster
}

#[tokio::test]
async fn reachable_engine_needs_no_start() {
    let r = rig(FakePlatform::desktop(), fixture::desktop_settings());

    r.machine.ensure_exists().await.unwrap();

    assert!(r.world.spawned().is_empty());
    assert_eq!(r.runtime.version_probes(), 1);
}

#[tokio::test]
async fn stopped_desktop_engine_is_started_and_polled() {
    let r = rig(FakePlatform::desktop(), fixture::desktop_settings());
    r.runtime.fail_version_probes(3);

    r.machine.ensure_exists().await.unwrap();

    let spawned = r.world.spawned();
    assert_eq!(spawned.len(), 1);
    assert_eq!(spawned[0].program, "open");
    assert_eq!(r.runtime.version_probes(), 4);
    assert_eq!(r.clock.elapsed(), Duration::from_secs(2));
}

#[tokio::test]
async fn engine_that_never_starts_times_out() {
    let r = rig(FakePlatform::desktop(), fixture::desktop_settings());
    r.runtime.go_offline();

    let err = r.machine.ensure_exists().await.unwrap_err();

    assert!(matches!(err, Error::Timeout(_)));
    assert_eq!(
        err.to_string(),
        "timed out after 1m waiting for the container engine to start"
    );
    assert_eq!(r.clock.elapsed(), Duration::from_secs(60));
}

#[tokio::test]
async fn plain_daemon_is_reported_unreachable() {
    let r = rig(FakePlatform::plain_daemon(), fixture::desktop_settings());
    r.runtime.go_offline();

    let err = r.machine.ensure_exists().await.unwrap_err();

    assert!(matches!(err, Error::Unreachable { .. }), "{err:?}");
    assert!(r.world.spawned().is_empty());
    assert_eq!(r.clock.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn desktop_without_start_command_is_unreachable() {
    let platform = FakePlatform {
        start: None,
        ..FakePlatform::desktop()
    };
    let r = rig(platform, fixture::desktop_settings());
    r.runtime.go_offline();

    let err = r.machine.ensure_exists().await.unwrap_err();

    assert!(err.to_string().contains("cannot be started automatically"), "{err}");
}

#[tokio::test]
async fn restart_raises_cpus_then_waits_for_engine() {
    let r = rig(FakePlatform::desktop(), fixture::desktop_settings());
    let desired = Cluster::new(Product::Kind).with_min_cpus(4);

    r.machine.restart(&desired, &observed(Product::Kind, 2)).await.unwrap();

    assert_eq!(r.settings.submit_count(), 1);
    assert_eq!(r.settings.last_submitted().unwrap()["cpus"], json!(4));
    assert_eq!(r.clock.sleeps().first(), Some(&Duration::from_secs(2)));
}

#[tokio::test]
async fn restart_times_out_when_engine_stays_down() {
    let r = rig(FakePlatform::desktop(), fixture::desktop_settings());
    r.runtime.go_offline();
    let desired = Cluster::new(Product::Kind).with_min_cpus(4);

    let err = r.machine.restart(&desired, &observed(Product::Kind, 2)).await.unwrap_err();

    assert!(err.to_string().contains("waiting for the container engine to restart"), "{err}");
    assert_eq!(r.settings.submit_count(), 1);
    assert_eq!(r.clock.elapsed(), Duration::from_secs(122));
}

#[tokio::test]
async fn restart_for_docker_desktop_enables_kubernetes() {
    let r = rig(FakePlatform::desktop(), fixture::desktop_settings());
    let desired = Cluster::new(Product::DockerDesktop);

    r.machine
        .restart(&desired, &observed(Product::DockerDesktop, 2))
        .await
        .unwrap();

    let written = r.settings.last_submitted().unwrap();
    assert_eq!(written["kubernetesEnabled"], json!(true));
    assert_eq!(written["cpus"], json!(2));
}

#[tokio::test]
async fn restart_with_nothing_to_change_is_a_no_op() {
    let mut document = fixture::desktop_settings();
    document["cpus"]["value"] = json!(8);
    let r = rig(FakePlatform::desktop(), document);
    let desired = Cluster::new(Product::Kind).with_min_cpus(4);

    r.machine.restart(&desired, &observed(Product::Kind, 2)).await.unwrap();

    assert_eq!(r.settings.fetch_count(), 1);
    assert_eq!(r.settings.submit_count(), 0);
    assert_eq!(r.clock.elapsed(), Duration::ZERO);
}

#[tokio::test]
async fn rejected_settings_write_surfaces_the_status() {
    let r = rig(FakePlatform::desktop(), fixture::desktop_settings());
    r.settings.reject_writes();
    let desired = Cluster::new(Product::Kind).with_min_cpus(4);

    let err = r.machine.restart(&desired, &observed(Product::Kind, 2)).await.unwrap_err();

    assert!(matches!(err, Error::Protocol(_)), "{err:?}");
    assert!(err.to_string().contains("500"), "{err}");
}

#[tokio::test]
async fn cpus_above_engine_maximum_are_rejected_without_writing() {
    let r = rig(FakePlatform::desktop(), fixture::desktop_settings());
    let desired = Cluster::new(Product::Kind).with_min_cpus(16);

    let err = r.machine.restart(&desired, &observed(Product::Kind, 2)).await.unwrap_err();

    assert!(err.to_string().contains("out of range"), "{err}");
    assert_eq!(r.settings.submit_count(), 0);
}

#[tokio::test]
async fn machine_reports_engine_cpus() {
    let r = rig(FakePlatform::desktop(), fixture::desktop_settings());
    r.runtime.set_cpus(6);

    assert_eq!(r.machine.cpus().await.unwrap(), 6);
}
