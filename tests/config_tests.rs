use std::io::Write;
use std::time::Duration;

use devcluster::error::{ConfigError, Error};
use devcluster::infrastructure::config::Config;

fn write_config(content: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file
}

#[test]
fn full_file_overrides_every_section() {
    let file = write_config(
        r#"
[logging]
level = "debug"
format = "json"

[timing]
poll_interval_ms = 250
engine_start_timeout_secs = 30
engine_restart_timeout_secs = 90
cluster_ready_timeout_secs = 300
settings_settle_ms = 500
status_concurrency = 2

[registry]
default_image = "ghcr.io/acme/registry:2"
default_listen_address = "0.0.0.0"

[kubeconfig]
path = "/tmp/devcluster-kubeconfig"
"#,
    );

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.logging.format, "json");
    assert_eq!(config.registry.defaults().image, "ghcr.io/acme/registry:2");
    assert_eq!(config.registry.defaults().listen_address, "0.0.0.0");
    let timing = config.timing.machine_timing();
    assert_eq!(timing.start.interval, Duration::from_millis(250));
    assert_eq!(timing.restart.deadline, Duration::from_secs(90));
    assert_eq!(timing.settle, Duration::from_millis(500));
    assert_eq!(config.timing.cluster_ready().deadline, Duration::from_secs(300));
    assert_eq!(
        config.kubeconfig.path.as_deref(),
        Some(std::path::Path::new("/tmp/devcluster-kubeconfig"))
    );
}

#[test]
fn partial_file_keeps_defaults_elsewhere() {
    let file = write_config("[registry]\ndefault_listen_address = \"0.0.0.0\"\n");

    let config = Config::load(file.path()).unwrap();

    assert_eq!(config.timing, Config::default().timing);
    assert_eq!(config.registry.default_image, Config::default().registry.default_image);
}

#[test]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("absent.toml");

    let err = Config::discover(Some(&missing)).unwrap_err();

    assert!(matches!(err, Error::Config(ConfigError::ReadFile(_))), "{err:?}");
}

#[test]
fn invalid_values_are_rejected_on_load() {
    let zero = write_config("[timing]\nengine_start_timeout_secs = 0\n");
    let format = write_config("[logging]\nformat = \"xml\"\n");
    let image = write_config("[registry]\ndefault_image = \"\"\n");

    assert!(Config::load(zero.path()).unwrap_err().to_string().contains("engine_start_timeout_secs"));
    assert!(Config::load(format.path()).unwrap_err().to_string().contains("xml"));
    assert!(matches!(
        Config::load(image.path()).unwrap_err(),
        Error::Config(ConfigError::MissingField { field: "default_image" })
    ));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let file = write_config("[timing\n");

    assert!(matches!(
        Config::load(file.path()).unwrap_err(),
        Error::Config(ConfigError::Parse(_))
    ));
}
