//! Handlers for `devcluster registry ...`.

use tabled::{Table, Tabled};

use crate::adapter::inbound::cli::command::{GetArgs, RegistryApplyArgs};
use crate::adapter::inbound::cli::{manifest, output};
use crate::application::RegistryController;
use crate::domain::{FieldSelector, Registry};
use crate::error::Result;

#[derive(Tabled)]
struct RegistryRow {
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "HOST ADDRESS")]
    host: String,
    #[tabled(rename = "CONTAINER ADDRESS")]
    container: String,
    #[tabled(rename = "STATE")]
    state: String,
    #[tabled(rename = "NETWORKS")]
    networks: String,
}

impl From<&Registry> for RegistryRow {
    fn from(registry: &Registry) -> Self {
        let status = &registry.status;
        Self {
            name: registry.name.clone(),
            host: if status.host_port == 0 {
                "none".to_string()
            } else {
                format!("{}:{}", status.listen_address, status.host_port)
            },
            container: if status.ip_address.is_empty() {
                "none".to_string()
            } else {
                format!("{}:{}", status.ip_address, status.container_port)
            },
            state: status.state.to_string(),
            networks: status.networks.join(","),
        }
    }
}

fn declared(args: &RegistryApplyArgs) -> Result<Vec<Registry>> {
    if let Some(path) = &args.file {
        return manifest::documents(&manifest::read(path)?);
    }
    let mut registry = Registry::named(args.name.clone().unwrap_or_default());
    registry.port = args.port;
    registry.listen_address = args.listen_address.clone();
    registry.image = args.image.clone();
    Ok(vec![registry])
}

fn print(registries: &[Registry]) -> Result<()> {
    if output::is_json() {
        match registries {
            [one] => output::json_output(one)?,
            many => output::json_output(many)?,
        }
        return Ok(());
    }
    if registries.is_empty() {
        output::hint("no registries found");
        return Ok(());
    }
    let rows: Vec<RegistryRow> = registries.iter().map(RegistryRow::from).collect();
    output::lines(&Table::new(rows).to_string());
    for registry in registries {
        for warning in &registry.status.warnings {
            output::warning(&format!("{}: {warning}", registry.name));
        }
    }
    Ok(())
}

pub async fn apply(registries: &RegistryController, args: &RegistryApplyArgs) -> Result<()> {
    let mut applied = Vec::new();
    for desired in declared(args)? {
        output::action("Applying", &format!("registry {}", desired.name));
        let registry = registries.apply(&desired).await?;
        output::success(&format!(
            "registry {} listening on {}",
            registry.name,
            registry.host_address()
        ));
        applied.push(registry);
    }
    print(&applied)
}

pub async fn get(registries: &RegistryController, args: &GetArgs) -> Result<()> {
    let found = match (&args.name, &args.field_selector) {
        (Some(name), _) => vec![registries.get(name).await?],
        (None, Some(selector)) => registries.list(&FieldSelector::parse(selector)?).await?,
        (None, None) => registries.list(&FieldSelector::everything()).await?,
    };
    print(&found)
}

pub async fn delete(registries: &RegistryController, name: &str) -> Result<()> {
    output::action("Deleting", &format!("registry {name}"));
    registries.delete(name).await?;
    output::success(&format!("registry {name} deleted"));
    if output::is_json() {
        output::json_output(&serde_json::json!({ "deleted": name }))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::fixture;

    #[test]
    fn row_shows_host_and_container_addresses() {
        let mut registry = fixture::running_registry("kind-registry", 5001);
        registry.status.ip_address = "172.18.0.4".into();
        registry.status.networks = vec!["kind".into(), "bridge".into()];

        let row = RegistryRow::from(&registry);

        assert_eq!(row.host, "127.0.0.1:5001");
        assert_eq!(row.container, "172.18.0.4:5000");
        assert_eq!(row.networks, "kind,bridge");
    }

    #[test]
    fn flags_build_a_declaration() {
        let args = RegistryApplyArgs {
            file: None,
            name: Some("ctlreg".into()),
            port: Some(5005),
            listen_address: None,
            image: None,
        };
        let registries = declared(&args).unwrap();
        assert_eq!(registries[0].port, Some(5005));
    }
}
