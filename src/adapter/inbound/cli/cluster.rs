//! Handlers for `devcluster cluster ...`.

use chrono::Utc;
use tabled::{Table, Tabled};

use crate::adapter::inbound::cli::command::{ClusterApplyArgs, GetArgs};
use crate::adapter::inbound::cli::{manifest, output};
use crate::application::ClusterController;
use crate::domain::{Cluster, FieldSelector};
use crate::error::{Error, Result};

#[derive(Tabled)]
struct ClusterRow {
    #[tabled(rename = "CURRENT")]
    current: &'static str,
    #[tabled(rename = "NAME")]
    name: String,
    #[tabled(rename = "PRODUCT")]
    product: String,
    #[tabled(rename = "AGE")]
    age: String,
    #[tabled(rename = "REGISTRY")]
    registry: String,
    #[tabled(rename = "CPUS")]
    cpus: u32,
    #[tabled(rename = "VERSION")]
    version: String,
}

impl From<&Cluster> for ClusterRow {
    fn from(cluster: &Cluster) -> Self {
        Self {
            current: if cluster.status.current { "*" } else { "" },
            name: cluster.name.clone(),
            product: cluster.product.to_string(),
            age: cluster
                .status
                .creation_timestamp
                .map_or_else(|| "none".to_string(), |created| age(Utc::now() - created)),
            registry: cluster.registry.clone().unwrap_or_else(|| "none".to_string()),
            cpus: cluster.status.cpus,
            version: cluster
                .status
                .kubernetes_version
                .clone()
                .unwrap_or_default(),
        }
    }
}

/// `kubectl`-style age: the largest unit that fits.
fn age(elapsed: chrono::Duration) -> String {
    let secs = elapsed.num_seconds().max(0);
    match secs {
        0..=59 => format!("{secs}s"),
        60..=3599 => format!("{}m", secs / 60),
        3600..=86_399 => format!("{}h", secs / 3600),
        _ => format!("{}d", secs / 86_400),
    }
}

fn declared(args: &ClusterApplyArgs) -> Result<Vec<Cluster>> {
    if let Some(path) = &args.file {
        return manifest::documents(&manifest::read(path)?);
    }
    let Some(product) = args.product else {
        return Err(Error::Validation(
            "either --filename or --product is required".to_string(),
        ));
    };
    let mut cluster = Cluster::new(product);
    cluster.name = args.name.clone().unwrap_or_default();
    cluster.min_cpus = args.min_cpus.unwrap_or_default();
    cluster.kubernetes_version = args.kubernetes_version.clone();
    cluster.registry = args.registry.clone();
    Ok(vec![cluster])
}

fn print(clusters: &[Cluster]) -> Result<()> {
    if output::is_json() {
        match clusters {
            [one] => output::json_output(one)?,
            many => output::json_output(many)?,
        }
        return Ok(());
    }
    if clusters.is_empty() {
        output::hint("no clusters found");
        return Ok(());
    }
    let rows: Vec<ClusterRow> = clusters.iter().map(ClusterRow::from).collect();
    output::lines(&Table::new(rows).to_string());
    for cluster in clusters {
        if let Some(error) = &cluster.status.error {
            output::warning(&format!("{}: {error}", cluster.name));
        }
    }
    Ok(())
}

pub async fn apply(clusters: &ClusterController, args: &ClusterApplyArgs) -> Result<()> {
    let mut applied = Vec::new();
    for desired in declared(args)? {
        let label = if desired.name.is_empty() {
            desired.product.to_string()
        } else {
            desired.name.clone()
        };
        output::action("Applying", &format!("cluster {label}"));
        let cluster = clusters.apply(&desired).await?;
        output::success(&format!("cluster {} ready", cluster.name));
        applied.push(cluster);
    }
    print(&applied)
}

pub async fn get(clusters: &ClusterController, args: &GetArgs) -> Result<()> {
    let found = match (&args.name, &args.field_selector) {
        (Some(name), _) => vec![clusters.get(name).await?],
        (None, Some(selector)) => clusters.list(&FieldSelector::parse(selector)?).await?,
        (None, None) => clusters.list(&FieldSelector::everything()).await?,
    };
    print(&found)
}

pub async fn delete(clusters: &ClusterController, name: &str) -> Result<()> {
    output::action("Deleting", &format!("cluster {name}"));
    clusters.delete(name).await?;
    output::success(&format!("cluster {name} deleted"));
    if output::is_json() {
        output::json_output(&serde_json::json!({ "deleted": name }))?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Product;

    #[test]
    fn age_uses_largest_unit() {
        assert_eq!(age(chrono::Duration::seconds(42)), "42s");
        assert_eq!(age(chrono::Duration::minutes(90)), "1h");
        assert_eq!(age(chrono::Duration::days(3)), "3d");
    }

    #[test]
    fn flags_build_a_declaration() {
        let args = ClusterApplyArgs {
            file: None,
            product: Some(Product::K3d),
            name: Some("k3d-dev".into()),
            min_cpus: Some(4),
            kubernetes_version: None,
            registry: Some("k3d-registry".into()),
        };
        let clusters = declared(&args).unwrap();
        assert_eq!(clusters[0].name, "k3d-dev");
        assert_eq!(clusters[0].min_cpus, 4);
        assert_eq!(clusters[0].registry.as_deref(), Some("k3d-registry"));
    }

    #[test]
    fn product_or_file_is_required() {
        let args = ClusterApplyArgs {
            file: None,
            product: None,
            name: None,
            min_cpus: None,
            kubernetes_version: None,
            registry: None,
        };
        assert!(matches!(declared(&args), Err(Error::Validation(_))));
    }
}
