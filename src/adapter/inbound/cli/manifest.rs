//! Declarations read from YAML files.

use std::io::Read;
use std::path::Path;

use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::error::{Error, Result};

/// Read `path`, or stdin when it is `-`.
pub fn read(path: &Path) -> Result<String> {
    if path.as_os_str() == "-" {
        let mut text = String::new();
        std::io::stdin().read_to_string(&mut text)?;
        return Ok(text);
    }
    Ok(std::fs::read_to_string(path)?)
}

/// Every non-empty document in a multi-document YAML stream.
pub fn documents<T: DeserializeOwned>(text: &str) -> Result<Vec<T>> {
    let mut out = Vec::new();
    for document in serde_yaml::Deserializer::from_str(text) {
        let value = serde_yaml::Value::deserialize(document)?;
        if value.is_null() {
            continue;
        }
        out.push(serde_yaml::from_value(value)?);
    }
    if out.is_empty() {
        return Err(Error::Validation("no declarations found".to_string()));
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Cluster, Product};

    #[test]
    fn reads_every_document() {
        let text = "product: kind\nminCpus: 4\n---\n---\nproduct: k3d\nname: k3d-dev\n";
        let clusters: Vec<Cluster> = documents(text).unwrap();
        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].product, Product::Kind);
        assert_eq!(clusters[0].min_cpus, 4);
        assert_eq!(clusters[1].name, "k3d-dev");
    }

    #[test]
    fn empty_stream_is_rejected() {
        assert!(documents::<Cluster>("---\n").is_err());
    }
}
