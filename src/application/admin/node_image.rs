//! Node images per tool release and Kubernetes minor version.
//!
//! kind publishes a fixed set of node images with every release; a node
//! image built for one release is not guaranteed to work with another.
//! k3s images only depend on the Kubernetes minor version.

use crate::domain::ToolVersion;
use crate::error::{Error, Result};

/// `(kind release, [(kubernetes minor, node image)])`.
const KIND_NODE_IMAGES: &[(&str, &[(&str, &str)])] = &[
    (
        "0.20",
        &[
            ("1.27", "kindest/node:v1.27.3"),
            ("1.26", "kindest/node:v1.26.6"),
            ("1.25", "kindest/node:v1.25.11"),
            ("1.24", "kindest/node:v1.24.15"),
            ("1.23", "kindest/node:v1.23.17"),
            ("1.22", "kindest/node:v1.22.17"),
            ("1.21", "kindest/node:v1.21.14"),
        ],
    ),
    (
        "0.21",
        &[
            ("1.29", "kindest/node:v1.29.1"),
            ("1.28", "kindest/node:v1.28.6"),
            ("1.27", "kindest/node:v1.27.10"),
            ("1.26", "kindest/node:v1.26.13"),
            ("1.25", "kindest/node:v1.25.16"),
            ("1.24", "kindest/node:v1.24.17"),
            ("1.23", "kindest/node:v1.23.17"),
        ],
    ),
    (
        "0.22",
        &[
            ("1.29", "kindest/node:v1.29.2"),
            ("1.28", "kindest/node:v1.28.7"),
            ("1.27", "kindest/node:v1.27.11"),
            ("1.26", "kindest/node:v1.26.14"),
            ("1.25", "kindest/node:v1.25.16"),
            ("1.24", "kindest/node:v1.24.17"),
            ("1.23", "kindest/node:v1.23.17"),
        ],
    ),
    (
        "0.23",
        &[
            ("1.30", "kindest/node:v1.30.0"),
            ("1.29", "kindest/node:v1.29.4"),
            ("1.28", "kindest/node:v1.28.9"),
            ("1.27", "kindest/node:v1.27.13"),
            ("1.26", "kindest/node:v1.26.15"),
            ("1.25", "kindest/node:v1.25.16"),
        ],
    ),
    (
        "0.24",
        &[
            ("1.31", "kindest/node:v1.31.0"),
            ("1.30", "kindest/node:v1.30.4"),
            ("1.29", "kindest/node:v1.29.8"),
            ("1.28", "kindest/node:v1.28.13"),
            ("1.27", "kindest/node:v1.27.16"),
            ("1.26", "kindest/node:v1.26.15"),
        ],
    ),
    (
        "0.25",
        &[
            ("1.32", "kindest/node:v1.32.0"),
            ("1.31", "kindest/node:v1.31.4"),
            ("1.30", "kindest/node:v1.30.8"),
            ("1.29", "kindest/node:v1.29.12"),
            ("1.28", "kindest/node:v1.28.15"),
            ("1.27", "kindest/node:v1.27.16"),
            ("1.26", "kindest/node:v1.26.15"),
        ],
    ),
    (
        "0.26",
        &[
            ("1.32", "kindest/node:v1.32.2"),
            ("1.31", "kindest/node:v1.31.6"),
            ("1.30", "kindest/node:v1.30.10"),
            ("1.29", "kindest/node:v1.29.14"),
        ],
    ),
];

const K3S_IMAGES: &[(&str, &str)] = &[
    ("1.32", "rancher/k3s:v1.32.1-k3s1"),
    ("1.31", "rancher/k3s:v1.31.5-k3s1"),
    ("1.30", "rancher/k3s:v1.30.9-k3s1"),
    ("1.29", "rancher/k3s:v1.29.13-k3s1"),
    ("1.28", "rancher/k3s:v1.28.15-k3s1"),
    ("1.27", "rancher/k3s:v1.27.16-k3s1"),
    ("1.26", "rancher/k3s:v1.26.15-k3s1"),
    ("1.25", "rancher/k3s:v1.25.16-k3s4"),
    ("1.24", "rancher/k3s:v1.24.17-k3s1"),
];

/// Node image for `kubernetes` on kind release `kind`.
///
/// Patch levels are ignored on both sides: a kind `v0.22.1` uses the `0.22`
/// table and `v1.29.0` selects the table's `1.29` image.
pub fn kind_node_image(kind: &ToolVersion, kubernetes: &ToolVersion) -> Result<&'static str> {
    let release = kind.minor_key();
    let images = KIND_NODE_IMAGES
        .iter()
        .find(|(v, _)| *v == release)
        .map(|(_, images)| *images)
        .ok_or_else(|| {
            Error::Validation(format!(
                "unsupported kind version {kind}; cannot pick a node image for Kubernetes {kubernetes}"
            ))
        })?;

    let minor = kubernetes.minor_key();
    images
        .iter()
        .find(|(m, _)| *m == minor)
        .map(|(_, image)| *image)
        .ok_or_else(|| {
            Error::Validation(format!(
                "kind {kind} has no node image for Kubernetes {minor}; supported: {}",
                images.iter().map(|(m, _)| *m).collect::<Vec<_>>().join(", ")
            ))
        })
}

/// k3s image for `kubernetes`.
pub fn k3s_image(kubernetes: &ToolVersion) -> Result<&'static str> {
    let minor = kubernetes.minor_key();
    K3S_IMAGES
        .iter()
        .find(|(m, _)| *m == minor)
        .map(|(_, image)| *image)
        .ok_or_else(|| Error::Validation(format!("no k3s image for Kubernetes {minor}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> ToolVersion {
        ToolVersion::parse(s).unwrap()
    }

    #[test]
    fn kind_image_ignores_patch_levels() {
        assert_eq!(kind_node_image(&v("v0.22.1"), &v("v1.29.0")).unwrap(), "kindest/node:v1.29.2");
    }

    #[test]
    fn unknown_kind_release_is_fatal() {
        let err = kind_node_image(&v("v0.5.0"), &v("v1.27.0")).unwrap_err();
        assert!(err.to_string().contains("unsupported kind version v0.5.0"), "{err}");
    }

    #[test]
    fn unknown_kubernetes_minor_is_fatal() {
        let err = kind_node_image(&v("v0.20.0"), &v("v1.31.0")).unwrap_err();
        assert!(err.to_string().contains("no node image for Kubernetes 1.31"), "{err}");
    }

    #[test]
    fn k3s_image_by_minor() {
        assert_eq!(k3s_image(&v("v1.28.2")).unwrap(), "rancher/k3s:v1.28.15-k3s1");
        assert!(k3s_image(&v("v1.10.0")).is_err());
    }
}
