//! Read-modify-write client for the desktop engine's settings document.
//!
//! There is no partial update: every write resubmits the entire document,
//! collapsed to plain values. Callers read with [`SettingsClient::settings`],
//! edit the tree with [`SettingsNode::apply_set`], and write back only when
//! something changed.

use std::sync::Arc;

use tracing::{debug, info};

use crate::domain::SettingsNode;
use crate::error::{Result, SettingsError};
use crate::port::outbound::SettingsTransport;

/// Which generation of the settings document the engine serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettingsLayout {
    /// Nested under `vm` (`vm.resources.cpus`, `vm.kubernetes.enabled`).
    Legacy,
    /// Flat top-level keys (`cpus`, `kubernetesEnabled`).
    Flat,
}

impl SettingsLayout {
    pub fn detect(tree: &SettingsNode) -> Self {
        if tree.contains("vm.resources.cpus") || tree.contains("vm.kubernetes.enabled") {
            SettingsLayout::Legacy
        } else {
            SettingsLayout::Flat
        }
    }

    pub fn cpus_path(self) -> &'static str {
        match self {
            SettingsLayout::Legacy => "vm.resources.cpus",
            SettingsLayout::Flat => "cpus",
        }
    }

    pub fn kubernetes_enabled_path(self) -> &'static str {
        match self {
            SettingsLayout::Legacy => "vm.kubernetes.enabled",
            SettingsLayout::Flat => "kubernetesEnabled",
        }
    }

    pub fn file_sharing_path(self) -> &'static str {
        match self {
            SettingsLayout::Legacy => "vm.fileSharing",
            SettingsLayout::Flat => "filesharingDirectories",
        }
    }
}

/// Edits to make in one read-modify-write cycle.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SettingsPatch {
    pub kubernetes_enabled: Option<bool>,
    /// Raise the VM CPU count to at least this. Never lowers it.
    pub min_cpus: Option<u32>,
}

impl SettingsPatch {
    pub fn is_empty(&self) -> bool {
        self.kubernetes_enabled.is_none() && self.min_cpus.is_none()
    }

    /// Apply to `tree`, returning whether anything changed.
    pub fn apply_to(&self, tree: &mut SettingsNode) -> std::result::Result<bool, SettingsError> {
        let layout = SettingsLayout::detect(tree);
        let mut changed = false;

        if let Some(enabled) = self.kubernetes_enabled {
            changed |= tree.apply_set(layout.kubernetes_enabled_path(), if enabled { "true" } else { "false" })?;
        }

        if let Some(min_cpus) = self.min_cpus {
            let path = layout.cpus_path();
            let current = tree.value_at(path)?.as_f64().ok_or_else(|| SettingsError::UnexpectedShape {
                path: path.to_string(),
                expected: "number",
                found: "non-numeric value".to_string(),
            })?;
            if current < f64::from(min_cpus) {
                changed |= tree.apply_set(path, &min_cpus.to_string())?;
            }
        }

        Ok(changed)
    }
}

/// Client for the engine's settings channel.
#[derive(Clone)]
pub struct SettingsClient {
    transport: Arc<dyn SettingsTransport>,
}

impl SettingsClient {
    pub fn new(transport: Arc<dyn SettingsTransport>) -> Self {
        Self { transport }
    }

    /// The whole settings document.
    pub async fn settings(&self) -> Result<SettingsNode> {
        let document = self.transport.fetch().await?;
        Ok(SettingsNode::from_value(document))
    }

    /// Submit `tree` collapsed to plain values.
    pub async fn write_settings(&self, tree: &SettingsNode) -> Result<()> {
        self.transport.submit(&tree.write_document()).await
    }

    /// Read, patch and write back if the patch changed anything.
    ///
    /// Returns whether a write happened.
    pub async fn update(&self, patch: SettingsPatch) -> Result<bool> {
        if patch.is_empty() {
            return Ok(false);
        }
        let mut tree = self.settings().await?;
        if !patch.apply_to(&mut tree)? {
            debug!(?patch, "engine settings already satisfy patch");
            return Ok(false);
        }
        info!(?patch, "updating container engine settings");
        self.write_settings(&tree).await?;
        Ok(true)
    }

    pub async fn set_kubernetes_enabled(&self, enabled: bool) -> Result<bool> {
        self.update(SettingsPatch {
            kubernetes_enabled: Some(enabled),
            ..SettingsPatch::default()
        })
        .await
    }

    pub async fn kubernetes_enabled(&self) -> Result<bool> {
        let tree = self.settings().await?;
        let path = SettingsLayout::detect(&tree).kubernetes_enabled_path();
        Ok(tree.value_at(path)?.as_bool().unwrap_or(false))
    }

    /// Wipe the engine's built-in Kubernetes cluster.
    pub async fn reset_kubernetes(&self) -> Result<()> {
        info!("resetting the container engine's Kubernetes cluster");
        self.transport.reset_kubernetes().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testkit::settings::FakeSettings;
    use serde_json::json;

    #[tokio::test]
    async fn patch_raises_cpus_on_legacy_layout() {
        let fake = Arc::new(FakeSettings::new(json!({
            "vm": {
                "resources": {"cpus": {"value": 2, "locked": false, "min": 1, "max": 8}},
                "kubernetes": {"enabled": {"value": false, "locked": false}}
            }
        })));
        let client = SettingsClient::new(fake.clone());

        let wrote = client
            .update(SettingsPatch {
                kubernetes_enabled: Some(true),
                min_cpus: Some(4),
            })
            .await
            .unwrap();

        assert!(wrote);
        assert_eq!(
            fake.last_submitted().unwrap(),
            json!({"vm": {"resources": {"cpus": 4}, "kubernetes": {"enabled": true}}})
        );
    }

    #[tokio::test]
    async fn patch_never_lowers_cpus() {
        let fake = Arc::new(FakeSettings::new(json!({"cpus": 6, "kubernetesEnabled": true})));
        let client = SettingsClient::new(fake.clone());

        let wrote = client
            .update(SettingsPatch {
                kubernetes_enabled: Some(true),
                min_cpus: Some(4),
            })
            .await
            .unwrap();

        assert!(!wrote);
        assert_eq!(fake.fetch_count(), 1);
        assert_eq!(fake.submit_count(), 0);
    }

    #[tokio::test]
    async fn empty_patch_skips_the_read() {
        let fake = Arc::new(FakeSettings::new(json!({"cpus": 2})));
        let client = SettingsClient::new(fake.clone());

        assert!(!client.update(SettingsPatch::default()).await.unwrap());
        assert_eq!(fake.fetch_count(), 0);
    }

    #[tokio::test]
    async fn out_of_range_cpus_fails_before_writing() {
        let fake = Arc::new(FakeSettings::new(json!({
            "cpus": {"value": 2, "locked": false, "min": 1, "max": 4}
        })));
        let client = SettingsClient::new(fake.clone());

        let err = client
            .update(SettingsPatch {
                min_cpus: Some(16),
                ..SettingsPatch::default()
            })
            .await
            .unwrap_err();

        assert!(err.to_string().contains("out of range"), "{err}");
        assert_eq!(fake.submit_count(), 0);
    }

    #[test]
    fn layout_detection() {
        let legacy = SettingsNode::from_value(json!({"vm": {"resources": {"cpus": 2}}}));
        let flat = SettingsNode::from_value(json!({"cpus": 2}));
        assert_eq!(SettingsLayout::detect(&legacy), SettingsLayout::Legacy);
        assert_eq!(SettingsLayout::detect(&flat), SettingsLayout::Flat);
        assert_eq!(SettingsLayout::Flat.file_sharing_path(), "filesharingDirectories");
    }
}
