//! Configurable OS capabilities.

use crate::domain::EngineHost;
use crate::port::outbound::{Invocation, Os, Platform, SettingsChannel};

/// A platform whose every capability is set by the test.
#[derive(Debug, Clone)]
pub struct FakePlatform {
    pub os: Os,
    pub desktop: bool,
    pub can_resize: bool,
    pub start: Option<Invocation>,
    pub in_container: bool,
}

impl FakePlatform {
    /// A desktop engine that can be started and resized, like macOS.
    pub fn desktop() -> Self {
        Self {
            os: Os::MacOs,
            desktop: true,
            can_resize: true,
            start: Some(Invocation::new("open", ["-a", "Docker"])),
            in_container: false,
        }
    }

    /// A plain daemon: nothing can be started or resized.
    pub fn plain_daemon() -> Self {
        Self {
            os: Os::Linux,
            desktop: false,
            can_resize: false,
            start: None,
            in_container: false,
        }
    }

    #[must_use]
    pub fn without_resize(mut self) -> Self {
        self.can_resize = false;
        self
    }

    #[must_use]
    pub fn in_container(mut self) -> Self {
        self.in_container = true;
        self
    }
}

impl Platform for FakePlatform {
    fn os(&self) -> Os {
        self.os
    }

    fn is_desktop_engine(&self, _host: &EngineHost) -> bool {
        self.desktop
    }

    fn start_engine(&self) -> Option<Invocation> {
        self.start.clone()
    }

    fn can_resize_cpus(&self) -> bool {
        self.can_resize
    }

    fn settings_channels(&self) -> Vec<SettingsChannel> {
        Vec::new()
    }

    fn in_container(&self) -> bool {
        self.in_container
    }
}
