//! Per-OS [`Platform`] implementations.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::domain::EngineHost;
use crate::port::outbound::{Invocation, Os, Platform, SettingsChannel};

const LEGACY_SETTINGS: &str = "/app/settings";
const SETTINGS: &str = "/settings";
const RESET: &str = "/kubernetes/reset";

fn channel(address: PathBuf, settings_endpoint: &'static str) -> SettingsChannel {
    SettingsChannel {
        address,
        settings_endpoint,
        reset_endpoint: RESET,
    }
}

fn home() -> PathBuf {
    dirs::home_dir().unwrap_or_default()
}

/// Pick the implementation for the running OS.
pub fn detect(engine: &EngineHost) -> Arc<dyn Platform> {
    match Os::current() {
        Os::MacOs => Arc::new(MacPlatform { home: home() }),
        Os::Windows => Arc::new(WindowsPlatform),
        Os::Linux => Arc::new(LinuxPlatform {
            home: home(),
            desktop: LinuxPlatform::is_desktop_host(engine),
        }),
        Os::Other => Arc::new(UnsupportedPlatform),
    }
}

/// Docker Desktop for Mac.
pub struct MacPlatform {
    home: PathBuf,
}

impl Platform for MacPlatform {
    fn os(&self) -> Os {
        Os::MacOs
    }

    fn is_desktop_engine(&self, host: &EngineHost) -> bool {
        host.is_local()
    }

    fn start_engine(&self) -> Option<Invocation> {
        Some(Invocation::new("open", ["-a", "Docker"]))
    }

    fn can_resize_cpus(&self) -> bool {
        true
    }

    fn settings_channels(&self) -> Vec<SettingsChannel> {
        let data = self.home.join("Library/Containers/com.docker.docker/Data");
        vec![
            channel(data.join("backend.sock"), LEGACY_SETTINGS),
            channel(data.join("backend.native.sock"), SETTINGS),
            channel(data.join("gui-api.sock"), SETTINGS),
        ]
    }

    fn in_container(&self) -> bool {
        false
    }
}

/// Docker Desktop for Windows. The WSL 2 backend sizes its VM from
/// `.wslconfig`, not from engine settings.
pub struct WindowsPlatform;

impl Platform for WindowsPlatform {
    fn os(&self) -> Os {
        Os::Windows
    }

    fn is_desktop_engine(&self, host: &EngineHost) -> bool {
        host.is_local()
    }

    fn start_engine(&self) -> Option<Invocation> {
        Some(Invocation::new(
            r"C:\Program Files\Docker\Docker\Docker Desktop.exe",
            Vec::<String>::new(),
        ))
    }

    fn can_resize_cpus(&self) -> bool {
        false
    }

    fn settings_channels(&self) -> Vec<SettingsChannel> {
        vec![
            channel(PathBuf::from(r"\\.\pipe\dockerBackendApiServer"), LEGACY_SETTINGS),
            channel(PathBuf::from(r"\\.\pipe\dockerBackendNativeApiServer"), SETTINGS),
        ]
    }

    fn in_container(&self) -> bool {
        false
    }
}

/// Linux, with or without Docker Desktop.
pub struct LinuxPlatform {
    home: PathBuf,
    desktop: bool,
}

impl LinuxPlatform {
    /// Docker Desktop for Linux serves its engine from under `~/.docker/desktop`.
    fn is_desktop_host(host: &EngineHost) -> bool {
        host.as_str().contains(".docker/desktop/")
    }
}

impl Platform for LinuxPlatform {
    fn os(&self) -> Os {
        Os::Linux
    }

    fn is_desktop_engine(&self, host: &EngineHost) -> bool {
        Self::is_desktop_host(host)
    }

    fn start_engine(&self) -> Option<Invocation> {
        self.desktop
            .then(|| Invocation::new("systemctl", ["--user", "start", "docker-desktop"]))
    }

    fn can_resize_cpus(&self) -> bool {
        self.desktop
    }

    fn settings_channels(&self) -> Vec<SettingsChannel> {
        let desktop = self.home.join(".docker/desktop");
        vec![
            channel(desktop.join("backend.sock"), LEGACY_SETTINGS),
            channel(desktop.join("backend.native.sock"), SETTINGS),
        ]
    }

    fn in_container(&self) -> bool {
        Path::new("/.dockerenv").exists()
    }
}

/// Any other OS: nothing can be started or resized.
pub struct UnsupportedPlatform;

impl Platform for UnsupportedPlatform {
    fn os(&self) -> Os {
        Os::Other
    }

    fn is_desktop_engine(&self, _host: &EngineHost) -> bool {
        false
    }

    fn start_engine(&self) -> Option<Invocation> {
        None
    }

    fn can_resize_cpus(&self) -> bool {
        false
    }

    fn settings_channels(&self) -> Vec<SettingsChannel> {
        Vec::new()
    }

    fn in_container(&self) -> bool {
        false
    }
}
