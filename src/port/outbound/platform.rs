//! Operating-system capabilities.
//!
//! Everything OS-specific (how to start the desktop engine, where its
//! settings channel lives, whether its VM can be resized) sits behind this
//! port so the reconcilers stay OS-agnostic.

use std::fmt;

use crate::domain::EngineHost;

use super::command::Invocation;
use super::settings::SettingsChannel;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    MacOs,
    Windows,
    Linux,
    Other,
}

impl Os {
    pub fn current() -> Self {
        match std::env::consts::OS {
            "macos" => Os::MacOs,
            "windows" => Os::Windows,
            "linux" => Os::Linux,
            _ => Os::Other,
        }
    }
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Os::MacOs => "macos",
            Os::Windows => "windows",
            Os::Linux => "linux",
            Os::Other => std::env::consts::OS,
        };
        f.write_str(s)
    }
}

pub trait Platform: Send + Sync {
    fn os(&self) -> Os;

    /// True if `host` is this machine's desktop engine (as opposed to a
    /// plain daemon or a remote engine).
    fn is_desktop_engine(&self, host: &EngineHost) -> bool;

    /// Command that launches the desktop engine, if it can be auto-started here.
    fn start_engine(&self) -> Option<Invocation>;

    /// Whether the desktop engine's VM CPU count can be changed through settings.
    fn can_resize_cpus(&self) -> bool;

    /// Candidate settings channels, most preferred first.
    fn settings_channels(&self) -> Vec<SettingsChannel>;

    /// True when this process itself runs inside a container.
    fn in_container(&self) -> bool;
}
