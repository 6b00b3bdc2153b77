pub mod job;
mod openrc;
mod systemd;

pub use openrc::OpenRc;
pub use systemd::{Connector, DbusBus, DbusConnector, Systemd, UnitBus, UnitFile, UnitProperty};

use crate::config::Config;
use crate::service::InitService;
use crate::Result;
use std::fmt;
use std::path::Path;

/// Service control for whichever init system manages the host.
pub trait InitManager: Send + Sync {
    /// Name of the init system
    fn name(&self) -> &str;

    /// List services, optionally filtered by a glob pattern (`""` and `"*"`
    /// match everything)
    fn list_services(&self, pattern: &str) -> Result<Vec<InitService>>;

    /// Check if a service starts at boot
    fn is_service_enabled(&self, name: &str) -> Result<bool>;

    /// Check if a service is currently running
    fn is_service_running(&self, name: &str) -> Result<bool>;

    /// Enable a service to start at boot
    fn enable_service(&self, name: &str) -> Result<()>;

    /// Disable a service from starting at boot
    fn disable_service(&self, name: &str) -> Result<()>;

    fn start_service(&self, name: &str) -> Result<()>;

    fn stop_service(&self, name: &str) -> Result<()>;

    /// Make the init system pick up changed service definitions
    fn reload(&self) -> Result<()>;
}

/// Supported init systems
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InitKind {
    Systemd,
    OpenRc,
}

impl InitKind {
    /// Systemd when `marker` exists, OpenRC otherwise.
    pub fn detect(marker: &Path) -> Self {
        if marker.exists() {
            InitKind::Systemd
        } else {
            InitKind::OpenRc
        }
    }

    pub fn create(self, config: &Config) -> Box<dyn InitManager> {
        match self {
            InitKind::Systemd => Box::new(Systemd::new(config)),
            InitKind::OpenRc => Box::new(OpenRc::new(config)),
        }
    }
}

impl fmt::Display for InitKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InitKind::Systemd => write!(f, "systemd"),
            InitKind::OpenRc => write!(f, "OpenRC"),
        }
    }
}

/// Pick the backend for this host. Decided once; callers keep the returned
/// manager for the life of the process.
pub fn select(config: &Config) -> Box<dyn InitManager> {
    let kind = InitKind::detect(&config.systemd_marker);
    tracing::debug!("Using {} service manager", kind);
    kind.create(config)
}

/// [`select`] with the default configuration.
pub fn detect() -> Box<dyn InitManager> {
    select(&Config::default())
}
