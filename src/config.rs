use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::{Error, Result};

/// System-wide config file, read when present.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/initmgr.toml";

/// Environment variable overriding [`DEFAULT_CONFIG_PATH`].
pub const CONFIG_ENV: &str = "INITMGR_CONFIG";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Deadline for a whole systemd operation, connection included
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Directory systemd creates when it is the running init (see `sd_booted(3)`)
    #[serde(default = "default_systemd_marker")]
    pub systemd_marker: PathBuf,

    #[serde(default)]
    pub openrc: OpenRcConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OpenRcConfig {
    #[serde(default = "default_rc_service")]
    pub rc_service: PathBuf,

    #[serde(default = "default_rc_update")]
    pub rc_update: PathBuf,

    /// Runlevel used by enable/disable
    #[serde(default = "default_runlevel")]
    pub runlevel: String,

    #[serde(default = "default_runlevels_dir")]
    pub runlevels_dir: PathBuf,
}

fn default_timeout_secs() -> u64 {
    30
}

fn default_systemd_marker() -> PathBuf {
    PathBuf::from("/run/systemd/system")
}

fn default_rc_service() -> PathBuf {
    PathBuf::from("/sbin/rc-service")
}

fn default_rc_update() -> PathBuf {
    PathBuf::from("/sbin/rc-update")
}

fn default_runlevel() -> String {
    "default".into()
}

fn default_runlevels_dir() -> PathBuf {
    PathBuf::from("/etc/runlevels")
}

impl Default for Config {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            systemd_marker: default_systemd_marker(),
            openrc: OpenRcConfig::default(),
        }
    }
}

impl Default for OpenRcConfig {
    fn default() -> Self {
        Self {
            rc_service: default_rc_service(),
            rc_update: default_rc_update(),
            runlevel: default_runlevel(),
            runlevels_dir: default_runlevels_dir(),
        }
    }
}

impl Config {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn parse(content: &str, path: &Path) -> Result<Self> {
        let config: Self = toml::from_str(content).map_err(|source| Error::Config {
            path: path.to_path_buf(),
            source,
        })?;

        // A zero deadline would fail every systemd call before it is sent
        if config.timeout_secs == 0 {
            return Err(Error::ConfigValue {
                path: path.to_path_buf(),
                reason: "timeout_secs must be at least 1".into(),
            });
        }

        Ok(config)
    }

    /// Load a config file. The file must exist.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content, path)
    }

    /// Load `$INITMGR_CONFIG` or the system-wide file, falling back to
    /// defaults when neither exists.
    pub fn discover() -> Result<Self> {
        let path = std::env::var_os(CONFIG_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));

        if !path.exists() {
            return Ok(Self::default());
        }

        tracing::debug!("Loading config from {}", path.display());
        Self::load(&path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let config = Config::default();
        assert_eq!(config.timeout(), Duration::from_secs(30));
        assert_eq!(config.systemd_marker, Path::new("/run/systemd/system"));
        assert_eq!(config.openrc.rc_service, Path::new("/sbin/rc-service"));
        assert_eq!(config.openrc.rc_update, Path::new("/sbin/rc-update"));
        assert_eq!(config.openrc.runlevel, "default");
    }

    #[test]
    fn empty_file_is_default() {
        let config = Config::parse("", Path::new("test.toml")).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn partial_override() {
        let toml = r#"
timeout_secs = 5

[openrc]
runlevel = "boot"
"#;
        let config = Config::parse(toml, Path::new("test.toml")).unwrap();
        assert_eq!(config.timeout_secs, 5);
        assert_eq!(config.openrc.runlevel, "boot");
        assert_eq!(config.openrc.rc_service, Path::new("/sbin/rc-service"));
    }

    #[test]
    fn malformed_file_is_config_error() {
        let err = Config::parse("timeout_secs = \"soon\"", Path::new("bad.toml")).unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
        assert!(err.to_string().contains("bad.toml"));
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let err = Config::parse("timeout_secs = 0", Path::new("zero.toml")).unwrap_err();
        assert!(matches!(err, Error::ConfigValue { .. }));
        assert!(err.to_string().contains("zero.toml"));
        assert!(err.to_string().contains("timeout_secs"));

        assert_eq!(
            Config::parse("timeout_secs = 1", Path::new("one.toml"))
                .unwrap()
                .timeout(),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("initmgr.toml");
        fs::write(&path, "systemd_marker = \"/nowhere\"\n").unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.systemd_marker, Path::new("/nowhere"));
    }
}
