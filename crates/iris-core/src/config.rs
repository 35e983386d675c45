use std::path::PathBuf;
use std::time::Duration;

use config::{Config as ConfigLoader, Environment, File};
use serde::Deserialize;

use crate::error::CoreError;

// Helper for deserializing Duration from milliseconds
mod duration_ms_serde {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Main configuration structure for a bridge session.
///
/// The editor-side configuration parser is an external collaborator; what
/// arrives here is already shaped like this struct and is layered with an
/// optional `iris.toml` and `IRIS__*` environment overrides.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)] // Ensure fields default if missing in config source
pub struct SessionConfig {
    pub global: GlobalConfig,
    pub connection: ConnectionConfig,
    pub firefox: FirefoxConfig,
    pub debug: DebugConfig,
}

// Global settings
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct GlobalConfig {
    pub log_level: String,
}

impl Default for GlobalConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// How to reach the browser's debugger server socket.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct ConnectionConfig {
    pub host: String,
    pub port: u16,
    #[serde(with = "duration_ms_serde")]
    pub connect_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 6000,
            connect_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Deserialize, Debug, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RequestKind {
    #[default]
    Launch,
    Attach,
}

/// Launching and terminating the browser process.
#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct FirefoxConfig {
    pub request: RequestKind,
    pub executable_path: Option<PathBuf>,
    pub profile_dir: Option<PathBuf>,
    pub args: Vec<String>,
    /// Keep the debugger server (and the browser) alive across editor
    /// disconnects, reusing the same port on the next attach.
    pub re_attach: bool,
    /// Reload already-open tabs once on the first discovery after connect.
    pub reload_tabs: bool,
    /// Terminate the browser when the session ends.
    pub terminate: bool,
    /// Helper addon installed to shut down a browser the bridge did not
    /// launch itself.
    pub terminator_addon_path: Option<PathBuf>,
    #[serde(with = "duration_ms_serde")]
    pub launch_wait_timeout: Duration,
    #[serde(with = "duration_ms_serde")]
    pub terminate_timeout: Duration,
    #[serde(with = "duration_ms_serde")]
    pub cleanup_grace: Duration,
}

impl Default for FirefoxConfig {
    fn default() -> Self {
        Self {
            request: RequestKind::Launch,
            executable_path: None,
            profile_dir: None,
            args: Vec::new(),
            re_attach: false,
            reload_tabs: false,
            terminate: true,
            terminator_addon_path: None,
            launch_wait_timeout: Duration::from_secs(10),
            terminate_timeout: Duration::from_secs(1),
            cleanup_grace: Duration::from_millis(500),
        }
    }
}

/// One ordered URL-prefix to path-prefix mapping entry.
#[derive(Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct PathMappingEntry {
    pub url: String,
    pub path: String,
}

#[derive(Deserialize, Debug, Clone)]
#[serde(default)]
pub struct TabFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl Default for TabFilter {
    fn default() -> Self {
        Self {
            include: vec!["*".to_string()],
            exclude: Vec::new(),
        }
    }
}

/// Everything that shapes how sources, breakpoints and targets are handled.
#[derive(Deserialize, Debug, Clone, Default)]
#[serde(default)]
pub struct DebugConfig {
    /// Web-extension under debug, if any.
    pub addon_path: Option<PathBuf>,
    pub addon_id: Option<String>,
    /// Root used for the default `webpack://` mapping.
    pub sources_root: Option<PathBuf>,
    pub path_mappings: Vec<PathMappingEntry>,
    pub skip_files: Vec<String>,
    pub tab_filter: TabFilter,
    pub clear_console_on_reload: bool,
    pub show_console_call_location: bool,
}

impl DebugConfig {
    /// Append the default `webpack://` and extension-resource mappings unless
    /// the user already supplied mappings for those schemes.
    pub fn install_default_mappings(&mut self) {
        let root = self
            .sources_root
            .as_ref()
            .map(|p| p.to_string_lossy().into_owned())
            .unwrap_or_else(|| ".".to_string());
        if !self
            .path_mappings
            .iter()
            .any(|m| m.url.starts_with("webpack://"))
        {
            self.path_mappings.push(PathMappingEntry {
                url: "webpack:///".to_string(),
                path: format!("{root}/"),
            });
        }
        if let (Some(addon_path), Some(addon_id)) = (&self.addon_path, &self.addon_id) {
            let url = format!("moz-extension://{addon_id}/");
            if !self.path_mappings.iter().any(|m| m.url == url) {
                self.path_mappings.push(PathMappingEntry {
                    url,
                    path: format!("{}/", addon_path.to_string_lossy()),
                });
            }
        }
    }
}

/// Loads the session configuration from `iris.toml` (optional) layered with
/// `IRIS__*` environment variables, then installs the default path mappings.
pub fn load_config() -> Result<SessionConfig, CoreError> {
    let loader = ConfigLoader::builder()
        .add_source(File::with_name("iris").required(false))
        .add_source(Environment::with_prefix("IRIS").separator("__"))
        .build()?;

    let mut cfg: SessionConfig = loader.try_deserialize()?;
    cfg.debug.install_default_mappings();
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config() {
        let cfg = SessionConfig::default();
        assert_eq!(cfg.global.log_level, "info");
        assert_eq!(cfg.connection.port, 6000);
        assert_eq!(cfg.connection.connect_timeout, Duration::from_secs(5));
        assert_eq!(cfg.firefox.request, RequestKind::Launch);
        assert!(cfg.firefox.terminate);
        assert_eq!(cfg.firefox.terminate_timeout, Duration::from_secs(1));
        assert_eq!(cfg.firefox.cleanup_grace, Duration::from_millis(500));
        assert_eq!(cfg.debug.tab_filter.include, vec!["*".to_string()]);
    }

    #[test]
    fn load_config_structure() {
        // File/env loading is hard to exercise in a unit test, but the
        // builder path and duration deserialization are not.
        let builder = ConfigLoader::builder()
            .set_default("global.log_level", "debug")
            .unwrap()
            .set_default("connection.connect_timeout", 3000)
            .unwrap()
            .set_default("firefox.request", "attach")
            .unwrap();

        let cfg: SessionConfig = builder.build().unwrap().try_deserialize().unwrap();
        assert_eq!(cfg.global.log_level, "debug");
        assert_eq!(cfg.connection.connect_timeout, Duration::from_millis(3000));
        assert_eq!(cfg.firefox.request, RequestKind::Attach);
    }

    #[test]
    fn default_mappings_installed_once() {
        let mut debug = DebugConfig::default();
        debug.install_default_mappings();
        assert!(
            debug
                .path_mappings
                .iter()
                .any(|m| m.url == "webpack:///")
        );

        let count = debug.path_mappings.len();
        debug.install_default_mappings();
        assert_eq!(debug.path_mappings.len(), count);
    }

    #[test]
    fn addon_mapping_requires_both_fields() {
        let mut debug = DebugConfig {
            addon_path: Some(PathBuf::from("/work/ext")),
            addon_id: Some("my-addon@example.com".to_string()),
            ..Default::default()
        };
        debug.install_default_mappings();
        assert!(
            debug
                .path_mappings
                .iter()
                .any(|m| m.url == "moz-extension://my-addon@example.com/")
        );
    }
}
