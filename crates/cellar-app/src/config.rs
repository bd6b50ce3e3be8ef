use anyhow::{Context, Result};
use cellar_irc::IrcSettings;
use cellar_wizard::{DEFAULT_PORT_SPAN, DEFAULT_PORT_START};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

const CONFIG_FILE: &str = "cellar.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub(crate) struct Config {
    #[serde(default)]
    pub irc: IrcConfig,
    #[serde(default)]
    pub wizard: WizardConfig,
    #[serde(default)]
    pub paths: PathsConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct IrcConfig {
    pub enabled: bool,
    pub host: String,
    pub port: u16,
    pub nick: String,
    pub username: String,
    pub realname: String,
    pub home_channel: String,
    pub admin_nick: String,
    pub read_timeout_secs: u64,
}

impl Default for IrcConfig {
    fn default() -> Self {
        let settings = IrcSettings::default();
        Self {
            enabled: true,
            host: settings.host,
            port: settings.port,
            nick: settings.nick,
            username: settings.username,
            realname: settings.realname,
            home_channel: settings.home_channel,
            admin_nick: settings.admin_nick,
            read_timeout_secs: settings.read_timeout.as_secs(),
        }
    }
}

impl IrcConfig {
    pub(crate) fn settings(&self) -> IrcSettings {
        IrcSettings {
            host: self.host.clone(),
            port: self.port,
            nick: self.nick.clone(),
            username: self.username.clone(),
            realname: self.realname.clone(),
            home_channel: self.home_channel.clone(),
            admin_nick: self.admin_nick.clone(),
            read_timeout: Duration::from_secs(self.read_timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct WizardConfig {
    pub port_start: u16,
    pub port_span: u16,
}

impl Default for WizardConfig {
    fn default() -> Self {
        Self {
            port_start: DEFAULT_PORT_START,
            port_span: DEFAULT_PORT_SPAN,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub(crate) struct PathsConfig {
    /// Where published state lives; `~` expands to `$HOME`.
    pub home: String,
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            home: "~/.cellar".to_owned(),
        }
    }
}

impl PathsConfig {
    pub(crate) fn home_dir(&self) -> PathBuf {
        expand_home(&self.home)
    }
}

impl Config {
    /// Load config from a TOML file.
    pub(crate) fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;
        let config: Config = toml::from_str(&content)
            .with_context(|| format!("failed to parse config file: {}", path.display()))?;
        Ok(config)
    }

    /// Load the resolved config file, or defaults when none exists and no
    /// path was given explicitly.
    pub(crate) fn load_or_default(explicit: Option<&str>) -> Result<Self> {
        let path = Self::find_config_path(explicit);
        if explicit.is_none() && !path.exists() {
            debug!("no config file found, using defaults");
            return Ok(Self::default());
        }
        debug!(path = %path.display(), "loading config");
        Self::load(&path)
    }

    /// Resolve config path: check arg, then default locations.
    pub(crate) fn find_config_path(explicit: Option<&str>) -> PathBuf {
        if let Some(p) = explicit {
            return PathBuf::from(p);
        }

        let local = PathBuf::from(CONFIG_FILE);
        if local.exists() {
            return local;
        }

        if let Ok(config_dir) = std::env::var("XDG_CONFIG_HOME") {
            let xdg = PathBuf::from(config_dir).join("cellar").join(CONFIG_FILE);
            if xdg.exists() {
                return xdg;
            }
        }

        if let Ok(home) = std::env::var("HOME") {
            let home_config = PathBuf::from(home)
                .join(".config/cellar")
                .join(CONFIG_FILE);
            if home_config.exists() {
                return home_config;
            }
        }

        local
    }
}

/// Expand a leading `~` to `$HOME`. Other paths pass through.
pub(crate) fn expand_home(raw: &str) -> PathBuf {
    let home = std::env::var_os("HOME").map(PathBuf::from);
    match (raw.strip_prefix('~'), home) {
        (Some(""), Some(home)) => home,
        (Some(rest), Some(home)) if rest.starts_with('/') => home.join(&rest[1..]),
        _ => PathBuf::from(raw),
    }
}

#[allow(clippy::unwrap_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config, Config::default());
        assert!(config.irc.enabled);
        assert_eq!(config.irc.host, "chat.freenode.net");
        assert_eq!(config.wizard.port_start, 30000);
        assert_eq!(config.wizard.port_span, 20);
        assert_eq!(config.paths.home, "~/.cellar");
    }

    #[test]
    fn parse_partial_sections() {
        let toml = r##"
[irc]
nick = "alice"
home_channel = "#wine-help"
read_timeout_secs = 60

[wizard]
port_start = 31000
"##;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.irc.nick, "alice");
        assert_eq!(config.irc.port, 6667);
        assert_eq!(config.wizard.port_start, 31000);
        assert_eq!(config.wizard.port_span, 20);

        let settings = config.irc.settings();
        assert_eq!(settings.home_channel, "#wine-help");
        assert_eq!(settings.read_timeout, Duration::from_secs(60));
        assert_eq!(settings.admin_nick, "CellarBot");
    }

    #[test]
    fn unknown_types_are_rejected() {
        let result: Result<Config, _> = toml::from_str("[irc]\nport = \"six\"\n");
        assert!(result.is_err());
    }

    #[test]
    fn load_reads_file_and_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cellar.toml");
        std::fs::write(&path, "[irc]\nenabled = false\n").unwrap();
        assert!(!Config::load(&path).unwrap().irc.enabled);

        std::fs::write(&path, "[irc\n").unwrap();
        let error = format!("{:#}", Config::load(&path).unwrap_err());
        assert!(error.contains("cellar.toml"), "{error}");
    }

    #[test]
    fn explicit_missing_config_is_an_error() {
        assert!(Config::load_or_default(Some("/nonexistent/cellar.toml")).is_err());
    }

    #[test]
    fn tilde_expands_to_home() {
        let Some(home) = std::env::var_os("HOME").map(PathBuf::from) else {
            return;
        };
        assert_eq!(expand_home("~"), home);
        assert_eq!(expand_home("~/.cellar"), home.join(".cellar"));
        assert_eq!(expand_home("/opt/cellar"), PathBuf::from("/opt/cellar"));
        assert_eq!(expand_home("~other/x"), PathBuf::from("~other/x"));
    }
}
