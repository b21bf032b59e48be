//! INI configuration file.
//!
//! ```ini
//! [cache]
//! budget = 512MB
//!
//! [fetch]
//! timeout_secs = 30
//! negative_ttl_secs = 60
//! threads = 2
//!
//! [render]
//! fade_in_ms = 500
//!
//! [logging]
//! level = info
//! file = /tmp/skyhips.log
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use ini::Ini;

use super::engine::EngineConfig;
use super::size::{format_size, parse_size};
use super::ConfigError;
use crate::logging::LoggingConfig;

/// Settings read from `config.ini`. Absent keys keep their defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct ConfigFile {
    pub engine: EngineConfig,
    pub logging: LoggingConfig,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl ConfigFile {
    /// `~/.skyhips/config.ini`
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".skyhips").join("config.ini"))
    }

    /// Load from `path`. A missing file yields the defaults.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let ini = Ini::load_from_file(path)
            .map_err(|e| ConfigError::Read(format!("{}: {}", path.display(), e)))?;
        Self::from_ini(&ini)
    }

    /// Parse INI text.
    pub fn parse(text: &str) -> Result<Self, ConfigError> {
        let ini = Ini::load_from_str(text).map_err(|e| ConfigError::Read(e.to_string()))?;
        Self::from_ini(&ini)
    }

    fn from_ini(ini: &Ini) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let engine = &mut config.engine;

        if let Some(v) = get(ini, "cache", "budget") {
            engine.cache_budget_bytes = parse_size(v).map_err(|_| invalid("cache", "budget", v))?;
        }
        if let Some(secs) = number::<u64>(ini, "fetch", "timeout_secs")? {
            engine.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = number::<u64>(ini, "fetch", "negative_ttl_secs")? {
            engine.negative_ttl = Duration::from_secs(secs);
        }
        if let Some(threads) = number::<usize>(ini, "fetch", "threads")? {
            engine.materialize_threads = threads.max(1);
        }
        if let Some(ms) = number::<u64>(ini, "render", "fade_in_ms")? {
            engine.fade_in = Duration::from_millis(ms);
        }
        if let Some(level) = get(ini, "logging", "level") {
            config.logging.level = level.to_string();
        }
        if let Some(file) = get(ini, "logging", "file") {
            config.logging.file = Some(PathBuf::from(file));
        }
        Ok(config)
    }

    /// Write the settings back as INI.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let mut ini = Ini::new();
        ini.with_section(Some("cache"))
            .set("budget", format_size(self.engine.cache_budget_bytes).replace(' ', ""));
        ini.with_section(Some("fetch"))
            .set("timeout_secs", self.engine.fetch_timeout.as_secs().to_string())
            .set("negative_ttl_secs", self.engine.negative_ttl.as_secs().to_string())
            .set("threads", self.engine.materialize_threads.to_string());
        ini.with_section(Some("render"))
            .set("fade_in_ms", self.engine.fade_in.as_millis().to_string());
        ini.with_section(Some("logging"))
            .set("level", self.logging.level.clone());
        if let Some(file) = &self.logging.file {
            ini.with_section(Some("logging"))
                .set("file", file.display().to_string());
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| ConfigError::Write(format!("{}: {}", parent.display(), e)))?;
        }
        ini.write_to_file(path)
            .map_err(|e| ConfigError::Write(format!("{}: {}", path.display(), e)))
    }
}

fn get<'a>(ini: &'a Ini, section: &str, key: &str) -> Option<&'a str> {
    ini.section(Some(section))
        .and_then(|s| s.get(key))
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn number<T: FromStr>(ini: &Ini, section: &str, key: &str) -> Result<Option<T>, ConfigError> {
    get(ini, section, key)
        .map(|v| v.parse().map_err(|_| invalid(section, key, v)))
        .transpose()
}

fn invalid(section: &str, key: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue {
        section: section.to_string(),
        key: key.to_string(),
        value: value.to_string(),
    }
}
