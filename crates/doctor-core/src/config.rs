//! Doctor configuration.
//!
//! Config file: ~/.config/doctor/config.toml or /etc/doctor/config.toml

use crate::error::{DoctorError, Result};
use crate::normalizer::{default_allowlist_patterns, Allowlist};
use crate::risk::{Risk, TimeoutClass};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

/// Host platform the inspection commands target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    Linux,
    Darwin,
    Win32,
}

impl Default for Platform {
    fn default() -> Self {
        if cfg!(target_os = "macos") {
            Self::Darwin
        } else if cfg!(target_os = "windows") {
            Self::Win32
        } else {
            Self::Linux
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DoctorConfig {
    #[serde(default)]
    pub platform: Platform,

    /// Regexes an inspection command must match after normalization
    #[serde(default = "default_allowlist_patterns")]
    pub allowlist: Vec<String>,

    /// Timeout for read steps
    #[serde(default = "default_read_timeout_ms")]
    pub read_timeout_ms: u64,

    /// Timeout for safe-write and high-impact steps
    #[serde(default = "default_write_timeout_ms")]
    pub write_timeout_ms: u64,

    /// Characters of stdout kept in each transcript output event
    #[serde(default = "default_output_preview_chars")]
    pub output_preview_chars: usize,
}

fn default_read_timeout_ms() -> u64 {
    10_000
}

fn default_write_timeout_ms() -> u64 {
    60_000
}

fn default_output_preview_chars() -> usize {
    1000
}

impl Default for DoctorConfig {
    fn default() -> Self {
        Self {
            platform: Platform::default(),
            allowlist: default_allowlist_patterns(),
            read_timeout_ms: default_read_timeout_ms(),
            write_timeout_ms: default_write_timeout_ms(),
            output_preview_chars: default_output_preview_chars(),
        }
    }
}

impl DoctorConfig {
    /// ~/.config/doctor/config.toml
    pub fn user_config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("doctor").join("config.toml"))
    }

    /// /etc/doctor/config.toml
    pub fn system_config_path() -> PathBuf {
        PathBuf::from("/etc/doctor/config.toml")
    }

    /// Load configuration.
    ///
    /// Priority:
    /// 1. Explicit path (must exist)
    /// 2. User config
    /// 3. System config
    /// 4. Defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load_from(path);
        }

        if let Some(user_path) = Self::user_config_path() {
            if user_path.exists() {
                return Self::load_from(&user_path);
            }
        }

        let system_path = Self::system_config_path();
        if system_path.exists() {
            return Self::load_from(&system_path);
        }

        debug!("No config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .map_err(|e| DoctorError::Config(format!("Failed to read {}: {}", path.display(), e)))?;
        let config: DoctorConfig = toml::from_str(&contents)?;
        config.validate()?;
        debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, self.to_toml()?)?;
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| DoctorError::Config(format!("Failed to serialize configuration: {}", e)))
    }

    fn validate(&self) -> Result<()> {
        if self.read_timeout_ms == 0 || self.write_timeout_ms == 0 {
            return Err(DoctorError::Config("timeouts must be greater than 0".to_string()));
        }
        Ok(())
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }

    /// Timeout for a step of the given risk
    pub fn timeout_for(&self, risk: Risk) -> Duration {
        match risk.timeout_class() {
            TimeoutClass::Read => self.read_timeout(),
            TimeoutClass::Write => self.write_timeout(),
        }
    }

    pub fn compile_allowlist(&self) -> Result<Allowlist> {
        Allowlist::from_patterns(&self.allowlist)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DoctorConfig::default();
        assert_eq!(config.read_timeout_ms, 10_000);
        assert_eq!(config.write_timeout_ms, 60_000);
        assert_eq!(config.output_preview_chars, 1000);
        assert_eq!(config.timeout_for(Risk::Read), Duration::from_secs(10));
        assert_eq!(config.timeout_for(Risk::HighImpact), Duration::from_secs(60));
        assert!(config.compile_allowlist().unwrap().is_allowed("uptime"));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "platform = \"darwin\"\nread_timeout_ms = 2500\n").unwrap();

        let config = DoctorConfig::load(Some(&path)).unwrap();
        assert_eq!(config.platform, Platform::Darwin);
        assert_eq!(config.read_timeout_ms, 2500);
        assert_eq!(config.write_timeout_ms, 60_000);
        assert_eq!(config.allowlist, default_allowlist_patterns());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("config.toml");
        let mut config = DoctorConfig::default();
        config.allowlist = vec!["^uptime$".to_string()];
        config.output_preview_chars = 200;
        config.save_to(&path).unwrap();

        let loaded = DoctorConfig::load_from(&path).unwrap();
        assert_eq!(loaded, config);
    }

    #[test]
    fn test_bad_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.toml");

        fs::write(&path, "read_timeout_ms = \"soon\"").unwrap();
        assert!(matches!(DoctorConfig::load_from(&path), Err(DoctorError::Toml(_))));

        fs::write(&path, "write_timeout_ms = 0").unwrap();
        assert!(matches!(DoctorConfig::load_from(&path), Err(DoctorError::Config(_))));

        let missing = dir.path().join("absent.toml");
        assert!(matches!(DoctorConfig::load(Some(&missing)), Err(DoctorError::Config(_))));
    }

    #[test]
    fn test_bad_allowlist_pattern() {
        let config = DoctorConfig {
            allowlist: vec!["[".to_string()],
            ..DoctorConfig::default()
        };
        assert!(matches!(config.compile_allowlist(), Err(DoctorError::InvalidPattern { .. })));
    }
}
