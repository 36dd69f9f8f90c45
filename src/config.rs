//! Configuration Management
//!
//! Handles persistent appliance profiles for isamcfg.

use crate::appliance::client::DEFAULT_PORT;
use crate::appliance::{ApplianceClient, Credentials};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Connection settings for one appliance
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ApplianceProfile {
    pub hostname: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default)]
    pub username: Option<String>,
    /// Stored passwords are optional; ISAMCFG_PASSWORD is used otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    /// Verify the management certificate (off for self-signed appliances)
    #[serde(default)]
    pub verify_tls: bool,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
}

fn default_port() -> u16 {
    DEFAULT_PORT
}

impl ApplianceProfile {
    pub fn new(hostname: &str) -> Self {
        Self {
            hostname: hostname.to_string(),
            port: DEFAULT_PORT,
            username: None,
            password: None,
            verify_tls: false,
            timeout_secs: None,
        }
    }

    /// Build a client for this profile
    pub fn connect(&self) -> Result<ApplianceClient> {
        let credentials = Credentials::resolve(self.username.as_deref(), self.password.as_deref())?;
        ApplianceClient::new(
            &self.hostname,
            self.port,
            credentials,
            self.verify_tls,
            self.timeout_secs.map(Duration::from_secs),
        )
    }
}

/// User configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    /// Profile used when none is named
    #[serde(default)]
    pub default_profile: Option<String>,
    #[serde(default)]
    pub profiles: BTreeMap<String, ApplianceProfile>,
}

impl Config {
    /// Get the config file path
    pub fn config_path() -> Option<PathBuf> {
        dirs::config_dir().map(|p| p.join("isamcfg").join("config.json"))
    }

    /// Load configuration from disk
    pub fn load() -> Self {
        let Some(path) = Self::config_path() else {
            return Self::default();
        };
        Self::load_from(&path).unwrap_or_else(|e| {
            tracing::warn!("Ignoring unreadable config {}: {:#}", path.display(), e);
            Self::default()
        })
    }

    /// Load configuration from a specific file; a missing file is an empty config
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_json::from_str(&content).with_context(|| format!("Failed to parse {}", path.display()))
    }

    /// Save configuration to disk
    pub fn save(&self) -> Result<()> {
        let Some(path) = Self::config_path() else {
            return Ok(());
        };
        self.save_to(&path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Create parent directory
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;

        Ok(())
    }

    /// Get a profile by name, or the default profile
    pub fn profile(&self, name: Option<&str>) -> Option<&ApplianceProfile> {
        let name = name.or(self.default_profile.as_deref())?;
        self.profiles.get(name)
    }

    /// Add or replace a profile and save
    pub fn set_profile(&mut self, name: &str, profile: ApplianceProfile) -> Result<()> {
        if self.profiles.is_empty() && self.default_profile.is_none() {
            self.default_profile = Some(name.to_string());
        }
        self.profiles.insert(name.to_string(), profile);
        self.save()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.default_profile = Some("lab".to_string());
        config.profiles.insert("lab".to_string(), ApplianceProfile::new("isam-lab.example.com"));
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        let profile = loaded.profile(None).unwrap();
        assert_eq!(profile.hostname, "isam-lab.example.com");
        assert_eq!(profile.port, 443);
        assert!(!profile.verify_tls);
    }

    #[test]
    fn test_missing_file_is_empty_config() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join("absent.json")).unwrap();
        assert!(config.profiles.is_empty());
        assert!(config.profile(None).is_none());
    }

    #[test]
    fn test_named_profile_wins_over_default() {
        let mut config = Config::default();
        config.default_profile = Some("a".to_string());
        config.profiles.insert("a".to_string(), ApplianceProfile::new("a.example.com"));
        config.profiles.insert("b".to_string(), ApplianceProfile::new("b.example.com"));
        assert_eq!(config.profile(Some("b")).unwrap().hostname, "b.example.com");
        assert_eq!(config.profile(None).unwrap().hostname, "a.example.com");
        assert!(config.profile(Some("c")).is_none());
    }

    #[test]
    fn test_profile_defaults_from_minimal_json() {
        let profile: ApplianceProfile = serde_json::from_str(r#"{"hostname": "10.0.0.5"}"#).unwrap();
        assert_eq!(profile.port, 443);
        assert_eq!(profile.username, None);
        assert_eq!(profile.timeout_secs, None);
    }
}
