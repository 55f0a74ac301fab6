//! YAML settings for a managed VIP.
//!
//! ```yaml
//! interface: eth0
//! virtual_address: 192.168.0.12
//! prefix_length: 24        # or: netmask: 255.255.255.0
//! ip_binary: /sbin/ip      # optional
//! ```

use crate::command::{DEFAULT_IP_BINARY, IpCommand};
use crate::types::{Interface, VipConfig, prefix_from_netmask};
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use thiserror::Error;
use validator::{Validate, ValidationError};

/// Settings error types
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("Settings file not found in search paths")]
    FileNotFound,

    #[error("Failed to read settings file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Failed to parse YAML: {0}")]
    ParseError(#[from] serde_yaml::Error),

    #[error("Invalid settings: {0}")]
    ValidationError(#[from] validator::ValidationErrors),
}

/// Operator-facing description of the VIP binding
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_prefix_source"))]
pub struct VipSettings {
    /// Interface the VIP lives on
    #[validate(length(min = 1, max = 15), custom = "validate_interface_name")]
    pub interface: String,

    pub virtual_address: Ipv4Addr,

    #[serde(default)]
    pub prefix_length: Option<u8>,

    /// Dotted alternative to `prefix_length`
    #[serde(default)]
    pub netmask: Option<Ipv4Addr>,

    #[serde(default = "default_ip_binary")]
    #[validate(length(min = 1))]
    pub ip_binary: String,
}

fn default_ip_binary() -> String {
    DEFAULT_IP_BINARY.to_string()
}

// Custom validators

fn validate_interface_name(name: &str) -> Result<(), ValidationError> {
    if name.contains('/') || name.chars().any(char::is_whitespace) {
        return Err(ValidationError::new("interface_name_invalid"));
    }
    Ok(())
}

fn validate_prefix_source(settings: &VipSettings) -> Result<(), ValidationError> {
    match (settings.prefix_length, settings.netmask) {
        (Some(prefix), None) if prefix > 32 => {
            Err(ValidationError::new("prefix_length_out_of_range"))
        }
        (Some(_), None) => Ok(()),
        (None, Some(netmask)) => prefix_from_netmask(netmask)
            .map(|_| ())
            .map_err(|_| ValidationError::new("netmask_not_contiguous")),
        (Some(_), Some(_)) => Err(ValidationError::new("prefix_length_and_netmask_both_set")),
        (None, None) => Err(ValidationError::new("prefix_length_or_netmask_required")),
    }
}

impl VipSettings {
    /// Load settings from default search paths
    pub fn load() -> Result<Self, SettingsError> {
        match Self::find_settings_file() {
            Some(path) => {
                tracing::info!("Loading VIP settings from: {}", path.display());
                Self::load_from_file(&path)
            }
            None => Err(SettingsError::FileNotFound),
        }
    }

    /// Load settings from a specific file
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, SettingsError> {
        let contents = std::fs::read_to_string(path.as_ref())?;
        Self::from_yaml_str(&contents)
    }

    /// Parse and validate settings from YAML text
    pub fn from_yaml_str(contents: &str) -> Result<Self, SettingsError> {
        let settings: VipSettings = serde_yaml::from_str(contents)?;
        settings.validate()?;
        Ok(settings)
    }

    fn find_settings_file() -> Option<PathBuf> {
        [
            PathBuf::from("/etc/seesaw/vip.yaml"),
            PathBuf::from("./vip.yaml"),
        ]
        .into_iter()
        .find(|p| p.is_file())
    }

    /// Effective prefix length, from either `prefix_length` or `netmask`
    pub fn prefix_length(&self) -> common::Result<u8> {
        match (self.prefix_length, self.netmask) {
            (Some(prefix), None) => Ok(prefix),
            (None, Some(netmask)) => prefix_from_netmask(netmask),
            _ => Err(common::Error::config(
                "exactly one of prefix_length or netmask must be set",
            )),
        }
    }

    pub fn ip_command(&self) -> IpCommand {
        IpCommand::new(self.ip_binary.clone())
    }

    /// Build a configuration from these settings, looking the interface up
    /// in the running kernel.
    pub fn resolve(&self) -> common::Result<VipConfig> {
        let prefix_length = self.prefix_length()?;
        let interface = Interface::from_name(&self.interface)?;
        self.to_config(interface, prefix_length)
    }

    /// Build a configuration against an already known interface.
    pub fn to_config(&self, interface: Interface, prefix_length: u8) -> common::Result<VipConfig> {
        if interface.name != self.interface {
            return Err(common::Error::config(format!(
                "interface {} does not match configured {}",
                interface.name, self.interface
            )));
        }
        VipConfig::new(interface, self.virtual_address, prefix_length)
    }
}
