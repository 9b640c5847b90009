//! Device configuration: identity and control layout, loaded from YAML
//! and/or overridden from the command line. Immutable after startup.

use std::io;
use std::path::Path;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::gamepad::GamepadLayout;

pub const DEFAULT_DEVICE_NAME: &str = "uhid-gamepad";
pub const DEFAULT_VENDOR_ID: u16 = 0x9999;
pub const DEFAULT_PRODUCT_ID: u16 = 0x9999;

/// Represents all possible errors loading a [DeviceConfig]
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Could not read: {0}")]
    IoError(#[from] io::Error),
    #[error("Unable to deserialize: {0}")]
    DeserializeError(#[from] serde_yaml::Error),
}

/// Identity advertised to the kernel at device creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct DeviceIdentity {
    pub name: String,
    pub vendor_id: u16,
    pub product_id: u16,
    pub version: u32,
}

impl Default for DeviceIdentity {
    fn default() -> Self {
        Self {
            name: DEFAULT_DEVICE_NAME.to_string(),
            vendor_id: DEFAULT_VENDOR_ID,
            product_id: DEFAULT_PRODUCT_ID,
            version: 0,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", default)]
pub struct DeviceConfig {
    pub identity: DeviceIdentity,
    pub layout: GamepadLayout,
}

impl DeviceConfig {
    /// Load a [DeviceConfig] from the given YAML string
    pub fn from_yaml(content: &str) -> Result<DeviceConfig, LoadError> {
        let config: DeviceConfig = serde_yaml::from_str(content)?;
        Ok(config)
    }

    /// Load a [DeviceConfig] from the given YAML file
    pub fn from_yaml_file<P: AsRef<Path>>(path: P) -> Result<DeviceConfig, LoadError> {
        let file = std::fs::File::open(path)?;
        let config: DeviceConfig = serde_yaml::from_reader(file)?;
        Ok(config)
    }
}
