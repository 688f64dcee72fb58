//! Device catalog: named viewport profiles grouped by device class.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse device category. Each class maps to one representative profile
/// and one mockup frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceClass {
    Mobile,
    Tablet,
    Desktop,
}

impl DeviceClass {
    pub const ALL: [DeviceClass; 3] = [DeviceClass::Mobile, DeviceClass::Tablet, DeviceClass::Desktop];

    pub fn as_str(self) -> &'static str {
        match self {
            DeviceClass::Mobile => "mobile",
            DeviceClass::Tablet => "tablet",
            DeviceClass::Desktop => "desktop",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceClass {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mobile" => Ok(DeviceClass::Mobile),
            "tablet" => Ok(DeviceClass::Tablet),
            "desktop" => Ok(DeviceClass::Desktop),
            _ => Err(Error::DeviceClassUnsupported(s.to_string())),
        }
    }
}

/// One concrete device viewport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceProfile {
    pub class: DeviceClass,
    pub name: String,
    pub width: u32,
    pub height: u32,
    /// User agent presented while capturing this device
    pub identity: String,
}

impl DeviceProfile {
    pub fn new(class: DeviceClass, name: impl Into<String>, width: u32, height: u32, identity: impl Into<String>) -> Self {
        Self { class, name: name.into(), width, height, identity: identity.into() }
    }

    /// Deterministic capture filename: `{name_lowercased_underscored}_{w}x{h}.{ext}`
    pub fn capture_file_name(&self, extension: &str) -> String {
        let safe_name = self.name.replace(' ', "_").to_lowercase();
        format!("{}_{}x{}.{}", safe_name, self.width, self.height, extension)
    }
}

const IOS_UA: &str = "Mozilla/5.0 (iPhone; CPU iPhone OS 14_0 like Mac OS X) AppleWebKit/605.1.15";
const WINDOWS_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36";

// (class, name, width, height, user agent); first entry per class is the representative
const BUILTIN_PROFILES: &[(DeviceClass, &str, u32, u32, &str)] = &[
    (DeviceClass::Mobile, "iPhone 12", 390, 844, IOS_UA),
    (DeviceClass::Mobile, "Samsung Galaxy S21", 360, 800, "Mozilla/5.0 (Linux; Android 11; SM-G991B) AppleWebKit/537.36"),
    (DeviceClass::Mobile, "Google Pixel 5", 393, 851, "Mozilla/5.0 (Linux; Android 11; Pixel 5) AppleWebKit/537.36"),
    (DeviceClass::Tablet, "iPad Pro", 1024, 1366, "Mozilla/5.0 (iPad; CPU OS 14_0 like Mac OS X) AppleWebKit/605.1.15"),
    (DeviceClass::Tablet, "Samsung Galaxy Tab", 800, 1280, "Mozilla/5.0 (Linux; Android 11; SM-T870) AppleWebKit/537.36"),
    (DeviceClass::Tablet, "Surface Pro", 912, 1368, WINDOWS_UA),
    (DeviceClass::Desktop, "Desktop 1920x1080", 1920, 1080, WINDOWS_UA),
    (DeviceClass::Desktop, "Desktop 1366x768", 1366, 768, WINDOWS_UA),
    (DeviceClass::Desktop, "MacBook Pro", 1440, 900, "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36"),
];

/// Immutable registry of device profiles.
///
/// Built once at startup and shared (usually behind an `Arc`) with the
/// pipeline. Profile order inside a class matters: the first one is the
/// representative used for captures.
#[derive(Debug, Clone)]
pub struct DeviceCatalog {
    profiles: Vec<DeviceProfile>,
}

impl DeviceCatalog {
    pub fn builtin() -> Self {
        let profiles = BUILTIN_PROFILES
            .iter()
            .map(|&(class, name, width, height, ua)| DeviceProfile::new(class, name, width, height, ua))
            .collect();
        Self { profiles }
    }

    /// Build a catalog from an explicit list. Every profile needs a non-zero size.
    pub fn from_profiles(profiles: Vec<DeviceProfile>) -> Result<Self> {
        if let Some(bad) = profiles.iter().find(|p| p.width == 0 || p.height == 0) {
            return Err(Error::ConfigError(format!("device '{}' has a zero dimension", bad.name)));
        }
        Ok(Self { profiles })
    }

    pub fn profiles(&self) -> &[DeviceProfile] {
        &self.profiles
    }

    pub fn profiles_for(&self, class: DeviceClass) -> impl Iterator<Item = &DeviceProfile> {
        self.profiles.iter().filter(move |p| p.class == class)
    }

    /// The profile captured for a class: the first one listed.
    pub fn representative(&self, class: DeviceClass) -> Option<&DeviceProfile> {
        self.profiles_for(class).next()
    }

    /// Resolve a requested class name to its representative profile.
    pub fn resolve(&self, class_name: &str) -> Result<&DeviceProfile> {
        let class: DeviceClass = class_name.parse()?;
        self.representative(class)
            .ok_or_else(|| Error::DeviceClassUnsupported(class_name.to_string()))
    }
}

impl Default for DeviceCatalog {
    fn default() -> Self {
        Self::builtin()
    }
}
