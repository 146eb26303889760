use crate::error::RenameError;
use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const XMP_BASIC_NAMESPACE: &str = "http://ns.adobe.com/xap/1.0/";

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct AppConfig {
    pub primary_extension: String,
    pub sidecars: SidecarExtensions,
    pub metadata: MetadataKeys,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            primary_extension: "nef".to_string(),
            sidecars: SidecarExtensions::default(),
            metadata: MetadataKeys::default(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SidecarRole {
    Edit,
    Alternate,
}

/// Extensions of the companion files copied next to each primary file.
/// An empty extension disables that role.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SidecarExtensions {
    pub edit: String,
    pub alternate: String,
}

impl Default for SidecarExtensions {
    fn default() -> Self {
        Self {
            edit: "xmp".to_string(),
            alternate: "acr".to_string(),
        }
    }
}

impl SidecarExtensions {
    pub fn none() -> Self {
        Self {
            edit: String::new(),
            alternate: String::new(),
        }
    }

    pub fn get(&self, role: SidecarRole) -> Option<&str> {
        let ext = match role {
            SidecarRole::Edit => &self.edit,
            SidecarRole::Alternate => &self.alternate,
        };
        Some(normalize_extension(ext)).filter(|ext| !ext.is_empty())
    }

    pub fn iter(&self) -> impl Iterator<Item = (SidecarRole, &str)> {
        [SidecarRole::Edit, SidecarRole::Alternate]
            .into_iter()
            .filter_map(|role| self.get(role).map(|ext| (role, ext)))
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct MetadataKeys {
    pub namespace: String,
    pub timestamp_field: String,
    pub device_field: String,
    pub version_marker: String,
}

impl Default for MetadataKeys {
    fn default() -> Self {
        Self {
            namespace: XMP_BASIC_NAMESPACE.to_string(),
            timestamp_field: "CreateDate".to_string(),
            device_field: "CreatorTool".to_string(),
            version_marker: " Ver".to_string(),
        }
    }
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), RenameError> {
        let primary = normalize_extension(&self.primary_extension);
        if primary.is_empty() {
            return Err(RenameError::InvalidConfig(
                "primary_extension must not be empty".to_string(),
            ));
        }

        for (role, ext) in self.sidecars.iter() {
            if ext.eq_ignore_ascii_case(primary) {
                return Err(RenameError::InvalidConfig(format!(
                    "{role:?} sidecar extension equals the primary extension: {ext}"
                )));
            }
        }

        let keys = &self.metadata;
        if keys.namespace.trim().is_empty()
            || keys.timestamp_field.trim().is_empty()
            || keys.device_field.trim().is_empty()
        {
            return Err(RenameError::InvalidConfig(
                "metadata namespace and field names must not be empty".to_string(),
            ));
        }

        Ok(())
    }
}

/// Extensions are accepted with or without the leading dot.
pub fn normalize_extension(ext: &str) -> &str {
    ext.trim().trim_start_matches('.')
}

#[derive(Debug, Clone)]
pub struct AppPaths {
    pub config_path: PathBuf,
}

pub fn app_paths() -> Result<AppPaths> {
    let proj = ProjectDirs::from("com", "kelly", "raw-renamer")
        .context("could not locate the OS configuration directory")?;
    Ok(AppPaths {
        config_path: proj.config_dir().join("config.toml"),
    })
}

pub fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }

    let raw = fs::read_to_string(path)
        .with_context(|| format!("could not read config file: {}", path.display()))?;

    let config = toml::from_str::<AppConfig>(&raw)
        .with_context(|| format!("could not parse config file: {}", path.display()))?;
    config.validate()?;
    Ok(config)
}
