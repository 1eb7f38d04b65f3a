//! Configuration management for Warden
//!
//! Provides hierarchical configuration loading from multiple sources:
//! 1. Environment variables (WARDEN_* prefix, highest precedence)
//! 2. warden.local.toml (gitignored, local overrides)
//! 3. warden.toml (git-tracked, project config)
//! 4. ~/.config/warden/config.toml (user defaults)
//! 5. Built-in defaults (lowest precedence)

use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::Path;

mod error;
mod loader;
mod paths;

pub use error::ConfigError;
pub use loader::ConfigLoader;
pub use paths::Paths;

/// Main Warden configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct WardenConfig {
    pub session: SessionConfig,
    pub temporal: TemporalConfig,
    pub sod: SodConfig,
    pub admin: AdminConfig,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Minutes from creation until a session expires. 0 disables expiry.
    pub timeout_minutes: u32,
    /// Whether sessions may be created without a password.
    pub allow_trusted: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            timeout_minutes: 60,
            allow_trusted: true,
        }
    }
}

/// Which temporal validators run during authentication and activation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TemporalConfig {
    pub date: bool,
    pub lock_date: bool,
    pub time: bool,
    pub day: bool,
    pub timeout: bool,
}

impl Default for TemporalConfig {
    fn default() -> Self {
        Self {
            date: true,
            lock_date: true,
            time: true,
            day: true,
            timeout: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SodConfig {
    pub ssd_enabled: bool,
    pub dsd_enabled: bool,
    /// Count roles inherited through active seniors as DSD members.
    pub inherited_dsd_membership: bool,
}

impl Default for SodConfig {
    fn default() -> Self {
        Self {
            ssd_enabled: true,
            dsd_enabled: true,
            inherited_dsd_membership: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Roles that cannot be deleted.
    pub protected_roles: Vec<String>,
    /// Users that cannot be deleted.
    pub protected_users: Vec<String>,
    /// Organizational units that cannot be deleted.
    pub protected_org_units: Vec<String>,
    /// Check `AdminMgr` permissions for operations run through an admin session.
    pub enforce_admin_permissions: bool,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            protected_roles: Vec::new(),
            protected_users: Vec::new(),
            protected_org_units: Vec::new(),
            enforce_admin_permissions: true,
        }
    }
}

impl AdminConfig {
    pub fn is_protected_role(&self, name: &str) -> bool {
        self.protected_roles.iter().any(|r| r == name)
    }

    pub fn is_protected_user(&self, user_id: &str) -> bool {
        self.protected_users.iter().any(|u| u == user_id)
    }

    pub fn is_protected_org_unit(&self, name: &str) -> bool {
        self.protected_org_units.iter().any(|o| o == name)
    }
}

impl WardenConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        ConfigLoader::new().load()
    }

    /// Load configuration from specific project directory
    pub fn load_from_dir(project_dir: impl AsRef<Path>) -> Result<Self> {
        ConfigLoader::new().with_project_dir(project_dir).load()
    }

    /// Parse a configuration from TOML text, filling gaps with defaults.
    pub fn from_toml_str(text: &str) -> std::result::Result<Self, ConfigError> {
        let config: Self = toml::from_str(text).map_err(|source| ConfigError::ParseError {
            path: "<inline>".into(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Render the configuration as TOML.
    pub fn to_toml_string(&self) -> std::result::Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::SerializeError(e.to_string()))
    }

    /// Create a development configuration
    pub fn development() -> Self {
        Self {
            session: SessionConfig {
                timeout_minutes: 0,
                allow_trusted: true,
            },
            admin: AdminConfig {
                enforce_admin_permissions: false,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Create a production configuration
    pub fn production() -> Self {
        Self {
            session: SessionConfig {
                timeout_minutes: 30,
                allow_trusted: false,
            },
            admin: AdminConfig {
                enforce_admin_permissions: true,
                ..Default::default()
            },
            ..Default::default()
        }
    }

    /// Rejects values the engine cannot act on.
    pub fn validate(&self) -> std::result::Result<(), ConfigError> {
        let lists = [
            ("admin.protected_roles", &self.admin.protected_roles),
            ("admin.protected_users", &self.admin.protected_users),
            ("admin.protected_org_units", &self.admin.protected_org_units),
        ];
        for (key, names) in lists {
            if names.iter().any(|n| n.trim().is_empty()) {
                return Err(ConfigError::ValidationError(format!(
                    "{key} contains an empty name"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = WardenConfig::default();
        assert_eq!(config.session.timeout_minutes, 60);
        assert!(config.session.allow_trusted);
        assert!(config.temporal.date && config.temporal.timeout);
        assert!(config.sod.inherited_dsd_membership);
        assert!(config.admin.enforce_admin_permissions);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_development_config() {
        let config = WardenConfig::development();
        assert_eq!(config.session.timeout_minutes, 0);
        assert!(!config.admin.enforce_admin_permissions);
    }

    #[test]
    fn test_production_config() {
        let config = WardenConfig::production();
        assert_eq!(config.session.timeout_minutes, 30);
        assert!(!config.session.allow_trusted);
        assert!(config.admin.enforce_admin_permissions);
    }

    #[test]
    fn test_empty_protected_name_rejected() {
        let mut config = WardenConfig::default();
        config.admin.protected_roles.push("  ".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::ValidationError(_))
        ));
    }

    #[test]
    fn test_toml_round_trip_and_partial_sections() {
        let config = WardenConfig::from_toml_str(
            r#"
[sod]
inherited_dsd_membership = false

[admin]
protected_roles = ["superuser"]
"#,
        )
        .expect("Failed to parse config");

        assert!(!config.sod.inherited_dsd_membership);
        assert!(config.sod.dsd_enabled);
        assert!(config.admin.is_protected_role("superuser"));
        assert!(!config.admin.is_protected_role("clerk"));

        let text = config.to_toml_string().expect("Failed to render config");
        assert_eq!(WardenConfig::from_toml_str(&text).unwrap(), config);
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            WardenConfig::from_toml_str("[session\ntimeout_minutes = 5"),
            Err(ConfigError::ParseError { .. })
        ));
    }
}
