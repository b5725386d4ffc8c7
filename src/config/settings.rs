//! Application settings loaded from config.toml
//!
//! Every key is optional; a missing file yields the defaults. The bot token is
//! never part of this file and is read from `DISCORD_TOKEN` instead.

use crate::{
    core::{campfire::CampfireSettings, dating::DailyLimits, dating::Privilege, ids::UserId},
    errors::{Error, Result},
};
use serde::Deserialize;
use std::{
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::{debug, info};

/// Whole config.toml
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Prefix of text commands
    pub prefix: String,
    /// Directory holding the JSON documents and content catalogs
    pub data_dir: PathBuf,
    /// Users allowed to date themselves and send more requests
    pub elevated_users: Vec<UserId>,
    pub dating: DailyLimits,
    pub timeouts: Timeouts,
    pub campfire: CampfireConfig,
    pub myday: MyDayConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            prefix: ".".to_string(),
            data_dir: PathBuf::from("json"),
            elevated_users: Vec::new(),
            dating: DailyLimits::default(),
            timeouts: Timeouts::default(),
            campfire: CampfireConfig::default(),
            myday: MyDayConfig::default(),
        }
    }
}

/// Inactivity windows, in seconds
#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct Timeouts {
    pub personality_step_secs: u64,
    pub confession_secs: u64,
    pub reaction_secs: u64,
    pub drawing_turn_secs: u64,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self {
            personality_step_secs: 60,
            confession_secs: 300,
            reaction_secs: 300,
            drawing_turn_secs: 60,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct CampfireConfig {
    pub max_campers: usize,
}

impl Default for CampfireConfig {
    fn default() -> Self {
        Self { max_campers: 2 }
    }
}

#[derive(Debug, Clone, Copy, Deserialize)]
#[serde(default)]
pub struct MyDayConfig {
    /// Contestants invited per day
    pub picks: usize,
}

impl Default for MyDayConfig {
    fn default() -> Self {
        Self { picks: 3 }
    }
}

impl AppConfig {
    /// Privilege of `user` according to `elevated_users`.
    #[must_use]
    pub fn privilege_of(&self, user: UserId) -> Privilege {
        if self.elevated_users.contains(&user) {
            Privilege::Elevated
        } else {
            Privilege::Standard
        }
    }

    #[must_use]
    pub const fn campfire_settings(&self) -> CampfireSettings {
        CampfireSettings {
            max_campers: self.campfire.max_campers,
            confession_timeout: Duration::from_secs(self.timeouts.confession_secs),
            reaction_timeout: Duration::from_secs(self.timeouts.reaction_secs),
        }
    }

    fn validate(self) -> Result<Self> {
        if self.prefix.trim().is_empty() {
            return Err(Error::Config {
                message: "prefix cannot be empty".to_string(),
            });
        }
        if self.campfire.max_campers == 0 || self.myday.picks == 0 {
            return Err(Error::Config {
                message: "campfire.max_campers and myday.picks must be at least 1".to_string(),
            });
        }
        Ok(self)
    }
}

/// Parses settings from TOML text.
pub fn parse_config(contents: &str) -> Result<AppConfig> {
    toml::from_str::<AppConfig>(contents)
        .map_err(|e| Error::Config {
            message: format!("Failed to parse config.toml: {e}"),
        })?
        .validate()
}

/// Loads settings from `path`; a missing file yields the defaults.
///
/// # Errors
/// Returns [`Error::Config`] when the file exists but cannot be read or parsed.
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<AppConfig> {
    let path = path.as_ref();
    debug!("Attempting to load configuration from: {:?}", path);
    match std::fs::read_to_string(path) {
        Ok(contents) => parse_config(&contents),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            info!("No config file at {:?}, using defaults", path);
            Ok(AppConfig::default())
        }
        Err(e) => Err(Error::Config {
            message: format!("Failed to read config file {path:?}: {e}"),
        }),
    }
}

#[cfg(test)]
mod tests {
    #![allow(clippy::unwrap_used)]
    use super::*;

    #[test]
    fn test_empty_file_gives_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.prefix, ".");
        assert_eq!(config.data_dir, PathBuf::from("json"));
        assert_eq!(config.dating.daily_limit, 5);
        assert_eq!(config.dating.elevated_daily_limit, 10);
        assert_eq!(config.timeouts.personality_step_secs, 60);
        assert_eq!(config.timeouts.confession_secs, 300);
        assert_eq!(config.campfire.max_campers, 2);
        assert_eq!(config.myday.picks, 3);
    }

    #[test]
    fn test_parse_full_config() {
        let toml_str = r#"
            prefix = "!"
            data_dir = "/var/lib/rocket"
            elevated_users = ["688898170276675624", 409049845240692736]

            [dating]
            daily_limit = 3

            [timeouts]
            confession_secs = 120

            [campfire]
            max_campers = 4
        "#;

        let config = parse_config(toml_str).unwrap();
        assert_eq!(config.prefix, "!");
        assert_eq!(config.dating.daily_limit, 3);
        assert_eq!(config.dating.elevated_daily_limit, 10);
        assert_eq!(config.timeouts.confession_secs, 120);
        assert_eq!(config.timeouts.reaction_secs, 300);
        assert_eq!(config.campfire_settings().max_campers, 4);
        assert_eq!(
            config.privilege_of(UserId::new(409_049_845_240_692_736)),
            Privilege::Elevated
        );
        assert_eq!(config.privilege_of(UserId::new(1)), Privilege::Standard);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(parse_config("prefix = \"\""), Err(Error::Config { .. })));
        assert!(matches!(parse_config("[myday]\npicks = 0"), Err(Error::Config { .. })));
        assert!(matches!(parse_config("prefix = ["), Err(Error::Config { .. })));
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load_config(dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.prefix, ".");
    }
}
