//! Configuration management
//!
//! Holds the signed-in user, the study schedule, marketplace rules and where
//! the library snapshot lives.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::CoreResult;
use crate::market::{MarketSettings, SortKey, MIN_SELLABLE_WORDS};
use crate::study::StudySchedule;
use crate::types::{require_user, UserId};

/// Main configuration structure
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Default tracing filter directive, overridden by RUST_LOG
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub user: UserConfig,
    #[serde(default)]
    pub study: StudyConfig,
    #[serde(default)]
    pub market: MarketConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct UserConfig {
    /// Account every command acts as
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub current_user: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StudyConfig {
    /// Days until the next session, indexed by completed repetitions
    #[serde(default = "default_intervals_days")]
    pub intervals_days: Vec<u32>,
}

fn default_intervals_days() -> Vec<u32> {
    vec![1, 2, 4, 7, 15]
}

impl Default for StudyConfig {
    fn default() -> Self {
        Self { intervals_days: default_intervals_days() }
    }
}

impl StudyConfig {
    pub fn schedule(&self) -> StudySchedule {
        StudySchedule::new(self.intervals_days.clone())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketConfig {
    #[serde(default = "default_min_sellable_words")]
    pub min_sellable_words: usize,
    #[serde(default)]
    pub review_reward: i64,
    /// Ordering for `market list` when none is given
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_sort: Option<SortKey>,
}

fn default_min_sellable_words() -> usize {
    MIN_SELLABLE_WORDS
}

impl Default for MarketConfig {
    fn default() -> Self {
        Self {
            min_sellable_words: default_min_sellable_words(),
            review_reward: 0,
            default_sort: None,
        }
    }
}

impl MarketConfig {
    pub fn settings(&self) -> MarketSettings {
        MarketSettings {
            min_sellable_words: self.min_sellable_words,
            review_reward: self.review_reward,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Snapshot file; defaults to `library.json` in the data directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub snapshot_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            user: UserConfig::default(),
            study: StudyConfig::default(),
            market: MarketConfig::default(),
            storage: StorageConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from file, creating it with defaults on first use
    pub fn load() -> Result<Self> {
        Self::load_from(&config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .context("Failed to read config file")?;
            let config: Config = toml::from_str(&contents)
                .context("Failed to parse config file")?;
            Ok(config)
        } else {
            let config = Config::default();
            config.save_to(path)?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let parent = path.parent()
            .context("Config path has no parent")?;

        std::fs::create_dir_all(parent)
            .context("Failed to create config directory")?;

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// The signed-in user, or `NoCurrentUser`
    pub fn current_user(&self) -> CoreResult<UserId> {
        let user = self.user.current_user.as_deref().map(UserId::from);
        require_user(user.as_ref()).cloned()
    }

    pub fn snapshot_path(&self) -> Result<PathBuf> {
        match &self.storage.snapshot_path {
            Some(path) => Ok(path.clone()),
            None => Ok(data_dir()?.join("library.json")),
        }
    }
}

fn project_dirs() -> Result<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "memonote", "memonote")
        .context("Failed to get project directories")
}

/// Get the configuration file path
pub fn config_path() -> Result<PathBuf> {
    Ok(project_dirs()?.config_dir().join("config.toml"))
}

/// Get the data directory path
pub fn data_dir() -> Result<PathBuf> {
    Ok(project_dirs()?.data_dir().to_path_buf())
}

/// Show current configuration
pub fn show_config() -> Result<()> {
    let config = Config::load()?;

    println!("Configuration ({})", config_path()?.display());
    println!("  current user:        {}", config.user.current_user.as_deref().unwrap_or("(none)"));
    println!("  study intervals:     {:?} days", config.study.intervals_days);
    println!("  min sellable words:  {}", config.market.min_sellable_words);
    println!("  review reward:       {}", config.market.review_reward);
    println!(
        "  default sort:        {}",
        config.market.default_sort.map(|s| format!("{:?}", s)).unwrap_or_else(|| "catalog order".to_string())
    );
    println!("  snapshot:            {}", config.snapshot_path()?.display());
    println!("  log level:           {}", config.log_level);

    Ok(())
}

/// Sign in as `user`
pub fn set_current_user(user: &str) -> Result<()> {
    let user = user.trim();
    if user.is_empty() {
        anyhow::bail!("User id cannot be empty");
    }
    let mut config = Config::load()?;
    config.user.current_user = Some(user.to_string());
    config.save()?;
    println!("Signed in as {}", user);
    Ok(())
}

/// Reset configuration to defaults
pub fn reset_config() -> Result<()> {
    let config = Config::default();
    config.save()?;
    println!("Configuration reset to defaults.");
    Ok(())
}
