// Configuration loading and parsing (config/draft.toml).

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use serde::Deserialize;
use thiserror::Error;

use crate::draft::validate::PickPolicy;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config file not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },

    #[error("validation error for field `{field}`: {message}")]
    ValidationError { field: String, message: String },

    #[error("failed to initialize config from defaults: {message}")]
    DefaultsCopyError { message: String },

    #[error("no platform data directory is available for this user")]
    NoDataDir,
}

// ---------------------------------------------------------------------------
// draft.toml structs
// ---------------------------------------------------------------------------

/// Name of the config file under `config/` and `defaults/`.
pub const CONFIG_FILE: &str = "draft.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub draft: DraftConfig,
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pool: PoolConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DraftConfig {
    pub name: String,
    /// Let administrators pick on behalf of the team on the clock.
    #[serde(default)]
    pub allow_admin_override: bool,
    /// User ids with administrative rights.
    #[serde(default)]
    pub admins: Vec<String>,
    /// How many upcoming turns to send with each state update.
    #[serde(default = "default_lookahead")]
    pub lookahead: usize,
}

fn default_lookahead() -> usize {
    8
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub path: String,
    /// Resolve a relative `path` inside the platform data directory instead
    /// of the working directory.
    #[serde(default)]
    pub in_data_dir: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PoolConfig {
    /// CSV file with the player pool, imported on first run.
    #[serde(default)]
    pub players: Option<String>,
}

impl Config {
    pub fn pick_policy(&self) -> PickPolicy {
        PickPolicy {
            allow_admin_override: self.draft.allow_admin_override,
        }
    }
}

impl DatabaseConfig {
    /// Where the database file lives. `:memory:` and absolute paths are used
    /// as given.
    pub fn resolve_path(&self) -> Result<PathBuf, ConfigError> {
        let path = Path::new(&self.path);
        if self.path == ":memory:" || path.is_absolute() || !self.in_data_dir {
            return Ok(path.to_path_buf());
        }
        let dirs = ProjectDirs::from("", "", "snakedraft").ok_or(ConfigError::NoDataDir)?;
        Ok(dirs.data_dir().join(path))
    }
}

// ---------------------------------------------------------------------------
// Loading logic
// ---------------------------------------------------------------------------

/// Load and validate `config/draft.toml` relative to `base_dir`.
///
/// Does not copy defaults; `load_config()` does that first.
pub fn load_config_from(base_dir: &Path) -> Result<Config, ConfigError> {
    let path = base_dir.join("config").join(CONFIG_FILE);
    let text = read_file(&path)?;
    let config: Config = toml::from_str(&text).map_err(|e| ConfigError::ParseError {
        path: path.clone(),
        source: e,
    })?;
    validate(&config)?;
    Ok(config)
}

/// Ensure all config files exist by copying missing ones from `defaults/`.
/// Returns the list of files that were copied. Skips `.example` files.
pub fn ensure_config_files(base_dir: &Path) -> Result<Vec<PathBuf>, ConfigError> {
    let defaults_dir = base_dir.join("defaults");
    let config_dir = base_dir.join("config");

    if !defaults_dir.exists() {
        if !config_dir.exists() {
            return Err(ConfigError::DefaultsCopyError {
                message: format!(
                    "neither defaults/ nor config/ directory found in {}; \
                     run from the project root or ensure defaults/ is present",
                    base_dir.display()
                ),
            });
        }
        return Ok(vec![]);
    }

    std::fs::create_dir_all(&config_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to create config directory: {e}"),
    })?;

    let entries = std::fs::read_dir(&defaults_dir).map_err(|e| ConfigError::DefaultsCopyError {
        message: format!("failed to read defaults directory: {e}"),
    })?;

    let mut copied = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|e| ConfigError::DefaultsCopyError {
            message: format!("failed to read defaults entry: {e}"),
        })?;
        let path = entry.path();
        if !path.is_file() {
            continue;
        }
        let Some(file_name) = path.file_name() else {
            continue;
        };
        if file_name.to_str().is_some_and(|n| n.ends_with(".example")) {
            continue;
        }
        let target = config_dir.join(file_name);

        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&target)
        {
            Ok(mut dest) => {
                let content = std::fs::read(&path).map_err(|e| ConfigError::DefaultsCopyError {
                    message: format!("failed to read {}: {e}", path.display()),
                })?;
                std::io::Write::write_all(&mut dest, &content).map_err(|e| {
                    ConfigError::DefaultsCopyError {
                        message: format!("failed to write {}: {e}", target.display()),
                    }
                })?;
                copied.push(target);
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {}
            Err(e) => {
                return Err(ConfigError::DefaultsCopyError {
                    message: format!("failed to create {}: {e}", target.display()),
                });
            }
        }
    }

    Ok(copied)
}

/// Load config relative to the current working directory, copying defaults
/// first.
pub fn load_config() -> Result<Config, ConfigError> {
    let cwd = std::env::current_dir().map_err(|_| ConfigError::FileNotFound {
        path: PathBuf::from("."),
    })?;
    ensure_config_files(&cwd)?;
    load_config_from(&cwd)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn read_file(path: &Path) -> Result<String, ConfigError> {
    std::fs::read_to_string(path).map_err(|_| ConfigError::FileNotFound {
        path: path.to_path_buf(),
    })
}

fn invalid(field: &str, message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError {
        field: field.into(),
        message: message.into(),
    }
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

fn validate(config: &Config) -> Result<(), ConfigError> {
    if config.draft.name.trim().is_empty() {
        return Err(invalid("draft.name", "must not be empty"));
    }
    if config.draft.lookahead == 0 {
        return Err(invalid("draft.lookahead", "must be greater than 0"));
    }

    let mut seen = HashSet::new();
    for admin in &config.draft.admins {
        if admin.trim().is_empty() {
            return Err(invalid("draft.admins", "admin ids must not be empty"));
        }
        if !seen.insert(admin.as_str()) {
            return Err(invalid("draft.admins", format!("`{admin}` is listed twice")));
        }
    }
    if config.draft.allow_admin_override && config.draft.admins.is_empty() {
        return Err(invalid(
            "draft.allow_admin_override",
            "is enabled but no admins are configured",
        ));
    }

    if config.server.port == 0 {
        return Err(invalid("server.port", "must be greater than 0"));
    }
    if config.database.path.trim().is_empty() {
        return Err(invalid("database.path", "must not be empty"));
    }
    if config
        .pool
        .players
        .as_deref()
        .is_some_and(|p| p.trim().is_empty())
    {
        return Err(invalid("pool.players", "must not be empty when set"));
    }

    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
