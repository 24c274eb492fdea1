use anyhow::{Context, Result, anyhow, bail};
use dirs::home_dir;
use serde::{Deserialize, Serialize};
use std::fs;
use std::net::Ipv4Addr;
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};

const APP_DIR: &str = ".ChildJournal";
const HOME_ENV: &str = "CHILD_JOURNAL_HOME";
const CONFIG_FILE: &str = "config.json";
const REGISTRY_FILE: &str = "child_questions.json";
const JOURNAL_FILE: &str = "child_journal.csv";
pub const DEFAULT_API_PORT: u16 = 5000;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub data_dir: PathBuf,
    pub registry_path: PathBuf,
    pub journal_path: PathBuf,
    pub api_host: Ipv4Addr,
    pub api_port: u16,
}

impl Default for Config {
    fn default() -> Self {
        Self::with_data_dir(default_root_dir().join("data"))
    }
}

impl Config {
    pub fn with_data_dir(data_dir: PathBuf) -> Self {
        Self {
            registry_path: data_dir.join(REGISTRY_FILE),
            journal_path: data_dir.join(JOURNAL_FILE),
            data_dir,
            api_host: Ipv4Addr::LOCALHOST,
            api_port: DEFAULT_API_PORT,
        }
    }

    pub fn root_dir() -> Result<PathBuf> {
        Ok(default_root_dir())
    }

    pub fn config_path() -> Result<PathBuf> {
        Ok(default_root_dir().join(CONFIG_FILE))
    }

    pub fn load() -> Result<Self> {
        let config_path = Self::config_path()?;
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file: {}", config_path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", config_path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_path()?;
        if let Some(parent) = config_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create config directory: {}", parent.display())
            })?;
        }

        let content = serde_json::to_string_pretty(self).context("Failed to serialize config")?;
        fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {}", config_path.display()))?;
        set_mode_600(&config_path)?;

        Ok(())
    }

    pub fn ensure_bootstrap_files(&self) -> Result<()> {
        let root = Self::root_dir()?;
        fs::create_dir_all(&root)
            .with_context(|| format!("Failed to create root directory: {}", root.display()))?;

        fs::create_dir_all(&self.data_dir).with_context(|| {
            format!("Failed to create data directory: {}", self.data_dir.display())
        })?;

        [&self.registry_path, &self.journal_path]
            .into_iter()
            .filter_map(|path| path.parent())
            .try_for_each(|parent| {
                fs::create_dir_all(parent).with_context(|| {
                    format!("Failed to create data directory: {}", parent.display())
                })
            })
    }

    pub fn set_value(&mut self, key: &str, value: &str) -> Result<()> {
        match normalize_config_key(key) {
            "data_dir" => {
                let data_dir = expand_home(value.trim());
                let relocated = Self::with_data_dir(data_dir);
                self.data_dir = relocated.data_dir;
                self.registry_path = relocated.registry_path;
                self.journal_path = relocated.journal_path;
            }
            "registry_path" => {
                self.registry_path = expand_home(value.trim());
            }
            "journal_path" => {
                self.journal_path = expand_home(value.trim());
            }
            "api_host" => {
                self.api_host = value
                    .trim()
                    .parse::<Ipv4Addr>()
                    .map_err(|_| anyhow!("api_host must be an IPv4 address"))?;
            }
            "api_port" => {
                self.api_port = value
                    .trim()
                    .parse::<u16>()
                    .map_err(|_| anyhow!("api_port must be a number"))?;
            }
            _ => {
                bail!(
                    "Unsupported config key: {key}. Supported keys: data_dir|data.dir, registry_path|registry.path, journal_path|journal.path, api_host|api.host, api_port|api.port"
                );
            }
        }

        Ok(())
    }

    pub fn get_value(&self, key: &str) -> Option<String> {
        match normalize_config_key(key) {
            "data_dir" => Some(self.data_dir.display().to_string()),
            "registry_path" => Some(self.registry_path.display().to_string()),
            "journal_path" => Some(self.journal_path.display().to_string()),
            "api_host" => Some(self.api_host.to_string()),
            "api_port" => Some(self.api_port.to_string()),
            _ => None,
        }
    }
}

fn normalize_config_key(key: &str) -> &str {
    match key {
        "data_dir" | "data.dir" => "data_dir",
        "registry_path" | "registry.path" => "registry_path",
        "journal_path" | "journal.path" => "journal_path",
        "api_host" | "api.host" => "api_host",
        "api_port" | "api.port" => "api_port",
        _ => key,
    }
}

pub fn expand_home(raw: &str) -> PathBuf {
    raw.strip_prefix("~/")
        .and_then(|stripped| home_dir().map(|home| home.join(stripped)))
        .unwrap_or_else(|| PathBuf::from(raw))
}

fn default_root_dir() -> PathBuf {
    if let Some(root) = std::env::var_os(HOME_ENV).filter(|value| !value.is_empty()) {
        return PathBuf::from(root);
    }

    home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(APP_DIR)
}

fn set_mode_600(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        fs::set_permissions(path, fs::Permissions::from_mode(0o600))
            .with_context(|| format!("Failed to set file permissions: {}", path.display()))?;
    }

    Ok(())
}
