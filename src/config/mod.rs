use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub plugins: PluginsConfig,
    #[serde(default)]
    pub decompiler: DecompilerConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginsConfig {
    /// Load plugins at start-up
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Extra plugin roots, searched after every standard location
    #[serde(default)]
    pub extra_dirs: Vec<PathBuf>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DecompilerConfig {
    /// radare2 executable; looked up on `PATH` when unset
    #[serde(default)]
    pub r2_path: Option<String>,

    /// Run the full analysis (`-A`) before each command
    #[serde(default)]
    pub analyze: bool,

    /// Additional radare2 arguments, e.g. `["-e", "bin.cache=true"]`
    #[serde(default)]
    pub extra_args: Vec<String>,
}

fn default_true() -> bool {
    true
}

impl Default for PluginsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            extra_dirs: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from default location
    ///
    /// # Errors
    /// Returns an error if the home directory is unknown or an existing
    /// config file cannot be read
    pub fn load_default() -> Result<Self> {
        let config_path = Self::default_config_path()?;

        if config_path.exists() {
            Self::load_from_file(&config_path)
        } else {
            Ok(Self::default())
        }
    }

    /// Load configuration from a specific file
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or is not valid YAML
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file {}", path.as_ref().display()))?;

        let config: Config =
            serde_yaml::from_str(&contents).context("Failed to parse config file")?;

        Ok(config)
    }

    /// Save configuration to file
    ///
    /// # Errors
    /// Returns an error if serialization or any filesystem operation fails
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let contents = serde_yaml::to_string(self).context("Failed to serialize config")?;

        if let Some(parent) = path.as_ref().parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        fs::write(path.as_ref(), contents).context("Failed to write config file")?;

        Ok(())
    }

    /// Get default configuration path
    ///
    /// # Errors
    /// Returns an error if the home directory cannot be determined
    pub fn default_config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Failed to get home directory")?;

        Ok(home.join(".iaito").join("config.yaml"))
    }
}
