use crate::models::{IgnoreList, MergeSettings};
use anyhow::{Context, Result};
use camino::{Utf8Path, Utf8PathBuf};
use std::fs;

/// Configuration manager for loading and saving YAML configuration files.
///
/// Manages two configuration files:
/// - Ignore list (`ignore.yaml`): directory names to skip, created with defaults if missing
/// - Settings (`settings.yaml`): optional defaults for the merge tunables
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config_dir: Utf8PathBuf,
    ignore_list_path: Utf8PathBuf,
    settings_path: Utf8PathBuf,
}

impl ConfigManager {
    /// Create a new ConfigManager with the specified configuration directory.
    ///
    /// # Arguments
    /// * `config_dir` - Directory containing configuration files
    ///
    /// # Returns
    /// A new ConfigManager instance
    pub fn new<P: AsRef<Utf8Path>>(config_dir: P) -> Result<Self> {
        let config_dir = config_dir.as_ref().to_path_buf();

        // Create config directory if it doesn't exist
        if !config_dir.exists() {
            fs::create_dir_all(&config_dir)
                .with_context(|| format!("Failed to create config directory: {}", config_dir))?;
        }

        Ok(Self {
            ignore_list_path: config_dir.join("ignore.yaml"),
            settings_path: config_dir.join("settings.yaml"),
            config_dir,
        })
    }

    /// Use a custom ignore list file instead of `<config_dir>/ignore.yaml`.
    pub fn with_ignore_file<P: AsRef<Utf8Path>>(mut self, path: P) -> Self {
        self.ignore_list_path = path.as_ref().to_path_buf();
        self
    }

    /// Load the ignore list.
    ///
    /// If the file doesn't exist, the default list is written to it first and
    /// then returned. A JSON array is accepted as well, since it is valid YAML.
    pub fn load_ignore_list(&self) -> Result<IgnoreList> {
        if !self.ignore_list_path.exists() {
            tracing::warn!(
                "Ignore list not found at {}, creating default",
                self.ignore_list_path
            );
            let defaults = IgnoreList::default();
            self.save_ignore_list(&defaults)?;
            return Ok(defaults);
        }

        let file_contents = fs::read_to_string(&self.ignore_list_path).with_context(|| {
            format!("Failed to read ignore list: {}", self.ignore_list_path)
        })?;

        let list: IgnoreList = serde_yaml_ng::from_str(&file_contents).with_context(|| {
            format!("Failed to parse ignore list: {}", self.ignore_list_path)
        })?;

        tracing::info!(
            "Loaded {} ignored name(s) from {}",
            list.len(),
            self.ignore_list_path
        );
        Ok(list)
    }

    /// Save the ignore list.
    ///
    /// # Arguments
    /// * `list` - The IgnoreList to save
    pub fn save_ignore_list(&self, list: &IgnoreList) -> Result<()> {
        if let Some(parent) = self.ignore_list_path.parent() {
            if !parent.as_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)
                    .with_context(|| format!("Failed to create directory: {}", parent))?;
            }
        }

        let yaml_string =
            serde_yaml_ng::to_string(list).context("Failed to serialize ignore list to YAML")?;

        fs::write(&self.ignore_list_path, yaml_string).with_context(|| {
            format!("Failed to write ignore list: {}", self.ignore_list_path)
        })?;

        tracing::info!("Saved ignore list to {}", self.ignore_list_path);
        Ok(())
    }

    /// Load the settings file.
    ///
    /// # Returns
    /// The loaded MergeSettings, or default if file doesn't exist
    pub fn load_settings(&self) -> Result<MergeSettings> {
        if !self.settings_path.exists() {
            tracing::debug!(
                "Settings file not found at {}, using defaults",
                self.settings_path
            );
            return Ok(MergeSettings::default());
        }

        let file_contents = fs::read_to_string(&self.settings_path)
            .with_context(|| format!("Failed to read settings: {}", self.settings_path))?;

        let settings: MergeSettings = serde_yaml_ng::from_str(&file_contents)
            .with_context(|| format!("Failed to parse settings: {}", self.settings_path))?;

        tracing::info!("Loaded settings from {}", self.settings_path);
        Ok(settings)
    }

    /// Save the settings file.
    ///
    /// # Arguments
    /// * `settings` - The MergeSettings to save
    pub fn save_settings(&self, settings: &MergeSettings) -> Result<()> {
        let yaml_string =
            serde_yaml_ng::to_string(settings).context("Failed to serialize settings to YAML")?;

        fs::write(&self.settings_path, yaml_string)
            .with_context(|| format!("Failed to write settings: {}", self.settings_path))?;

        tracing::info!("Saved settings to {}", self.settings_path);
        Ok(())
    }

    /// Get the configuration directory path.
    pub fn config_dir(&self) -> &Utf8Path {
        &self.config_dir
    }

    /// Get the ignore list path.
    pub fn ignore_list_path(&self) -> &Utf8Path {
        &self.ignore_list_path
    }

    /// Get the settings file path.
    pub fn settings_path(&self) -> &Utf8Path {
        &self.settings_path
    }
}
