// Edit settings and table templates
// Loaded from ~/.config/sheetmem/settings.toml

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use sheetmem_engine::{EditOptions, SheetPrompts, SheetTemplate};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings in {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("cannot serialize settings: {0}")]
    Serialize(#[from] toml::ser::Error),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch. When off no turn is processed.
    pub enabled: bool,

    /// Render tables into the prompt
    pub ai_read_table: bool,

    /// Apply edit calls found in AI turns
    pub ai_write_table: bool,

    /// Edits are filled by a separate step, so received and edited turns
    /// are not parsed inline
    pub step_by_step: bool,

    /// Tag delimiting the edit region, without angle brackets
    pub edit_tag: String,

    /// How many turns from the end the table prompt is injected at
    pub injection_depth: usize,

    /// Templates new chats start with
    pub tables: Vec<SheetTemplate>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: true,
            ai_read_table: true,
            ai_write_table: true,
            step_by_step: false,
            edit_tag: "tableEdit".to_string(),
            injection_depth: 2,
            tables: default_tables(),
        }
    }
}

fn default_tables() -> Vec<SheetTemplate> {
    vec![
        SheetTemplate {
            required: true,
            prompts: SheetPrompts {
                note: "Current time and place. Keep to one row.".into(),
                init: "Record the current date, time, location and characters with insertRow.".into(),
                update: "When the scene, time or characters present change.".into(),
                delete: "If this table has more than one row, delete the extra rows.".into(),
                ..Default::default()
            },
            ..SheetTemplate::new("Spacetime Table", &["Date", "Time", "Location", "Characters Here"])
        },
        SheetTemplate {
            required: true,
            prompts: SheetPrompts {
                note: "Lasting traits of each character.".into(),
                init: "Insert every known character. Character Name must not be empty.".into(),
                insert: "When a character not in the table appears.".into(),
                update: "When a character's appearance, occupation or residence changes.".into(),
                ..Default::default()
            },
            ..SheetTemplate::new(
                "Character Feature Table",
                &["Character Name", "Physical Features", "Personality", "Occupation", "Residence"],
            )
        },
        SheetTemplate {
            required: true,
            prompts: SheetPrompts {
                note: "Important events the user or characters went through.".into(),
                insert: "When a character experiences a memorable event.".into(),
                ..Default::default()
            },
            ..SheetTemplate::new(
                "Important Event History Table",
                &["Character", "Event Summary", "Date", "Location", "Emotion"],
            )
        },
    ]
}

impl Settings {
    /// Get the settings file path
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("sheetmem")
            .join("settings.toml")
    }

    /// Load settings from the default location, falling back to defaults
    pub fn load() -> Self {
        let path = Self::config_path();
        if !path.exists() {
            return Self::default();
        }
        match Self::load_from(&path) {
            Ok(settings) => settings,
            Err(e) => {
                log::warn!("{}; using default settings", e);
                Self::default()
            }
        }
    }

    /// Load settings from an explicit file. Missing keys take defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&contents).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Write settings as pretty TOML, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let text = toml::to_string_pretty(self)?;
        fs::write(path, text).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Orchestrator options for these settings.
    pub fn edit_options(&self) -> EditOptions {
        EditOptions {
            enabled: self.enabled,
            edit_tag: self.edit_tag.clone(),
            write_enabled: self.ai_write_table,
            inline_edits: !self.step_by_step,
        }
    }

    /// Get the config file path for display
    pub fn config_path_display() -> String {
        Self::config_path().to_string_lossy().to_string()
    }
}
