use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Result, TempoError};

/// Upper bound for either end of the auto-reschedule window.
pub const MAX_RESCHEDULE_WINDOW_DAYS: i64 = 365;

/// Top-level configuration for Tempo.
///
/// Loaded from `~/.tempo/config.toml` by default. Every section is optional
/// in the file and falls back to its defaults.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TempoConfig {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub schedule: ScheduleConfig,
    #[serde(default)]
    pub chat: ChatConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub storage: StorageConfig,
}

impl TempoConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: TempoConfig = toml::from_str(&content)?;
        config.validate()?;
        info!("Configuration loaded from {}", path.display());
        Ok(config)
    }

    /// Load configuration, falling back to defaults if the file is missing
    /// or invalid.
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}. Using defaults.",
                    path.display(),
                    e
                );
                Self::default()
            }
        }
    }

    /// Save the current configuration to a TOML file.
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content =
            toml::to_string_pretty(self).map_err(|e| TempoError::Config(e.to_string()))?;
        std::fs::write(path, content)?;
        info!("Configuration saved to {}", path.display());
        Ok(())
    }

    /// Reject values the schedule engine cannot work with.
    pub fn validate(&self) -> Result<()> {
        let s = &self.schedule;
        if s.business_start_hour >= s.business_end_hour || s.business_end_hour > 24 {
            return Err(TempoError::Config(format!(
                "business hours {}..{} are not a valid window",
                s.business_start_hour, s.business_end_hour
            )));
        }
        if s.slot_step_minutes == 0 {
            return Err(TempoError::Config("slot_step_minutes must be positive".into()));
        }
        let window = 0..=MAX_RESCHEDULE_WINDOW_DAYS;
        if !window.contains(&s.reschedule_window_start_days)
            || !window.contains(&s.reschedule_window_end_days)
        {
            return Err(TempoError::Config(format!(
                "reschedule window days must lie within 0..={}",
                MAX_RESCHEDULE_WINDOW_DAYS
            )));
        }
        if s.reschedule_window_start_days >= s.reschedule_window_end_days {
            return Err(TempoError::Config(
                "reschedule window start must be before its end".into(),
            ));
        }
        if self.chat.session_ttl_minutes == 0 {
            return Err(TempoError::Config("session_ttl_minutes must be positive".into()));
        }
        if self.chat.rephrase_min_chars > self.chat.rephrase_max_chars {
            return Err(TempoError::Config(
                "rephrase_min_chars exceeds rephrase_max_chars".into(),
            ));
        }
        Ok(())
    }
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Data directory for the SQLite store.
    pub data_dir: String,
    /// Log level: trace, debug, info, warn, error.
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_dir: "~/.tempo/data".to_string(),
            log_level: "info".to_string(),
        }
    }
}

/// Slot search and rescheduling parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ScheduleConfig {
    /// Minutes east of UTC used to interpret "today", "2pm" and business hours.
    pub utc_offset_minutes: i32,
    /// First candidate start hour (local).
    pub business_start_hour: u32,
    /// Candidates start strictly before this hour (local).
    pub business_end_hour: u32,
    /// Spacing between candidate start times.
    pub slot_step_minutes: u32,
    /// Maximum number of suggestions returned.
    pub suggestion_limit: usize,
    /// Auto-reschedule searches from new start + this many days...
    pub reschedule_window_start_days: i64,
    /// ...up to new start + this many days.
    pub reschedule_window_end_days: i64,
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            utc_offset_minutes: 0,
            business_start_hour: 9,
            business_end_hour: 17,
            slot_step_minutes: 60,
            suggestion_limit: 10,
            reschedule_window_start_days: 1,
            reschedule_window_end_days: 7,
        }
    }
}

/// Dialogue behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ChatConfig {
    /// Idle minutes after which a user's conversation is forgotten.
    pub session_ttl_minutes: u64,
    /// Turns kept per conversation.
    pub history_limit: usize,
    /// Turns included in model prompts.
    pub context_turns: usize,
    /// Ask before creating a fully specified meeting.
    pub confirm_before_create: bool,
    /// Move conflicting meetings after a create.
    pub auto_reschedule_conflicts: bool,
    /// Let the completion service rephrase eligible replies.
    pub rephrase_replies: bool,
    pub rephrase_min_chars: usize,
    pub rephrase_max_chars: usize,
    /// Maximum accepted message length in characters.
    pub max_message_length: usize,
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            session_ttl_minutes: 60,
            history_limit: 50,
            context_turns: 3,
            confirm_before_create: true,
            auto_reschedule_conflicts: false,
            rephrase_replies: true,
            rephrase_min_chars: 10,
            rephrase_max_chars: 500,
            max_message_length: 2000,
        }
    }
}

/// Text completion service (OpenAI-compatible).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompletionConfig {
    /// When false, every completion call fails fast and rule-based fallbacks answer.
    pub enabled: bool,
    pub endpoint: String,
    pub model: String,
    pub temperature: f32,
    pub timeout_secs: u64,
    /// Environment variable holding the API key.
    pub api_key_env: String,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: "https://api.openai.com/v1/chat/completions".to_string(),
            model: "gpt-4o-mini".to_string(),
            temperature: 0.3,
            timeout_secs: 30,
            api_key_env: "OPENAI_API_KEY".to_string(),
        }
    }
}

/// Meeting store backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Database file name, relative to `general.data_dir` unless absolute.
    pub sqlite_path: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Sqlite,
            sqlite_path: "tempo.db".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_default_config() {
        let config = TempoConfig::default();
        assert_eq!(config.general.log_level, "info");
        assert_eq!(config.schedule.business_start_hour, 9);
        assert_eq!(config.schedule.business_end_hour, 17);
        assert_eq!(config.schedule.suggestion_limit, 10);
        assert_eq!(config.chat.rephrase_min_chars, 10);
        assert_eq!(config.chat.rephrase_max_chars, 500);
        assert!(config.chat.confirm_before_create);
        assert!(!config.completion.enabled);
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_partial_config_uses_defaults() {
        let content = r#"
[schedule]
utc_offset_minutes = -300

[storage]
backend = "memory"
"#;
        let file = create_temp_config(content);
        let config = TempoConfig::load(file.path()).unwrap();
        assert_eq!(config.schedule.utc_offset_minutes, -300);
        assert_eq!(config.schedule.business_end_hour, 17);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.chat.history_limit, 50);
    }

    #[test]
    fn test_load_rejects_inverted_business_hours() {
        let content = r#"
[schedule]
business_start_hour = 18
business_end_hour = 9
"#;
        let file = create_temp_config(content);
        let err = TempoConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, TempoError::Config(_)));
    }

    #[test]
    fn test_validate_reschedule_window() {
        let mut config = TempoConfig::default();
        config.schedule.reschedule_window_end_days = MAX_RESCHEDULE_WINDOW_DAYS + 1;
        assert!(config.validate().is_err());

        config.schedule.reschedule_window_end_days = i64::MAX;
        assert!(config.validate().is_err());

        config.schedule.reschedule_window_start_days = 3;
        config.schedule.reschedule_window_end_days = 3;
        assert!(config.validate().is_err());

        config.schedule.reschedule_window_start_days = -1;
        config.schedule.reschedule_window_end_days = 7;
        assert!(config.validate().is_err());

        config.schedule.reschedule_window_start_days = 0;
        config.schedule.reschedule_window_end_days = MAX_RESCHEDULE_WINDOW_DAYS;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_load_rejects_zero_session_ttl() {
        let content = r#"
[chat]
session_ttl_minutes = 0
"#;
        let file = create_temp_config(content);
        let err = TempoConfig::load(file.path()).unwrap_err();
        assert!(matches!(err, TempoError::Config(_)));
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let config = TempoConfig::load_or_default(Path::new("/nonexistent/tempo.toml"));
        assert_eq!(config.general.data_dir, "~/.tempo/data");
    }

    #[test]
    fn test_load_invalid_toml() {
        let file = create_temp_config("this is {{ not valid TOML");
        assert!(TempoConfig::load(file.path()).is_err());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.toml");

        let mut config = TempoConfig::default();
        config.chat.auto_reschedule_conflicts = true;
        config.completion.model = "local-model".into();
        config.save(&path).unwrap();

        let reloaded = TempoConfig::load(&path).unwrap();
        assert!(reloaded.chat.auto_reschedule_conflicts);
        assert_eq!(reloaded.completion.model, "local-model");
    }

    #[test]
    fn test_empty_toml_uses_all_defaults() {
        let file = create_temp_config("");
        let config = TempoConfig::load(file.path()).unwrap();
        assert_eq!(config.schedule.slot_step_minutes, 60);
        assert_eq!(config.chat.session_ttl_minutes, 60);
    }
}
