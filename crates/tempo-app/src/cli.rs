//! CLI argument definitions for the Tempo binary.
//!
//! Priority resolution: CLI args > env vars > config file > defaults.

use clap::Parser;
use std::path::PathBuf;

/// Tempo: a conversational meeting scheduler for the terminal.
#[derive(Parser, Debug)]
#[command(name = "tempo", version, about)]
pub struct CliArgs {
    /// Path to the configuration file.
    #[arg(short = 'c', long = "config")]
    pub config: Option<PathBuf>,

    /// User id the conversation runs as.
    #[arg(short = 'u', long = "user")]
    pub user: Option<String>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(short = 'l', long = "log-level")]
    pub log_level: Option<String>,

    /// Keep meetings in memory instead of the SQLite database.
    #[arg(long = "memory")]
    pub memory: bool,
}

impl CliArgs {
    /// Resolve the configuration file path.
    ///
    /// Priority: --config flag > TEMPO_CONFIG env var > ~/.tempo/config.toml.
    pub fn resolve_config_path(&self) -> PathBuf {
        if let Some(ref p) = self.config {
            return p.clone();
        }
        if let Ok(p) = std::env::var("TEMPO_CONFIG") {
            return PathBuf::from(p);
        }
        default_config_path()
    }

    /// Priority: --user flag > TEMPO_USER env var > USER env var > "me".
    pub fn resolve_user(&self) -> String {
        if let Some(ref u) = self.user {
            return u.clone();
        }
        std::env::var("TEMPO_USER")
            .or_else(|_| std::env::var("USER"))
            .unwrap_or_else(|_| "me".to_string())
    }

    /// Priority: --log-level flag > config file value.
    pub fn resolve_log_level(&self, config_level: &str) -> String {
        self.log_level
            .clone()
            .unwrap_or_else(|| config_level.to_string())
    }
}

fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    if let Ok(home) = std::env::var("USERPROFILE") {
        return PathBuf::from(home).join(".tempo").join("config.toml");
    }
    #[cfg(not(target_os = "windows"))]
    if let Ok(home) = std::env::var("HOME") {
        return PathBuf::from(home).join(".tempo").join("config.toml");
    }
    PathBuf::from("config.toml")
}

/// Expand a leading `~` to the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/").or_else(|| path.strip_prefix("~\\")) {
        #[cfg(target_os = "windows")]
        let home = std::env::var("USERPROFILE").unwrap_or_else(|_| ".".to_string());
        #[cfg(not(target_os = "windows"))]
        let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
        PathBuf::from(home).join(rest)
    } else {
        PathBuf::from(path)
    }
}
