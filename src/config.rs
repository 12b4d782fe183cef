use crate::player::PlaybackConfig;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    #[serde(default = "default_input")]
    pub input_folder: String,

    #[serde(default = "default_language")]
    pub language: String,

    #[serde(default)]
    pub playback: PlaybackSettings,
}

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct PlaybackSettings {
    /// Assumed speaking rate for watchdog sizing, in characters per second.
    #[serde(default = "default_chars_per_second")]
    pub chars_per_second: f32,

    #[serde(default = "default_watchdog_floor")]
    pub watchdog_floor_secs: u64,

    #[serde(default = "default_watchdog_buffer")]
    pub watchdog_buffer_secs: u64,

    /// How long to wait for the engine voice list before falling back to
    /// the engine's default voice selection.
    #[serde(default = "default_voice_load_timeout")]
    pub voice_load_timeout_secs: u64,
}

fn default_input() -> String {
    "stories".to_string()
}
fn default_language() -> String {
    "en".to_string()
}
fn default_chars_per_second() -> f32 {
    15.0
}
fn default_watchdog_floor() -> u64 {
    1
}
fn default_watchdog_buffer() -> u64 {
    5
}
fn default_voice_load_timeout() -> u64 {
    2
}

impl Default for PlaybackSettings {
    fn default() -> Self {
        Self {
            chars_per_second: default_chars_per_second(),
            watchdog_floor_secs: default_watchdog_floor(),
            watchdog_buffer_secs: default_watchdog_buffer(),
            voice_load_timeout_secs: default_voice_load_timeout(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input_folder: default_input(),
            language: default_language(),
            playback: PlaybackSettings::default(),
        }
    }
}

impl PlaybackSettings {
    pub fn playback_config(&self) -> PlaybackConfig {
        PlaybackConfig {
            chars_per_second: self.chars_per_second,
            watchdog_floor: Duration::from_secs(self.watchdog_floor_secs),
            watchdog_buffer: Duration::from_secs(self.watchdog_buffer_secs),
        }
    }

    pub fn voice_load_timeout(&self) -> Duration {
        Duration::from_secs(self.voice_load_timeout_secs)
    }
}

impl Config {
    /// Loads `config.yml` from the working directory; a missing file just
    /// means defaults, since narration needs no credentials.
    pub fn load() -> Result<Self> {
        Self::load_from(Path::new("config.yml"))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read {}", path.display()))?;
        serde_yaml_ng::from_str(&content)
            .with_context(|| format!("Failed to parse {}", path.display()))
    }

    pub fn save(&self) -> Result<()> {
        let content = serde_yaml_ng::to_string(self)?;
        fs::write("config.yml", content).context("Failed to write config.yml")?;
        Ok(())
    }

    pub fn ensure_directories(&self) -> Result<()> {
        fs::create_dir_all(&self.input_folder)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn missing_file_yields_defaults() {
        let config = Config::load_from(Path::new("does_not_exist.yml")).unwrap();
        assert_eq!(config.input_folder, "stories");
        assert_eq!(config.language, "en");
        assert_eq!(config.playback.chars_per_second, 15.0);
    }

    #[test]
    fn partial_yaml_fills_in_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "language: de\nplayback:\n  watchdog_buffer_secs: 8\n").unwrap();
        let config = Config::load_from(file.path()).unwrap();
        assert_eq!(config.language, "de");
        assert_eq!(config.playback.watchdog_buffer_secs, 8);
        assert_eq!(config.playback.watchdog_floor_secs, 1);
        assert_eq!(config.input_folder, "stories");
    }
}
