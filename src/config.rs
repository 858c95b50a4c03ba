// src/config.rs
use serde::{Deserialize, Serialize};
use std::{env, fs, path::Path, path::PathBuf, time::Duration};

use crate::engine::EngineKind;

fn default_data_dir() -> PathBuf {
    PathBuf::from("data")
}
fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8000
}
fn default_engine() -> EngineKind {
    EngineKind::Mock
}
fn default_voice() -> String {
    "en-US-Standard".into()
}
fn default_language() -> String {
    "en".into()
}
fn default_speed() -> f64 {
    1.0
}
fn default_engine_timeout_secs() -> u64 {
    60
}
fn default_user_agent() -> String {
    "reddit-narrator/0.1".into()
}
fn default_post_limit() -> usize {
    10
}
fn default_batch_size() -> usize {
    10
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Root for the queue snapshot and audio artifacts.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_engine")]
    pub engine: EngineKind,
    /// Required when `engine = "http"`; ignored otherwise.
    #[serde(default)]
    pub tts_endpoint: Option<String>,
    #[serde(default = "default_voice")]
    pub default_voice: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_speed")]
    pub speed: f64,
    #[serde(default = "default_engine_timeout_secs")]
    pub engine_timeout_secs: u64,
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
    #[serde(default = "default_post_limit")]
    pub default_post_limit: usize,
    /// Max queue items drained per processing pass.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
}

impl Default for Settings {
    fn default() -> Self {
        // serde defaults and Default must agree; both go through the fns.
        toml::from_str("").expect("empty settings deserialize")
    }
}

impl Settings {
    /// Load from a TOML file if present, then apply env overrides. A missing
    /// file is not an error; the service runs on defaults.
    pub fn load<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let mut settings = if path.as_ref().exists() {
            let raw = fs::read_to_string(&path)?;
            toml::from_str(&raw)?
        } else {
            tracing::info!(
                path = %path.as_ref().display(),
                "no config file, using defaults"
            );
            Settings::default()
        };
        settings.apply_env();
        settings.validate()?;
        Ok(settings)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = env::var("NARRATOR_DATA_DIR") {
            self.data_dir = PathBuf::from(v);
        }
        if let Ok(v) = env::var("API_HOST") {
            self.host = v;
        }
        if let Ok(v) = env::var("API_PORT") {
            match v.parse() {
                Ok(port) => self.port = port,
                Err(_) => tracing::warn!(value = %v, "ignoring unparsable API_PORT"),
            }
        }
        if let Ok(v) = env::var("TTS_ENDPOINT") {
            self.engine = EngineKind::Http;
            self.tts_endpoint = Some(v);
        }
        if let Ok(v) = env::var("REDDIT_USER_AGENT") {
            self.user_agent = v;
        }
    }

    fn validate(&self) -> anyhow::Result<()> {
        if self.engine == EngineKind::Http && self.tts_endpoint.is_none() {
            anyhow::bail!("engine is \"http\" but tts_endpoint is not set");
        }
        if self.speed <= 0.0 {
            anyhow::bail!("speed must be positive, got {}", self.speed);
        }
        Ok(())
    }

    pub fn audio_dir(&self) -> PathBuf {
        self.data_dir.join("audio")
    }

    pub fn queue_path(&self) -> PathBuf {
        self.data_dir.join("audio_queue.json")
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn engine_timeout(&self) -> Duration {
        Duration::from_secs(self.engine_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_self_consistent() {
        let s = Settings::default();
        assert_eq!(s.port, 8000);
        assert_eq!(s.engine, EngineKind::Mock);
        assert_eq!(s.queue_path(), PathBuf::from("data/audio_queue.json"));
        assert!(s.validate().is_ok());
    }

    #[test]
    fn partial_toml_fills_in_defaults() {
        let s: Settings = toml::from_str("port = 9000\nspeed = 1.25\n").unwrap();
        assert_eq!(s.port, 9000);
        assert!((s.speed - 1.25).abs() < 1e-9);
        assert_eq!(s.default_voice, "en-US-Standard");
    }

    #[test]
    fn http_engine_without_endpoint_is_rejected() {
        let s: Settings = toml::from_str("engine = \"http\"\n").unwrap();
        assert!(s.validate().is_err());
    }
}
