use anyhow::{bail, Context, Result};
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
    sync::RwLock,
};

pub const API_URL_ENV: &str = "MAGNET_WATCH_API_URL";
pub const API_TOKEN_ENV: &str = "MAGNET_WATCH_API_TOKEN";
pub const DEBUG_ENV: &str = "MAGNET_WATCH_DEBUG";

/// Where transfer data comes from.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSettings {
    Rest {
        base_url: String,
        #[serde(default)]
        token: Option<String>,
    },
    Sqlite {
        path: PathBuf,
    },
}

impl Default for SourceSettings {
    fn default() -> Self {
        SourceSettings::Rest {
            base_url: "http://localhost:8000/api".into(),
            token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChimeSettings {
    pub enabled: bool,
    pub volume: f32,
}

impl Default for ChimeSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            volume: 0.6,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct MonitorSettings {
    pub poll_interval_secs: u64,
    pub fetch_timeout_secs: u64,
    pub source: SourceSettings,
    pub chime: ChimeSettings,
    pub desktop_notifications: bool,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            poll_interval_secs: 5,
            fetch_timeout_secs: 10,
            source: SourceSettings::default(),
            chime: ChimeSettings::default(),
            desktop_notifications: false,
        }
    }
}

impl MonitorSettings {
    pub fn validate(&self) -> Result<()> {
        if self.poll_interval_secs == 0 {
            bail!("poll_interval_secs must be greater than zero");
        }
        if self.fetch_timeout_secs == 0 {
            bail!("fetch_timeout_secs must be greater than zero");
        }
        if let SourceSettings::Rest { base_url, .. } = &self.source {
            if base_url.trim().is_empty() {
                bail!("source.base_url must not be empty");
            }
        }
        Ok(())
    }

    /// `MAGNET_WATCH_API_URL` switches the source to REST at that URL;
    /// `MAGNET_WATCH_API_TOKEN` sets the REST bearer token.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(env::var(API_URL_ENV).ok(), env::var(API_TOKEN_ENV).ok());
    }

    fn apply_overrides(&mut self, api_url: Option<String>, api_token: Option<String>) {
        if let Some(url) = api_url.filter(|url| !url.trim().is_empty()) {
            let token = match &self.source {
                SourceSettings::Rest { token, .. } => token.clone(),
                SourceSettings::Sqlite { .. } => None,
            };
            self.source = SourceSettings::Rest {
                base_url: url,
                token,
            };
        }

        if let Some(new_token) = api_token.filter(|token| !token.is_empty()) {
            if let SourceSettings::Rest { token, .. } = &mut self.source {
                *token = Some(new_token);
            }
        }
    }
}

pub fn debug_mode() -> bool {
    env::var(DEBUG_ENV)
        .map(|value| value == "1" || value.eq_ignore_ascii_case("true"))
        .unwrap_or(false)
}

pub struct SettingsStore {
    path: PathBuf,
    data: RwLock<MonitorSettings>,
}

impl SettingsStore {
    pub fn new(path: PathBuf) -> Result<Self> {
        let data = if path.exists() {
            let contents = fs::read_to_string(&path)
                .with_context(|| format!("Failed to read settings from {}", path.display()))?;
            serde_json::from_str(&contents).unwrap_or_else(|err| {
                warn!(
                    "Ignoring unreadable settings in {}: {err}; using defaults",
                    path.display()
                );
                MonitorSettings::default()
            })
        } else {
            MonitorSettings::default()
        };

        Ok(Self {
            path,
            data: RwLock::new(data),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn settings(&self) -> MonitorSettings {
        match self.data.read() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update(&self, settings: MonitorSettings) -> Result<()> {
        settings.validate()?;
        let mut guard = match self.data.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        self.persist(&settings)?;
        *guard = settings;
        Ok(())
    }

    fn persist(&self, data: &MonitorSettings) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create settings directory {}", parent.display())
            })?;
        }
        let serialized = serde_json::to_string_pretty(data)?;
        fs::write(&self.path, serialized)
            .with_context(|| format!("Failed to write settings to {}", self.path.display()))
    }
}
