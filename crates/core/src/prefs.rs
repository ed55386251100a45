//! Theme and AI model preferences.
//!
//! Both live outside the durable snapshot as independent scalar entries so a
//! corrupt snapshot never resets them.

use std::fmt;
use std::str::FromStr;

use serde_json::json;
use tracing::warn;

use crate::config::StorageConfig;
use crate::error::PersistenceError;
use crate::store::{Store, StorageBackend, keys};

/// Colour scheme of the console.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Theme {
    #[default]
    Cyberpunk,
    Dark,
    Green,
}

impl Theme {
    pub const ALL: [Self; 3] = [Self::Cyberpunk, Self::Dark, Self::Green];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Cyberpunk => "cyberpunk",
            Self::Dark => "dark",
            Self::Green => "green",
        }
    }

    /// Class added to `<body>`; the default theme needs none.
    pub const fn body_class(self) -> Option<&'static str> {
        match self {
            Self::Cyberpunk => None,
            Self::Dark => Some("theme-dark"),
            Self::Green => Some("theme-green"),
        }
    }

    /// Read the stored theme, defaulting on absence, read failure or an
    /// unrecognised value.
    pub fn load(storage: &dyn StorageBackend, key: &str) -> Self {
        read_scalar(storage, key)
    }
}

impl FromStr for Theme {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| format!("unknown theme '{s}'"))
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Assistant model the backend is asked to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AiModel {
    #[default]
    Llama70b,
    Llama8b,
}

impl AiModel {
    pub const ALL: [Self; 2] = [Self::Llama70b, Self::Llama8b];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Llama70b => "llama-3.3-70b",
            Self::Llama8b => "llama3.1-8b",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Llama70b => "Llama 70B",
            Self::Llama8b => "Llama 8B",
        }
    }
}

impl FromStr for AiModel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| format!("unknown model '{s}'"))
    }
}

impl fmt::Display for AiModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reads and writes the scalar preference entries.
#[derive(Debug, Clone)]
pub struct Preferences {
    store: Store,
    config: StorageConfig,
}

impl Preferences {
    pub fn new(store: Store, config: StorageConfig) -> Self {
        Self { store, config }
    }

    pub fn theme(&self) -> Theme {
        Theme::load(self.store.storage().as_ref(), &self.config.theme_key)
    }

    /// Persist the theme and publish it on the volatile `theme` key.
    ///
    /// # Errors
    /// Returns the storage error; the `theme` key is updated regardless.
    pub fn set_theme(&self, theme: Theme) -> Result<(), PersistenceError> {
        self.store.set(keys::THEME, json!(theme.as_str()), false);
        self.store
            .storage()
            .write(&self.config.theme_key, theme.as_str())
    }

    pub fn model(&self) -> AiModel {
        read_scalar(self.store.storage().as_ref(), &self.config.model_key)
    }

    /// # Errors
    /// Returns the storage error.
    pub fn set_model(&self, model: AiModel) -> Result<(), PersistenceError> {
        self.store
            .storage()
            .write(&self.config.model_key, model.as_str())
    }
}

fn read_scalar<T: FromStr<Err = String> + Default>(storage: &dyn StorageBackend, key: &str) -> T {
    match storage.read(key) {
        Ok(Some(raw)) => raw.parse().unwrap_or_else(|e: String| {
            warn!(key, error = %e, "Ignoring stored preference");
            T::default()
        }),
        Ok(None) => T::default(),
        Err(e) => {
            warn!(key, error = %e, "Failed to read preference");
            T::default()
        }
    }
}
