//! Configuration merge system
//!
//! Implements the 4-layer configuration merge:
//! 1. Built-in defaults
//! 2. User config (~/.config/codefix/config.toml)
//! 3. Project config (.codefix.toml)
//! 4. CLI flags

mod effective;
mod merge;
mod settings;

use std::path::PathBuf;

pub use effective::{ConfigError, ConfigOrigin, ConfigSource, EffectiveConfig};
pub use merge::{deep_merge, merge_layers};
pub use settings::{
    ArtifactSettings, CodefixConfig, PollSettings, ReferenceSettings, ServiceSettings,
    TelemetrySettings, DEFAULT_MAX_ARTIFACT_BYTES,
};

/// Project config file name, looked up in the working directory
pub const PROJECT_CONFIG_FILE: &str = ".codefix.toml";

/// User config path, if a home directory is known
pub fn user_config_path() -> Option<PathBuf> {
    std::env::var_os("HOME").map(|home| {
        PathBuf::from(home)
            .join(".config")
            .join("codefix")
            .join("config.toml")
    })
}
