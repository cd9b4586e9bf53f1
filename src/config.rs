//! Global effect settings: game mode and detail toggles.
//!
//! These are read once at startup (or when the player changes detail
//! options) and handed to the registries.
//!
//! ```toml
//! game_mode = "standalone_server"
//! weapon_extras = false
//! min_trail_pixels = 1.5
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Role of this process in a game session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameMode {
    /// Normal client that renders.
    #[default]
    Normal,
    /// Headless host. No effect geometry is ever created or drawn.
    StandaloneServer,
}

/// Settings shared by the trail and source registries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FxSettings {
    /// Process role.
    pub game_mode: GameMode,
    /// Detail toggle for weapon trails and similar extras.
    pub weapon_extras: bool,
    /// Trails are never drawn thinner than this many pixels.
    pub min_trail_pixels: f32,
}

impl FxSettings {
    /// Default client settings.
    pub fn new() -> Self {
        Self {
            game_mode: GameMode::Normal,
            weapon_extras: true,
            min_trail_pixels: 1.0,
        }
    }

    /// Settings for a headless server.
    pub fn standalone_server() -> Self {
        Self {
            game_mode: GameMode::StandaloneServer,
            ..Self::new()
        }
    }

    /// Set the weapon-extras detail toggle.
    pub fn with_weapon_extras(mut self, enabled: bool) -> Self {
        self.weapon_extras = enabled;
        self
    }

    /// Set the minimum on-screen trail width. Negative values clamp to 0.
    pub fn with_min_trail_pixels(mut self, pixels: f32) -> Self {
        self.min_trail_pixels = pixels.max(0.0);
        self
    }

    /// Whether effect geometry should be built at all.
    #[inline]
    pub fn renders_effects(&self) -> bool {
        self.game_mode != GameMode::StandaloneServer
    }

    /// Whether new trails may be created.
    #[inline]
    pub fn creates_trails(&self) -> bool {
        self.renders_effects() && self.weapon_extras
    }

    /// Parse settings from TOML. Missing keys keep their defaults.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let mut settings: FxSettings = toml::from_str(text)?;
        settings.min_trail_pixels = settings.min_trail_pixels.max(0.0);
        Ok(settings)
    }

    /// Read settings from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_toml_str(&text)
    }
}

impl Default for FxSettings {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_render() {
        let settings = FxSettings::new();
        assert!(settings.renders_effects());
        assert!(settings.creates_trails());
    }

    #[test]
    fn test_server_suppresses_everything() {
        let settings = FxSettings::standalone_server();
        assert!(!settings.renders_effects());
        assert!(!settings.creates_trails());
    }

    #[test]
    fn test_detail_toggle_suppresses_creation_only() {
        let settings = FxSettings::new().with_weapon_extras(false);
        assert!(settings.renders_effects());
        assert!(!settings.creates_trails());
    }

    #[test]
    fn test_from_toml_partial() {
        let settings = FxSettings::from_toml_str("game_mode = \"standalone_server\"").unwrap();
        assert_eq!(settings.game_mode, GameMode::StandaloneServer);
        assert!(settings.weapon_extras);
        assert_eq!(settings.min_trail_pixels, 1.0);
    }

    #[test]
    fn test_from_toml_clamps_pixels() {
        let settings = FxSettings::from_toml_str("min_trail_pixels = -3.0").unwrap();
        assert_eq!(settings.min_trail_pixels, 0.0);
    }

    #[test]
    fn test_from_toml_rejects_garbage() {
        assert!(FxSettings::from_toml_str("game_mode = 12").is_err());
    }
}
