//! Player settings and server configuration.

use log::{info, warn};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::ConfigError;
use crate::game::oracle::PieceKind;

/// Player preferences. They tune presentation and defaults, never legality.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    pub sound_enabled: bool,
    pub vibration_enabled: bool,
    pub auto_promote_to_queen: bool,
    pub show_valid_moves: bool,
    pub show_coordinates: bool,
    pub dark_mode: bool,
    /// Used when `auto_promote_to_queen` is off.
    pub promotion_piece: PieceKind,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            sound_enabled: true,
            vibration_enabled: true,
            auto_promote_to_queen: true,
            show_valid_moves: true,
            show_coordinates: false,
            dark_mode: false,
            promotion_piece: PieceKind::Queen,
        }
    }
}

impl Settings {
    /// The piece proposed when a pawn reaches its last rank. A pawn or king
    /// in `promotion_piece` can never be played, so those fall back to Queen.
    pub fn default_promotion(&self) -> PieceKind {
        if self.auto_promote_to_queen || !can_promote_to(self.promotion_piece) {
            PieceKind::Queen
        } else {
            self.promotion_piece
        }
    }

    pub fn from_json(text: &str) -> Result<Self, ConfigError> {
        let settings: Settings = serde_json::from_str(text)?;
        if !can_promote_to(settings.promotion_piece) {
            return Err(ConfigError::InvalidValue {
                key: "promotionPiece".to_string(),
                value: format!("{:?}", settings.promotion_piece).to_lowercase(),
            });
        }
        Ok(settings)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&text)
    }

    /// Loads settings, falling back to defaults when the file is absent or
    /// cannot be used.
    pub fn load_or_default(path: Option<&Path>) -> Self {
        let Some(path) = path else {
            return Self::default();
        };
        if !path.exists() {
            info!("No settings at {}, using defaults", path.display());
            return Self::default();
        }
        match Self::load(path) {
            Ok(settings) => {
                info!("Loaded settings from {}", path.display());
                settings
            }
            Err(e) => {
                warn!("Failed to load settings: {}", e);
                Self::default()
            }
        }
    }
}

fn can_promote_to(kind: PieceKind) -> bool {
    matches!(
        kind,
        PieceKind::Queen | PieceKind::Rook | PieceKind::Bishop | PieceKind::Knight
    )
}

pub const DEFAULT_BIND_ADDRESS: &str = "127.0.0.1:8080";
pub const DEFAULT_TICK_SECS: u64 = 1;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub bind_address: String,
    pub tick_interval_secs: u64,
    pub settings_path: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: DEFAULT_BIND_ADDRESS.to_string(),
            tick_interval_secs: DEFAULT_TICK_SECS,
            settings_path: None,
        }
    }
}

impl ServerConfig {
    /// Reads `CHESS_BIND_ADDR`, `CHESS_TICK_SECS` and `CHESS_SETTINGS`.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(address) = lookup("CHESS_BIND_ADDR") {
            config.bind_address = address;
        }

        if let Some(value) = lookup("CHESS_TICK_SECS") {
            config.tick_interval_secs = match value.trim().parse::<u64>() {
                Ok(secs) if secs > 0 => secs,
                _ => {
                    return Err(ConfigError::InvalidValue {
                        key: "CHESS_TICK_SECS".to_string(),
                        value,
                    })
                }
            };
        }

        config.settings_path = lookup("CHESS_SETTINGS").map(PathBuf::from);
        Ok(config)
    }
}
