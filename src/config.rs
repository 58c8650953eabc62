// Sheet configuration - cursor motion, layout, colours and cache limits

use crate::sheet::cursor::CursorMotion;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("RON error: {0}")]
    Ron(String),
}

/// Pixel dimensions of the sheet view
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayoutConfig {
    pub px_per_beat: f64,
    pub column_width: f32,
    pub ruler_width: f32,
    pub header_height: f32,
    pub trigger_height: f32,
    pub trigger_margin: f32,
    pub field_padding: f32,
}

impl Default for LayoutConfig {
    fn default() -> Self {
        Self {
            px_per_beat: 64.0,
            column_width: 128.0,
            ruler_width: 48.0,
            header_height: 20.0,
            trigger_height: 16.0,
            trigger_margin: 4.0,
            field_padding: 4.0,
        }
    }
}

/// RGB colours
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ColourConfig {
    pub background: [u8; 3],
    pub beat_line: [u8; 3],
    pub ruler_bg: [u8; 3],
    pub ruler_fg: [u8; 3],
    pub header_bg: [u8; 3],
    pub header_fg: [u8; 3],
    pub column_border: [u8; 3],
    pub pattern_end: [u8; 3],
    pub cursor_line: [u8; 3],
    pub cursor_bg: [u8; 3],
    pub head_valid: [u8; 3],
    pub head_invalid: [u8; 3],
    pub head_valid_cursor: [u8; 3],
    pub head_invalid_cursor: [u8; 3],
    pub field_fg: [u8; 3],
    pub insert_caret: [u8; 3],
    pub arrow: [u8; 3],
    pub trigger_bg: [u8; 3],
}

impl Default for ColourConfig {
    fn default() -> Self {
        Self {
            background: [0x11, 0x11, 0x11],
            beat_line: [0x33, 0x33, 0x33],
            ruler_bg: [0x11, 0x22, 0x55],
            ruler_fg: [0xaa, 0xcc, 0xff],
            header_bg: [0x33, 0x77, 0x22],
            header_fg: [0xcc, 0xff, 0xaa],
            column_border: [0x22, 0x22, 0x22],
            pattern_end: [0x77, 0x77, 0x77],
            cursor_line: [0xff, 0x66, 0x22],
            cursor_bg: [0xff, 0x88, 0x44],
            head_valid: [0xdd, 0xee, 0xff],
            head_invalid: [0xff, 0x33, 0x11],
            head_valid_cursor: [0xff, 0xff, 0xff],
            head_invalid_cursor: [0xff, 0x77, 0x55],
            field_fg: [0xbb, 0xcc, 0xdd],
            insert_caret: [0xff, 0x77, 0x22],
            arrow: [0xff, 0x77, 0x22],
            trigger_bg: [0x00, 0x00, 0x00],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub tile_cache_max_bytes: usize,
    pub trigger_cache_max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            tile_cache_max_bytes: 32 * 1024 * 1024,
            trigger_cache_max_entries: 4096,
        }
    }
}

/// Complete configuration of the sheet editor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SheetConfig {
    pub motion: CursorMotion,
    pub layout: LayoutConfig,
    pub colours: ColourConfig,
    pub cache: CacheConfig,
}

impl SheetConfig {
    /// Default location: `<config_dir>/kunquat/sheet.ron`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("kunquat").join("sheet.ron"))
    }

    /// Load from the default location, falling back to defaults
    pub fn load() -> Self {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_or_default(&path),
            _ => Self::default(),
        }
    }

    /// Load from `path`; a missing or malformed file yields the defaults
    pub fn load_or_default(path: &Path) -> Self {
        match Self::load_from(path) {
            Ok(config) => config,
            Err(e) => {
                log::warn!("Using default sheet configuration, {}: {}", path.display(), e);
                Self::default()
            }
        }
    }

    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        ron::from_str(&text).map_err(|e| ConfigError::Ron(e.to_string()))
    }

    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let text = ron::ser::to_string_pretty(self, ron::ser::PrettyConfig::default())
            .map_err(|e| ConfigError::Ron(e.to_string()))?;
        fs::write(path, text)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults() {
        let config = SheetConfig::default();
        assert_eq!(config.motion.accel, 1.18);
        assert_eq!(config.motion.max_speed, 12.0);
        assert_eq!(config.motion.init_trigger_delay, 6);
        assert_eq!(config.layout.px_per_beat, 64.0);
    }

    #[test]
    fn test_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("kunquat").join("sheet.ron");

        let mut config = SheetConfig::default();
        config.layout.column_width = 200.0;
        config.colours.cursor_line = [1, 2, 3];
        config.save_to(&path).unwrap();

        assert_eq!(SheetConfig::load_from(&path).unwrap(), config);
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sheet.ron");
        fs::write(&path, "(layout: (column_width: 96.0))").unwrap();

        let config = SheetConfig::load_from(&path).unwrap();
        assert_eq!(config.layout.column_width, 96.0);
        assert_eq!(config.layout.ruler_width, 48.0);
        assert_eq!(config.motion, CursorMotion::default());
    }

    #[test]
    fn test_malformed_file_falls_back() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("sheet.ron");
        fs::write(&path, "not ron at all {").unwrap();

        assert!(SheetConfig::load_from(&path).is_err());
        assert_eq!(SheetConfig::load_or_default(&path), SheetConfig::default());
    }
}
