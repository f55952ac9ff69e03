use std::path::{Path, PathBuf};
use anyhow::{Context, Result};
use crate::board::BoardConfig;
use crate::models::SegmentKey;

/// Settings read from `~/.leadboard/rc`
///
/// The file holds `key=value` lines; `#` starts a comment line.
///
/// ```text
/// data.location=./leads.db
/// board.page_size=20
/// board.scroll_bias_px=80
/// board.search_quiet_ms=300
/// board.gated=won,lost
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Config {
    pub data_location: Option<PathBuf>,
    pub board: BoardConfig,
}

impl Config {
    /// Home directory, honouring `HOME` first so tests can redirect it
    pub fn home_dir() -> PathBuf {
        std::env::var_os("HOME")
            .map(PathBuf::from)
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn config_dir() -> PathBuf {
        Self::home_dir().join(".leadboard")
    }

    /// Get the configuration file path
    pub fn config_path() -> PathBuf {
        Self::config_dir().join("rc")
    }

    /// Load the configuration file, or defaults if there is none
    pub fn load() -> Result<Config> {
        let path = Self::config_path();
        if !path.exists() {
            return Ok(Config::default());
        }
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let base_dir = path.parent().unwrap_or_else(|| Path::new("."));
        Self::parse(&content, base_dir)
            .with_context(|| format!("Invalid config file: {}", path.display()))
    }

    /// Parse rc content; relative paths resolve against `base_dir`
    pub fn parse(content: &str, base_dir: &Path) -> Result<Config> {
        let mut config = Config::default();

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let key = key.trim();
            let value = value.trim();

            match key {
                "data.location" => {
                    let path = PathBuf::from(value);
                    config.data_location = Some(if path.is_relative() { base_dir.join(path) } else { path });
                }
                "board.page_size" => {
                    let size: u32 = value
                        .parse()
                        .with_context(|| format!("board.page_size must be a positive integer, got '{}'", value))?;
                    if size == 0 {
                        anyhow::bail!("board.page_size must be a positive integer, got '{}'", value);
                    }
                    config.board.page_size = size;
                }
                "board.scroll_bias_px" => {
                    config.board.scroll_bias_px = value
                        .parse()
                        .with_context(|| format!("board.scroll_bias_px must be a number, got '{}'", value))?;
                }
                "board.search_quiet_ms" => {
                    config.board.search_quiet_ms = value
                        .parse()
                        .with_context(|| format!("board.search_quiet_ms must be an integer, got '{}'", value))?;
                }
                "board.gated" => {
                    config.board.gated = parse_segment_list(value)?;
                }
                _ => log::debug!("ignoring unknown config key '{}'", key),
            }
        }

        Ok(config)
    }

    /// Database path: configured location or the default under the config dir
    pub fn db_path(&self) -> PathBuf {
        self.data_location
            .clone()
            .unwrap_or_else(|| Self::config_dir().join("leadboard.db"))
    }
}

fn parse_segment_list(value: &str) -> Result<Vec<SegmentKey>> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty() && *s != "none")
        .map(|s| SegmentKey::from_str(s).ok_or_else(|| anyhow::anyhow!("board.gated: unknown segment '{}'", s)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::parse("", Path::new("/tmp")).unwrap();
        assert_eq!(config.board.page_size, 20);
        assert_eq!(config.board.scroll_bias_px, 80.0);
        assert_eq!(config.board.search_quiet_ms, 300);
        assert_eq!(config.board.gated, vec![SegmentKey::Won, SegmentKey::Lost]);
        assert!(config.data_location.is_none());
    }

    #[test]
    fn test_parse_all_keys() {
        let content = "# board settings\n\
                       data.location=./custom.db\n\
                       board.page_size = 5\n\
                       board.scroll_bias_px=40.5\n\
                       board.search_quiet_ms=150\n\
                       board.gated=won\n\
                       theme=dark\n";
        let config = Config::parse(content, Path::new("/home/me/.leadboard")).unwrap();
        assert_eq!(config.data_location, Some(PathBuf::from("/home/me/.leadboard/custom.db")));
        assert_eq!(config.board.page_size, 5);
        assert_eq!(config.board.scroll_bias_px, 40.5);
        assert_eq!(config.board.search_quiet_ms, 150);
        assert_eq!(config.board.gated, vec![SegmentKey::Won]);
    }

    #[test]
    fn test_gated_none_disables_gates() {
        let config = Config::parse("board.gated=none", Path::new("/tmp")).unwrap();
        assert!(config.board.gated.is_empty());
    }

    #[test]
    fn test_invalid_values_name_the_key() {
        let err = Config::parse("board.page_size=0", Path::new("/tmp")).unwrap_err();
        assert!(err.to_string().contains("board.page_size"));

        let err = Config::parse("board.gated=won,archived", Path::new("/tmp")).unwrap_err();
        assert!(err.to_string().contains("archived"));
    }
}
