use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Optional settings file. Only rendering is configurable; analysis constants
/// are fixed.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub text: TextConfig,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
}

#[derive(Debug, Deserialize)]
pub struct TextConfig {
    #[serde(default)]
    pub font: Option<String>,
    #[serde(default)]
    pub font_url: Option<String>,
    #[serde(default = "default_font_size")]
    pub font_size: f32,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
        }
    }
}

impl Default for TextConfig {
    fn default() -> Self {
        Self {
            font: None,
            font_url: None,
            font_size: default_font_size(),
        }
    }
}

pub fn default_width() -> u32 { 1200 }
pub fn default_height() -> u32 { 1800 }
pub fn default_font_size() -> f32 { 16.0 }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// Explicit path, then `./sonolens.toml`, then the user config directories.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("sonolens.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("sonolens").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("sonolens").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn partial_file_keeps_defaults() {
        let cfg: Config = toml::from_str("[output]\nwidth = 800\n").unwrap();
        assert_eq!(cfg.output.width, 800);
        assert_eq!(cfg.output.height, default_height());
        assert_eq!(cfg.text.font_size, default_font_size());
        assert!(cfg.text.font.is_none());
    }

    #[test]
    fn loads_from_disk() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[text]\nfont = \"/tmp/font.ttf\"\nfont_size = 12.0").unwrap();
        let cfg = load_config(file.path()).unwrap();
        assert_eq!(cfg.text.font.as_deref(), Some("/tmp/font.ttf"));
        assert_eq!(cfg.text.font_size, 12.0);
    }

    #[test]
    fn invalid_file_is_ignored() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[output]\nwidth = \"wide\"").unwrap();
        assert!(load_config(file.path()).is_none());
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/somewhere/custom.toml");
        assert_eq!(find_config(Some(path)), Some(path.to_path_buf()));
    }
}
