use anyhow::{anyhow, Context, Result};
use plotters::style::{register_font, FontStyle};
use std::path::Path;

/// Family name the chart renderer looks labels up under.
pub const FONT_FAMILY: &str = "sans-serif";

/// Fonts tried when neither a path nor font bytes are supplied.
pub const SYSTEM_FONTS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
    "/usr/share/fonts/liberation/LiberationSans-Regular.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// Handle to the font registered for figure labels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LabelFont {
    size: f32,
}

impl LabelFont {
    /// Register a font from raw bytes, an explicit path, or the first system
    /// font found, in that order.
    pub fn load(font_size: f32, font_path: Option<&str>, font_bytes: Option<&[u8]>) -> Result<Self> {
        let data = match (font_bytes, font_path) {
            (Some(bytes), _) => bytes.to_vec(),
            (None, Some(path)) => std::fs::read(path)
                .with_context(|| format!("Failed to read font file: {}", path))?,
            (None, None) => SYSTEM_FONTS
                .iter()
                .map(Path::new)
                .find(|p| p.exists())
                .context("No system font found")
                .and_then(|p| {
                    log::debug!("Using system font {}", p.display());
                    std::fs::read(p).with_context(|| format!("Failed to read {}", p.display()))
                })?,
        };

        // Registered fonts live for the rest of the process
        let data: &'static [u8] = Box::leak(data.into_boxed_slice());
        register_font(FONT_FAMILY, FontStyle::Normal, data)
            .map_err(|_| anyhow!("Failed to parse font"))?;

        Ok(Self {
            size: font_size.max(1.0),
        })
    }

    /// Requested label size in pixels.
    pub fn size(&self) -> f32 {
        self.size
    }
}

/// Download a TTF/OTF font.
pub fn load_font_from_url(url: &str) -> Result<Vec<u8>> {
    log::info!("Fetching font from {}", url);
    let response = reqwest::blocking::get(url)
        .with_context(|| format!("Failed to fetch font: {}", url))?
        .error_for_status()
        .with_context(|| format!("Font request failed: {}", url))?;
    let bytes = response.bytes().context("Failed to read font response")?;
    Ok(bytes.to_vec())
}
