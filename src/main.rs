mod audio;
mod cli;
mod config;
mod pipeline;
mod render;

use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use std::path::Path;
use std::time::Duration;

use cli::Cli;
use render::plot::{render_figure, save_png};
use render::text::{load_font_from_url, LabelFont};

const ACCEPTED_EXTENSION: &str = "mp3";

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    let mut cli = Cli::parse();

    if let Some(path) = config::find_config(cli.config.as_deref()) {
        if let Some(cfg) = config::load_config(&path) {
            log::info!("Loaded config from {}", path.display());
            // Merge: config values apply only when CLI is at its default
            if cli.width == config::default_width() { cli.width = cfg.output.width; }
            if cli.height == config::default_height() { cli.height = cfg.output.height; }
            if cli.font_size == config::default_font_size() { cli.font_size = cfg.text.font_size; }
            if cli.font.is_none() {
                cli.font = cfg.text.font;
            }
            if cli.font_url.is_none() {
                cli.font_url = cfg.text.font_url;
            }
        } else {
            log::warn!("Failed to load config from {}", path.display());
        }
    }

    // Nothing selected yet: stay idle
    let Some(input) = cli.input.as_ref() else {
        log::info!("No input file given; pass an MP3 to generate plots");
        return Ok(());
    };
    check_extension(input)?;

    log::info!("sonolens - audio analysis plots");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", cli.output.display());

    let bytes = std::fs::read(input)
        .with_context(|| format!("Failed to open audio file: {}", input.display()))?;

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner} [{elapsed_precise}] {msg}")
            .context("Invalid progress template")?,
    );
    spinner.set_message("Generating plots...");
    spinner.enable_steady_tick(Duration::from_millis(120));

    let figure = pipeline::generate_plots(bytes);
    spinner.finish_and_clear();
    let figure = figure.with_context(|| format!("Failed to analyse {}", input.display()))?;

    let font_bytes = if let Some(ref font_url) = cli.font_url {
        match load_font_from_url(font_url) {
            Ok(bytes) => Some(bytes),
            Err(err) => {
                log::warn!("Failed to load font from URL: {:#}", err);
                None
            }
        }
    } else {
        None
    };

    let font = match LabelFont::load(cli.font_size, cli.font.as_deref(), font_bytes.as_deref()) {
        Ok(font) => Some(font),
        Err(err) => {
            log::warn!("Rendering figure without labels: {:#}", err);
            None
        }
    };

    log::info!("Rendering {}x{} figure...", cli.width, cli.height);
    let image = render_figure(&figure, cli.width, cli.height, font.as_ref())?;
    save_png(&image, &cli.output)?;

    log::info!("Done! Output: {}", cli.output.display());
    Ok(())
}

/// Only MP3 uploads are accepted.
fn check_extension(path: &Path) -> Result<()> {
    let ok = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(ACCEPTED_EXTENSION));
    if !ok {
        anyhow::bail!(
            "Unsupported file type: {} (expected .{})",
            path.display(),
            ACCEPTED_EXTENSION
        );
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_mp3_is_accepted() {
        assert!(check_extension(Path::new("song.mp3")).is_ok());
        assert!(check_extension(Path::new("SONG.MP3")).is_ok());
        assert!(check_extension(Path::new("song.wav")).is_err());
        assert!(check_extension(Path::new("song")).is_err());
    }
}
