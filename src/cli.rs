use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "sonolens", about = "Render spectrogram, octave, melody and chroma plots for an MP3 clip")]
pub struct Cli {
    /// Input MP3 file
    pub input: Option<PathBuf>,

    /// Output PNG for the analysis figure
    #[arg(short, long, default_value = "analysis.png")]
    pub output: PathBuf,

    /// Figure width in pixels
    #[arg(long, default_value_t = 1200)]
    pub width: u32,

    /// Figure height in pixels
    #[arg(long, default_value_t = 1800)]
    pub height: u32,

    /// Config file (defaults to sonolens.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// TTF/OTF font for figure labels
    #[arg(long)]
    pub font: Option<String>,

    /// Download the label font from this URL
    #[arg(long)]
    pub font_url: Option<String>,

    /// Label font size in pixels
    #[arg(long, default_value_t = 16.0)]
    pub font_size: f32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn input_is_optional() {
        let cli = Cli::try_parse_from(["sonolens"]).unwrap();
        assert!(cli.input.is_none());
        assert_eq!(cli.output, PathBuf::from("analysis.png"));
    }

    #[test]
    fn parses_size_and_font() {
        let cli = Cli::try_parse_from([
            "sonolens", "clip.mp3", "-o", "out.png", "--width", "800", "--font", "a.ttf",
        ])
        .unwrap();
        assert_eq!(cli.input, Some(PathBuf::from("clip.mp3")));
        assert_eq!(cli.width, 800);
        assert_eq!(cli.font.as_deref(), Some("a.ttf"));
    }
}
