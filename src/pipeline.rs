use anyhow::Result;

use crate::audio::analysis;
use crate::audio::decode::{decode_bytes, AudioData};
use crate::render::figure::AnalysisFigure;

/// Extract features from a decoded clip and lay them out as a figure.
pub fn perform_audio_analysis(audio: &AudioData) -> AnalysisFigure {
    let features = analysis::extract(audio);
    let figure = AnalysisFigure::from_features(&features);
    log::debug!("Panels: {}", figure.titles().join(", "));
    log::info!(
        "Octave bands ({} of {} frames in range): {}",
        figure.octave_bands.total(),
        features.centroid.len(),
        figure
            .octave_bands
            .labels
            .iter()
            .zip(&figure.octave_bands.counts)
            .map(|(label, count)| format!("{}={}", label, count))
            .collect::<Vec<_>>()
            .join(" ")
    );
    figure
}

/// One "generate" request: decode the uploaded bytes, then analyse them.
///
/// Nothing is retained between calls; a decode failure returns before any
/// analysis runs.
pub fn generate_plots(bytes: Vec<u8>) -> Result<AnalysisFigure> {
    let audio = decode_bytes(bytes)?;
    Ok(perform_audio_analysis(&audio))
}
