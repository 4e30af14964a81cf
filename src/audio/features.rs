use ndarray::Array2;

/// Decibel- or magnitude-valued grid indexed `(frequency bin, frame)`.
pub type MagnitudeGrid = Array2<f32>;

/// 12 pitch classes by frame, row 0 is C.
pub type ChromaGrid = Array2<f32>;

/// One spectral centroid (Hz) per frame.
pub type CentroidSeries = Vec<f32>;

/// Output of the peak-picking pitch tracker, both shaped `(bin, frame)`.
#[derive(Clone, Debug, PartialEq)]
pub struct PitchTrack {
    /// Interpolated frequency (Hz) at each detected peak, 0 elsewhere
    pub pitches: Array2<f32>,
    /// Peak salience (linear magnitude), 0 elsewhere
    pub magnitudes: Array2<f32>,
}

impl PitchTrack {
    pub fn empty(bins: usize, frames: usize) -> Self {
        Self {
            pitches: Array2::zeros((bins, frames)),
            magnitudes: Array2::zeros((bins, frames)),
        }
    }

    /// Frequency of the most salient peak in the whole clip, if any.
    pub fn strongest_pitch(&self) -> Option<f32> {
        self.magnitudes
            .iter()
            .zip(self.pitches.iter())
            .filter(|(&m, _)| m > 0.0)
            .max_by(|a, b| a.0.total_cmp(b.0))
            .map(|(_, &p)| p)
    }
}

/// Everything the renderer needs from one clip.
#[derive(Clone, Debug, PartialEq)]
pub struct Features {
    pub sample_rate: u32,
    /// |STFT| in dB relative to the clip's peak
    pub spectrogram_db: MagnitudeGrid,
    pub centroid: CentroidSeries,
    pub pitch: PitchTrack,
    /// Pitch salience in dB relative to its own peak
    pub pitch_db: MagnitudeGrid,
    pub chroma: ChromaGrid,
}
