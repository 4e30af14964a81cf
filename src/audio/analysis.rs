use ndarray::{Array2, Axis};

use super::chroma::{chroma_filterbank, estimate_tuning};
use super::decode::AudioData;
use super::features::{CentroidSeries, ChromaGrid, Features, MagnitudeGrid, PitchTrack};
use super::stft::{fft_frequencies, stft_magnitude, N_FFT};

/// Floor applied to amplitudes before taking the logarithm.
const AMIN: f32 = 1e-5;
/// Dynamic range kept below the peak of a dB grid.
const TOP_DB: f32 = 80.0;

/// Pitch tracker search band and relative peak threshold.
const PITCH_FMIN: f32 = 150.0;
const PITCH_FMAX: f32 = 4000.0;
const PITCH_THRESHOLD: f32 = 0.1;

/// Run the full feature extractor over one clip.
pub fn extract(audio: &AudioData) -> Features {
    let sr = audio.sample_rate;
    let samples = &audio.samples;

    log::info!("Computing spectrogram...");
    let spectrogram_db = spectrogram(samples);

    log::info!("Computing spectral centroid...");
    let centroid = spectral_centroid(samples, sr);

    log::info!("Tracking pitch...");
    let pitch = pitch_track(samples, sr);
    let pitch_db = amplitude_to_db(&pitch.magnitudes);
    if let Some(hz) = pitch.strongest_pitch() {
        log::info!("Strongest pitch: {:.1} Hz", hz);
    }

    log::info!("Computing chromagram...");
    let chroma = chroma(samples, sr);

    log::info!(
        "Features: {} frames, {} bins",
        spectrogram_db.ncols(),
        spectrogram_db.nrows()
    );

    Features {
        sample_rate: sr,
        spectrogram_db,
        centroid,
        pitch,
        pitch_db,
        chroma,
    }
}

/// Magnitude spectrogram in dB relative to the loudest cell of the clip.
pub fn spectrogram(samples: &[f32]) -> MagnitudeGrid {
    amplitude_to_db(&stft_magnitude(samples))
}

/// Convert a non-negative amplitude grid to dB against its own maximum.
///
/// The loudest cell maps to exactly 0 dB and nothing falls more than
/// `TOP_DB` below it.
pub fn amplitude_to_db(grid: &Array2<f32>) -> Array2<f32> {
    let amin_power = AMIN * AMIN;
    let peak = grid.iter().copied().fold(0.0f32, f32::max);
    let ref_db = 10.0 * (peak * peak).max(amin_power).log10();

    let mut db = grid.mapv(|s| 10.0 * (s * s).max(amin_power).log10() - ref_db);
    let floor = db.iter().copied().fold(f32::NEG_INFINITY, f32::max) - TOP_DB;
    db.mapv_inplace(|v| v.max(floor));
    db
}

pub fn spectral_centroid(samples: &[f32], sample_rate: u32) -> CentroidSeries {
    centroid_from_magnitude(&stft_magnitude(samples), sample_rate)
}

fn centroid_from_magnitude(magnitude: &Array2<f32>, sample_rate: u32) -> CentroidSeries {
    let freqs = fft_frequencies(sample_rate);
    magnitude
        .axis_iter(Axis(1))
        .map(|column| {
            let total: f32 = column.sum();
            if total > f32::MIN_POSITIVE {
                column
                    .iter()
                    .zip(freqs.iter())
                    .map(|(&mag, &f)| mag * f)
                    .sum::<f32>()
                    / total
            } else {
                0.0
            }
        })
        .collect()
}

pub fn pitch_track(samples: &[f32], sample_rate: u32) -> PitchTrack {
    piptrack(&stft_magnitude(samples), sample_rate)
}

/// Parabolic-interpolation pitch tracker over any spectrogram-like grid.
///
/// A bin is a candidate when it lies in `[PITCH_FMIN, PITCH_FMAX)`, exceeds
/// `PITCH_THRESHOLD` times its frame's maximum, and is a local maximum along
/// frequency.
pub(crate) fn piptrack(spectrum: &Array2<f32>, sample_rate: u32) -> PitchTrack {
    let (bins, frames) = spectrum.dim();
    let mut track = PitchTrack::empty(bins, frames);
    if bins < 3 {
        return track;
    }

    let fmax = PITCH_FMAX.min(sample_rate as f32 / 2.0);
    let freqs = fft_frequencies(sample_rate);
    let bin_hz = sample_rate as f32 / N_FFT as f32;

    for (t, column) in spectrum.axis_iter(Axis(1)).enumerate() {
        let frame_max = column.iter().copied().fold(0.0f32, f32::max);
        let ref_value = PITCH_THRESHOLD * frame_max;
        let gated = |k: usize| {
            let s = column[k];
            if s > ref_value {
                s
            } else {
                0.0
            }
        };

        for k in 1..bins {
            if freqs[k] < PITCH_FMIN || freqs[k] >= fmax {
                continue;
            }
            let here = gated(k);
            let next = if k + 1 < bins { gated(k + 1) } else { here };
            if !(here > gated(k - 1) && here >= next) {
                continue;
            }

            // Parabolic fit through the neighbouring bins; the top bin has no
            // right neighbour and keeps its raw position.
            let (avg, shift) = if k + 1 < bins {
                let avg = 0.5 * (column[k + 1] - column[k - 1]);
                let curvature = 2.0 * column[k] - column[k + 1] - column[k - 1];
                let denom = if curvature.abs() < f32::MIN_POSITIVE {
                    curvature + 1.0
                } else {
                    curvature
                };
                (avg, avg / denom)
            } else {
                (0.0, 0.0)
            };

            track.pitches[[k, t]] = (k as f32 + shift) * bin_hz;
            track.magnitudes[[k, t]] = (column[k] + 0.5 * avg * shift).max(0.0);
        }
    }

    track
}

/// Chromagram with each frame scaled so its strongest pitch class is 1.
pub fn chroma(samples: &[f32], sample_rate: u32) -> ChromaGrid {
    let power = stft_magnitude(samples).mapv(|m| m * m);
    let tuning = estimate_tuning(&power, sample_rate);
    log::debug!("Estimated tuning: {:+.2} semitones", tuning);

    let filterbank = chroma_filterbank(sample_rate, tuning).mapv(|w| w as f32);
    let mut chroma = filterbank.dot(&power);

    for mut column in chroma.axis_iter_mut(Axis(1)) {
        let peak = column.iter().map(|v| v.abs()).fold(0.0f32, f32::max);
        if peak > f32::MIN_POSITIVE {
            column.mapv_inplace(|v| v / peak);
        }
    }

    chroma
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::stft::{frame_count, NUM_BINS};

    fn sine(freq: f32, sample_rate: u32, seconds: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * seconds) as usize;
        (0..n)
            .map(|i| 0.5 * (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    fn grid_max(grid: &Array2<f32>) -> f32 {
        grid.iter().copied().fold(f32::NEG_INFINITY, f32::max)
    }

    #[test]
    fn db_grids_peak_at_zero() {
        let samples = sine(440.0, 22050, 1.0);
        let spec = spectrogram(&samples);
        assert!(grid_max(&spec).abs() < 1e-4);
        assert!(spec.iter().all(|&v| v >= -TOP_DB - 1e-3));

        let pitch = pitch_track(&samples, 22050);
        let pitch_db = amplitude_to_db(&pitch.magnitudes);
        assert!(grid_max(&pitch_db).abs() < 1e-4);
    }

    #[test]
    fn silent_grid_converts_to_flat_zero() {
        let db = amplitude_to_db(&Array2::zeros((4, 3)));
        assert!(db.iter().all(|&v| v == 0.0));
    }

    #[test]
    fn centroid_tracks_sine_frequency() {
        let samples = sine(440.0, 22050, 1.0);
        let centroid = spectral_centroid(&samples, 22050);
        assert_eq!(centroid.len(), frame_count(samples.len()));
        let mid = centroid[centroid.len() / 2];
        assert!((mid - 440.0).abs() < 15.0, "centroid {}", mid);
    }

    #[test]
    fn silent_frames_have_zero_centroid() {
        let centroid = spectral_centroid(&vec![0.0; 4096], 22050);
        assert!(centroid.iter().all(|&c| c == 0.0));
    }

    #[test]
    fn pitch_tracker_finds_sine() {
        let pitch = pitch_track(&sine(440.0, 22050, 1.0), 22050);
        let hz = pitch.strongest_pitch().unwrap();
        assert!((hz - 440.0).abs() < 10.0, "pitch {}", hz);
    }

    #[test]
    fn pitch_tracker_ignores_out_of_band_tones() {
        let pitch = pitch_track(&sine(80.0, 22050, 0.5), 22050);
        assert!(pitch
            .pitches
            .iter()
            .all(|&p| p == 0.0 || p >= PITCH_FMIN - 11.0));
    }

    #[test]
    fn chroma_highlights_a_for_440() {
        let chroma = chroma(&sine(440.0, 22050, 1.0), 22050);
        assert_eq!(chroma.nrows(), 12);
        let mid = chroma.ncols() / 2;
        let column = chroma.column(mid);
        let best = column
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(best, 9);
        assert!((column[best] - 1.0).abs() < 1e-5);
    }

    #[test]
    fn empty_buffer_yields_empty_grids() {
        let audio = AudioData {
            samples: Vec::new(),
            sample_rate: 22050,
        };
        let features = extract(&audio);
        assert_eq!(features.spectrogram_db.dim(), (NUM_BINS, 0));
        assert!(features.centroid.is_empty());
        assert_eq!(features.pitch_db.ncols(), 0);
        assert_eq!(features.chroma.dim(), (12, 0));
    }

    #[test]
    fn extraction_is_idempotent() {
        let audio = AudioData {
            samples: sine(330.0, 16000, 0.5),
            sample_rate: 16000,
        };
        assert_eq!(extract(&audio), extract(&audio));
    }
}
