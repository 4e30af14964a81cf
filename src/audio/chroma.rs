use ndarray::Array2;

use super::analysis::piptrack;
use super::stft::{NUM_BINS, N_FFT};

pub const NUM_CHROMA: usize = 12;

/// Pitch class names, row order of the chromagram.
pub const PITCH_CLASS_NAMES: [&str; NUM_CHROMA] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

const TUNING_RESOLUTION: f32 = 0.01;
/// Centre and spread (in octaves above A0) of the octave weighting.
const CENTER_OCTAVE: f64 = 5.0;
const OCTAVE_WIDTH: f64 = 2.0;

/// Fractional-semitone octave number relative to A0 (27.5 Hz at A440).
fn hz_to_octs(hz: f64, tuning: f64) -> f64 {
    let a440 = 440.0 * 2f64.powf(tuning / NUM_CHROMA as f64);
    (hz / (a440 / 16.0)).log2()
}

/// Estimate the deviation of the clip from A440 tuning, in semitones.
///
/// Result lies in `[-0.5, 0.5)` with `TUNING_RESOLUTION` steps.
pub fn estimate_tuning(power: &Array2<f32>, sample_rate: u32) -> f32 {
    let track = piptrack(power, sample_rate);

    let mut saliences: Vec<f32> = track
        .pitches
        .iter()
        .zip(track.magnitudes.iter())
        .filter(|(&p, _)| p > 0.0)
        .map(|(_, &m)| m)
        .collect();
    if saliences.is_empty() {
        return 0.0;
    }
    let threshold = median(&mut saliences);

    let pitches: Vec<f32> = track
        .pitches
        .iter()
        .zip(track.magnitudes.iter())
        .filter(|(&p, &m)| p > 0.0 && m >= threshold)
        .map(|(&p, _)| p)
        .collect();

    pitch_tuning(&pitches)
}

/// Most common deviation of `frequencies` from the equal-tempered grid.
pub fn pitch_tuning(frequencies: &[f32]) -> f32 {
    let n_bins = (1.0 / TUNING_RESOLUTION).ceil() as usize;
    let mut counts = vec![0usize; n_bins];
    let mut any = false;

    for &f in frequencies.iter().filter(|&&f| f > 0.0) {
        let semis = NUM_CHROMA as f64 * hz_to_octs(f as f64, 0.0);
        let mut residual = semis.rem_euclid(1.0);
        if residual >= 0.5 {
            residual -= 1.0;
        }
        let idx = (((residual + 0.5) * n_bins as f64) as usize).min(n_bins - 1);
        counts[idx] += 1;
        any = true;
    }

    if !any {
        return 0.0;
    }

    // First bin wins ties
    let mut best = 0;
    for (i, &c) in counts.iter().enumerate() {
        if c > counts[best] {
            best = i;
        }
    }
    -0.5 + best as f32 * TUNING_RESOLUTION
}

fn median(values: &mut [f32]) -> f32 {
    values.sort_by(|a, b| a.total_cmp(b));
    let n = values.len();
    if n % 2 == 1 {
        values[n / 2]
    } else {
        0.5 * (values[n / 2 - 1] + values[n / 2])
    }
}

/// Filterbank projecting STFT bins onto 12 pitch classes, shaped
/// `(NUM_CHROMA, NUM_BINS)` with row 0 = C.
pub fn chroma_filterbank(sample_rate: u32, tuning: f32) -> Array2<f64> {
    let n_chroma = NUM_CHROMA as f64;

    // Bin positions in fractional semitones; bin 0 (DC) is placed 1.5 octaves
    // below bin 1.
    let mut frqbins: Vec<f64> = (1..N_FFT)
        .map(|k| {
            let hz = k as f64 * sample_rate as f64 / N_FFT as f64;
            n_chroma * hz_to_octs(hz, tuning as f64)
        })
        .collect();
    frqbins.insert(0, frqbins[0] - 1.5 * n_chroma);

    let mut binwidth: Vec<f64> = frqbins.windows(2).map(|w| (w[1] - w[0]).max(1.0)).collect();
    binwidth.push(1.0);

    let half = (n_chroma / 2.0).round();
    let mut weights = Array2::<f64>::zeros((NUM_CHROMA, N_FFT));
    for (j, &fb) in frqbins.iter().enumerate() {
        for c in 0..NUM_CHROMA {
            let d = (fb - c as f64 + half + 10.0 * n_chroma).rem_euclid(n_chroma) - half;
            weights[[c, j]] = (-0.5 * (2.0 * d / binwidth[j]).powi(2)).exp();
        }
    }

    for (j, &fb) in frqbins.iter().enumerate() {
        let mut column = weights.column_mut(j);
        let norm = column.iter().map(|w| w * w).sum::<f64>().sqrt();
        if norm > f64::MIN_POSITIVE {
            column.mapv_inplace(|w| w / norm);
        }
        let octave_weight = (-0.5 * ((fb / n_chroma - CENTER_OCTAVE) / OCTAVE_WIDTH).powi(2)).exp();
        column.mapv_inplace(|w| w * octave_weight);
    }

    // Rows are A-based so far; rotate so row 0 is C.
    Array2::from_shape_fn((NUM_CHROMA, NUM_BINS), |(c, j)| {
        weights[[(c + 3) % NUM_CHROMA, j]]
    })
}
