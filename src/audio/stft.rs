use ndarray::Array2;
use rayon::prelude::*;
use rustfft::{num_complex::Complex, FftPlanner};

/// FFT length for every short-time transform in the crate.
pub const N_FFT: usize = 2048;
/// Hop between consecutive frames, in samples.
pub const HOP_LENGTH: usize = 512;
/// Number of frequency bins per frame.
pub const NUM_BINS: usize = N_FFT / 2 + 1;

/// Frames produced for a buffer of `len` samples with centred framing.
pub fn frame_count(len: usize) -> usize {
    if len == 0 {
        0
    } else {
        1 + len / HOP_LENGTH
    }
}

/// Magnitude of the centred STFT, shaped `(NUM_BINS, frames)`.
///
/// The signal is zero-padded by `N_FFT / 2` on each side so frame `t` is
/// centred on sample `t * HOP_LENGTH`.
pub fn stft_magnitude(samples: &[f32]) -> Array2<f32> {
    let n_frames = frame_count(samples.len());
    if n_frames == 0 {
        return Array2::zeros((NUM_BINS, 0));
    }

    let pad = N_FFT / 2;
    let mut padded = vec![0.0f32; samples.len() + 2 * pad];
    padded[pad..pad + samples.len()].copy_from_slice(samples);

    let window = hann_window(N_FFT);
    let fft = FftPlanner::<f32>::new().plan_fft_forward(N_FFT);

    let columns: Vec<Vec<f32>> = (0..n_frames)
        .into_par_iter()
        .map(|frame_idx| {
            let start = frame_idx * HOP_LENGTH;
            let mut buffer: Vec<Complex<f32>> = padded[start..start + N_FFT]
                .iter()
                .zip(window.iter())
                .map(|(&s, &w)| Complex::new(s * w, 0.0))
                .collect();
            fft.process(&mut buffer);
            buffer[..NUM_BINS].iter().map(|c| c.norm()).collect()
        })
        .collect();

    Array2::from_shape_fn((NUM_BINS, n_frames), |(bin, frame)| columns[frame][bin])
}

/// Centre frequency of each STFT bin in Hz.
pub fn fft_frequencies(sample_rate: u32) -> Vec<f32> {
    (0..NUM_BINS)
        .map(|k| k as f32 * sample_rate as f32 / N_FFT as f32)
        .collect()
}

/// Start time of frame `frame` in seconds.
pub fn frames_to_time(frame: usize, sample_rate: u32) -> f32 {
    (frame * HOP_LENGTH) as f32 / sample_rate as f32
}

/// Periodic Hann window (the DFT-even variant used for spectral analysis).
pub fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 - 0.5 * (2.0 * std::f32::consts::PI * i as f32 / size as f32).cos())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_count_follows_centred_framing() {
        assert_eq!(frame_count(0), 0);
        assert_eq!(frame_count(1), 1);
        assert_eq!(frame_count(512), 2);
        assert_eq!(frame_count(22050), 44);
    }

    #[test]
    fn empty_input_has_no_frames() {
        let grid = stft_magnitude(&[]);
        assert_eq!(grid.dim(), (NUM_BINS, 0));
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let sr = 22050;
        // Exactly on bin 40
        let freq = 40.0 * sr as f32 / N_FFT as f32;
        let samples: Vec<f32> = (0..sr)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sr as f32).sin())
            .collect();
        let grid = stft_magnitude(&samples);
        let mid = grid.ncols() / 2;
        let column = grid.column(mid);
        let peak = column
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 40);
    }

    #[test]
    fn hann_is_periodic() {
        let w = hann_window(8);
        assert_eq!(w[0], 0.0);
        assert!((w[4] - 1.0).abs() < 1e-6);
        assert!((w[2] - w[6]).abs() < 1e-6);
    }

    #[test]
    fn frame_times_use_sample_rate() {
        assert!((frames_to_time(43, 22050) - 43.0 * 512.0 / 22050.0).abs() < 1e-6);
        assert!((frames_to_time(86, 44100) - frames_to_time(43, 22050)).abs() < 1e-6);
    }
}
