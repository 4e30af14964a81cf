/// Reference pitch for octave numbers: C1 at A440 tuning.
pub fn reference_frequency() -> f32 {
    c_frequency(1)
}

/// Frequency of C in the given scientific-pitch octave (C4 ≈ 261.63 Hz).
pub fn c_frequency(octave: i32) -> f32 {
    let midi = 12 * (octave + 1);
    440.0 * 2f32.powf((midi - 69) as f32 / 12.0)
}

/// Octaves above C1. Zero or negative frequencies map to `-inf`.
pub fn hz_to_octave(hz: f32) -> f32 {
    if hz > 0.0 {
        (hz / reference_frequency()).log2()
    } else {
        f32::NEG_INFINITY
    }
}

/// Fixed histogram range in octaves above C1.
pub const OCTAVE_RANGE: (f32, f32) = (0.0, 8.0);

/// Names of the integer octave edges covered by `OCTAVE_RANGE`: C1 .. C9.
pub fn octave_edge_names() -> Vec<String> {
    let edges = (OCTAVE_RANGE.1 - OCTAVE_RANGE.0) as i32 + 1;
    (1..=edges).map(|i| format!("C{}", i)).collect()
}

/// Fixed-width histogram over `[lo, hi]`.
///
/// Bins are half-open except the last, which includes `hi`. Values outside
/// the range and non-finite values are not counted.
pub fn octave_histogram(values: &[f32], bins: usize, range: (f32, f32)) -> Vec<u32> {
    let mut counts = vec![0u32; bins];
    let (lo, hi) = range;
    if bins == 0 || !(hi > lo) {
        return counts;
    }
    let width = (hi - lo) / bins as f32;
    for &v in values {
        if !v.is_finite() || v < lo || v > hi {
            continue;
        }
        let idx = (((v - lo) / width) as usize).min(bins - 1);
        counts[idx] += 1;
    }
    counts
}

/// Centroid counts per octave band, with one label per bar.
#[derive(Clone, Debug, PartialEq)]
pub struct OctaveBandHistogram {
    pub labels: Vec<String>,
    pub counts: Vec<u32>,
    /// Lower boundary of each bin, in octaves
    pub lower_edges: Vec<f32>,
    pub bin_width: f32,
}

impl OctaveBandHistogram {
    pub fn from_octaves(octaves: &[f32]) -> Self {
        let names = octave_edge_names();
        let bins = names.len().saturating_sub(1);
        let counts = octave_histogram(octaves, bins, OCTAVE_RANGE);
        Self::reconcile(names, counts)
    }

    /// Pair labels with counts. Excess on either side is dropped so the
    /// bar chart never sees mismatched lengths.
    pub fn reconcile(mut labels: Vec<String>, mut counts: Vec<u32>) -> Self {
        let n = labels.len().min(counts.len());
        labels.truncate(n);
        counts.truncate(n);

        let bin_width = if n == 0 {
            0.0
        } else {
            (OCTAVE_RANGE.1 - OCTAVE_RANGE.0) / n as f32
        };
        let lower_edges = (0..n)
            .map(|i| OCTAVE_RANGE.0 + i as f32 * bin_width)
            .collect();

        Self {
            labels,
            counts,
            lower_edges,
            bin_width,
        }
    }

    pub fn total(&self) -> u32 {
        self.counts.iter().sum()
    }
}
