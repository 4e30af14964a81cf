use crate::audio::chroma::PITCH_CLASS_NAMES;
use crate::audio::features::Features;
use crate::audio::octave::{hz_to_octave, OctaveBandHistogram, OCTAVE_RANGE};
use crate::audio::stft::frames_to_time;
use ndarray::Array2;

use super::colormap::ColorScale;

/// How heatmap legend ticks are printed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TickFormat {
    /// Signed whole decibels, e.g. `+0 dB`
    Decibel,
    Plain,
}

impl TickFormat {
    pub fn format(&self, value: f32) -> String {
        match self {
            TickFormat::Decibel => format!("{:+.0} dB", value),
            TickFormat::Plain => format!("{:.2}", value),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Heatmap {
    /// Rows are drawn bottom-up, columns left to right
    pub grid: Array2<f32>,
    pub scale: ColorScale,
    pub legend: String,
    pub ticks: TickFormat,
    /// Optional per-row labels (bottom row first)
    pub row_labels: Vec<String>,
    pub x_label: String,
    pub y_label: String,
}

impl Heatmap {
    fn new(grid: Array2<f32>, legend: &str, ticks: TickFormat) -> Self {
        let scale = ColorScale::from_values(grid.iter());
        Self {
            grid,
            scale,
            legend: legend.to_string(),
            ticks,
            row_labels: Vec::new(),
            x_label: "Frame".to_string(),
            y_label: "Frequency Bin".to_string(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct LineSeries {
    pub x: Vec<f32>,
    /// Non-finite values are drawn as gaps
    pub y: Vec<f32>,
    pub label: String,
    pub x_label: String,
    pub y_label: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BarChart {
    pub labels: Vec<String>,
    pub values: Vec<u32>,
    /// Left edge of each bar in axis units
    pub lefts: Vec<f32>,
    pub bar_width: f32,
    /// Visible x extent
    pub x_range: (f32, f32),
    pub x_label: String,
    pub y_label: String,
}

#[derive(Clone, Debug, PartialEq)]
pub enum PanelKind {
    Heatmap(Heatmap),
    Line(LineSeries),
    Bars(BarChart),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Panel {
    pub title: String,
    pub kind: PanelKind,
}

/// The five-panel analysis figure, top to bottom.
#[derive(Clone, Debug, PartialEq)]
pub struct AnalysisFigure {
    pub panels: Vec<Panel>,
    pub octave_bands: OctaveBandHistogram,
}

pub const SPECTROGRAM_TITLE: &str = "Spectrogram";
pub const OCTAVE_TITLE: &str = "Octave Analysis";
pub const BAND_POWER_TITLE: &str = "Power Distribution in Octave Bands";
pub const MELODY_TITLE: &str = "Melody Analysis";
pub const CHROMA_TITLE: &str = "Harmonic Analysis (Chromagram)";

/// Matplotlib-style bar width as a fraction of the bin width.
const BAR_FILL: f32 = 0.8;

impl AnalysisFigure {
    pub fn from_features(features: &Features) -> Self {
        let octaves: Vec<f32> = features.centroid.iter().map(|&hz| hz_to_octave(hz)).collect();
        let times: Vec<f32> = (0..octaves.len())
            .map(|i| frames_to_time(i, features.sample_rate))
            .collect();
        let octave_bands = OctaveBandHistogram::from_octaves(&octaves);

        let spectrogram = Heatmap::new(
            features.spectrogram_db.clone(),
            "Intensity (dB)",
            TickFormat::Decibel,
        );

        let trend = LineSeries {
            x: times,
            y: octaves,
            label: "Octave Analysis".to_string(),
            x_label: "Time".to_string(),
            y_label: "Octave Centroid".to_string(),
        };

        let bars = BarChart {
            labels: octave_bands.labels.clone(),
            values: octave_bands.counts.clone(),
            lefts: octave_bands.lower_edges.clone(),
            bar_width: octave_bands.bin_width * BAR_FILL,
            x_range: OCTAVE_RANGE,
            x_label: "Octave Bands".to_string(),
            y_label: "Power".to_string(),
        };

        let melody = Heatmap::new(
            features.pitch_db.clone(),
            "Intensity (dB)",
            TickFormat::Decibel,
        );

        let mut chroma = Heatmap::new(features.chroma.clone(), "Intensity", TickFormat::Plain);
        chroma.row_labels = PITCH_CLASS_NAMES.iter().map(|s| s.to_string()).collect();
        chroma.y_label = "Pitch Class".to_string();

        let panels = vec![
            Panel {
                title: SPECTROGRAM_TITLE.to_string(),
                kind: PanelKind::Heatmap(spectrogram),
            },
            Panel {
                title: OCTAVE_TITLE.to_string(),
                kind: PanelKind::Line(trend),
            },
            Panel {
                title: BAND_POWER_TITLE.to_string(),
                kind: PanelKind::Bars(bars),
            },
            Panel {
                title: MELODY_TITLE.to_string(),
                kind: PanelKind::Heatmap(melody),
            },
            Panel {
                title: CHROMA_TITLE.to_string(),
                kind: PanelKind::Heatmap(chroma),
            },
        ];

        Self {
            panels,
            octave_bands,
        }
    }

    pub fn titles(&self) -> Vec<&str> {
        self.panels.iter().map(|p| p.title.as_str()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::features::PitchTrack;

    fn features(frames: usize) -> Features {
        let mut spectrogram_db = Array2::from_elem((4, frames), -80.0);
        let mut pitch_db = Array2::from_elem((4, frames), -40.0);
        if frames > 0 {
            spectrogram_db[[1, 0]] = 0.0;
            pitch_db[[2, 0]] = 0.0;
        }
        Features {
            sample_rate: 22050,
            spectrogram_db,
            centroid: vec![440.0; frames],
            pitch: PitchTrack::empty(4, frames),
            pitch_db,
            chroma: Array2::from_elem((12, frames), 0.5),
        }
    }

    #[test]
    fn five_panels_in_fixed_order() {
        let figure = AnalysisFigure::from_features(&features(10));
        assert_eq!(
            figure.titles(),
            vec![SPECTROGRAM_TITLE, OCTAVE_TITLE, BAND_POWER_TITLE, MELODY_TITLE, CHROMA_TITLE]
        );
        assert!(matches!(figure.panels[0].kind, PanelKind::Heatmap(_)));
        assert!(matches!(figure.panels[1].kind, PanelKind::Line(_)));
        assert!(matches!(figure.panels[2].kind, PanelKind::Bars(_)));
        assert!(matches!(figure.panels[3].kind, PanelKind::Heatmap(_)));
        assert!(matches!(figure.panels[4].kind, PanelKind::Heatmap(_)));
    }

    #[test]
    fn heatmaps_scale_independently() {
        let figure = AnalysisFigure::from_features(&features(10));
        let scales: Vec<ColorScale> = figure
            .panels
            .iter()
            .filter_map(|p| match &p.kind {
                PanelKind::Heatmap(h) => Some(h.scale),
                _ => None,
            })
            .collect();
        assert_eq!(scales[0], ColorScale { min: -80.0, max: 0.0 });
        assert_eq!(scales[1], ColorScale { min: -40.0, max: 0.0 });
        assert_eq!(scales[2], ColorScale { min: 0.5, max: 0.5 });
    }

    #[test]
    fn only_chroma_legend_is_linear() {
        let figure = AnalysisFigure::from_features(&features(3));
        match (&figure.panels[0].kind, &figure.panels[4].kind) {
            (PanelKind::Heatmap(spec), PanelKind::Heatmap(chroma)) => {
                assert_eq!(spec.ticks, TickFormat::Decibel);
                assert_eq!(spec.legend, "Intensity (dB)");
                assert_eq!(chroma.ticks, TickFormat::Plain);
                assert_eq!(chroma.legend, "Intensity");
                assert_eq!(chroma.row_labels.len(), 12);
            }
            _ => panic!("unexpected panel kinds"),
        }
    }

    #[test]
    fn bars_pair_with_labels() {
        let figure = AnalysisFigure::from_features(&features(10));
        match &figure.panels[2].kind {
            PanelKind::Bars(bars) => {
                assert_eq!(bars.labels.len(), bars.values.len());
                assert_eq!(bars.lefts.len(), bars.values.len());
                assert_eq!(bars.lefts[3], 3.0);
                // 440 Hz is 3.75 octaves above C1
                assert_eq!(bars.values[3], 10);
                assert_eq!(bars.labels[3], "C4");
            }
            _ => panic!("expected bar chart"),
        }
    }

    #[test]
    fn trend_time_uses_sample_rate() {
        let figure = AnalysisFigure::from_features(&features(3));
        match &figure.panels[1].kind {
            PanelKind::Line(line) => {
                assert_eq!(line.x.len(), 3);
                assert!((line.x[2] - 1024.0 / 22050.0).abs() < 1e-6);
            }
            _ => panic!("expected line"),
        }
    }

    #[test]
    fn decibel_ticks_are_signed() {
        assert_eq!(TickFormat::Decibel.format(0.0), "+0 dB");
        assert_eq!(TickFormat::Decibel.format(-80.0), "-80 dB");
        assert_eq!(TickFormat::Plain.format(0.5), "0.50");
    }
}
