use plotters::style::RGBColor;

/// Viridis sampled at nine evenly spaced points.
const VIRIDIS: [[u8; 3]; 9] = [
    [68, 1, 84],
    [71, 44, 122],
    [59, 81, 139],
    [44, 113, 142],
    [33, 144, 141],
    [39, 173, 129],
    [92, 200, 99],
    [170, 220, 50],
    [253, 231, 37],
];

/// Map `t` in `[0, 1]` onto viridis. Out-of-range and NaN inputs clamp.
pub fn viridis(t: f32) -> RGBColor {
    let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
    let pos = t * (VIRIDIS.len() - 1) as f32;
    let i = (pos.floor() as usize).min(VIRIDIS.len() - 2);
    let frac = pos - i as f32;
    let lerp = |a: u8, b: u8| (a as f32 + (b as f32 - a as f32) * frac).round() as u8;
    let (a, b) = (VIRIDIS[i], VIRIDIS[i + 1]);
    RGBColor(lerp(a[0], b[0]), lerp(a[1], b[1]), lerp(a[2], b[2]))
}

/// Linear normalisation range owned by one panel.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ColorScale {
    pub min: f32,
    pub max: f32,
}

impl ColorScale {
    /// Range of the finite values in `values`; `[0, 0]` when there are none.
    pub fn from_values<'a>(values: impl IntoIterator<Item = &'a f32>) -> Self {
        let (min, max) = values
            .into_iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
                (lo.min(v), hi.max(v))
            });
        if min > max {
            Self { min: 0.0, max: 0.0 }
        } else {
            Self { min, max }
        }
    }

    pub fn normalize(&self, v: f32) -> f32 {
        let span = self.max - self.min;
        if span > 0.0 {
            (v - self.min) / span
        } else {
            0.0
        }
    }

    pub fn color(&self, v: f32) -> RGBColor {
        viridis(self.normalize(v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endpoints_match_table() {
        assert_eq!(viridis(0.0), RGBColor(68, 1, 84));
        assert_eq!(viridis(1.0), RGBColor(253, 231, 37));
        assert_eq!(viridis(2.0), viridis(1.0));
        assert_eq!(viridis(f32::NAN), viridis(0.0));
    }

    #[test]
    fn scale_ignores_non_finite() {
        let values = [f32::NEG_INFINITY, -80.0, -3.0, 0.0, f32::NAN];
        let scale = ColorScale::from_values(&values);
        assert_eq!(scale, ColorScale { min: -80.0, max: 0.0 });
        assert_eq!(scale.normalize(-40.0), 0.5);
    }

    #[test]
    fn flat_scale_maps_to_bottom() {
        let scale = ColorScale::from_values(std::iter::empty());
        assert_eq!(scale.normalize(5.0), 0.0);
        assert_eq!(scale.color(5.0), viridis(0.0));
    }
}
