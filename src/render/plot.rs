use anyhow::{Context, Result};
use image::RgbImage;
use plotters::coord::Shift;
use plotters::prelude::*;
use std::path::Path;

use super::colormap::viridis;
use super::figure::{self, AnalysisFigure, BarChart, Heatmap, PanelKind};
use super::text::{LabelFont, FONT_FAMILY};

type Area<'a> = DrawingArea<BitMapBackend<'a>, Shift>;

/// Default series colour for lines and bars
pub const SERIES_BLUE: RGBColor = RGBColor(31, 119, 180);
const GRID_GRAY: RGBColor = RGBColor(220, 220, 220);

/// Slots smaller than this in either direction are left blank.
const MIN_PANEL_PX: u32 = 24;
/// Labels clamped below this size are dropped.
const MIN_FONT_PX: f64 = 6.0;
const TITLE_SCALE: f64 = 1.2;

/// Pixel budget of one panel slot. Label text is clamped to the slot so the
/// plot area keeps a positive size whatever font size was requested.
#[derive(Clone, Copy, Debug, PartialEq)]
struct Layout {
    margin: i32,
    font_px: Option<f64>,
    x_label_area: i32,
    y_label_area: i32,
    colorbar_gap: i32,
    colorbar_width: i32,
    colorbar_label_area: i32,
}

impl Layout {
    fn new(slot_w: u32, slot_h: u32, font_size: Option<f32>) -> Self {
        let (w, h) = (slot_w as f64, slot_h as f64);
        // A caption and two rows of axis text take roughly five label heights
        let font_px = font_size
            .map(|size| (size as f64).min(h / 8.0).min(w / 30.0))
            .filter(|px| *px >= MIN_FONT_PX);
        let (x_label_area, y_label_area, colorbar_label_area) = match font_px {
            Some(px) => (
                (px * 2.5).ceil() as i32,
                (px * 4.5).ceil() as i32,
                (px * 5.5).ceil() as i32,
            ),
            None => (0, 0, 0),
        };
        Self {
            margin: (slot_w.min(slot_h) / 20).clamp(1, 10) as i32,
            font_px,
            x_label_area,
            y_label_area,
            colorbar_gap: (slot_w / 80).clamp(1, 16) as i32,
            colorbar_width: (slot_w / 60).clamp(2, 18) as i32,
            colorbar_label_area,
        }
    }

    /// Width reserved right of the axes for a heatmap colour bar.
    fn colorbar_span(&self) -> i32 {
        self.colorbar_gap + self.colorbar_width + self.colorbar_label_area + self.margin
    }

    /// Split a slot into the axes area and the colour bar column. Every
    /// panel reserves the column so the x axes line up down the figure.
    fn split<'a>(&self, slot: &Area<'a>) -> (Area<'a>, Area<'a>) {
        let (slot_w, _) = slot.dim_in_pixel();
        slot.split_horizontally((slot_w as i32 - self.colorbar_span()).max(1))
    }

    fn chart<'a, 'b>(
        &self,
        area: &'a Area<'b>,
        title: &str,
    ) -> ChartBuilder<'a, 'a, BitMapBackend<'b>> {
        let mut builder = ChartBuilder::on(area);
        builder.margin(self.margin);
        if let Some(px) = self.font_px {
            builder
                .caption(title, (FONT_FAMILY, px * TITLE_SCALE))
                .x_label_area_size(self.x_label_area)
                .y_label_area_size(self.y_label_area);
        }
        builder
    }
}

/// Render a figure, stacking its panels vertically.
pub fn render_figure(
    figure: &AnalysisFigure,
    width: u32,
    height: u32,
    font: Option<&LabelFont>,
) -> Result<RgbImage> {
    let (width, height) = (width.max(1), height.max(1));
    let mut buffer = vec![0u8; width as usize * height as usize * 3];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE)?;

        let slots = root.split_evenly((figure.panels.len().max(1), 1));
        for (panel, slot) in figure.panels.iter().zip(&slots) {
            let (slot_w, slot_h) = slot.dim_in_pixel();
            if slot_w < MIN_PANEL_PX || slot_h < MIN_PANEL_PX {
                log::warn!("Figure too small to draw panel '{}'", panel.title);
                continue;
            }
            let layout = Layout::new(slot_w, slot_h, font.map(LabelFont::size));
            match &panel.kind {
                PanelKind::Heatmap(heatmap) => draw_heatmap(slot, &panel.title, heatmap, &layout)?,
                PanelKind::Line(series) => draw_trend(slot, &panel.title, series, &layout)?,
                PanelKind::Bars(bars) => draw_bars(slot, &panel.title, bars, &layout)?,
            }
        }
        root.present()?;
    }

    RgbImage::from_raw(width, height, buffer).context("Figure buffer does not match its size")
}

pub fn save_png(image: &RgbImage, path: &Path) -> Result<()> {
    image
        .save_with_format(path, image::ImageFormat::Png)
        .with_context(|| format!("Failed to write figure: {}", path.display()))
}

fn draw_heatmap(slot: &Area, title: &str, heatmap: &Heatmap, layout: &Layout) -> Result<()> {
    let (axes, side) = layout.split(slot);
    let (rows, cols) = heatmap.grid.dim();
    let mut chart = layout
        .chart(&axes, title)
        .build_cartesian_2d(0f32..cols.max(1) as f32, 0f32..rows.max(1) as f32)?;

    if let Some(px) = layout.font_px {
        let row_labels = &heatmap.row_labels;
        let row_label = |v: &f32| row_labels.get(v.floor() as usize).cloned().unwrap_or_default();
        let index_label = |v: &f32| format!("{:.0}", v);
        let mut mesh = chart.configure_mesh();
        mesh.disable_mesh()
            .x_desc(heatmap.x_label.as_str())
            .y_desc(heatmap.y_label.as_str())
            .x_label_formatter(&index_label)
            .label_style((FONT_FAMILY, px))
            .axis_desc_style((FONT_FAMILY, px));
        if row_labels.is_empty() {
            mesh.y_label_formatter(&index_label);
        } else {
            mesh.y_labels(row_labels.len()).y_label_formatter(&row_label);
        }
        mesh.draw()?;
    }

    let plot = chart.plotting_area().strip_coord_spec();
    let (pw, ph) = plot.dim_in_pixel();
    if rows > 0 && cols > 0 {
        for py in 0..ph {
            // Row 0 sits at the bottom
            let row = ((ph - 1 - py) as usize * rows / ph as usize).min(rows - 1);
            for px in 0..pw {
                let col = (px as usize * cols / pw as usize).min(cols - 1);
                let color = heatmap.scale.color(heatmap.grid[[row, col]]);
                plot.draw_pixel((px as i32, py as i32), &color)?;
            }
        }
    }
    draw_frame(&plot)?;

    // Align the colour bar with the heatmap's own plot rows
    let (_, plot_y) = plot.get_pixel_range();
    let (_, slot_y) = slot.get_base_pixel();
    let (_, slot_h) = slot.dim_in_pixel();
    draw_colorbar(
        &side,
        heatmap,
        layout,
        (plot_y.start - slot_y).max(0),
        (slot_h as i32 - (plot_y.end - slot_y)).max(0),
    )
}

fn draw_colorbar(
    side: &Area,
    heatmap: &Heatmap,
    layout: &Layout,
    top: i32,
    bottom: i32,
) -> Result<()> {
    let (lo, hi) = padded_range([heatmap.scale.min, heatmap.scale.max].into_iter(), 0.5);
    let mut builder = ChartBuilder::on(side);
    builder
        .margin_left(layout.colorbar_gap)
        .margin_right(layout.margin)
        .margin_top(top)
        .margin_bottom(bottom)
        .set_label_area_size(LabelAreaPosition::Right, layout.colorbar_label_area);
    let mut bar = builder.build_cartesian_2d(0f32..1f32, lo..hi)?;

    if let Some(px) = layout.font_px {
        bar.configure_mesh()
            .disable_mesh()
            .disable_x_axis()
            .y_labels(5)
            .y_label_formatter(&|v| heatmap.ticks.format(*v))
            .y_desc(heatmap.legend.as_str())
            .label_style((FONT_FAMILY, px))
            .axis_desc_style((FONT_FAMILY, px))
            .draw()?;
    }

    let plot = bar.plotting_area().strip_coord_spec();
    let (pw, ph) = plot.dim_in_pixel();
    for py in 0..ph {
        let color = viridis(1.0 - py as f32 / ph.saturating_sub(1).max(1) as f32);
        for px in 0..pw {
            plot.draw_pixel((px as i32, py as i32), &color)?;
        }
    }
    draw_frame(&plot)
}

fn draw_trend(
    slot: &Area,
    title: &str,
    series: &figure::LineSeries,
    layout: &Layout,
) -> Result<()> {
    let (axes, _) = layout.split(slot);
    let runs = finite_runs(&series.x, &series.y);
    let (x_lo, x_hi) = padded_range(runs.iter().flatten().map(|p| p.0), 0.0);
    let (y_lo, y_hi) = padded_range(runs.iter().flatten().map(|p| p.1), 0.5);

    let mut chart = layout.chart(&axes, title).build_cartesian_2d(x_lo..x_hi, y_lo..y_hi)?;
    if let Some(px) = layout.font_px {
        chart
            .configure_mesh()
            .light_line_style(GRID_GRAY.stroke_width(1))
            .x_desc(series.x_label.as_str())
            .y_desc(series.y_label.as_str())
            .x_label_formatter(&|v| format!("{:.1}", v))
            .y_label_formatter(&|v| format!("{:.1}", v))
            .label_style((FONT_FAMILY, px))
            .axis_desc_style((FONT_FAMILY, px))
            .draw()?;
    }

    let mut labelled = false;
    for run in runs {
        if let [point] = run.as_slice() {
            chart.draw_series(std::iter::once(Circle::new(*point, 2, SERIES_BLUE.filled())))?;
            continue;
        }
        let drawn = chart.draw_series(LineSeries::new(run, SERIES_BLUE.stroke_width(2)))?;
        if !labelled {
            drawn
                .label(series.label.as_str())
                .legend(|(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], SERIES_BLUE.stroke_width(2))
                });
            labelled = true;
        }
    }

    if let (Some(px), true) = (layout.font_px, labelled) {
        chart
            .configure_series_labels()
            .position(SeriesLabelPosition::UpperRight)
            .label_font((FONT_FAMILY, px))
            .background_style(WHITE.mix(0.8).filled())
            .border_style(BLACK.stroke_width(1))
            .draw()?;
    }

    draw_frame(&chart.plotting_area().strip_coord_spec())
}

fn draw_bars(slot: &Area, title: &str, bars: &BarChart, layout: &Layout) -> Result<()> {
    let (axes, _) = layout.split(slot);
    let (x_lo, x_hi) = padded_range([bars.x_range.0, bars.x_range.1].into_iter(), 0.5);
    let peak = bars.values.iter().copied().max().unwrap_or(0).max(1) as f32;

    let mut chart = layout
        .chart(&axes, title)
        .build_cartesian_2d(x_lo..x_hi, 0f32..peak * 1.05)?;

    if let Some(px) = layout.font_px {
        let band_label = |v: &f32| {
            bars.lefts
                .iter()
                .position(|left| (left - v).abs() < 1e-3)
                .and_then(|i| bars.labels.get(i).cloned())
                .unwrap_or_default()
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .light_line_style(GRID_GRAY.stroke_width(1))
            .x_labels(bars.labels.len() + 1)
            .x_label_formatter(&band_label)
            .y_label_formatter(&|v| format!("{:.0}", v))
            .x_desc(bars.x_label.as_str())
            .y_desc(bars.y_label.as_str())
            .label_style((FONT_FAMILY, px))
            .axis_desc_style((FONT_FAMILY, px))
            .draw()?;
    }

    chart.draw_series(
        bars.lefts
            .iter()
            .zip(&bars.values)
            .filter(|(_, count)| **count > 0)
            .map(|(&left, &count)| {
                let top_right = (left + bars.bar_width, count as f32);
                Rectangle::new([(left, 0.0), top_right], SERIES_BLUE.filled())
            }),
    )?;

    draw_frame(&chart.plotting_area().strip_coord_spec())
}

/// Outline a plot area on all four sides.
fn draw_frame(plot: &Area) -> Result<()> {
    let (w, h) = plot.dim_in_pixel();
    if w > 0 && h > 0 {
        plot.draw(&Rectangle::new([(0, 0), (w as i32 - 1, h as i32 - 1)], BLACK.stroke_width(1)))?;
    }
    Ok(())
}

/// Consecutive finite points; a non-finite value on either axis starts a new run.
fn finite_runs(x: &[f32], y: &[f32]) -> Vec<Vec<(f32, f32)>> {
    let mut runs = Vec::new();
    let mut current = Vec::new();
    for (&px, &py) in x.iter().zip(y) {
        if px.is_finite() && py.is_finite() {
            current.push((px, py));
        } else if !current.is_empty() {
            runs.push(std::mem::take(&mut current));
        }
    }
    if !current.is_empty() {
        runs.push(current);
    }
    runs
}

/// Finite range of `values`, widened by `pad` (or by 1) when degenerate.
fn padded_range(values: impl Iterator<Item = f32>, pad: f32) -> (f32, f32) {
    let (lo, hi) = values
        .filter(|v| v.is_finite())
        .fold((f32::INFINITY, f32::NEG_INFINITY), |(lo, hi), v| {
            (lo.min(v), hi.max(v))
        });
    if lo > hi {
        (0.0, 1.0)
    } else if hi - lo <= f32::EPSILON {
        let pad = if pad > 0.0 { pad } else { 1.0 };
        (lo - pad, hi + pad)
    } else {
        (lo, hi)
    }
}
