//! Light-curve scatter figures.
//!
//! The magnitude axis is drawn inverted, bright side up, as light curves
//! are conventionally read.

use lightcurve::{FoldedLightCurve, LightCurve};
use plotters::coord::cartesian::Cartesian2d;
use plotters::coord::types::RangedCoordf64;
use plotters::prelude::*;
use plotters::style::colors::colormaps::{ColorMap, ViridisRGB};

use super::{render_err, FigureError};

const FIGURE_SIZE: (u32, u32) = (800, 480);
const POINT_COLOR: RGBColor = RGBColor(0x1f, 0x77, 0xb4);

fn padded(lo: f64, hi: f64) -> (f64, f64) {
    let pad = (hi - lo).abs() * 0.05 + 1e-6;
    (lo - pad, hi + pad)
}

/// Render an unfolded curve as magnitude against time.
pub fn render_lightcurve_svg(curve: &LightCurve, title: &str) -> Result<String, FigureError> {
    let points: Vec<(f64, f64, f64)> = curve
        .samples()
        .iter()
        .filter(|s| s.time_jd.is_finite() && s.mag.is_finite())
        .map(|s| (curve.display_time(s), s.mag, s.mag_err))
        .collect();
    if points.is_empty() {
        return Err(FigureError::Empty("no plottable samples".to_string()));
    }

    let (t_lo, t_hi) = points
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.0), hi.max(p.0)));
    let (m_lo, m_hi) = points
        .iter()
        .fold((f64::MAX, f64::MIN), |(lo, hi), p| (lo.min(p.1), hi.max(p.1)));
    let (t_lo, t_hi) = padded(t_lo, t_hi);
    let (m_lo, m_hi) = padded(m_lo, m_hi);

    let x_label = format!("Time [{}]", curve.time_format.label());
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, FIGURE_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;
        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 18))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(55)
            // Descending y range inverts the magnitude axis.
            .build_cartesian_2d(t_lo..t_hi, m_hi..m_lo)
            .map_err(render_err)?;
        chart
            .configure_mesh()
            .x_desc(x_label)
            .y_desc("Magnitude")
            .x_label_formatter(&|v| format!("{v:.1}"))
            .y_label_formatter(&|v| format!("{v:.2}"))
            .draw()
            .map_err(render_err)?;

        draw_error_bars(&mut chart, points.iter().map(|&(t, m, e)| (t, m, e)))?;
        chart
            .draw_series(
                points
                    .iter()
                    .map(|&(t, m, _)| Circle::new((t, m), 2, POINT_COLOR.filled())),
            )
            .map_err(render_err)?;
        root.present().map_err(render_err)?;
    }
    Ok(svg)
}

/// Render a folded curve as magnitude against phase. With `cmap` the points
/// are colored by their original observation time and a colorbar is added.
pub fn render_folded_svg(
    folded: &FoldedLightCurve,
    time_label: &str,
    title: &str,
    cmap: bool,
) -> Result<String, FigureError> {
    let points: Vec<(f64, f64, f64, f64)> = folded
        .samples()
        .iter()
        .filter(|s| s.mag.is_finite())
        .map(|s| (s.phase, s.mag, s.mag_err, s.time_original))
        .collect();
    if points.is_empty() {
        return Err(FigureError::Empty("no plottable samples".to_string()));
    }

    let (m_lo, m_hi) = folded
        .mag_range()
        .ok_or_else(|| FigureError::Empty("no finite magnitudes".to_string()))?;
    let (m_lo, m_hi) = padded(m_lo, m_hi);
    let time_range = folded.time_original_range();

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, FIGURE_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let (plot_area, bar_area) = if cmap {
            let (left, right) = root.split_horizontally(FIGURE_SIZE.0 - 110);
            (left, Some(right))
        } else {
            (root.clone(), None)
        };

        let mut chart = ChartBuilder::on(&plot_area)
            .caption(title, ("sans-serif", 18))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(55)
            .build_cartesian_2d(-0.5f64..0.5f64, m_hi..m_lo)
            .map_err(render_err)?;
        chart
            .configure_mesh()
            .x_desc("Phase")
            .y_desc("Magnitude")
            .x_label_formatter(&|v| format!("{v:.2}"))
            .y_label_formatter(&|v| format!("{v:.2}"))
            .draw()
            .map_err(render_err)?;

        draw_error_bars(&mut chart, points.iter().map(|&(p, m, e, _)| (p, m, e)))?;
        match (cmap, time_range) {
            (true, Some((t_lo, t_hi))) if t_hi > t_lo => {
                chart
                    .draw_series(points.iter().map(|&(p, m, _, t)| {
                        let color = ViridisRGB.get_color_normalized(t, t_lo, t_hi);
                        Circle::new((p, m), 2, color.filled())
                    }))
                    .map_err(render_err)?;
                if let Some(bar_area) = bar_area {
                    draw_colorbar(&bar_area, t_lo, t_hi, time_label)?;
                }
            }
            _ => {
                chart
                    .draw_series(
                        points
                            .iter()
                            .map(|&(p, m, _, _)| Circle::new((p, m), 2, POINT_COLOR.filled())),
                    )
                    .map_err(render_err)?;
            }
        }
        root.present().map_err(render_err)?;
    }
    Ok(svg)
}

fn draw_error_bars<DB: DrawingBackend>(
    chart: &mut ChartContext<'_, DB, Cartesian2d<RangedCoordf64, RangedCoordf64>>,
    points: impl Iterator<Item = (f64, f64, f64)>,
) -> Result<(), FigureError> {
    chart
        .draw_series(points.filter(|&(_, _, e)| e.is_finite() && e > 0.0).map(
            |(x, m, e)| {
                PathElement::new(vec![(x, m - e), (x, m + e)], POINT_COLOR.mix(0.4))
            },
        ))
        .map_err(render_err)?;
    Ok(())
}

fn draw_colorbar<DB: DrawingBackend>(
    area: &DrawingArea<DB, plotters::coord::Shift>,
    t_lo: f64,
    t_hi: f64,
    time_label: &str,
) -> Result<(), FigureError> {
    let mut bar = ChartBuilder::on(area)
        .margin(10)
        .x_label_area_size(0)
        .y_label_area_size(55)
        .build_cartesian_2d(0.0f64..1.0f64, t_lo..t_hi)
        .map_err(render_err)?;
    bar.configure_mesh()
        .disable_mesh()
        .disable_x_axis()
        .y_desc(time_label)
        .y_label_formatter(&|v| format!("{v:.0}"))
        .draw()
        .map_err(render_err)?;

    let steps = 64;
    let dt = (t_hi - t_lo) / steps as f64;
    bar.draw_series((0..steps).map(|i| {
        let lo = t_lo + i as f64 * dt;
        let color = ViridisRGB.get_color_normalized(lo + dt / 2.0, t_lo, t_hi);
        Rectangle::new([(0.0, lo), (1.0, lo + dt)], color.filled())
    }))
    .map_err(render_err)?;
    Ok(())
}
