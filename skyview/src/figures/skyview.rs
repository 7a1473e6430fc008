//! The pixel stamp figure: per-pixel flux heat map, pipeline aperture
//! outline and catalog markers, all in pixel coordinates.

use catalogs::{MarkerShape, MarkerStyle};
use ndarray::Array2;
use plotters::prelude::*;
use plotters::style::colors::colormaps::{ColorMap, ViridisRGB};

use super::{render_err, FigureError};

const FIGURE_SIZE: (u32, u32) = (640, 600);

/// One marker in zero-based pixel coordinates.
#[derive(Debug, Clone, Copy)]
pub struct Marker {
    pub x: f64,
    pub y: f64,
    pub radius: u32,
}

/// All markers of one catalog, drawn in that catalog's style.
#[derive(Debug, Clone)]
pub struct SkyviewOverlay {
    pub label: String,
    pub style: MarkerStyle,
    pub markers: Vec<Marker>,
}

fn hex_color(hex: &str) -> RGBColor {
    let value = u32::from_str_radix(hex.trim_start_matches('#'), 16).unwrap_or(0);
    RGBColor((value >> 16) as u8, (value >> 8) as u8, value as u8)
}

/// Flux range used for the color stretch. Clipping at the 1st and 99th
/// percentile keeps one saturated pixel from washing out the stamp.
fn stretch_range(frame: &Array2<f64>) -> Option<(f64, f64)> {
    let mut finite: Vec<f64> = frame.iter().copied().filter(|v| v.is_finite()).collect();
    if finite.is_empty() {
        return None;
    }
    finite.sort_by(|a, b| a.total_cmp(b));
    let pick = |q: f64| finite[((finite.len() - 1) as f64 * q).round() as usize];
    let (lo, hi) = (pick(0.01), pick(0.99));
    if hi > lo {
        Some((lo, hi))
    } else {
        Some((lo, lo + 1.0))
    }
}

/// Edge segments of the aperture mask that border an unmasked pixel.
fn aperture_outline(mask: &Array2<bool>) -> Vec<[(f64, f64); 2]> {
    let (rows, cols) = mask.dim();
    let masked = |r: i64, c: i64| {
        r >= 0 && c >= 0 && (r as usize) < rows && (c as usize) < cols && mask[[r as usize, c as usize]]
    };
    let mut segments = Vec::new();
    for r in 0..rows as i64 {
        for c in 0..cols as i64 {
            if !masked(r, c) {
                continue;
            }
            let (x, y) = (c as f64, r as f64);
            if !masked(r - 1, c) {
                segments.push([(x - 0.5, y - 0.5), (x + 0.5, y - 0.5)]);
            }
            if !masked(r + 1, c) {
                segments.push([(x - 0.5, y + 0.5), (x + 0.5, y + 0.5)]);
            }
            if !masked(r, c - 1) {
                segments.push([(x - 0.5, y - 0.5), (x - 0.5, y + 0.5)]);
            }
            if !masked(r, c + 1) {
                segments.push([(x + 0.5, y - 0.5), (x + 0.5, y + 0.5)]);
            }
        }
    }
    segments
}

/// Render the stamp heat map with aperture outline and catalog overlays to
/// an SVG string.
pub fn render_skyview_svg(
    frame: &Array2<f64>,
    aperture: Option<&Array2<bool>>,
    overlays: &[SkyviewOverlay],
    title: &str,
) -> Result<String, FigureError> {
    let (rows, cols) = frame.dim();
    let (lo, hi) =
        stretch_range(frame).ok_or_else(|| FigureError::Empty("no finite pixels".to_string()))?;

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, FIGURE_SIZE).into_drawing_area();
        root.fill(&WHITE).map_err(render_err)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(title, ("sans-serif", 18))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(50)
            .build_cartesian_2d(
                -0.5f64..cols as f64 - 0.5,
                -0.5f64..rows as f64 - 0.5,
            )
            .map_err(render_err)?;
        chart
            .configure_mesh()
            .disable_mesh()
            .x_desc("Pixel Column Number")
            .y_desc("Pixel Row Number")
            .x_label_formatter(&|v| format!("{v:.0}"))
            .y_label_formatter(&|v| format!("{v:.0}"))
            .draw()
            .map_err(render_err)?;

        chart
            .draw_series(frame.indexed_iter().map(|((r, c), &flux)| {
                let t = if flux.is_finite() {
                    ((flux - lo) / (hi - lo)).clamp(0.0, 1.0)
                } else {
                    0.0
                };
                let color = ViridisRGB.get_color(t);
                let (x, y) = (c as f64, r as f64);
                Rectangle::new([(x - 0.5, y - 0.5), (x + 0.5, y + 0.5)], color.filled())
            }))
            .map_err(render_err)?;

        if let Some(mask) = aperture {
            chart
                .draw_series(
                    aperture_outline(mask)
                        .into_iter()
                        .map(|seg| PathElement::new(seg.to_vec(), WHITE.stroke_width(2))),
                )
                .map_err(render_err)?;
        }

        for overlay in overlays {
            let color = hex_color(overlay.style.color);
            let markers = overlay.markers.clone();
            let label = format!("{} ({})", overlay.label, markers.len());
            match overlay.style.shape {
                MarkerShape::Circle => {
                    let fill = color.mix(overlay.style.fill_alpha);
                    chart
                        .draw_series(markers.into_iter().map(move |m| {
                            Circle::new((m.x, m.y), m.radius, fill.filled())
                        }))
                        .map_err(render_err)?
                        .label(label)
                        .legend(move |(x, y)| Circle::new((x, y), 4, color.filled()));
                }
                MarkerShape::Cross => {
                    chart
                        .draw_series(markers.into_iter().map(move |m| {
                            Cross::new((m.x, m.y), m.radius, color.stroke_width(2))
                        }))
                        .map_err(render_err)?
                        .label(label)
                        .legend(move |(x, y)| Cross::new((x, y), 4, color.stroke_width(2)));
                }
            }
        }

        if !overlays.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(render_err)?;
        }

        root.present().map_err(render_err)?;
    }
    Ok(svg)
}
