//! PNG chart rendering on top of plotters' bitmap backend.
//!
//! Text needs a TrueType font registered through [`load_font`]. When none
//! could be loaded every chart is still drawn, just without captions,
//! axis labels or value annotations.

use std::{error::Error, f64::consts::TAU, path::Path};

use once_cell::sync::OnceCell;
use plotters::{
    coord::Shift,
    prelude::*,
    style::{
        register_font,
        text_anchor::{HPos, Pos, VPos},
        FontDesc, FontStyle,
    },
};

pub type DrawResult = Result<(), Box<dyn Error>>;

const FONT: &str = "sans-serif";
const SIZE: (u32, u32) = (1000, 600);
const PIE_SIZE: (u32, u32) = (800, 800);
const PIE_START_DEGREES: f64 = 140.0;
const MAX_LABEL_CHARS: usize = 22;

const PALETTE: [RGBColor; 10] = [
    RGBColor(161, 201, 244),
    RGBColor(255, 180, 130),
    RGBColor(141, 229, 161),
    RGBColor(255, 159, 155),
    RGBColor(208, 187, 255),
    RGBColor(222, 187, 155),
    RGBColor(250, 176, 228),
    RGBColor(207, 207, 207),
    RGBColor(255, 254, 163),
    RGBColor(185, 242, 240),
];
const CORAL: RGBColor = RGBColor(255, 127, 80);
const PURPLE: RGBColor = RGBColor(128, 0, 128);
const SCATTER_GREEN: RGBColor = RGBColor(0, 128, 0);

static FONT_LOADED: OnceCell<bool> = OnceCell::new();

/// Register the first readable font from `paths`; returns whether text is available.
///
/// Only the first call does any work.
pub fn load_font(paths: &[String]) -> bool {
    *FONT_LOADED.get_or_init(|| {
        for path in paths {
            let Ok(bytes) = std::fs::read(path) else {
                continue;
            };
            // Registered fonts must live for the rest of the process
            let bytes: &'static [u8] = Box::leak(bytes.into_boxed_slice());
            match register_font(FONT, FontStyle::Normal, bytes) {
                Ok(()) => {
                    tracing::debug!(font = %path, "chart font registered");
                    return true;
                }
                Err(_) => tracing::warn!(font = %path, "unusable chart font"),
            }
        }
        tracing::warn!("no TrueType font found, charts are rendered without text");
        false
    })
}

/// Caption and axis descriptions of a chart
#[derive(Debug, Clone, Copy)]
pub struct Labels<'a> {
    pub title: &'a str,
    pub x: &'a str,
    pub y: &'a str,
}

/// How bar values are annotated
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValueFormat {
    Integer,
    OneDecimal,
}

impl ValueFormat {
    pub fn apply(self, value: f64) -> String {
        match self {
            ValueFormat::Integer => format!("{}", value.round() as i64),
            ValueFormat::OneDecimal => format!("{value:.1}"),
        }
    }
}

fn axis_max(values: impl Iterator<Item = f64>) -> f64 {
    (values.fold(0.0_f64, f64::max) * 1.15).max(1.0)
}

fn truncate(label: &str) -> String {
    if label.chars().count() <= MAX_LABEL_CHARS {
        label.to_string()
    } else {
        let mut short: String = label.chars().take(MAX_LABEL_CHARS - 3).collect();
        short.push_str("...");
        short
    }
}

fn segment_label(value: &SegmentValue<usize>, names: &[String]) -> String {
    match value {
        SegmentValue::CenterOf(i) => names.get(*i).map(|n| truncate(n)).unwrap_or_default(),
        _ => String::new(),
    }
}

fn anchored(font: FontDesc<'static>, h: HPos, v: VPos) -> TextStyle<'static> {
    font.color(&BLACK).pos(Pos::new(h, v))
}

/// Share of each label as pie slices, first slice starting at 140 degrees
pub fn pie(path: &Path, title: &str, data: &[(String, f64)], text: bool) -> DrawResult {
    let root = BitMapBackend::new(path, PIE_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    if text {
        let area = root.titled(title, (FONT, 28).into_font())?;
        draw_pie(&area, data, text)?;
    } else {
        draw_pie(&root, data, text)?;
    }

    root.present()?;
    Ok(())
}

fn draw_pie(area: &DrawingArea<BitMapBackend<'_>, Shift>, data: &[(String, f64)], text: bool) -> DrawResult {
    let (width, height) = area.dim_in_pixel();
    let center = (width as i32 / 2, height as i32 / 2);
    let radius = f64::from(width.min(height)) * 0.35;
    let sizes: Vec<f64> = data.iter().map(|(_, value)| *value).collect();
    if sizes.iter().sum::<f64>() <= 0.0 {
        return Ok(());
    }
    let colors: Vec<RGBColor> = (0..data.len()).map(|i| PALETTE[i % PALETTE.len()]).collect();

    // Screen y grows downwards: -140 degrees is the upper left
    if text {
        let names: Vec<String> = data.iter().map(|(label, _)| truncate(label)).collect();
        let mut pie = Pie::new(&center, &radius, &sizes, &colors, &names);
        pie.start_angle(-PIE_START_DEGREES);
        pie.label_style((FONT, 16).into_font().color(&BLACK));
        pie.percentages((FONT, 14).into_font().color(&BLACK));
        area.draw(&pie)?;
    } else {
        // Pie lays out its labels unconditionally, which needs a font
        let total: f64 = sizes.iter().sum();
        let mut start = -PIE_START_DEGREES.to_radians();
        for (size, color) in sizes.iter().zip(&colors) {
            let sweep = size / total * TAU;
            let steps = (sweep.to_degrees().ceil() as usize).max(1);
            let mut points = vec![center];
            points.extend((0..=steps).map(|s| {
                let angle = start + sweep * s as f64 / steps as f64;
                (
                    center.0 + (radius * angle.cos()).round() as i32,
                    center.1 + (radius * angle.sin()).round() as i32,
                )
            }));
            area.draw(&Polygon::new(points, color.filled()))?;
            start += sweep;
        }
    }
    Ok(())
}

/// One bar per label, growing upwards, annotated with its value
pub fn vertical_bars(
    path: &Path,
    labels: Labels<'_>,
    data: &[(String, f64)],
    format: ValueFormat,
    text: bool,
) -> DrawResult {
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let names: Vec<String> = data.iter().map(|(name, _)| name.clone()).collect();
    let max = axis_max(data.iter().map(|(_, value)| *value));

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if text {
        builder
            .caption(labels.title, (FONT, 28).into_font())
            .x_label_area_size(60)
            .y_label_area_size(70);
    }
    let mut chart = builder.build_cartesian_2d((0..data.len()).into_segmented(), 0.0..max)?;

    if text {
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(data.len())
            .x_label_formatter(&|v| segment_label(v, &names))
            .x_desc(labels.x)
            .y_desc(labels.y)
            .label_style((FONT, 13).into_font())
            .draw()?;
    }

    chart.draw_series(data.iter().enumerate().map(|(i, (_, value))| {
        let mut bar = Rectangle::new(
            [(SegmentValue::Exact(i), 0.0), (SegmentValue::Exact(i + 1), *value)],
            PALETTE[i % PALETTE.len()].filled(),
        );
        bar.set_margin(0, 0, 10, 10);
        bar
    }))?;

    if text {
        chart.draw_series(data.iter().enumerate().map(|(i, (_, value))| {
            Text::new(
                format.apply(*value),
                (SegmentValue::CenterOf(i), *value + max * 0.01),
                anchored((FONT, 13).into_font(), HPos::Center, VPos::Bottom),
            )
        }))?;
    }

    root.present()?;
    Ok(())
}

/// One bar per label, growing rightwards, first label on top
pub fn horizontal_bars(
    path: &Path,
    labels: Labels<'_>,
    data: &[(String, f64)],
    format: ValueFormat,
    text: bool,
) -> DrawResult {
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let rows = data.len();
    // Row 0 sits at the bottom of the axis
    let names: Vec<String> = data.iter().rev().map(|(name, _)| name.clone()).collect();
    let max = axis_max(data.iter().map(|(_, value)| *value));

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if text {
        builder
            .caption(labels.title, (FONT, 28).into_font())
            .x_label_area_size(50)
            .y_label_area_size(190);
    }
    let mut chart = builder.build_cartesian_2d(0.0..max, (0..rows).into_segmented())?;

    if text {
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(rows)
            .y_label_formatter(&|v| segment_label(v, &names))
            .x_desc(labels.x)
            .y_desc(labels.y)
            .label_style((FONT, 13).into_font())
            .draw()?;
    }

    chart.draw_series(data.iter().enumerate().map(|(i, (_, value))| {
        let row = rows - 1 - i;
        let mut bar = Rectangle::new(
            [(0.0, SegmentValue::Exact(row)), (*value, SegmentValue::Exact(row + 1))],
            PALETTE[i % PALETTE.len()].filled(),
        );
        bar.set_margin(6, 6, 0, 0);
        bar
    }))?;

    if text {
        chart.draw_series(data.iter().enumerate().map(|(i, (_, value))| {
            Text::new(
                format.apply(*value),
                (*value + max * 0.01, SegmentValue::CenterOf(rows - 1 - i)),
                anchored((FONT, 13).into_font(), HPos::Left, VPos::Center),
            )
        }))?;
    }

    root.present()?;
    Ok(())
}

/// Filled area under a year/count line
pub fn area(path: &Path, labels: Labels<'_>, data: &[(i64, f64)], text: bool) -> DrawResult {
    let points: Vec<(f64, f64)> = data.iter().map(|(x, y)| (*x as f64, *y)).collect();
    filled_curve(path, labels, &points, CORAL, 0.5, ValueFormat::Integer, text)
}

/// Filled density curve
pub fn density(path: &Path, labels: Labels<'_>, curve: &[(f64, f64)], text: bool) -> DrawResult {
    filled_curve(path, labels, curve, PURPLE, 0.6, ValueFormat::OneDecimal, text)
}

fn filled_curve(
    path: &Path,
    labels: Labels<'_>,
    points: &[(f64, f64)],
    color: RGBColor,
    opacity: f64,
    x_format: ValueFormat,
    text: bool,
) -> DrawResult {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return Err("no points to draw".into());
    };
    let (x_min, x_max) = if first.0 < last.0 {
        (first.0, last.0)
    } else {
        (first.0 - 1.0, first.0 + 1.0)
    };
    let y_max = points.iter().map(|(_, y)| *y).fold(0.0_f64, f64::max) * 1.15;
    let y_max = if y_max > 0.0 { y_max } else { 1.0 };

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if text {
        builder
            .caption(labels.title, (FONT, 28).into_font())
            .x_label_area_size(50)
            .y_label_area_size(70);
    }
    let mut chart = builder.build_cartesian_2d(x_min..x_max, 0.0..y_max)?;

    if text {
        chart
            .configure_mesh()
            .x_label_formatter(&|x| x_format.apply(*x))
            .x_desc(labels.x)
            .y_desc(labels.y)
            .label_style((FONT, 13).into_font())
            .draw()?;
    }

    chart.draw_series(
        AreaSeries::new(points.iter().copied(), 0.0, color.mix(opacity).filled())
            .border_style(color.stroke_width(2)),
    )?;

    root.present()?;
    Ok(())
}

/// One marker per label
pub fn scatter(path: &Path, labels: Labels<'_>, data: &[(String, f64)], text: bool) -> DrawResult {
    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let names: Vec<String> = data.iter().map(|(name, _)| name.clone()).collect();
    let max = axis_max(data.iter().map(|(_, value)| *value));

    let mut builder = ChartBuilder::on(&root);
    builder.margin(20);
    if text {
        builder
            .caption(labels.title, (FONT, 28).into_font())
            .x_label_area_size(60)
            .y_label_area_size(70);
    }
    let mut chart = builder.build_cartesian_2d((0..data.len()).into_segmented(), 0.0..max)?;

    if text {
        chart
            .configure_mesh()
            .x_labels(data.len())
            .x_label_formatter(&|v| segment_label(v, &names))
            .x_desc(labels.x)
            .y_desc(labels.y)
            .label_style((FONT, 13).into_font())
            .draw()?;
    }

    chart.draw_series(data.iter().enumerate().map(|(i, (_, value))| {
        Circle::new((SegmentValue::CenterOf(i), *value), 7, SCATTER_GREEN.filled())
    }))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_formats() {
        assert_eq!(ValueFormat::Integer.apply(3.0), "3");
        assert_eq!(ValueFormat::OneDecimal.apply(4.25), "4.2");
        assert_eq!(ValueFormat::OneDecimal.apply(5.0), "5.0");
    }

    #[test]
    fn long_labels_are_shortened() {
        assert_eq!(truncate("Rayuela"), "Rayuela");
        let short = truncate("Cien años de soledad, edición conmemorativa");
        assert_eq!(short.chars().count(), MAX_LABEL_CHARS);
        assert!(short.ends_with("..."));
    }

    #[test]
    fn axis_leaves_headroom() {
        assert!((axis_max([2.0, 4.0].into_iter()) - 4.6).abs() < 1e-9);
        assert_eq!(axis_max(std::iter::empty()), 1.0);
    }

    #[test]
    fn textless_bars_render_to_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bars.png");
        let data = vec![("Borges".to_string(), 3.0), ("Cortázar".to_string(), 1.0)];
        let labels = Labels {
            title: "t",
            x: "x",
            y: "y",
        };

        vertical_bars(&path, labels, &data, ValueFormat::Integer, false).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn textless_pie_renders_to_png() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pie.png");
        let data = vec![("Novela".to_string(), 2.0), ("Poesía".to_string(), 1.0)];

        pie(&path, "t", &data, false).unwrap();
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn labelled_pie_renders_with_a_system_font() {
        let paths = biblioteca_kernel::settings::Settings::default().reports.font_paths;
        if !load_font(&paths) {
            return;
        }
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("pie.png");
        let data = vec![
            ("Novela".to_string(), 5.0),
            ("Poesía".to_string(), 3.0),
            ("Ensayo".to_string(), 0.0),
        ];

        pie(&path, "Distribución de Libros por Género", &data, true).unwrap();
        let bytes = std::fs::read(&path).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }
}
