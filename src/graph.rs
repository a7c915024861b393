use anyhow::{Context, Result};
use image::ImageEncoder;
use plotters::prelude::*;

use crate::ir::{LegendState, Series, SeriesModel};
use crate::palette::parse_color;
use crate::RenderOptions;

/// Total width of one bin's bar group, in bin-index units.
const GROUP_WIDTH: f64 = 0.8;

/// Draw a series model as a dodged bar chart with vertical threshold markers
/// and encode it as PNG.
///
/// Series hidden in `legend_state` are skipped. Marker positions are in bin
/// index units; bin `i` spans `[i, i + 1)` on the drawing axis.
pub fn render_png(model: &SeriesModel, legend_state: &LegendState, options: &RenderOptions) -> Result<Vec<u8>> {
    let (width, height) = (options.width, options.height);
    if width == 0 || height == 0 {
        anyhow::bail!("Cannot render a {}x{} image", width, height);
    }
    let Some(buffer_len) = (width as usize)
        .checked_mul(height as usize)
        .and_then(|pixels| pixels.checked_mul(3))
    else {
        anyhow::bail!("Image size {}x{} is too large", width, height);
    };
    let mut buffer = vec![0u8; buffer_len];

    {
        let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
        root.fill(&WHITE).context("Failed to fill background")?;

        let visible = |s: &&Series| legend_state.get(&s.name).copied().unwrap_or(true);
        let bars: Vec<&Series> = model.bar_series().filter(visible).collect();
        let markers: Vec<&Series> = model.reference_series().filter(visible).collect();

        let categories = &model.x_axis.labels;
        let num_categories = categories.len().max(1);
        let y_max = bars
            .iter()
            .flat_map(|s| s.data.iter().copied())
            .filter(|v| v.is_finite())
            .fold(0.0_f64, f64::max);
        let y_max = if y_max > 0.0 { y_max * 1.1 } else { 1.0 };

        let mut chart = ChartBuilder::on(&root)
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(60)
            .build_cartesian_2d(0.0..(num_categories as f64), 0.0..y_max)
            .context("Failed to build chart")?;

        let x_formatter = |x: &f64| {
            let idx = *x as usize;
            categories.get(idx).cloned().unwrap_or_default()
        };
        let y_format = model.y_axis.format;
        let y_formatter = |y: &f64| y_format.format(*y);

        let mut mesh = chart.configure_mesh();
        mesh.x_labels(num_categories)
            .x_label_formatter(&x_formatter)
            .y_label_formatter(&y_formatter);
        if let Some(title) = &model.x_axis.title {
            mesh.x_desc(title.as_str());
        }
        if let Some(title) = &model.y_axis.title {
            mesh.y_desc(title.as_str());
        }
        mesh.draw().context("Failed to draw mesh")?;

        // Side-by-side bars, one slot per visible series
        let bar_width = GROUP_WIDTH / bars.len().max(1) as f64;
        for (series_idx, series) in bars.iter().enumerate() {
            let color = parse_color(&series.color).unwrap_or(BLUE);
            let offset = (series_idx as f64 - (bars.len() as f64 - 1.0) / 2.0) * bar_width;
            let rects = series.data.iter().enumerate().map(|(cat_idx, &y_val)| {
                let x_center = cat_idx as f64 + 0.5 + offset;
                Rectangle::new(
                    [
                        (x_center - bar_width / 2.0, 0.0),
                        (x_center + bar_width / 2.0, y_val.max(0.0)),
                    ],
                    color.filled(),
                )
            });
            chart
                .draw_series(rects)
                .context("Failed to draw bars")?
                .label(series.name.clone())
                .legend(move |(x, y)| Rectangle::new([(x, y - 5), (x + 10, y + 5)], color.filled()));

            if series.label_visible {
                let style = ("sans-serif", 12).into_font().color(&BLACK);
                let labels = series.data.iter().enumerate().map(|(cat_idx, &y_val)| {
                    let x_center = cat_idx as f64 + 0.5 + offset;
                    Text::new(y_format.format(y_val), (x_center, y_val.max(0.0)), style.clone())
                });
                chart.draw_series(labels).context("Failed to draw value labels")?;
            }
        }

        // Threshold markers
        for marker in markers {
            let Some(mark) = &marker.mark_line else { continue };
            let color = parse_color(&marker.color).unwrap_or(BLACK);
            let x = mark.position + 0.5;
            chart
                .draw_series(LineSeries::new(vec![(x, 0.0), (x, y_max)], color.stroke_width(2)))
                .context("Failed to draw threshold marker")?
                .label(marker.name.clone())
                .legend(move |(x, y)| PathElement::new(vec![(x, y), (x + 10, y)], color.stroke_width(2)));
            chart
                .draw_series(std::iter::once(Text::new(
                    mark.label.clone(),
                    (x, y_max * 0.97),
                    ("sans-serif", 12).into_font().color(&color),
                )))
                .context("Failed to draw threshold label")?;
        }

        if model.legend.show && !model.series.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperRight)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .context("Failed to draw legend")?;
        }

        root.present().context("Failed to present drawing")?;
    }

    let mut png_bytes = Vec::new();
    image::codecs::png::PngEncoder::new(&mut png_bytes)
        .write_image(&buffer, width, height, image::ColorType::Rgb8)
        .context("Failed to encode PNG")?;

    Ok(png_bytes)
}
