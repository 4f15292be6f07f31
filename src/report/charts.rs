use std::fmt::Display;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use plotters::coord::Shift;
use plotters::prelude::*;
use tracing::{debug, info};

const SIZE: (u32, u32) = (1000, 600);
const FONT: &str = "sans-serif";
const CLOUD_COLORS: [RGBColor; 5] = [
    RGBColor(31, 119, 180),
    RGBColor(255, 127, 14),
    RGBColor(44, 160, 44),
    RGBColor(214, 39, 40),
    RGBColor(148, 103, 189),
];

fn draw_err<E: Display>(e: E) -> anyhow::Error {
    anyhow!("chart drawing failed: {}", e)
}

/// One bar per `(label, count)`, left to right. Returns `None` when there is nothing to draw.
pub fn bar_chart(
    path: &Path,
    caption: &str,
    x_desc: &str,
    bars: &[(String, usize)],
) -> Result<Option<PathBuf>> {
    if bars.is_empty() {
        info!(chart = %path.display(), "no data, chart skipped");
        return Ok(None);
    }

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;

    let top = bars.iter().map(|(_, n)| *n).max().unwrap_or(0) as u32;
    let y_max = top + top / 10 + 1;
    let mut chart = ChartBuilder::on(&root)
        .caption(caption, (FONT, 28))
        .margin(20)
        .x_label_area_size(50)
        .y_label_area_size(60)
        .build_cartesian_2d((0u32..bars.len() as u32).into_segmented(), 0u32..y_max)
        .map_err(draw_err)?;

    let label = |v: &SegmentValue<u32>| match v {
        SegmentValue::CenterOf(i) | SegmentValue::Exact(i) => bars
            .get(*i as usize)
            .map(|(l, _)| l.clone())
            .unwrap_or_default(),
        SegmentValue::Last => String::new(),
    };
    chart
        .configure_mesh()
        .disable_x_mesh()
        .x_labels(bars.len())
        .x_label_formatter(&label)
        .x_desc(x_desc)
        .y_desc("Frequency")
        .axis_desc_style((FONT, 16))
        .draw()
        .map_err(draw_err)?;

    chart
        .draw_series(
            Histogram::vertical(&chart)
                .style(BLUE.mix(0.6).filled())
                .margin(12)
                .data(bars.iter().enumerate().map(|(i, (_, n))| (i as u32, *n as u32))),
        )
        .map_err(draw_err)?;

    root.present().map_err(draw_err)?;
    debug!(chart = %path.display(), bars = bars.len(), "bar chart written");
    Ok(Some(path.to_path_buf()))
}

/// Words laid out in rows, font size proportional to frequency.
pub fn word_cloud(path: &Path, words: &[(String, usize)]) -> Result<Option<PathBuf>> {
    let Some(top) = words.first().map(|(_, n)| *n) else {
        info!(chart = %path.display(), "no words, word cloud skipped");
        return Ok(None);
    };

    let root = BitMapBackend::new(path, SIZE).into_drawing_area();
    root.fill(&WHITE).map_err(draw_err)?;
    place_words(&root, words, top)?;
    root.present().map_err(draw_err)?;

    debug!(chart = %path.display(), words = words.len(), "word cloud written");
    Ok(Some(path.to_path_buf()))
}

fn place_words<DB: DrawingBackend>(
    area: &DrawingArea<DB, Shift>,
    words: &[(String, usize)],
    top: usize,
) -> Result<()> {
    let (width, height) = area.dim_in_pixel();
    let (width, height) = (width as i32, height as i32);
    let pad = 10;
    let (mut x, mut y, mut row_height) = (pad, pad, 0);

    for (i, (word, count)) in words.iter().enumerate() {
        let size = 14.0 + 58.0 * (*count as f64 / top as f64);
        let color = CLOUD_COLORS[i % CLOUD_COLORS.len()];
        let style = (FONT, size).into_font().color(&color);
        let (w, h) = area.estimate_text_size(word, &style).map_err(draw_err)?;
        let (w, h) = (w as i32, h as i32);

        if x + w > width - pad {
            x = pad;
            y += row_height + pad / 2;
            row_height = 0;
        }
        if y + h > height - pad {
            break;
        }
        area.draw(&Text::new(word.as_str(), (x, y), style))
            .map_err(draw_err)?;
        x += w + pad;
        row_height = row_height.max(h);
    }
    Ok(())
}
