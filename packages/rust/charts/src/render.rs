//! Chart rendering capability and the built-in PNG bar chart.

use std::io::Cursor;

use askdata_shared::{AskDataError, Result};
use image::{DynamicImage, ImageOutputFormat, Rgb, RgbImage};
use tracing::debug;

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([64, 64, 64]);
const GRID: Rgb<u8> = Rgb([225, 225, 225]);
const BAR: Rgb<u8> = Rgb([135, 206, 235]);

/// Fraction of the plot height left empty above the bar.
const HEADROOM: f64 = 0.1;

/// Turns a single labelled value into image bytes.
pub trait ChartRenderer: Send + Sync {
    /// Render `value` as a chart. Returns encoded image bytes.
    fn render(&self, label: &str, value: f64, title: &str) -> Result<Vec<u8>>;
}

/// Single-bar chart encoded as PNG.
///
/// The bar grows from the zero baseline, so negative values point down.
/// Text is not rasterized: label and title travel with the response and the
/// persisted file name instead.
#[derive(Debug, Clone)]
pub struct BarChartRenderer {
    width: u32,
    height: u32,
}

impl BarChartRenderer {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for BarChartRenderer {
    fn default() -> Self {
        Self::new(640, 480)
    }
}

impl ChartRenderer for BarChartRenderer {
    fn render(&self, label: &str, value: f64, title: &str) -> Result<Vec<u8>> {
        if !value.is_finite() {
            return Err(AskDataError::Render(format!("cannot chart non-finite value {value}")));
        }
        if self.width < 32 || self.height < 32 {
            return Err(AskDataError::Render(format!(
                "canvas {}x{} is too small",
                self.width, self.height
            )));
        }

        let mut img = RgbImage::from_pixel(self.width, self.height, BACKGROUND);

        let margin_x = self.width / 8;
        let margin_y = self.height / 8;
        let left = margin_x;
        let right = self.width - margin_x;
        let top = margin_y;
        let bottom = self.height - margin_y;
        let plot_h = f64::from(bottom - top);

        let lo = value.min(0.0);
        let hi = value.max(0.0);
        let span = (if hi > lo { hi - lo } else { 1.0 }) * (1.0 + HEADROOM);
        let y_of = |v: f64| -> u32 {
            let frac = (v - lo) / span;
            let y = f64::from(bottom) - frac * plot_h;
            y.round().clamp(f64::from(top), f64::from(bottom)) as u32
        };

        for quarter in 1..=4 {
            let y = bottom - (bottom - top) * quarter / 4;
            fill_rect(&mut img, left, y, right, y + 1, GRID);
        }

        let baseline = y_of(0.0);
        let bar_top = y_of(value);
        let (y0, y1) = if bar_top <= baseline {
            (bar_top, baseline)
        } else {
            (baseline, bar_top)
        };
        let bar_left = self.width * 35 / 100;
        let bar_right = self.width * 65 / 100;
        fill_rect(&mut img, bar_left, y0, bar_right, y1.max(y0 + 1), BAR);

        // Axes: y on the left edge, x along the zero baseline.
        fill_rect(&mut img, left, top, left + 2, bottom, AXIS);
        fill_rect(&mut img, left, baseline, right, baseline + 2, AXIS);

        let mut bytes = Vec::new();
        DynamicImage::ImageRgb8(img)
            .write_to(&mut Cursor::new(&mut bytes), ImageOutputFormat::Png)
            .map_err(|e| AskDataError::Render(e.to_string()))?;

        debug!(label, title, value, bytes = bytes.len(), "chart rendered");
        Ok(bytes)
    }
}

/// Paint the half-open rectangle `[x0, x1) × [y0, y1)`, clipped to the image.
fn fill_rect(img: &mut RgbImage, x0: u32, y0: u32, x1: u32, y1: u32, color: Rgb<u8>) {
    let x1 = x1.min(img.width());
    let y1 = y1.min(img.height());
    for y in y0..y1 {
        for x in x0..x1 {
            img.put_pixel(x, y, color);
        }
    }
}
