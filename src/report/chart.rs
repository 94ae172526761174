//! Grouped bar chart comparing compression methods.

use std::fmt::Write as _;
use std::path::Path;

use image::{DynamicImage, Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_hollow_rect_mut, draw_line_segment_mut};
use imageproc::rect::Rect;

use crate::error::{Error, Result};
use crate::image::save_image;

/// Metric groups along the x axis.
pub const METRICS: [&str; 3] = ["PSNR (dB)", "SSIM", "Compression Ratio"];

/// Fraction of a group's width taken by one bar.
pub const BAR_WIDTH: f32 = 0.25;

const LIGHT_CORAL: Rgb<u8> = Rgb([240, 128, 128]);
const LIGHT_BLUE: Rgb<u8> = Rgb([173, 216, 230]);
const MEDIUM_SEA_GREEN: Rgb<u8> = Rgb([60, 179, 113]);

const BACKGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const AXIS: Rgb<u8> = Rgb([0, 0, 0]);
const GRID: Rgb<u8> = Rgb([178, 178, 178]);

/// Upper bound on dashed grid lines.
const MAX_TICKS: usize = 20;

/// Left, top, right, bottom margins around the plot area.
const MARGINS: (u32, u32, u32, u32) = (60, 40, 20, 50);

/// One method's scores across [`METRICS`].
#[derive(Debug, Clone, PartialEq)]
pub struct MethodScores {
    pub name: &'static str,
    pub color: Rgb<u8>,
    pub values: [f32; 3],
}

/// Illustrative scores for medical image compression. These are report
/// figures, not measurements of a trained model.
#[must_use]
pub fn reference_scores() -> [MethodScores; 3] {
    [
        MethodScores {
            name: "JPEG",
            color: LIGHT_CORAL,
            values: [35.2, 0.89, 10.5],
        },
        MethodScores {
            name: "Autoencoder",
            color: LIGHT_BLUE,
            values: [42.7, 0.96, 13.2],
        },
        MethodScores {
            name: "Hybrid",
            color: MEDIUM_SEA_GREEN,
            values: [49.0, 0.99, 15.0],
        },
    ]
}

/// A laid-out bar, in pixel coordinates of the rendered chart.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    /// Index into [`METRICS`].
    pub group: usize,
    /// Index into the chart's methods.
    pub method: usize,
    /// Plotted value, exactly as given.
    pub value: f32,
    pub left: u32,
    pub top: u32,
    pub width: u32,
    pub height: u32,
}

/// "Comparison of Compression Methods on Medical Images".
#[derive(Debug, Clone)]
pub struct ComparisonChart {
    methods: Vec<MethodScores>,
    width: u32,
    height: u32,
}

impl Default for ComparisonChart {
    fn default() -> Self {
        Self {
            methods: reference_scores().to_vec(),
            width: 1000,
            height: 600,
        }
    }
}

impl ComparisonChart {
    /// Build a chart of `methods` rendered at `width` x `height` pixels.
    ///
    /// # Errors
    ///
    /// Returns an error if there are no methods, a value is negative or not
    /// finite, or the canvas is too small for the margins.
    pub fn new(methods: Vec<MethodScores>, width: u32, height: u32) -> Result<Self> {
        if methods.is_empty() {
            return Err(Error::invalid("methods", "at least one method is required"));
        }

        if methods
            .iter()
            .flat_map(|m| m.values)
            .any(|v| !v.is_finite() || v < 0.0)
        {
            return Err(Error::invalid("values", "must be finite and non-negative"));
        }

        let (left, top, right, bottom) = MARGINS;
        if width <= left + right + 10 || height <= top + bottom + 10 {
            return Err(Error::UnsupportedDimensions {
                width: width as usize,
                height: height as usize,
                reason: "too small for the chart margins".to_string(),
            });
        }

        Ok(Self {
            methods,
            width,
            height,
        })
    }

    #[must_use]
    pub fn methods(&self) -> &[MethodScores] {
        &self.methods
    }

    fn plot_area(&self) -> (f32, f32, f32, f32) {
        let (left, top, right, bottom) = MARGINS;
        (
            left as f32,
            top as f32,
            (self.width - left - right) as f32,
            (self.height - top - bottom) as f32,
        )
    }

    /// Top of the value axis: the largest value plus a 5% margin.
    fn y_max(&self) -> f32 {
        let max = self
            .methods
            .iter()
            .flat_map(|m| m.values)
            .fold(0.0_f32, f32::max);
        if max > 0.0 {
            max * 1.05
        } else {
            1.0
        }
    }

    /// Bars grouped by metric, methods in order within each group.
    ///
    /// Within a group, method `i` of `n` sits `(i - (n - 1) / 2)` bar widths
    /// from the group center.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn bars(&self) -> Vec<Bar> {
        let (px, py, pw, ph) = self.plot_area();
        let pitch = pw / METRICS.len() as f32;
        let bar_w = pitch * BAR_WIDTH;
        let center_offset = (self.methods.len() as f32 - 1.0) / 2.0;
        let y_max = self.y_max();
        let baseline = py + ph;

        let mut bars = Vec::with_capacity(METRICS.len() * self.methods.len());
        for group in 0..METRICS.len() {
            let center = (group as f32 + 0.5).mul_add(pitch, px);
            for (method, scores) in self.methods.iter().enumerate() {
                let value = scores.values[group];
                let bar_center = (method as f32 - center_offset).mul_add(bar_w, center);
                let height = (value / y_max * ph).round();

                // Safe: every coordinate lies inside the positive canvas
                bars.push(Bar {
                    group,
                    method,
                    value,
                    left: (bar_center - bar_w / 2.0).round().max(0.0) as u32,
                    top: (baseline - height).round().max(0.0) as u32,
                    width: bar_w.round().max(1.0) as u32,
                    height: height as u32,
                });
            }
        }

        bars
    }

    /// Draw the chart: dashed value grid, bars, axes and a legend of swatches.
    #[must_use]
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_possible_wrap,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn render(&self) -> RgbImage {
        let mut img = RgbImage::from_pixel(self.width, self.height, BACKGROUND);
        let (px, py, pw, ph) = self.plot_area();
        let baseline = py + ph;

        let y_max = self.y_max();
        if let Some(step) = tick_step(y_max) {
            for i in 1..=MAX_TICKS {
                let tick = step * i as f32;
                if tick > y_max {
                    break;
                }
                let y = baseline - tick / y_max * ph;
                draw_dashed_hline(&mut img, px, px + pw, y, GRID);
            }
        }

        for bar in self.bars() {
            if bar.height == 0 {
                continue;
            }
            let rect = Rect::at(bar.left as i32, bar.top as i32).of_size(bar.width, bar.height);
            draw_filled_rect_mut(&mut img, rect, self.methods[bar.method].color);
        }

        draw_line_segment_mut(&mut img, (px, py), (px, baseline), AXIS);
        draw_line_segment_mut(&mut img, (px, baseline), (px + pw, baseline), AXIS);

        // Legend, top-right of the plot area
        let swatch = (24_u32, 14_u32);
        let legend_x = (px + pw) as i32 - swatch.0 as i32 - 10;
        for (i, scores) in self.methods.iter().enumerate() {
            let y = py as i32 + 10 + i as i32 * (swatch.1 as i32 + 6);
            let rect = Rect::at(legend_x, y).of_size(swatch.0, swatch.1);
            draw_filled_rect_mut(&mut img, rect, scores.color);
            draw_hollow_rect_mut(&mut img, rect, AXIS);
        }

        img
    }

    /// Render and save as an image (format from the extension, PNG by default).
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        save_image(&DynamicImage::ImageRgb8(self.render()), path)
    }

    /// Plain-text table of the plotted values.
    #[must_use]
    pub fn table(&self) -> String {
        let mut out = format!("{:<12}", "Method");
        for metric in METRICS {
            let _ = write!(out, "{metric:>20}");
        }
        out.push('\n');

        for scores in &self.methods {
            let _ = write!(out, "{:<12}", scores.name);
            for value in scores.values {
                let _ = write!(out, "{value:>20.2}");
            }
            out.push('\n');
        }

        out
    }
}

/// Grid spacing of 1, 2 or 5 times a power of ten giving about five lines.
///
/// None when the range is too small to produce a usable step.
fn tick_step(y_max: f32) -> Option<f32> {
    let raw = y_max / 5.0;
    let magnitude = 10_f32.powf(raw.log10().floor());
    if !(magnitude.is_normal() && magnitude > 0.0) {
        return None;
    }
    let normalized = raw / magnitude;

    let nice = if normalized <= 1.0 {
        1.0
    } else if normalized <= 2.0 {
        2.0
    } else if normalized <= 5.0 {
        5.0
    } else {
        10.0
    };

    let step = nice * magnitude;
    (step.is_normal() && step > 0.0).then_some(step)
}

/// Horizontal line drawn as 6px dashes with 4px gaps.
fn draw_dashed_hline(img: &mut RgbImage, x0: f32, x1: f32, y: f32, color: Rgb<u8>) {
    let mut x = x0;
    while x < x1 {
        let end = (x + 6.0).min(x1);
        draw_line_segment_mut(img, (x, y), (end, y), color);
        x += 10.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reference_values_unchanged() {
        let chart = ComparisonChart::default();
        let values: Vec<[f32; 3]> = chart.methods().iter().map(|m| m.values).collect();

        assert_eq!(
            values,
            vec![[35.2, 0.89, 10.5], [42.7, 0.96, 13.2], [49.0, 0.99, 15.0]]
        );
    }

    #[test]
    fn test_three_groups_of_three_in_order() {
        let chart = ComparisonChart::default();
        let bars = chart.bars();

        assert_eq!(bars.len(), 9);
        for (i, bar) in bars.iter().enumerate() {
            assert_eq!(bar.group, i / 3);
            assert_eq!(bar.method, i % 3);
            assert!(
                (bar.value - chart.methods()[bar.method].values[bar.group]).abs() < f32::EPSILON
            );
        }

        // Left to right within and across groups
        for pair in bars.windows(2) {
            assert!(pair[0].left < pair[1].left);
        }
    }

    #[test]
    fn test_bar_heights_proportional_to_values() {
        let chart = ComparisonChart::default();
        let bars = chart.bars();

        // Hybrid PSNR is the tallest bar, JPEG SSIM is the shortest
        let tallest = bars.iter().max_by_key(|b| b.height).unwrap();
        assert_eq!((tallest.group, tallest.method), (0, 2));
        let shortest = bars.iter().min_by_key(|b| b.height).unwrap();
        assert_eq!((shortest.group, shortest.method), (1, 0));

        // Every bar rests on the same baseline
        let baseline = bars[0].top + bars[0].height;
        assert!(bars.iter().all(|b| (b.top + b.height).abs_diff(baseline) <= 1));
    }

    #[test]
    fn test_render_draws_bar_colors() {
        let chart = ComparisonChart::default();
        let img = chart.render();
        assert_eq!(img.dimensions(), (1000, 600));

        let bar = chart.bars()[2];
        let pixel = img.get_pixel(bar.left + bar.width / 2, bar.top + bar.height / 2);
        assert_eq!(*pixel, MEDIUM_SEA_GREEN);
    }

    #[test]
    fn test_invalid_inputs_rejected() {
        assert!(ComparisonChart::new(Vec::new(), 800, 600).is_err());

        let mut scores = reference_scores().to_vec();
        scores[0].values[1] = -1.0;
        assert!(ComparisonChart::new(scores, 800, 600).is_err());

        assert!(ComparisonChart::new(reference_scores().to_vec(), 50, 50).is_err());
    }

    #[test]
    fn test_tick_step() {
        assert!((tick_step(51.45).unwrap() - 20.0).abs() < 1e-4);
        assert!((tick_step(0.9).unwrap() - 0.2).abs() < 1e-4);
        assert_eq!(tick_step(1e-45), None);
        assert_eq!(tick_step(0.0), None);
    }

    #[test]
    fn test_subnormal_values_render() {
        let methods = reference_scores()
            .into_iter()
            .map(|m| MethodScores {
                values: [1e-45, 0.0, 0.0],
                ..m
            })
            .collect();
        let chart = ComparisonChart::new(methods, 800, 600).unwrap();

        let img = chart.render();
        assert_eq!(img.dimensions(), (800, 600));
    }

    #[test]
    fn test_table_lists_methods() {
        let table = ComparisonChart::default().table();
        assert!(table.contains("Hybrid"));
        assert!(table.contains("49.00"));
        assert_eq!(table.lines().count(), 4);
    }
}
