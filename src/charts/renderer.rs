//! Static Chart Renderer
//! Draws the correlation heatmap into an in-memory bitmap and saves it as PNG.
//!
//! Layout:
//! 1. Title centered at the top
//! 2. Square grid of cells, one per (row, column) series pair, annotated with r
//! 3. Series labels left of each row and below each column
//! 4. Vertical colour bar on the right, -1 at the bottom and +1 at the top

use crate::config::POLLUTANT_PREFIX;
use crate::error::{PipelineError, Result};
use crate::stats::CorrelationMatrix;
use image::RgbImage;
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use std::path::Path;
use tracing::info;

/// Output size in pixels.
pub const HEATMAP_SIZE: (u32, u32) = (1000, 800);

// Diverging palette anchors (RGB)
const COOL: (f64, f64, f64) = (59.0, 76.0, 192.0);
const NEUTRAL: (f64, f64, f64) = (221.0, 221.0, 221.0);
const WARM: (f64, f64, f64) = (180.0, 4.0, 38.0);
const MISSING: RGBColor = RGBColor(240, 240, 240);

const TITLE: &str = "Correlation between generation and air quality";
const FONT: &str = "sans-serif";

pub struct HeatmapRenderer;

impl HeatmapRenderer {
    /// Render `matrix` and write it to `path` as PNG.
    pub fn render_png(matrix: &CorrelationMatrix, path: &Path) -> Result<()> {
        let img = Self::generate_heatmap_image(matrix, HEATMAP_SIZE.0, HEATMAP_SIZE.1)?;
        img.save(path)
            .map_err(|e| PipelineError::ChartRender(format!("{}: {}", path.display(), e)))?;
        info!("Saved heatmap to {}", path.display());
        Ok(())
    }

    /// Draw the annotated heatmap into an RGB image of the given size.
    pub fn generate_heatmap_image(
        matrix: &CorrelationMatrix,
        width: u32,
        height: u32,
    ) -> Result<RgbImage> {
        let mut buffer = vec![0u8; (width * height * 3) as usize];
        {
            let root = BitMapBackend::with_buffer(&mut buffer, (width, height)).into_drawing_area();
            root.fill(&WHITE).map_err(render_err)?;
            Self::draw(&root, matrix, width as i32, height as i32)?;
            root.present().map_err(render_err)?;
        }

        RgbImage::from_raw(width, height, buffer)
            .ok_or_else(|| PipelineError::ChartRender("bitmap buffer size mismatch".to_string()))
    }

    fn draw<DB: DrawingBackend>(
        root: &DrawingArea<DB, plotters::coord::Shift>,
        matrix: &CorrelationMatrix,
        width: i32,
        height: i32,
    ) -> Result<()> {
        let grid = CellGrid::new(matrix.labels.len(), width, height);
        let labels: Vec<&str> = matrix.labels.iter().map(|l| short_label(l)).collect();

        let centered = Pos::new(HPos::Center, VPos::Center);
        let title_style = (FONT, 24).into_font().color(&BLACK).pos(centered);
        let label_style = (FONT, 15).into_font().color(&BLACK);

        root.draw(&Text::new(TITLE, (width / 2, grid.top / 2), title_style))
            .map_err(render_err)?;

        Self::draw_cells(root, matrix, &grid)?;

        for (i, row) in matrix.values.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                let annotation = if value.is_nan() {
                    "nan".to_string()
                } else {
                    format!("{:.2}", value)
                };
                // Light text on saturated cells, dark text elsewhere.
                let text_color = if value.abs() > 0.6 { WHITE } else { BLACK };
                let style = (FONT, 16).into_font().color(&text_color).pos(centered);
                root.draw(&Text::new(annotation, grid.center(i, j), style))
                    .map_err(render_err)?;
            }

            root.draw(&Text::new(
                labels[i].to_string(),
                (grid.left - 10, grid.center(i, 0).1),
                label_style.clone().pos(Pos::new(HPos::Right, VPos::Center)),
            ))
            .map_err(render_err)?;
        }

        for (j, label) in labels.iter().enumerate() {
            root.draw(&Text::new(
                label.to_string(),
                (grid.center(0, j).0, grid.bottom + 12),
                label_style.clone().pos(Pos::new(HPos::Center, VPos::Top)),
            ))
            .map_err(render_err)?;
        }

        Self::draw_colorbar(root, grid.right + 30, grid.top, 24, grid.bottom - grid.top)
    }

    /// Fill one rectangle per matrix entry. Draws no text.
    fn draw_cells<DB: DrawingBackend>(
        root: &DrawingArea<DB, plotters::coord::Shift>,
        matrix: &CorrelationMatrix,
        grid: &CellGrid,
    ) -> Result<()> {
        for (i, row) in matrix.values.iter().enumerate() {
            for (j, value) in row.iter().enumerate() {
                let fill = if value.is_nan() { MISSING } else { Self::colormap(*value) };
                root.draw(&Rectangle::new(grid.cell(i, j), fill.filled()))
                    .map_err(render_err)?;
            }
        }
        Ok(())
    }

    fn draw_colorbar<DB: DrawingBackend>(
        root: &DrawingArea<DB, plotters::coord::Shift>,
        x: i32,
        y: i32,
        w: i32,
        h: i32,
    ) -> Result<()> {
        let steps = 100;
        for s in 0..steps {
            let y0 = y + h * s / steps;
            let y1 = y + h * (s + 1) / steps;
            let value = 1.0 - 2.0 * (s as f64 + 0.5) / steps as f64;
            root.draw(&Rectangle::new([(x, y0), (x + w, y1)], Self::colormap(value).filled()))
                .map_err(render_err)?;
        }
        root.draw(&Rectangle::new([(x, y), (x + w, y + h)], BLACK.stroke_width(1)))
            .map_err(render_err)?;

        let tick_style = (FONT, 13)
            .into_font()
            .color(&BLACK)
            .pos(Pos::new(HPos::Left, VPos::Center));
        for (value, label) in [(1.0, "1.0"), (0.5, "0.5"), (0.0, "0.0"), (-0.5, "-0.5"), (-1.0, "-1.0")] {
            let ty = y + ((1.0 - value) / 2.0 * h as f64) as i32;
            root.draw(&Text::new(label, (x + w + 6, ty), tick_style.clone()))
                .map_err(render_err)?;
        }
        Ok(())
    }

    /// Diverging blue-grey-red colour for a correlation in [-1, 1].
    pub fn colormap(value: f64) -> RGBColor {
        let v = value.clamp(-1.0, 1.0);
        let (from, to, t) = if v < 0.0 {
            (COOL, NEUTRAL, v + 1.0)
        } else {
            (NEUTRAL, WARM, v)
        };
        let lerp = |a: f64, b: f64| (a + (b - a) * t).round() as u8;
        RGBColor(lerp(from.0, to.0), lerp(from.1, to.1), lerp(from.2, to.2))
    }
}

/// Pixel geometry of the cell grid.
#[derive(Debug, Clone, Copy)]
struct CellGrid {
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    cell_w: i32,
    cell_h: i32,
}

impl CellGrid {
    fn new(n: usize, width: i32, height: i32) -> Self {
        let n = n.max(1) as i32;
        let (left, top, right, bottom) = (150, 60, width - 110, height - 70);
        Self {
            left,
            top,
            right,
            bottom,
            cell_w: (right - left) / n,
            cell_h: (bottom - top) / n,
        }
    }

    fn cell(&self, row: usize, col: usize) -> [(i32, i32); 2] {
        let x0 = self.left + col as i32 * self.cell_w;
        let y0 = self.top + row as i32 * self.cell_h;
        [(x0, y0), (x0 + self.cell_w, y0 + self.cell_h)]
    }

    fn center(&self, row: usize, col: usize) -> (i32, i32) {
        let [(x0, y0), _] = self.cell(row, col);
        (x0 + self.cell_w / 2, y0 + self.cell_h / 2)
    }
}

/// `national_avg_PM10` -> `PM10`; other names are kept.
fn short_label(label: &str) -> &str {
    label.strip_prefix(POLLUTANT_PREFIX).unwrap_or(label)
}

fn render_err<E: std::fmt::Display>(e: E) -> PipelineError {
    PipelineError::ChartRender(e.to_string())
}
