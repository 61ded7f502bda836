use crate::PlotBytes;
use crate::pipeline::PipelineOutput;
use crate::render::palette::Rgb;
use anyhow::{Context, Result, anyhow, ensure};
use derive_builder::Builder;
use image::{ImageEncoder, RgbImage};
use plotters::backend::BitMapBackend;
use plotters::drawing::IntoDrawingArea;
use plotters::element::Rectangle;
use plotters::style::{Color, RGBColor};
use tracing::debug;

/// Largest image edge the preview renderer will allocate
const MAX_EDGE_PX: u64 = 16_384;

/// Options for [`render_matrix`]
#[derive(Builder, Clone, Debug, PartialEq)]
#[builder(setter(into), default)]
pub struct RenderOptions {
    /// Blank border around the grid and legend, in pixels
    #[builder(default = "12")]
    pub margin: u32,

    /// Pixels left blank between neighbouring cells
    #[builder(default = "1")]
    pub gap: u32,

    #[builder(default = "Rgb::new(255, 255, 255)")]
    pub background: Rgb,

    /// Height of the legend strip under the grid; 0 disables it
    #[builder(default = "14")]
    pub legend_height: u32,

    /// Number of color steps in the legend strip
    #[builder(default = "64")]
    pub legend_steps: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            margin: 12,
            gap: 1,
            background: Rgb::new(255, 255, 255),
            legend_height: 14,
            legend_steps: 64,
        }
    }
}

impl RenderOptions {
    /// Create a new builder for RenderOptions
    pub fn new() -> RenderOptionsBuilder {
        RenderOptionsBuilder::default()
    }
}

/// Pixel geometry of a rendered matrix
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GridLayout {
    pub width: u32,
    pub height: u32,
    pub cell_width: u32,
    pub cell_height: u32,
    pub margin: u32,
    /// Top edge of the legend strip, when one is drawn
    pub legend_top: Option<u32>,
}

impl GridLayout {
    pub fn compute(output: &PipelineOutput, options: &RenderOptions) -> Result<Self> {
        let cell_width = output.sizing.cell_width.round().max(1.0) as u64;
        let cell_height = output.sizing.cell_height.round().max(1.0) as u64;
        let margin = options.margin as u64;

        let grid_width = cell_width * output.genes.len() as u64;
        let grid_height = cell_height * output.cancer_types.len() as u64;

        let draw_legend = output.color_scale.is_some() && options.legend_height > 0;
        let (content_width, legend_block) = if draw_legend {
            (
                grid_width.max(options.legend_steps as u64),
                margin + options.legend_height as u64,
            )
        } else {
            (grid_width, 0)
        };

        let width = (2 * margin + content_width).max(1);
        let height = (2 * margin + grid_height + legend_block).max(1);
        ensure!(
            width <= MAX_EDGE_PX && height <= MAX_EDGE_PX,
            "matrix preview of {width} x {height} px exceeds the {MAX_EDGE_PX} px limit"
        );

        Ok(Self {
            width: width as u32,
            height: height as u32,
            cell_width: cell_width as u32,
            cell_height: cell_height as u32,
            margin: options.margin,
            legend_top: draw_legend.then(|| (2 * margin + grid_height) as u32),
        })
    }

    /// Top-left pixel of the cell in column `gene_index`, row `cancer_type_index`
    pub fn cell_origin(&self, gene_index: usize, cancer_type_index: usize) -> (u32, u32) {
        (
            self.margin + gene_index as u32 * self.cell_width,
            self.margin + cancer_type_index as u32 * self.cell_height,
        )
    }
}

fn filled_rect(x0: u32, y0: u32, width: u32, height: u32) -> [(i32, i32); 2] {
    [
        (x0 as i32, y0 as i32),
        ((x0 + width - 1) as i32, (y0 + height - 1) as i32),
    ]
}

/// Render the matrix as a PNG preview.
///
/// Genes run along the x axis and cancer types down the y axis, both in label
/// order. Each cell is filled with the color of its representative frequency.
/// Infeasible sizings still render, at their clamped cell size.
pub fn render_matrix(output: &PipelineOutput, options: &RenderOptions) -> Result<PlotBytes> {
    let layout = GridLayout::compute(output, options)?;
    let (width, height) = (layout.width, layout.height);
    let mut pixel_buffer = vec![0u8; width as usize * height as usize * 3];

    {
        let root = BitMapBackend::with_buffer(&mut pixel_buffer, (width, height)).into_drawing_area();
        root.fill(&RGBColor::from(options.background))
            .map_err(|e| anyhow!("failed to fill preview background: {e}"))?;

        if let Some(scale) = &output.color_scale {
            let inner_width = layout.cell_width.saturating_sub(options.gap).max(1);
            let inner_height = layout.cell_height.saturating_sub(options.gap).max(1);

            for cell in &output.cells {
                let column = output
                    .genes
                    .binary_search(&cell.gene)
                    .map_err(|_| anyhow!("gene '{}' is missing from the axis labels", cell.gene))?;
                let row = output
                    .cancer_types
                    .binary_search(&cell.cancer_type)
                    .map_err(|_| {
                        anyhow!("cancer type '{}' is missing from the axis labels", cell.cancer_type)
                    })?;
                let (x0, y0) = layout.cell_origin(column, row);
                let color = RGBColor::from(scale.color(cell.representative_record.effective_frequency));
                root.draw(&Rectangle::new(
                    filled_rect(x0, y0, inner_width, inner_height),
                    color.filled(),
                ))
                .map_err(|e| anyhow!("failed to draw cell {}/{}: {e}", cell.gene, cell.cancer_type))?;
            }

            if let Some(legend_top) = layout.legend_top {
                let legend = scale.legend(options.legend_steps);
                let legend_width = width - 2 * layout.margin;
                let steps = legend.len() as u32;
                for (i, (_, color)) in legend.into_iter().enumerate() {
                    let i = i as u32;
                    let x0 = layout.margin + i * legend_width / steps;
                    let x1 = layout.margin + (i + 1) * legend_width / steps;
                    if x1 <= x0 {
                        continue;
                    }
                    root.draw(&Rectangle::new(
                        filled_rect(x0, legend_top, x1 - x0, options.legend_height),
                        RGBColor::from(color).filled(),
                    ))
                    .map_err(|e| anyhow!("failed to draw legend: {e}"))?;
                }
            }
        }

        root.present()
            .map_err(|e| anyhow!("failed to present plotters buffer: {e}"))?;
    }

    let img: RgbImage = image::ImageBuffer::from_vec(width, height, pixel_buffer)
        .ok_or_else(|| anyhow!("preview image buffer had unexpected size"))?;

    let mut encoded = Vec::new();
    image::codecs::png::PngEncoder::new(&mut encoded)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .context("failed to PNG encode matrix preview")?;

    debug!(
        "Rendered {} cells into a {width} x {height} preview ({} bytes)",
        output.cells.len(),
        encoded.len()
    );
    Ok(encoded)
}
