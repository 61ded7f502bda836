pub mod colorscale;
pub mod palette;
pub mod raster;
pub mod sizing;

pub use colorscale::{AdaptiveColorScale, BAND_EASING, Breakpoints};
pub use palette::{ColorScheme, Rgb};
pub use raster::{GridLayout, RenderOptions, render_matrix};
pub use sizing::{CellSizing, CellSizingEngine, SizingLimits, Viewport};
