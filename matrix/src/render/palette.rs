use colorgrad::Gradient;
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumIter, EnumString};

/// An sRGB color with 8-bit channels
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub struct Rgb {
    pub r: u8,
    pub g: u8,
    pub b: u8,
}

impl Rgb {
    pub const fn new(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b }
    }

    /// Parse `#rrggbb` (the leading `#` is optional)
    pub fn from_hex(hex: &str) -> Option<Self> {
        let hex = hex.strip_prefix('#').unwrap_or(hex);
        if hex.len() != 6 || !hex.is_ascii() {
            return None;
        }
        let channel = |range: std::ops::Range<usize>| u8::from_str_radix(&hex[range], 16).ok();
        Some(Self::new(channel(0..2)?, channel(2..4)?, channel(4..6)?))
    }

    /// Format as `#rrggbb`
    pub fn to_hex(&self) -> String {
        format!("#{:02x}{:02x}{:02x}", self.r, self.g, self.b)
    }

    /// Per-channel linear interpolation; `t` is clamped to `[0, 1]`
    pub fn lerp(self, other: Self, t: f64) -> Self {
        let t = if t.is_nan() { 0.0 } else { t.clamp(0.0, 1.0) };
        let mix = |a: u8, b: u8| (a as f64 + (b as f64 - a as f64) * t).round() as u8;
        Self::new(mix(self.r, other.r), mix(self.g, other.g), mix(self.b, other.b))
    }
}

impl From<Rgb> for plotters::style::RGBColor {
    fn from(c: Rgb) -> Self {
        plotters::style::RGBColor(c.r, c.g, c.b)
    }
}

/// Number of color stops in a palette: one per band edge
pub const STOP_COUNT: usize = 6;

/// Palette used by the adaptive color scale.
///
/// Each scheme provides six stops, `very_low, low, medium, high, very_high,
/// extreme`; band `i` of the color scale runs from stop `i` to stop `i + 1`.
///
/// - **Heat** (default): near-white blue through yellow and orange to dark red
/// - **Perceptually uniform**: Viridis, Plasma, Inferno, Magma, Turbo, Cividis,
///   sampled at six evenly spaced positions of the `colorgrad` presets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
pub enum ColorScheme {
    #[default]
    Heat,
    Viridis,
    Plasma,
    Inferno,
    Magma,
    Turbo,
    Cividis,
}

const HEAT_STOPS: [Rgb; STOP_COUNT] = [
    Rgb::new(0xf0, 0xf8, 0xff),
    Rgb::new(0xe3, 0xf2, 0xfd),
    Rgb::new(0xff, 0xeb, 0x3b),
    Rgb::new(0xff, 0x98, 0x00),
    Rgb::new(0xd3, 0x2f, 0x2f),
    Rgb::new(0x8b, 0x00, 0x00),
];

impl ColorScheme {
    /// The six palette stops, from `very_low` to `extreme`
    pub fn stops(&self) -> [Rgb; STOP_COUNT] {
        match self {
            ColorScheme::Heat => HEAT_STOPS,
            ColorScheme::Viridis => sample_gradient(&colorgrad::preset::viridis()),
            ColorScheme::Plasma => sample_gradient(&colorgrad::preset::plasma()),
            ColorScheme::Inferno => sample_gradient(&colorgrad::preset::inferno()),
            ColorScheme::Magma => sample_gradient(&colorgrad::preset::magma()),
            ColorScheme::Turbo => sample_gradient(&colorgrad::preset::turbo()),
            ColorScheme::Cividis => sample_gradient(&colorgrad::preset::cividis()),
        }
    }
}

fn sample_gradient(gradient: &impl Gradient) -> [Rgb; STOP_COUNT] {
    std::array::from_fn(|i| {
        let t = i as f32 / (STOP_COUNT - 1) as f32;
        let [r, g, b, _] = gradient.at(t).to_rgba8();
        Rgb::new(r, g, b)
    })
}
