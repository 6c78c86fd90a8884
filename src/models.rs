use std::fmt;
use std::num::NonZeroU32;
use std::path::PathBuf;
use std::str::FromStr;

use serde::Serialize;

use crate::glyph::GlyphPlacement;

pub const DEFAULT_CANVAS_SIZE: NonZeroU32 = NonZeroU32::new(1024).unwrap();
pub const DEFAULT_SIZES: [u32; 7] = [16, 32, 64, 128, 256, 512, 1024];
pub const DEFAULT_FONT_PATH: &str = "/System/Library/Fonts/Helvetica.ttc";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Rgb(pub u8, pub u8, pub u8);

impl Rgb {
    pub const WHITE: Rgb = Rgb(255, 255, 255);
    pub const GREEN: Rgb = Rgb(76, 175, 80);
    pub const LIGHT_GREEN: Rgb = Rgb(144, 238, 144);

    pub fn opaque(self) -> image::Rgba<u8> {
        image::Rgba([self.0, self.1, self.2, 255])
    }
}

impl fmt::Display for Rgb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{},{}", self.0, self.1, self.2)
    }
}

/// Accepts `r,g,b` or `#rrggbb`.
impl FromStr for Rgb {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(format!("expected #rrggbb, got {s:?}"));
            }
            let channel = |i: usize| {
                u8::from_str_radix(&hex[i..i + 2], 16).map_err(|e| format!("{s:?}: {e}"))
            };
            return Ok(Rgb(channel(0)?, channel(2)?, channel(4)?));
        }
        let parts: Vec<&str> = s.split(',').map(str::trim).collect();
        if parts.len() != 3 {
            return Err(format!("expected r,g,b, got {s:?}"));
        }
        let channel = |p: &str| p.parse::<u8>().map_err(|e| format!("{s:?}: {e}"));
        Ok(Rgb(channel(parts[0])?, channel(parts[1])?, channel(parts[2])?))
    }
}

/// Ways of turning a base image into an `.icns` bundle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Packager {
    /// `sips` converts the flat PNG directly.
    Sips,
    /// `iconutil` packages a staged `.iconset` directory.
    Iconutil,
    /// In-process encoder, no external tool.
    Native,
}

impl Packager {
    pub fn program(self) -> Option<&'static str> {
        match self {
            Packager::Sips => Some("sips"),
            Packager::Iconutil => Some("iconutil"),
            Packager::Native => None,
        }
    }

    pub fn needs_staging(self) -> bool {
        !matches!(self, Packager::Sips)
    }
}

impl fmt::Display for Packager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Packager::Sips => "sips",
            Packager::Iconutil => "iconutil",
            Packager::Native => "native",
        })
    }
}

impl FromStr for Packager {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sips" => Ok(Packager::Sips),
            "iconutil" => Ok(Packager::Iconutil),
            "native" => Ok(Packager::Native),
            other => Err(format!("unknown packager {other:?} (sips, iconutil, native)")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Config {
    pub label: char,
    pub canvas_size: NonZeroU32,
    pub fill: Rgb,
    pub glyph_color: Rgb,
    pub padding: u32,
    pub font_path: Option<PathBuf>,
    pub font_size: f32,
    pub glyph_bias: f32,
    pub glyph_offset_x: i32,
    pub glyph_offset_y: i32,
    pub output_dir: PathBuf,
    pub png_name: String,
    pub bundle_name: String,
    pub iconset_name: String,
    pub sizes: Vec<u32>,
    pub double_density: bool,
    pub double_density_max: u32,
    pub primary: Packager,
    pub fallback: Packager,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            label: 'N',
            canvas_size: DEFAULT_CANVAS_SIZE,
            fill: Rgb::GREEN,
            glyph_color: Rgb::WHITE,
            padding: 50,
            font_path: Some(PathBuf::from(DEFAULT_FONT_PATH)),
            font_size: 500.0,
            glyph_bias: 0.0,
            glyph_offset_x: 0,
            glyph_offset_y: 0,
            output_dir: PathBuf::from("build"),
            png_name: "icon.png".to_string(),
            bundle_name: "icon.icns".to_string(),
            iconset_name: "icon.iconset".to_string(),
            sizes: DEFAULT_SIZES.to_vec(),
            double_density: true,
            double_density_max: 512,
            primary: Packager::Sips,
            fallback: Packager::Iconutil,
        }
    }
}

impl Config {
    /// Installer artwork: lighter fill, larger letter nudged upward.
    pub fn installer() -> Self {
        Self {
            fill: Rgb::LIGHT_GREEN,
            font_size: 600.0,
            glyph_bias: 0.25,
            ..Self::default()
        }
    }

    pub fn png_path(&self) -> PathBuf {
        self.output_dir.join(&self.png_name)
    }

    pub fn bundle_path(&self) -> PathBuf {
        self.output_dir.join(&self.bundle_name)
    }

    pub fn staging_path(&self) -> PathBuf {
        self.output_dir.join(&self.iconset_name)
    }

    pub fn placement(&self) -> GlyphPlacement {
        GlyphPlacement {
            bias: self.glyph_bias,
            offset_x: self.glyph_offset_x,
            offset_y: self.glyph_offset_y,
        }
    }
}
